pub mod analytics;
pub mod config;
pub mod dashboard;
pub mod delivery;
pub mod frames;
pub mod logging;
pub mod sampler;
pub mod session;
pub mod state;
