use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use eye_metrics::attention::{
    AttentionScorer, DEFAULT_EAR_REFERENCE, DEFAULT_EAR_TOLERANCE, DEFAULT_SPEED_CEILING,
};
use eye_metrics::blink::{DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD};

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub session_dir: String,
    pub pipeline: PipelineConfig,
    pub analytics: AnalyticsConfig,
    pub delivery: DeliveryConfig,
    pub frames: FrameSourceConfig,
}

/// Tunables shared by the sampling loop and the live dashboard, built once per session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub blink_low_threshold: f64,
    pub blink_high_threshold: f64,
    pub persist_interval: Duration,
    pub scorer: AttentionScorer,
    pub easing_step: f64,
    pub dashboard_period: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blink_low_threshold: DEFAULT_LOW_THRESHOLD,
            blink_high_threshold: DEFAULT_HIGH_THRESHOLD,
            persist_interval: Duration::from_secs(1),
            scorer: AttentionScorer::default(),
            easing_step: 0.05,
            dashboard_period: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyticsConfig {
    pub resample_window: Duration,
    pub hotspot_bins_x: usize,
    pub hotspot_bins_y: usize,
    pub capture_width: u32,
    pub capture_height: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            resample_window: Duration::from_secs(180),
            hotspot_bins_x: 100,
            hotspot_bins_y: 100,
            capture_width: 1920,
            capture_height: 1080,
        }
    }
}

#[derive(Clone)]
pub struct DeliveryConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub token: String,
    /// Local wall-clock time (`HH:MM`) at which the newest report is delivered.
    pub daily_at: String,
    pub timeout_secs: u64,
    pub csv_folder: String,
    pub report_folder: String,
}

#[derive(Debug, Clone)]
pub struct FrameSourceConfig {
    /// JSON-lines landmark recording; the synthetic subject is used when unset.
    pub replay_path: Option<String>,
    pub synthetic_frames: u64,
    pub synthetic_fps: f64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            token: String::new(),
            daily_at: "08:00".to_string(),
            timeout_secs: 30,
            csv_folder: "csv".to_string(),
            report_folder: "reports".to_string(),
        }
    }
}

impl fmt::Debug for DeliveryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryConfig")
            .field("enabled", &self.enabled)
            .field("endpoint", &self.endpoint)
            .field("token", &"***REDACTED***")
            .field("daily_at", &self.daily_at)
            .field("timeout_secs", &self.timeout_secs)
            .field("csv_folder", &self.csv_folder)
            .field("report_folder", &self.report_folder)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        let pipeline_defaults = PipelineConfig::default();
        let analytics_defaults = AnalyticsConfig::default();
        let delivery_defaults = DeliveryConfig::default();

        Self {
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            session_dir: env_or("SESSION_DIR", "./sessions"),
            pipeline: PipelineConfig {
                blink_low_threshold: env_or_parse(
                    "EAR_THRESHOLD_LOW",
                    pipeline_defaults.blink_low_threshold,
                ),
                blink_high_threshold: env_or_parse(
                    "EAR_THRESHOLD_HIGH",
                    pipeline_defaults.blink_high_threshold,
                ),
                persist_interval: Duration::from_millis(env_or_parse(
                    "PERSIST_INTERVAL_MS",
                    1_000_u64,
                )),
                scorer: AttentionScorer {
                    ear_reference: env_or_parse("EAR_REFERENCE", DEFAULT_EAR_REFERENCE),
                    ear_tolerance: env_or_parse("EAR_TOLERANCE", DEFAULT_EAR_TOLERANCE),
                    speed_ceiling: env_or_parse("SPEED_CEILING", DEFAULT_SPEED_CEILING),
                },
                easing_step: env_or_parse("EASING_STEP", pipeline_defaults.easing_step),
                dashboard_period: Duration::from_millis(env_or_parse(
                    "DASHBOARD_PERIOD_MS",
                    500_u64,
                )),
            },
            analytics: AnalyticsConfig {
                resample_window: Duration::from_secs(env_or_parse(
                    "RESAMPLE_WINDOW_SECS",
                    analytics_defaults.resample_window.as_secs(),
                )),
                hotspot_bins_x: env_or_parse("HOTSPOT_BINS_X", analytics_defaults.hotspot_bins_x),
                hotspot_bins_y: env_or_parse("HOTSPOT_BINS_Y", analytics_defaults.hotspot_bins_y),
                capture_width: env_or_parse("CAPTURE_WIDTH", analytics_defaults.capture_width),
                capture_height: env_or_parse("CAPTURE_HEIGHT", analytics_defaults.capture_height),
            },
            delivery: DeliveryConfig {
                enabled: env_or_bool("DELIVERY_ENABLED", false),
                endpoint: env_or("DELIVERY_ENDPOINT", ""),
                token: env_or("DELIVERY_TOKEN", ""),
                daily_at: env_or("DELIVERY_DAILY_AT", &delivery_defaults.daily_at),
                timeout_secs: env_or_parse("DELIVERY_TIMEOUT_SECS", delivery_defaults.timeout_secs),
                csv_folder: env_or("DELIVERY_CSV_FOLDER", &delivery_defaults.csv_folder),
                report_folder: env_or("DELIVERY_REPORT_FOLDER", &delivery_defaults.report_folder),
            },
            frames: FrameSourceConfig {
                replay_path: env::var("FRAME_REPLAY_PATH")
                    .ok()
                    .filter(|p| !p.trim().is_empty()),
                synthetic_frames: env_or_parse("SYNTHETIC_FRAMES", 1_800_u64),
                synthetic_fps: env_or_parse("SYNTHETIC_FPS", 30.0_f64),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn managed_keys() -> &'static [&'static str] {
        &[
            "RUST_LOG",
            "SESSION_DIR",
            "EAR_THRESHOLD_LOW",
            "EAR_THRESHOLD_HIGH",
            "PERSIST_INTERVAL_MS",
            "SPEED_CEILING",
            "RESAMPLE_WINDOW_SECS",
            "DELIVERY_ENABLED",
            "DELIVERY_TOKEN",
            "FRAME_REPLAY_PATH",
        ]
    }

    fn clear_keys(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_when_missing() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        let cfg = Config::from_env();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.pipeline, PipelineConfig::default());
        assert_eq!(cfg.analytics, AnalyticsConfig::default());
        assert!(!cfg.delivery.enabled);
        assert!(cfg.frames.replay_path.is_none());
    }

    #[test]
    fn parses_numeric_values() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("EAR_THRESHOLD_LOW", "0.19");
        env::set_var("PERSIST_INTERVAL_MS", "250");
        env::set_var("SPEED_CEILING", "600");
        env::set_var("RESAMPLE_WINDOW_SECS", "60");

        let cfg = Config::from_env();
        assert_eq!(cfg.pipeline.blink_low_threshold, 0.19);
        assert_eq!(cfg.pipeline.persist_interval, Duration::from_millis(250));
        assert_eq!(cfg.pipeline.scorer.speed_ceiling, 600.0);
        assert_eq!(cfg.analytics.resample_window, Duration::from_secs(60));
        clear_keys(managed_keys());
    }

    #[test]
    fn invalid_values_fall_back() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("EAR_THRESHOLD_HIGH", "high");
        env::set_var("PERSIST_INTERVAL_MS", "-1");

        let cfg = Config::from_env();
        assert_eq!(cfg.pipeline.blink_high_threshold, DEFAULT_HIGH_THRESHOLD);
        assert_eq!(cfg.pipeline.persist_interval, Duration::from_secs(1));
        clear_keys(managed_keys());
    }

    #[test]
    fn delivery_token_is_redacted() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("DELIVERY_TOKEN", "super-secret");
        let cfg = Config::from_env();
        let rendered = format!("{:?}", cfg.delivery);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("REDACTED"));
        clear_keys(managed_keys());
    }

    #[test]
    fn blank_replay_path_is_ignored() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("FRAME_REPLAY_PATH", "  ");
        assert!(Config::from_env().frames.replay_path.is_none());
        clear_keys(managed_keys());
    }
}
