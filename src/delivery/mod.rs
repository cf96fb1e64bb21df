//! Report delivery: uploading session artifacts to a remote folder.
//!
//! Delivery never feeds back into recording. Callers spawn it and only log the outcome.

pub mod scheduler;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::analytics::{AnalyticsError, ReportArtifacts};
use crate::config::DeliveryConfig;
use crate::session::ClosedSession;

pub use scheduler::{parse_daily_time, DeliveryScheduler, ScheduleError};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery is disabled")]
    Disabled,
    #[error("not an uploadable file: {0}")]
    InvalidPath(String),
    #[error("upload timed out")]
    Timeout,
    #[error("upload network error: {0}")]
    Network(String),
    #[error("upload rejected: status={status}, message={message}")]
    Rejected { status: u16, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("report generation failed: {0}")]
    Report(#[from] AnalyticsError),
}

/// Stores a local file inside a named remote folder.
pub trait ReportUploader: Send + Sync {
    fn upload<'a>(
        &'a self,
        local_path: &'a Path,
        folder: &'a str,
    ) -> BoxFuture<'a, Result<(), DeliveryError>>;
}

/// PUTs files to `{endpoint}/{folder}/{file_name}` with an optional bearer token.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

impl HttpUploader {
    pub fn new(config: &DeliveryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client,
        }
    }

    fn target_url(&self, folder: &str, file_name: &str) -> String {
        format!("{}/{}/{}", self.endpoint, folder.trim_matches('/'), file_name)
    }

    async fn put(&self, local_path: &Path, folder: &str) -> Result<(), DeliveryError> {
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DeliveryError::InvalidPath(local_path.display().to_string()))?;
        let body = tokio::fs::read(local_path).await?;
        let url = self.target_url(folder, file_name);

        let mut request = self.client.put(&url).body(body);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        let response = request.send().await.map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        tracing::info!(file = file_name, folder, "Uploaded");
        Ok(())
    }
}

fn network_error(err: reqwest::Error) -> DeliveryError {
    if err.is_timeout() {
        DeliveryError::Timeout
    } else {
        DeliveryError::Network(err.to_string())
    }
}

impl ReportUploader for HttpUploader {
    fn upload<'a>(
        &'a self,
        local_path: &'a Path,
        folder: &'a str,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(self.put(local_path, folder))
    }
}

/// Accepts every upload without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledUploader;

impl ReportUploader for DisabledUploader {
    fn upload<'a>(
        &'a self,
        local_path: &'a Path,
        folder: &'a str,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move {
            tracing::debug!(path = %local_path.display(), folder, "Delivery disabled, skipping upload");
            Ok(())
        })
    }
}

pub fn uploader_from_config(config: &DeliveryConfig) -> Arc<dyn ReportUploader> {
    if config.enabled && !config.endpoint.is_empty() {
        Arc::new(HttpUploader::new(config))
    } else {
        if config.enabled {
            tracing::warn!("DELIVERY_ENABLED is set but DELIVERY_ENDPOINT is empty; uploads disabled");
        }
        Arc::new(DisabledUploader)
    }
}

/// Uploads the session log and its report files. Stops at the first failed upload.
pub async fn deliver_session(
    uploader: &dyn ReportUploader,
    session: &ClosedSession,
    artifacts: &ReportArtifacts,
    config: &DeliveryConfig,
) -> Result<(), DeliveryError> {
    uploader.upload(&session.log_path, &config.csv_folder).await?;
    uploader
        .upload(&artifacts.report_path, &config.report_folder)
        .await?;
    uploader
        .upload(&artifacts.hotspot_path, &config.report_folder)
        .await?;
    Ok(())
}

/// Fire-and-forget delivery: failures are logged and never reach the caller.
pub fn spawn_delivery(
    uploader: Arc<dyn ReportUploader>,
    session: ClosedSession,
    artifacts: ReportArtifacts,
    config: DeliveryConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match deliver_session(uploader.as_ref(), &session, &artifacts, &config).await {
            Ok(()) => tracing::info!(session = %session.name, "Session delivered"),
            Err(e) => tracing::warn!(error = %e, session = %session.name, "Session delivery failed"),
        }
    })
}
