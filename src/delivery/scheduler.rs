//! Daily delivery of the newest session.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use eye_metrics::AttentionScorer;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use super::{deliver_session, DeliveryError, ReportUploader};
use crate::analytics::{self, ReportArtifacts};
use crate::config::{AnalyticsConfig, DeliveryConfig};
use crate::session::ClosedSession;

/// Upper bound for one delivery run (report generation plus uploads).
const JOB_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid daily time {0:?}, expected HH:MM")]
    InvalidTime(String),
    #[error("scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
}

/// Turns a local `HH:MM` into a six-field cron expression firing once a day.
pub fn parse_daily_time(raw: &str) -> Result<String, ScheduleError> {
    let invalid = || ScheduleError::InvalidTime(raw.to_string());
    let (h, m) = raw.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok(format!("0 {minute} {hour} * * *"))
}

/// Most recently modified `.csv` in `dir`, if any.
pub fn newest_session_log(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// Everything a delivery run needs, shared by every scheduled invocation.
pub struct DeliveryContext {
    pub session_dir: PathBuf,
    pub analytics: AnalyticsConfig,
    pub scorer: AttentionScorer,
    pub delivery: DeliveryConfig,
    pub uploader: Arc<dyn ReportUploader>,
}

impl DeliveryContext {
    /// Rebuilds the newest session's report and uploads it. `Ok(None)` when there is nothing to send.
    pub async fn deliver_newest(&self) -> Result<Option<ClosedSession>, DeliveryError> {
        if !self.delivery.enabled {
            return Err(DeliveryError::Disabled);
        }
        let dir = self.session_dir.clone();
        let analytics_cfg = self.analytics;
        let scorer = self.scorer;

        // 报表生成是同步 IO + 计算，放到阻塞线程池
        let built = tokio::task::spawn_blocking(
            move || -> Result<Option<(ClosedSession, ReportArtifacts)>, DeliveryError> {
                let Some(log_path) = newest_session_log(&dir)? else {
                    return Ok(None);
                };
                let session = ClosedSession::from_log_path(log_path)
                    .map_err(analytics::AnalyticsError::from)?;
                let artifacts = analytics::generate(&session, &analytics_cfg, &scorer)?;
                Ok(Some((session, artifacts)))
            },
        )
        .await
        .map_err(|e| DeliveryError::Io(std::io::Error::other(e)))??;

        let Some((session, artifacts)) = built else {
            tracing::info!(dir = %self.session_dir.display(), "No session log to deliver");
            return Ok(None);
        };
        deliver_session(self.uploader.as_ref(), &session, &artifacts, &self.delivery).await?;
        Ok(Some(session))
    }
}

pub struct DeliveryScheduler {
    ctx: Arc<DeliveryContext>,
    cron: String,
    shutdown_rx: broadcast::Receiver<()>,
}

impl DeliveryScheduler {
    pub fn new(
        ctx: DeliveryContext,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<Self, ScheduleError> {
        let cron = parse_daily_time(&ctx.delivery.daily_at)?;
        Ok(Self {
            ctx: Arc::new(ctx),
            cron,
            shutdown_rx,
        })
    }

    pub fn cron(&self) -> &str {
        &self.cron
    }

    /// Runs the scheduler until the shutdown signal fires.
    pub async fn start(mut self) -> Result<(), ScheduleError> {
        if !self.ctx.delivery.enabled {
            tracing::info!("Delivery disabled; scheduler not started");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;
        let ctx = self.ctx.clone();
        add_job(&scheduler, &self.cron, "daily_delivery", move || {
            let ctx = ctx.clone();
            async move {
                match ctx.deliver_newest().await {
                    Ok(Some(session)) => {
                        tracing::info!(session = %session.name, "Scheduled delivery finished")
                    }
                    Ok(None) => {}
                    Err(e) => tracing::error!(error = %e, "Scheduled delivery failed"),
                }
            }
        })
        .await?;

        scheduler.start().await?;
        tracing::info!(cron = %self.cron, "Delivery scheduler started");

        let _ = self.shutdown_rx.recv().await;
        tracing::info!("Delivery scheduler shutting down");
        let _ = scheduler.shutdown().await;
        Ok(())
    }
}

/// Adds a local-time job with an overlap guard and timeout wrapper.
async fn add_job<Fut, F>(
    scheduler: &JobScheduler,
    cron: &str,
    name: &'static str,
    mut run: F,
) -> Result<(), ScheduleError>
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async_tz(cron, chrono::Local, move |_uuid, _lock| {
        let guard = running.clone();

        if guard
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(job = name, "Skipping run: previous run still in progress");
            return Box::pin(async {});
        }

        let fut = run();
        Box::pin(async move {
            if tokio::time::timeout(JOB_TIMEOUT, fut).await.is_err() {
                tracing::error!(
                    job = name,
                    timeout_secs = JOB_TIMEOUT.as_secs(),
                    "Job timed out"
                );
            }
            guard.store(false, Ordering::SeqCst);
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(job = name, cron, "Registered job");
    Ok(())
}
