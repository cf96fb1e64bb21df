use std::path::PathBuf;

use chrono::Local;
use focus_monitor::analytics;
use focus_monitor::config::Config;
use focus_monitor::dashboard::DashboardFeed;
use focus_monitor::delivery::scheduler::DeliveryContext;
use focus_monitor::delivery::{spawn_delivery, uploader_from_config, DeliveryScheduler};
use focus_monitor::frames::{FrameSource, ReplayFrameSource, SyntheticFrameSource, SyntheticProfile};
use focus_monitor::logging::{init_tracing, LogConfig};
use focus_monitor::sampler::{SamplingLoop, SamplingOutcome};
use focus_monitor::session::{ClosedSession, Session};
use focus_monitor::state::attention_channel;
use futures::StreamExt;
use tokio::sync::broadcast;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Record,
    Report(PathBuf),
    Deliver,
    DeliverNow,
}

fn parse_mode(mut args: impl Iterator<Item = String>) -> Result<Mode, String> {
    match args.next().as_deref() {
        None | Some("record") => Ok(Mode::Record),
        Some("report") => args
            .next()
            .map(|p| Mode::Report(PathBuf::from(p)))
            .ok_or_else(|| "usage: focus-monitor report <session.csv>".to_string()),
        Some("deliver") => match args.next().as_deref() {
            None => Ok(Mode::Deliver),
            Some("--now") => Ok(Mode::DeliverNow),
            Some(flag) => Err(format!("unknown deliver flag {flag:?}; expected --now")),
        },
        Some(other) => Err(format!(
            "unknown mode {other:?}; expected record, report <session.csv> or deliver [--now]"
        )),
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(&LogConfig::from(&config));

    let mode = match parse_mode(std::env::args().skip(1)) {
        Ok(mode) => mode,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };
    tracing::info!(?mode, session_dir = %config.session_dir, "Starting focus-monitor");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    tokio::spawn(shutdown_signal(shutdown_tx.clone()));

    let result = match mode {
        Mode::Record => record(&config, &shutdown_tx).await,
        Mode::Report(path) => report(&config, path).await.map(|_| ()),
        Mode::Deliver => deliver(&config, &shutdown_tx).await,
        Mode::DeliverNow => deliver_now(&config).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "focus-monitor failed");
        std::process::exit(1);
    }
    tracing::info!("Shutdown complete");
}

async fn record(config: &Config, shutdown_tx: &broadcast::Sender<()>) -> Result<(), BoxError> {
    // 先打开数据源：回放文件有误时不应留下空的会话日志
    match &config.frames.replay_path {
        Some(path) => {
            let source = ReplayFrameSource::open(path)?;
            run_session(config, shutdown_tx, source).await
        }
        None => {
            let source = SyntheticFrameSource::new(SyntheticProfile {
                frames: config.frames.synthetic_frames,
                fps: config.frames.synthetic_fps,
                realtime: true,
                seed: rand::random(),
            });
            run_session(config, shutdown_tx, source).await
        }
    }
}

async fn run_session<S: FrameSource + 'static>(
    config: &Config,
    shutdown_tx: &broadcast::Sender<()>,
    source: S,
) -> Result<(), BoxError> {
    let session = Session::create(&config.session_dir, Local::now())?;
    let (publisher, reader) = attention_channel();

    let feed = DashboardFeed::new(reader, &config.pipeline).into_stream(shutdown_tx.subscribe());
    let dashboard = tokio::spawn(async move {
        futures::pin_mut!(feed);
        while let Some(frame) = feed.next().await {
            tracing::info!(target: "dashboard", "{}", frame.render_bars());
        }
    });

    let outcome = SamplingLoop::new(&config.pipeline, publisher)
        .spawn(source, session, shutdown_tx.subscribe())
        .await;
    // 数据源耗尽或出错时也要停止仪表盘
    let _ = shutdown_tx.send(());
    if let Err(e) = dashboard.await {
        tracing::warn!(error = %e, "Dashboard task ended abnormally");
    }
    let SamplingOutcome { session, summary } = outcome??;
    tracing::info!(
        session = %session.name,
        rows = summary.rows_persisted,
        blinks = summary.blink_count,
        "Session finished"
    );

    let artifacts = report(config, session.log_path.clone()).await?;
    if config.delivery.enabled {
        let uploader = uploader_from_config(&config.delivery);
        spawn_delivery(uploader, session, artifacts, config.delivery.clone()).await?;
    }
    Ok(())
}

async fn report(config: &Config, log_path: PathBuf) -> Result<analytics::ReportArtifacts, BoxError> {
    let analytics_cfg = config.analytics;
    let scorer = config.pipeline.scorer;
    let artifacts = tokio::task::spawn_blocking(move || {
        let session = ClosedSession::from_log_path(log_path)?;
        analytics::generate(&session, &analytics_cfg, &scorer)
            .map_err(|e| Box::new(e) as BoxError)
    })
    .await??;
    println!("report:  {}", artifacts.report_path.display());
    println!("hotspot: {}", artifacts.hotspot_path.display());
    Ok(artifacts)
}

fn delivery_context(config: &Config) -> DeliveryContext {
    DeliveryContext {
        session_dir: PathBuf::from(&config.session_dir),
        analytics: config.analytics,
        scorer: config.pipeline.scorer,
        delivery: config.delivery.clone(),
        uploader: uploader_from_config(&config.delivery),
    }
}

async fn deliver(config: &Config, shutdown_tx: &broadcast::Sender<()>) -> Result<(), BoxError> {
    DeliveryScheduler::new(delivery_context(config), shutdown_tx.subscribe())?
        .start()
        .await?;
    Ok(())
}

/// One immediate delivery of the newest session, outside the daily schedule.
async fn deliver_now(config: &Config) -> Result<(), BoxError> {
    match delivery_context(config).deliver_newest().await? {
        Some(session) => println!("delivered: {}", session.name),
        None => println!("no session log in {}", config.session_dir),
    }
    Ok(())
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
