mod common;

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::broadcast;

use common::fixtures::{blinking_subject, session_start};
use focus_monitor::config::PipelineConfig;
use focus_monitor::dashboard::DashboardFeed;
use focus_monitor::frames::{Frame, FrameSource};
use focus_monitor::sampler::SamplingLoop;
use focus_monitor::session::Session;
use focus_monitor::state::attention_channel;

/// Replays frames with a real delay between them, like a camera would.
struct PacedSource {
    frames: std::vec::IntoIter<Frame>,
    delay: Duration,
}

impl FrameSource for PacedSource {
    fn next_frame(&mut self) -> Option<Frame> {
        std::thread::sleep(self.delay);
        self.frames.next()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn it_dashboard_observes_sampler_without_blocking_it() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let session = Session::create(tmp.path(), session_start()).expect("session");
    let config = PipelineConfig {
        dashboard_period: Duration::from_millis(5),
        ..PipelineConfig::default()
    };

    let (publisher, reader) = attention_channel();
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let feed = DashboardFeed::new(reader.clone(), &config).into_stream(shutdown_tx.subscribe());
    let collector = tokio::spawn(async move {
        futures::pin_mut!(feed);
        let mut frames = Vec::new();
        while let Some(frame) = feed.next().await {
            frames.push(frame);
        }
        frames
    });

    let source = PacedSource {
        frames: blinking_subject(10, 4, &[1, 2]).into_iter(),
        delay: Duration::from_millis(2),
    };
    let outcome = SamplingLoop::new(&config, publisher)
        .spawn(source, session, shutdown_tx.subscribe())
        .await
        .expect("join")
        .expect("sampling");

    // 让仪表盘至少再跑一个周期看到最终状态
    tokio::time::sleep(Duration::from_millis(30)).await;
    shutdown_tx.send(()).expect("stop dashboard");
    let frames = tokio::time::timeout(Duration::from_secs(5), collector)
        .await
        .expect("dashboard stops on shutdown")
        .expect("join");

    assert!(!frames.is_empty());
    assert!(frames.windows(2).all(|w| w[0].sequence <= w[1].sequence));
    assert!(frames
        .iter()
        .all(|f| (0.0..=1.0).contains(&f.ear_level) && (0.0..=1.0).contains(&f.speed_level)));

    let last = frames.last().expect("at least one frame");
    assert_eq!(last.blink_count, outcome.summary.blink_count);
    assert_eq!(outcome.summary.blink_count, 2);
    assert_eq!(reader.latest().sequence, outcome.summary.frames_with_face);
}

#[tokio::test]
async fn it_stop_signal_ends_recording_early() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let session = Session::create(tmp.path(), session_start()).expect("session");
    let (publisher, _reader) = attention_channel();
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let source = PacedSource {
        frames: blinking_subject(10, 60, &[]).into_iter(),
        delay: Duration::from_millis(5),
    };
    let handle = SamplingLoop::new(&PipelineConfig::default(), publisher).spawn(
        source,
        session,
        shutdown_tx.subscribe(),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(()).expect("stop");
    let outcome = handle.await.expect("join").expect("sampling");

    assert!(outcome.summary.stopped_by_signal);
    assert!(outcome.summary.frames_seen < 600);
    assert!(outcome.session.log_path.exists());
}
