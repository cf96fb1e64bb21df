mod common;

use eye_metrics::AttentionScorer;
use tokio::sync::broadcast;

use common::fixtures::{blinking_subject, face_at, log_entry, session_start, write_session};
use focus_monitor::analytics::{self, AnalyticsError, ReportPage, PAGE_ORDER};
use focus_monitor::config::{AnalyticsConfig, PipelineConfig};
use focus_monitor::frames::VecFrameSource;
use focus_monitor::sampler::SamplingLoop;
use focus_monitor::session::{read_entries, Session, HEADER};
use focus_monitor::state::attention_channel;

#[test]
fn it_log_round_trips_rows_and_blinks() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let session = Session::create(tmp.path(), session_start()).expect("session");
    let (publisher, reader) = attention_channel();
    let (_stop_tx, stop_rx) = broadcast::channel(1);

    let frames = blinking_subject(10, 12, &[2, 5, 9]);
    let outcome = SamplingLoop::new(&PipelineConfig::default(), publisher)
        .run(VecFrameSource::new(frames), session, stop_rx)
        .expect("run");

    let rows = read_entries(&outcome.session.log_path).expect("read back");
    assert_eq!(rows.len() as u64, outcome.summary.rows_persisted);
    assert_eq!(rows.len() as u64, outcome.session.rows);
    assert_eq!(rows.len(), 11);

    let live = reader.latest().blink_count;
    assert_eq!(live, 3);
    assert_eq!(rows.last().map(|r| r.blink_count), Some(live));
    assert!(rows.windows(2).all(|w| w[0].blink_count <= w[1].blink_count));
    assert!(rows.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn it_replayed_recording_logs_every_second_and_final_blink() {
    let tmp = tempfile::tempdir().expect("tempdir");
    // 回放的帧带着 2024 年的采集时间，会话按当前时间打开
    let session = Session::create(tmp.path(), chrono::Local::now()).expect("session");
    let (publisher, reader) = attention_channel();
    let (_stop_tx, stop_rx) = broadcast::channel(1);

    let frames = blinking_subject(10, 12, &[2, 11]);
    let outcome = SamplingLoop::new(&PipelineConfig::default(), publisher)
        .run(VecFrameSource::new(frames), session, stop_rx)
        .expect("run");

    let rows = read_entries(&outcome.session.log_path).expect("read back");
    assert!(rows.len() >= 11, "only {} rows persisted", rows.len());
    assert_eq!(rows.len() as u64, outcome.summary.rows_persisted);

    let live = reader.latest().blink_count;
    assert_eq!(live, 2);
    assert_eq!(rows.last().map(|r| r.blink_count), Some(live));
    assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn it_scenario_scores_match_reference_points() {
    let (publisher, _reader) = attention_channel();
    let mut sampler = SamplingLoop::new(&PipelineConfig::default(), publisher);
    let t0 = session_start();

    let relaxed = sampler.process_face(&face_at(0.25, 960.0, 540.0), t0);
    assert!((relaxed.score - 1.0).abs() < 1e-9);

    let squint = sampler.process_face(
        &face_at(0.10, 960.0, 540.0),
        t0 + chrono::Duration::seconds(1),
    );
    assert!((squint.score - 0.5).abs() < 1e-9);

    // 一秒内两眼各移动 300 像素
    let darting = sampler.process_face(
        &face_at(0.25, 1260.0, 540.0),
        t0 + chrono::Duration::seconds(2),
    );
    assert!((darting.speeds.average() - 300.0).abs() < 1e-6);
    assert!(darting.score.abs() < 1e-9);
}

#[test]
fn it_report_has_six_ordered_pages_and_files() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let session = Session::create(tmp.path(), session_start()).expect("session");
    let (publisher, _reader) = attention_channel();
    let (_stop_tx, stop_rx) = broadcast::channel(1);
    let outcome = SamplingLoop::new(&PipelineConfig::default(), publisher)
        .run(
            VecFrameSource::new(blinking_subject(10, 8, &[3])),
            session,
            stop_rx,
        )
        .expect("run");

    let scorer = AttentionScorer::default();
    let report = analytics::build_report(&outcome.session, &AnalyticsConfig::default(), &scorer)
        .expect("report");
    let names: Vec<_> = report.pages.iter().map(ReportPage::name).collect();
    assert_eq!(names, PAGE_ORDER);

    let artifacts = analytics::write_report(&report, &outcome.session).expect("write");
    assert!(artifacts.hotspot_path.exists());
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&artifacts.report_path).expect("read"))
            .expect("json");
    assert_eq!(json["session"], outcome.session.name.as_str());
    assert_eq!(json["pages"].as_array().map(Vec::len), Some(6));
    assert_eq!(json["pages"][4]["page"], "cumulative_blinks");
}

#[test]
fn it_report_can_be_regenerated() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let at = session_start().naive_local();
    let session = write_session(tmp.path(), &[log_entry(at, 0.28, 5.0, 0)]);
    let cfg = AnalyticsConfig::default();
    let scorer = AttentionScorer::default();

    let first = analytics::generate(&session, &cfg, &scorer).expect("first");
    let first_json = std::fs::read_to_string(&first.report_path).expect("read");
    let second = analytics::generate(&session, &cfg, &scorer).expect("second");
    let second_json = std::fs::read_to_string(&second.report_path).expect("read");

    assert_eq!(first, second);
    assert_ne!(first_json, second_json, "a fresh report id is issued per run");
}

#[test]
fn it_malformed_log_produces_no_report() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("20241128_210000.csv");
    std::fs::write(
        &path,
        format!(
            "{}\n2024-11-28 21:00:01,1,2,3,4,0,0,0.3,0\n2024-11-28 21:00:02,1,2,x,4,0,0,0.3,0\n",
            HEADER.join(",")
        ),
    )
    .expect("write");

    let session = focus_monitor::session::ClosedSession {
        name: "20241128_210000".into(),
        log_path: path,
        rows: 2,
    };
    let err = analytics::generate(&session, &AnalyticsConfig::default(), &AttentionScorer::default())
        .expect_err("malformed");
    assert!(matches!(err, AnalyticsError::MalformedRow { line: 3, .. }));
    assert!(!session.report_path().exists());
    assert!(!session.hotspot_path().exists());
}
