mod common;

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use common::*;
use security_sentinel::alerts::{AlertEmitter, AlertKind, AlertLog};
use security_sentinel::config::{FeatureConfig, Thresholds};
use security_sentinel::detection::{Detection, TrackerConfig};
use security_sentinel::input::FrameSource;
use security_sentinel::pipeline::{
    DetectionLoop, LatestFrame, LoopConfig, LoopState, SessionContext, StopHandle,
};
use security_sentinel::SentinelError;

struct Harness {
    opener: ScriptedOpener,
    notifier: RecordingNotifier,
    clock: ManualClock,
    detector_calls: std::sync::Arc<std::sync::atomic::AtomicU32>,
    lp: DetectionLoop,
}

fn harness(uri: &str, opener: ScriptedOpener, detector: ScriptedDetector, config: LoopConfig) -> Harness {
    let notifier = RecordingNotifier::default();
    let clock = ManualClock::new(hm(23, 30));
    let detector_calls = detector.calls.clone();

    let source = FrameSource::new(source_config(uri), Box::new(opener.clone()));
    let session = SessionContext::new(
        FeatureConfig::parse_codes("3").unwrap(),
        None,
        &Thresholds::default(),
        TrackerConfig::default(),
    );
    let emitter = AlertEmitter::new(AlertLog::new(10)).with_notifier(Box::new(notifier.clone()));
    let lp = DetectionLoop::new(source, Box::new(detector), session, emitter, config)
        .with_clock(Box::new(clock.clone()));

    Harness {
        opener,
        notifier,
        clock,
        detector_calls,
        lp,
    }
}

fn every(frame_skip: u32) -> LoopConfig {
    LoopConfig {
        frame_skip,
        ..LoopConfig::default()
    }
}

fn intruder() -> Detection {
    Detection::person(10.0, 5.0, 30.0, 30.0)
}

#[test]
fn frame_skip_detects_every_second_frame() {
    let mut h = harness(
        "rtsp://cam/1",
        ScriptedOpener::new(&[], true),
        ScriptedDetector::always(vec![intruder()]),
        every(2),
    );
    h.lp.start().unwrap();
    let latest = h.lp.latest();

    let mut states = Vec::new();
    for _ in 0..6 {
        let report = h.lp.step().unwrap();
        states.push(report.state);
        if report.state == LoopState::IdleSkipped {
            // 跳过的帧原样发布
            let frame = latest.snapshot().unwrap();
            assert_eq!(frame.index, report.frame_index.unwrap());
            assert!(frame.image.pixels().all(|p| *p == GREY));
        }
    }

    assert_eq!(
        states,
        vec![
            LoopState::IdleSkipped,
            LoopState::Evaluating,
            LoopState::IdleSkipped,
            LoopState::Evaluating,
            LoopState::IdleSkipped,
            LoopState::Evaluating,
        ]
    );
    assert_eq!(h.detector_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.lp.frames_acquired(), 6);
    assert_eq!(h.lp.frames_detected(), 3);
    assert_eq!(latest.version(), 6);
    // 检测帧带标注
    assert!(latest.snapshot().unwrap().image.pixels().any(|p| *p != GREY));
}

#[test]
fn exhausted_live_source_is_fully_reopened() {
    let mut h = harness(
        "rtsp://cam/1",
        ScriptedOpener::new(&[false, false, false], true),
        ScriptedDetector::always(Vec::new()),
        every(1),
    );
    h.lp.start().unwrap();
    assert_eq!(h.opener.opens(), 1);

    let report = h.lp.step().unwrap();
    assert_eq!(report.state, LoopState::Acquiring);
    assert!(report.reopened);
    // 初次 + 读帧内两次重连 + 编排器一次完整重开
    assert_eq!(h.opener.opens(), 4);
    assert_eq!(h.opener.releases(), 3);

    let report = h.lp.step().unwrap();
    assert_eq!(report.state, LoopState::Evaluating);
    assert_eq!(report.frame_index, Some(0));
}

#[test]
fn file_source_reopens_after_exhaustion_unless_asked_to_stop() {
    let mut h = harness(
        "clip.mp4",
        ScriptedOpener::new(&[true, false, false, false], true),
        ScriptedDetector::always(Vec::new()),
        every(1),
    );
    h.lp.start().unwrap();
    h.lp.step().unwrap();
    let report = h.lp.step().unwrap();
    assert!(report.reopened);
    assert_eq!(h.opener.opens(), 2);

    let mut h = harness(
        "clip.mp4",
        ScriptedOpener::new(&[true, true], false),
        ScriptedDetector::always(Vec::new()),
        LoopConfig {
            frame_skip: 1,
            stop_at_end: true,
            ..LoopConfig::default()
        },
    );
    h.lp.run().unwrap();
    assert_eq!(h.lp.frames_acquired(), 2);
    assert_eq!(h.opener.opens(), 1);
    assert_eq!(h.opener.releases(), 1);
}

#[test]
fn stop_signal_releases_the_capture() {
    let mut h = harness(
        "rtsp://cam/1",
        ScriptedOpener::new(&[], true),
        ScriptedDetector::always(Vec::new()),
        every(1),
    );
    h.lp.start().unwrap();
    h.lp.step().unwrap();

    h.lp.stop_handle().stop();
    let report = h.lp.step().unwrap();
    assert_eq!(report.state, LoopState::Stopping);
    assert_eq!(h.lp.state(), LoopState::Stopping);
    assert!(!h.lp.source().is_open());
    assert_eq!(h.opener.releases(), 1);

    // run 在已停止时立即返回
    h.lp.run().unwrap();
}

#[test]
fn detector_failure_skips_the_cycle() {
    let mut h = harness(
        "rtsp://cam/1",
        ScriptedOpener::new(&[], true),
        ScriptedDetector::new(vec![
            Err(SentinelError::Detect("model crashed".into())),
            Ok(vec![intruder()]),
        ]),
        every(1),
    );
    h.lp.start().unwrap();
    let latest = h.lp.latest();

    let report = h.lp.step().unwrap();
    assert!(report.detect_failed);
    assert_eq!(report.state, LoopState::IdleSkipped);
    assert_eq!(latest.version(), 1);

    let report = h.lp.step().unwrap();
    assert!(!report.detect_failed);
    assert_eq!(report.alerts.len(), 1);
}

#[test]
fn admitted_alerts_reach_the_notifier_once_per_cooldown() {
    let mut h = harness(
        "rtsp://cam/1",
        ScriptedOpener::new(&[], true),
        ScriptedDetector::always(vec![intruder()]),
        every(1),
    );
    h.lp.start().unwrap();

    for _ in 0..5 {
        h.lp.step().unwrap();
        h.clock.advance(Duration::from_secs(1));
    }
    assert_eq!(h.notifier.kinds(), vec![AlertKind::Night]);

    h.clock.advance(Duration::from_secs(60));
    let report = h.lp.step().unwrap();
    assert_eq!(report.alerts.len(), 1);
    assert_eq!(report.alerts[0].message, "Person detected during restricted hours");

    let log = h.lp.emitter().log();
    assert_eq!(log.total(), 2);
    assert_eq!(log.recent(10).len(), 2);
    // 快照已编码为 JPEG 交给通知方
    assert!(h.notifier.delivered.lock().unwrap().iter().all(|d| d.2 > 0));
}

#[test]
fn initial_open_failure_is_fatal() {
    struct Refuse;
    impl security_sentinel::input::CaptureOpener for Refuse {
        fn open(
            &self,
            config: &security_sentinel::input::SourceConfig,
        ) -> security_sentinel::Result<Box<dyn security_sentinel::input::Capture>> {
            Err(SentinelError::open(&config.uri, "connection refused"))
        }
    }

    let source = FrameSource::new(source_config("rtsp://cam/1"), Box::new(Refuse));
    let session = SessionContext::new(
        FeatureConfig::parse_codes("3").unwrap(),
        None,
        &Thresholds::default(),
        TrackerConfig::default(),
    );
    let mut lp = DetectionLoop::new(
        source,
        Box::new(ScriptedDetector::always(Vec::new())),
        session,
        AlertEmitter::new(AlertLog::default()),
        every(1),
    );
    assert!(matches!(lp.run(), Err(SentinelError::Open { .. })));
}

#[test]
fn external_stop_interrupts_backoff_and_releases_the_capture() {
    let opener = ScriptedOpener::new(&[], false);
    let mut config = source_config("rtsp://cam/unreachable");
    config.reconnect_delay = Duration::from_secs(30);

    let stop = StopHandle::new();
    let latest = LatestFrame::new();
    let session = SessionContext::new(
        FeatureConfig::parse_codes("3").unwrap(),
        None,
        &Thresholds::default(),
        TrackerConfig::default(),
    );
    let mut lp = DetectionLoop::new(
        FrameSource::new(config, Box::new(opener.clone())),
        Box::new(ScriptedDetector::always(Vec::new())),
        session,
        AlertEmitter::new(AlertLog::default()),
        every(1),
    )
    .with_stop(stop.clone())
    .with_latest(latest.clone());

    let stopper = {
        let stop = stop.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            stop.stop();
        })
    };

    let started = Instant::now();
    lp.run().unwrap();
    stopper.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(lp.state(), LoopState::Stopping);
    assert!(!lp.source().is_open());
    assert!(opener.opens() >= 1);
    assert_eq!(opener.releases(), opener.opens());
    // 没有读到任何帧
    assert_eq!(latest.version(), 0);
}
