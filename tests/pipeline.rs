use std::time::{Duration, Instant};

use trackstorm::actuate::{Command, CommandLog};
use trackstorm::detect::backends::MarkerDetector;
use trackstorm::ingest::{MarkerMotion, SyntheticCamera, SyntheticConfig};
use trackstorm::{
    is_device_fault, open_camera, AxisState, DetectorVariant, FrameSource, IterationOutcome,
    Motor, MotorController, PerceptionWorker, SimulatedMotor, Tracker, TrackerConfig,
};

fn camera(motion: MarkerMotion, frame_limit: Option<u64>) -> FrameSource {
    FrameSource::new(Box::new(SyntheticCamera::new(SyntheticConfig {
        name: "stub://pipeline".to_string(),
        width: 320,
        height: 240,
        fps: 60,
        marker_size: 24,
        motion,
        frame_limit,
        ..SyntheticConfig::default()
    })))
}

fn tracker_with(source: FrameSource, horizontal: SimulatedMotor, vertical: SimulatedMotor) -> Tracker {
    let detector = PerceptionWorker::new(
        DetectorVariant::Marker(MarkerDetector::new([255, 0, 0])),
        source.reader(),
        0.0,
    );
    let settings = TrackerConfig::default().controller;
    let horizontal: Box<dyn Motor> = Box::new(horizontal);
    let vertical: Box<dyn Motor> = Box::new(vertical);
    Tracker::new(source, detector).with_controller(
        MotorController::new(horizontal, vertical, &settings),
        (0, 0),
    )
}

#[test]
fn marker_bottom_right_drives_both_axes_positive() {
    let log = CommandLog::new();
    let mut tracker = tracker_with(
        camera(MarkerMotion::Fixed { x: 280, y: 210 }, None),
        SimulatedMotor::new("A", log.clone()),
        SimulatedMotor::new("B", log.clone()),
    );
    tracker.start().expect("start tracker");

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut states = (AxisState::Stop, AxisState::Stop);
    while Instant::now() < deadline {
        if let IterationOutcome::Tracked { .. } = tracker.run_iteration().expect("iteration") {
            states = tracker.controller().map(|c| c.states()).unwrap_or(states);
            if states == (AxisState::Positive, AxisState::Positive) {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    tracker.shutdown();

    assert_eq!(states, (AxisState::Positive, AxisState::Positive));
    // One command per axis despite many tracked frames.
    assert_eq!(
        log.for_port("A"),
        vec![Command::Duty {
            port: "A".to_string(),
            duty: 0.12
        }]
    );
    assert_eq!(
        log.for_port("B"),
        vec![Command::Duty {
            port: "B".to_string(),
            duty: 0.03
        }]
    );
}

#[test]
fn lost_target_stops_each_axis_once() {
    let log = CommandLog::new();
    let mut tracker = tracker_with(
        camera(
            MarkerMotion::Vanishing {
                x: 280,
                y: 210,
                after_frames: 90,
            },
            None,
        ),
        SimulatedMotor::new("A", log.clone()),
        SimulatedMotor::new("B", log.clone()),
    );
    tracker.start().expect("start tracker");

    let deadline = Instant::now() + Duration::from_secs(10);
    let states = |tracker: &Tracker| tracker.controller().map(|c| c.states());
    while Instant::now() < deadline
        && states(&tracker) != Some((AxisState::Positive, AxisState::Positive))
    {
        tracker.run_iteration().expect("iteration");
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(
        states(&tracker),
        Some((AxisState::Positive, AxisState::Positive))
    );

    let mut lost = false;
    while Instant::now() < deadline && !lost {
        lost = tracker.run_iteration().expect("iteration") == IterationOutcome::NoTarget;
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(lost, "marker never vanished");
    assert_eq!(states(&tracker), Some((AxisState::Stop, AxisState::Stop)));

    // Further empty frames stop nothing new.
    let mut empty = 0;
    while Instant::now() < deadline && empty < 10 {
        if tracker.run_iteration().expect("iteration") == IterationOutcome::NoTarget {
            empty += 1;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    let issued: Vec<_> = ["A", "B"].iter().map(|port| log.for_port(port)).collect();
    tracker.shutdown();

    assert_eq!(empty, 10);
    for (commands, (port, duty)) in issued.into_iter().zip([("A", 0.12), ("B", 0.03)]) {
        assert_eq!(
            commands,
            vec![
                Command::Duty {
                    port: port.to_string(),
                    duty
                },
                Command::Duty {
                    port: port.to_string(),
                    duty: 0.0
                },
            ]
        );
    }
}

#[test]
fn camera_failure_ends_the_loop_cleanly() {
    let log = CommandLog::new();
    let mut tracker = tracker_with(
        camera(MarkerMotion::Fixed { x: 20, y: 120 }, Some(30)),
        SimulatedMotor::new("A", log.clone()),
        SimulatedMotor::new("B", log.clone()),
    );

    let started = Instant::now();
    tracker.run().expect("clean shutdown when the camera closes");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!tracker.source().is_open());

    // Whatever was tracked, the motors end stopped.
    let states = tracker.controller().map(|c| c.states());
    assert_eq!(states, Some((AxisState::Stop, AxisState::Stop)));
}

#[test]
fn unresponsive_motor_is_fatal() {
    let log = CommandLog::new();
    let mut tracker = tracker_with(
        camera(MarkerMotion::Fixed { x: 20, y: 120 }, None),
        SimulatedMotor::new("A", log.clone()).failing_after(0),
        SimulatedMotor::new("B", log.clone()),
    );

    let err = tracker.run().expect_err("motor fault must end the loop");
    assert!(is_device_fault(&err), "unexpected error: {err:#}");
    assert!(!tracker.source().is_open());
}

#[test]
fn stub_devices_open_through_config() {
    let mut cfg = TrackerConfig::default();
    cfg.camera.device = "stub://bench".to_string();
    cfg.camera.width = 160;
    cfg.camera.height = 120;

    let mut source = FrameSource::new(open_camera(&cfg.camera).expect("open stub camera"));
    assert_eq!(source.size(), (160, 120));
    source.open().expect("open source");

    let deadline = Instant::now() + Duration::from_secs(5);
    while source.read().is_none() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    let frame = source.read().expect("frame from stub camera");
    assert_eq!(frame.size(), (160, 120));
    source.close();
}
