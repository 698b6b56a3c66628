use std::sync::Mutex;

use tempfile::Builder;

use trackstorm::{DetectorKind, TrackerConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "TRACKSTORM_CONFIG",
        "TRACKSTORM_CAMERA",
        "TRACKSTORM_DETECTOR",
        "TRACKSTORM_DETECTOR_RATE",
        "TRACKSTORM_GESTURE_RATE",
        "TRACKSTORM_COMMAND_RATE",
        "TRACKSTORM_DISABLE_CONTROLLER",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    let json = r#"{
        "camera": { "device": "/dev/video2", "width": 800, "height": 600 },
        "detector": { "kind": "cascade", "rate": 15.0 },
        "controller": {
            "motor_ports": ["C", "D"],
            "command_rate": 5.0,
            "vertical": { "tolerance": 0.3, "speed": 4.0 }
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("TRACKSTORM_CONFIG", file.path());
    std::env::set_var("TRACKSTORM_DETECTOR_RATE", "12.5");
    std::env::set_var("TRACKSTORM_DISABLE_CONTROLLER", "true");

    let cfg = TrackerConfig::load().expect("load config");
    assert_eq!(cfg.camera.device, "/dev/video2");
    assert_eq!((cfg.camera.width, cfg.camera.height), (800, 600));
    assert_eq!(cfg.detector.kind, DetectorKind::Cascade);
    assert_eq!(cfg.detector.rate, 12.5);
    assert_eq!(cfg.controller.motor_ports, ["C".to_string(), "D".to_string()]);
    assert_eq!(cfg.controller.command_rate, 5.0);
    assert_eq!(cfg.controller.vertical.tolerance, 0.3);
    assert_eq!(cfg.controller.vertical.speed, 4.0);
    assert_eq!(cfg.controller.horizontal.speed, 12.0);
    assert!(!cfg.controller.enabled);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
        [camera]
        device = "stub://bench"

        [detector]
        kind = "marker"
        marker_color = [0, 255, 0]

        [controller]
        distance_port = "D"
        home = [45, 10]
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = TrackerConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.camera.device, "stub://bench");
    assert_eq!(cfg.detector.marker_color, [0, 255, 0]);
    assert_eq!(cfg.controller.distance_port, "D");
    assert_eq!(cfg.controller.home, (45, 10));
    assert!(cfg.controller.enabled);
}

#[test]
fn env_without_file_uses_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("TRACKSTORM_CAMERA", "1");
    std::env::set_var("TRACKSTORM_DETECTOR", "haar");
    std::env::set_var("TRACKSTORM_COMMAND_RATE", "10");

    let cfg = TrackerConfig::load().expect("load config");
    assert_eq!(cfg.camera.device, "1");
    assert_eq!(cfg.detector.kind, DetectorKind::Cascade);
    assert_eq!(cfg.controller.command_rate, 10.0);
    assert_eq!(cfg.detector.rate, 30.0);

    clear_env();
}

#[test]
fn rejects_bad_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("TRACKSTORM_DETECTOR", "yolo");
    assert!(TrackerConfig::load().is_err());
    clear_env();

    std::env::set_var("TRACKSTORM_DETECTOR_RATE", "fast");
    assert!(TrackerConfig::load().is_err());
    clear_env();

    std::env::set_var("TRACKSTORM_DISABLE_CONTROLLER", "maybe");
    assert!(TrackerConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_invalid_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    std::io::Write::write_all(&mut file, b"[camera]\nwidth = 0\n").expect("write config");
    assert!(TrackerConfig::load_from(Some(file.path())).is_err());

    let missing = file.path().with_extension("missing");
    assert!(TrackerConfig::load_from(Some(&missing)).is_err());
}
