//! trackstormd - camera tracking daemon
//!
//! Opens the configured camera, runs the detector (and the gesture recogniser
//! when enabled) on worker threads and drives the pan/tilt motors toward the
//! primary target until the camera closes or Ctrl-C is pressed.
//!
//! Motors are simulated: commands are logged, nothing is sent to hardware.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use trackstorm::actuate::CommandLog;
use trackstorm::detect::gesture_recognizer;
use trackstorm::diagnostics::{LogSink, MjpegSink};
use trackstorm::{
    is_device_fault, open_camera, DetectorVariant, EyeController, FrameSource, Motor,
    MotorController, PerceptionWorker, SecondaryActuator, SimulatedEyes, SimulatedMotor,
    Tracker, TrackerConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Track a target with a pan/tilt camera rig")]
struct Args {
    /// Config file (TOML, or JSON by extension).
    #[arg(long, env = "TRACKSTORM_CONFIG")]
    config: Option<PathBuf>,

    /// Camera: stub://name, a device node, or a camera index.
    #[arg(long)]
    camera: Option<String>,

    /// Detector: cascade, marker or onnx.
    #[arg(long)]
    detector: Option<String>,

    /// Horizontal and vertical motor ports, e.g. A,B.
    #[arg(long, value_delimiter = ',', num_args = 2)]
    motor_ports: Option<Vec<String>>,

    /// Distance sensor / eye LED port.
    #[arg(long)]
    distance_port: Option<String>,

    /// Run perception only; no motor commands.
    #[arg(long)]
    disable_controller: bool,

    /// Detector cycles per second (0 = unlimited).
    #[arg(long)]
    detector_rate: Option<f64>,

    /// Gesture cycles per second (0 = unlimited).
    #[arg(long)]
    gesture_rate: Option<f64>,

    /// Accepted tracking updates per second (0 = unlimited).
    #[arg(long)]
    command_rate: Option<f64>,

    /// Write annotated frames as multipart MJPEG to this file.
    #[arg(long)]
    mjpeg_out: Option<PathBuf>,

    /// Seconds between stats log lines.
    #[arg(long, default_value = "5")]
    stats_interval_secs: u64,

    /// Move both motors to the home position before tracking.
    #[arg(long)]
    recenter: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = TrackerConfig::load_from(args.config.as_deref())?;
    apply_args(&mut cfg, &args)?;
    cfg.validate()?;

    let camera = open_camera(&cfg.camera)?;
    let source = FrameSource::new(camera);
    let detector = PerceptionWorker::new(
        DetectorVariant::from_settings(&cfg.detector)?,
        source.reader(),
        cfg.detector.rate,
    );

    let mut tracker = Tracker::new(source, detector).with_sink(Box::new(LogSink::new(
        Duration::from_secs(args.stats_interval_secs.max(1)),
    )));

    if cfg.gesture.enabled {
        let recognizer = gesture_recognizer(&cfg.gesture)?;
        let reader = tracker.source().reader();
        let worker = PerceptionWorker::new(recognizer, reader, cfg.gesture.rate);
        tracker = tracker.with_gesture(worker);
    }

    let commands = CommandLog::new();
    if cfg.controller.enabled {
        let [x_port, y_port] = &cfg.controller.motor_ports;
        let horizontal: Box<dyn Motor> = Box::new(SimulatedMotor::new(x_port, commands.clone()));
        let vertical: Box<dyn Motor> = Box::new(SimulatedMotor::new(y_port, commands.clone()));
        let eyes: Box<dyn SecondaryActuator> = Box::new(SimulatedEyes::new(commands.clone()));
        tracker = tracker
            .with_controller(
                MotorController::new(horizontal, vertical, &cfg.controller),
                cfg.controller.home,
            )
            .with_eyes(EyeController::new(
                eyes,
                format!("eyes {}", cfg.controller.distance_port),
            ));
    } else {
        log::info!("controller disabled: perception only");
    }

    if let Some(path) = &args.mjpeg_out {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        log::info!("writing annotated MJPEG to {}", path.display());
        tracker = tracker.with_sink(Box::new(MjpegSink::new(BufWriter::new(file))));
    }

    let shutdown = tracker.shutdown_handle();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    if args.recenter {
        tracker.start()?;
        tracker.recenter()?;
    }

    log::info!("trackstormd running on {} (Ctrl-C to stop)", cfg.camera.device);
    match tracker.run() {
        Ok(()) => {
            log::info!("trackstormd stopped; {} motor commands issued", commands.len());
            Ok(())
        }
        Err(err) if is_device_fault(&err) => {
            log::error!("hardware fault, stopping: {:#}", err);
            Err(err)
        }
        Err(err) => Err(err),
    }
}

fn apply_args(cfg: &mut TrackerConfig, args: &Args) -> Result<()> {
    if let Some(camera) = &args.camera {
        cfg.camera.device = camera.clone();
    }
    if let Some(detector) = &args.detector {
        cfg.detector.kind = detector.parse()?;
    }
    if let Some(ports) = &args.motor_ports {
        let [x, y]: [String; 2] = ports
            .clone()
            .try_into()
            .map_err(|_| anyhow!("--motor-ports takes exactly two ports"))?;
        cfg.controller.motor_ports = [x, y];
    }
    if let Some(port) = &args.distance_port {
        cfg.controller.distance_port = port.clone();
    }
    if args.disable_controller {
        cfg.controller.enabled = false;
    }
    if let Some(rate) = args.detector_rate {
        cfg.detector.rate = rate;
    }
    if let Some(rate) = args.gesture_rate {
        cfg.gesture.rate = rate;
    }
    if let Some(rate) = args.command_rate {
        cfg.controller.command_rate = rate;
    }
    Ok(())
}
