use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use picker_proto::report::{PickReport, SessionOutcome, SessionReport};
use picker_proto::{DetectedTarget, RobotCoordinate};

use picker_calib::{doctor as calib_doctor, CalibrationConfig, CalibrationModel, CoordinateMapper};

use picker_arm::sim::{self, SimBehavior};
use picker_arm::{doctor as arm_doctor, ArmCommand, ArmConfig, CommandChannel, PickOutcome, PickSequencer};
use picker_arm::{SessionAborted, SessionSummary};

use picker_vision::camera::CameraConfig;
use picker_vision::display::{self, DisplayConfig};
use picker_vision::{doctor as vision_doctor, BlobDetector, VisionConfig};

#[derive(Debug, Parser)]
#[command(name = "picker", version, about = "apple-picker - camera-guided pick and place for a desktop arm")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config and fit both calibration axes.
    Doctor,
    /// Print the fitted calibration lines; with a pixel, also where the arm would go.
    Calib {
        #[arg(long, requires = "pixel_y")]
        pixel_x: Option<i32>,
        #[arg(long, requires = "pixel_x")]
        pixel_y: Option<i32>,
    },
    /// Grab one frame (or read --image) and list the apples found.
    Detect {
        #[arg(long)]
        image: Option<String>,
    },
    /// Prepare the arm, capture, and pick every apple once.
    Run {
        /// Talk to an in-process simulated arm instead of the serial port.
        #[arg(long)]
        dry_run: bool,
        /// Write a JSON session report here.
        #[arg(long)]
        report: Option<String>,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    arm: ArmConfig,
    #[serde(default)]
    calibration: CalibrationConfig,
    #[serde(default)]
    camera: CameraConfig,
    #[serde(default)]
    vision: VisionConfig,
    #[serde(default)]
    display: DisplayConfig,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Calib { pixel_x, pixel_y } => calib(&cfg, pixel_x.zip(pixel_y))?,
        Command::Detect { image } => detect(&cfg, image).await?,
        Command::Run { dry_run, report } => run(&cfg, dry_run, report.as_deref()).await?,
    }
    Ok(())
}

/// Config checks shared by `doctor` and `run`. Anything rejected here never reaches the arm.
fn validate(cfg: &Config) -> Result<()> {
    calib_doctor::check_calibration(&cfg.calibration)?;
    arm_doctor::check_arm(&cfg.arm)?;
    vision_doctor::check_camera(&cfg.camera)?;
    vision_doctor::check_vision(&cfg.vision, &cfg.camera)?;
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    validate(cfg)?;

    if cfg.display.enable {
        info!("doctor: display frames go to {}", cfg.display.output_path);
    }

    info!("doctor: OK");
    Ok(())
}

fn calib(cfg: &Config, pixel: Option<(i32, i32)>) -> Result<()> {
    let c = &cfg.calibration;
    for (name, axis) in [("x", &c.x), ("z", &c.z)] {
        let samples = axis.samples().with_context(|| format!("calibration.{}", name))?;
        let model = CalibrationModel::fit(&samples).with_context(|| format!("calibration.{}", name))?;
        println!(
            "{}: robot = {:.6} * camera + {:.4}  (n={} rms={:.3}mm)",
            name, model.slope, model.intercept, samples.len(), model.rms_error(&samples)
        );
    }
    println!("offsets: x={} z={}  approach y={}", c.offset_x, c.offset_z, c.approach_y);

    if let Some((px, py)) = pixel {
        let mapper = c.build_mapper().context("calibration")?;
        let p = mapper.map(DetectedTarget::new(px, py));
        println!("pixel ({}, {}) -> {}", px, py, ArmCommand::MoveTo(p));
    }
    Ok(())
}

async fn detect(cfg: &Config, image: Option<String>) -> Result<()> {
    let camera = match image {
        Some(path) => CameraConfig { mode: "file".into(), path: Some(path), ..cfg.camera.clone() },
        None => cfg.camera.clone(),
    };
    let mapper = cfg.calibration.build_mapper().context("calibration")?;

    let mut detector = BlobDetector::new(cfg.vision.clone());
    let capture = picker_vision::scan(&camera, &mut detector, 1).await?;

    if capture.blobs.is_empty() {
        println!("no apples in roi {:?}", cfg.vision.roi);
    }
    for (i, b) in capture.blobs.iter().enumerate() {
        let p = mapper.map(b.target());
        println!(
            "apple {}: centre=({}, {}) box={}x{}+{}+{} pixels={} -> {}",
            i + 1, b.cx, b.cy, b.rect.w, b.rect.h, b.rect.x, b.rect.y, b.pixels, ArmCommand::MoveTo(p)
        );
    }

    if cfg.display.enable {
        display::show(&capture.frame, &cfg.display, &capture.blobs)?;
    }
    Ok(())
}

/// What one `run` got through before it returned.
struct Session {
    capture_attempts: u32,
    detected: Vec<DetectedTarget>,
    targets: Vec<RobotCoordinate>,
    result: Result<SessionSummary, SessionAborted>,
}

async fn run(cfg: &Config, dry_run: bool, report: Option<&str>) -> Result<()> {
    info!("run: starting{}", if dry_run { " (dry run)" } else { "" });
    let started = now_unix_ms();

    // a bad config must stop us before the link is opened
    validate(cfg).context("config")?;
    let mapper = cfg.calibration.build_mapper().context("calibration")?;
    let seq = PickSequencer::new(cfg.arm.motion.clone());

    let outcome = if dry_run {
        let (io, arm) = sim::spawn(SimBehavior::AckAll);
        let mut ch = CommandChannel::new(io, cfg.arm.ack);
        let outcome = session(cfg, &mapper, &seq, &mut ch).await;
        drop(ch);
        let lines = arm.await.context("simulated arm task")?;
        info!("dry run: simulated arm received {} commands", lines.len());
        outcome
    } else {
        let mut ch = CommandChannel::open(&cfg.arm.serial_dev, cfg.arm.baud, cfg.arm.ack).context("open arm")?;
        session(cfg, &mapper, &seq, &mut ch).await
    };

    let session_report = build_report(&outcome, started, dry_run);
    if let Some(path) = report {
        write_report(path, &session_report)?;
    }

    match outcome?.result {
        Ok(summary) => {
            info!("run: picked {} apples, {} ack timeouts", summary.picks.len(), summary.ack_timeouts());
            Ok(())
        }
        Err(aborted) => Err(anyhow::Error::new(aborted)),
    }
}

async fn session<T>(
    cfg: &Config,
    mapper: &CoordinateMapper,
    seq: &PickSequencer,
    ch: &mut CommandChannel<T>,
) -> Result<Session>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    seq.prepare(ch).await.context("prepare arm")?;

    let mut detector = BlobDetector::new(cfg.vision.clone());
    let capture = picker_vision::scan(&cfg.camera, &mut detector, cfg.vision.max_capture_attempts).await?;
    if cfg.display.enable {
        if let Err(e) = display::show(&capture.frame, &cfg.display, &capture.blobs) {
            warn!("display failed: {:#}", e);
        }
    }

    let detected = capture.targets();
    for (i, d) in detected.iter().enumerate() {
        info!("Apple {}: detected at ({}, {})", i + 1, d.pixel_x, d.pixel_y);
    }
    let targets = mapper.transform(&detected);
    let result = seq.run(&targets, ch).await;

    Ok(Session { capture_attempts: capture.attempts, detected, targets, result })
}

fn build_report(outcome: &Result<Session>, started_unix_ms: i64, dry_run: bool) -> SessionReport {
    let finished_unix_ms = now_unix_ms();
    let s = match outcome {
        Ok(s) => s,
        Err(e) => {
            return SessionReport {
                started_unix_ms,
                finished_unix_ms,
                dry_run,
                capture_attempts: 0,
                picks: Vec::new(),
                returned_home: false,
                outcome: SessionOutcome::Aborted,
                error: Some(format!("{:#}", e)),
            }
        }
    };

    let (summary, error) = match &s.result {
        Ok(summary) => (summary, None),
        Err(aborted) => (&aborted.summary, Some(format!("{}: {}", aborted, aborted.source))),
    };

    let picks = s
        .detected
        .iter()
        .zip(&s.targets)
        .enumerate()
        .map(|(index, (detected, target))| {
            let done = summary.picks.get(index);
            PickReport {
                index,
                detected: *detected,
                target: *target,
                ack_timeouts: done.map(PickOutcome::ack_timeouts).unwrap_or(0),
                completed: done.is_some(),
            }
        })
        .collect();

    SessionReport {
        started_unix_ms,
        finished_unix_ms,
        dry_run,
        capture_attempts: s.capture_attempts,
        picks,
        returned_home: summary.home.is_some(),
        outcome: if error.is_none() { SessionOutcome::Completed } else { SessionOutcome::Aborted },
        error,
    }
}

fn write_report(path: &str, report: &SessionReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("encode session report")?;
    std::fs::write(path, json).with_context(|| format!("write session report {}", path))?;
    info!("run: report written to {}", path);
    Ok(())
}

fn now_unix_ms() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp_nanos() as i64 / 1_000_000
}
