use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rollcall_chat::{ChatConfig, ChatSession, GeminiProvider};
use rollcall_core::{
    enroll, recognize, spawn_writer, AttendanceLog, Config, EnrollOptions, FaceAnalyzer,
    FrameSource, IdentityStore, RecognizeError, RecognizeOptions, Session,
};
use rollcall_hw::{Camera, ReplaySource};
use rollcall_onnx::OnnxAnalyzer;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rollcall", about = "Face enrollment and attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture face samples for a new or existing identity
    Enroll {
        /// Display name of the person (e.g., "Asha Rao")
        name: String,
        /// Read frames from a directory of images instead of the camera
        #[arg(long, value_name = "DIR")]
        replay: Option<PathBuf>,
        /// Number of samples to save
        #[arg(short, long)]
        count: Option<usize>,
    },
    /// Recognize faces and mark attendance until interrupted
    Recognize {
        /// Read frames from a directory of images instead of the camera
        #[arg(long, value_name = "DIR")]
        replay: Option<PathBuf>,
        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<usize>,
        /// Write annotated frames into this directory
        #[arg(long, value_name = "DIR")]
        annotate_dir: Option<PathBuf>,
    },
    /// Print the attendance log
    Attendance,
    /// List enrolled identities
    Identities,
    /// List V4L2 capture devices
    Devices,
    /// Chat with the Aushadi Veda assistant
    Chat,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Enroll { name, replay, count } => run_enroll(&config, &name, replay.as_deref(), count),
        Commands::Recognize {
            replay,
            max_frames,
            annotate_dir,
        } => run_recognize(&config, replay.as_deref(), max_frames, annotate_dir.as_deref()),
        Commands::Attendance => {
            let records = AttendanceLog::new(config.attendance_log()).view()?;
            if records.is_empty() {
                println!("No attendance recorded");
            }
            for r in records {
                println!("{:<24} {} {}", r.name, r.date.format("%Y-%m-%d"), r.time.format("%H:%M:%S"));
            }
            Ok(())
        }
        Commands::Identities => {
            let identities = IdentityStore::new(config.identity_root()).identities()?;
            if identities.is_empty() {
                println!("No identities enrolled");
            }
            for id in identities {
                println!("{:<24} {} sample(s)", id.name, id.samples);
            }
            Ok(())
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
            Ok(())
        }
        Commands::Chat => run_chat(&config),
    }
}

/// Cancel `session` on Ctrl-C. The flows themselves stay synchronous; only
/// this watcher thread runs a runtime.
fn install_ctrlc(session: &Session) {
    let token = session.token();
    let spawned = std::thread::Builder::new()
        .name("rollcall-signal".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::warn!(error = %e, "signal handler unavailable");
                    return;
                }
            };
            if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                tracing::info!("interrupt received, stopping");
                token.cancel();
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "failed to spawn signal thread");
    }
}

fn open_source(config: &Config, replay: Option<&Path>) -> Box<dyn FrameSource> {
    match replay {
        Some(dir) => Box::new(ReplaySource::new(dir)),
        None => Box::new(Camera::new(config.camera_device.clone()).with_read_timeout(config.read_timeout())),
    }
}

fn run_enroll(config: &Config, name: &str, replay: Option<&Path>, count: Option<usize>) -> Result<()> {
    let mut analyzer = OnnxAnalyzer::load(&config.model_dir)?;
    let store = IdentityStore::new(config.identity_root());
    let mut source = open_source(config, replay);
    let options = EnrollOptions {
        target: count.unwrap_or(config.enroll_target),
        max_read_failures: config.max_read_failures,
    };

    let mut session = Session::new();
    install_ctrlc(&session);

    println!("Enrolling {name}; look at the camera (Ctrl-C to stop)");
    let outcome = enroll(&mut session, name, &mut *source, &mut analyzer, &store, &options)?;

    println!("Saved {} sample(s) for {}", outcome.saved, outcome.key);
    if outcome.saved == 0 {
        bail!("no face was captured for {name}");
    }
    if outcome.saved < options.target && !outcome.cancelled {
        println!("Source ended after {} of {} samples", outcome.saved, options.target);
    }
    Ok(())
}

fn run_recognize(
    config: &Config,
    replay: Option<&Path>,
    max_frames: Option<usize>,
    annotate_dir: Option<&Path>,
) -> Result<()> {
    let mut analyzer = OnnxAnalyzer::load(&config.model_dir)?;
    let report = IdentityStore::new(config.identity_root()).load(&mut analyzer)?;
    if !report.warnings.is_empty() {
        println!("Skipped {} unusable sample(s)", report.warnings.len());
    }
    if report.gallery.is_empty() {
        println!("No identities enrolled; every face will be reported as unknown");
    }

    if let Some(dir) = annotate_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let log = spawn_writer(AttendanceLog::new(config.attendance_log()))?;
    // Refuse to start against a log that cannot be appended to.
    log.view()?;
    let mut source = open_source(config, replay);
    let options = RecognizeOptions {
        downscale: config.downscale,
        tolerance: config.match_tolerance.unwrap_or_else(|| analyzer.default_tolerance()),
        max_read_failures: config.max_read_failures,
    };

    let mut session = Session::new();
    install_ctrlc(&session);

    let run = recognize(&mut session, &mut *source, &mut analyzer, &report.gallery, &log, options)?;
    let mut frames = 0usize;
    for item in run.take(max_frames.unwrap_or(usize::MAX)) {
        let mut frame = match item {
            Ok(frame) => frame,
            Err(e @ RecognizeError::Source(_)) => return Err(e.into()),
            Err(e) => {
                eprintln!("warning: frame skipped: {e}");
                continue;
            }
        };
        frames += 1;

        for record in &frame.recorded {
            println!("{} marked present at {}", record.name, record.time.format("%H:%M:%S"));
        }
        if let Some(dir) = annotate_dir {
            let path = dir.join(format!("frame_{:05}.png", frame.frame.sequence));
            rollcall_core::annotate(&frame)
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        if let Some(e) = frame.log_error.take() {
            return Err(anyhow::Error::new(e).context("attendance log refused a write; recognition stopped"));
        }
    }

    println!("Processed {frames} frame(s)");
    Ok(())
}

fn run_chat(config: &Config) -> Result<()> {
    let Some(key) = config.chat.api_key.as_deref() else {
        bail!("GEMINI_API_KEY is not set");
    };
    let provider = GeminiProvider::new(key)?
        .with_model(config.chat.model.clone())
        .with_base_url(config.chat.base_url.clone());
    let mut chat = ChatSession::new(provider, ChatConfig::default());
    let runtime = tokio::runtime::Runtime::new()?;

    println!("Aushadi Veda ({}). Empty line or Ctrl-D to quit.", config.chat.model);
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }
        match runtime.block_on(chat.send(&line)) {
            Ok(reply) => println!("{reply}"),
            Err(e) => eprintln!("error: {e} (try again)"),
        }
    }
    Ok(())
}
