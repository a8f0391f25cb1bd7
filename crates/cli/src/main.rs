use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use facecam_core::capture::infrastructure::ffmpeg_camera::FfmpegCamera;
use facecam_core::detection::domain::model_kind::ModelKind;
use facecam_core::detection::infrastructure::onnx_model_loader::OnnxModelLoader;
use facecam_core::overlay::domain::canvas::Canvas;
use facecam_core::overlay::infrastructure::image_canvas::{composite, ImageCanvas, SharedOverlay};
use facecam_core::session::session_config::SessionConfig;
use facecam_core::session::session_view::LogSessionView;
use facecam_core::session::viewer_session::Session;

/// Live face analysis on the system camera.
///
/// Reads commands from stdin: start, stop, snapshot <file.png>, status, quit.
#[derive(Parser)]
#[command(name = "facecam")]
struct Cli {
    /// JSON configuration file. Defaults to the user config file if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing the <model>.onnx files.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Base URL to download missing models from.
    #[arg(long)]
    model_url: Option<String>,

    /// Capture device (e.g. /dev/video0 on Linux, 0 on macOS,
    /// "video=<name>" on Windows).
    #[arg(long)]
    device: Option<String>,

    /// Preferred capture width.
    #[arg(long)]
    width: Option<u32>,

    /// Preferred capture height.
    #[arg(long)]
    height: Option<u32>,

    /// Detection interval in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Face detection score threshold (0.0-1.0).
    #[arg(long)]
    score_threshold: Option<f64>,

    /// Face detector input size (multiple of 32).
    #[arg(long)]
    input_size: Option<u32>,

    /// Start the camera as soon as the models are loaded.
    #[arg(long)]
    autostart: bool,
}

#[derive(Debug, PartialEq)]
enum Command {
    Start,
    Stop,
    Snapshot(PathBuf),
    Status,
    Help,
    Quit,
    Empty,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    config.validate()?;
    log::info!(
        "Capture {}x{}, detection every {}ms",
        config.width,
        config.height,
        config.interval_ms
    );

    let loader = OnnxModelLoader::new(
        config.model_dir.clone(),
        config.model_url.clone(),
        config.analyzer_options(),
    )
    .with_progress(Arc::new(download_progress));

    let overlay = SharedOverlay::new();
    let canvas_overlay = overlay.clone();
    let view = Arc::new(LogSessionView::default());

    let mut session = Session::new(
        config,
        Box::new(loader),
        Box::new(FfmpegCamera::new()),
        Box::new(move || Box::new(ImageCanvas::new(canvas_overlay.clone())) as Box<dyn Canvas>),
        view.clone(),
    );

    // A load failure stays on the status line and keeps `start` refused.
    if let Err(e) = session.init() {
        log::error!("Model loading failed: {e}");
    }
    println!("{}", session.status());

    if cli.autostart {
        // Failures are already reported through the status line.
        let _ = session.start();
        println!("{}", session.status());
    }

    print_help();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let command = parse_command(&line);
        log::debug!("Command: {command:?}");
        match command {
            Ok(Command::Start) => {
                let _ = session.start();
                println!("{}", session.status());
            }
            Ok(Command::Stop) => {
                session.stop();
                println!("{}", session.status());
            }
            Ok(Command::Snapshot(path)) => match save_snapshot(&session, &overlay, &path) {
                Ok(()) => println!("Snapshot written to {}", path.display()),
                Err(e) => eprintln!("Snapshot failed: {e}"),
            },
            Ok(Command::Status) => print_status(&session, &view),
            Ok(Command::Help) => print_help(),
            Ok(Command::Quit) => break,
            Ok(Command::Empty) => {}
            Err(msg) => eprintln!("{msg}"),
        }
    }

    session.stop();
    log::info!("Session closed");
    Ok(())
}

/// File values first, then any flags given on the command line.
fn build_config(cli: &Cli) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::load_default()?,
    };

    if let Some(dir) = &cli.model_dir {
        config.model_dir = Some(dir.clone());
    }
    if let Some(url) = &cli.model_url {
        config.model_url = Some(url.clone());
    }
    if let Some(device) = &cli.device {
        config.device = Some(device.clone());
    }
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }
    if let Some(interval) = cli.interval_ms {
        config.interval_ms = interval;
    }
    if let Some(threshold) = cli.score_threshold {
        config.score_threshold = threshold;
    }
    if let Some(size) = cli.input_size {
        config.input_size = size;
    }
    Ok(config)
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(Command::Empty);
    };
    let command = match word.to_lowercase().as_str() {
        "start" => Command::Start,
        "stop" => Command::Stop,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "snapshot" => {
            let path = parts
                .next()
                .ok_or("Usage: snapshot <file.png>")?;
            Command::Snapshot(PathBuf::from(path))
        }
        other => return Err(format!("Unknown command '{other}'. Type 'help' for commands.")),
    };
    Ok(command)
}

fn save_snapshot(
    session: &Session,
    overlay: &SharedOverlay,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let frame = session
        .surface()
        .latest()
        .ok_or("No video frame available, start the camera first")?;
    let image = composite(&frame, overlay.latest().as_ref());
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

fn print_status(session: &Session, view: &LogSessionView) {
    let (start_enabled, stop_enabled) = view.controls_state();
    println!("{}", session.status());
    println!("{}", view.last_counters());
    println!(
        "start: {}  stop: {}",
        if start_enabled { "enabled" } else { "disabled" },
        if stop_enabled { "enabled" } else { "disabled" }
    );
}

fn print_help() {
    println!("Commands: start | stop | snapshot <file.png> | status | help | quit");
}

fn download_progress(model: ModelKind, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {model} model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {model} model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("start"), Ok(Command::Start));
        assert_eq!(parse_command("  STOP "), Ok(Command::Stop));
        assert_eq!(parse_command(""), Ok(Command::Empty));
        assert_eq!(parse_command("exit"), Ok(Command::Quit));
        assert_eq!(
            parse_command("snapshot out/frame.png"),
            Ok(Command::Snapshot(PathBuf::from("out/frame.png")))
        );
    }

    #[test]
    fn test_snapshot_requires_path() {
        assert!(parse_command("snapshot").is_err());
    }

    #[test]
    fn test_unknown_command() {
        let err = parse_command("dance").unwrap_err();
        assert!(err.contains("dance"));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::parse_from(["facecam", "--config", "/nonexistent/config.json"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"interval_ms": 500, "device": "/dev/video0", "width": 640}}"#).unwrap();
        let path = file.path().to_str().unwrap();

        let cli = Cli::parse_from([
            "facecam",
            "--config",
            path,
            "--interval-ms",
            "250",
            "--device",
            "/dev/video1",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.interval_ms, 250);
        assert_eq!(config.device.as_deref(), Some("/dev/video1"));
        assert_eq!(config.width, 640);
    }
}
