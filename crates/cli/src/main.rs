use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::thread;

use clap::Parser;

use facewatch_core::config::run_config::{PathsConfig, RunConfiguration};
use facewatch_core::detection::domain::face_embedding_service::FaceEmbeddingService;
use facewatch_core::detection::infrastructure::arcface_encoder::ArcFaceEncoder;
use facewatch_core::detection::infrastructure::model_resolver;
use facewatch_core::detection::infrastructure::onnx_embedding_service::OnnxFaceEmbeddingService;
use facewatch_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use facewatch_core::pipeline::control_signal::ControlHandle;
use facewatch_core::pipeline::detection_engine::DetectionEngine;
use facewatch_core::pipeline::pipeline_logger::LogPipelineLogger;
use facewatch_core::pipeline::worker::{self, WorkerMessage};
use facewatch_core::video::domain::video_writer::VideoWriterFactory;
use facewatch_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use facewatch_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use facewatch_core::video::infrastructure::image_file_reader::ImageFileReader;
use facewatch_core::video::infrastructure::image_file_writer::ImageFileWriter;

/// Search recorded footage for faces on a watch list.
///
/// While running, type `p` + Enter to pause, `r` to resume, `s` to stop.
#[derive(Parser)]
#[command(name = "facewatch")]
struct Cli {
    /// Video file to scan.
    video: PathBuf,

    /// Reference image of the person to look for (repeatable).
    #[arg(long = "reference", short = 'r', required = true)]
    references: Vec<PathBuf>,

    /// JSON configuration file; missing keys keep their defaults, and an
    /// absent or malformed file falls back to defaults entirely.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Put crops, clips and reports under this task folder.
    #[arg(long)]
    task_dir: Option<PathBuf>,

    /// Analyze every Nth frame.
    #[arg(long)]
    frame_skip: Option<usize>,

    /// Maximum embedding distance for a match (0.0-1.0).
    #[arg(long)]
    threshold: Option<f64>,

    /// Grayscale standard deviation below which a face counts as masked.
    #[arg(long)]
    mask_std: Option<f64>,

    /// Length of the clip recorded after a detection, in seconds.
    #[arg(long)]
    clip_seconds: Option<f64>,
}

/// A control command typed on stdin.
#[derive(Debug, PartialEq)]
enum Command {
    Pause,
    Resume,
    Stop,
}

fn main() {
    env_logger::init();

    match run() {
        Ok(0) => println!("Person not found."),
        Ok(matches) => println!("Total matches: {matches}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run() -> Result<usize, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if !cli.video.exists() {
        return Err(format!("Video file not found: {}", cli.video.display()).into());
    }

    let config = build_config(&cli)?;
    let service = build_embedding_service(&config)?;

    let clip_writers: VideoWriterFactory = Box::new(|| Box::new(FfmpegWriter::new()));
    let mut engine = DetectionEngine::new(
        config,
        Box::new(FfmpegReader::new()),
        service,
        Box::new(ImageFileReader::new()),
        Box::new(ImageFileWriter::new()),
        clip_writers,
        Box::new(LogPipelineLogger::default()),
        None,
        None,
    );

    if !engine.load_reference_images(&cli.references) {
        return Err("No usable reference image: every image was missing or faceless".into());
    }

    let job = worker::spawn(engine, cli.video);
    listen_for_commands(job.control.clone());

    for message in job.messages.iter() {
        match message {
            WorkerMessage::Progress(p) => eprint!("\rProgress: {:5.1}%", p * 100.0),
            WorkerMessage::Complete(_) => eprintln!(),
        }
    }

    let engine = job.join()?;
    if let Some(report) = engine.last_report() {
        eprintln!("Report: {}", report.display());
    }
    Ok(engine.history().len())
}

fn build_config(cli: &Cli) -> Result<RunConfiguration, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => RunConfiguration::load_or_default(path),
        None => RunConfiguration::default(),
    };
    apply_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut RunConfiguration, cli: &Cli) {
    if let Some(dir) = &cli.task_dir {
        config.paths = PathsConfig::for_task(dir);
    }
    if let Some(n) = cli.frame_skip {
        config.frame_skip = n;
    }
    if let Some(t) = cli.threshold {
        config.detection_threshold = t;
    }
    if let Some(s) = cli.mask_std {
        config.mask_std_threshold = s;
    }
    if let Some(s) = cli.clip_seconds {
        config.clip_duration_seconds = s;
    }
}

fn build_embedding_service(
    config: &RunConfiguration,
) -> Result<Box<dyn FaceEmbeddingService>, Box<dyn std::error::Error>> {
    let models = &config.models;
    let detector_path = resolve_model(&models.detector_name, &models.detector_url)?;
    let embedder_path = resolve_model(&models.embedder_name, &models.embedder_url)?;

    let detector = OnnxYoloDetector::new(&detector_path, models.detector_confidence)?;
    let encoder = ArcFaceEncoder::new(&embedder_path)?;
    Ok(Box::new(OnnxFaceEmbeddingService::new(
        Box::new(detector),
        encoder,
        models.match_tolerance,
    )))
}

fn resolve_model(name: &str, url: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {name}");
    let label = name.to_string();
    let path = model_resolver::resolve(
        name,
        url,
        bundled_model_dir().as_deref(),
        Some(Box::new(move |downloaded, total| {
            download_progress(&label, downloaded, total)
        })),
    )?;
    Ok(path)
}

/// `models/` next to the executable, for pre-packaged installs.
fn bundled_model_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
        .filter(|dir: &PathBuf| dir.is_dir())
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}

/// Reads pause/resume/stop commands from stdin on a detached thread.
fn listen_for_commands(control: ControlHandle) {
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(Command::Pause) => {
                    control.pause();
                    eprintln!("\nPaused. Type r to resume, s to stop.");
                }
                Some(Command::Resume) => {
                    control.resume();
                    eprintln!("\nResumed.");
                }
                Some(Command::Stop) => {
                    control.stop();
                    eprintln!("\nStopping...");
                    break;
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("\nUnknown command {line:?}; use p, r or s."),
            }
        }
    });
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" => Some(Command::Pause),
        "r" | "resume" => Some(Command::Resume),
        "s" | "stop" | "q" => Some(Command::Stop),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["facewatch"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_command_accepts_short_and_long_forms() {
        assert_eq!(parse_command("p"), Some(Command::Pause));
        assert_eq!(parse_command(" Resume \n"), Some(Command::Resume));
        assert_eq!(parse_command("s"), Some(Command::Stop));
        assert_eq!(parse_command("x"), None);
    }

    #[test]
    fn test_references_are_required() {
        assert!(Cli::try_parse_from(["facewatch", "in.mp4"]).is_err());
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let cli = cli(&[
            "in.mp4",
            "-r",
            "a.jpg",
            "--reference",
            "b.jpg",
            "--task-dir",
            "tasks/case-7",
            "--frame-skip",
            "3",
            "--threshold",
            "0.4",
            "--clip-seconds",
            "2.5",
        ]);
        let mut config = RunConfiguration::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(cli.references.len(), 2);
        assert_eq!(config.frame_skip, 3);
        assert_eq!(config.detection_threshold, 0.4);
        assert_eq!(config.clip_duration_seconds, 2.5);
        assert_eq!(config.mask_std_threshold, 20.0);
        assert_eq!(
            config.paths.reports,
            PathBuf::from("tasks/case-7").join("reports")
        );
    }

    #[test]
    fn test_unreadable_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let path = path.to_string_lossy().to_string();

        let cli = cli(&[
            "in.mp4",
            "-r",
            "a.jpg",
            "--config",
            path.as_str(),
            "--frame-skip",
            "2",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.frame_skip, 2);
        assert_eq!(config.detection_threshold, 0.5);
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let cli = cli(&["in.mp4", "-r", "a.jpg", "--frame-skip", "0"]);
        assert!(build_config(&cli).is_err());
    }
}
