use posture_sup::{
    camera::Camera,
    cli::{annotate_boxes, annotate_candidates, StatusTracker},
    common::{models_dir, Config, DevMode},
    core::{template_tracker_factory, FaceDetector, OnnxFaceAnalyzer},
    pipeline::{Collaborators, DataParcel, Pipeline, TrackState},
    storage::InMemoryUserStore,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "posturesup")]
#[command(about = "Webcam identity and posture tracking pipeline")]
struct Cli {
    /// Enable development mode (debug logging, annotated snapshots under ./dev_data)
    #[arg(long, global = true)]
    dev: bool,

    /// Use this config file instead of searching the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the capture/perception/identity pipeline (default)
    Run,
    /// Capture a single frame and save it
    TestCamera,
    /// Run face detection on a single frame and save an annotated copy
    TestDetection,
    /// List available cameras
    ListCameras,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on mode
    setup_logging(cli.dev);

    // Create dev mode context
    let dev_mode = DevMode::new(cli.dev)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let config = load_config(cli.config.as_deref())?;
            run_pipeline(&config, &dev_mode)?;
        }
        Commands::TestCamera => {
            let config = load_config(cli.config.as_deref())?;
            eprintln!("Testing camera {}...", config.camera.device_index);
            test_camera(&config, &dev_mode)?;
        }
        Commands::TestDetection => {
            let config = load_config(cli.config.as_deref())?;
            eprintln!("Testing face detection...");
            test_detection(&config, &dev_mode)?;
        }
        Commands::ListCameras => {
            let cameras = Camera::list_all_cameras()?;

            if cameras.is_empty() {
                println!("No cameras found!");
                println!("\nTroubleshooting:");
                println!("  1. Check if cameras are connected");
                println!("  2. Ensure you have permission to access /dev/video*");
                return Ok(());
            }

            for camera in &cameras {
                println!("/dev/video{}: {}", camera.index, camera.name);
                for feature in &camera.features {
                    println!("   - {}", feature);
                }
            }

            println!("\nTo select a camera set `device_index` in the [camera] section of the config.");
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    config.resolve_model_paths(&models_dir());
    Ok(config)
}

fn run_pipeline(config: &Config, dev_mode: &DevMode) -> Result<()> {
    let camera = Camera::new(config)
        .with_context(|| format!("Cannot open camera /dev/video{}", config.camera.device_index))?;
    let analyzer = OnnxFaceAnalyzer::new(config).context("Failed to load face models")?;

    let collaborators = Collaborators {
        source: Box::new(camera),
        analyzer: Box::new(analyzer),
        tracker_factory: template_tracker_factory(config.tracker.clone()),
        repository: Box::new(InMemoryUserStore::new()),
    };

    let mut pipeline = Pipeline::start(config, collaborators)?;

    let running = pipeline.running_flag();
    ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;

    let presentation = pipeline.presentation();
    let preview = pipeline.preview();
    let mut status = StatusTracker::new();
    let mut last_state: Option<TrackState> = None;

    while pipeline.is_running() {
        let Some(parcel) = presentation.receive(Duration::from_millis(500)) else {
            continue;
        };

        if let Some(report) = status.observe(&parcel) {
            println!("{}", report.to_json());
        }

        if parcel.frame.is_some() && last_state != Some(parcel.track_state) {
            last_state = Some(parcel.track_state);
            if dev_mode.is_enabled() {
                save_snapshot(&parcel, dev_mode);
            }
        }

        // Drain so the encoder always has a free slot.
        if let Some(jpeg) = preview.as_ref().and_then(|p| p.try_receive()) {
            tracing::trace!("Preview frame: {} bytes", jpeg.len());
        }
    }

    let report = pipeline.stop();
    if !report.detached.is_empty() {
        tracing::warn!("Detached loops at exit: {:?}", report.detached);
    }
    Ok(())
}

fn save_snapshot(parcel: &DataParcel, dev_mode: &DevMode) {
    let Some(frame) = &parcel.frame else {
        return;
    };

    let annotated = annotate_boxes(&frame.image, &parcel.boxes, parcel.track_state);
    let path = dev_mode.get_debug_path(&format!("state_{}", parcel.track_state).to_lowercase());
    match annotated.save(&path) {
        Ok(()) => tracing::debug!("Saved snapshot to {:?}", path),
        Err(e) => tracing::warn!("Failed to save snapshot {:?}: {}", path, e),
    }
}

fn test_camera(config: &Config, dev_mode: &DevMode) -> Result<()> {
    let mut camera = Camera::new(config)?;
    let img = camera.capture_frame()?;

    let save_path = dev_mode.get_capture_path("test_capture");
    img.save(&save_path)?;
    println!("Saved {}x{} test image to {:?}", img.width(), img.height(), save_path);
    Ok(())
}

fn test_detection(config: &Config, dev_mode: &DevMode) -> Result<()> {
    let mut camera = Camera::new(config)?;
    let detector = FaceDetector::new(config)?;

    let frame = camera.capture_frame()?;
    let faces = detector.detect(&frame)?;

    println!("Found {} face(s) above threshold {}", faces.len(), config.detector.confidence);
    for (i, face) in faces.iter().enumerate() {
        println!("  Face {}: {:?} confidence {:.3}", i + 1, face.bbox, face.confidence);
    }

    let debug_path = dev_mode.get_debug_path("detection_annotated");
    annotate_candidates(&frame, &faces).save(&debug_path)?;
    println!("Saved annotated image to: {:?}", debug_path);

    Ok(())
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .init();
    }
}
