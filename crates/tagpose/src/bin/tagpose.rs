//! Offline calibration and tracking over image files.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};

use tagpose::aruco::render_marker;
use tagpose::calib::{load_calibration, save_calibration, CaptureSession, DIST_COEFFS};
use tagpose::core::init_with_level;
use tagpose::tracker::{run_tracking, FrameSource, RelativePose, TrackSink, TrackerConfig};
use tagpose::{ImageDirSource, Matcher, SessionConfig};

#[derive(Parser)]
#[command(name = "tagpose", version, about = "Camera calibration and marker-pair pose tracking")]
struct Cli {
    /// Session config file (JSON); defaults are used when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose (debug) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve camera intrinsics from checkerboard images.
    Calibrate {
        /// Directory of capture images.
        #[arg(long)]
        images: PathBuf,
        /// Output calibration file.
        #[arg(long)]
        out: PathBuf,
    },
    /// Track the relative pose between two markers over image frames.
    Track {
        /// Directory of capture images.
        #[arg(long)]
        images: PathBuf,
        /// Calibration file written by `calibrate`.
        #[arg(long)]
        calibration: PathBuf,
        /// Base marker id (the reference frame).
        #[arg(long)]
        base: u32,
        /// Target marker id.
        #[arg(long)]
        target: u32,
    },
    /// Render dictionary markers to PNG files for printing.
    Print {
        /// Output directory.
        #[arg(long)]
        out: PathBuf,
        /// How many ids to render, starting from 0.
        #[arg(long, default_value_t = 10)]
        count: u32,
        /// Pixels per marker cell.
        #[arg(long, default_value_t = 50)]
        cell_px: usize,
    },
    /// Write a config file populated with the defaults.
    InitConfig {
        /// Output path.
        #[arg(long)]
        out: PathBuf,
    },
}

struct PrintSink;

impl TrackSink for PrintSink {
    fn on_frame(&mut self, frame_index: usize, relative: Option<&RelativePose>) -> bool {
        match relative {
            Some(rel) => println!(
                "frame {frame_index}: t = [{:.4}, {:.4}, {:.4}] dr = [{:.4}, {:.4}, {:.4}]",
                rel.translation.x,
                rel.translation.y,
                rel.translation.z,
                rel.rotation_delta.x,
                rel.rotation_delta.y,
                rel.rotation_delta.z,
            ),
            None => println!("frame {frame_index}: markers not visible"),
        }
        true
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<SessionConfig, Box<dyn Error>> {
    match path {
        Some(p) => Ok(SessionConfig::load_json(p)?),
        None => Ok(SessionConfig::default()),
    }
}

fn calibrate(cfg: &SessionConfig, images: &PathBuf, out: &PathBuf) -> Result<(), Box<dyn Error>> {
    let mut source = ImageDirSource::open(images)?;
    let mut session = CaptureSession::with_params(cfg.board(), cfg.extractor.clone())
        .with_min_samples(cfg.min_samples);

    while let Some(frame) = source.next_frame()? {
        session.observe(&frame.view());
    }

    let Some(result) = session.try_solve() else {
        return Err(format!(
            "only {} of {} required samples; capture more views",
            session.sample_count(),
            cfg.min_samples
        )
        .into());
    };
    let solved = result?;
    info!(
        "rms reprojection error: {:.4} px",
        solved.rms_reprojection_px
    );
    save_calibration(out, &solved.calibration)?;
    println!("calibration written to {}", out.display());
    Ok(())
}

fn track(
    cfg: &SessionConfig,
    images: &PathBuf,
    calibration: &PathBuf,
    base: u32,
    target: u32,
) -> Result<(), Box<dyn Error>> {
    let calib = load_calibration(calibration, DIST_COEFFS)?;
    let matcher = Matcher::new(cfg.dictionary()?, cfg.max_hamming);
    let tracker_config = TrackerConfig {
        base_id: base,
        target_id: target,
        marker_edge_m: cfg.marker_edge_m,
        detector: cfg.detector.clone(),
    };

    let mut source = ImageDirSource::open(images)?;
    let mut sink = PrintSink;
    let summary = run_tracking(&mut source, &mut sink, &matcher, &calib, &tracker_config)?;

    match summary.final_rotation_matrix() {
        Some(m) => {
            println!("final relative rotation matrix:");
            for r in 0..3 {
                println!("  [{:9.5} {:9.5} {:9.5}]", m[(r, 0)], m[(r, 1)], m[(r, 2)]);
            }
        }
        None => warn!("marker pair was never visible; no final pose"),
    }
    Ok(())
}

fn print_markers(
    cfg: &SessionConfig,
    out: &PathBuf,
    count: u32,
    cell_px: usize,
) -> Result<(), Box<dyn Error>> {
    let dict = cfg.dictionary()?;
    std::fs::create_dir_all(out)?;
    for id in 0..count {
        let Some(img) = render_marker(&dict, id, cell_px, 1) else {
            warn!("id {id} is outside {}; stopping", dict.name);
            break;
        };
        let path = out.join(format!("{}_{id:04}.png", dict.name.to_ascii_lowercase()));
        let buf = image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data)
            .ok_or("marker raster has inconsistent dimensions")?;
        buf.save(&path)?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    init_with_level(level)?;

    let cfg = load_config(cli.config.as_ref())?;
    match &cli.command {
        Command::Calibrate { images, out } => calibrate(&cfg, images, out),
        Command::Track {
            images,
            calibration,
            base,
            target,
        } => track(&cfg, images, calibration, *base, *target),
        Command::Print { out, count, cell_px } => print_markers(&cfg, out, *count, *cell_px),
        Command::InitConfig { out } => {
            cfg.write_json(out)?;
            println!("config written to {}", out.display());
            Ok(())
        }
    }
}
