mod convert;
mod display;

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use opencv::{highgui, prelude::*, videoio};
use vision::{
    effects::Effect, vision::classifier::database::validate_label, Command, FeatureDatabase, LabelRequest,
    RecognitionSession, VisionConfig, DEFAULT_DATABASE_PATH,
};

use convert::{color_image_to_mat, mat_to_color_image};

/// Live object recognition from a camera
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera index
    #[arg(short, long, default_value_t = 0)]
    camera: i32,

    /// Feature database file
    #[arg(short, long, default_value = DEFAULT_DATABASE_PATH)]
    database: PathBuf,

    /// Regions with fewer pixels are ignored
    #[arg(long)]
    min_component_size: Option<usize>,

    /// Key poll interval in milliseconds
    #[arg(long, default_value_t = 10)]
    poll_ms: i32,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Show the camera through an image effect instead of recognizing objects
    Effects {
        /// grey, sepia, blur, sobel-x, sobel-y, magnitude, quantize or comic
        #[arg(short, long)]
        filter: String,

        /// Levels per channel for quantize and comic
        #[arg(short, long)]
        levels: Option<u32>,
    },
}

fn main() -> anyhow::Result<()> {
    setup_logging();
    let args = Args::parse();

    log::info!("Opening camera {}", args.camera);
    let mut camera = videoio::VideoCapture::new(args.camera, videoio::CAP_ANY)?;
    if !camera.is_opened()? {
        bail!("Failed to open camera {}", args.camera);
    }

    match args.mode {
        Some(Mode::Effects { filter, levels }) => run_effects(&mut camera, filter.parse()?, levels, args.poll_ms),
        None => {
            let mut config = VisionConfig::default();
            if let Some(min_size) = args.min_component_size {
                config.min_component_size = min_size;
            }
            let database = FeatureDatabase::load(&args.database)?;
            log::info!("Loaded {} objects from {}", database.len(), args.database.display());
            run_recognizer(&mut camera, RecognitionSession::new(config, database), args.poll_ms)
        }
    }
}

fn run_recognizer(camera: &mut videoio::VideoCapture, mut session: RecognitionSession, poll_ms: i32) -> anyhow::Result<()> {
    display::open_windows()?;
    log::info!("Keys: n = capture, c = classify, e = evaluate, q = quit");

    let mut frame = Mat::default();
    loop {
        let command = Command::from_key(highgui::wait_key(poll_ms)?);
        if command == Some(Command::Quit) {
            break;
        }

        if !read_frame(camera, &mut frame) {
            continue;
        }
        let image = match mat_to_color_image(&frame) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Skipping frame: {e}");
                continue;
            }
        };

        let report = match session.process_frame(&image, command, prompt_label) {
            Ok(report) => report,
            Err(e) => {
                log::error!("Failed to process frame: {e:#}");
                continue;
            }
        };
        if report.captured > 0 {
            log::info!("Captured {} objects, database now holds {}", report.captured, session.database().len());
        }
        if command.is_some_and(|c| c.reports_results()) && session.is_classifying() {
            log::info!("{}", session.results_summary(&report));
        }

        display::show_report(&frame, &report)?;
    }

    display::close_windows()
}

fn run_effects(camera: &mut videoio::VideoCapture, effect: Effect, levels: Option<u32>, poll_ms: i32) -> anyhow::Result<()> {
    let window = format!("Effect: {effect}");
    highgui::named_window(display::RAW_WINDOW, highgui::WINDOW_NORMAL)?;
    highgui::named_window(&window, highgui::WINDOW_NORMAL)?;
    log::info!("Showing {effect}, press q to quit");

    let mut frame = Mat::default();
    while Command::from_key(highgui::wait_key(poll_ms)?) != Some(Command::Quit) {
        if !read_frame(camera, &mut frame) {
            continue;
        }
        let filtered = mat_to_color_image(&frame).and_then(|image| effect.apply(&image, levels));
        match filtered {
            Ok(filtered) => {
                highgui::imshow(display::RAW_WINDOW, &frame)?;
                highgui::imshow(&window, &color_image_to_mat(&filtered)?)?;
            }
            Err(e) => log::warn!("Skipping frame: {e}"),
        }
    }

    display::close_windows()
}

/// Grabs the next frame, logging and returning false when there is nothing usable.
fn read_frame(camera: &mut videoio::VideoCapture, frame: &mut Mat) -> bool {
    match camera.read(frame) {
        Ok(true) if !frame.empty() => true,
        Ok(_) => {
            log::warn!("Blank frame grabbed");
            false
        }
        Err(e) => {
            log::error!("Error reading frame: {e}");
            false
        }
    }
}

fn prompt_label(request: LabelRequest) -> anyhow::Result<String> {
    let question = match request {
        LabelRequest::Training(region) => format!("Enter label for object {region}: "),
        LabelRequest::GroundTruth(region) => format!("Enter the ground truth label for object {region}: "),
    };

    let stdin = io::stdin();
    loop {
        print!("{question}");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("Failed to read label")? == 0 {
            bail!("Standard input closed while waiting for a label");
        }
        match validate_label(&line) {
            Ok(label) => return Ok(label.to_string()),
            Err(e) => println!("{e}, try again"),
        }
    }
}

fn setup_logging() {
    simple_log::quick!();
}
