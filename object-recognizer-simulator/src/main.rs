mod simulated_object;

use std::{fs, io::ErrorKind, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};
use vision::{Command, ConfusionMatrix, FeatureDatabase, RecognitionSession, VisionConfig};

use simulated_object::{render, ObjectKind, SimObject};

/// Trains and evaluates the object recognizer on rendered frames
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    /// Feature database file, replaced on every run
    #[arg(short, long, default_value = "simulated_db.txt")]
    database: PathBuf,

    /// Training frames per object class
    #[arg(long, default_value_t = 3)]
    train_frames: usize,

    /// Frames to classify during evaluation
    #[arg(long, default_value_t = 20)]
    eval_frames: usize,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = 640)]
    width: usize,

    #[arg(long, default_value_t = 480)]
    height: usize,
}

fn main() -> anyhow::Result<()> {
    setup_logging();
    let args = Args::parse();

    let confusion = run(&args)?;
    log::info!("Confusion matrix:\n{confusion}");
    match confusion.accuracy() {
        Some(accuracy) => log::info!("Accuracy: {:.1}%", accuracy * 100.0),
        None => log::warn!("Nothing was evaluated"),
    }

    Ok(())
}

fn run(args: &Args) -> anyhow::Result<ConfusionMatrix> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    match fs::remove_file(&args.database) {
        Ok(()) => log::info!("Removed previous database {}", args.database.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("Failed to remove {}", args.database.display())),
    }
    let mut session = RecognitionSession::new(VisionConfig::default(), FeatureDatabase::new(&args.database));

    log::info!("Training on {} frames per class", args.train_frames);
    for kind in ObjectKind::ALL {
        for _ in 0..args.train_frames {
            let report = process_object(&mut session, kind, Command::Capture, args, &mut rng)?;
            if report.captured != 1 {
                log::warn!("Training frame of {} had {} regions", kind.label(), report.captured);
            }
        }
    }
    log::info!("Database holds {} objects", session.database().len());

    // Turns classification on, the frame itself is thrown away
    process_object(&mut session, ObjectKind::Box, Command::Classify, args, &mut rng)?;

    log::info!("Evaluating on {} frames", args.eval_frames);
    for _ in 0..args.eval_frames {
        let kind = ObjectKind::ALL[rng.gen_range(0..ObjectKind::ALL.len())];
        let report = process_object(&mut session, kind, Command::Evaluate, args, &mut rng)?;
        if report.classifications.is_empty() {
            log::warn!("No region found for a {}", kind.label());
        }
        log::debug!("{}: {}", kind.label(), report.classification_text());
    }

    Ok(session.confusion().clone())
}

/// Renders one random object of `kind` and feeds it to the session, answering prompts with the true label.
fn process_object(
    session: &mut RecognitionSession,
    kind: ObjectKind,
    command: Command,
    args: &Args,
    rng: &mut StdRng,
) -> anyhow::Result<vision::FrameReport> {
    let object = SimObject::random(kind, rng, args.width, args.height);
    let frame = render(&[object], args.width, args.height, rng);
    session.process_frame(&frame, Some(command), |_| Ok(kind.label().to_string()))
}

fn setup_logging() {
    simple_log::quick!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(dir: &tempfile::TempDir) -> Args {
        Args {
            database: dir.path().join("simulated_db.txt"),
            train_frames: 1,
            eval_frames: 6,
            seed: Some(42),
            width: 400,
            height: 400,
        }
    }

    #[test]
    fn simulated_objects_are_recognized() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(&dir);
        let confusion = run(&args).unwrap();

        assert_eq!(confusion.total(), 6);
        assert_eq!(confusion.correct(), 6, "{confusion}");

        let db = FeatureDatabase::load(&args.database).unwrap();
        assert_eq!(db.len(), 3);
        assert!(db.get("pen").unwrap().aspect_ratio > 3.5);
    }

    #[test]
    fn rerun_replaces_database() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(&dir);
        fs::write(&args.database, "stale,1,1\n").unwrap();

        run(&Args { eval_frames: 0, ..args.clone() }).unwrap();
        let db = FeatureDatabase::load(&args.database).unwrap();
        assert_eq!(db.get("stale"), None);
        assert_eq!(db.len(), 3);
    }
}
