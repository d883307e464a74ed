//! Developer utility to train the letter classifier from recorded
//! `dataset_<LABEL>.json` files and write the model, weights and labels.

use std::io::Write;
use std::path::PathBuf;

use bisindo::config::{self, RecognizerSettings};
use bisindo::dataset::{is_collection_file, list_collection_files, load_collections};
use bisindo::logging;
use bisindo::ml::mlp::{EpochProgress, save_trained};
use bisindo::workflow::train_from_collections;

fn main() {
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let settings = config::load_or_default().unwrap_or_else(|err| {
        eprintln!("Using default settings: {err}");
        RecognizerSettings::default()
    });
    let options = parse_args(std::env::args().skip(1).collect(), &settings)?;

    let files = resolve_dataset_files(&options.datasets)?;
    if files.is_empty() {
        return Err("No dataset_<LABEL>.json files found".to_string());
    }
    println!("Loading {} dataset file(s)...", files.len());
    let collections = load_collections(&files).map_err(|err| err.to_string())?;
    for collection in &collections {
        println!("  {:<4} {} samples", collection.label, collection.len());
    }

    let mut training = settings.training.clone();
    training.epochs = options.epochs;
    training.seed = options.seed.or(training.seed);
    training.train_fraction = options.train_fraction;
    training.learning_rate = options.learning_rate;

    let mut progress = |update: &EpochProgress| {
        let val = match (update.val_loss, update.val_accuracy) {
            (Some(loss), Some(acc)) => format!("  val_loss={loss:.4}  val_acc={acc:.3}"),
            _ => String::new(),
        };
        print!(
            "\rEpoch {:>3}/{} ({:>3.0}%)  loss={:.4}  acc={:.3}{val}",
            update.epoch + 1,
            update.epochs,
            update.percent_complete(),
            update.loss,
            update.accuracy
        );
        let _ = std::io::stdout().flush();
        if update.epoch + 1 == update.epochs {
            println!();
        }
    };
    let outcome = train_from_collections(
        &collections,
        &training.build_options(),
        &training.train_options(),
        Some(&mut progress),
    )
    .map_err(|err| err.to_string())?;

    let report = &outcome.report;
    println!(
        "validation accuracy: {} ({} train / {} validation samples)",
        report.accuracy_display(),
        report.train_samples,
        report.validation_samples
    );
    for stats in &report.per_class {
        println!(
            "  {:<4} precision={:.3}  recall={:.3}  support={}",
            stats.label, stats.precision, stats.recall, stats.support
        );
    }
    let cm = &report.confusion;
    if cm.total() > 0 {
        println!("confusion matrix (rows=true, cols=pred):");
        for truth in 0..cm.n_classes {
            let mut row = String::new();
            for pred in 0..cm.n_classes {
                row.push_str(&format!("{:6}", cm.get(truth, pred)));
            }
            println!("{row}");
        }
    }

    let out_dir = match options.out_dir {
        Some(dir) => dir,
        None => settings.models.resolve_dir().map_err(|err| err.to_string())?,
    };
    let saved = save_trained(&out_dir, &outcome.classifier).map_err(|err| err.to_string())?;
    println!("wrote {}", saved.model_path.display());
    println!("wrote {}", saved.weights_path.display());
    println!("wrote {}", saved.labels_path.display());
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    datasets: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    epochs: usize,
    learning_rate: f32,
    train_fraction: f32,
    seed: Option<u64>,
}

fn parse_args(args: Vec<String>, settings: &RecognizerSettings) -> Result<CliOptions, String> {
    let mut datasets = Vec::new();
    let mut out_dir = None;
    let mut epochs = settings.training.epochs;
    let mut learning_rate = settings.training.learning_rate;
    let mut train_fraction = settings.training.train_fraction;
    let mut seed = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--dataset" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--dataset requires a value".to_string())?;
                datasets.push(PathBuf::from(value));
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                out_dir = Some(PathBuf::from(value));
            }
            "--epochs" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--epochs requires a value".to_string())?;
                epochs = value
                    .parse::<usize>()
                    .ok()
                    .filter(|epochs| *epochs > 0)
                    .ok_or_else(|| format!("Invalid --epochs value: {value}"))?;
            }
            "--learning-rate" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--learning-rate requires a value".to_string())?;
                learning_rate = value
                    .parse::<f32>()
                    .map_err(|_| format!("Invalid --learning-rate value: {value}"))?;
            }
            "--train-fraction" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--train-fraction requires a value".to_string())?;
                train_fraction = value
                    .parse::<f32>()
                    .ok()
                    .filter(|fraction| (0.0..=1.0).contains(fraction))
                    .ok_or_else(|| format!("Invalid --train-fraction value: {value}"))?;
            }
            "--seed" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--seed requires a value".to_string())?;
                seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --seed value: {value}"))?,
                );
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    if datasets.is_empty() {
        datasets.push(settings.datasets.resolve_dir().map_err(|err| err.to_string())?);
    }
    Ok(CliOptions {
        datasets,
        out_dir,
        epochs,
        learning_rate,
        train_fraction,
        seed,
    })
}

/// Expand directories into the collection files they contain.
fn resolve_dataset_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(list_collection_files(path).map_err(|err| err.to_string())?);
        } else if path.is_file() {
            if !is_collection_file(path) {
                eprintln!("Note: {} is not named dataset_<LABEL>.json", path.display());
            }
            files.push(path.clone());
        } else {
            return Err(format!("Dataset path does not exist: {}", path.display()));
        }
    }
    Ok(files)
}

fn help_text() -> String {
    [
        "bisindo-train",
        "",
        "Trains the BISINDO letter classifier on recorded landmark collections.",
        "",
        "Usage:",
        "  bisindo-train [--dataset <file|dir>]... [--out <dir>]",
        "",
        "Options:",
        "  --dataset <path>        dataset_<LABEL>.json file or a folder of them; repeatable",
        "                          (default: the configured datasets folder)",
        "  --out <dir>             Output folder for model, weights and labels",
        "                          (default: the configured models folder)",
        "  --epochs <n>            Training epochs (default 50)",
        "  --learning-rate <f>     Adam learning rate (default 0.001)",
        "  --train-fraction <f>    Share of samples used for training (default 0.8)",
        "  --seed <n>              RNG seed for shuffling and initialization",
    ]
    .join("\n")
}
