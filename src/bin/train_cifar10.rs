//! Train DenseNet on CIFAR-10
//!
//! Loads the dataset, normalizes it per channel, trains for the configured
//! number of epochs and rewrites the JSON experiment log after every epoch.
//!
//! Usage:
//!   cargo run --release --bin train_cifar10 -- --data-dir data/cifar-10-batches-bin
//!   cargo run --release --bin train_cifar10 -- --synthetic 512 --epochs 3

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use densenet_cifar::data::{load_cifar10, normalize_datasets, ImageDataset, CLASS_NAMES};
use densenet_cifar::utils::save_json;
use densenet_cifar::{setup_logging, Config, DenseNet, Trainer};

#[derive(Parser)]
#[command(name = "train_cifar10")]
#[command(about = "Train DenseNet on CIFAR-10 and log per-epoch metrics to JSON")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Directory with the CIFAR-10 binary batches (overrides config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Number of epochs (overrides config)
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Train on N synthetic images instead of CIFAR-10
    #[arg(long, value_name = "N")]
    synthetic: Option<usize>,

    /// Experiment log path (overrides config)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level, e.g. "debug" (RUST_LOG wins when set)
    #[arg(long)]
    log_level: Option<String>,

    /// Skip rendering the model diagram
    #[arg(long)]
    no_diagram: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    apply_overrides(&mut config, &args);

    setup_logging(&config.logging.level)?;
    config.validate().context("invalid configuration")?;
    info!("Configuration: {:?}", config);

    let (mut train, mut test) = load_data(&config)?;
    info!("Label distribution (train): {:?}", train.label_distribution());

    let stats = normalize_datasets(&mut train, &mut test, config.data.normalization)?;
    info!("Channel mean {:?}, std {:?}", stats.mean, stats.std);
    if let Some(path) = &config.output.channel_stats {
        save_json(&stats, path).with_context(|| format!("writing {}", path.display()))?;
    }

    let mut model = DenseNet::new(config.model.clone()).context("building model")?;
    println!("{}", model.summary());

    if config.output.render_diagram {
        model.render_diagram(&config.output.diagram);
    }

    let mut trainer = Trainer::new(config.training.clone())?.with_log_path(&config.output.log_file);
    let state = trainer.fit(&mut model, &train, &test).context("training failed")?;

    if let Some([loss, accuracy]) = state.log.test_loss.last() {
        println!();
        println!("Final test loss: {:.4}, accuracy: {:.2}%", loss, accuracy * 100.0);
    }
    println!("Experiment log written to {}", config.output.log_file.display());

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(dir) = &args.data_dir {
        config.data.data_dir = dir.clone();
    }
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(n) = args.synthetic {
        config.data.synthetic_samples = Some(n);
    }
    if let Some(path) = &args.log_file {
        config.output.log_file = path.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.no_diagram {
        config.output.render_diagram = false;
    }
}

fn load_data(config: &Config) -> Result<(ImageDataset, ImageDataset)> {
    match config.data.synthetic_samples {
        Some(n) => {
            info!("Generating {} synthetic training images", n);
            let shape = config.model.input_shape;
            let classes = config.model.num_classes;
            let seed = config.data.synthetic_seed;
            let train = ImageDataset::synthetic(n, shape, classes, seed)?;
            let test = ImageDataset::synthetic((n / 5).max(1), shape, classes, seed.wrapping_add(1))?;
            Ok((train, test))
        }
        None => {
            let (train, test) = load_cifar10(&config.data.data_dir).with_context(|| {
                format!(
                    "loading CIFAR-10 from {} (expects the binary version, classes: {})",
                    config.data.data_dir.display(),
                    CLASS_NAMES.join(", ")
                )
            })?;
            Ok((train, test))
        }
    }
}
