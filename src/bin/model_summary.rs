//! Print the DenseNet architecture
//!
//! Builds the configured model, prints its layer table and parameter count,
//! and renders the structure diagram when Graphviz is available.
//!
//! Usage:
//!   cargo run --bin model_summary -- --preset tiny

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use densenet_cifar::{setup_logging, Config, DenseNet, DenseNetConfig};

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Tiny,
    Cifar10,
    Large,
}

#[derive(Parser)]
#[command(name = "model_summary")]
#[command(about = "Print the DenseNet architecture and render its diagram")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Use a built-in architecture instead of the config's [model] section
    #[arg(short, long, value_enum)]
    preset: Option<Preset>,

    /// Diagram output path (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip rendering the model diagram
    #[arg(long)]
    no_diagram: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    setup_logging(&config.logging.level)?;

    let model_config = match args.preset {
        Some(Preset::Tiny) => DenseNetConfig::tiny(),
        Some(Preset::Cifar10) => DenseNetConfig::cifar10(),
        Some(Preset::Large) => DenseNetConfig::large(),
        None => config.model.clone(),
    };

    let model = DenseNet::new(model_config).context("building model")?;
    println!("{}", model.summary());

    if !args.no_diagram {
        let path = args.output.unwrap_or(config.output.diagram);
        if model.render_diagram(&path) {
            println!("Diagram written to {}", path.display());
        } else {
            println!("Diagram not rendered (is Graphviz `dot` installed?)");
        }
    }

    Ok(())
}
