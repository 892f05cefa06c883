//! DCGAN for Image Synthesis
//!
//! Main entry point providing CLI interface for:
//! - Training a DCGAN on one or more dataset categories
//! - Writing a default configuration file

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use rust_dcgan_images::{
    data::{parse_category, DatasetSource, ImageShape, CIFAR10_CLASSES},
    model::Dcgan,
    training::AdversarialTrainer,
    utils::Config,
    visualization::{GridSampler, PngRenderer},
    Error,
};

/// DCGAN trainer for small image datasets
#[derive(Parser)]
#[command(name = "dcgan_images")]
#[command(author = "ML Trading Examples")]
#[command(version = "0.1.0")]
#[command(about = "Train a DCGAN to synthesize images of a chosen dataset category")]
struct Cli {
    /// Path to configuration file (.toml or .json)
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DatasetKind {
    Cifar10,
    Mnist,
    Synthetic,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the DCGAN model
    Train {
        /// Dataset to train on (overrides the config file)
        #[arg(long, value_enum)]
        dataset: Option<DatasetKind>,

        /// Directory holding the dataset files
        #[arg(short, long)]
        data_dir: Option<String>,

        /// Categories to train on, as labels or CIFAR-10 names (e.g. "horse,7")
        #[arg(long, value_delimiter = ',')]
        categories: Option<Vec<String>>,

        /// Number of training steps
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Batch size
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Save a sample grid every N steps
        #[arg(short, long)]
        sample_interval: Option<usize>,

        /// Directory for sample images
        #[arg(short, long)]
        output_dir: Option<String>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List CIFAR-10 category names
    Categories,

    /// Initialize default configuration file
    Init {
        /// Output configuration file path
        #[arg(short, long, default_value = "config.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Train {
            dataset,
            data_dir,
            categories,
            epochs,
            batch_size,
            sample_interval,
            output_dir,
            seed,
        } => {
            let mut config = load_config(&cli.config)?;

            if let Some(kind) = dataset {
                config.data.source = source_for(kind, data_dir, &config);
            } else if let Some(dir) = data_dir {
                match &mut config.data.source {
                    DatasetSource::Cifar10 { dir: d } | DatasetSource::Mnist { dir: d } => *d = dir,
                    DatasetSource::Synthetic { .. } => {
                        warn!("--data-dir ignored for the synthetic dataset")
                    }
                }
            }
            if let Some(values) = categories {
                config.data.categories = values
                    .iter()
                    .map(|v| parse_category(v))
                    .collect::<rust_dcgan_images::Result<Vec<_>>>()?;
            }
            if let Some(n) = epochs {
                config.training.epochs = n;
            }
            if let Some(n) = batch_size {
                config.training.batch_size = n;
            }
            if let Some(n) = sample_interval {
                config.sampling.sample_interval = n;
            }
            if let Some(dir) = output_dir {
                config.sampling.output_dir = dir;
            }
            if let Some(s) = seed {
                config.training.seed = s;
            }

            train_model(config)?;
        }
        Commands::Categories => {
            for (label, name) in CIFAR10_CLASSES.iter().enumerate() {
                println!("{:>2}  {}", label, name);
            }
        }
        Commands::Init { output } => {
            init_config(&output)?;
        }
    }

    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        info!("Loading configuration from {}", path);
        Config::load(path)
    } else {
        info!("Config file not found, using defaults");
        Ok(Config::default())
    }
}

/// Dataset source for a `--dataset` choice
fn source_for(kind: DatasetKind, dir: Option<String>, config: &Config) -> DatasetSource {
    match kind {
        DatasetKind::Cifar10 => DatasetSource::Cifar10 {
            dir: dir.unwrap_or_else(|| "data/cifar-10-batches-bin".to_string()),
        },
        DatasetKind::Mnist => DatasetSource::Mnist {
            dir: dir.unwrap_or_else(|| "data/mnist".to_string()),
        },
        DatasetKind::Synthetic => {
            // Requested categories plus one decoy class
            let mut classes = config.data.categories.clone();
            let decoy = (0..).find(|c| !classes.contains(c)).unwrap_or(0);
            classes.push(decoy);
            DatasetSource::Synthetic {
                classes,
                images_per_class: 100,
                shape: ImageShape::cifar10(),
            }
        }
    }
}

/// Train the DCGAN model
fn train_model(config: Config) -> Result<()> {
    config.validate()?;

    let training_config = config.training_config();
    let seed = training_config.seed;
    tch::manual_seed(seed as i64);

    let device = config.get_device();
    info!("Using device: {:?}", device);

    let mut rng = StdRng::seed_from_u64(config.dataset_seed());
    let dataset = config.data.source.load(&mut rng)?;

    let model = Dcgan::new(config.generator_config(), config.discriminator_config(), device)?;

    let renderer = PngRenderer::new(&config.sampling.output_dir, config.image_shape().color_mode()?);
    let sampler = GridSampler::new(
        config.sampling.grid_rows,
        config.sampling.grid_cols,
        device,
        Box::new(renderer),
    );

    let mut trainer =
        AdversarialTrainer::from_dataset(training_config, model, &dataset)?.with_sampler(Box::new(sampler));

    let stop = trainer.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            stop.request_stop();
        }
    });

    let outcome = tokio::task::block_in_place(|| trainer.run().map(|history| history.len()));

    match outcome {
        Ok(steps) => {
            info!("Training complete: {} steps recorded", steps);
            Ok(())
        }
        Err(e @ Error::NumericalInstabilityError { .. }) => {
            error!("Training diverged: {}", e);
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Initialize default configuration file
fn init_config(output_path: &str) -> Result<()> {
    let config = Config::default();
    config.save(output_path)?;

    info!("Created default configuration at {}", output_path);
    Ok(())
}
