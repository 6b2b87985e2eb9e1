mod app_config;

use app_config::AppConfig;
use clap::{Args, Parser, Subcommand};
use digitreg::{
  subcommands::{self, DataPaths, TrainSettings},
  utils,
};
use std::{error::Error, path::PathBuf};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
  /// YAML file with training settings; command line flags take precedence
  #[arg(short, long, value_name = "PATH", global = true)]
  config: Option<PathBuf>,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Train a one-vs-rest classifier for a digit and report its test accuracy
  Train {
    #[arg(long, value_name = "PATH")]
    train_images: PathBuf,
    #[arg(long, value_name = "PATH")]
    train_labels: PathBuf,
    #[arg(long, value_name = "PATH")]
    test_images: PathBuf,
    #[arg(long, value_name = "PATH")]
    test_labels: PathBuf,
    #[command(flatten)]
    settings: SettingsArgs,
    /// Write the trained weights as JSON
    #[arg(long, value_name = "PATH")]
    weights_out: Option<PathBuf>,
  },
  /// Split a text file into character chunks for training and validation
  Chunk {
    #[arg(long, value_name = "PATH")]
    text: PathBuf,
    #[arg(long, value_name = "INT", default_value_t = 32)]
    chunk_size: usize,
    #[arg(long, default_value_t = 0.1)]
    val_ratio: f64,
    #[arg(long, default_value_t = 1)]
    seed: u64,
  },
  /// Score an untrained LSTM character tagger on the validation chunks of a text file
  Tag {
    #[arg(long, value_name = "PATH")]
    text: PathBuf,
    #[arg(long, value_name = "INT", default_value_t = 32)]
    chunk_size: usize,
    #[arg(long, default_value_t = 0.1)]
    val_ratio: f64,
    #[arg(long, value_name = "INT", default_value_t = 6)]
    embedding_dim: usize,
    #[arg(long, value_name = "INT", default_value_t = 6)]
    hidden_dim: usize,
    #[arg(long, default_value_t = 1)]
    seed: u64,
  },
}

#[derive(Args)]
struct SettingsArgs {
  #[arg(long, value_name = "DIGIT")]
  target: Option<u8>,
  #[arg(long, value_name = "INT")]
  train_limit: Option<usize>,
  #[arg(long, value_name = "INT")]
  test_limit: Option<usize>,
  #[arg(short, long, value_name = "INT")]
  epochs: Option<usize>,
  #[arg(long, value_name = "INT")]
  batch_size: Option<usize>,
  #[arg(long)]
  learning_rate: Option<f64>,
  #[arg(long)]
  lambda: Option<f64>,
  #[arg(long)]
  seed: Option<u64>,
  #[arg(long, value_name = "INT")]
  log_every: Option<usize>,
}

impl From<SettingsArgs> for AppConfig {
  fn from(args: SettingsArgs) -> Self {
    AppConfig {
      target: args.target,
      train_limit: args.train_limit,
      test_limit: args.test_limit,
      epochs: args.epochs,
      batch_size: args.batch_size,
      learning_rate: args.learning_rate,
      lambda: args.lambda,
      seed: args.seed,
      log_every: args.log_every,
    }
  }
}

fn main() -> Result<(), Box<dyn Error>> {
  utils::init_logging()?;
  let args = Cli::parse();

  let file_config = match &args.config {
    Some(path) => {
      tracing::debug!("reading config {:?}", path);
      AppConfig::load(path)?
    }
    None => AppConfig::default(),
  };

  match args.command {
    Command::Train {
      train_images,
      train_labels,
      test_images,
      test_labels,
      settings,
      weights_out,
    } => {
      let settings = file_config
        .merge(settings.into())
        .apply(TrainSettings::default());
      let paths = DataPaths {
        train_images,
        train_labels,
        test_images,
        test_labels,
      };
      let app = subcommands::Train::new(paths, settings, weights_out.as_deref());
      app.run()?;
    }
    Command::Chunk {
      text,
      chunk_size,
      val_ratio,
      seed,
    } => {
      let app = subcommands::Chunk::new(&text, chunk_size, val_ratio, seed);
      app.run()?;
    }
    Command::Tag {
      text,
      chunk_size,
      val_ratio,
      embedding_dim,
      hidden_dim,
      seed,
    } => {
      let app = subcommands::Tag::new(&text, chunk_size, val_ratio, embedding_dim, hidden_dim, seed);
      app.run()?;
    }
  }
  Ok(())
}
