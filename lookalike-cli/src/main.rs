//! Lookalike CLI - offline image lookups against a reference folder.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lookalike_core::{
    DEFAULT_MAX_DESCRIPTOR_DISTANCE, DEFAULT_MIN_FEATURE_MATCHES, DEFAULT_NEAR_MATCH_THRESHOLD,
};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success (including \"no match\")
  1   General error
  64  Usage error
  65  Image could not be decoded
  66  Input file or folder not found
  74  I/O error";

#[derive(Parser)]
#[command(name = "lookalike")]
#[command(author, version, about = "Find visually similar images in a reference folder", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print results, no decoration
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the perceptual fingerprint of one or more images
    Hash {
        /// Images to fingerprint
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Compare two images by fingerprint and keypoints
    Compare {
        #[arg(value_name = "A")]
        first: PathBuf,

        #[arg(value_name = "B")]
        second: PathBuf,

        /// Descriptor distance below which a keypoint pair counts as good
        #[arg(long, default_value_t = DEFAULT_MAX_DESCRIPTOR_DISTANCE)]
        max_distance: u32,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Index a reference folder and report what was found
    Sync {
        /// Folder of reference images (png, jpg, jpeg)
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Look up an image in a reference folder
    Match {
        /// Query image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Folder of reference images
        #[arg(short, long, value_name = "DIR", default_value = "our_images")]
        corpus: PathBuf,

        /// Minimum near-hash similarity (0-100)
        #[arg(long, default_value_t = DEFAULT_NEAR_MATCH_THRESHOLD, value_parser = utils::parse_threshold)]
        threshold: f64,

        /// Minimum good keypoint matches for a cropped-image match
        #[arg(long, default_value_t = DEFAULT_MIN_FEATURE_MATCHES)]
        min_features: usize,

        /// Descriptor distance below which a keypoint pair counts as good
        #[arg(long, default_value_t = DEFAULT_MAX_DESCRIPTOR_DISTANCE)]
        max_distance: u32,

        /// Give up after this many seconds and report no match
        #[arg(long, value_name = "SECS")]
        deadline: Option<u64>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are reported as "errors" on stdout
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(e) => ExitCode::from_anyhow(&e),
    };

    if let Some(message) = exit.message {
        eprintln!("Error: {message}");
    }
    std::process::exit(exit.code);
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "lookalike=debug,lookalike_core=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let quiet = cli.quiet;

    match cli.command {
        Commands::Hash { files } => commands::hash::execute(&files, quiet),
        Commands::Compare {
            first,
            second,
            max_distance,
            json,
        } => commands::compare::execute(&first, &second, max_distance, json),
        Commands::Sync { dir, json } => commands::sync::execute(&dir, json, quiet).await,
        Commands::Match {
            file,
            corpus,
            threshold,
            min_features,
            max_distance,
            deadline,
            json,
        } => {
            let options = commands::find::MatchOptions {
                threshold,
                min_features,
                max_distance,
                deadline_secs: deadline,
                json,
                quiet,
            };
            commands::find::execute(&file, &corpus, options).await
        }
    }
}
