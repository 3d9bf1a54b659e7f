use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chf_engine::config::Config;
use chf_engine::EngineError;

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_CONFIG: i32 = 4;
const EXIT_DATA: i32 = 5;
const EXIT_MODEL: i32 = 6;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train then score all years (default if no subcommand)
    Run {
        /// Show at most N score rows
        #[arg(long)]
        top: Option<usize>,
    },
    /// Learn per-stratum weights from the training years and save the model
    Train,
    /// Score years against the saved model and export CSV
    Score {
        /// Years to score (defaults to all_years from config)
        #[arg(long, value_delimiter = ',')]
        years: Option<Vec<i32>>,

        /// Show at most N score rows
        #[arg(long)]
        top: Option<usize>,
    },
    /// Write a default config file
    Init {
        /// Overwrite an existing config without asking
        #[arg(long)]
        force: bool,
    },
}

#[derive(Parser, Debug)]
#[command(name = "chf")]
#[command(about = "Crop Health Factor scoring with entropy-derived weights", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/chf/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "chf_engine=debug" } else { "chf_engine=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Map a pipeline failure to an exit code
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::Schema(_)) | Some(EngineError::NoTrainingData(_)) => EXIT_DATA,
        Some(EngineError::ModelIncomplete(_)) | Some(EngineError::InvalidModel(_)) => EXIT_MODEL,
        _ if err.downcast_ref::<chf_engine::SchemaError>().is_some() => EXIT_DATA,
        _ => EXIT_FAILURE,
    }
}

fn fail(context: &str, err: anyhow::Error) -> ! {
    tracing::error!("{} failed: {:#}", context, err);
    std::process::exit(exit_code(&err));
}

fn print_diagnostics(diagnostics: &[chf_engine::Diagnostic], use_colors: bool) {
    for d in diagnostics {
        eprintln!("{}", chf_engine::output::format_diagnostic(d, use_colors));
    }
}

async fn train(config: &Config, verbose: bool) {
    let summary = match chf_engine::pipeline::run_training(config).await {
        Ok(s) => s,
        Err(e) => fail("Training", e),
    };

    let use_colors = chf_engine::output::should_use_colors();
    print_diagnostics(&summary.output.diagnostics, use_colors);
    if verbose {
        println!(
            "{}",
            chf_engine::output::format_weights_table(&summary.output.model, use_colors)
        );
        println!();
    }
    println!(
        "Model trained on {} rows across {} strata. Saved to {}",
        summary.rows,
        summary.output.model.len(),
        summary.model_path.display()
    );
}

async fn score(config: &Config, years: Option<BTreeSet<i32>>, top: Option<usize>, verbose: bool) {
    let summary = match chf_engine::pipeline::run_scoring(config, years).await {
        Ok(s) => s,
        Err(e) => fail("Scoring", e),
    };

    let use_colors = chf_engine::output::should_use_colors();
    print_diagnostics(&summary.output.diagnostics, use_colors);

    if verbose {
        for result in summary.output.scores.iter().take(top.unwrap_or(usize::MAX)) {
            println!("{}", chf_engine::output::format_breakdown(result, use_colors));
            println!();
        }
    } else {
        println!(
            "{}",
            chf_engine::output::format_results_table(&summary.output.scores, use_colors, top)
        );
    }

    println!(
        "Scored {} rows for years {:?}. Saved to {}",
        summary.output.scores.len(),
        summary.years,
        summary.results_path.display()
    );
}

/// Load and validate config, exiting with EXIT_CONFIG on any problem
fn load_validated_config(path: Option<PathBuf>) -> Config {
    let config = match chf_engine::config::load_config(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    // Validate config at startup
    if let Err(errors) = chf_engine::config::validate_config(&config) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    tracing::debug!(
        training_years = ?config.training_years,
        all_years = ?config.all_years,
        strata_key = %config.strata_key,
        "config loaded"
    );
    config
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command = cli.command.unwrap_or(Commands::Run { top: None });
    let config_path = cli.config.map(PathBuf::from);

    match command {
        Commands::Init { force } => match chf_engine::config::init::run_init(config_path, force) {
            Ok(Some(path)) => println!("Config written to {}", path.display()),
            Ok(None) => println!("Aborted."),
            Err(e) => {
                eprintln!("Config error: {:#}", e);
                std::process::exit(EXIT_CONFIG);
            }
        },
        Commands::Run { top } => {
            let config = load_validated_config(config_path);
            train(&config, cli.verbose).await;
            score(&config, None, top, cli.verbose).await;
        }
        Commands::Train => {
            let config = load_validated_config(config_path);
            train(&config, cli.verbose).await;
        }
        Commands::Score { years, top } => {
            let config = load_validated_config(config_path);
            let years = years.map(|ys| ys.into_iter().collect());
            score(&config, years, top, cli.verbose).await;
        }
    }

    std::process::exit(EXIT_SUCCESS);
}
