pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use estimaro_core::config::{AppConfig, LoadOptions, LogFormat};
use tracing_subscriber::EnvFilter;

use commands::estimate::EstimateArgs;
use commands::score::ScoreArgs;

#[derive(Debug, Parser)]
#[command(
    name = "estimaro",
    about = "Estimaro repair estimate CLI",
    long_about = "Generate repair estimates from a VIN and a service request, inspect \
                  configuration, and check integration readiness.",
    after_help = "Examples:\n  estimaro estimate --vin 1HGBH41JXMN109186 \
                  --request \"front brake pads grinding\"\n  \
                  estimaro vin 1HGBH41JXMN109186 --decode\n  estimaro doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to an estimaro.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the estimate pipeline for one intake and print the result")]
    Estimate(EstimateArgs),
    #[command(about = "Validate a VIN check digit and optionally decode it")]
    Vin {
        vin: String,
        #[arg(long, help = "Decode the VIN (demo catalog unless --live)")]
        decode: bool,
        #[arg(long, help = "Decode against NHTSA vPIC instead of the demo catalog")]
        live: bool,
    },
    #[command(about = "Rank vendor offers from a JSON file with the composite vendor score")]
    Score(ScoreArgs),
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, scoring weights, vendor policy and integration readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
        #[arg(long, help = "Also call the configured NHTSA and scraper endpoints")]
        probe: bool,
    },
}

/// `RUST_LOG` directives win over `logging.level` when they parse.
fn log_filter(level: &str, env_directives: Option<String>) -> EnvFilter {
    env_directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

/// Logs go to stderr so command payloads on stdout stay machine-readable.
pub fn init_logging(config: &AppConfig) {
    let filter = log_filter(&config.logging.level, std::env::var("RUST_LOG").ok());
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config.clone(), ..LoadOptions::default() };

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(options) }
        }
        Command::Doctor { json, probe } => commands::doctor::run(options, json, probe),
        Command::Estimate(args) => {
            with_config(options, |config| commands::estimate::run(args, config))
        }
        Command::Vin { vin, decode, live } => {
            with_config(options, |config| commands::vin::run(&vin, decode, live, config))
        }
        Command::Score(args) => with_config(options, |config| commands::score::run(args, config)),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn with_config(
    options: LoadOptions,
    command: impl FnOnce(&AppConfig) -> commands::CommandResult,
) -> commands::CommandResult {
    match AppConfig::load(options) {
        Ok(config) => {
            init_logging(&config);
            command(&config)
        }
        Err(error) => {
            commands::CommandResult::failure("config", "config_validation", error.to_string(), 2)
        }
    }
}
