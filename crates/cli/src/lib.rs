pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use civiform_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "civiform",
    about = "Civiform operator CLI",
    long_about = "Inspect form schemas and run conversational fill sessions from the terminal.",
    after_help = "Examples:\n  civiform schema --category youth-rent-subsidy\n  civiform chat --category youth-rent-subsidy --script answers.txt"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a civiform.toml config file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Load a category's templates and report document/field counts as JSON")]
    Schema {
        #[arg(long, help = "Category slug, e.g. youth-rent-subsidy")]
        category: String,
        #[arg(long, help = "Override the configured schema directory")]
        docs_dir: Option<PathBuf>,
    },
    #[command(about = "Run a scripted conversation through the form agent, one turn per line")]
    Chat {
        #[arg(long, help = "Category slug, e.g. youth-rent-subsidy")]
        category: String,
        #[arg(long, help = "File with one citizen message per line")]
        script: PathBuf,
    },
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
        overrides: Default::default(),
    }) {
        Ok(config) => config,
        Err(error) => {
            let result =
                commands::CommandResult::failure("config", "config-load", error.to_string(), 2);
            println!("{}", result.output);
            return ExitCode::from(result.exit_code);
        }
    };
    init_logging(&config.logging);

    let result = match cli.command {
        Command::Schema { category, docs_dir } => {
            commands::schema::run(&config, &category, docs_dir)
        }
        Command::Chat { category, script } => {
            commands::chat::run(&config, &category, &script).await
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}
