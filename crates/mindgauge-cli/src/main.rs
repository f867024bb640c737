//! mindgauge CLI: validate, inspect and run assessment templates.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "mindgauge", version, about = "Adaptive psychometric assessment engine")]
struct Cli {
    /// Config file path (default: ./mindgauge.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate template files
    Validate {
        /// Path to a template file or a directory of templates
        #[arg(long)]
        template: PathBuf,
    },

    /// Print the branching tree of a template
    Tree {
        /// Template file path or key
        #[arg(long)]
        template: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Drive one attempt and print the result
    Run {
        /// Template file path or key
        #[arg(long)]
        template: String,

        /// Comma-separated answers in question order ("skip" skips).
        /// Read one per line from stdin when omitted.
        #[arg(long)]
        answers: Option<String>,

        /// Output directory (default: from config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Do not write the result file
        #[arg(long)]
        no_save: bool,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// List available templates
    List,

    /// Create starter config and example template
    Init,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = config::load_config_from(cli.config.as_deref());
    let log_filter = config
        .as_ref()
        .map(|c| c.log_filter.clone())
        .unwrap_or_else(|_| "mindgauge=info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter)),
        )
        .init();

    let result = match config {
        Err(e) => Err(e),
        Ok(config) => match cli.command {
            Commands::Validate { template } => commands::validate::execute(template),
            Commands::Tree { template, format } => {
                commands::tree::execute(&template, &format, &config).await
            }
            Commands::Run {
                template,
                answers,
                output,
                no_save,
                format,
            } => {
                commands::run::execute(&template, answers, output, no_save, &format, &config)
                    .await
            }
            Commands::List => commands::list::execute(&config).await,
            Commands::Init => commands::init::execute(),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
