//! ApiAtlas — entry point.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use api_atlas_cli::commands;
use api_atlas_cli::config::{resolve_config_path, AtlasConfig};

#[derive(Parser)]
#[command(
    name = "api-atlas",
    about = "Introspect backend services and emit one unified API graph",
    version
)]
struct Cli {
    /// Path to the config file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the unified graph and write it as JSON.
    Build {
        /// Output file (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the configured strategy (Postfix, OnlyOrigin).
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Load and parse every origin without unifying.
    Validate,

    /// Print tool and config information as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   api-atlas completions bash > ~/.local/share/bash-completion/completions/api-atlas
    ///   api-atlas completions zsh > ~/.zfunc/_api-atlas
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build { output, strategy } => {
            let mut config = load_config(cli.config.as_deref())?;
            if strategy.is_some() {
                config.strategy = strategy;
            }
            let summary = commands::build(&config, output.as_deref()).await?;
            tracing::info!(
                "Built {} buckets: {} sources, {} controllers, {} methods",
                summary.buckets,
                summary.sources,
                summary.controllers,
                summary.methods
            );
        }

        Commands::Validate => {
            let config_path = resolve_config_path(cli.config.as_deref());
            let config = match AtlasConfig::load(Path::new(&config_path)) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Invalid config: {e}");
                    std::process::exit(1);
                }
            };
            match commands::validate(&config).await {
                Ok(reports) => {
                    println!("Valid config: {config_path}");
                    for report in reports {
                        println!("  {}:", report.name);
                        println!("    Buckets: {}", report.buckets.join(", "));
                        println!("    Sources: {}", report.sources);
                        println!("    Controllers: {}", report.controllers);
                    }
                }
                Err(e) => {
                    eprintln!("Invalid origin set: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Info => {
            let info = commands::info(cli.config.as_deref());
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "api-atlas", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn load_config(explicit: Option<&str>) -> anyhow::Result<AtlasConfig> {
    let path = resolve_config_path(explicit);
    tracing::debug!("Using config {path}");
    Ok(AtlasConfig::load(Path::new(&path))?)
}
