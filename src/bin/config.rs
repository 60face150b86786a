//! Configuration CLI
//!
//! Inspect, scaffold and validate confluent-ops configuration.
//!
//! Usage:
//!   ops-config show --format toml
//!   ops-config init confluent-ops.toml
//!   ops-config validate --config prod.toml

use std::path::Path;

use clap::{Parser, Subcommand};
use confluent_ops::OpsConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ops-config")]
#[command(about = "Inspect and validate confluent-ops configuration")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved configuration with secrets masked
    Show {
        /// Output format (toml, json)
        #[arg(short, long, default_value = "toml")]
        format: String,
    },

    /// Write a default configuration file
    Init {
        /// Destination path
        #[arg(default_value = "confluent-ops.toml")]
        path: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check that the configuration is complete enough for a promotion run
    Validate,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show { format } => {
            let config = OpsConfig::load_from(cli.config.as_deref())?.masked();
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&config)?),
                "toml" => print!("{}", toml::to_string_pretty(&config)?),
                other => anyhow::bail!("unknown format '{}' (expected toml or json)", other),
            }
        }
        Commands::Init { path, force } => {
            if Path::new(&path).exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path);
            }
            OpsConfig::default().save(&path)?;
            println!("✅ Wrote default configuration to {}", path);
        }
        Commands::Validate => {
            let config = OpsConfig::load_from(cli.config.as_deref())?;
            config.validate_promotion()?;
            println!("✅ Configuration is valid");
            println!("   Source: {}", config.source.url);
            println!("   Target: {}", config.target.url);
            println!("   Compatibility: {}", config.promotion.compatibility);
        }
    }
    Ok(())
}
