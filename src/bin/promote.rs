//! Schema Promotion CLI
//!
//! Promotes the latest schema of each subject from a source Schema Registry to
//! a target Schema Registry.
//!
//! Usage:
//!   schema-promote --source-url https://psrc-dev... --target-url https://psrc-prod... \
//!       --subjects "orders-value users-value"
//!   schema-promote --config confluent-ops.toml --debug

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use confluent_ops::logging::init_run_log;
use confluent_ops::{
    OpsConfig, PromotionOutcome, PromotionSettings, Promoter, RegistryClient, SubjectSource,
};

#[derive(Parser)]
#[command(name = "schema-promote")]
#[command(about = "Promote schemas from a source Schema Registry to a target Schema Registry")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long)]
    config: Option<String>,

    /// Source registry base URL
    #[arg(long)]
    source_url: Option<String>,

    /// Source registry API key
    #[arg(long)]
    source_key: Option<String>,

    /// Source registry API secret
    #[arg(long)]
    source_secret: Option<String>,

    /// Target registry base URL
    #[arg(long)]
    target_url: Option<String>,

    /// Target registry API key
    #[arg(long)]
    target_key: Option<String>,

    /// Target registry API secret
    #[arg(long)]
    target_secret: Option<String>,

    /// Compatibility level applied on the target (default: BACKWARD)
    #[arg(long)]
    compatibility: Option<String>,

    /// Subjects to promote, whitespace separated. Omit to promote every source subject.
    #[arg(short, long, num_args = 1..)]
    subjects: Vec<String>,

    /// Regex restricting discovered subjects
    #[arg(long)]
    filter: Option<String>,

    /// Pause between subjects in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Run log path (default: schema_promotion.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Echo every log line, not only errors
    #[arg(long)]
    debug: bool,
}

impl Cli {
    /// Layer command-line values over the loaded configuration
    fn apply(self, config: &mut OpsConfig) -> anyhow::Result<()> {
        if let Some(url) = self.source_url {
            config.source.url = url;
        }
        if self.source_key.is_some() {
            config.source.api_key = self.source_key;
        }
        if self.source_secret.is_some() {
            config.source.api_secret = self.source_secret;
        }
        if let Some(url) = self.target_url {
            config.target.url = url;
        }
        if self.target_key.is_some() {
            config.target.api_key = self.target_key;
        }
        if self.target_secret.is_some() {
            config.target.api_secret = self.target_secret;
        }
        if let Some(level) = self.compatibility {
            config.promotion.compatibility = level.parse()?;
        }
        if let SubjectSource::Explicit(subjects) = SubjectSource::from_tokens(&self.subjects.join(" ")) {
            config.promotion.subjects = subjects;
        }
        if self.filter.is_some() {
            config.promotion.subject_filter = self.filter;
        }
        if let Some(delay) = self.delay_ms {
            config.promotion.delay_ms = delay;
        }
        if let Some(path) = self.log_file {
            config.promotion.log_file = path;
        }
        if self.debug {
            config.promotion.debug = true;
        }
        Ok(())
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone();
    let mut config = OpsConfig::load_from(config_path.as_deref())?;
    cli.apply(&mut config)?;
    config.validate_promotion()?;

    let log_path = config.promotion.log_path();
    init_run_log(&log_path, config.promotion.debug)
        .with_context(|| format!("opening run log {}", log_path.display()))?;

    let source = RegistryClient::from_config(&config.source)?;
    let target = RegistryClient::from_config(&config.target)?;
    let filter = config.promotion.filter()?;
    let subjects = config.promotion.subject_source();

    println!("🚀 Schema Promotion");
    println!("   Source: {}", config.source.url);
    println!("   Target: {}", config.target.url);
    println!("   Compatibility: {}", config.promotion.compatibility);
    match &subjects {
        SubjectSource::Explicit(names) => println!("   Subjects: {}", names.join(" ")),
        SubjectSource::Discover => println!("   Subjects: all source subjects"),
    }
    println!();

    let promoter = Promoter::new(source, target, PromotionSettings::from(&config.promotion));
    let summary = promoter
        .run(&subjects, filter.as_ref())
        .context("could not enumerate subjects from the source registry")?;

    for (subject, outcome) in &summary.outcomes {
        let marker = match outcome {
            PromotionOutcome::Promoted { .. } => "✅",
            PromotionOutcome::Skipped => "⏭️ ",
            PromotionOutcome::Failed(_) => "❌",
        };
        println!("{} {} - {}", marker, subject, outcome);
    }

    println!();
    println!("📊 Summary: {}", summary);
    println!("📄 Log: {}", log_path.display());
    Ok(())
}
