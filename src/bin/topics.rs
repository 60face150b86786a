//! Kafka Topic CLI
//!
//! Create, update, delete, describe and list topics through the Confluent CLI.

use clap::{Parser, Subcommand};
use confluent_ops::confluent::topic::parse_config_entry;
use confluent_ops::confluent::{
    ClusterCommand, CommandRunner, ConfluentCli, EnvironmentCommand, KafkaContext, TopicCommand,
    TopicManager, TopicSpec, TopicUpdate,
};
use confluent_ops::OpsConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kafka-topics")]
#[command(about = "Manage Kafka topics through the Confluent CLI")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Environment id (overrides config)
    #[arg(long, global = true)]
    environment: Option<String>,

    /// Kafka cluster id (overrides config)
    #[arg(long, global = true)]
    cluster: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List topics
    List,

    /// Create a topic
    Create {
        /// Topic name
        name: String,
        /// Number of partitions
        #[arg(short, long, default_value_t = 6)]
        partitions: u32,
        /// Topic config entry, repeatable
        #[arg(long = "set", value_name = "KEY=VALUE")]
        configs: Vec<String>,
    },

    /// Update topic configs or increase partitions
    Update {
        /// Topic name
        name: String,
        /// New partition count (increase only)
        #[arg(short, long)]
        partitions: Option<u32>,
        /// Topic config entry, repeatable
        #[arg(long = "set", value_name = "KEY=VALUE")]
        configs: Vec<String>,
    },

    /// Delete a topic
    Delete {
        /// Topic name
        name: String,
    },

    /// Describe a topic
    Describe {
        /// Topic name
        name: String,
    },

    /// List environments, or switch to one
    Env {
        /// Environment id to use
        id: Option<String>,
    },

    /// List Kafka clusters, or switch to one
    Cluster {
        /// Cluster id to use
        id: Option<String>,
    },
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

fn parse_configs(entries: &[String]) -> confluent_ops::Result<Vec<(String, String)>> {
    entries.iter().map(|entry| parse_config_entry(entry)).collect()
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = OpsConfig::load_from(cli.config.as_deref())?;
    let runner = ConfluentCli::from_config(&config.cli);
    let mut context = KafkaContext::from_config(&config.cli);
    if cli.environment.is_some() {
        context.environment = cli.environment;
    }
    if cli.cluster.is_some() {
        context.cluster = cli.cluster;
    }

    let command = match cli.command {
        Commands::Env { id } => {
            let command = id.map_or(EnvironmentCommand::List, EnvironmentCommand::Use);
            print!("{}", runner.run(&command.to_args())?);
            return Ok(());
        }
        Commands::Cluster { id } => {
            let command = id.map_or(ClusterCommand::List, ClusterCommand::Use);
            print!("{}", runner.run(&command.to_args(&context))?);
            return Ok(());
        }
        Commands::List => TopicCommand::List,
        Commands::Create {
            name,
            partitions,
            configs,
        } => TopicCommand::Create(TopicSpec {
            name,
            partitions,
            configs: parse_configs(&configs)?,
        }),
        Commands::Update {
            name,
            partitions,
            configs,
        } => TopicCommand::Update(TopicUpdate {
            name,
            partitions,
            configs: parse_configs(&configs)?,
        }),
        Commands::Delete { name } => TopicCommand::Delete { name },
        Commands::Describe { name } => TopicCommand::Describe { name },
    };

    let manager = TopicManager::new(runner, context);
    let output = manager.execute(&command)?;
    print!("{}", output);

    match &command {
        TopicCommand::Create(spec) => println!("✅ Created topic {}", spec.name),
        TopicCommand::Update(update) => println!("✅ Updated topic {}", update.name),
        TopicCommand::Delete { name } => println!("✅ Deleted topic {}", name),
        TopicCommand::List | TopicCommand::Describe { .. } => {}
    }
    Ok(())
}
