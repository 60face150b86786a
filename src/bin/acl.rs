//! Kafka ACL CLI
//!
//! List, create and delete ACL rules through the Confluent CLI.
//!
//! Usage:
//!   kafka-acl list --principal sa-123456
//!   kafka-acl create --principal sa-123456 --operations read,describe --resource topic --name orders
//!   kafka-acl delete --principal sa-123456 --operations read --resource consumer-group --name billing --prefix
//!   kafka-acl env env-a1b2c3

use clap::{Args, Parser, Subcommand};
use confluent_ops::confluent::{
    AclCommand, AclManager, AclOperation, AclRule, ClusterCommand, CommandRunner, ConfluentCli,
    EnvironmentCommand, KafkaContext,
};
use confluent_ops::OpsConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kafka-acl")]
#[command(about = "Manage Kafka ACLs through the Confluent CLI")]
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
    /// List ACLs
    List {
        /// Only ACLs for this principal (sa-... or User:...)
        #[arg(long)]
        principal: Option<String>,
    },

    /// Create an ACL
    Create(RuleArgs),

    /// Delete an ACL
    Delete(RuleArgs),

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

#[derive(Args)]
struct RuleArgs {
    /// Service account (sa-...) or user id
    #[arg(long)]
    principal: String,

    /// allow or deny
    #[arg(long, default_value = "allow")]
    permission: String,

    /// Comma-separated operations, e.g. read,describe
    #[arg(long)]
    operations: String,

    /// topic, consumer-group, cluster-scope or transactional-id
    #[arg(long)]
    resource: String,

    /// Resource name (not used for cluster-scope)
    #[arg(long)]
    name: Option<String>,

    /// Match resource names by prefix
    #[arg(long)]
    prefix: bool,
}

impl RuleArgs {
    fn into_rule(self) -> confluent_ops::Result<AclRule> {
        Ok(AclRule {
            principal: self.principal,
            permission: self.permission.parse()?,
            operations: AclOperation::parse_list(&self.operations)?,
            resource: self.resource.parse()?,
            resource_name: self.name,
            prefix: self.prefix,
        })
    }
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
        Commands::List { principal } => AclCommand::List { principal },
        Commands::Create(args) => AclCommand::Create(args.into_rule()?),
        Commands::Delete(args) => AclCommand::Delete(args.into_rule()?),
    };

    let manager = AclManager::new(runner, context);
    print!("{}", manager.execute(&command)?);

    match &command {
        AclCommand::Create(rule) => println!("✅ Created {:?} ACL for {}", rule.permission, rule.principal),
        AclCommand::Delete(rule) => println!("✅ Deleted {:?} ACL for {}", rule.permission, rule.principal),
        AclCommand::List { .. } => {}
    }
    Ok(())
}
