//! Kafka topic lifecycle through `confluent kafka topic`

use regex::Regex;
use serde_json::Value;
use tracing::info;

use super::{strings, CommandRunner, KafkaContext};
use crate::error::{OpsError, Result};

const MAX_TOPIC_NAME_LEN: usize = 249;
const PARTITIONS_CONFIG: &str = "num.partitions";

/// A topic to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: u32,
    pub configs: Vec<(String, String)>,
}

/// Changes to an existing topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicUpdate {
    pub name: String,
    /// New partition count; must exceed the current one
    pub partitions: Option<u32>,
    pub configs: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicCommand {
    List,
    Create(TopicSpec),
    Update(TopicUpdate),
    Delete { name: String },
    Describe { name: String },
}

/// Kafka topic naming rules: 1-249 of `[a-zA-Z0-9._-]`, never `.` or `..`
pub fn validate_topic_name(name: &str) -> Result<()> {
    let legal = Regex::new(r"^[a-zA-Z0-9._-]+$")?;
    if name.is_empty() || name.len() > MAX_TOPIC_NAME_LEN {
        return Err(OpsError::validation(format!(
            "Invalid topic name '{name}': must be 1-{MAX_TOPIC_NAME_LEN} characters"
        )));
    }
    if name == "." || name == ".." || !legal.is_match(name) {
        return Err(OpsError::validation(format!(
            "Invalid topic name '{name}': only letters, digits, '.', '_' and '-' are allowed"
        )));
    }
    Ok(())
}

/// Parse a `key=value` topic config entry
pub fn parse_config_entry(entry: &str) -> Result<(String, String)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(OpsError::validation(format!(
            "Invalid config entry '{entry}': expected key=value"
        ))),
    }
}

fn config_args(configs: &[(String, String)]) -> Vec<String> {
    configs
        .iter()
        .flat_map(|(key, value)| ["--config".to_string(), format!("{key}={value}")])
        .collect()
}

impl TopicCommand {
    /// Local checks that need no cluster state
    pub fn validate(&self) -> Result<()> {
        match self {
            TopicCommand::List => Ok(()),
            TopicCommand::Create(spec) => {
                validate_topic_name(&spec.name)?;
                if spec.partitions == 0 {
                    return Err(OpsError::validation("Partition count must be at least 1"));
                }
                if spec.configs.iter().any(|(key, _)| key == PARTITIONS_CONFIG) {
                    return Err(OpsError::validation(
                        "Set the partition count with --partitions, not as a config entry",
                    ));
                }
                Ok(())
            }
            TopicCommand::Update(update) => {
                validate_topic_name(&update.name)?;
                if update.partitions.is_none() && update.configs.is_empty() {
                    return Err(OpsError::validation(format!(
                        "Nothing to update for topic '{}'",
                        update.name
                    )));
                }
                if update.partitions == Some(0) {
                    return Err(OpsError::validation("Partition count must be at least 1"));
                }
                Ok(())
            }
            TopicCommand::Delete { name } | TopicCommand::Describe { name } => validate_topic_name(name),
        }
    }

    /// Argument vector for the confluent binary
    pub fn to_args(&self, context: &KafkaContext) -> Vec<String> {
        let mut args = match self {
            TopicCommand::List => strings(&["kafka", "topic", "list"]),
            TopicCommand::Create(spec) => {
                let mut args = strings(&["kafka", "topic", "create", spec.name.as_str()]);
                args.extend(["--partitions".to_string(), spec.partitions.to_string()]);
                args.extend(config_args(&spec.configs));
                args
            }
            TopicCommand::Update(update) => {
                let mut args = strings(&["kafka", "topic", "update", update.name.as_str()]);
                args.extend(config_args(&update.configs));
                if let Some(partitions) = update.partitions {
                    args.extend(["--config".to_string(), format!("{PARTITIONS_CONFIG}={partitions}")]);
                }
                args
            }
            TopicCommand::Delete { name } => {
                strings(&["kafka", "topic", "delete", name.as_str(), "--force"])
            }
            TopicCommand::Describe { name } => strings(&["kafka", "topic", "describe", name.as_str()]),
        };
        args.extend(context.args());
        args
    }
}

/// Extract the partition count from `kafka topic describe --output json`.
///
/// Accepts the config-list shape (`[{"name": "num.partitions", "value": "6"}, ...]`)
/// and the object shape (`{"partition_count": 6}` or `{"config": {"num.partitions": "6"}}`).
pub fn parse_partition_count(output: &str) -> Result<u32> {
    let value: Value = serde_json::from_str(output)?;

    let found = match &value {
        Value::Array(entries) => entries
            .iter()
            .find(|entry| entry.get("name").and_then(Value::as_str) == Some(PARTITIONS_CONFIG))
            .and_then(|entry| entry.get("value")),
        Value::Object(map) => map
            .get("partition_count")
            .or_else(|| map.get("config").and_then(|config| config.get(PARTITIONS_CONFIG))),
        _ => None,
    };

    found
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| OpsError::validation("Could not determine the topic's current partition count"))
}

/// Validates and executes topic commands
pub struct TopicManager<R> {
    runner: R,
    context: KafkaContext,
}

impl<R: CommandRunner> TopicManager<R> {
    pub fn new(runner: R, context: KafkaContext) -> Self {
        Self { runner, context }
    }

    /// Validate and run a command, returning the CLI's stdout
    pub fn execute(&self, command: &TopicCommand) -> Result<String> {
        command.validate()?;

        if let TopicCommand::Update(TopicUpdate {
            name,
            partitions: Some(requested),
            ..
        }) = command
        {
            let current = self.partition_count(name)?;
            if *requested < current {
                return Err(OpsError::validation(format!(
                    "Cannot decrease partitions for topic '{name}' from {current} to {requested}"
                )));
            }
            if *requested == current {
                return Err(OpsError::validation(format!(
                    "Topic '{name}' already has {current} partitions"
                )));
            }
        }

        let args = command.to_args(&self.context);
        info!("confluent {}", args.join(" "));
        self.runner.run(&args)
    }

    /// Current partition count as reported by `describe`
    pub fn partition_count(&self, name: &str) -> Result<u32> {
        let mut args = strings(&["kafka", "topic", "describe", name, "--output", "json"]);
        args.extend(self.context.args());
        parse_partition_count(&self.runner.run(&args)?)
    }
}
