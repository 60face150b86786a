//! Confluent CLI command dispatch
//!
//! Operator intents are typed commands that validate locally and render to a
//! `confluent` argument vector. A [`CommandRunner`] executes the vector; tests
//! substitute a recording runner for the real binary.

pub mod acl;
pub mod topic;

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::config::CliConfig;
use crate::error::{OpsError, Result};

pub use acl::{AclCommand, AclManager, AclOperation, AclRule, Permission, ResourceType};
pub use topic::{TopicCommand, TopicManager, TopicSpec, TopicUpdate};

/// Executes one `confluent` invocation and returns its stdout
pub trait CommandRunner {
    fn run(&self, args: &[String]) -> Result<String>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, args: &[String]) -> Result<String> {
        (**self).run(args)
    }
}

/// Runs the real `confluent` binary
#[derive(Debug, Clone)]
pub struct ConfluentCli {
    binary: PathBuf,
}

impl ConfluentCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn from_config(config: &CliConfig) -> Self {
        Self::new(&config.binary)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Default for ConfluentCli {
    fn default() -> Self {
        Self::new("confluent")
    }
}

impl CommandRunner for ConfluentCli {
    fn run(&self, args: &[String]) -> Result<String> {
        let rendered = render(&self.binary, args);
        debug!("Running: {}", rendered);

        let output = Command::new(&self.binary).args(args).output()?;
        if !output.status.success() {
            return Err(OpsError::CommandFailed {
                command: rendered,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn render(binary: &Path, args: &[String]) -> String {
    std::iter::once(binary.display().to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Environment and cluster the Kafka commands target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KafkaContext {
    pub environment: Option<String>,
    pub cluster: Option<String>,
}

impl KafkaContext {
    pub fn from_config(config: &CliConfig) -> Self {
        Self {
            environment: config.environment.clone(),
            cluster: config.cluster.clone(),
        }
    }

    /// `--environment` / `--cluster` flags for Kafka subcommands
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(env) = &self.environment {
            args.extend(["--environment".to_string(), env.clone()]);
        }
        if let Some(cluster) = &self.cluster {
            args.extend(["--cluster".to_string(), cluster.clone()]);
        }
        args
    }
}

/// `confluent environment ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentCommand {
    List,
    Use(String),
}

impl EnvironmentCommand {
    pub fn to_args(&self) -> Vec<String> {
        match self {
            EnvironmentCommand::List => strings(&["environment", "list"]),
            EnvironmentCommand::Use(id) => strings(&["environment", "use", id.as_str()]),
        }
    }
}

/// `confluent kafka cluster ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCommand {
    List,
    Use(String),
}

impl ClusterCommand {
    pub fn to_args(&self, context: &KafkaContext) -> Vec<String> {
        match self {
            ClusterCommand::List => {
                let mut args = strings(&["kafka", "cluster", "list"]);
                if let Some(env) = &context.environment {
                    args.extend(["--environment".to_string(), env.clone()]);
                }
                args
            }
            ClusterCommand::Use(id) => strings(&["kafka", "cluster", "use", id.as_str()]),
        }
    }
}

pub(crate) fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
