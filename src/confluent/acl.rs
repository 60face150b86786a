//! Kafka ACL rules through `confluent kafka acl`

use std::fmt;
use std::str::FromStr;

use tracing::info;

use super::{strings, CommandRunner, KafkaContext};
use crate::error::{OpsError, Result};

/// Kind of resource an ACL applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Topic,
    ConsumerGroup,
    ClusterScope,
    TransactionalId,
}

impl ResourceType {
    /// CLI flag selecting this resource
    pub fn flag(&self) -> &'static str {
        match self {
            ResourceType::Topic => "--topic",
            ResourceType::ConsumerGroup => "--consumer-group",
            ResourceType::ClusterScope => "--cluster-scope",
            ResourceType::TransactionalId => "--transactional-id",
        }
    }

    /// Operations Kafka defines for this resource
    pub fn allowed_operations(&self) -> &'static [AclOperation] {
        use AclOperation::*;
        match self {
            ResourceType::Topic => &[Alter, AlterConfigs, Create, Delete, Describe, DescribeConfigs, Read, Write],
            ResourceType::ConsumerGroup => &[Delete, Describe, Read],
            ResourceType::ClusterScope => &[
                Alter,
                AlterConfigs,
                ClusterAction,
                Create,
                Describe,
                DescribeConfigs,
                IdempotentWrite,
            ],
            ResourceType::TransactionalId => &[Describe, Write],
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag().trim_start_matches("--"))
    }
}

impl FromStr for ResourceType {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize(s).as_str() {
            "topic" => Ok(ResourceType::Topic),
            "consumer-group" | "group" => Ok(ResourceType::ConsumerGroup),
            "cluster-scope" | "cluster" => Ok(ResourceType::ClusterScope),
            "transactional-id" => Ok(ResourceType::TransactionalId),
            _ => Err(OpsError::validation(format!(
                "Invalid resource type '{s}': expected topic, consumer-group, cluster-scope or transactional-id"
            ))),
        }
    }
}

/// Allow or deny
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Allow,
    Deny,
}

impl Permission {
    pub fn flag(&self) -> &'static str {
        match self {
            Permission::Allow => "--allow",
            Permission::Deny => "--deny",
        }
    }
}

impl FromStr for Permission {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize(s).as_str() {
            "allow" => Ok(Permission::Allow),
            "deny" => Ok(Permission::Deny),
            _ => Err(OpsError::validation(format!(
                "Invalid permission type '{s}': expected allow or deny"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclOperation {
    Alter,
    AlterConfigs,
    ClusterAction,
    Create,
    Delete,
    Describe,
    DescribeConfigs,
    IdempotentWrite,
    Read,
    Write,
}

impl AclOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            AclOperation::Alter => "alter",
            AclOperation::AlterConfigs => "alter-configs",
            AclOperation::ClusterAction => "cluster-action",
            AclOperation::Create => "create",
            AclOperation::Delete => "delete",
            AclOperation::Describe => "describe",
            AclOperation::DescribeConfigs => "describe-configs",
            AclOperation::IdempotentWrite => "idempotent-write",
            AclOperation::Read => "read",
            AclOperation::Write => "write",
        }
    }

    /// Parse a comma-separated operation list
    pub fn parse_list(input: &str) -> Result<Vec<AclOperation>> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for AclOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AclOperation {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize(s);
        [
            AclOperation::Alter,
            AclOperation::AlterConfigs,
            AclOperation::ClusterAction,
            AclOperation::Create,
            AclOperation::Delete,
            AclOperation::Describe,
            AclOperation::DescribeConfigs,
            AclOperation::IdempotentWrite,
            AclOperation::Read,
            AclOperation::Write,
        ]
        .into_iter()
        .find(|op| op.as_str() == wanted)
        .ok_or_else(|| OpsError::validation(format!("Invalid operation '{s}'")))
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace('_', "-")
}

/// Principal flags: `--service-account sa-x` or `--principal User:x`
fn principal_args(principal: &str) -> Vec<String> {
    let principal = principal.trim();
    if principal.starts_with("sa-") {
        strings(&["--service-account", principal])
    } else if principal.starts_with("User:") {
        strings(&["--principal", principal])
    } else {
        vec!["--principal".to_string(), format!("User:{principal}")]
    }
}

/// One ACL binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclRule {
    /// `sa-...` service account, or a user id (optionally `User:` prefixed)
    pub principal: String,
    pub permission: Permission,
    pub operations: Vec<AclOperation>,
    pub resource: ResourceType,
    /// Required for everything except cluster scope
    pub resource_name: Option<String>,
    /// Match resource names by prefix
    pub prefix: bool,
}

impl AclRule {
    pub fn validate(&self) -> Result<()> {
        if self.principal.trim().is_empty() {
            return Err(OpsError::validation("A principal is required"));
        }
        if self.operations.is_empty() {
            return Err(OpsError::validation("At least one operation is required"));
        }

        let allowed = self.resource.allowed_operations();
        if let Some(op) = self.operations.iter().find(|op| !allowed.contains(*op)) {
            return Err(OpsError::validation(format!(
                "Invalid {} operation '{}': allowed operations are {}",
                self.resource,
                op,
                allowed.iter().map(AclOperation::as_str).collect::<Vec<_>>().join(", ")
            )));
        }

        match (self.resource, self.resource_name.as_deref()) {
            (ResourceType::ClusterScope, Some(_)) => Err(OpsError::validation(
                "Cluster-scope ACLs do not take a resource name",
            )),
            (ResourceType::ClusterScope, None) if self.prefix => Err(OpsError::validation(
                "Cluster-scope ACLs cannot use --prefix",
            )),
            (ResourceType::ClusterScope, None) => Ok(()),
            (resource, None) => Err(OpsError::validation(format!(
                "A {resource} name is required"
            ))),
            (resource, Some(name)) if name.trim().is_empty() => Err(OpsError::validation(
                format!("A {resource} name is required"),
            )),
            _ => Ok(()),
        }
    }

    /// Flags shared by create and delete
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.permission.flag().to_string()];
        args.extend(principal_args(&self.principal));
        args.push("--operations".to_string());
        args.push(
            self.operations
                .iter()
                .map(AclOperation::as_str)
                .collect::<Vec<_>>()
                .join(","),
        );
        args.push(self.resource.flag().to_string());
        if let Some(name) = &self.resource_name {
            args.push(name.clone());
        }
        if self.prefix {
            args.push("--prefix".to_string());
        }
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclCommand {
    /// List ACLs, optionally for one principal
    List { principal: Option<String> },
    Create(AclRule),
    Delete(AclRule),
}

impl AclCommand {
    pub fn validate(&self) -> Result<()> {
        match self {
            AclCommand::List { .. } => Ok(()),
            AclCommand::Create(rule) | AclCommand::Delete(rule) => rule.validate(),
        }
    }

    pub fn to_args(&self, context: &KafkaContext) -> Vec<String> {
        let mut args = match self {
            AclCommand::List { principal } => {
                let mut args = strings(&["kafka", "acl", "list"]);
                if let Some(principal) = principal.as_deref().filter(|p| !p.trim().is_empty()) {
                    args.extend(principal_args(principal));
                }
                args
            }
            AclCommand::Create(rule) => {
                let mut args = strings(&["kafka", "acl", "create"]);
                args.extend(rule.args());
                args
            }
            AclCommand::Delete(rule) => {
                let mut args = strings(&["kafka", "acl", "delete"]);
                args.extend(rule.args());
                args.push("--force".to_string());
                args
            }
        };
        args.extend(context.args());
        args
    }
}

/// Validates and executes ACL commands
pub struct AclManager<R> {
    runner: R,
    context: KafkaContext,
}

impl<R: CommandRunner> AclManager<R> {
    pub fn new(runner: R, context: KafkaContext) -> Self {
        Self { runner, context }
    }

    pub fn execute(&self, command: &AclCommand) -> Result<String> {
        command.validate()?;
        let args = command.to_args(&self.context);
        info!("confluent {}", args.join(" "));
        self.runner.run(&args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confluent::testing::RecordingRunner;

    fn topic_rule() -> AclRule {
        AclRule {
            principal: "sa-123456".into(),
            permission: Permission::Allow,
            operations: vec![AclOperation::Read, AclOperation::Describe],
            resource: ResourceType::Topic,
            resource_name: Some("orders".into()),
            prefix: false,
        }
    }

    #[test]
    fn test_parse_resource_type() {
        assert_eq!("Topic".parse::<ResourceType>().unwrap(), ResourceType::Topic);
        assert_eq!("consumer_group".parse::<ResourceType>().unwrap(), ResourceType::ConsumerGroup);
        assert_eq!("cluster".parse::<ResourceType>().unwrap(), ResourceType::ClusterScope);
        let err = "schema".parse::<ResourceType>().unwrap_err();
        assert!(err.to_string().starts_with("Invalid resource type 'schema'"));
    }

    #[test]
    fn test_parse_permission() {
        assert_eq!("ALLOW".parse::<Permission>().unwrap(), Permission::Allow);
        assert_eq!("deny".parse::<Permission>().unwrap(), Permission::Deny);
        let err = "maybe".parse::<Permission>().unwrap_err();
        assert!(err.to_string().starts_with("Invalid permission type"));
    }

    #[test]
    fn test_parse_operation_list() {
        assert_eq!(
            AclOperation::parse_list("read, describe_configs,IDEMPOTENT-WRITE").unwrap(),
            vec![AclOperation::Read, AclOperation::DescribeConfigs, AclOperation::IdempotentWrite]
        );
        assert!(AclOperation::parse_list("read,fly").is_err());
    }

    #[test]
    fn test_create_args_service_account() {
        let args = AclCommand::Create(topic_rule()).to_args(&KafkaContext::default());
        assert_eq!(
            args,
            strings(&[
                "kafka", "acl", "create", "--allow", "--service-account", "sa-123456",
                "--operations", "read,describe", "--topic", "orders",
            ])
        );
    }

    #[test]
    fn test_user_principal_prefixed() {
        let rule = AclRule {
            principal: "u-abc".into(),
            prefix: true,
            ..topic_rule()
        };
        let args = rule.args();
        assert_eq!(&args[1..3], &strings(&["--principal", "User:u-abc"])[..]);
        assert_eq!(args.last().unwrap(), "--prefix");

        let rule = AclRule {
            principal: "User:u-abc".into(),
            ..topic_rule()
        };
        assert_eq!(&rule.args()[1..3], &strings(&["--principal", "User:u-abc"])[..]);
    }

    #[test]
    fn test_list_renders_principal_like_create() {
        let list = AclCommand::List {
            principal: Some(" u-abc ".into()),
        }
        .to_args(&KafkaContext::default());
        assert_eq!(list, strings(&["kafka", "acl", "list", "--principal", "User:u-abc"]));

        let rule = AclRule {
            principal: "u-abc".into(),
            ..topic_rule()
        };
        assert_eq!(&list[3..], &rule.args()[1..3]);

        let list = AclCommand::List {
            principal: Some("sa-123456".into()),
        }
        .to_args(&KafkaContext::default());
        assert_eq!(list, strings(&["kafka", "acl", "list", "--service-account", "sa-123456"]));

        let list = AclCommand::List { principal: None }.to_args(&KafkaContext::default());
        assert_eq!(list, strings(&["kafka", "acl", "list"]));
    }

    #[test]
    fn test_invalid_cluster_scope_operation() {
        let rule = AclRule {
            operations: vec![AclOperation::Read],
            resource: ResourceType::ClusterScope,
            resource_name: None,
            ..topic_rule()
        };
        let err = rule.validate().unwrap_err();
        assert!(err.to_string().starts_with("Invalid cluster-scope operation 'read'"));
    }

    #[test]
    fn test_cluster_scope_rejects_name_and_prefix() {
        let rule = AclRule {
            operations: vec![AclOperation::Describe],
            resource: ResourceType::ClusterScope,
            resource_name: Some("kafka-cluster".into()),
            ..topic_rule()
        };
        assert!(rule.validate().is_err());

        let rule = AclRule {
            resource_name: None,
            prefix: true,
            ..rule
        };
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_cluster_scope_args() {
        let rule = AclRule {
            operations: vec![AclOperation::IdempotentWrite],
            resource: ResourceType::ClusterScope,
            resource_name: None,
            ..topic_rule()
        };
        rule.validate().unwrap();
        assert_eq!(
            rule.args(),
            strings(&["--allow", "--service-account", "sa-123456", "--operations", "idempotent-write", "--cluster-scope"])
        );
    }

    #[test]
    fn test_topic_requires_name() {
        let rule = AclRule {
            resource_name: None,
            ..topic_rule()
        };
        assert_eq!(rule.validate().unwrap_err().to_string(), "A topic name is required");
    }

    #[test]
    fn test_delete_is_forced_and_scoped() {
        let context = KafkaContext {
            environment: Some("env-1".into()),
            cluster: Some("lkc-1".into()),
        };
        let args = AclCommand::Delete(topic_rule()).to_args(&context);
        assert_eq!(args[..3], strings(&["kafka", "acl", "delete"])[..]);
        assert!(args.ends_with(&strings(&["--force", "--environment", "env-1", "--cluster", "lkc-1"])));
    }

    #[test]
    fn test_list_for_principal() {
        let args = AclCommand::List { principal: Some("sa-9".into()) }.to_args(&KafkaContext::default());
        assert_eq!(args, strings(&["kafka", "acl", "list", "--service-account", "sa-9"]));
    }

    #[test]
    fn test_invalid_rule_issues_no_command() {
        let runner = RecordingRunner::default();
        let manager = AclManager::new(&runner, KafkaContext::default());
        let rule = AclRule {
            operations: vec![AclOperation::Write],
            resource: ResourceType::ConsumerGroup,
            resource_name: Some("billing".into()),
            ..topic_rule()
        };
        assert!(manager.execute(&AclCommand::Create(rule)).is_err());
        assert!(runner.calls().is_empty());

        manager.execute(&AclCommand::Create(topic_rule())).unwrap();
        assert_eq!(runner.calls().len(), 1);
    }
}
