//! confluent-ops
//!
//! Operator tooling for Confluent Cloud: schema promotion between Schema
//! Registry environments, Kafka topic lifecycle, and Kafka ACL management.
//!
//! ## Features
//!
//! - **Schema Promotion**: Copy the latest schema of each subject from a source
//!   registry to a target registry, gated by a server-side compatibility check
//! - **Run Accounting**: Every subject ends Promoted, Skipped or Failed; totals are
//!   folded into a [`PromotionSummary`] and written to an append-only run log
//! - **Topic Management**: Validated `confluent kafka topic` commands
//! - **ACL Management**: Validated `confluent kafka acl` commands
//!
//! ## Architecture
//!
//! ```text
//! OpsConfig ──► RegistryClient (source) ─┐
//!           ──► RegistryClient (target) ─┴─► Promoter ──► PromotionSummary
//!           ──► ConfluentCli ──► TopicManager / AclManager
//! ```

pub mod compatibility;
pub mod config;
pub mod confluent;
pub mod error;
pub mod logging;
pub mod promotion;
pub mod registry;

pub use compatibility::CompatibilityLevel;
pub use config::OpsConfig;
pub use error::{OpsError, Result};
pub use promotion::{
    enumerate_subjects, FailureReason, PromotionOutcome, PromotionSettings, PromotionSummary,
    Promoter, SubjectSource, TextualContainment, UpToDateStrategy,
};
pub use registry::{RegisteredSchema, RegistryClient, SchemaPayload, SchemaRegistryApi};
