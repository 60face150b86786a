//! Schema promotion workflow
//!
//! Copies the latest schema of each selected subject from a source registry to
//! a target registry:
//!
//! ```text
//! source latest ──► target latest ──► up to date? ──yes──► Skipped
//!                                          │no
//!                                          ▼
//!                   set compatibility ──► check ──incompatible──► Failed
//!                                          │compatible
//!                                          ▼
//!                                       register ──► Promoted | Failed
//! ```
//!
//! Per-subject failures are counted and never abort the run. Only subject
//! enumeration can fail the whole run.

use std::fmt;
use std::thread;
use std::time::Duration;

use regex::Regex;
use similar::{ChangeTag, TextDiff};
use tracing::{debug, error, info, warn};

use crate::compatibility::CompatibilityLevel;
use crate::config::PromotionConfig;
use crate::error::Result;
use crate::registry::{RegisteredSchema, SchemaRegistryApi};

/// Which subjects a run processes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectSource {
    /// Operator-supplied names, processed in the given order
    Explicit(Vec<String>),
    /// Every subject the source registry lists
    Discover,
}

impl SubjectSource {
    /// Parse whitespace-separated subject names; no names means discovery
    pub fn from_tokens(input: &str) -> Self {
        let subjects: Vec<String> = input.split_whitespace().map(String::from).collect();
        if subjects.is_empty() {
            SubjectSource::Discover
        } else {
            SubjectSource::Explicit(subjects)
        }
    }
}

/// Produce the ordered list of subjects to process.
///
/// Explicit names are returned as given and no remote call is made. Discovery
/// returns the source registry's listing order, optionally narrowed by
/// `filter`. A failed listing is returned as an error.
pub fn enumerate_subjects<R: SchemaRegistryApi + ?Sized>(
    source: &R,
    subjects: &SubjectSource,
    filter: Option<&Regex>,
) -> Result<Vec<String>> {
    match subjects {
        SubjectSource::Explicit(names) => Ok(names.clone()),
        SubjectSource::Discover => {
            let listed = source.list_subjects()?;
            Ok(match filter {
                Some(re) => listed.into_iter().filter(|s| re.is_match(s)).collect(),
                None => listed,
            })
        }
    }
}

/// Decides whether the target already holds the candidate schema
pub trait UpToDateStrategy {
    /// Name used in log lines
    fn name(&self) -> &'static str;

    /// `current` is the target's latest version, `candidate` the source's
    fn is_up_to_date(&self, candidate: &RegisteredSchema, current: &RegisteredSchema) -> bool;
}

/// Up to date when the target's schema text contains the source schema text.
///
/// This is a raw substring test, not structural equality: reordered keys read
/// as different, and a schema whose text is a substring of another reads as
/// present.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextualContainment;

impl UpToDateStrategy for TextualContainment {
    fn name(&self) -> &'static str {
        "textual-containment"
    }

    fn is_up_to_date(&self, candidate: &RegisteredSchema, current: &RegisteredSchema) -> bool {
        current.schema.contains(candidate.schema.as_str())
    }
}

/// Why a subject was not promoted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Latest schema could not be read from the source
    SourceFetch(String),
    /// The target could not evaluate compatibility
    CompatibilityCheck(String),
    /// The target rejected the schema under its compatibility level
    Incompatible,
    /// The target refused the registration
    Registration(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::SourceFetch(e) => write!(f, "source fetch failed: {e}"),
            FailureReason::CompatibilityCheck(e) => write!(f, "compatibility check failed: {e}"),
            FailureReason::Incompatible => f.write_str("incompatible with target"),
            FailureReason::Registration(e) => write!(f, "registration failed: {e}"),
        }
    }
}

/// Terminal state of one subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// Registered on the target under the given schema id
    Promoted { id: i64 },
    /// Target already up to date
    Skipped,
    Failed(FailureReason),
}

impl PromotionOutcome {
    /// Whether the subject got as far as issuing writes to the target
    fn touched_target(&self) -> bool {
        !matches!(
            self,
            PromotionOutcome::Skipped | PromotionOutcome::Failed(FailureReason::SourceFetch(_))
        )
    }
}

impl fmt::Display for PromotionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromotionOutcome::Promoted { id } => write!(f, "promoted (id {id})"),
            PromotionOutcome::Skipped => f.write_str("skipped (already up to date)"),
            PromotionOutcome::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Totals for one run, folded from per-subject outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionSummary {
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Per-subject outcomes in processing order
    pub outcomes: Vec<(String, PromotionOutcome)>,
}

impl PromotionSummary {
    /// Fold one outcome into the totals
    pub fn record(mut self, subject: impl Into<String>, outcome: PromotionOutcome) -> Self {
        match outcome {
            PromotionOutcome::Promoted { .. } => self.successful += 1,
            PromotionOutcome::Skipped => self.skipped += 1,
            PromotionOutcome::Failed(_) => self.failed += 1,
        }
        self.outcomes.push((subject.into(), outcome));
        self
    }

    /// Number of subjects processed
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Outcome for a subject (first occurrence)
    pub fn outcome(&self, subject: &str) -> Option<&PromotionOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == subject)
            .map(|(_, outcome)| outcome)
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for PromotionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Successful: {}, Failed: {}, Skipped: {}",
            self.successful, self.failed, self.skipped
        )
    }
}

/// Run parameters that do not depend on the registries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionSettings {
    /// Level applied to each target subject before the compatibility check
    pub compatibility: CompatibilityLevel,
    /// Pause before the next subject once a subject has issued target writes
    pub delay: Duration,
}

impl Default for PromotionSettings {
    fn default() -> Self {
        Self {
            compatibility: CompatibilityLevel::default(),
            delay: Duration::from_millis(500),
        }
    }
}

impl From<&PromotionConfig> for PromotionSettings {
    fn from(config: &PromotionConfig) -> Self {
        Self {
            compatibility: config.compatibility,
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

/// Promotes subjects from `source` to `target`
pub struct Promoter<S, T> {
    source: S,
    target: T,
    settings: PromotionSettings,
    strategy: Box<dyn UpToDateStrategy>,
}

impl<S: SchemaRegistryApi, T: SchemaRegistryApi> Promoter<S, T> {
    /// Create a promoter using [`TextualContainment`]
    pub fn new(source: S, target: T, settings: PromotionSettings) -> Self {
        Self {
            source,
            target,
            settings,
            strategy: Box::new(TextualContainment),
        }
    }

    /// Replace the up-to-date comparison
    pub fn with_strategy(mut self, strategy: impl UpToDateStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn settings(&self) -> &PromotionSettings {
        &self.settings
    }

    /// Enumerate subjects and promote each in turn.
    ///
    /// Returns `Err` only when enumeration fails.
    pub fn run(&self, subjects: &SubjectSource, filter: Option<&Regex>) -> Result<PromotionSummary> {
        let names = enumerate_subjects(&self.source, subjects, filter).map_err(|e| {
            error!("Failed to enumerate subjects from source registry: {}", e);
            e
        })?;
        info!(
            "Promoting {} subject(s) with compatibility {} using {} comparison",
            names.len(),
            self.settings.compatibility,
            self.strategy.name()
        );

        // Pause between a subject that wrote to the target and the next one
        let (summary, _) = names.iter().fold(
            (PromotionSummary::default(), false),
            |(summary, pause), subject| {
                if pause && !self.settings.delay.is_zero() {
                    thread::sleep(self.settings.delay);
                }
                let outcome = self.promote_subject(subject);
                let touched = outcome.touched_target();
                (summary.record(subject.as_str(), outcome), touched)
            },
        );

        info!("Schema promotion complete. {}", summary);
        Ok(summary)
    }

    /// Promote a single subject. Never fails; errors become `Failed` outcomes.
    pub fn promote_subject(&self, subject: &str) -> PromotionOutcome {
        info!("Processing subject: {}", subject);

        let candidate = match self.source.latest_schema(subject) {
            Ok(schema) => schema,
            Err(e) => {
                error!("Failed to fetch schema for subject {} from source: {}", subject, e);
                return PromotionOutcome::Failed(FailureReason::SourceFetch(e.to_string()));
            }
        };
        debug!(
            "Source schema for {}: version {}, id {}",
            subject, candidate.version, candidate.id
        );

        let current = match self.target.latest_schema(subject) {
            Ok(schema) => Some(schema),
            Err(e) if e.is_not_found() => {
                info!("Subject {} does not exist in target registry", subject);
                None
            }
            Err(e) => {
                warn!("Could not read subject {} from target registry: {}", subject, e);
                None
            }
        };

        if let Some(current) = &current {
            if self.strategy.is_up_to_date(&candidate, current) {
                info!(
                    "Schema for subject {} is already up to date in target (version {}), skipping",
                    subject, current.version
                );
                return PromotionOutcome::Skipped;
            }
            for line in schema_diff(&current.schema, &candidate.schema) {
                debug!("{} diff: {}", subject, line);
            }
        }

        let level = self.settings.compatibility;
        match self.target.set_compatibility(subject, level) {
            Ok(applied) => info!("Set compatibility for subject {} to {}", subject, applied),
            Err(e) => error!(
                "Failed to set compatibility for subject {} to {}: {}",
                subject, level, e
            ),
        }

        let payload = candidate.payload();
        let compatible = match self.target.check_compatibility(subject, &payload) {
            Ok(compatible) => compatible,
            Err(e) if e.is_not_found() => {
                debug!("No existing version of {} in target; nothing to be incompatible with", subject);
                true
            }
            Err(e) => {
                error!("Compatibility check failed for subject {}: {}", subject, e);
                return PromotionOutcome::Failed(FailureReason::CompatibilityCheck(e.to_string()));
            }
        };

        if !compatible {
            error!(
                "Schema for subject {} is not compatible with target under {}",
                subject, level
            );
            return PromotionOutcome::Failed(FailureReason::Incompatible);
        }

        match self.target.register_schema(subject, &payload) {
            Ok(id) => {
                info!("Successfully promoted subject {} (schema id {})", subject, id);
                PromotionOutcome::Promoted { id }
            }
            Err(e) => {
                error!("Failed to register schema for subject {}: {}", subject, e);
                PromotionOutcome::Failed(FailureReason::Registration(e.to_string()))
            }
        }
    }
}

/// Line diff between the target's schema and the candidate, as `-`/`+` lines.
///
/// JSON documents are pretty-printed first so single-line schemas diff by field.
pub fn schema_diff(current: &str, candidate: &str) -> Vec<String> {
    let old_text = pretty(current);
    let new_text = pretty(candidate);
    let diff = TextDiff::from_lines(&old_text, &new_text);

    diff.iter_all_changes()
        .filter_map(|change| {
            let sign = match change.tag() {
                ChangeTag::Delete => '-',
                ChangeTag::Insert => '+',
                ChangeTag::Equal => return None,
            };
            Some(format!("{sign} {}", change.value().trim_end()))
        })
        .collect()
}

fn pretty(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(text: &str) -> RegisteredSchema {
        RegisteredSchema {
            subject: "orders-value".into(),
            version: 1,
            id: 1,
            schema: text.into(),
            schema_type: None,
            references: vec![],
        }
    }

    #[test]
    fn test_subject_source_from_tokens() {
        assert_eq!(
            SubjectSource::from_tokens("orders-value  users-value\n"),
            SubjectSource::Explicit(vec!["orders-value".into(), "users-value".into()])
        );
        assert_eq!(SubjectSource::from_tokens("   "), SubjectSource::Discover);
    }

    #[test]
    fn test_subject_source_keeps_duplicates() {
        assert_eq!(
            SubjectSource::from_tokens("a b a"),
            SubjectSource::Explicit(vec!["a".into(), "b".into(), "a".into()])
        );
    }

    #[test]
    fn test_textual_containment() {
        let strategy = TextualContainment;
        let source = schema(r#"{"type":"string"}"#);
        assert!(strategy.is_up_to_date(&source, &schema(r#"{"type":"string"}"#)));
        // Substring match counts as present
        assert!(strategy.is_up_to_date(&schema("string"), &schema(r#"{"type":"string"}"#)));
        // Semantically equal but textually different does not
        assert!(!strategy.is_up_to_date(
            &schema(r#"{"type":"record","name":"A"}"#),
            &schema(r#"{"name":"A","type":"record"}"#)
        ));
    }

    #[test]
    fn test_summary_fold() {
        let summary = PromotionSummary::default()
            .record("a", PromotionOutcome::Promoted { id: 3 })
            .record("b", PromotionOutcome::Skipped)
            .record("c", PromotionOutcome::Failed(FailureReason::Incompatible))
            .record("d", PromotionOutcome::Promoted { id: 4 });

        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total(), 4);
        assert!(summary.has_failures());
        assert_eq!(summary.outcome("b"), Some(&PromotionOutcome::Skipped));
        assert_eq!(summary.to_string(), "Successful: 2, Failed: 1, Skipped: 1");
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(PromotionOutcome::Promoted { id: 9 }.to_string(), "promoted (id 9)");
        assert_eq!(
            PromotionOutcome::Failed(FailureReason::Incompatible).to_string(),
            "failed (incompatible with target)"
        );
    }

    #[test]
    fn test_touched_target() {
        assert!(!PromotionOutcome::Skipped.touched_target());
        assert!(!PromotionOutcome::Failed(FailureReason::SourceFetch("x".into())).touched_target());
        assert!(PromotionOutcome::Failed(FailureReason::Incompatible).touched_target());
        assert!(PromotionOutcome::Promoted { id: 1 }.touched_target());
    }

    #[test]
    fn test_schema_diff_pretty_prints_json() {
        let current = r#"{"type":"record","name":"Order","fields":[{"name":"id","type":"string"}]}"#;
        let candidate = r#"{"type":"record","name":"Order","fields":[{"name":"id","type":"long"}]}"#;
        let lines = schema_diff(current, candidate);
        assert!(lines.contains(&r#"-       "type": "string""#.to_string()));
        assert!(lines.contains(&r#"+       "type": "long""#.to_string()));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_settings_from_config() {
        let config = PromotionConfig {
            compatibility: CompatibilityLevel::Full,
            delay_ms: 0,
            ..PromotionConfig::default()
        };
        let settings = PromotionSettings::from(&config);
        assert_eq!(settings.compatibility, CompatibilityLevel::Full);
        assert!(settings.delay.is_zero());
    }
}
