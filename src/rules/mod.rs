//! Declarative validation rules engine
//!
//! Applies user-defined rules to chunks and their scoring records,
//! independently of the fixed scorers. Operand types are validated before
//! every comparison and mismatches fail closed: the rule reports a failure,
//! the engine never panics. The active rule set is an immutable snapshot
//! behind an atomic swap; readers clone the `Arc` and evaluate without
//! holding any lock, writers replace the snapshot on any rule change.

use crate::error::{Error, Result};
use crate::model::{
    Chunk, Classification, RuleOperator, RuleType, ValidationResult, ValidationRule,
    ValidationScore,
};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Field value kinds a rule can compare against
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Number,
    Text,
    Bool,
}

/// The closed set of fields rules may target, with their types
const KNOWN_FIELDS: &[(&str, FieldKind)] = &[
    ("text", FieldKind::Text),
    ("char_count", FieldKind::Number),
    ("word_count", FieldKind::Number),
    ("chunk_index", FieldKind::Number),
    ("page", FieldKind::Number),
    ("content_type", FieldKind::Text),
    ("confidence", FieldKind::Number),
    ("semantic_completeness", FieldKind::Number),
    ("boundary_quality", FieldKind::Number),
    ("context_preservation", FieldKind::Number),
    ("structural_integrity", FieldKind::Number),
    ("metadata_richness", FieldKind::Number),
    ("overall_validation_score", FieldKind::Number),
    ("validation_status", FieldKind::Text),
    ("product_name", FieldKind::Text),
    ("designer", FieldKind::Text),
    ("dimensions", FieldKind::Text),
    ("specification_count", FieldKind::Number),
    ("image_count", FieldKind::Number),
    ("heading_depth", FieldKind::Number),
];

fn field_kind(name: &str) -> Option<FieldKind> {
    KNOWN_FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, kind)| *kind)
}

/// A chunk together with its scoring records, viewed through the closed
/// field set rules understand
#[derive(Debug, Clone, Copy)]
pub struct ValidationTarget<'a> {
    pub chunk: &'a Chunk,
    pub classification: Option<&'a Classification>,
    pub score: Option<&'a ValidationScore>,
}

impl<'a> ValidationTarget<'a> {
    pub fn new(chunk: &'a Chunk) -> Self {
        Self {
            chunk,
            classification: None,
            score: None,
        }
    }

    pub fn with_classification(mut self, classification: &'a Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn with_score(mut self, score: &'a ValidationScore) -> Self {
        self.score = Some(score);
        self
    }

    /// Resolve a field by name; unknown or unpopulated fields are `Absent`
    pub fn field(&self, name: &str) -> FieldValue {
        let m = &self.chunk.metadata;
        match name {
            "text" => FieldValue::Text(self.chunk.text.clone()),
            "char_count" => FieldValue::Number(self.chunk.text.chars().count() as f64),
            "word_count" => {
                FieldValue::Number(self.chunk.text.split_whitespace().count() as f64)
            }
            "chunk_index" => FieldValue::Number(f64::from(self.chunk.chunk_index)),
            "page" => match self.chunk.page {
                Some(p) => FieldValue::Number(f64::from(p)),
                None => FieldValue::Absent,
            },
            "content_type" => match self.classification {
                Some(c) => FieldValue::Text(c.content_type.to_string()),
                None => FieldValue::Absent,
            },
            "confidence" => match self.classification {
                Some(c) => FieldValue::Number(c.confidence),
                None => FieldValue::Absent,
            },
            "semantic_completeness" => score_field(self.score, |s| s.semantic_completeness),
            "boundary_quality" => score_field(self.score, |s| s.boundary_quality),
            "context_preservation" => score_field(self.score, |s| s.context_preservation),
            "structural_integrity" => score_field(self.score, |s| s.structural_integrity),
            "metadata_richness" => score_field(self.score, |s| s.metadata_richness),
            "overall_validation_score" => score_field(self.score, |s| s.overall_validation_score),
            "validation_status" => match self.score {
                Some(s) => FieldValue::Text(s.validation_status.to_string()),
                None => FieldValue::Absent,
            },
            "product_name" => text_field(m.product_name.as_deref()),
            "designer" => text_field(m.designer.as_deref()),
            "dimensions" => text_field(m.dimensions.as_deref()),
            "specification_count" => int_field(m.specification_count),
            "image_count" => int_field(m.image_count),
            "heading_depth" => int_field(m.heading_depth),
            _ => FieldValue::Absent,
        }
    }
}

fn score_field(score: Option<&ValidationScore>, f: impl Fn(&ValidationScore) -> f64) -> FieldValue {
    match score {
        Some(s) => FieldValue::Number(f(s)),
        None => FieldValue::Absent,
    }
}

fn text_field(value: Option<&str>) -> FieldValue {
    match value {
        Some(v) => FieldValue::Text(v.to_string()),
        None => FieldValue::Absent,
    }
}

fn int_field(value: Option<i64>) -> FieldValue {
    match value {
        Some(v) => FieldValue::Number(v as f64),
        None => FieldValue::Absent,
    }
}

/// Validate a rule definition at creation time.
///
/// Invalid operator/value combinations are rejected here so they can never
/// be silently skipped at evaluation time.
pub fn validate_rule(rule: &ValidationRule) -> Result<()> {
    if rule.priority == 0 || rule.priority > 100 {
        return Err(Error::RuleDefinition(format!(
            "priority must be 1-100, got {}",
            rule.priority
        )));
    }

    let def = &rule.definition;
    let kind = field_kind(&def.field).ok_or_else(|| {
        Error::RuleDefinition(format!("unknown field '{}'", def.field))
    })?;

    match def.operator {
        RuleOperator::Equals | RuleOperator::NotEquals => match (&def.value, kind) {
            (Value::String(_), FieldKind::Text)
            | (Value::Number(_), FieldKind::Number)
            | (Value::Bool(_), FieldKind::Bool) => Ok(()),
            _ => Err(Error::RuleDefinition(format!(
                "operand type does not match field '{}'",
                def.field
            ))),
        },
        RuleOperator::GreaterThan | RuleOperator::LessThan => {
            if kind != FieldKind::Number {
                return Err(Error::RuleDefinition(format!(
                    "{} requires a numeric field, '{}' is not",
                    def.operator, def.field
                )));
            }
            if !def.value.is_number() {
                return Err(Error::RuleDefinition(format!(
                    "{} requires a numeric operand",
                    def.operator
                )));
            }
            Ok(())
        }
        RuleOperator::Contains | RuleOperator::NotContains => {
            if kind != FieldKind::Text {
                return Err(Error::RuleDefinition(format!(
                    "{} requires a text field, '{}' is not",
                    def.operator, def.field
                )));
            }
            if !def.value.is_string() {
                return Err(Error::RuleDefinition(format!(
                    "{} requires a string operand",
                    def.operator
                )));
            }
            Ok(())
        }
        RuleOperator::MatchesRegex => {
            if kind != FieldKind::Text {
                return Err(Error::RuleDefinition(format!(
                    "matches_regex requires a text field, '{}' is not",
                    def.field
                )));
            }
            let pattern = def.value.as_str().ok_or_else(|| {
                Error::RuleDefinition("matches_regex requires a string operand".to_string())
            })?;
            Regex::new(pattern)
                .map_err(|e| Error::RuleDefinition(format!("invalid regex: {}", e)))?;
            Ok(())
        }
        RuleOperator::InRange => {
            if kind != FieldKind::Number {
                return Err(Error::RuleDefinition(format!(
                    "in_range requires a numeric field, '{}' is not",
                    def.field
                )));
            }
            let range = def.value.as_array().ok_or_else(|| {
                Error::RuleDefinition("in_range requires a [min, max] operand".to_string())
            })?;
            if range.len() != 2 {
                return Err(Error::RuleDefinition(
                    "in_range operand must have exactly two elements".to_string(),
                ));
            }
            let min = range[0].as_f64();
            let max = range[1].as_f64();
            match (min, max) {
                (Some(min), Some(max)) if min <= max => Ok(()),
                (Some(_), Some(_)) => Err(Error::RuleDefinition(
                    "in_range min must be <= max".to_string(),
                )),
                _ => Err(Error::RuleDefinition(
                    "in_range operand elements must be numeric".to_string(),
                )),
            }
        }
    }
}

/// Apply one operator; `Err` carries the type-mismatch description
fn apply_operator(
    operator: RuleOperator,
    value: &FieldValue,
    operand: &Value,
) -> std::result::Result<bool, String> {
    match operator {
        RuleOperator::Equals => compare_equality(value, operand),
        RuleOperator::NotEquals => compare_equality(value, operand).map(|eq| !eq),
        RuleOperator::GreaterThan => {
            let (actual, expected) = numeric_pair(value, operand)?;
            Ok(actual > expected)
        }
        RuleOperator::LessThan => {
            let (actual, expected) = numeric_pair(value, operand)?;
            Ok(actual < expected)
        }
        RuleOperator::Contains => {
            let (actual, needle) = text_pair(value, operand)?;
            Ok(actual.contains(&needle))
        }
        RuleOperator::NotContains => {
            let (actual, needle) = text_pair(value, operand)?;
            Ok(!actual.contains(&needle))
        }
        RuleOperator::MatchesRegex => {
            let (actual, pattern) = text_pair(value, operand)?;
            let regex =
                Regex::new(&pattern).map_err(|e| format!("invalid regex at evaluation: {}", e))?;
            Ok(regex.is_match(&actual))
        }
        RuleOperator::InRange => {
            let actual = match value {
                FieldValue::Number(n) => *n,
                other => return Err(format!("in_range requires a number, got {:?}", other)),
            };
            let range = operand
                .as_array()
                .ok_or_else(|| "in_range operand must be [min, max]".to_string())?;
            let min = range
                .first()
                .and_then(Value::as_f64)
                .ok_or_else(|| "in_range min must be numeric".to_string())?;
            let max = range
                .get(1)
                .and_then(Value::as_f64)
                .ok_or_else(|| "in_range max must be numeric".to_string())?;
            // Inclusive on both ends
            Ok(actual >= min && actual <= max)
        }
    }
}

fn compare_equality(value: &FieldValue, operand: &Value) -> std::result::Result<bool, String> {
    match (value, operand) {
        (FieldValue::Text(a), Value::String(b)) => Ok(a == b),
        (FieldValue::Number(a), Value::Number(b)) => {
            let b = b
                .as_f64()
                .ok_or_else(|| "operand is not a finite number".to_string())?;
            Ok((a - b).abs() < f64::EPSILON)
        }
        (FieldValue::Bool(a), Value::Bool(b)) => Ok(a == b),
        (actual, expected) => Err(format!(
            "type mismatch: field is {:?}, operand is {}",
            actual, expected
        )),
    }
}

fn numeric_pair(
    value: &FieldValue,
    operand: &Value,
) -> std::result::Result<(f64, f64), String> {
    let actual = match value {
        FieldValue::Number(n) => *n,
        other => return Err(format!("expected a numeric field, got {:?}", other)),
    };
    let expected = operand
        .as_f64()
        .ok_or_else(|| format!("expected a numeric operand, got {}", operand))?;
    Ok((actual, expected))
}

fn text_pair(
    value: &FieldValue,
    operand: &Value,
) -> std::result::Result<(String, String), String> {
    let actual = match value {
        FieldValue::Text(t) => t.clone(),
        other => return Err(format!("expected a text field, got {:?}", other)),
    };
    let expected = operand
        .as_str()
        .ok_or_else(|| format!("expected a string operand, got {}", operand))?
        .to_string();
    Ok((actual, expected))
}

/// Aggregated outcome of validating one chunk against the active rule set
#[derive(Debug, Clone, Serialize)]
pub struct BatchValidation {
    pub chunk_id: String,
    pub results: Vec<ValidationResult>,
    pub passed: usize,
    pub failed: usize,
    /// Failure count per severity
    pub severity_summary: BTreeMap<String, usize>,
}

/// Immutable snapshot of the active rule set, ordered by descending priority
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<ValidationRule>,
}

impl RuleSet {
    fn new(mut rules: Vec<ValidationRule>) -> Self {
        rules.retain(|r| r.is_active);
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.name.cmp(&b.name)));
        Self { rules }
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Rules engine with an atomically swapped rule-set cache
pub struct RulesEngine {
    cache: RwLock<Arc<RuleSet>>,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(Arc::new(RuleSet::default())),
        }
    }

    /// Replace the cached rule set. Called after any rule create/update/
    /// delete; in-flight evaluations keep the snapshot they already cloned.
    pub async fn load(&self, rules: Vec<ValidationRule>) {
        let snapshot = Arc::new(RuleSet::new(rules));
        debug!("Rule cache swapped: {} active rules", snapshot.len());
        *self.cache.write().await = snapshot;
    }

    /// Clone the current snapshot without holding the lock afterwards
    pub async fn snapshot(&self) -> Arc<RuleSet> {
        self.cache.read().await.clone()
    }

    /// Run every active rule against one chunk, highest priority first
    pub async fn evaluate(&self, target: &ValidationTarget<'_>) -> BatchValidation {
        let snapshot = self.snapshot().await;

        let mut results = Vec::with_capacity(snapshot.len());
        let mut passed = 0usize;
        let mut failed = 0usize;
        let mut severity_summary: BTreeMap<String, usize> = BTreeMap::new();

        for rule in snapshot.rules() {
            let result = evaluate_rule(rule, target);
            if result.passed {
                passed += 1;
            } else {
                failed += 1;
                *severity_summary.entry(result.severity.to_string()).or_insert(0) += 1;
            }
            results.push(result);
        }

        BatchValidation {
            chunk_id: target.chunk.id.clone(),
            results,
            passed,
            failed,
            severity_summary,
        }
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate a single rule against a target
fn evaluate_rule(rule: &ValidationRule, target: &ValidationTarget<'_>) -> ValidationResult {
    let value = target.field(&rule.definition.field);

    let (passed, message) = match &value {
        FieldValue::Absent => {
            if rule.rule_type == RuleType::MetadataPresence {
                (
                    false,
                    format!("required field '{}' is absent", rule.definition.field),
                )
            } else {
                // Field absent and the rule does not target presence:
                // inapplicable, treated as a pass
                (
                    true,
                    format!("field '{}' absent; rule not applicable", rule.definition.field),
                )
            }
        }
        value => match apply_operator(rule.definition.operator, value, &rule.definition.value) {
            Ok(true) => (true, format!("'{}' satisfied", rule.name)),
            Ok(false) => (
                false,
                format!(
                    "'{}' failed: {} {} {}",
                    rule.name, rule.definition.field, rule.definition.operator, rule.definition.value
                ),
            ),
            Err(mismatch) => (false, format!("'{}' failed closed: {}", rule.name, mismatch)),
        },
    };

    ValidationResult {
        id: Uuid::new_v4().to_string(),
        chunk_id: target.chunk.id.clone(),
        rule_id: rule.id.clone(),
        passed,
        severity: rule.severity,
        message,
        details: None,
        created_at: crate::model::now_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RuleDefinition, Severity};
    use serde_json::json;

    fn rule(
        name: &str,
        rule_type: RuleType,
        field: &str,
        operator: RuleOperator,
        value: Value,
        priority: u8,
        severity: Severity,
    ) -> ValidationRule {
        ValidationRule::new(
            "ws".into(),
            name.into(),
            rule_type,
            RuleDefinition {
                field: field.into(),
                operator,
                value,
            },
            priority,
            severity,
        )
    }

    fn chunk() -> Chunk {
        Chunk::new(
            "ws".into(),
            "doc".into(),
            0,
            "VALENOVA modular seating with leather finishes.".into(),
        )
    }

    #[test]
    fn test_in_range_round_trip_inclusive() {
        let r = rule(
            "confidence-band",
            RuleType::Custom,
            "confidence",
            RuleOperator::InRange,
            json!([0.2, 0.8]),
            50,
            Severity::Warning,
        );
        validate_rule(&r).unwrap();

        for (input, expected) in [
            (0.5, true),
            (0.2, true),  // boundary-exact, inclusive
            (0.8, true),  // boundary-exact, inclusive
            (0.19, false),
            (0.81, false),
        ] {
            let outcome =
                apply_operator(RuleOperator::InRange, &FieldValue::Number(input), &r.definition.value)
                    .unwrap();
            assert_eq!(outcome, expected, "input {}", input);
        }
    }

    #[test]
    fn test_rule_creation_rejects_bad_definitions() {
        // Unknown field
        let r = rule(
            "r",
            RuleType::Custom,
            "no_such_field",
            RuleOperator::Equals,
            json!("x"),
            50,
            Severity::Info,
        );
        assert!(validate_rule(&r).is_err());

        // in_range with inverted bounds
        let r = rule(
            "r",
            RuleType::Custom,
            "confidence",
            RuleOperator::InRange,
            json!([0.9, 0.1]),
            50,
            Severity::Info,
        );
        assert!(validate_rule(&r).is_err());

        // greater_than on a text field
        let r = rule(
            "r",
            RuleType::Custom,
            "text",
            RuleOperator::GreaterThan,
            json!(5),
            50,
            Severity::Info,
        );
        assert!(validate_rule(&r).is_err());

        // invalid regex
        let r = rule(
            "r",
            RuleType::Custom,
            "text",
            RuleOperator::MatchesRegex,
            json!("(unclosed"),
            50,
            Severity::Info,
        );
        assert!(validate_rule(&r).is_err());

        // priority out of range
        let r = rule(
            "r",
            RuleType::Custom,
            "text",
            RuleOperator::Contains,
            json!("x"),
            0,
            Severity::Info,
        );
        assert!(validate_rule(&r).is_err());
    }

    #[tokio::test]
    async fn test_missing_product_name_fails_presence_rule() {
        // Chunk without product_name; rule requires not_equals ''
        let engine = RulesEngine::new();
        engine
            .load(vec![rule(
                "product-name-present",
                RuleType::MetadataPresence,
                "product_name",
                RuleOperator::NotEquals,
                json!(""),
                80,
                Severity::Error,
            )])
            .await;

        let c = chunk();
        let outcome = engine.evaluate(&ValidationTarget::new(&c)).await;

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.results[0].severity, Severity::Error);
        assert!(!outcome.results[0].passed);
        assert!(outcome.results[0].message.contains("absent"));
    }

    #[tokio::test]
    async fn test_absent_field_passes_non_presence_rule() {
        let engine = RulesEngine::new();
        engine
            .load(vec![rule(
                "designer-named",
                RuleType::Custom,
                "designer",
                RuleOperator::Contains,
                json!("Santos"),
                50,
                Severity::Warning,
            )])
            .await;

        let c = chunk();
        let outcome = engine.evaluate(&ValidationTarget::new(&c)).await;
        assert_eq!(outcome.passed, 1);
        assert_eq!(outcome.failed, 0);
    }

    #[tokio::test]
    async fn test_type_mismatch_fails_closed() {
        // Creation-time validation would reject this; force it through to
        // prove the evaluator still fails closed instead of crashing.
        let engine = RulesEngine::new();
        engine
            .load(vec![rule(
                "bad-operand",
                RuleType::Custom,
                "text",
                RuleOperator::Equals,
                json!(42),
                50,
                Severity::Warning,
            )])
            .await;

        let c = chunk();
        let outcome = engine.evaluate(&ValidationTarget::new(&c)).await;
        assert_eq!(outcome.failed, 1);
        assert!(outcome.results[0].message.contains("failed closed"));
    }

    #[tokio::test]
    async fn test_rules_run_in_descending_priority() {
        let engine = RulesEngine::new();
        engine
            .load(vec![
                rule(
                    "low",
                    RuleType::Custom,
                    "text",
                    RuleOperator::Contains,
                    json!("seating"),
                    10,
                    Severity::Info,
                ),
                rule(
                    "high",
                    RuleType::Custom,
                    "text",
                    RuleOperator::Contains,
                    json!("VALENOVA"),
                    90,
                    Severity::Info,
                ),
                rule(
                    "mid",
                    RuleType::Custom,
                    "text",
                    RuleOperator::Contains,
                    json!("leather"),
                    40,
                    Severity::Info,
                ),
            ])
            .await;

        let c = chunk();
        let snapshot = engine.snapshot().await;
        let names: Vec<&str> = snapshot.rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);

        // All rules run regardless of priority
        let outcome = engine.evaluate(&ValidationTarget::new(&c)).await;
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.passed, 3);
    }

    #[tokio::test]
    async fn test_inactive_rules_are_excluded() {
        let mut inactive = rule(
            "off",
            RuleType::Custom,
            "text",
            RuleOperator::Contains,
            json!("x"),
            50,
            Severity::Info,
        );
        inactive.is_active = false;

        let engine = RulesEngine::new();
        engine.load(vec![inactive]).await;
        assert!(engine.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_severity_histogram_aggregation() {
        let engine = RulesEngine::new();
        engine
            .load(vec![
                rule(
                    "warn-1",
                    RuleType::Custom,
                    "text",
                    RuleOperator::Contains,
                    json!("missing-token"),
                    50,
                    Severity::Warning,
                ),
                rule(
                    "warn-2",
                    RuleType::Custom,
                    "text",
                    RuleOperator::Contains,
                    json!("another-missing"),
                    50,
                    Severity::Warning,
                ),
                rule(
                    "crit",
                    RuleType::MetadataPresence,
                    "product_name",
                    RuleOperator::NotEquals,
                    json!(""),
                    90,
                    Severity::Critical,
                ),
            ])
            .await;

        let c = chunk();
        let outcome = engine.evaluate(&ValidationTarget::new(&c)).await;

        assert_eq!(outcome.failed, 3);
        assert_eq!(outcome.severity_summary.get("warning"), Some(&2));
        assert_eq!(outcome.severity_summary.get("critical"), Some(&1));
    }

    #[tokio::test]
    async fn test_cache_swap_does_not_disturb_existing_snapshot() {
        let engine = RulesEngine::new();
        engine
            .load(vec![rule(
                "first",
                RuleType::Custom,
                "text",
                RuleOperator::Contains,
                json!("seating"),
                50,
                Severity::Info,
            )])
            .await;

        let held = engine.snapshot().await;
        assert_eq!(held.len(), 1);

        engine.load(Vec::new()).await;

        // The held snapshot is unchanged; fresh reads see the new set
        assert_eq!(held.len(), 1);
        assert!(engine.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_score_fields_resolve_from_attached_records() {
        let engine = RulesEngine::new();
        engine
            .load(vec![rule(
                "min-overall",
                RuleType::ContentQuality,
                "overall_validation_score",
                RuleOperator::GreaterThan,
                json!(0.7),
                60,
                Severity::Error,
            )])
            .await;

        let c = chunk();
        let score = ValidationScore {
            chunk_id: c.id.clone(),
            semantic_completeness: 0.9,
            boundary_quality: 0.9,
            context_preservation: 0.9,
            structural_integrity: 0.9,
            metadata_richness: 0.9,
            overall_validation_score: 0.9,
            validation_status: crate::model::ValidationStatus::Validated,
            issues: Vec::new(),
            recommendations: Vec::new(),
            created_at: crate::model::now_rfc3339(),
        };

        let outcome = engine
            .evaluate(&ValidationTarget::new(&c).with_score(&score))
            .await;
        assert_eq!(outcome.passed, 1);
    }
}
