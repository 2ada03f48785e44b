//! Shared record types and enumerations
//!
//! Every component references these tagged-variant types instead of keeping
//! its own string sets, so content/boundary/severity vocabularies cannot
//! drift between the scorers and the rules engine.

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Content type assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Product,
    Specification,
    Introduction,
    LegalDisclaimer,
    TechnicalDetail,
    Marketing,
    Other,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContentType::Product => "product",
            ContentType::Specification => "specification",
            ContentType::Introduction => "introduction",
            ContentType::LegalDisclaimer => "legal_disclaimer",
            ContentType::TechnicalDetail => "technical_detail",
            ContentType::Marketing => "marketing",
            ContentType::Other => "other",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "product" => Ok(ContentType::Product),
            "specification" => Ok(ContentType::Specification),
            "introduction" => Ok(ContentType::Introduction),
            "legal_disclaimer" => Ok(ContentType::LegalDisclaimer),
            "technical_detail" => Ok(ContentType::TechnicalDetail),
            "marketing" => Ok(ContentType::Marketing),
            "other" => Ok(ContentType::Other),
            _ => Err(Error::validation("content_type", format!("unknown value: {}", s))),
        }
    }
}

/// Boundary type between two adjacent chunks, ordered by structural
/// specificity: when several types are plausible the most specific wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryType {
    Weak = 0,
    Semantic = 1,
    Sentence = 2,
    Paragraph = 3,
    Section = 4,
}

impl fmt::Display for BoundaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BoundaryType::Weak => "weak",
            BoundaryType::Semantic => "semantic",
            BoundaryType::Sentence => "sentence",
            BoundaryType::Paragraph => "paragraph",
            BoundaryType::Section => "section",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for BoundaryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "weak" => Ok(BoundaryType::Weak),
            "semantic" => Ok(BoundaryType::Semantic),
            "sentence" => Ok(BoundaryType::Sentence),
            "paragraph" => Ok(BoundaryType::Paragraph),
            "section" => Ok(BoundaryType::Section),
            _ => Err(Error::validation("boundary_type", format!("unknown value: {}", s))),
        }
    }
}

/// Validation status derived by the quality scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Validated,
    NeedsReview,
    Rejected,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::Validated => "validated",
            ValidationStatus::NeedsReview => "needs_review",
            ValidationStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ValidationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ValidationStatus::Pending),
            "validated" => Ok(ValidationStatus::Validated),
            "needs_review" => Ok(ValidationStatus::NeedsReview),
            "rejected" => Ok(ValidationStatus::Rejected),
            _ => Err(Error::validation("validation_status", format!("unknown value: {}", s))),
        }
    }
}

/// Issue/rule severity, ordered so `Critical` compares highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info = 0,
    Warning = 1,
    Error = 2,
    Critical = 3,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            _ => Err(Error::validation("severity", format!("unknown value: {}", s))),
        }
    }
}

/// Relationship edge type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Sequential,
    Semantic,
    Hierarchical,
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationshipType::Sequential => "sequential",
            RelationshipType::Semantic => "semantic",
            RelationshipType::Hierarchical => "hierarchical",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RelationshipType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(RelationshipType::Sequential),
            "semantic" => Ok(RelationshipType::Semantic),
            "hierarchical" => Ok(RelationshipType::Hierarchical),
            _ => Err(Error::validation("relationship_type", format!("unknown value: {}", s))),
        }
    }
}

/// Rule categories understood by the rules engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    ContentQuality,
    BoundaryQuality,
    SemanticCoherence,
    Completeness,
    MetadataPresence,
    SpecificationCount,
    ImageCount,
    Custom,
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleType::ContentQuality => "content_quality",
            RuleType::BoundaryQuality => "boundary_quality",
            RuleType::SemanticCoherence => "semantic_coherence",
            RuleType::Completeness => "completeness",
            RuleType::MetadataPresence => "metadata_presence",
            RuleType::SpecificationCount => "specification_count",
            RuleType::ImageCount => "image_count",
            RuleType::Custom => "custom",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RuleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "content_quality" => Ok(RuleType::ContentQuality),
            "boundary_quality" => Ok(RuleType::BoundaryQuality),
            "semantic_coherence" => Ok(RuleType::SemanticCoherence),
            "completeness" => Ok(RuleType::Completeness),
            "metadata_presence" => Ok(RuleType::MetadataPresence),
            "specification_count" => Ok(RuleType::SpecificationCount),
            "image_count" => Ok(RuleType::ImageCount),
            "custom" => Ok(RuleType::Custom),
            _ => Err(Error::validation("rule_type", format!("unknown value: {}", s))),
        }
    }
}

/// Comparison operators available to validation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    NotContains,
    MatchesRegex,
    InRange,
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleOperator::Equals => "equals",
            RuleOperator::NotEquals => "not_equals",
            RuleOperator::GreaterThan => "greater_than",
            RuleOperator::LessThan => "less_than",
            RuleOperator::Contains => "contains",
            RuleOperator::NotContains => "not_contains",
            RuleOperator::MatchesRegex => "matches_regex",
            RuleOperator::InRange => "in_range",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RuleOperator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "equals" => Ok(RuleOperator::Equals),
            "not_equals" => Ok(RuleOperator::NotEquals),
            "greater_than" => Ok(RuleOperator::GreaterThan),
            "less_than" => Ok(RuleOperator::LessThan),
            "contains" => Ok(RuleOperator::Contains),
            "not_contains" => Ok(RuleOperator::NotContains),
            "matches_regex" => Ok(RuleOperator::MatchesRegex),
            "in_range" => Ok(RuleOperator::InRange),
            _ => Err(Error::validation("operator", format!("unknown value: {}", s))),
        }
    }
}

/// Band label for a single retrieval metric against its success threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricBand {
    Good,
    Poor,
}

/// Overall assessment label for a generated response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAssessment {
    Excellent,
    VeryGood,
    Good,
    Fair,
    Poor,
}

impl fmt::Display for ResponseAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseAssessment::Excellent => "excellent",
            ResponseAssessment::VeryGood => "very_good",
            ResponseAssessment::Good => "good",
            ResponseAssessment::Fair => "fair",
            ResponseAssessment::Poor => "poor",
        };
        write!(f, "{}", s)
    }
}

impl ResponseAssessment {
    /// Map a composite score to its assessment band
    pub fn from_score(score: f64) -> Self {
        if score >= 0.90 {
            ResponseAssessment::Excellent
        } else if score >= 0.80 {
            ResponseAssessment::VeryGood
        } else if score >= 0.70 {
            ResponseAssessment::Good
        } else if score >= 0.60 {
            ResponseAssessment::Fair
        } else {
            ResponseAssessment::Poor
        }
    }
}

/// Immutable unit of source text under evaluation
///
/// Created once when the upstream ingestion pipeline hands it over;
/// re-ingestion creates new chunks rather than mutating existing rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub workspace_id: String,
    pub document_id: String,
    pub chunk_index: i32,
    pub text: String,
    pub content_hash: String,
    #[serde(default)]
    pub page: Option<i32>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: ChunkMetadata,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
}

/// Typed metadata extracted upstream and carried on the chunk
///
/// Closed set of fields rather than an open dictionary, so the rules engine
/// can validate operand types before comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub designer: Option<String>,
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default)]
    pub specification_count: Option<i64>,
    #[serde(default)]
    pub image_count: Option<i64>,
    #[serde(default)]
    pub heading_depth: Option<i64>,
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

impl Chunk {
    pub fn new(
        workspace_id: String,
        document_id: String,
        chunk_index: i32,
        text: String,
    ) -> Self {
        let content_hash = blake3::hash(text.as_bytes()).to_hex().to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            workspace_id,
            document_id,
            chunk_index,
            text,
            content_hash,
            page: None,
            embedding: None,
            metadata: ChunkMetadata::default(),
            created_at: now_rfc3339(),
        }
    }

    /// Reject malformed chunks before any scoring touches them
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::validation("text", "chunk text is empty"));
        }
        if let Some(embedding) = &self.embedding {
            if embedding.is_empty() {
                return Err(Error::validation("embedding", "embedding vector is empty"));
            }
            if embedding.iter().any(|v| !v.is_finite()) {
                return Err(Error::validation(
                    "embedding",
                    "embedding contains non-finite values",
                ));
            }
        }
        Ok(())
    }
}

/// Classifier output for one chunk; append-only, latest wins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub id: String,
    pub chunk_id: String,
    pub content_type: ContentType,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub sub_categories: Vec<String>,
    /// Provider that produced the label
    pub model: String,
    #[serde(default)]
    pub low_confidence: bool,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
}

impl Classification {
    pub fn new(
        chunk_id: String,
        content_type: ContentType,
        confidence: f64,
        reasoning: String,
        model: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chunk_id,
            content_type,
            confidence,
            reasoning,
            sub_categories: Vec::new(),
            model,
            low_confidence: confidence < 0.5,
            created_at: now_rfc3339(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::validation(
                "confidence",
                format!("must be within [0,1], got {}", self.confidence),
            ));
        }
        Ok(())
    }
}

/// Scored transition between a chunk and its successor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boundary {
    pub chunk_id: String,
    pub next_chunk_id: String,
    pub boundary_score: f64,
    pub boundary_type: BoundaryType,
    pub semantic_similarity: f64,
    pub is_product_boundary: bool,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
}

/// An issue detected while scoring a chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub issue_type: String,
    pub severity: Severity,
    pub description: String,
}

/// A remediation suggestion attached to a validation score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub rec_type: String,
    pub description: String,
    pub priority: u8,
}

/// Composite quality score for one chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationScore {
    pub chunk_id: String,
    pub semantic_completeness: f64,
    pub boundary_quality: f64,
    pub context_preservation: f64,
    pub structural_integrity: f64,
    pub metadata_richness: f64,
    pub overall_validation_score: f64,
    pub validation_status: ValidationStatus,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<Recommendation>,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
}

/// Embedding stability measurement for one chunk within one analysis batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityMetric {
    pub chunk_id: String,
    pub batch_id: String,
    pub stability_score: f64,
    pub variance: f64,
    pub consistency: f64,
    pub is_anomaly: bool,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
}

/// Directed relationship between two chunks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub source_chunk_id: String,
    pub target_chunk_id: String,
    pub relationship_type: RelationshipType,
    pub confidence: f64,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
}

/// Band labels for one retrieval evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalBands {
    pub precision: MetricBand,
    pub recall: MetricBand,
    pub mrr: MetricBand,
    pub latency: MetricBand,
}

/// Quality metrics for one executed retrieval query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalMetric {
    pub id: String,
    pub workspace_id: String,
    pub query: String,
    pub retrieved_chunk_ids: Vec<String>,
    pub relevant_chunk_ids: Vec<String>,
    pub precision: f64,
    pub recall: f64,
    pub mrr: f64,
    pub latency_ms: u64,
    pub bands: RetrievalBands,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
}

/// Quality metrics for one generated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetric {
    pub id: String,
    pub workspace_id: String,
    pub query: String,
    pub response_text: String,
    pub coherence_score: f64,
    pub hallucination_score: f64,
    pub source_attribution_score: f64,
    pub factual_consistency_score: f64,
    pub overall_quality_score: f64,
    pub quality_assessment: ResponseAssessment,
    pub issues_detected: Vec<String>,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
}

/// Declarative rule definition: which field, how to compare, against what
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub field: String,
    pub operator: RuleOperator,
    /// Scalar operand, or `[min, max]` for `in_range`
    pub value: serde_json::Value,
}

/// User-managed validation rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRule {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub rule_type: RuleType,
    pub definition: RuleDefinition,
    /// 1-100; affects evaluation order only, never whether a rule runs
    pub priority: u8,
    pub severity: Severity,
    pub is_active: bool,
    #[serde(default)]
    pub auto_fix: Option<String>,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
    #[serde(default = "now_rfc3339")]
    pub updated_at: String,
}

impl ValidationRule {
    pub fn new(
        workspace_id: String,
        name: String,
        rule_type: RuleType,
        definition: RuleDefinition,
        priority: u8,
        severity: Severity,
    ) -> Self {
        let now = now_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            workspace_id,
            name,
            rule_type,
            definition,
            priority,
            severity,
            is_active: true,
            auto_fix: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Outcome of evaluating one rule against one chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub id: String,
    pub chunk_id: String,
    pub rule_id: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_type_specificity_ordering() {
        assert!(BoundaryType::Section > BoundaryType::Paragraph);
        assert!(BoundaryType::Paragraph > BoundaryType::Sentence);
        assert!(BoundaryType::Sentence > BoundaryType::Semantic);
        assert!(BoundaryType::Semantic > BoundaryType::Weak);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_enum_string_round_trips() {
        for ct in [
            ContentType::Product,
            ContentType::Specification,
            ContentType::LegalDisclaimer,
            ContentType::Other,
        ] {
            assert_eq!(ct.to_string().parse::<ContentType>().unwrap(), ct);
        }
        for bt in [
            BoundaryType::Weak,
            BoundaryType::Semantic,
            BoundaryType::Sentence,
            BoundaryType::Paragraph,
            BoundaryType::Section,
        ] {
            assert_eq!(bt.to_string().parse::<BoundaryType>().unwrap(), bt);
        }
        assert_eq!(
            "needs_review".parse::<ValidationStatus>().unwrap(),
            ValidationStatus::NeedsReview
        );
        assert_eq!("in_range".parse::<RuleOperator>().unwrap(), RuleOperator::InRange);
    }

    #[test]
    fn test_chunk_validate_rejects_empty_text() {
        let chunk = Chunk::new("ws".into(), "doc".into(), 0, "   ".into());
        assert!(chunk.validate().is_err());
    }

    #[test]
    fn test_chunk_validate_rejects_non_finite_embedding() {
        let mut chunk = Chunk::new("ws".into(), "doc".into(), 0, "some text".into());
        chunk.embedding = Some(vec![0.1, f32::NAN, 0.3]);
        assert!(chunk.validate().is_err());
    }

    #[test]
    fn test_chunk_hash_is_stable() {
        let a = Chunk::new("ws".into(), "doc".into(), 0, "same text".into());
        let b = Chunk::new("ws".into(), "doc".into(), 1, "same text".into());
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_classification_confidence_bounds() {
        let mut c = Classification::new(
            "chunk".into(),
            ContentType::Product,
            0.95,
            "matches product cues".into(),
            "http".into(),
        );
        assert!(c.validate().is_ok());
        assert!(!c.low_confidence);

        c.confidence = 1.5;
        assert!(c.validate().is_err());

        let low = Classification::new(
            "chunk".into(),
            ContentType::Other,
            0.3,
            "weak signal".into(),
            "http".into(),
        );
        assert!(low.low_confidence);
    }

    #[test]
    fn test_response_assessment_bands() {
        assert_eq!(ResponseAssessment::from_score(0.95), ResponseAssessment::Excellent);
        assert_eq!(ResponseAssessment::from_score(0.85), ResponseAssessment::VeryGood);
        assert_eq!(ResponseAssessment::from_score(0.75), ResponseAssessment::Good);
        assert_eq!(ResponseAssessment::from_score(0.65), ResponseAssessment::Fair);
        assert_eq!(ResponseAssessment::from_score(0.59), ResponseAssessment::Poor);
    }
}
