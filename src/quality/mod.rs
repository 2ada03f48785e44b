//! Composite chunk quality scoring
//!
//! Combines five weighted sub-scores into one validation score, derives the
//! validation status, and generates issues/recommendations deterministically
//! from whichever sub-scores fell below the configured floor. Scoring the
//! same chunk/classification/boundary triple twice yields byte-identical
//! results apart from timestamps.

use crate::config::{QualityConfig, ScoreWeights};
use crate::error::{Error, Result};
use crate::model::{
    Boundary, Chunk, Classification, Issue, Recommendation, Severity, ValidationScore,
    ValidationStatus,
};

/// Classification and boundary context for the chunk under scoring
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityContext<'a> {
    pub classification: Option<&'a Classification>,
    pub preceding: Option<&'a Boundary>,
    pub following: Option<&'a Boundary>,
}

/// The five weighted sub-scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubScores {
    pub semantic_completeness: f64,
    pub boundary_quality: f64,
    pub context_preservation: f64,
    pub structural_integrity: f64,
    pub metadata_richness: f64,
}

impl SubScores {
    fn all(&self) -> [(&'static str, f64); 5] {
        [
            ("semantic_completeness", self.semantic_completeness),
            ("boundary_quality", self.boundary_quality),
            ("context_preservation", self.context_preservation),
            ("structural_integrity", self.structural_integrity),
            ("metadata_richness", self.metadata_richness),
        ]
    }
}

/// Chunk quality scorer
pub struct QualityScorer {
    weights: ScoreWeights,
    thresholds: QualityConfig,
}

impl QualityScorer {
    /// Create a scorer; rejects weights that do not sum to 1.0
    pub fn new(weights: ScoreWeights, thresholds: QualityConfig) -> Result<Self> {
        if (weights.sum() - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "quality weights must sum to 1.0, got {}",
                weights.sum()
            )));
        }
        Ok(Self {
            weights,
            thresholds,
        })
    }

    /// Score one chunk against its classification and boundary context
    pub fn score(&self, chunk: &Chunk, context: &QualityContext) -> Result<ValidationScore> {
        chunk.validate()?;

        let sub = SubScores {
            semantic_completeness: semantic_completeness(&chunk.text),
            boundary_quality: boundary_quality(context.preceding, context.following),
            context_preservation: context_preservation(&chunk.text),
            structural_integrity: structural_integrity(&chunk.text),
            metadata_richness: metadata_richness(chunk, context.classification),
        };

        let mut extra_issues = Vec::new();
        if chunk.text.trim().len() < 20 {
            extra_issues.push(Issue {
                issue_type: "degenerate_chunk".to_string(),
                severity: Severity::Critical,
                description: "chunk text is too short to carry meaning".to_string(),
            });
        }

        Ok(self.compose(chunk.id.clone(), sub, extra_issues))
    }

    /// Combine sub-scores into the final record. Split out so synthetic
    /// sub-scores can be fed straight in.
    pub fn compose(
        &self,
        chunk_id: String,
        sub: SubScores,
        mut issues: Vec<Issue>,
    ) -> ValidationScore {
        let overall = (self.weights.semantic_completeness * sub.semantic_completeness
            + self.weights.boundary_quality * sub.boundary_quality
            + self.weights.context_preservation * sub.context_preservation
            + self.weights.structural_integrity * sub.structural_integrity
            + self.weights.metadata_richness * sub.metadata_richness)
            .clamp(0.0, 1.0);

        let mut recommendations = Vec::new();
        for (name, value) in sub.all() {
            if value < self.thresholds.subscore_floor {
                let (issue, recommendation) = flag_low_subscore(name, value);
                issues.push(issue);
                if let Some(rec) = recommendation {
                    recommendations.push(rec);
                }
            }
        }

        let has_critical = issues.iter().any(|i| i.severity == Severity::Critical);
        let any_low = sub.all().iter().any(|(_, v)| *v < self.thresholds.subscore_floor);

        let validation_status = if has_critical {
            ValidationStatus::Rejected
        } else if overall >= self.thresholds.validated_threshold {
            ValidationStatus::Validated
        } else if overall >= self.thresholds.review_threshold {
            if any_low {
                ValidationStatus::NeedsReview
            } else {
                ValidationStatus::Validated
            }
        } else {
            ValidationStatus::NeedsReview
        };

        ValidationScore {
            chunk_id,
            semantic_completeness: sub.semantic_completeness,
            boundary_quality: sub.boundary_quality,
            context_preservation: sub.context_preservation,
            structural_integrity: sub.structural_integrity,
            metadata_richness: sub.metadata_richness,
            overall_validation_score: overall,
            validation_status,
            issues,
            recommendations,
            created_at: crate::model::now_rfc3339(),
        }
    }
}

fn flag_low_subscore(name: &str, value: f64) -> (Issue, Option<Recommendation>) {
    let (severity, issue_type, description, rec) = match name {
        "semantic_completeness" => (
            Severity::Warning,
            "incomplete_semantics",
            "chunk appears cut off or fragmentary",
            Some(("review_truncation", "re-chunk with larger limits", 2)),
        ),
        "boundary_quality" => (
            Severity::Warning,
            "weak_boundaries",
            "adjacent boundaries are weak; chunk may straddle topics",
            Some(("merge_with_next", "merge this chunk with its neighbor", 1)),
        ),
        "context_preservation" => (
            Severity::Warning,
            "context_loss",
            "chunk opens with unresolved references",
            Some(("expand_overlap", "increase chunk overlap to retain context", 2)),
        ),
        "structural_integrity" => (
            Severity::Warning,
            "broken_structure",
            "markup structure is unbalanced inside the chunk",
            Some(("rechunk_document", "re-run chunking with structure-aware breaks", 1)),
        ),
        "metadata_richness" => (
            Severity::Info,
            "sparse_metadata",
            "few metadata fields populated for this chunk",
            Some(("enrich_metadata", "run metadata extraction over the chunk", 3)),
        ),
        _ => (Severity::Info, "low_subscore", "sub-score below floor", None),
    };

    let issue = Issue {
        issue_type: issue_type.to_string(),
        severity,
        description: format!("{} ({:.2})", description, value),
    };
    let recommendation = rec.map(|(rec_type, text, priority)| Recommendation {
        rec_type: rec_type.to_string(),
        description: text.to_string(),
        priority,
    });
    (issue, recommendation)
}

/// Whether the chunk reads as a self-contained span of text
fn semantic_completeness(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let starts_clean = trimmed
        .chars()
        .next()
        .map(|c| c.is_uppercase() || c.is_numeric() || c == '#')
        .unwrap_or(false);
    let ends_clean = trimmed
        .chars()
        .last()
        .map(|c| matches!(c, '.' | '!' | '?' | ':' | '"'))
        .unwrap_or(false);
    let words = trimmed.split_whitespace().count();
    let length_factor = (words as f64 / 40.0).min(1.0);

    0.3 * f64::from(starts_clean as u8) + 0.4 * f64::from(ends_clean as u8) + 0.3 * length_factor
}

/// Average strength of the boundaries either side of the chunk
fn boundary_quality(preceding: Option<&Boundary>, following: Option<&Boundary>) -> f64 {
    match (preceding, following) {
        (Some(p), Some(f)) => (p.boundary_score + f.boundary_score) / 2.0,
        (Some(b), None) | (None, Some(b)) => b.boundary_score,
        (None, None) => 0.5,
    }
}

/// Penalize openings that depend on text outside the chunk
fn context_preservation(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let first_word = trimmed
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();

    let mut score: f64 = if trimmed.chars().next().map(|c| c.is_lowercase()).unwrap_or(false) {
        0.3
    } else if matches!(
        first_word.as_str(),
        "however" | "therefore" | "and" | "but" | "also" | "additionally" | "furthermore"
    ) {
        0.5
    } else if matches!(first_word.as_str(), "it" | "this" | "these" | "they" | "those") {
        0.6
    } else {
        0.9
    };

    let ends_mid_sentence = !text
        .trim_end()
        .chars()
        .last()
        .map(|c| matches!(c, '.' | '!' | '?' | ':'))
        .unwrap_or(false);
    if ends_mid_sentence {
        score -= 0.2;
    }

    score.clamp(0.0, 1.0)
}

/// Markup balance inside the chunk
fn structural_integrity(text: &str) -> f64 {
    let mut score = 1.0f64;

    let fence_count = text.matches("```").count();
    if fence_count % 2 != 0 {
        score -= 0.4;
    }

    if let Some(last) = text.lines().rev().find(|l| !l.trim().is_empty()) {
        if last.trim_start().starts_with('#') {
            score -= 0.2;
        }
    }

    let opens = text.matches('(').count() as i64;
    let closes = text.matches(')').count() as i64;
    if (opens - closes).abs() > 2 {
        score -= 0.2;
    }

    score.clamp(0.0, 1.0)
}

/// Fraction of metadata surface actually populated
fn metadata_richness(chunk: &Chunk, classification: Option<&Classification>) -> f64 {
    let m = &chunk.metadata;
    let present = [
        m.product_name.is_some(),
        m.designer.is_some(),
        m.dimensions.is_some(),
        m.specification_count.is_some(),
        m.image_count.is_some(),
        m.heading_depth.is_some(),
        chunk.page.is_some(),
        classification.map(|c| !c.sub_categories.is_empty()).unwrap_or(false),
    ]
    .iter()
    .filter(|p| **p)
    .count();

    present as f64 / 8.0
}
