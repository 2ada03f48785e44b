//! Boundary analysis between adjacent chunks
//!
//! Scores the strength of every transition in an ordered chunk sequence by
//! combining embedding similarity, textual cues, and a sliding-window
//! clustering step that surfaces topic shifts. Product boundaries are
//! transitions where similarity drops below the configured threshold and the
//! surrounding text reads like the opening of a new catalog entry.

mod kmeans;

pub use kmeans::cluster_two;

use crate::config::BoundaryConfig;
use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::model::{Boundary, BoundaryType, Chunk};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Markdown headings, numbered section openers, or horizontal rules
    RE.get_or_init(|| Regex::new(r"(?m)^(#{1,6}\s+\S|\d+(\.\d+)*\s+[A-Z]|-{4,}\s*$)").unwrap())
}

fn catalog_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Short all-caps line: how catalog entries open
    RE.get_or_init(|| Regex::new(r"(?m)^[A-Z][A-Z0-9 \-]{2,30}\s*$").unwrap())
}

fn catalog_detail_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d+\s*[×x]\s*\d+\s*(cm|mm|m)\b|[Dd]esigned?\s+by|[Dd]esigner\b").unwrap()
    })
}

/// Textual cues observed around one transition
#[derive(Debug, Clone, Copy, Default)]
struct TransitionCues {
    ends_sentence: bool,
    ends_paragraph: bool,
    next_starts_section: bool,
    next_starts_catalog_entry: bool,
}

/// Analyzer over an ordered chunk sequence
pub struct BoundaryAnalyzer {
    config: BoundaryConfig,
}

impl BoundaryAnalyzer {
    pub fn new(config: BoundaryConfig) -> Self {
        Self { config }
    }

    /// Produce one boundary record per adjacent pair.
    ///
    /// The first and last chunk have no boundary on their outer side, so n
    /// chunks always yield exactly n-1 records. Every chunk must carry an
    /// embedding; a missing or mismatched vector rejects the whole sequence
    /// with a validation error naming the chunk.
    pub fn analyze(&self, chunks: &[Chunk]) -> Result<Vec<Boundary>> {
        if chunks.len() < 2 {
            return Ok(Vec::new());
        }

        let embeddings = self.collect_embeddings(chunks)?;
        let topic_shifts = self.detect_topic_shifts(&embeddings)?;

        let mut boundaries = Vec::with_capacity(chunks.len() - 1);
        for i in 0..chunks.len() - 1 {
            let current = &chunks[i];
            let next = &chunks[i + 1];

            let similarity = cosine_similarity(embeddings[i], embeddings[i + 1])?
                .clamp(-1.0, 1.0)
                .max(0.0);
            let cues = scan_cues(&current.text, &next.text);
            let topic_shift = topic_shifts[i];

            let boundary_type = resolve_type(similarity, cues, topic_shift);
            let boundary_score = score_boundary(boundary_type, similarity);
            let is_product_boundary = similarity < self.config.product_similarity_threshold
                && cues.next_starts_catalog_entry;

            boundaries.push(Boundary {
                chunk_id: current.id.clone(),
                next_chunk_id: next.id.clone(),
                boundary_score,
                boundary_type,
                semantic_similarity: similarity,
                is_product_boundary,
                created_at: crate::model::now_rfc3339(),
            });
        }

        debug!(
            "Analyzed {} boundaries ({} product boundaries)",
            boundaries.len(),
            boundaries.iter().filter(|b| b.is_product_boundary).count()
        );
        Ok(boundaries)
    }

    fn collect_embeddings<'a>(&self, chunks: &'a [Chunk]) -> Result<Vec<&'a [f32]>> {
        let mut embeddings = Vec::with_capacity(chunks.len());
        let mut dim = None;
        for chunk in chunks {
            let embedding = chunk.embedding.as_deref().ok_or_else(|| {
                Error::validation("embedding", format!("chunk {} has no embedding", chunk.id))
            })?;
            if let Some(expected) = dim {
                if embedding.len() != expected {
                    return Err(Error::validation(
                        "embedding",
                        format!(
                            "chunk {} dimension {} does not match {}",
                            chunk.id,
                            embedding.len(),
                            expected
                        ),
                    ));
                }
            } else {
                dim = Some(embedding.len());
            }
            embeddings.push(embedding);
        }
        Ok(embeddings)
    }

    /// Cluster a sliding window around each transition; a transition whose
    /// two sides land in different clusters is a topic shift.
    fn detect_topic_shifts(&self, embeddings: &[&[f32]]) -> Result<Vec<bool>> {
        let window = self.config.topic_window.max(2);
        let mut shifts = vec![false; embeddings.len().saturating_sub(1)];

        for i in 0..embeddings.len() - 1 {
            let start = i.saturating_sub(window / 2);
            let end = (i + 1 + window / 2).min(embeddings.len() - 1);
            let slice = &embeddings[start..=end];

            let assignments = cluster_two(slice, self.config.topic_iterations)?;
            let local_i = i - start;
            shifts[i] = assignments[local_i] != assignments[local_i + 1];
        }

        Ok(shifts)
    }
}

fn scan_cues(current: &str, next: &str) -> TransitionCues {
    let current_trimmed = current.trim_end();
    let ends_sentence = current_trimmed
        .chars()
        .last()
        .map(|c| matches!(c, '.' | '!' | '?'))
        .unwrap_or(false);
    let ends_paragraph = ends_sentence
        && current
            .trim_end_matches([' ', '\t'])
            .ends_with('\n');

    let next_head: String = next
        .lines()
        .take(3)
        .collect::<Vec<_>>()
        .join("\n");
    let next_starts_section = heading_regex().is_match(&next_head);
    let next_starts_catalog_entry =
        catalog_name_regex().is_match(&next_head) && catalog_detail_regex().is_match(next);

    TransitionCues {
        ends_sentence,
        ends_paragraph,
        next_starts_section,
        next_starts_catalog_entry,
    }
}

/// Pick the boundary type; when several cues apply the most structurally
/// specific wins (section > paragraph > sentence > semantic > weak).
fn resolve_type(similarity: f64, cues: TransitionCues, topic_shift: bool) -> BoundaryType {
    let mut candidates = vec![BoundaryType::Weak];

    if topic_shift || similarity < 0.5 {
        candidates.push(BoundaryType::Semantic);
    }
    if cues.ends_sentence {
        candidates.push(BoundaryType::Sentence);
    }
    if cues.ends_paragraph {
        candidates.push(BoundaryType::Paragraph);
    }
    if cues.next_starts_section || cues.next_starts_catalog_entry {
        candidates.push(BoundaryType::Section);
    }

    candidates.into_iter().max().unwrap_or(BoundaryType::Weak)
}

/// Combine structural specificity with semantic divergence into one score
fn score_boundary(boundary_type: BoundaryType, similarity: f64) -> f64 {
    let type_base = match boundary_type {
        BoundaryType::Section => 0.9,
        BoundaryType::Paragraph => 0.75,
        BoundaryType::Sentence => 0.6,
        BoundaryType::Semantic => 0.5,
        BoundaryType::Weak => 0.3,
    };
    (0.6 * type_base + 0.4 * (1.0 - similarity)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with(index: i32, text: &str, embedding: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new("ws".into(), "doc".into(), index, text.into());
        chunk.embedding = Some(embedding);
        chunk
    }

    fn analyzer() -> BoundaryAnalyzer {
        BoundaryAnalyzer::new(BoundaryConfig::default())
    }

    #[test]
    fn test_n_chunks_yield_n_minus_one_boundaries() {
        let chunks: Vec<Chunk> = (0..5)
            .map(|i| {
                chunk_with(
                    i,
                    &format!("Sentence number {}.", i),
                    vec![1.0, 0.1 * i as f32],
                )
            })
            .collect();

        let boundaries = analyzer().analyze(&chunks).unwrap();
        assert_eq!(boundaries.len(), 4);
        assert_eq!(boundaries[0].chunk_id, chunks[0].id);
        assert_eq!(boundaries[3].next_chunk_id, chunks[4].id);
    }

    #[test]
    fn test_single_chunk_has_no_boundaries() {
        let chunks = vec![chunk_with(0, "Only chunk.", vec![1.0, 0.0])];
        assert!(analyzer().analyze(&chunks).unwrap().is_empty());
    }

    #[test]
    fn test_missing_embedding_is_validation_error() {
        let mut chunks = vec![
            chunk_with(0, "First.", vec![1.0, 0.0]),
            chunk_with(1, "Second.", vec![0.9, 0.1]),
        ];
        chunks[1].embedding = None;
        assert!(analyzer().analyze(&chunks).is_err());
    }

    #[test]
    fn test_dimension_mismatch_is_validation_error() {
        let chunks = vec![
            chunk_with(0, "First.", vec![1.0, 0.0]),
            chunk_with(1, "Second.", vec![0.9, 0.1, 0.3]),
        ];
        assert!(analyzer().analyze(&chunks).is_err());
    }

    #[test]
    fn test_section_cue_beats_sentence_cue() {
        let cues = TransitionCues {
            ends_sentence: true,
            ends_paragraph: true,
            next_starts_section: true,
            next_starts_catalog_entry: false,
        };
        assert_eq!(resolve_type(0.9, cues, false), BoundaryType::Section);
    }

    #[test]
    fn test_weak_boundary_without_cues() {
        let cues = TransitionCues::default();
        assert_eq!(resolve_type(0.9, cues, false), BoundaryType::Weak);
    }

    #[test]
    fn test_product_boundary_detection() {
        // Similar chunks, then a hard switch into a new catalog entry
        let chunks = vec![
            chunk_with(
                0,
                "The fabric collection pairs warm tones with natural textures.",
                vec![1.0, 0.0, 0.0],
            ),
            chunk_with(
                1,
                "VALENOVA\nModular seating, 180 × 90 cm, designed by Maria Santos.",
                vec![0.0, 1.0, 0.0],
            ),
        ];

        let boundaries = analyzer().analyze(&chunks).unwrap();
        assert_eq!(boundaries.len(), 1);
        assert!(boundaries[0].is_product_boundary);
        assert_eq!(boundaries[0].boundary_type, BoundaryType::Section);
    }

    #[test]
    fn test_similar_chunks_are_not_product_boundaries() {
        let chunks = vec![
            chunk_with(0, "VALENOVA seating detail.", vec![1.0, 0.0]),
            chunk_with(
                1,
                "VALENOVA\nMore seating detail, 100 × 50 cm designed by the studio.",
                vec![0.98, 0.05],
            ),
        ];

        let boundaries = analyzer().analyze(&chunks).unwrap();
        assert!(!boundaries[0].is_product_boundary);
    }

    #[test]
    fn test_boundary_score_in_unit_range() {
        for bt in [
            BoundaryType::Weak,
            BoundaryType::Semantic,
            BoundaryType::Sentence,
            BoundaryType::Paragraph,
            BoundaryType::Section,
        ] {
            for sim in [0.0, 0.25, 0.5, 0.75, 1.0] {
                let score = score_boundary(bt, sim);
                assert!((0.0..=1.0).contains(&score));
            }
        }
    }
}
