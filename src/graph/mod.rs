//! Inter-chunk relationship graph
//!
//! Derives three edge families over one document's chunks: sequential edges
//! following document order, semantic edges from embedding similarity inside
//! a locality window, and hierarchical edges from detected heading depth.
//! Only the sequential dimension is guaranteed acyclic; semantic and
//! hierarchical edges may form cycles and consumers tolerate them.

use crate::config::GraphConfig;
use crate::embedding::cosine_similarity;
use crate::error::Result;
use crate::model::{Chunk, RelationshipEdge, RelationshipType};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn markdown_heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+\S").unwrap())
}

fn caps_heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9 \-]{2,40}$").unwrap())
}

/// Relationship graph builder
pub struct GraphBuilder {
    config: GraphConfig,
}

impl GraphBuilder {
    pub fn new(config: GraphConfig) -> Self {
        Self { config }
    }

    /// Build all edges for one document's ordered chunk sequence
    pub fn build(&self, chunks: &[Chunk]) -> Result<Vec<RelationshipEdge>> {
        let mut edges = self.sequential_edges(chunks);
        edges.extend(self.semantic_edges(chunks)?);
        edges.extend(self.hierarchical_edges(chunks));

        debug!(
            "Built {} edges over {} chunks",
            edges.len(),
            chunks.len()
        );
        Ok(edges)
    }

    /// One edge per adjacent pair, confidence fixed at 1.0
    pub fn sequential_edges(&self, chunks: &[Chunk]) -> Vec<RelationshipEdge> {
        chunks
            .windows(2)
            .map(|pair| RelationshipEdge {
                source_chunk_id: pair[0].id.clone(),
                target_chunk_id: pair[1].id.clone(),
                relationship_type: RelationshipType::Sequential,
                confidence: 1.0,
                created_at: crate::model::now_rfc3339(),
            })
            .collect()
    }

    /// Similarity-thresholded edges, bounded to a locality window so large
    /// documents never pay the full pairwise cost
    pub fn semantic_edges(&self, chunks: &[Chunk]) -> Result<Vec<RelationshipEdge>> {
        let mut edges = Vec::new();
        let window = self.config.semantic_window.max(1);

        for i in 0..chunks.len() {
            let Some(source_embedding) = chunks[i].embedding.as_deref() else {
                continue;
            };

            let end = (i + 1 + window).min(chunks.len());
            for j in i + 1..end {
                // Adjacent pairs are already covered by sequential edges
                if j == i + 1 {
                    continue;
                }
                let Some(target_embedding) = chunks[j].embedding.as_deref() else {
                    continue;
                };
                if source_embedding.len() != target_embedding.len() {
                    continue;
                }

                let similarity = cosine_similarity(source_embedding, target_embedding)?;
                if similarity > self.config.semantic_threshold {
                    edges.push(RelationshipEdge {
                        source_chunk_id: chunks[i].id.clone(),
                        target_chunk_id: chunks[j].id.clone(),
                        relationship_type: RelationshipType::Semantic,
                        confidence: similarity.clamp(0.0, 1.0),
                        created_at: crate::model::now_rfc3339(),
                    });
                }
            }
        }

        Ok(edges)
    }

    /// Parent-section to child edges derived from heading depth
    pub fn hierarchical_edges(&self, chunks: &[Chunk]) -> Vec<RelationshipEdge> {
        let depths: Vec<Option<u32>> = chunks.iter().map(heading_depth).collect();
        let mut edges = Vec::new();

        for (i, depth) in depths.iter().enumerate() {
            let Some(parent_depth) = depth else { continue };

            for (j, child_depth) in depths.iter().enumerate().skip(i + 1) {
                match child_depth {
                    // A heading at the same or shallower depth closes the section
                    Some(d) if *d <= *parent_depth => break,
                    _ => {
                        edges.push(RelationshipEdge {
                            source_chunk_id: chunks[i].id.clone(),
                            target_chunk_id: chunks[j].id.clone(),
                            relationship_type: RelationshipType::Hierarchical,
                            confidence: 0.9,
                            created_at: crate::model::now_rfc3339(),
                        });
                    }
                }
            }
        }

        edges
    }
}

/// Structural level of a chunk: explicit metadata wins, then markdown
/// heading depth, then an all-caps opening line read as a top-level section
fn heading_depth(chunk: &Chunk) -> Option<u32> {
    if let Some(depth) = chunk.metadata.heading_depth {
        return u32::try_from(depth).ok();
    }

    let first_line = chunk.text.lines().find(|l| !l.trim().is_empty())?;
    let trimmed = first_line.trim();

    if let Some(caps) = markdown_heading_regex().captures(trimmed) {
        return Some(caps[1].len() as u32);
    }
    if caps_heading_regex().is_match(trimmed) {
        return Some(1);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with(index: i32, text: &str, embedding: Option<Vec<f32>>) -> Chunk {
        let mut chunk = Chunk::new("ws".into(), "doc".into(), index, text.into());
        chunk.embedding = embedding;
        chunk
    }

    fn builder() -> GraphBuilder {
        GraphBuilder::new(GraphConfig::default())
    }

    #[test]
    fn test_sequential_edges_are_n_minus_one() {
        let chunks: Vec<Chunk> = (0..6)
            .map(|i| chunk_with(i, &format!("Chunk {}.", i), None))
            .collect();
        let edges = builder().sequential_edges(&chunks);

        assert_eq!(edges.len(), 5);
        for edge in &edges {
            assert_eq!(edge.relationship_type, RelationshipType::Sequential);
            assert_eq!(edge.confidence, 1.0);
            assert_ne!(edge.source_chunk_id, edge.target_chunk_id);
        }
    }

    #[test]
    fn test_no_sequential_edges_for_single_chunk() {
        let chunks = vec![chunk_with(0, "Only.", None)];
        assert!(builder().sequential_edges(&chunks).is_empty());
    }

    #[test]
    fn test_semantic_edges_thresholded() {
        let chunks = vec![
            chunk_with(0, "A.", Some(vec![1.0, 0.0])),
            chunk_with(1, "B.", Some(vec![0.0, 1.0])),
            chunk_with(2, "C.", Some(vec![1.0, 0.05])),
        ];
        let edges = builder().semantic_edges(&chunks).unwrap();

        // Only 0 -> 2 clears the threshold; 0 -> 1 is adjacent and skipped
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source_chunk_id, chunks[0].id);
        assert_eq!(edges[0].target_chunk_id, chunks[2].id);
        assert!(edges[0].confidence > 0.6);
    }

    #[test]
    fn test_semantic_edges_respect_locality_window() {
        let config = GraphConfig {
            semantic_window: 2,
            ..GraphConfig::default()
        };
        let chunks: Vec<Chunk> = (0..10)
            .map(|i| chunk_with(i, "Same.", Some(vec![1.0, 0.0])))
            .collect();
        let edges = GraphBuilder::new(config).semantic_edges(&chunks).unwrap();

        // With a window of 2, each chunk may only reach i+2
        for edge in &edges {
            let src = chunks.iter().position(|c| c.id == edge.source_chunk_id).unwrap();
            let dst = chunks.iter().position(|c| c.id == edge.target_chunk_id).unwrap();
            assert!(dst - src == 2);
        }
    }

    #[test]
    fn test_chunks_without_embeddings_are_skipped() {
        let chunks = vec![
            chunk_with(0, "A.", Some(vec![1.0, 0.0])),
            chunk_with(1, "B.", None),
            chunk_with(2, "C.", None),
        ];
        assert!(builder().semantic_edges(&chunks).unwrap().is_empty());
    }

    #[test]
    fn test_hierarchical_edges_from_heading_depth() {
        let chunks = vec![
            chunk_with(0, "# Seating\nThe seating range.", None),
            chunk_with(1, "Sofa details and fabrics.", None),
            chunk_with(2, "## Modular units\nUnit options.", None),
            chunk_with(3, "Unit dimensions.", None),
            chunk_with(4, "# Tables\nThe table range.", None),
        ];
        let edges = builder().hierarchical_edges(&chunks);

        let pairs: Vec<(usize, usize)> = edges
            .iter()
            .map(|e| {
                (
                    chunks.iter().position(|c| c.id == e.source_chunk_id).unwrap(),
                    chunks.iter().position(|c| c.id == e.target_chunk_id).unwrap(),
                )
            })
            .collect();

        // "# Seating" owns everything until "# Tables"
        assert!(pairs.contains(&(0, 1)));
        assert!(pairs.contains(&(0, 2)));
        assert!(pairs.contains(&(0, 3)));
        assert!(!pairs.contains(&(0, 4)));
        // "## Modular units" owns its body only
        assert!(pairs.contains(&(2, 3)));
        assert!(!pairs.contains(&(2, 4)));
    }

    #[test]
    fn test_heading_depth_detection() {
        let md = chunk_with(0, "### Deep section\nBody.", None);
        assert_eq!(heading_depth(&md), Some(3));

        let caps = chunk_with(1, "VALENOVA COLLECTION\nBody.", None);
        assert_eq!(heading_depth(&caps), Some(1));

        let plain = chunk_with(2, "Just prose text here.", None);
        assert_eq!(heading_depth(&plain), None);

        let mut explicit = chunk_with(3, "Body only.", None);
        explicit.metadata.heading_depth = Some(2);
        assert_eq!(heading_depth(&explicit), Some(2));
    }

    #[test]
    fn test_full_build_combines_edge_families() {
        let chunks = vec![
            chunk_with(0, "# Intro\nWelcome.", Some(vec![1.0, 0.0])),
            chunk_with(1, "Prose body.", Some(vec![0.9, 0.1])),
            chunk_with(2, "Related prose.", Some(vec![1.0, 0.02])),
        ];
        let edges = builder().build(&chunks).unwrap();

        let sequential = edges
            .iter()
            .filter(|e| e.relationship_type == RelationshipType::Sequential)
            .count();
        assert_eq!(sequential, 2);
        assert!(edges
            .iter()
            .any(|e| e.relationship_type == RelationshipType::Semantic));
        assert!(edges
            .iter()
            .any(|e| e.relationship_type == RelationshipType::Hierarchical));
    }
}
