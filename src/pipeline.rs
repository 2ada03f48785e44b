//! Ingestion-time scoring pipeline
//!
//! Runs one document's chunks through classification, boundary analysis,
//! quality scoring, stability analysis, and graph building, persisting every
//! record. Classification fans out with bounded concurrency; stability and
//! graph building need the whole chunk set and run after the per-chunk
//! stages complete. A failure on one chunk never aborts its siblings, and a
//! failed stage degrades to "not scored" for the affected records.

use crate::boundary::BoundaryAnalyzer;
use crate::classify::{ClassificationOutcome, ClassifierChain, ClassifyRequest};
use crate::config::Config;
use crate::error::Result;
use crate::graph::GraphBuilder;
use crate::meta::MetaDb;
use crate::model::{Boundary, Chunk, Classification};
use crate::quality::{QualityContext, QualityScorer};
use crate::stability::StabilityAnalyzer;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome summary for one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub chunks_processed: usize,
    pub chunks_skipped: usize,
    pub classified: usize,
    pub classification_unavailable: usize,
    pub boundaries_recorded: usize,
    pub product_boundaries: usize,
    pub chunks_scored: usize,
    pub score_failures: usize,
    pub stability_anomalies: usize,
    pub edges_created: usize,
    pub errors: Vec<String>,
}

/// Last `n` characters of a chunk, used as neighboring context
fn tail_chars(text: &str, n: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(n)).collect()
}

/// Per-document scoring pipeline
pub struct DocumentPipeline {
    config: Config,
    db: MetaDb,
    classifiers: ClassifierChain,
}

impl DocumentPipeline {
    pub fn new(config: Config, db: MetaDb, classifiers: ClassifierChain) -> Self {
        Self {
            config,
            db,
            classifiers,
        }
    }

    /// Process one document's chunk sequence end to end
    pub async fn process_document(&self, chunks: Vec<Chunk>) -> Result<PipelineStats> {
        let mut stats = PipelineStats::default();

        // Malformed chunks are rejected individually; siblings continue
        let mut accepted: Vec<Chunk> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match chunk.validate() {
                Ok(()) => match self.db.insert_chunk(&chunk).await {
                    Ok(()) => accepted.push(chunk),
                    Err(e) => {
                        stats.chunks_skipped += 1;
                        stats.errors.push(format!("chunk {}: {}", chunk.id, e));
                    }
                },
                Err(e) => {
                    stats.chunks_skipped += 1;
                    stats.errors.push(format!("chunk {}: {}", chunk.id, e));
                }
            }
        }
        stats.chunks_processed = accepted.len();

        if accepted.is_empty() {
            return Ok(stats);
        }

        let classifications = self.classify_chunks(&accepted, &mut stats).await;
        let boundaries = self.analyze_boundaries(&accepted, &mut stats).await;
        self.score_chunks(&accepted, &classifications, &boundaries, &mut stats)
            .await;
        self.analyze_stability(&accepted, &mut stats).await;
        self.build_graph(&accepted, &mut stats).await;

        info!(
            "Pipeline complete: {} chunks, {} classified, {} scored, {} anomalies, {} edges",
            stats.chunks_processed,
            stats.classified,
            stats.chunks_scored,
            stats.stability_anomalies,
            stats.edges_created
        );
        Ok(stats)
    }

    async fn classify_chunks(
        &self,
        chunks: &[Chunk],
        stats: &mut PipelineStats,
    ) -> Vec<Option<Classification>> {
        // Each request carries only its own neighborhood; chunks never see
        // context from unrelated positions in the batch
        let requests: Vec<ClassifyRequest> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| ClassifyRequest {
                chunk_id: chunk.id.clone(),
                text: chunk.text.clone(),
                context: if i > 0 {
                    Some(tail_chars(&chunks[i - 1].text, 200))
                } else {
                    None
                },
            })
            .collect();

        let outcomes = self
            .classifiers
            .classify_batch(requests, self.config.concurrency.classification)
            .await;

        let mut classifications = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                ClassificationOutcome::Classified(classification) => {
                    match self.db.insert_classification(&classification).await {
                        Ok(()) => {
                            stats.classified += 1;
                            classifications.push(Some(classification));
                        }
                        Err(e) => {
                            stats
                                .errors
                                .push(format!("classification {}: {}", classification.chunk_id, e));
                            classifications.push(None);
                        }
                    }
                }
                ClassificationOutcome::Unavailable { chunk_id, reason } => {
                    warn!("Classification unavailable for {}: {}", chunk_id, reason);
                    stats.classification_unavailable += 1;
                    classifications.push(None);
                }
            }
        }
        classifications
    }

    async fn analyze_boundaries(
        &self,
        chunks: &[Chunk],
        stats: &mut PipelineStats,
    ) -> Vec<Boundary> {
        let analyzer = BoundaryAnalyzer::new(self.config.boundary);
        match analyzer.analyze(chunks) {
            Ok(boundaries) => {
                stats.boundaries_recorded = boundaries.len();
                stats.product_boundaries =
                    boundaries.iter().filter(|b| b.is_product_boundary).count();
                if let Err(e) = self.db.insert_boundaries(&boundaries).await {
                    stats.errors.push(format!("boundaries: {}", e));
                }
                boundaries
            }
            Err(e) => {
                warn!("Boundary analysis skipped: {}", e);
                stats.errors.push(format!("boundaries: {}", e));
                Vec::new()
            }
        }
    }

    async fn score_chunks(
        &self,
        chunks: &[Chunk],
        classifications: &[Option<Classification>],
        boundaries: &[Boundary],
        stats: &mut PipelineStats,
    ) {
        let scorer = match QualityScorer::new(self.config.weights, self.config.quality) {
            Ok(scorer) => scorer,
            Err(e) => {
                stats.errors.push(format!("quality scorer: {}", e));
                return;
            }
        };

        let bar = crate::progress::scoring_bar(chunks.len() as u64);
        bar.set_message("scoring chunks");

        for (i, chunk) in chunks.iter().enumerate() {
            bar.inc(1);
            let preceding = if i > 0 { boundaries.get(i - 1) } else { None };
            let following = boundaries.get(i);
            let context = QualityContext {
                classification: classifications.get(i).and_then(Option::as_ref),
                preceding,
                following,
            };

            match scorer.score(chunk, &context) {
                Ok(score) => match self.db.insert_validation_score(&score).await {
                    Ok(()) => stats.chunks_scored += 1,
                    Err(e) => {
                        stats.score_failures += 1;
                        stats.errors.push(format!("score {}: {}", chunk.id, e));
                    }
                },
                Err(e) => {
                    // Scoring is advisory; the chunk stays, just unscored
                    warn!("Chunk {} not scored: {}", chunk.id, e);
                    stats.score_failures += 1;
                    stats.errors.push(format!("score {}: {}", chunk.id, e));
                }
            }
        }

        bar.finish_and_clear();
    }

    async fn analyze_stability(&self, chunks: &[Chunk], stats: &mut PipelineStats) {
        let analyzer = StabilityAnalyzer::new(self.config.stability);
        let batch_id = Uuid::new_v4().to_string();
        match analyzer.analyze(&batch_id, chunks) {
            Ok(metrics) => {
                stats.stability_anomalies = metrics.iter().filter(|m| m.is_anomaly).count();
                if let Err(e) = self.db.insert_stability_metrics(&metrics).await {
                    stats.errors.push(format!("stability: {}", e));
                }
            }
            Err(e) => {
                warn!("Stability analysis skipped: {}", e);
                stats.errors.push(format!("stability: {}", e));
            }
        }
    }

    async fn build_graph(&self, chunks: &[Chunk], stats: &mut PipelineStats) {
        let builder = GraphBuilder::new(self.config.graph);
        match builder.build(chunks) {
            Ok(edges) => {
                stats.edges_created = edges.len();
                if let Err(e) = self.db.insert_edges(&edges).await {
                    stats.errors.push(format!("edges: {}", e));
                }
            }
            Err(e) => {
                warn!("Graph build skipped: {}", e);
                stats.errors.push(format!("edges: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::KeywordClassifier;
    use crate::providers::CircuitBreaker;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn setup() -> (DocumentPipeline, MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = MetaDb::new(&tmp.path().join("test.db")).await.unwrap();

        let mut chain = ClassifierChain::new();
        chain.push(
            Box::new(KeywordClassifier::new()),
            CircuitBreaker::new(5, Duration::from_secs(60)),
        );

        let pipeline = DocumentPipeline::new(Config::default(), db.clone(), chain);
        (pipeline, db, tmp)
    }

    fn chunk_with(index: i32, text: &str, embedding: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new("default".into(), "doc-1".into(), index, text.into());
        chunk.embedding = Some(embedding);
        chunk
    }

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            chunk_with(
                0,
                "# Collection overview\nThe signature collection introduces \
                 modular seating designed for contemporary interiors.",
                vec![1.0, 0.1, 0.0],
            ),
            chunk_with(
                1,
                "The seating range is available in leather upholstery with \
                 several configurations for modern living spaces.",
                vec![0.9, 0.2, 0.0],
            ),
            chunk_with(
                2,
                "Technical Specifications:\nMaterial: aluminum alloy.\n\
                 Weight capacity: 150 kg.\nDimensions: 200 × 100 × 80 mm.",
                vec![0.1, 0.9, 0.2],
            ),
        ]
    }

    #[tokio::test]
    async fn test_full_pipeline_persists_all_record_families() {
        let (pipeline, db, _tmp) = setup().await;
        let chunks = sample_chunks();
        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();

        let stats = pipeline.process_document(chunks).await.unwrap();

        assert_eq!(stats.chunks_processed, 3);
        assert_eq!(stats.classified, 3);
        assert_eq!(stats.boundaries_recorded, 2);
        assert_eq!(stats.chunks_scored, 3);
        assert_eq!(stats.score_failures, 0);
        assert!(stats.edges_created >= 2);

        // Records are queryable afterwards
        assert!(db.latest_classification(&ids[0]).await.unwrap().is_some());
        assert!(db.latest_validation_score(&ids[1]).await.unwrap().is_some());
        let counts = db.workspace_counts("default").await.unwrap();
        assert_eq!(counts.chunks, 3);
        assert_eq!(counts.boundaries, 2);
        assert_eq!(counts.stability_metrics, 3);
    }

    #[tokio::test]
    async fn test_bad_chunk_does_not_abort_siblings() {
        let (pipeline, db, _tmp) = setup().await;
        let mut chunks = sample_chunks();
        chunks.insert(1, Chunk::new("default".into(), "doc-1".into(), 9, "  ".into()));

        let stats = pipeline.process_document(chunks).await.unwrap();

        assert_eq!(stats.chunks_skipped, 1);
        assert_eq!(stats.chunks_processed, 3);
        assert_eq!(stats.classified, 3);
        assert!(!stats.errors.is_empty());

        let counts = db.workspace_counts("default").await.unwrap();
        assert_eq!(counts.chunks, 3);
    }

    #[tokio::test]
    async fn test_missing_embeddings_degrade_not_abort() {
        let (pipeline, db, _tmp) = setup().await;
        let mut chunks = sample_chunks();
        chunks[1].embedding = None;

        let stats = pipeline.process_document(chunks).await.unwrap();

        // Boundary/stability stages are skipped, chunks still classified
        // and scored
        assert_eq!(stats.chunks_processed, 3);
        assert_eq!(stats.classified, 3);
        assert_eq!(stats.boundaries_recorded, 0);
        assert_eq!(stats.chunks_scored, 3);
        assert!(!stats.errors.is_empty());

        let counts = db.workspace_counts("default").await.unwrap();
        assert_eq!(counts.stability_metrics, 0);
    }

    #[test]
    fn test_tail_chars_respects_char_boundaries() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 10), "ab");
        // 180 × 90 contains a multi-byte character near the cut
        assert_eq!(tail_chars("size 180 × 90", 6), "0 × 90");
    }

    #[tokio::test]
    async fn test_empty_document() {
        let (pipeline, _db, _tmp) = setup().await;
        let stats = pipeline.process_document(Vec::new()).await.unwrap();
        assert_eq!(stats.chunks_processed, 0);
        assert_eq!(stats.boundaries_recorded, 0);
    }
}
