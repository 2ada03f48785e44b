//! Score command implementation
//!
//! Reads a chunk dump produced by the upstream ingestion pipeline and runs
//! the full ingestion-time scoring flow over it.

use crate::classify::create_classifier_chain;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use crate::model::{Chunk, ChunkMetadata};
use crate::pipeline::{DocumentPipeline, PipelineStats};
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Score options
#[derive(Debug, Clone, Default)]
pub struct ScoreOptions {
    /// Override the document id recorded on the chunks
    pub document_id: Option<String>,
}

/// One chunk as it arrives from the ingestion pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkInput {
    pub chunk_index: i32,
    pub text: String,
    #[serde(default)]
    pub page: Option<i32>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Option<ChunkMetadata>,
}

/// A chunk dump file: one document's chunks
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkDump {
    #[serde(default)]
    pub document_id: Option<String>,
    pub chunks: Vec<ChunkInput>,
}

impl ChunkDump {
    /// Load a dump from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let dump: ChunkDump = serde_json::from_str(&content)?;
        if dump.chunks.is_empty() {
            return Err(Error::validation("chunks", "chunk dump is empty"));
        }
        Ok(dump)
    }

    /// Convert to chunk records owned by the given workspace
    pub fn into_chunks(self, workspace_id: &str, document_override: Option<String>) -> Vec<Chunk> {
        let document_id = document_override
            .or(self.document_id)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        self.chunks
            .into_iter()
            .map(|input| {
                let mut chunk = Chunk::new(
                    workspace_id.to_string(),
                    document_id.clone(),
                    input.chunk_index,
                    input.text,
                );
                chunk.page = input.page;
                chunk.embedding = input.embedding;
                if let Some(metadata) = input.metadata {
                    chunk.metadata = metadata;
                }
                chunk
            })
            .collect()
    }
}

/// Score a chunk dump file
pub async fn cmd_score(
    config: &Config,
    db: &MetaDb,
    path: &Path,
    options: ScoreOptions,
) -> Result<PipelineStats> {
    let dump = ChunkDump::load(path)?;
    let chunks = dump.into_chunks(&config.workspace, options.document_id);
    info!("Scoring {} chunks from {:?}", chunks.len(), path);

    let classifiers = create_classifier_chain(&config.classification)?;
    let pipeline = DocumentPipeline::new(config.clone(), db.clone(), classifiers);
    pipeline.process_document(chunks).await
}

/// Print scoring statistics to console
pub fn print_score_stats(stats: &PipelineStats) {
    println!("\n✓ Scoring complete");
    println!("  Chunks processed: {}", stats.chunks_processed);
    if stats.chunks_skipped > 0 {
        println!("  Chunks skipped: {}", stats.chunks_skipped);
    }
    println!("  Classified: {}", stats.classified);
    if stats.classification_unavailable > 0 {
        println!(
            "  Classification unavailable: {}",
            stats.classification_unavailable
        );
    }
    println!(
        "  Boundaries recorded: {} ({} product boundaries)",
        stats.boundaries_recorded, stats.product_boundaries
    );
    println!("  Chunks scored: {}", stats.chunks_scored);
    if stats.score_failures > 0 {
        println!("  Score failures: {}", stats.score_failures);
    }
    println!("  Stability anomalies: {}", stats.stability_anomalies);
    println!("  Relationship edges: {}", stats.edges_created);

    for error in &stats.errors {
        println!("  ⚠ {}", error);
    }
}
