//! Embedding stability analysis
//!
//! Measures how far each chunk embedding sits from its batch's centroid and
//! how well it agrees with its nearest neighbors. Anomalies are flagged with
//! a per-batch sigma rule: batches differ in baseline variance, so a global
//! threshold would mislabel tight and loose batches alike.

use crate::config::StabilityConfig;
use crate::embedding::{centroid, cosine_similarity, euclidean_distance};
use crate::error::{Error, Result};
use crate::model::{Chunk, StabilityMetric};
use tracing::debug;

/// Embedding stability analyzer
pub struct StabilityAnalyzer {
    config: StabilityConfig,
}

impl StabilityAnalyzer {
    pub fn new(config: StabilityConfig) -> Self {
        Self { config }
    }

    /// Analyze one batch of chunk embeddings.
    ///
    /// Batches larger than the configured window are scored window by window
    /// against streaming whole-batch statistics, so the full embedding set is
    /// never required in one working set.
    pub fn analyze(&self, batch_id: &str, chunks: &[Chunk]) -> Result<Vec<StabilityMetric>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = collect_embeddings(chunks)?;
        let dim = embeddings[0].len();

        // Pass 1: streaming accumulation of the batch centroid
        let mut sums = vec![0.0f64; dim];
        for window in embeddings.chunks(self.config.window_size) {
            for vector in window {
                for (slot, v) in sums.iter_mut().zip(vector.iter()) {
                    *slot += f64::from(*v);
                }
            }
        }
        let n = embeddings.len() as f64;
        let batch_centroid: Vec<f32> = sums.iter().map(|s| (s / n) as f32).collect();

        // Pass 2: distance distribution against the centroid
        let mut distances = Vec::with_capacity(embeddings.len());
        for window in embeddings.chunks(self.config.window_size) {
            for vector in window {
                distances.push(euclidean_distance(vector, &batch_centroid)?);
            }
        }

        let mean_distance = distances.iter().sum::<f64>() / n;
        let distance_variance =
            distances.iter().map(|d| (d - mean_distance).powi(2)).sum::<f64>() / n;
        let std_distance = distance_variance.sqrt();
        let max_distance = distances.iter().cloned().fold(0.0f64, f64::max);
        let anomaly_cutoff = mean_distance + self.config.anomaly_sigma * std_distance;

        // Pass 3: per-window scoring; neighbor lookups stay inside the window
        let mut metrics = Vec::with_capacity(chunks.len());
        let mut offset = 0usize;
        for window in embeddings.chunks(self.config.window_size) {
            for (local, vector) in window.iter().enumerate() {
                let index = offset + local;
                let distance = distances[index];

                let stability_score = if max_distance > 0.0 {
                    1.0 - distance / max_distance
                } else {
                    1.0
                };
                let variance = per_chunk_variance(vector, &batch_centroid);
                let consistency = self.consistency(local, window)?;
                let is_anomaly = std_distance > 0.0 && distance > anomaly_cutoff;

                metrics.push(StabilityMetric {
                    chunk_id: chunks[index].id.clone(),
                    batch_id: batch_id.to_string(),
                    stability_score,
                    variance,
                    consistency,
                    is_anomaly,
                    created_at: crate::model::now_rfc3339(),
                });
            }
            offset += window.len();
        }

        debug!(
            "Stability batch {}: {} chunks, {} anomalies (cutoff {:.4})",
            batch_id,
            metrics.len(),
            metrics.iter().filter(|m| m.is_anomaly).count(),
            anomaly_cutoff
        );
        Ok(metrics)
    }

    /// Agreement between a chunk and the mean of its k nearest neighbors
    fn consistency(&self, local: usize, window: &[&[f32]]) -> Result<f64> {
        let k = self.config.consistency_k.min(window.len().saturating_sub(1));
        if k == 0 {
            return Ok(1.0);
        }

        let target = window[local];
        let mut neighbor_distances: Vec<(usize, f64)> = Vec::with_capacity(window.len() - 1);
        for (i, other) in window.iter().enumerate() {
            if i == local {
                continue;
            }
            neighbor_distances.push((i, euclidean_distance(target, other)?));
        }
        neighbor_distances
            .sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let neighbors: Vec<&[f32]> = neighbor_distances
            .iter()
            .take(k)
            .map(|(i, _)| window[*i])
            .collect();
        let local_mean = centroid(&neighbors)?;

        Ok(cosine_similarity(target, &local_mean)?.max(0.0))
    }
}

fn collect_embeddings(chunks: &[Chunk]) -> Result<Vec<&[f32]>> {
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

/// Mean squared deviation of the chunk's dimensions from the batch centroid
fn per_chunk_variance(vector: &[f32], batch_centroid: &[f32]) -> f64 {
    let dim = vector.len() as f64;
    vector
        .iter()
        .zip(batch_centroid.iter())
        .map(|(v, c)| (f64::from(*v) - f64::from(*c)).powi(2))
        .sum::<f64>()
        / dim
}
