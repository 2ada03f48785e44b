//! Retrieval quality evaluation
//!
//! Scores a ranked retrieval result set against a known-relevant chunk set:
//! precision, recall, reciprocal rank of the first relevant hit, and the
//! wall-clock latency of the retrieval call. Threshold comparisons only
//! label bands; they never fail the evaluation.

use crate::config::RetrievalConfig;
use crate::model::{MetricBand, RetrievalBands, RetrievalMetric};
use std::collections::HashSet;
use std::future::Future;
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

/// Retrieval quality evaluator
pub struct RetrievalEvaluator {
    config: RetrievalConfig,
}

impl RetrievalEvaluator {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Score an already-executed retrieval
    pub fn evaluate(
        &self,
        workspace_id: &str,
        query: &str,
        retrieved: Vec<String>,
        relevant: Vec<String>,
        latency_ms: u64,
    ) -> RetrievalMetric {
        let relevant_set: HashSet<&str> = relevant.iter().map(String::as_str).collect();
        let hits = retrieved
            .iter()
            .filter(|id| relevant_set.contains(id.as_str()))
            .count();

        let precision = if retrieved.is_empty() {
            0.0
        } else {
            hits as f64 / retrieved.len() as f64
        };
        let recall = if relevant.is_empty() {
            0.0
        } else {
            hits as f64 / relevant.len() as f64
        };
        let mrr = retrieved
            .iter()
            .position(|id| relevant_set.contains(id.as_str()))
            .map(|rank| 1.0 / (rank as f64 + 1.0))
            .unwrap_or(0.0);

        let bands = RetrievalBands {
            precision: band(precision > self.config.precision_threshold),
            recall: band(recall > self.config.recall_threshold),
            mrr: band(mrr > self.config.mrr_threshold),
            latency: band(latency_ms < self.config.latency_threshold_ms),
        };

        RetrievalMetric {
            id: Uuid::new_v4().to_string(),
            workspace_id: workspace_id.to_string(),
            query: query.to_string(),
            retrieved_chunk_ids: retrieved,
            relevant_chunk_ids: relevant,
            precision,
            recall,
            mrr,
            latency_ms,
            bands,
            created_at: crate::model::now_rfc3339(),
        }
    }

    /// Run a retrieval call under the wall clock and score its result.
    ///
    /// Latency is recorded even when the call fails; a failed retrieval is
    /// scored as an empty result set rather than surfaced as an error, so the
    /// caller always receives a metric.
    pub async fn evaluate_call<F, Fut, E>(
        &self,
        workspace_id: &str,
        query: &str,
        relevant: Vec<String>,
        retrieve: F,
    ) -> RetrievalMetric
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<String>, E>>,
        E: std::fmt::Display,
    {
        let started = Instant::now();
        let retrieved = match retrieve().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Retrieval call failed during evaluation: {}", e);
                Vec::new()
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        self.evaluate(workspace_id, query, retrieved, relevant, latency_ms)
    }
}

fn band(good: bool) -> MetricBand {
    if good {
        MetricBand::Good
    } else {
        MetricBand::Poor
    }
}
