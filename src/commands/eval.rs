//! Eval command implementations
//!
//! Query-time evaluation entry points: score an executed retrieval, or score
//! a generated response against its source chunks.

use crate::config::Config;
use crate::embed::create_embedder;
use crate::error::Result;
use crate::eval::{ResponseEvaluator, RetrievalEvaluator};
use crate::meta::MetaDb;
use crate::model::{MetricBand, ResponseMetric, RetrievalMetric};
use tracing::{info, warn};

/// Evaluate an executed retrieval and persist the metric
pub async fn cmd_eval_retrieval(
    config: &Config,
    db: &MetaDb,
    query: &str,
    retrieved: Vec<String>,
    relevant: Vec<String>,
    latency_ms: u64,
) -> Result<RetrievalMetric> {
    let evaluator = RetrievalEvaluator::new(config.retrieval);
    let metric = evaluator.evaluate(&config.workspace, query, retrieved, relevant, latency_ms);

    db.insert_retrieval_metric(&metric).await?;
    info!(
        "Retrieval evaluated: precision {:.2}, recall {:.2}, mrr {:.2}",
        metric.precision, metric.recall, metric.mrr
    );
    Ok(metric)
}

/// Evaluate a generated response against source chunks and persist the metric
///
/// Sources are chunk ids resolved from the records database; unknown ids are
/// skipped with a warning so a stale id never blocks the evaluation.
pub async fn cmd_eval_response(
    config: &Config,
    db: &MetaDb,
    query: &str,
    response_text: &str,
    source_chunk_ids: &[String],
) -> Result<Option<ResponseMetric>> {
    let mut sources = Vec::with_capacity(source_chunk_ids.len());
    for chunk_id in source_chunk_ids {
        match db.get_chunk(chunk_id).await? {
            Some(chunk) => sources.push(chunk.text),
            None => warn!("Source chunk {} not found; skipping", chunk_id),
        }
    }

    let evaluator = if config.embedding.semantic_check {
        match create_embedder(&config.embedding) {
            Ok(embedder) => ResponseEvaluator::with_embedder(embedder),
            Err(e) => {
                warn!("Embedder unavailable, using lexical support only: {}", e);
                ResponseEvaluator::new()
            }
        }
    } else {
        ResponseEvaluator::new()
    };
    let metric = evaluator
        .evaluate_best_effort(&config.workspace, query, response_text, &sources)
        .await;

    if let Some(metric) = &metric {
        db.insert_response_metric(metric).await?;
        info!(
            "Response evaluated: overall {:.2} ({})",
            metric.overall_quality_score, metric.quality_assessment
        );
    }
    Ok(metric)
}

fn band_marker(band: MetricBand) -> &'static str {
    match band {
        MetricBand::Good => "good",
        MetricBand::Poor => "poor",
    }
}

/// Print a retrieval metric to console
pub fn print_retrieval_metric(metric: &RetrievalMetric) {
    println!("\n🔍 Query: {}\n", metric.query);
    println!(
        "  Precision: {:.3} ({})",
        metric.precision,
        band_marker(metric.bands.precision)
    );
    println!(
        "  Recall:    {:.3} ({})",
        metric.recall,
        band_marker(metric.bands.recall)
    );
    println!(
        "  MRR:       {:.3} ({})",
        metric.mrr,
        band_marker(metric.bands.mrr)
    );
    println!(
        "  Latency:   {} ms ({})",
        metric.latency_ms,
        band_marker(metric.bands.latency)
    );
}

/// Print a response metric to console
pub fn print_response_metric(metric: &ResponseMetric) {
    println!("\n🔍 Query: {}\n", metric.query);
    println!("  Coherence:           {:.3}", metric.coherence_score);
    println!("  Hallucination:       {:.3}", metric.hallucination_score);
    println!("  Source attribution:  {:.3}", metric.source_attribution_score);
    println!("  Factual consistency: {:.3}", metric.factual_consistency_score);
    println!(
        "  Overall: {:.3} ({})",
        metric.overall_quality_score, metric.quality_assessment
    );

    for issue in &metric.issues_detected {
        println!("  ⚠ {}", issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Chunk;
    use tempfile::TempDir;

    async fn setup() -> (Config, MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = MetaDb::new(&tmp.path().join("test.db")).await.unwrap();
        (Config::default(), db, tmp)
    }

    #[tokio::test]
    async fn test_eval_retrieval_persists_metric() {
        let (config, db, _tmp) = setup().await;

        let metric = cmd_eval_retrieval(
            &config,
            &db,
            "modular seating",
            vec!["a".into(), "b".into()],
            vec!["a".into()],
            120,
        )
        .await
        .unwrap();

        assert!((metric.precision - 0.5).abs() < 1e-9);
        assert!((metric.mrr - 1.0).abs() < 1e-9);

        let counts = db.workspace_counts("default").await.unwrap();
        assert_eq!(counts.retrieval_metrics, 1);
    }

    #[tokio::test]
    async fn test_eval_response_resolves_sources_from_db() {
        let (config, db, _tmp) = setup().await;

        let chunk = Chunk::new(
            "default".into(),
            "doc".into(),
            0,
            "The VALENOVA system features premium leather upholstery in \
             black and natural finishes."
                .into(),
        );
        db.insert_chunk(&chunk).await.unwrap();

        let metric = cmd_eval_response(
            &config,
            &db,
            "what finishes",
            "The VALENOVA system features premium leather upholstery.",
            &[chunk.id.clone(), "missing-id".to_string()],
        )
        .await
        .unwrap()
        .expect("metric produced");

        assert!(metric.hallucination_score < 0.5);
        let counts = db.workspace_counts("default").await.unwrap();
        assert_eq!(counts.response_metrics, 1);
    }

    #[tokio::test]
    async fn test_eval_response_empty_text_is_best_effort_none() {
        let (config, db, _tmp) = setup().await;
        let metric = cmd_eval_response(&config, &db, "q", "  ", &[]).await.unwrap();
        assert!(metric.is_none());

        let counts = db.workspace_counts("default").await.unwrap();
        assert_eq!(counts.response_metrics, 0);
    }
}
