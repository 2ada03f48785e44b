//! Validation record storage using SQLite
//!
//! This module persists all nine record types and serves the aggregate
//! statistics surfaces. Records are partitioned by workspace: every query
//! filters on the workspace that owns the source document, and nothing here
//! ever crosses that partition.

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    Boundary, Chunk, ChunkMetadata, Classification, RelationshipEdge, ResponseMetric,
    RetrievalMetric, RuleDefinition, StabilityMetric, ValidationResult, ValidationRule,
    ValidationScore,
};
use crate::rules::validate_rule;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};

/// Validation records database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

#[derive(Debug, Clone, FromRow)]
struct ChunkRow {
    id: String,
    workspace_id: String,
    document_id: String,
    chunk_index: i32,
    text: String,
    content_hash: String,
    page: Option<i32>,
    embedding_json: Option<String>,
    metadata_json: Option<String>,
    created_at: String,
}

impl ChunkRow {
    fn into_chunk(self) -> Chunk {
        Chunk {
            id: self.id,
            workspace_id: self.workspace_id,
            document_id: self.document_id,
            chunk_index: self.chunk_index,
            text: self.text,
            content_hash: self.content_hash,
            page: self.page,
            embedding: self
                .embedding_json
                .as_deref()
                .and_then(|j| serde_json::from_str(j).ok()),
            metadata: self
                .metadata_json
                .as_deref()
                .and_then(|j| serde_json::from_str(j).ok())
                .unwrap_or_else(ChunkMetadata::default),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct ClassificationRow {
    id: String,
    chunk_id: String,
    content_type: String,
    confidence: f64,
    reasoning: String,
    sub_categories_json: Option<String>,
    model: String,
    low_confidence: bool,
    created_at: String,
}

impl ClassificationRow {
    fn into_classification(self) -> Result<Classification> {
        Ok(Classification {
            id: self.id,
            chunk_id: self.chunk_id,
            content_type: self.content_type.parse()?,
            confidence: self.confidence,
            reasoning: self.reasoning,
            sub_categories: self
                .sub_categories_json
                .as_deref()
                .and_then(|j| serde_json::from_str(j).ok())
                .unwrap_or_default(),
            model: self.model,
            low_confidence: self.low_confidence,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct ScoreRow {
    chunk_id: String,
    semantic_completeness: f64,
    boundary_quality: f64,
    context_preservation: f64,
    structural_integrity: f64,
    metadata_richness: f64,
    overall_validation_score: f64,
    validation_status: String,
    issues_json: Option<String>,
    recommendations_json: Option<String>,
    created_at: String,
}

impl ScoreRow {
    fn into_score(self) -> Result<ValidationScore> {
        Ok(ValidationScore {
            chunk_id: self.chunk_id,
            semantic_completeness: self.semantic_completeness,
            boundary_quality: self.boundary_quality,
            context_preservation: self.context_preservation,
            structural_integrity: self.structural_integrity,
            metadata_richness: self.metadata_richness,
            overall_validation_score: self.overall_validation_score,
            validation_status: self.validation_status.parse()?,
            issues: self
                .issues_json
                .as_deref()
                .and_then(|j| serde_json::from_str(j).ok())
                .unwrap_or_default(),
            recommendations: self
                .recommendations_json
                .as_deref()
                .and_then(|j| serde_json::from_str(j).ok())
                .unwrap_or_default(),
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct RuleRow {
    id: String,
    workspace_id: String,
    name: String,
    rule_type: String,
    field: String,
    operator: String,
    value_json: String,
    priority: i64,
    severity: String,
    is_active: bool,
    auto_fix: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RuleRow {
    fn into_rule(self) -> Result<ValidationRule> {
        Ok(ValidationRule {
            id: self.id,
            workspace_id: self.workspace_id,
            name: self.name,
            rule_type: self.rule_type.parse()?,
            definition: RuleDefinition {
                field: self.field,
                operator: self.operator.parse()?,
                value: serde_json::from_str(&self.value_json)?,
            },
            priority: u8::try_from(self.priority)
                .map_err(|_| Error::RuleDefinition("stored priority out of range".to_string()))?,
            severity: self.severity.parse()?,
            is_active: self.is_active,
            auto_fix: self.auto_fix,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Per-content-type classification statistics
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassificationStat {
    pub content_type: String,
    pub count: i64,
    pub avg_confidence: f64,
}

/// Per-boundary-type statistics
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BoundaryStat {
    pub boundary_type: String,
    pub count: i64,
    pub avg_score: f64,
}

/// Per-status validation statistics
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StatusStat {
    pub validation_status: String,
    pub count: i64,
    pub avg_score: f64,
}

/// How often a rule ran and how often it failed
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RuleEffectiveness {
    pub rule_id: String,
    pub name: String,
    pub total_applied: i64,
    pub failures: i64,
}

/// Combined validation statistics surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationStats {
    pub statuses: Vec<StatusStat>,
    pub rule_effectiveness: Vec<RuleEffectiveness>,
}

/// Workspace-level record counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceCounts {
    pub chunks: i64,
    pub classifications: i64,
    pub boundaries: i64,
    pub validation_scores: i64,
    pub stability_metrics: i64,
    pub relationship_edges: i64,
    pub retrieval_metrics: i64,
    pub response_metrics: i64,
    pub rules: i64,
}

impl MetaDb {
    /// Connect to the records database
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Create database with path directly (without full config)
    pub async fn new(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        if !db.is_initialized().await? {
            db.init_schema().await?;
        }
        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='chunks'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Chunk Operations =====

    /// Insert a chunk; chunks are immutable, re-ingestion inserts new rows
    pub async fn insert_chunk(&self, chunk: &Chunk) -> Result<()> {
        chunk.validate()?;
        sqlx::query(
            r#"
            INSERT INTO chunks (id, workspace_id, document_id, chunk_index, text, content_hash, page, embedding_json, metadata_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.workspace_id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.content_hash)
        .bind(chunk.page)
        .bind(
            chunk
                .embedding
                .as_ref()
                .map(|e| serde_json::to_string(e).unwrap_or_default()),
        )
        .bind(serde_json::to_string(&chunk.metadata)?)
        .bind(&chunk.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get chunk by ID
    pub async fn get_chunk(&self, id: &str) -> Result<Option<Chunk>> {
        let row = sqlx::query_as::<_, ChunkRow>("SELECT * FROM chunks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ChunkRow::into_chunk))
    }

    /// List a document's chunks in order
    pub async fn list_document_chunks(
        &self,
        workspace_id: &str,
        document_id: &str,
    ) -> Result<Vec<Chunk>> {
        let rows = sqlx::query_as::<_, ChunkRow>(
            "SELECT * FROM chunks WHERE workspace_id = ? AND document_id = ? ORDER BY chunk_index",
        )
        .bind(workspace_id)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ChunkRow::into_chunk).collect())
    }

    // ===== Classification Operations =====

    /// Insert a classification row (append-only)
    pub async fn insert_classification(&self, classification: &Classification) -> Result<()> {
        classification.validate()?;
        sqlx::query(
            r#"
            INSERT INTO classifications (id, chunk_id, content_type, confidence, reasoning, sub_categories_json, model, low_confidence, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&classification.id)
        .bind(&classification.chunk_id)
        .bind(classification.content_type.to_string())
        .bind(classification.confidence)
        .bind(&classification.reasoning)
        .bind(serde_json::to_string(&classification.sub_categories)?)
        .bind(&classification.model)
        .bind(classification.low_confidence)
        .bind(&classification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Latest classification for a chunk
    pub async fn latest_classification(&self, chunk_id: &str) -> Result<Option<Classification>> {
        let row = sqlx::query_as::<_, ClassificationRow>(
            "SELECT * FROM classifications WHERE chunk_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(chunk_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ClassificationRow::into_classification).transpose()
    }

    // ===== Boundary Operations =====

    /// Insert one analysis run's boundary rows
    pub async fn insert_boundaries(&self, boundaries: &[Boundary]) -> Result<()> {
        for boundary in boundaries {
            sqlx::query(
                r#"
                INSERT INTO boundaries (chunk_id, next_chunk_id, boundary_score, boundary_type, semantic_similarity, is_product_boundary, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&boundary.chunk_id)
            .bind(&boundary.next_chunk_id)
            .bind(boundary.boundary_score)
            .bind(boundary.boundary_type.to_string())
            .bind(boundary.semantic_similarity)
            .bind(boundary.is_product_boundary)
            .bind(&boundary.created_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    // ===== Validation Score Operations =====

    /// Insert a validation score (append-only)
    pub async fn insert_validation_score(&self, score: &ValidationScore) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO validation_scores (chunk_id, semantic_completeness, boundary_quality, context_preservation, structural_integrity, metadata_richness, overall_validation_score, validation_status, issues_json, recommendations_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&score.chunk_id)
        .bind(score.semantic_completeness)
        .bind(score.boundary_quality)
        .bind(score.context_preservation)
        .bind(score.structural_integrity)
        .bind(score.metadata_richness)
        .bind(score.overall_validation_score)
        .bind(score.validation_status.to_string())
        .bind(serde_json::to_string(&score.issues)?)
        .bind(serde_json::to_string(&score.recommendations)?)
        .bind(&score.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Latest validation score for a chunk
    pub async fn latest_validation_score(&self, chunk_id: &str) -> Result<Option<ValidationScore>> {
        let row = sqlx::query_as::<_, ScoreRow>(
            "SELECT * FROM validation_scores WHERE chunk_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(chunk_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ScoreRow::into_score).transpose()
    }

    // ===== Stability Operations =====

    /// Insert one batch's stability metrics
    pub async fn insert_stability_metrics(&self, metrics: &[StabilityMetric]) -> Result<()> {
        for metric in metrics {
            sqlx::query(
                r#"
                INSERT INTO stability_metrics (chunk_id, batch_id, stability_score, variance, consistency, is_anomaly, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(chunk_id, batch_id) DO UPDATE SET
                    stability_score = excluded.stability_score,
                    variance = excluded.variance,
                    consistency = excluded.consistency,
                    is_anomaly = excluded.is_anomaly,
                    created_at = excluded.created_at
                "#,
            )
            .bind(&metric.chunk_id)
            .bind(&metric.batch_id)
            .bind(metric.stability_score)
            .bind(metric.variance)
            .bind(metric.consistency)
            .bind(metric.is_anomaly)
            .bind(&metric.created_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    // ===== Relationship Edge Operations =====

    /// Insert relationship edges
    pub async fn insert_edges(&self, edges: &[RelationshipEdge]) -> Result<()> {
        for edge in edges {
            sqlx::query(
                r#"
                INSERT INTO relationship_edges (source_chunk_id, target_chunk_id, relationship_type, confidence, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&edge.source_chunk_id)
            .bind(&edge.target_chunk_id)
            .bind(edge.relationship_type.to_string())
            .bind(edge.confidence)
            .bind(&edge.created_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Outgoing edges for a chunk
    pub async fn list_chunk_edges(&self, chunk_id: &str) -> Result<Vec<RelationshipEdge>> {
        #[derive(FromRow)]
        struct EdgeRow {
            source_chunk_id: String,
            target_chunk_id: String,
            relationship_type: String,
            confidence: f64,
            created_at: String,
        }

        let rows = sqlx::query_as::<_, EdgeRow>(
            "SELECT * FROM relationship_edges WHERE source_chunk_id = ?",
        )
        .bind(chunk_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(RelationshipEdge {
                    source_chunk_id: r.source_chunk_id,
                    target_chunk_id: r.target_chunk_id,
                    relationship_type: r.relationship_type.parse()?,
                    confidence: r.confidence,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    // ===== Query-time Metric Operations =====

    /// Insert a retrieval metric record
    pub async fn insert_retrieval_metric(&self, metric: &RetrievalMetric) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO retrieval_metrics (id, workspace_id, query, retrieved_json, relevant_json, precision, recall, mrr, latency_ms, bands_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&metric.id)
        .bind(&metric.workspace_id)
        .bind(&metric.query)
        .bind(serde_json::to_string(&metric.retrieved_chunk_ids)?)
        .bind(serde_json::to_string(&metric.relevant_chunk_ids)?)
        .bind(metric.precision)
        .bind(metric.recall)
        .bind(metric.mrr)
        .bind(metric.latency_ms as i64)
        .bind(serde_json::to_string(&metric.bands)?)
        .bind(&metric.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a response metric record
    pub async fn insert_response_metric(&self, metric: &ResponseMetric) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO response_metrics (id, workspace_id, query, response_text, coherence_score, hallucination_score, source_attribution_score, factual_consistency_score, overall_quality_score, quality_assessment, issues_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&metric.id)
        .bind(&metric.workspace_id)
        .bind(&metric.query)
        .bind(&metric.response_text)
        .bind(metric.coherence_score)
        .bind(metric.hallucination_score)
        .bind(metric.source_attribution_score)
        .bind(metric.factual_consistency_score)
        .bind(metric.overall_quality_score)
        .bind(metric.quality_assessment.to_string())
        .bind(serde_json::to_string(&metric.issues_detected)?)
        .bind(&metric.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== Rule Operations =====

    /// Insert a rule; invalid definitions are rejected here, never silently
    /// skipped at evaluation time
    pub async fn insert_rule(&self, rule: &ValidationRule) -> Result<()> {
        validate_rule(rule)?;
        sqlx::query(
            r#"
            INSERT INTO validation_rules (id, workspace_id, name, rule_type, field, operator, value_json, priority, severity, is_active, auto_fix, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.workspace_id)
        .bind(&rule.name)
        .bind(rule.rule_type.to_string())
        .bind(&rule.definition.field)
        .bind(rule.definition.operator.to_string())
        .bind(serde_json::to_string(&rule.definition.value)?)
        .bind(i64::from(rule.priority))
        .bind(rule.severity.to_string())
        .bind(rule.is_active)
        .bind(&rule.auto_fix)
        .bind(&rule.created_at)
        .bind(&rule.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Update a rule in place
    pub async fn update_rule(&self, rule: &ValidationRule) -> Result<()> {
        validate_rule(rule)?;
        let updated = sqlx::query(
            r#"
            UPDATE validation_rules SET
                name = ?, rule_type = ?, field = ?, operator = ?, value_json = ?,
                priority = ?, severity = ?, is_active = ?, auto_fix = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&rule.name)
        .bind(rule.rule_type.to_string())
        .bind(&rule.definition.field)
        .bind(rule.definition.operator.to_string())
        .bind(serde_json::to_string(&rule.definition.value)?)
        .bind(i64::from(rule.priority))
        .bind(rule.severity.to_string())
        .bind(rule.is_active)
        .bind(&rule.auto_fix)
        .bind(Utc::now().to_rfc3339())
        .bind(&rule.id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Error::RuleNotFound(rule.id.clone()));
        }
        Ok(())
    }

    /// Get a rule by ID
    pub async fn get_rule(&self, id: &str) -> Result<Option<ValidationRule>> {
        let row = sqlx::query_as::<_, RuleRow>("SELECT * FROM validation_rules WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(RuleRow::into_rule).transpose()
    }

    /// List all rules in a workspace
    pub async fn list_rules(&self, workspace_id: &str) -> Result<Vec<ValidationRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT * FROM validation_rules WHERE workspace_id = ? ORDER BY priority DESC, name",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(RuleRow::into_rule).collect()
    }

    /// List the active rules in a workspace
    pub async fn list_active_rules(&self, workspace_id: &str) -> Result<Vec<ValidationRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT * FROM validation_rules WHERE workspace_id = ? AND is_active = 1 ORDER BY priority DESC, name",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(RuleRow::into_rule).collect()
    }

    /// Enable or disable a rule
    pub async fn set_rule_active(&self, id: &str, active: bool) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE validation_rules SET is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(active)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Error::RuleNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Delete a rule and its results
    pub async fn delete_rule(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM validation_results WHERE rule_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let deleted = sqlx::query("DELETE FROM validation_rules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(Error::RuleNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Insert rule evaluation results
    pub async fn insert_validation_results(&self, results: &[ValidationResult]) -> Result<()> {
        for result in results {
            sqlx::query(
                r#"
                INSERT INTO validation_results (id, chunk_id, rule_id, passed, severity, message, details_json, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&result.id)
            .bind(&result.chunk_id)
            .bind(&result.rule_id)
            .bind(result.passed)
            .bind(result.severity.to_string())
            .bind(&result.message)
            .bind(
                result
                    .details
                    .as_ref()
                    .map(|d| serde_json::to_string(d).unwrap_or_default()),
            )
            .bind(&result.created_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    // ===== Statistics =====

    /// Classification stats: content type -> count and average confidence,
    /// counting only the latest classification per chunk
    pub async fn classification_stats(&self, workspace_id: &str) -> Result<Vec<ClassificationStat>> {
        let stats = sqlx::query_as::<_, ClassificationStat>(
            r#"
            SELECT c.content_type, COUNT(*) AS count, AVG(c.confidence) AS avg_confidence
            FROM classifications c
            JOIN chunks ch ON c.chunk_id = ch.id
            WHERE ch.workspace_id = ?
              AND c.id = (
                  SELECT c2.id FROM classifications c2
                  WHERE c2.chunk_id = c.chunk_id
                  ORDER BY c2.created_at DESC, c2.rowid DESC LIMIT 1
              )
            GROUP BY c.content_type
            ORDER BY count DESC
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Boundary stats: boundary type -> count and average score
    pub async fn boundary_stats(&self, workspace_id: &str) -> Result<Vec<BoundaryStat>> {
        let stats = sqlx::query_as::<_, BoundaryStat>(
            r#"
            SELECT b.boundary_type, COUNT(*) AS count, AVG(b.boundary_score) AS avg_score
            FROM boundaries b
            JOIN chunks ch ON b.chunk_id = ch.id
            WHERE ch.workspace_id = ?
            GROUP BY b.boundary_type
            ORDER BY count DESC
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Validation stats: status -> count/avg score, plus per-rule
    /// applied/failure counts
    pub async fn validation_stats(&self, workspace_id: &str) -> Result<ValidationStats> {
        let statuses = sqlx::query_as::<_, StatusStat>(
            r#"
            SELECT v.validation_status, COUNT(*) AS count, AVG(v.overall_validation_score) AS avg_score
            FROM validation_scores v
            JOIN chunks ch ON v.chunk_id = ch.id
            WHERE ch.workspace_id = ?
            GROUP BY v.validation_status
            ORDER BY count DESC
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        let rule_effectiveness = sqlx::query_as::<_, RuleEffectiveness>(
            r#"
            SELECT r.id AS rule_id, r.name,
                   COUNT(res.id) AS total_applied,
                   COALESCE(SUM(CASE WHEN res.passed = 0 THEN 1 ELSE 0 END), 0) AS failures
            FROM validation_rules r
            LEFT JOIN validation_results res ON res.rule_id = r.id
            WHERE r.workspace_id = ?
            GROUP BY r.id, r.name
            ORDER BY total_applied DESC
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ValidationStats {
            statuses,
            rule_effectiveness,
        })
    }

    /// Record counts for the status surface
    pub async fn workspace_counts(&self, workspace_id: &str) -> Result<WorkspaceCounts> {
        let chunks: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE workspace_id = ?")
                .bind(workspace_id)
                .fetch_one(&self.pool)
                .await?;

        let classifications: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM classifications c JOIN chunks ch ON c.chunk_id = ch.id WHERE ch.workspace_id = ?",
        )
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;

        let boundaries: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM boundaries b JOIN chunks ch ON b.chunk_id = ch.id WHERE ch.workspace_id = ?",
        )
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;

        let validation_scores: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM validation_scores v JOIN chunks ch ON v.chunk_id = ch.id WHERE ch.workspace_id = ?",
        )
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;

        let stability_metrics: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stability_metrics s JOIN chunks ch ON s.chunk_id = ch.id WHERE ch.workspace_id = ?",
        )
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;

        let relationship_edges: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM relationship_edges e JOIN chunks ch ON e.source_chunk_id = ch.id WHERE ch.workspace_id = ?",
        )
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;

        let retrieval_metrics: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM retrieval_metrics WHERE workspace_id = ?",
        )
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;

        let response_metrics: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM response_metrics WHERE workspace_id = ?",
        )
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;

        let rules: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM validation_rules WHERE workspace_id = ?")
                .bind(workspace_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(WorkspaceCounts {
            chunks,
            classifications,
            boundaries,
            validation_scores,
            stability_metrics,
            relationship_edges,
            retrieval_metrics,
            response_metrics,
            rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ContentType, MetricBand, RelationshipType, ResponseAssessment, RetrievalBands,
        RuleOperator, RuleType, Severity, ValidationStatus,
    };
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup_test_db() -> (MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = MetaDb::new(&tmp.path().join("test.db")).await.unwrap();
        (db, tmp)
    }

    fn test_chunk(workspace: &str, index: i32) -> Chunk {
        let mut chunk = Chunk::new(
            workspace.to_string(),
            "doc-1".to_string(),
            index,
            format!("Chunk body number {} with enough text to matter.", index),
        );
        chunk.embedding = Some(vec![0.1 * index as f32, 0.2]);
        chunk
    }

    #[tokio::test]
    async fn test_chunk_round_trip() {
        let (db, _tmp) = setup_test_db().await;

        let mut chunk = test_chunk("ws", 0);
        chunk.metadata.product_name = Some("VALENOVA".to_string());
        chunk.page = Some(12);
        db.insert_chunk(&chunk).await.unwrap();

        let loaded = db.get_chunk(&chunk.id).await.unwrap().unwrap();
        assert_eq!(loaded.text, chunk.text);
        assert_eq!(loaded.embedding, chunk.embedding);
        assert_eq!(loaded.metadata.product_name, Some("VALENOVA".to_string()));
        assert_eq!(loaded.page, Some(12));

        let chunks = db.list_document_chunks("ws", "doc-1").await.unwrap();
        assert_eq!(chunks.len(), 1);

        // Other workspaces never see it
        let other = db.list_document_chunks("other", "doc-1").await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_empty_chunk_rejected() {
        let (db, _tmp) = setup_test_db().await;
        let chunk = Chunk::new("ws".into(), "doc".into(), 0, "   ".into());
        assert!(db.insert_chunk(&chunk).await.is_err());
    }

    #[tokio::test]
    async fn test_latest_classification_wins() {
        let (db, _tmp) = setup_test_db().await;
        let chunk = test_chunk("ws", 0);
        db.insert_chunk(&chunk).await.unwrap();

        let mut first = Classification::new(
            chunk.id.clone(),
            ContentType::Other,
            0.4,
            "first pass".into(),
            "m".into(),
        );
        first.created_at = "2024-01-01T00:00:00+00:00".to_string();
        db.insert_classification(&first).await.unwrap();

        let mut second = Classification::new(
            chunk.id.clone(),
            ContentType::Product,
            0.9,
            "second pass".into(),
            "m".into(),
        );
        second.created_at = "2024-06-01T00:00:00+00:00".to_string();
        db.insert_classification(&second).await.unwrap();

        let latest = db.latest_classification(&chunk.id).await.unwrap().unwrap();
        assert_eq!(latest.content_type, ContentType::Product);
    }

    #[tokio::test]
    async fn test_classification_stats_use_latest_rows() {
        let (db, _tmp) = setup_test_db().await;

        for i in 0..3 {
            let chunk = test_chunk("ws", i);
            db.insert_chunk(&chunk).await.unwrap();

            let mut stale = Classification::new(
                chunk.id.clone(),
                ContentType::Other,
                0.2,
                "stale".into(),
                "m".into(),
            );
            stale.created_at = "2024-01-01T00:00:00+00:00".to_string();
            db.insert_classification(&stale).await.unwrap();

            let mut fresh = Classification::new(
                chunk.id.clone(),
                ContentType::Product,
                0.8,
                "fresh".into(),
                "m".into(),
            );
            fresh.created_at = "2024-06-01T00:00:00+00:00".to_string();
            db.insert_classification(&fresh).await.unwrap();
        }

        let stats = db.classification_stats("ws").await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].content_type, "product");
        assert_eq!(stats[0].count, 3);
        assert!((stats[0].avg_confidence - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_boundary_stats() {
        let (db, _tmp) = setup_test_db().await;
        let a = test_chunk("ws", 0);
        let b = test_chunk("ws", 1);
        db.insert_chunk(&a).await.unwrap();
        db.insert_chunk(&b).await.unwrap();

        db.insert_boundaries(&[Boundary {
            chunk_id: a.id.clone(),
            next_chunk_id: b.id.clone(),
            boundary_score: 0.8,
            boundary_type: crate::model::BoundaryType::Section,
            semantic_similarity: 0.3,
            is_product_boundary: true,
            created_at: crate::model::now_rfc3339(),
        }])
        .await
        .unwrap();

        let stats = db.boundary_stats("ws").await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].boundary_type, "section");
        assert!((stats[0].avg_score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_validation_score_round_trip() {
        let (db, _tmp) = setup_test_db().await;
        let chunk = test_chunk("ws", 0);
        db.insert_chunk(&chunk).await.unwrap();

        let score = ValidationScore {
            chunk_id: chunk.id.clone(),
            semantic_completeness: 0.9,
            boundary_quality: 0.8,
            context_preservation: 0.7,
            structural_integrity: 0.95,
            metadata_richness: 0.4,
            overall_validation_score: 0.78,
            validation_status: ValidationStatus::NeedsReview,
            issues: vec![crate::model::Issue {
                issue_type: "sparse_metadata".into(),
                severity: Severity::Info,
                description: "few fields".into(),
            }],
            recommendations: Vec::new(),
            created_at: crate::model::now_rfc3339(),
        };
        db.insert_validation_score(&score).await.unwrap();

        let loaded = db.latest_validation_score(&chunk.id).await.unwrap().unwrap();
        assert_eq!(loaded.validation_status, ValidationStatus::NeedsReview);
        assert_eq!(loaded.issues.len(), 1);

        let stats = db.validation_stats("ws").await.unwrap();
        assert_eq!(stats.statuses.len(), 1);
        assert_eq!(stats.statuses[0].validation_status, "needs_review");
    }

    #[tokio::test]
    async fn test_rule_crud_and_effectiveness() {
        let (db, _tmp) = setup_test_db().await;
        let chunk = test_chunk("ws", 0);
        db.insert_chunk(&chunk).await.unwrap();

        let rule = ValidationRule::new(
            "ws".into(),
            "min-words".into(),
            RuleType::Completeness,
            RuleDefinition {
                field: "word_count".into(),
                operator: RuleOperator::GreaterThan,
                value: json!(3),
            },
            70,
            Severity::Warning,
        );
        db.insert_rule(&rule).await.unwrap();

        let listed = db.list_rules("ws").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].definition.operator, RuleOperator::GreaterThan);

        // Results feed the effectiveness stats
        db.insert_validation_results(&[
            ValidationResult {
                id: uuid::Uuid::new_v4().to_string(),
                chunk_id: chunk.id.clone(),
                rule_id: rule.id.clone(),
                passed: true,
                severity: Severity::Warning,
                message: "ok".into(),
                details: None,
                created_at: crate::model::now_rfc3339(),
            },
            ValidationResult {
                id: uuid::Uuid::new_v4().to_string(),
                chunk_id: chunk.id.clone(),
                rule_id: rule.id.clone(),
                passed: false,
                severity: Severity::Warning,
                message: "too short".into(),
                details: None,
                created_at: crate::model::now_rfc3339(),
            },
        ])
        .await
        .unwrap();

        let stats = db.validation_stats("ws").await.unwrap();
        assert_eq!(stats.rule_effectiveness.len(), 1);
        assert_eq!(stats.rule_effectiveness[0].total_applied, 2);
        assert_eq!(stats.rule_effectiveness[0].failures, 1);

        // Deactivate, then delete
        db.set_rule_active(&rule.id, false).await.unwrap();
        assert!(db.list_active_rules("ws").await.unwrap().is_empty());

        db.delete_rule(&rule.id).await.unwrap();
        assert!(db.list_rules("ws").await.unwrap().is_empty());
        assert!(db.delete_rule(&rule.id).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_rule_rejected_at_insert() {
        let (db, _tmp) = setup_test_db().await;
        let rule = ValidationRule::new(
            "ws".into(),
            "broken".into(),
            RuleType::Custom,
            RuleDefinition {
                field: "confidence".into(),
                operator: RuleOperator::InRange,
                value: json!([0.9, 0.1]),
            },
            50,
            Severity::Info,
        );
        assert!(db.insert_rule(&rule).await.is_err());
        assert!(db.list_rules("ws").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metric_inserts_and_counts() {
        let (db, _tmp) = setup_test_db().await;
        let chunk = test_chunk("ws", 0);
        db.insert_chunk(&chunk).await.unwrap();

        db.insert_retrieval_metric(&RetrievalMetric {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: "ws".into(),
            query: "q".into(),
            retrieved_chunk_ids: vec![chunk.id.clone()],
            relevant_chunk_ids: vec![chunk.id.clone()],
            precision: 1.0,
            recall: 1.0,
            mrr: 1.0,
            latency_ms: 42,
            bands: RetrievalBands {
                precision: MetricBand::Good,
                recall: MetricBand::Good,
                mrr: MetricBand::Good,
                latency: MetricBand::Good,
            },
            created_at: crate::model::now_rfc3339(),
        })
        .await
        .unwrap();

        db.insert_response_metric(&ResponseMetric {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: "ws".into(),
            query: "q".into(),
            response_text: "answer".into(),
            coherence_score: 0.8,
            hallucination_score: 0.1,
            source_attribution_score: 0.5,
            factual_consistency_score: 0.9,
            overall_quality_score: 0.8,
            quality_assessment: ResponseAssessment::VeryGood,
            issues_detected: Vec::new(),
            created_at: crate::model::now_rfc3339(),
        })
        .await
        .unwrap();

        db.insert_edges(&[RelationshipEdge {
            source_chunk_id: chunk.id.clone(),
            target_chunk_id: chunk.id.clone(),
            relationship_type: RelationshipType::Semantic,
            confidence: 0.7,
            created_at: crate::model::now_rfc3339(),
        }])
        .await
        .unwrap();

        let counts = db.workspace_counts("ws").await.unwrap();
        assert_eq!(counts.chunks, 1);
        assert_eq!(counts.retrieval_metrics, 1);
        assert_eq!(counts.response_metrics, 1);
        assert_eq!(counts.relationship_edges, 1);

        let edges = db.list_chunk_edges(&chunk.id).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relationship_type, RelationshipType::Semantic);
    }
}
