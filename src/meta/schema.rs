//! SQLite schema definition

/// SQL schema for the validation records database
pub const SCHEMA_SQL: &str = r#"
-- Chunks: immutable units of source text under evaluation
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    page INTEGER,
    embedding_json TEXT,
    metadata_json TEXT,
    created_at TEXT NOT NULL
);

-- Classifications: append-only, latest per chunk is authoritative
CREATE TABLE IF NOT EXISTS classifications (
    id TEXT PRIMARY KEY,
    chunk_id TEXT NOT NULL REFERENCES chunks(id),
    content_type TEXT NOT NULL,
    confidence REAL NOT NULL,
    reasoning TEXT NOT NULL,
    sub_categories_json TEXT,
    model TEXT NOT NULL,
    low_confidence INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- Boundaries: one row per adjacent pair per analysis run
CREATE TABLE IF NOT EXISTS boundaries (
    chunk_id TEXT NOT NULL REFERENCES chunks(id),
    next_chunk_id TEXT NOT NULL REFERENCES chunks(id),
    boundary_score REAL NOT NULL,
    boundary_type TEXT NOT NULL,
    semantic_similarity REAL NOT NULL,
    is_product_boundary INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- Validation scores: composite chunk quality records
CREATE TABLE IF NOT EXISTS validation_scores (
    chunk_id TEXT NOT NULL REFERENCES chunks(id),
    semantic_completeness REAL NOT NULL,
    boundary_quality REAL NOT NULL,
    context_preservation REAL NOT NULL,
    structural_integrity REAL NOT NULL,
    metadata_richness REAL NOT NULL,
    overall_validation_score REAL NOT NULL,
    validation_status TEXT NOT NULL,
    issues_json TEXT,
    recommendations_json TEXT,
    created_at TEXT NOT NULL
);

-- Stability metrics: per chunk per analysis batch
CREATE TABLE IF NOT EXISTS stability_metrics (
    chunk_id TEXT NOT NULL REFERENCES chunks(id),
    batch_id TEXT NOT NULL,
    stability_score REAL NOT NULL,
    variance REAL NOT NULL,
    consistency REAL NOT NULL,
    is_anomaly INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE(chunk_id, batch_id)
);

-- Relationship edges: directed chunk graph
CREATE TABLE IF NOT EXISTS relationship_edges (
    source_chunk_id TEXT NOT NULL REFERENCES chunks(id),
    target_chunk_id TEXT NOT NULL REFERENCES chunks(id),
    relationship_type TEXT NOT NULL,
    confidence REAL NOT NULL,
    created_at TEXT NOT NULL
);

-- Retrieval metrics: one record per executed query
CREATE TABLE IF NOT EXISTS retrieval_metrics (
    id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL,
    query TEXT NOT NULL,
    retrieved_json TEXT NOT NULL,
    relevant_json TEXT NOT NULL,
    precision REAL NOT NULL,
    recall REAL NOT NULL,
    mrr REAL NOT NULL,
    latency_ms INTEGER NOT NULL,
    bands_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Response metrics: one record per evaluated response
CREATE TABLE IF NOT EXISTS response_metrics (
    id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL,
    query TEXT NOT NULL,
    response_text TEXT NOT NULL,
    coherence_score REAL NOT NULL,
    hallucination_score REAL NOT NULL,
    source_attribution_score REAL NOT NULL,
    factual_consistency_score REAL NOT NULL,
    overall_quality_score REAL NOT NULL,
    quality_assessment TEXT NOT NULL,
    issues_json TEXT,
    created_at TEXT NOT NULL
);

-- Validation rules: user-managed, mutable
CREATE TABLE IF NOT EXISTS validation_rules (
    id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL,
    name TEXT NOT NULL,
    rule_type TEXT NOT NULL,
    field TEXT NOT NULL,
    operator TEXT NOT NULL,
    value_json TEXT NOT NULL,
    priority INTEGER NOT NULL,
    severity TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    auto_fix TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(workspace_id, name)
);

-- Validation results: fresh per run, never retroactively mutated
CREATE TABLE IF NOT EXISTS validation_results (
    id TEXT PRIMARY KEY,
    chunk_id TEXT NOT NULL REFERENCES chunks(id),
    rule_id TEXT NOT NULL REFERENCES validation_rules(id),
    passed INTEGER NOT NULL,
    severity TEXT NOT NULL,
    message TEXT NOT NULL,
    details_json TEXT,
    created_at TEXT NOT NULL
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_chunks_workspace ON chunks(workspace_id);
CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id, chunk_index);
CREATE INDEX IF NOT EXISTS idx_classifications_chunk ON classifications(chunk_id, created_at);
CREATE INDEX IF NOT EXISTS idx_boundaries_chunk ON boundaries(chunk_id);
CREATE INDEX IF NOT EXISTS idx_scores_chunk ON validation_scores(chunk_id, created_at);
CREATE INDEX IF NOT EXISTS idx_stability_batch ON stability_metrics(batch_id);
CREATE INDEX IF NOT EXISTS idx_edges_source ON relationship_edges(source_chunk_id);
CREATE INDEX IF NOT EXISTS idx_retrieval_workspace ON retrieval_metrics(workspace_id);
CREATE INDEX IF NOT EXISTS idx_response_workspace ON response_metrics(workspace_id);
CREATE INDEX IF NOT EXISTS idx_rules_workspace ON validation_rules(workspace_id, is_active);
CREATE INDEX IF NOT EXISTS idx_results_rule ON validation_results(rule_id);
CREATE INDEX IF NOT EXISTS idx_results_chunk ON validation_results(chunk_id);
"#;
