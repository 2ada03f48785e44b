//! Default values for configuration

/// Default workspace identifier
pub fn default_workspace() -> String {
    "default".to_string()
}

/// Default classification backend URL
pub fn default_classification_backend_url() -> String {
    std::env::var("ASSAYER_CLASSIFICATION_BACKEND_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8811".to_string())
}

/// Default classification model identifier
pub fn default_classification_model() -> String {
    "content-type-v1".to_string()
}

/// Default embedding backend URL
pub fn default_embedding_backend_url() -> String {
    std::env::var("ASSAYER_EMBEDDING_BACKEND_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default embedding model (BAAI/bge-small-en-v1.5)
pub fn default_embedding_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

/// Default embedding dimension (must match model)
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for external provider calls
pub fn default_provider_batch_size() -> usize {
    32
}

/// Default: skip the embedding-based semantic support check in response
/// evaluation (lexical support only)
pub fn default_semantic_check() -> bool {
    false
}

/// Default request timeout for provider calls in seconds
pub fn default_provider_timeout_secs() -> u64 {
    30
}

/// Default retry attempts per provider call
pub fn default_provider_retries() -> usize {
    2
}

/// Default consecutive failures before a provider circuit opens
pub fn default_breaker_failure_threshold() -> u32 {
    5
}

/// Default seconds before an open circuit admits a trial request
pub fn default_breaker_reset_secs() -> u64 {
    60
}

/// Default: fall back to the local keyword classifier when remote providers fail
pub fn default_keyword_fallback() -> bool {
    true
}

/// Default weight for semantic completeness
pub fn default_weight_semantic_completeness() -> f64 {
    0.28
}

/// Default weight for boundary quality
pub fn default_weight_boundary_quality() -> f64 {
    0.30
}

/// Default weight for context preservation
pub fn default_weight_context_preservation() -> f64 {
    0.15
}

/// Default weight for structural integrity
pub fn default_weight_structural_integrity() -> f64 {
    0.20
}

/// Default weight for metadata richness
pub fn default_weight_metadata_richness() -> f64 {
    0.07
}

/// Default overall score at or above which a chunk is validated
pub fn default_validated_threshold() -> f64 {
    0.85
}

/// Default overall score below which a chunk always needs review
pub fn default_review_threshold() -> f64 {
    0.6
}

/// Default floor below which an individual sub-score raises an issue
pub fn default_subscore_floor() -> f64 {
    0.5
}

/// Default similarity below which a transition may be a product boundary
pub fn default_product_similarity_threshold() -> f64 {
    0.4
}

/// Default sliding window size for topic-shift clustering
pub fn default_topic_window() -> usize {
    8
}

/// Default iterations for the per-window clustering step
pub fn default_topic_iterations() -> usize {
    10
}

/// Default sigma multiplier for the stability anomaly rule
pub fn default_anomaly_sigma() -> f64 {
    3.0
}

/// Default neighbor count for the consistency score
pub fn default_consistency_k() -> usize {
    5
}

/// Default number of embeddings scored per window in large batches
pub fn default_stability_window() -> usize {
    1024
}

/// Default cosine similarity above which a semantic edge is created
pub fn default_semantic_edge_threshold() -> f64 {
    0.6
}

/// Default locality window for semantic edge candidates
pub fn default_semantic_edge_window() -> usize {
    64
}

/// Default good-band threshold for retrieval precision
pub fn default_precision_threshold() -> f64 {
    0.85
}

/// Default good-band threshold for retrieval recall
pub fn default_recall_threshold() -> f64 {
    0.85
}

/// Default good-band threshold for MRR
pub fn default_mrr_threshold() -> f64 {
    0.5
}

/// Default good-band threshold for retrieval latency in milliseconds
pub fn default_latency_threshold_ms() -> u64 {
    500
}

/// Default concurrent in-flight classification requests
pub fn default_classification_concurrency() -> usize {
    8
}

/// Default concurrent in-flight embedding requests
pub fn default_embedding_concurrency() -> usize {
    4
}
