//! Chunk content-type classification
//!
//! This module provides an abstraction over classification providers with:
//! - A trait for different classifier backends
//! - HTTP classification backend
//! - A local keyword classifier usable as a last-resort provider
//! - An ordered provider chain with per-provider circuit breakers
//! - Bounded-concurrency batch classification

mod http_backend;
mod keyword;

pub use http_backend::*;
pub use keyword::*;

use crate::config::ClassificationConfig;
use crate::error::{Error, Result};
use crate::model::Classification;
use crate::providers::CircuitBreaker;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{debug, warn};

/// A single chunk classification request
///
/// Context carries neighboring text for disambiguation; requests in the same
/// batch never share context, so batch classification cannot leak one
/// chunk's neighborhood into another's label.
#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub chunk_id: String,
    pub text: String,
    pub context: Option<String>,
}

/// Outcome of classifying one chunk
///
/// An unreachable provider yields `Unavailable` — never a fabricated label
/// with high confidence.
#[derive(Debug, Clone)]
pub enum ClassificationOutcome {
    Classified(Classification),
    Unavailable { chunk_id: String, reason: String },
}

impl ClassificationOutcome {
    pub fn classification(&self) -> Option<&Classification> {
        match self {
            ClassificationOutcome::Classified(c) => Some(c),
            ClassificationOutcome::Unavailable { .. } => None,
        }
    }
}

/// Trait for classification providers
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a single chunk
    async fn classify(&self, request: &ClassifyRequest) -> Result<Classification>;

    /// Provider name for logging and the `model` field on records
    fn name(&self) -> &str;
}

/// Ordered chain of classification providers
///
/// Providers are tried in sequence; each carries its own circuit breaker so
/// a provider that keeps failing is skipped until its reset window elapses.
pub struct ClassifierChain {
    providers: Vec<(Box<dyn Classifier>, CircuitBreaker)>,
}

impl ClassifierChain {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn push(&mut self, provider: Box<dyn Classifier>, breaker: CircuitBreaker) {
        self.providers.push((provider, breaker));
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Classify one chunk, falling through the provider chain
    pub async fn classify(&self, request: &ClassifyRequest) -> ClassificationOutcome {
        if self.providers.is_empty() {
            return ClassificationOutcome::Unavailable {
                chunk_id: request.chunk_id.clone(),
                reason: "no classification providers configured".to_string(),
            };
        }

        let mut last_reason = String::new();
        for (provider, breaker) in &self.providers {
            if !breaker.allow_request().await {
                debug!("Skipping provider '{}': circuit open", provider.name());
                last_reason = format!("provider '{}' circuit open", provider.name());
                continue;
            }

            match provider.classify(request).await {
                Ok(classification) => {
                    breaker.record_success().await;
                    return ClassificationOutcome::Classified(classification);
                }
                Err(e) => {
                    breaker.record_failure().await;
                    warn!("Provider '{}' failed: {}", provider.name(), e);
                    last_reason = e.to_string();
                }
            }
        }

        ClassificationOutcome::Unavailable {
            chunk_id: request.chunk_id.clone(),
            reason: last_reason,
        }
    }

    /// Classify a batch of chunks with bounded concurrency
    ///
    /// Results come back in request order. Per-chunk failures degrade to
    /// `Unavailable` without aborting siblings.
    pub async fn classify_batch(
        &self,
        requests: Vec<ClassifyRequest>,
        concurrency: usize,
    ) -> Vec<ClassificationOutcome> {
        let mut indexed: Vec<(usize, ClassificationOutcome)> =
            stream::iter(requests.into_iter().enumerate())
                .map(|(i, request)| async move { (i, self.classify(&request).await) })
                .buffer_unordered(concurrency.max(1))
                .collect()
                .await;

        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

impl Default for ClassifierChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the classifier chain described by the configuration
pub fn create_classifier_chain(config: &ClassificationConfig) -> Result<ClassifierChain> {
    let mut chain = ClassifierChain::new();

    let http = HttpClassifier::new(config)?;
    chain.push(
        Box::new(http),
        CircuitBreaker::new(
            config.breaker.failure_threshold,
            Duration::from_secs(config.breaker.reset_secs),
        ),
    );

    if config.keyword_fallback {
        chain.push(
            Box::new(KeywordClassifier::new()),
            CircuitBreaker::new(
                config.breaker.failure_threshold,
                Duration::from_secs(config.breaker.reset_secs),
            ),
        );
    }

    if chain.is_empty() {
        return Err(Error::Config(
            "at least one classification provider must be configured".to_string(),
        ));
    }

    Ok(chain)
}
