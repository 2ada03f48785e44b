//! Generated-response quality evaluation
//!
//! Scores an answer against the source chunks it was generated from:
//! structural coherence, unsupported-claim (hallucination) rate, citation
//! coverage, and numeric/entity consistency. The composite inverts the
//! hallucination term since a higher hallucination score is worse.

use crate::embed::Embedder;
use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::model::{ResponseAssessment, ResponseMetric};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

/// Lexical support below which a sentence counts as unsupported
const SUPPORT_THRESHOLD: f64 = 0.5;

/// Embedding similarity that rescues a lexically unsupported sentence
const SEMANTIC_SUPPORT_THRESHOLD: f64 = 0.7;

fn citation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\[\d+\]|\[source[^\]]*\]|\(source[^)]*\)|according to\b").unwrap()
    })
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap())
}

/// The four response sub-scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseScores {
    pub coherence: f64,
    pub hallucination: f64,
    pub source_attribution: f64,
    pub factual_consistency: f64,
}

/// Generated-response evaluator
///
/// Works lexically by default; an embedder upgrades the hallucination check
/// with a semantic-similarity pass over unsupported sentences.
pub struct ResponseEvaluator {
    embedder: Option<Box<dyn Embedder>>,
}

impl ResponseEvaluator {
    pub fn new() -> Self {
        Self { embedder: None }
    }

    pub fn with_embedder(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder: Some(embedder),
        }
    }

    /// Evaluate one response against its source chunks
    pub async fn evaluate(
        &self,
        workspace_id: &str,
        query: &str,
        response_text: &str,
        sources: &[String],
    ) -> Result<ResponseMetric> {
        if response_text.trim().is_empty() {
            return Err(Error::validation("response_text", "response is empty"));
        }

        let sentences: Vec<&str> = response_text
            .unicode_sentences()
            .filter(|s| !s.trim().is_empty())
            .collect();

        let scores = ResponseScores {
            coherence: coherence(&sentences),
            hallucination: self.hallucination(&sentences, sources).await,
            source_attribution: attribution(&sentences),
            factual_consistency: factual_consistency(response_text, sources),
        };

        Ok(self.compose(workspace_id, query, response_text, scores))
    }

    /// Best-effort wrapper: scoring never blocks the response path, so any
    /// evaluation failure is logged and swallowed.
    pub async fn evaluate_best_effort(
        &self,
        workspace_id: &str,
        query: &str,
        response_text: &str,
        sources: &[String],
    ) -> Option<ResponseMetric> {
        match self
            .evaluate(workspace_id, query, response_text, sources)
            .await
        {
            Ok(metric) => Some(metric),
            Err(e) => {
                warn!("Response evaluation skipped: {}", e);
                None
            }
        }
    }

    /// Combine sub-scores into the final record
    pub fn compose(
        &self,
        workspace_id: &str,
        query: &str,
        response_text: &str,
        scores: ResponseScores,
    ) -> ResponseMetric {
        let overall = (0.25 * scores.coherence
            + 0.35 * (1.0 - scores.hallucination)
            + 0.20 * scores.source_attribution
            + 0.20 * scores.factual_consistency)
            .clamp(0.0, 1.0);

        let mut issues = Vec::new();
        if scores.hallucination > 0.3 {
            issues.push("Potential hallucinations detected".to_string());
        }
        if scores.coherence < 0.5 {
            issues.push("Low coherence detected".to_string());
        }
        if scores.source_attribution < 0.3 {
            issues.push("Missing source attribution".to_string());
        }
        if scores.factual_consistency < 0.5 {
            issues.push("Unverified factual claims".to_string());
        }

        ResponseMetric {
            id: Uuid::new_v4().to_string(),
            workspace_id: workspace_id.to_string(),
            query: query.to_string(),
            response_text: response_text.to_string(),
            coherence_score: scores.coherence,
            hallucination_score: scores.hallucination,
            source_attribution_score: scores.source_attribution,
            factual_consistency_score: scores.factual_consistency,
            overall_quality_score: overall,
            quality_assessment: ResponseAssessment::from_score(overall),
            issues_detected: issues,
            created_at: crate::model::now_rfc3339(),
        }
    }

    /// Fraction of response sentences not traceable to any source chunk
    async fn hallucination(&self, sentences: &[&str], sources: &[String]) -> f64 {
        if sentences.is_empty() {
            return 0.0;
        }
        if sources.is_empty() {
            return 1.0;
        }

        let source_words: Vec<HashSet<String>> =
            sources.iter().map(|s| content_words(s)).collect();

        let mut unsupported: Vec<usize> = Vec::new();
        for (i, sentence) in sentences.iter().enumerate() {
            let support = lexical_support(sentence, &source_words);
            if support < SUPPORT_THRESHOLD {
                unsupported.push(i);
            }
        }

        // Give lexically unsupported sentences a semantic second chance
        if let Some(embedder) = &self.embedder {
            if !unsupported.is_empty() {
                match self
                    .semantic_support(embedder.as_ref(), sentences, &unsupported, sources)
                    .await
                {
                    Ok(rescued) => {
                        unsupported.retain(|i| !rescued.contains(i));
                    }
                    Err(e) => {
                        warn!("Semantic support check unavailable, using lexical only: {}", e);
                    }
                }
            }
        }

        unsupported.len() as f64 / sentences.len() as f64
    }

    async fn semantic_support(
        &self,
        embedder: &dyn Embedder,
        sentences: &[&str],
        unsupported: &[usize],
        sources: &[String],
    ) -> Result<HashSet<usize>> {
        let mut inputs: Vec<String> =
            unsupported.iter().map(|i| sentences[*i].to_string()).collect();
        inputs.extend(sources.iter().cloned());

        let embeddings = embedder.embed(inputs).await?;
        let (sentence_vecs, source_vecs) = embeddings.split_at(unsupported.len());

        let mut rescued = HashSet::new();
        for (slot, index) in unsupported.iter().enumerate() {
            for source_vec in source_vecs {
                if cosine_similarity(&sentence_vecs[slot], source_vec)?
                    >= SEMANTIC_SUPPORT_THRESHOLD
                {
                    rescued.insert(*index);
                    break;
                }
            }
        }
        Ok(rescued)
    }
}

impl Default for ResponseEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn content_words(text: &str) -> HashSet<String> {
    text.unicode_words()
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() >= 4)
        .collect()
}

/// Highest fraction of the sentence's content words found in one source
fn lexical_support(sentence: &str, source_words: &[HashSet<String>]) -> f64 {
    let words = content_words(sentence);
    if words.is_empty() {
        // Nothing substantive to verify
        return 1.0;
    }

    source_words
        .iter()
        .map(|source| {
            words.iter().filter(|w| source.contains(*w)).count() as f64 / words.len() as f64
        })
        .fold(0.0, f64::max)
}

/// Sentence-transition quality plus whole-response topic consistency
fn coherence(sentences: &[&str]) -> f64 {
    if sentences.len() < 2 {
        return 0.7;
    }

    let word_sets: Vec<HashSet<String>> =
        sentences.iter().map(|s| content_words(s)).collect();

    let mut transition_total = 0.0;
    for pair in word_sets.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.is_empty() || b.is_empty() {
            transition_total += 0.4;
            continue;
        }
        let shared = a.intersection(b).count() as f64;
        let overlap = shared / a.len().min(b.len()) as f64;
        transition_total += 0.4 + 0.6 * (overlap * 3.0).min(1.0);
    }
    let transitions = transition_total / (sentences.len() - 1) as f64;

    // Topic consistency: how much each sentence shares with the rest of the
    // response
    let mut topic_total = 0.0;
    for (i, words) in word_sets.iter().enumerate() {
        let others: HashSet<&String> = word_sets
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .flat_map(|(_, set)| set)
            .collect();
        if words.is_empty() || others.is_empty() {
            topic_total += 0.5;
            continue;
        }
        let shared = words.iter().filter(|w| others.contains(w)).count() as f64;
        topic_total += shared / words.len() as f64;
    }
    let topic = topic_total / sentences.len() as f64;

    (0.6 * transitions + 0.4 * topic).clamp(0.0, 1.0)
}

/// Fraction of sentences carrying an explicit citation marker
fn attribution(sentences: &[&str]) -> f64 {
    if sentences.is_empty() {
        return 0.0;
    }
    let cited = sentences
        .iter()
        .filter(|s| citation_regex().is_match(s))
        .count();
    (cited as f64 / sentences.len() as f64).min(1.0)
}

/// Cross-check numeric and entity claims against source text
fn factual_consistency(response: &str, sources: &[String]) -> f64 {
    let combined_sources = sources.join("\n").to_lowercase();

    let mut claims = 0usize;
    let mut supported = 0usize;

    for number in number_regex().find_iter(response) {
        claims += 1;
        if combined_sources.contains(number.as_str()) {
            supported += 1;
        }
    }

    // Entity claims: capitalized words that are not sentence openers
    for sentence in response.unicode_sentences() {
        for (i, word) in sentence.unicode_words().enumerate() {
            if i == 0 || word.len() < 3 {
                continue;
            }
            if word.chars().next().map(char::is_uppercase).unwrap_or(false) {
                claims += 1;
                if combined_sources.contains(&word.to_lowercase()) {
                    supported += 1;
                }
            }
        }
    }

    if claims == 0 {
        return 1.0;
    }
    supported as f64 / claims as f64
}
