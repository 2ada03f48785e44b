//! Local keyword/pattern classifier
//!
//! Cue tables distilled from observed catalog corpora. Used as the last
//! provider in a chain so classification still produces an honest,
//! low-confidence label when remote providers are down. Confidence is capped
//! well below remote-provider levels; it never reports certainty it does not
//! have.

use super::{Classifier, ClassifyRequest};
use crate::error::Result;
use crate::model::{Classification, ContentType};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

const PROVIDER_NAME: &str = "keyword-heuristic";

/// Heuristic confidence ceiling
const MAX_CONFIDENCE: f64 = 0.75;

fn dimension_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d+\s*[×x]\s*\d+(\s*[×x]\s*\d+)?\s*(cm|mm|m)\b").unwrap()
    })
}

fn certification_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(ISO\s*\d+|IP\d{2}|EN\s*\d+)\b").unwrap())
}

fn uppercase_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A short line in capitals reads as a catalog product name
    RE.get_or_init(|| Regex::new(r"(?m)^[A-Z][A-Z0-9 \-]{2,30}$").unwrap())
}

struct CueTable {
    content_type: ContentType,
    cues: &'static [&'static str],
    sub_category: &'static str,
}

const CUE_TABLES: &[CueTable] = &[
    CueTable {
        content_type: ContentType::Specification,
        cues: &[
            "specification",
            "technical specifications",
            "weight capacity",
            "dimensions:",
            "material:",
            "resistance",
            "compliance",
            "rated",
        ],
        sub_category: "technical_specs",
    },
    CueTable {
        content_type: ContentType::Product,
        cues: &[
            "available in",
            "upholstery",
            "finishes",
            "configurations",
            "collection",
            "designed for",
            "seating",
            "modular",
        ],
        sub_category: "product_description",
    },
    CueTable {
        content_type: ContentType::Introduction,
        cues: &["index", "welcome", "contents", "overview", "signature book"],
        sub_category: "index_content",
    },
    CueTable {
        content_type: ContentType::LegalDisclaimer,
        cues: &[
            "warranty",
            "liability",
            "terms and conditions",
            "disclaimer",
            "all rights reserved",
            "subject to change",
        ],
        sub_category: "legal_text",
    },
    CueTable {
        content_type: ContentType::TechnicalDetail,
        cues: &[
            "installation",
            "maintenance",
            "assembly",
            "cleaning",
            "care instructions",
            "mounting",
        ],
        sub_category: "care_and_installation",
    },
    CueTable {
        content_type: ContentType::Marketing,
        cues: &[
            "inspiration",
            "stunning",
            "timeless",
            "philosophy",
            "aesthetic",
            "moodboard",
            "designer",
            "sustainability",
        ],
        sub_category: "designer_story",
    },
];

/// Classifier driven by keyword cue tables
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn score(text: &str) -> (ContentType, f64, Vec<String>, Vec<String>) {
        let lower = text.to_lowercase();

        let mut best: Option<(ContentType, usize, &'static str)> = None;
        let mut matched_cues: Vec<String> = Vec::new();

        for table in CUE_TABLES {
            let hits: Vec<&str> = table
                .cues
                .iter()
                .copied()
                .filter(|cue| lower.contains(cue))
                .collect();
            let mut count = hits.len();

            // Structural signals reinforce the two catalog-entry categories
            if table.content_type == ContentType::Product
                && uppercase_name_regex().is_match(text)
            {
                count += 1;
            }
            if table.content_type == ContentType::Specification {
                if dimension_regex().is_match(text) {
                    count += 1;
                }
                if certification_regex().is_match(text) {
                    count += 1;
                }
            }

            if count > 0 {
                let better = match &best {
                    Some((_, best_count, _)) => count > *best_count,
                    None => true,
                };
                if better {
                    best = Some((table.content_type, count, table.sub_category));
                    matched_cues = hits.iter().map(|c| c.to_string()).collect();
                }
            }
        }

        match best {
            Some((content_type, count, sub_category)) => {
                let confidence = (0.35 + 0.1 * count as f64).min(MAX_CONFIDENCE);
                (
                    content_type,
                    confidence,
                    matched_cues,
                    vec![sub_category.to_string()],
                )
            }
            None => (ContentType::Other, 0.3, Vec::new(), Vec::new()),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<Classification> {
        let (content_type, confidence, cues, sub_categories) = Self::score(&request.text);

        let reasoning = if !cues.is_empty() {
            format!("matched cues: {}", cues.join(", "))
        } else if content_type != ContentType::Other {
            "matched structural patterns".to_string()
        } else {
            "no category cues matched".to_string()
        };

        let mut classification = Classification::new(
            request.chunk_id.clone(),
            content_type,
            confidence,
            reasoning,
            PROVIDER_NAME.to_string(),
        );
        classification.sub_categories = sub_categories;
        Ok(classification)
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn classify(text: &str) -> Classification {
        let classifier = KeywordClassifier::new();
        classifier
            .classify(&ClassifyRequest {
                chunk_id: "c".to_string(),
                text: text.to_string(),
                context: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_specification_chunk() {
        let c = classify(
            "Technical Specifications:\n\
             Material: high-grade aluminum alloy\n\
             Weight capacity: 150 kg\n\
             Dimensions: 200 × 100 × 80 mm\n\
             Compliance: ISO 9001",
        )
        .await;
        assert_eq!(c.content_type, ContentType::Specification);
        assert!(c.confidence > 0.5);
        assert_eq!(c.sub_categories, vec!["technical_specs"]);
    }

    #[tokio::test]
    async fn test_product_chunk() {
        let c = classify(
            "VALENOVA\n\
             A modular seating collection available in leather upholstery \
             with black and natural finishes, designed for modern living.",
        )
        .await;
        assert_eq!(c.content_type, ContentType::Product);
    }

    #[tokio::test]
    async fn test_unmatched_text_is_low_confidence_other() {
        let c = classify("zxqv 12 foo bar").await;
        assert_eq!(c.content_type, ContentType::Other);
        assert!(c.low_confidence);
        assert!(c.confidence < 0.5);
    }

    #[tokio::test]
    async fn test_confidence_never_exceeds_ceiling() {
        let c = classify(
            "specification specification dimensions: material: resistance \
             compliance rated weight capacity 10 × 10 cm ISO 9001",
        )
        .await;
        assert!(c.confidence <= MAX_CONFIDENCE + 1e-9);
    }
}
