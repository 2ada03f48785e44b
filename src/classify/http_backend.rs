use super::{Classifier, ClassifyRequest};
use crate::config::ClassificationConfig;
use crate::error::{Error, Result};
use crate::model::Classification;
use crate::providers::BackendClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Classifier backed by an HTTP classification service
pub struct HttpClassifier {
    client: BackendClient,
    model: String,
}

#[derive(Debug, Clone, Serialize)]
struct ClassifyApiRequest<'a> {
    model: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClassifyApiResponse {
    content_type: String,
    confidence: f64,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    sub_categories: Vec<String>,
}

impl HttpClassifier {
    pub fn new(config: &ClassificationConfig) -> Result<Self> {
        let client = BackendClient::new(&config.backend_url, config.timeout_secs, config.retries)?;
        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<Classification> {
        let api_request = ClassifyApiRequest {
            model: &self.model,
            text: &request.text,
            context: request.context.as_deref(),
        };

        let response: ClassifyApiResponse =
            self.client.post_json("/v1/classify", &api_request).await?;

        let content_type = response.content_type.parse().map_err(|_| {
            Error::Classification(format!(
                "backend returned unknown content type '{}'",
                response.content_type
            ))
        })?;

        let mut classification = Classification::new(
            request.chunk_id.clone(),
            content_type,
            response.confidence,
            response
                .reasoning
                .unwrap_or_else(|| "no reasoning provided".to_string()),
            self.model.clone(),
        );
        classification.sub_categories = response.sub_categories;
        classification.validate()?;

        Ok(classification)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
