use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::BackendClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct HttpEmbedder {
    client: BackendClient,
    model: String,
    dimension: usize,
}

#[derive(Debug, Clone, Serialize)]
struct EmbedTextRequest<'a> {
    model: &'a str,
    inputs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Embeddings { embeddings: Vec<Vec<f32>> },
    Vectors { vectors: Vec<Vec<f32>> },
    Data { data: Vec<EmbeddingData> },
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_embeddings(self) -> Vec<Vec<f32>> {
        match self {
            EmbeddingResponse::Embeddings { embeddings } => embeddings,
            EmbeddingResponse::Vectors { vectors } => vectors,
            EmbeddingResponse::Data { data } => data.into_iter().map(|d| d.embedding).collect(),
        }
    }
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = BackendClient::new(&config.backend_url, config.timeout_secs, config.retries)?;
        Ok(Self {
            client,
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }

    fn validate_dimensions(&self, embeddings: &[Vec<f32>]) -> Result<()> {
        if let Some(mismatch) = embeddings.iter().find(|vec| vec.len() != self.dimension) {
            return Err(Error::Embedding(format!(
                "Embedding dimension mismatch for model '{}': expected {}, got {}",
                self.model,
                self.dimension,
                mismatch.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedTextRequest {
            model: &self.model,
            inputs: texts,
        };
        let response: EmbeddingResponse =
            self.client.post_json("/v1/embed/text", &request).await?;
        let embeddings = response.into_embeddings();
        self.validate_dimensions(&embeddings)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            backend_url: server.uri(),
            dimension,
            retries: 0,
            ..EmbeddingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_embed_parses_embeddings_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&config_for(&server, 3)).unwrap();
        let embeddings = embedder
            .embed(vec!["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 3);
    }

    #[tokio::test]
    async fn test_embed_rejects_dimension_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2]]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&config_for(&server, 3)).unwrap();
        assert!(embedder.embed(vec!["text".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_embed_empty_input_short_circuits() {
        let server = MockServer::start().await;
        let embedder = HttpEmbedder::new(&config_for(&server, 3)).unwrap();
        let embeddings = embedder.embed(Vec::new()).await.unwrap();
        assert!(embeddings.is_empty());
    }
}
