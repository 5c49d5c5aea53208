//! An embedding provider backed by a generic HTTP embedding endpoint.
//!
//! Requires the `http-embedder` feature. The wire format follows the
//! common `{ model, input: [String] } -> { data: [{ embedding: [f32] }] }`
//! shape shared by most hosted embedding APIs (OpenAI- and Cohere-style).

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingModel;
use crate::embedding::RawEmbedder;
use crate::error::{EmbedderError, Result};
use crate::types::Vector;

/// Calls a remote HTTP embedding endpoint with bearer-token auth.
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: EmbeddingModel,
}

impl HttpEmbedder {
    /// Creates a provider targeting `base_url` (e.g.
    /// `https://api.example.com/v1/embeddings`).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: EmbeddingModel) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model,
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vector,
}

impl RawEmbedder for HttpEmbedder {
    fn embed_raw(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        if texts.len() > crate::embedding::MAX_BATCH {
            return Err(EmbedderError::TooManyTexts {
                count: texts.len(),
                max: crate::embedding::MAX_BATCH,
            }
            .into());
        }

        let request = EmbedRequest {
            model: self.model.as_str(),
            input: texts,
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|err| EmbedderError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbedderError::Provider(format!(
                "status {}",
                response.status()
            ))
            .into());
        }

        let parsed: EmbedResponse = response
            .json()
            .map_err(|err| EmbedderError::Provider(err.to_string()))?;

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> u32 {
        self.model.dimension()
    }
}
