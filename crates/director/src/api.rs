//! REST client for the motion director service.
//!
//! Wraps `POST /motion/generate`, `POST /motion/refine`, and
//! `GET /health` using [`reqwest`].

use std::time::Duration;

use async_trait::async_trait;

use sceneforge_core::error::CoreError;

use crate::request::{MotionRequest, RefineRequest};
use crate::wire::{DirectorResponse, GenerateBody, GenerateResponseBody, RefineBody};

/// Errors from the motion director REST layer.
#[derive(Debug, thiserror::Error)]
pub enum DirectorError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The director returned a non-2xx status code.
    #[error("Motion director error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("Malformed motion director response: {0}")]
    Decode(String),
}

impl From<DirectorError> for CoreError {
    fn from(err: DirectorError) -> Self {
        CoreError::Transport(err.to_string())
    }
}

/// The enrichment collaborator behind auto motion.
#[async_trait]
pub trait MotionDirector: Send + Sync {
    /// Ask for per-scene prompts, negative prompts, and an optional order.
    async fn generate(
        &self,
        api_key: &str,
        request: &MotionRequest,
    ) -> Result<DirectorResponse, DirectorError>;

    /// Refine a previous session with a free-form instruction.
    async fn refine(
        &self,
        api_key: &str,
        request: &RefineRequest,
    ) -> Result<DirectorResponse, DirectorError>;
}

/// HTTP client for a motion director instance.
#[derive(Debug, Clone)]
pub struct MotionDirectorApi {
    client: reqwest::Client,
    base_url: String,
}

impl MotionDirectorApi {
    /// Create a client with the given request timeout.
    ///
    /// * `base_url` - e.g. `http://localhost:8001`.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, DirectorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns `Ok(())` when `GET /health` answers with a 2xx status.
    pub async fn health(&self) -> Result<(), DirectorError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    // ---- private helpers ----

    async fn post_motion<B: serde::Serialize>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<DirectorResponse, DirectorError> {
        let response = self
            .client
            .post(format!("{}/motion/{route}", self.base_url))
            .json(body)
            .send()
            .await?;
        let parsed: GenerateResponseBody = Self::parse_response(response).await?;
        Ok(parsed.into())
    }

    /// Ensure the response has a success status code.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, DirectorError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(DirectorError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DirectorError> {
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| DirectorError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MotionDirector for MotionDirectorApi {
    async fn generate(
        &self,
        api_key: &str,
        request: &MotionRequest,
    ) -> Result<DirectorResponse, DirectorError> {
        let body = GenerateBody::new(api_key, request);
        tracing::info!(
            pipeline = request.pipeline().as_str(),
            images = request.images.len(),
            style = request.style_preset.as_str(),
            "Requesting motion prompts",
        );
        let response = self.post_motion("generate", &body).await?;
        tracing::debug!(
            session_id = %response.session_id,
            items = response.result.items.len(),
            "Motion director responded",
        );
        Ok(response)
    }

    async fn refine(
        &self,
        api_key: &str,
        request: &RefineRequest,
    ) -> Result<DirectorResponse, DirectorError> {
        let body = RefineBody::new(api_key, request);
        tracing::info!(
            session_id = %request.session_id,
            scene_index = ?request.scene_index,
            "Refining motion prompts",
        );
        self.post_motion("refine", &body).await
    }
}
