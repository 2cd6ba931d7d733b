//! HTTP implementation of the session gateway.

use std::env;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;

use exam_core::model::{QuestionResponse, SessionId, TestId, TestingSession};

use crate::error::GatewayError;
use crate::gateway::{Page, PageRequest, SessionGateway};

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_token: String,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }

    /// Configuration from `EXAMTRAIL_API_TOKEN` / `EXAMTRAIL_API_BASE_URL`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_token = env::var("EXAMTRAIL_API_TOKEN").ok()?;
        if api_token.trim().is_empty() {
            return None;
        }
        let base_url = env::var("EXAMTRAIL_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.examtrail.app/v1".into());
        Some(Self {
            base_url,
            api_token,
        })
    }
}

/// Session gateway backed by the remote testing service.
#[derive(Clone)]
pub struct HttpSessionGateway {
    client: Client,
    config: GatewayConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    test_id: TestId,
}

impl HttpSessionGateway {
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn check(response: Response) -> Result<Response, GatewayError> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound),
            StatusCode::CONFLICT => Err(GatewayError::Conflict),
            status => Err(GatewayError::Status(status)),
        }
    }
}

#[async_trait]
impl SessionGateway for HttpSessionGateway {
    async fn create(&self, test_id: TestId) -> Result<TestingSession, GatewayError> {
        let response = self
            .client
            .post(self.url("testing-sessions"))
            .bearer_auth(&self.config.api_token)
            .json(&CreateSessionRequest { test_id })
            .send()
            .await?;
        Ok(Self::check(response)?.json().await?)
    }

    async fn get(&self, id: SessionId) -> Result<TestingSession, GatewayError> {
        let response = self
            .client
            .get(self.url(&format!("testing-sessions/{id}")))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Ok(Self::check(response)?.json().await?)
    }

    async fn list(&self, page: PageRequest) -> Result<Page<TestingSession>, GatewayError> {
        let response = self
            .client
            .get(self.url("testing-sessions"))
            .query(&[("offset", page.offset), ("limit", page.limit)])
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Ok(Self::check(response)?.json().await?)
    }

    async fn update_answers(
        &self,
        id: SessionId,
        responses: &[QuestionResponse],
    ) -> Result<(), GatewayError> {
        let response = self
            .client
            .put(self.url(&format!("testing-sessions/{id}/responses")))
            .bearer_auth(&self.config.api_token)
            .json(&responses)
            .send()
            .await?;
        Self::check(response)?;
        Ok(())
    }

    async fn complete(&self, id: SessionId) -> Result<TestingSession, GatewayError> {
        let response = self
            .client
            .post(self.url(&format!("testing-sessions/{id}/complete")))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Ok(Self::check(response)?.json().await?)
    }

    async fn close(&self, id: SessionId) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url(&format!("testing-sessions/{id}/close")))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Self::check(response)?;
        Ok(())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
