//! services/reader/src/adapters/progress_http.rs
//!
//! This module contains the adapter for the remote progress-persistence
//! endpoints. It implements the `ProgressService` port from the `core`
//! crate over plain HTTP with a bearer token.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use story_reader_core::domain::{QuizResult, ReadingProgress};
use story_reader_core::ports::{PortError, PortResult, ProgressService};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ProgressService` port against the
/// storybook backend.
#[derive(Clone)]
pub struct HttpProgressService {
    client: Client,
    base_url: String,
}

impl HttpProgressService {
    /// Creates a new `HttpProgressService`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn progress_url(&self, document_id: Uuid) -> String {
        format!("{}/api/stories/{}/progress", self.base_url, document_id)
    }

    fn quiz_url(&self, document_id: Uuid) -> String {
        format!("{}/api/stories/{}/quiz-result", self.base_url, document_id)
    }
}

//=========================================================================================
// Wire Formats
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressBody {
    last_page_reached: usize,
    is_completed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatBody {
    last_page_reached: usize,
    additional_time: u64,
    is_completed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuizBody {
    score: u32,
    total: u32,
}

fn to_port_error(e: reqwest::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `ProgressService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProgressService for HttpProgressService {
    async fn fetch(&self, token: &str, document_id: Uuid) -> PortResult<Option<ReadingProgress>> {
        let response = self
            .client
            .get(self.progress_url(document_id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(to_port_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED => Err(PortError::Unauthorized),
            _ => {
                let body: ProgressBody = response
                    .error_for_status()
                    .map_err(to_port_error)?
                    .json()
                    .await
                    .map_err(to_port_error)?;
                Ok(Some(ReadingProgress {
                    last_page_reached: body.last_page_reached,
                    is_completed: body.is_completed,
                }))
            }
        }
    }

    async fn push(
        &self,
        token: &str,
        document_id: Uuid,
        last_page_reached: usize,
        additional_seconds: u64,
        is_completed: bool,
    ) -> PortResult<()> {
        self.client
            .put(self.progress_url(document_id))
            .bearer_auth(token)
            .json(&HeartbeatBody {
                last_page_reached,
                additional_time: additional_seconds,
                is_completed,
            })
            .send()
            .await
            .map_err(to_port_error)?
            .error_for_status()
            .map_err(to_port_error)?;
        Ok(())
    }

    async fn submit_quiz(&self, token: &str, result: &QuizResult) -> PortResult<()> {
        self.client
            .post(self.quiz_url(result.document_id))
            .bearer_auth(token)
            .json(&QuizBody {
                score: result.score,
                total: result.total,
            })
            .send()
            .await
            .map_err(to_port_error)?
            .error_for_status()
            .map_err(to_port_error)?;
        Ok(())
    }
}
