//! REST fallback client
//!
//! Actions with a REST equivalent go over HTTP when composing a submission
//! outside the live socket: immediate sends while the socket is down and
//! drain replays. Endpoints are part of the server contract.

use std::time::Duration;

use url::Url;

use crate::error::SubmitError;

/// Thin client over the session server's REST surface.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base: Url, request_timeout: Duration) -> Result<Self, SubmitError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { http, base })
    }

    /// `POST /api/dice/roll`
    pub async fn post_dice_roll(&self, payload: &serde_json::Value) -> Result<(), SubmitError> {
        self.post("api/dice/roll", payload).await
    }

    /// `POST /api/messages`
    pub async fn post_message(&self, payload: &serde_json::Value) -> Result<(), SubmitError> {
        self.post("api/messages", payload).await
    }

    /// `POST /api/dice/sync` - drain replay variant.
    pub async fn sync_dice_roll(&self, payload: &serde_json::Value) -> Result<(), SubmitError> {
        self.post("api/dice/sync", payload).await
    }

    /// `POST /api/messages/sync` - drain replay variant.
    pub async fn sync_message(&self, payload: &serde_json::Value) -> Result<(), SubmitError> {
        self.post("api/messages/sync", payload).await
    }

    /// `PATCH /api/characters/{id}`
    pub async fn patch_character(
        &self,
        character_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), SubmitError> {
        let url = self.endpoint(&["api", "characters", character_id])?;
        let response = self.http.patch(url).json(payload).send().await?;
        Self::check_status(response)
    }

    async fn post(&self, path: &str, payload: &serde_json::Value) -> Result<(), SubmitError> {
        let segments: Vec<&str> = path.split('/').collect();
        let url = self.endpoint(&segments)?;
        let response = self.http.post(url).json(payload).send().await?;
        Self::check_status(response)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SubmitError> {
        let mut url = self.base.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|_| SubmitError::InvalidPayload("base URL cannot be a base".to_string()))?;
            parts.pop_if_empty();
            for segment in segments {
                parts.push(segment);
            }
        }
        Ok(url)
    }

    fn check_status(response: reqwest::Response) -> Result<(), SubmitError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SubmitError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
