//! HTTP client for the signaling API.
//!
//! Each request names its own endpoint (`externalApiUrl`); the service
//! POSTs JSON there with the room as a query parameter.

use meter_core::config::NotifyConfig;
use reqwest::StatusCode;
use serde::Serialize;

use crate::error::NotifyError;

#[derive(Debug, Clone)]
pub struct SignalClient {
    client: reqwest::Client,
    /// Bearer token for the signaling API, if it requires one.
    api_token: Option<String>,
}

impl SignalClient {
    pub fn new(cfg: &NotifyConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(cfg.timeout()).build()?;
        Ok(Self {
            client,
            api_token: cfg.signal_api_token.clone(),
        })
    }

    /// POST `body` to `url?room={room}`. Only 200 counts as delivered.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        room: &str,
        body: &T,
    ) -> Result<(), NotifyError> {
        if url.is_empty() {
            return Err(NotifyError::Config("request has no externalApiUrl".into()));
        }

        let mut request = self.client.post(url).query(&[("room", room)]).json(body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => {
                tracing::debug!(url, room, "signal api notified");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(NotifyError::ConferenceGone(room.to_string())),
            status => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                tracing::warn!(url, %status, body = %body, "unexpected response from signal api");
                Err(NotifyError::UnexpectedStatus {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
