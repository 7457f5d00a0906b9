use crate::error::InferenceError;
use reqwest::header::HeaderMap;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{Level, event, instrument};

/// Longest error body kept in a `ServerError`
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
    timeout: Duration,
}

impl Client {
    pub fn with_headers(headers: HeaderMap, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Client { client, timeout })
    }

    #[instrument(level = "trace", skip(self, request))]
    pub async fn post<U, S, T>(&self, url: U, request: &S) -> Result<T, InferenceError>
    where
        U: reqwest::IntoUrl + std::fmt::Debug,
        S: Serialize + Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(InferenceError::ServerError {
                status: Some(status.as_u16()),
                body: error_body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        event!(Level::TRACE, response = text);

        serde_json::from_str::<T>(&text)
            .map_err(|e| InferenceError::BadResponse(format!("invalid JSON: {}", e)))
    }

    fn transport_error(&self, error: reqwest::Error) -> InferenceError {
        if error.is_timeout() {
            InferenceError::Timeout(self.timeout)
        } else if error.is_decode() {
            InferenceError::BadResponse(error.to_string())
        } else {
            InferenceError::transport(error.to_string())
        }
    }
}
