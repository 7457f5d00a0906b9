use crate::ChatModel;
use crate::client::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::Duration;

use super::chat::RunpodChatModel;

#[derive(Clone)]
pub struct RunpodProvider {
    client: Client,
    base_url: String,
    endpoint_id: String,
}

impl RunpodProvider {
    /// `base_url` is normally `https://api.runpod.ai/v2`; tests point it at
    /// a local server.
    pub fn new(
        base_url: &str,
        endpoint_id: &str,
        api_key: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| anyhow::anyhow!("Invalid API key format"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        Ok(RunpodProvider {
            client: Client::with_headers(headers, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoint_id: endpoint_id.to_string(),
        })
    }

    pub fn chat_model(&self) -> RunpodChatModel {
        RunpodChatModel::new(
            self.client.clone(),
            self.base_url.clone(),
            self.endpoint_id.clone(),
        )
    }

    pub fn create_chat_model(&self) -> Arc<dyn ChatModel + Send + Sync> {
        Arc::new(self.chat_model())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unprintable_key() {
        let result = RunpodProvider::new("https://x", "ep", "bad\nkey", Duration::from_secs(1));
        assert!(result.is_err());
    }

    #[test]
    fn test_model_named_after_endpoint() {
        let provider =
            RunpodProvider::new("https://x/v2/", "ep-9", "k", Duration::from_secs(1)).unwrap();
        assert_eq!(provider.create_chat_model().name(), "ep-9");
    }
}
