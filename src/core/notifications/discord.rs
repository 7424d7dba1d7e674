use super::{Notifier, check_response};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

pub struct DiscordNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    fn format_message(&self, message: &str) -> serde_json::Value {
        json!({ "content": message })
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let payload = self.format_message(message);
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;
        check_response(response).await
    }
}
