use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::fetch::HttpClient;
use crate::services::platform::{Platform, Post};

#[derive(Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct WebhookResponse {
    id: String,
}

/// Discord webhook limit for message content.
const MAX_CONTENT_LEN: usize = 2000;

/// Publishes posts to a Discord channel through an incoming webhook.
pub struct DiscordWebhook<C> {
    http: C,
    webhook_url: Url,
}

impl<C: HttpClient> DiscordWebhook<C> {
    pub fn new(http: C, webhook_url: &str) -> Result<Self> {
        let webhook_url = Url::parse(webhook_url).context("Invalid Discord webhook URL")?;
        Ok(Self { http, webhook_url })
    }

    /// Webhook URL with `wait=true`, keeping any existing query such as `thread_id`.
    fn execute_url(&self) -> Url {
        let mut url = self.webhook_url.clone();
        // wait=true makes Discord return the created message
        url.query_pairs_mut().append_pair("wait", "true");
        url
    }
}

/// Message text followed by the link, truncated to Discord's limit.
pub fn webhook_content(post: &Post) -> String {
    let mut content = match &post.link {
        Some(link) if !post.message.contains(link.as_str()) => {
            format!("{}\n{}", post.message, link)
        }
        _ => post.message.clone(),
    };

    if content.chars().count() > MAX_CONTENT_LEN {
        content = content.chars().take(MAX_CONTENT_LEN).collect();
    }
    content
}

#[async_trait]
impl<C: HttpClient> Platform for DiscordWebhook<C> {
    fn name(&self) -> &str {
        "discord"
    }

    #[tracing::instrument(skip_all, fields(platform = "discord"))]
    async fn publish(&self, post: &Post) -> Result<String> {
        let content = webhook_content(post);
        let body = serde_json::to_vec(&WebhookMessage { content: &content })?;

        let mut req = reqwest::Request::new(reqwest::Method::POST, self.execute_url());
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(body.into());

        let response = self
            .http
            .execute(req)
            .await
            .context("Failed to send Discord webhook")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Discord returned status {}: {}", status, text));
        }

        let created: WebhookResponse = response
            .json()
            .await
            .context("Failed to parse Discord webhook response")?;

        info!(message_id = %created.id, "Posted to Discord");
        Ok(created.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockClient;
    use std::sync::Arc;

    const THREAD_WEBHOOK: &str = "https://discord.com/api/webhooks/1/abc?thread_id=42";

    #[test]
    fn test_content_appends_link_once() {
        let post = Post::new("COE results").with_link("https://example.com");
        assert_eq!(webhook_content(&post), "COE results\nhttps://example.com");

        let already = Post::new("More at https://example.com").with_link("https://example.com");
        assert_eq!(webhook_content(&already), "More at https://example.com");
    }

    #[test]
    fn test_content_truncated() {
        let post = Post::new("x".repeat(MAX_CONTENT_LEN + 50));
        assert_eq!(webhook_content(&post).len(), MAX_CONTENT_LEN);
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(DiscordWebhook::new(MockClient::new(200, ""), "not a url").is_err());
    }

    #[tokio::test]
    async fn test_publish_keeps_thread_query() {
        let http = Arc::new(MockClient::new(200, r#"{"id":"1234"}"#));
        let webhook = DiscordWebhook::new(http.clone(), THREAD_WEBHOOK).unwrap();

        let post = Post::new("COE results").with_link("https://example.com/coe");
        let id = webhook.publish(&post).await.unwrap();
        assert_eq!(id, "1234");

        let sent = http.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, reqwest::Method::POST);
        assert_eq!(sent[0].url.path(), "/api/webhooks/1/abc");
        let query: Vec<(String, String)> = sent[0].url.query_pairs().into_owned().collect();
        assert_eq!(
            query,
            vec![
                ("thread_id".to_string(), "42".to_string()),
                ("wait".to_string(), "true".to_string()),
            ]
        );
        assert_eq!(sent[0].headers[CONTENT_TYPE], "application/json");
        assert_eq!(sent[0].json()["content"], "COE results\nhttps://example.com/coe");
    }

    #[tokio::test]
    async fn test_publish_plain_webhook_adds_wait() {
        let http = Arc::new(MockClient::new(200, r#"{"id":"1"}"#));
        let webhook =
            DiscordWebhook::new(http.clone(), "https://discord.com/api/webhooks/1/abc").unwrap();

        webhook.publish(&Post::new("hi")).await.unwrap();
        assert_eq!(http.sent()[0].url.query(), Some("wait=true"));
    }

    #[tokio::test]
    async fn test_publish_error_status() {
        let http = MockClient::new(404, r#"{"message":"Unknown Webhook"}"#);
        let webhook = DiscordWebhook::new(http, THREAD_WEBHOOK).unwrap();

        let err = webhook.publish(&Post::new("hi")).await.unwrap_err();
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("Unknown Webhook"));
    }
}
