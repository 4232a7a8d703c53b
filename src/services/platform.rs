//! Trait and types for publishing summaries to social media platforms.

use anyhow::Result;
use serde::Serialize;

/// A message to publish, with an optional link shared alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub message: String,
    pub link: Option<String>,
}

impl Post {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Abstraction over a social media platform (e.g., LinkedIn, Discord).
#[async_trait::async_trait]
pub trait Platform: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Publishes the post and returns the id of the created entity.
    async fn publish(&self, post: &Post) -> Result<String>;
}
