use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::{Value, json};
use tracing::info;

use crate::fetch::HttpClient;
use crate::fetch::auth::ApiKey;
use crate::services::platform::{Platform, Post};

const UGC_POSTS_URL: &str = "https://api.linkedin.com/v2/ugcPosts";

/// Publishes posts to a LinkedIn organisation page through the UGC posts API.
pub struct LinkedInClient<C> {
    http: ApiKey<C>,
    organisation_id: String,
}

impl<C: HttpClient> LinkedInClient<C> {
    pub fn new(inner: C, access_token: &str, organisation_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: ApiKey::bearer(inner, access_token)?,
            organisation_id: organisation_id.into(),
        })
    }

    fn author(&self) -> String {
        format!("urn:li:organization:{}", self.organisation_id)
    }
}

/// Builds the UGC share payload for an organisation post.
pub fn ugc_post_body(author: &str, post: &Post) -> Value {
    let media: Vec<Value> = post
        .link
        .iter()
        .map(|link| json!({ "status": "READY", "originalUrl": link }))
        .collect();
    let category = if media.is_empty() { "NONE" } else { "ARTICLE" };

    json!({
        "author": author,
        "lifecycleState": "PUBLISHED",
        "specificContent": {
            "com.linkedin.ugc.ShareContent": {
                "shareCommentary": { "text": post.message },
                "shareMediaCategory": category,
                "media": media,
            }
        },
        "visibility": {
            "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
        }
    })
}

/// Created entity id: the `x-restli-id` header, falling back to the body `id`.
fn created_entity_id(header: Option<&HeaderValue>, body: &str) -> Option<String> {
    if let Some(id) = header.and_then(|h| h.to_str().ok()) {
        return Some(id.to_string());
    }
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl<C: HttpClient> Platform for LinkedInClient<C> {
    fn name(&self) -> &str {
        "linkedin"
    }

    #[tracing::instrument(skip_all, fields(platform = "linkedin"))]
    async fn publish(&self, post: &Post) -> Result<String> {
        let body = serde_json::to_vec(&ugc_post_body(&self.author(), post))?;

        let mut req = reqwest::Request::new(reqwest::Method::POST, UGC_POSTS_URL.parse()?);
        let headers = req.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-restli-protocol-version", HeaderValue::from_static("2.0.0"));
        *req.body_mut() = Some(body.into());

        let response = self
            .http
            .execute(req)
            .await
            .context("Failed to send LinkedIn post")?;

        let status = response.status();
        let header_id = response.headers().get("x-restli-id").cloned();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(anyhow::anyhow!("LinkedIn returned status {}: {}", status, text));
        }

        let id = created_entity_id(header_id.as_ref(), &text)
            .ok_or_else(|| anyhow::anyhow!("LinkedIn response did not include a post id"))?;

        info!(created_entity_id = %id, "Posted to LinkedIn company page");
        Ok(id)
    }
}
