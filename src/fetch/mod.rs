mod client;
mod basic;
pub mod auth;
#[cfg(test)]
pub(crate) mod mock;

pub use client::HttpClient;
pub use basic::BasicClient;

use anyhow::Result;
use bytes::Bytes;
use tracing::debug;

/// GETs `url` and returns the body, failing on a non-success status.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!("GET {} returned status {}: {}", url, status, body));
    }

    let bytes = resp.bytes().await?;
    debug!(url, bytes = bytes.len(), "Fetched");
    Ok(bytes)
}

/// Loads bytes from a local file path or fetches them over HTTP.
pub async fn fetch_source<C: HttpClient>(client: &C, source: &str) -> Result<Bytes> {
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch_bytes(client, source).await
    } else {
        Ok(Bytes::from(tokio::fs::read(source).await?))
    }
}
