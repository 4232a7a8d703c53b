//! Environment configuration.
//!
//! Values come from the process environment, after `.env` has been loaded by
//! `dotenvy` in `main`. Secrets that are not set directly can be resolved from
//! SSM through [`Config::resolve_secrets`].

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

use crate::infra::keys::{KeyStore, SecretRefs, resolve_secret};

pub const DEFAULT_SITE_URL: &str = "https://sgcarstrends.com";

#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment stage (`dev`, `staging`, `prod`). Scheduled updates only
    /// run in `prod` unless forced.
    pub stage: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub api_token: Option<String>,
    pub cors_origin: Option<String>,
    pub coe_dataset_url: Option<String>,
    pub cars_dataset_url: Option<String>,
    pub datamall_account_key: Option<String>,
    pub linkedin_access_token: Option<String>,
    pub linkedin_organisation_id: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub site_url: String,
    pub s3_bucket: Option<String>,
    pub secrets_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            stage: get("APP_ENV").unwrap_or_else(|| "dev".to_string()),
            port: parse_or(&get, "PORT", 3000)?,
            data_dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "data".to_string())),
            api_token: get("API_TOKEN"),
            cors_origin: get("CORS_ORIGIN"),
            coe_dataset_url: get("COE_DATASET_URL"),
            cars_dataset_url: get("CARS_DATASET_URL"),
            datamall_account_key: get("DATAMALL_ACCOUNT_KEY"),
            linkedin_access_token: get("LINKEDIN_ACCESS_TOKEN"),
            linkedin_organisation_id: get("LINKEDIN_ORGANISATION_ID"),
            discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
            site_url: get("SITE_URL").unwrap_or_else(|| DEFAULT_SITE_URL.to_string()),
            s3_bucket: get("S3_BUCKET"),
            secrets_file: get("SECRETS_FILE"),
        })
    }

    pub fn is_prod(&self) -> bool {
        self.stage == "prod"
    }

    /// Token guarding the `/v1` routes; serving without one is refused.
    pub fn require_api_token(&self) -> Result<&str> {
        self.api_token
            .as_deref()
            .context("API_TOKEN must be set to serve the API")
    }

    pub fn update_log_path(&self) -> PathBuf {
        self.data_dir.join("last_updated.json")
    }

    /// Fills unset secrets from the vault references in `refs`.
    pub async fn resolve_secrets(&mut self, refs: &SecretRefs, store: &dyn KeyStore) -> Result<()> {
        self.api_token = resolve_secret("API_TOKEN", self.api_token.take(), refs, store).await?;
        self.datamall_account_key = resolve_secret(
            "DATAMALL_ACCOUNT_KEY",
            self.datamall_account_key.take(),
            refs,
            store,
        )
        .await?;
        self.linkedin_access_token = resolve_secret(
            "LINKEDIN_ACCESS_TOKEN",
            self.linkedin_access_token.take(),
            refs,
            store,
        )
        .await?;
        self.linkedin_organisation_id = resolve_secret(
            "LINKEDIN_ORGANISATION_ID",
            self.linkedin_organisation_id.take(),
            refs,
            store,
        )
        .await?;
        self.discord_webhook_url = resolve_secret(
            "DISCORD_WEBHOOK_URL",
            self.discord_webhook_url.take(),
            refs,
            store,
        )
        .await?;
        Ok(())
    }

    /// Logs which optional integrations are configured, without values.
    pub fn log_summary(&self) {
        info!(
            stage = %self.stage,
            port = self.port,
            data_dir = %self.data_dir.display(),
            api_auth = self.api_token.is_some(),
            linkedin =
                self.linkedin_access_token.is_some() && self.linkedin_organisation_id.is_some(),
            discord = self.discord_webhook_url.is_some(),
            s3_bucket = self.s3_bucket.as_deref().unwrap_or("-"),
            "Configuration loaded"
        );
        if self.api_token.is_none() {
            warn!("API_TOKEN not set, the API server will refuse to start");
        }
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw.parse().with_context(|| format!("Invalid {key} value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.stage, "dev");
        assert_eq!(config.port, 3000);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.site_url, DEFAULT_SITE_URL);
        assert!(config.api_token.is_none());
        assert!(!config.is_prod());
    }

    #[test]
    fn test_values_and_blank_as_unset() {
        let config = Config::from_lookup(lookup(&[
            ("APP_ENV", "prod"),
            ("PORT", "8080"),
            ("API_TOKEN", "  "),
            ("S3_BUCKET", "coe-bucket"),
        ]))
        .unwrap();
        assert!(config.is_prod());
        assert_eq!(config.port, 8080);
        assert!(config.api_token.is_none());
        assert_eq!(config.s3_bucket.as_deref(), Some("coe-bucket"));
    }

    #[test]
    fn test_api_token_required_to_serve() {
        let missing = Config::from_lookup(lookup(&[("API_TOKEN", "")])).unwrap();
        let err = missing.require_api_token().unwrap_err();
        assert!(err.to_string().contains("API_TOKEN"));

        let set = Config::from_lookup(lookup(&[("API_TOKEN", "secret")])).unwrap();
        assert_eq!(set.require_api_token().unwrap(), "secret");
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("Invalid PORT"));
    }
}
