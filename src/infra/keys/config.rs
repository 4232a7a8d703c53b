use anyhow::{Context, Result};
use std::collections::HashMap;

/// Maps secret names to SSM parameter paths (or any other vault reference).
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "LINKEDIN_ACCESS_TOKEN": "/coe-trends/prod/linkedin/access_token",
///   "DISCORD_WEBHOOK_URL": "/coe-trends/prod/discord/webhook_url"
/// }
/// ```
#[derive(Debug, Default)]
pub struct SecretRefs {
    entries: HashMap<String, String>,
}

impl SecretRefs {
    /// Loads the references from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read secret refs {path}"))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let entries: HashMap<String, String> = serde_json::from_str(content)?;
        Ok(Self { entries })
    }

    /// Returns the vault reference for `name`, if one is configured.
    pub fn get_ref(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }
}
