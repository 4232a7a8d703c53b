//! Secret management.
//!
//! [`SecretRefs`] maps secret names to references (SSM parameter paths).
//! [`KeyStore`] is the async trait for resolving a reference into its plaintext value.
//! [`SsmKeyStore`] implements [`KeyStore`] using AWS SSM Parameter Store.

mod config;
mod ssm;

pub use config::SecretRefs;
pub use ssm::SsmKeyStore;

use anyhow::Result;

/// Resolves a vault reference (e.g. an SSM parameter path) into a plaintext secret.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    async fn get(&self, reference: &str) -> Result<String>;
}

/// Resolves `name`: an explicit value wins, otherwise the configured
/// reference is looked up in `store`. `None` when neither is available.
pub async fn resolve_secret(
    name: &str,
    explicit: Option<String>,
    refs: &SecretRefs,
    store: &dyn KeyStore,
) -> Result<Option<String>> {
    if explicit.is_some() {
        return Ok(explicit);
    }
    match refs.get_ref(name) {
        Some(reference) => Ok(Some(store.get(reference).await?)),
        None => Ok(None),
    }
}
