use anyhow::{Context, Result};
use tracing::debug;

use super::KeyStore;

/// Resolves secrets (API token, LinkedIn credentials, webhook URLs) from AWS
/// SSM Parameter Store.
///
/// Parameters are fetched with decryption enabled so `SecureString` values
/// can be used directly.
pub struct SsmKeyStore {
    client: aws_sdk_ssm::Client,
}

impl SsmKeyStore {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
        }
    }
}

#[async_trait::async_trait]
impl KeyStore for SsmKeyStore {
    async fn get(&self, reference: &str) -> Result<String> {
        debug!(parameter = reference, "Fetching secret from SSM");

        let resp = self
            .client
            .get_parameter()
            .name(reference)
            .with_decryption(true)
            .send()
            .await
            .with_context(|| format!("SSM GetParameter failed for '{reference}'"))?;

        resp.parameter
            .and_then(|p| p.value)
            .ok_or_else(|| anyhow::anyhow!("SSM parameter '{reference}' has no value"))
    }
}
