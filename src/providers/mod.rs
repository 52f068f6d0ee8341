pub mod remote;

use std::sync::Arc;

use color_eyre::eyre::Result;
use reqwest::Client;

use crate::config::Config;
use crate::services::credentials::CredentialStore;
use crate::services::registry::CapabilityRegistry;

use self::remote::{endpoint_url, remote_factory};

/// Build the registry from the `[sources.*]` tables of the config.
pub fn build_registry(
    config: &Config,
    credentials: Arc<CredentialStore>,
    client: &Client,
) -> Result<CapabilityRegistry> {
    let mut registry = CapabilityRegistry::new(credentials);

    for (source, source_config) in &config.sources {
        let endpoint = endpoint_url(&source_config.endpoint)?;
        let capabilities = source_config.capabilities();
        log::info!(
            "Source {} served by {} with {:?}",
            source,
            endpoint,
            capabilities
        );
        registry.register(
            source.clone(),
            capabilities,
            remote_factory(client.clone(), endpoint),
        );
    }

    if config.sources.is_empty() {
        log::warn!("No sources configured, every lookup will come back empty");
    }

    Ok(registry)
}
