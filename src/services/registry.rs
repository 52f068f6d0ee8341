use std::collections::HashMap;
use std::sync::Arc;

use crate::ports::provider::{Capabilities, Capability, MusicProvider, ProviderFactory};
use crate::services::credentials::CredentialStore;

struct RegisteredSource {
    capabilities: Capabilities,
    factory: Arc<dyn ProviderFactory>,
}

/// Maps source identifiers to the capabilities they support.
pub struct CapabilityRegistry {
    sources: HashMap<String, RegisteredSource>,
    credentials: Arc<CredentialStore>,
}

impl CapabilityRegistry {
    pub fn new(credentials: Arc<CredentialStore>) -> Self {
        Self {
            sources: HashMap::new(),
            credentials,
        }
    }

    pub fn register(
        &mut self,
        source: impl Into<String>,
        capabilities: Capabilities,
        factory: impl ProviderFactory + 'static,
    ) {
        let source = source.into();
        log::debug!("Registering source {} with {:?}", source, capabilities);
        self.sources.insert(
            source,
            RegisteredSource {
                capabilities,
                factory: Arc::new(factory),
            },
        );
    }

    pub fn contains(&self, source: &str) -> bool {
        self.sources.contains_key(source)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// A provider for `source` able to serve `capability`, or `None` when the
    /// source is unknown or lacks it. The provider is built with the credential
    /// as stored right now.
    pub fn lookup(&self, source: &str, capability: Capability) -> Option<Arc<dyn MusicProvider>> {
        let registered = self.sources.get(source)?;
        if !registered.capabilities.contains(capability.flag()) {
            return None;
        }
        let credential = self.credentials.get(source).unwrap_or_default();
        Some(registered.factory.create(&credential))
    }
}
