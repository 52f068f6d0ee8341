use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::services::aggregator::FanOut;
use crate::services::credentials::CredentialStore;
use crate::services::fallback::FallbackMatcher;
use crate::services::prober::HttpProber;
use crate::services::registry::CapabilityRegistry;
use crate::services::relay::StreamRelay;

pub struct AppState {
    pub registry: Arc<CapabilityRegistry>,
    pub credentials: Arc<CredentialStore>,
    pub fan_out: Arc<FanOut>,
    pub relay: Arc<StreamRelay>,
    pub prober: Arc<HttpProber>,
    pub matcher: FallbackMatcher,
}

impl AppState {
    pub fn new(
        registry: CapabilityRegistry,
        client: Client,
        fan_out_deadline: Duration,
        probe_timeout: Duration,
    ) -> Self {
        let registry = Arc::new(registry);
        let credentials = registry.credentials().clone();
        let fan_out = Arc::new(FanOut::new(registry.clone(), fan_out_deadline));
        let relay = Arc::new(StreamRelay::new(registry.clone(), client));
        let prober = Arc::new(HttpProber::new(relay.clone(), probe_timeout));
        let matcher = FallbackMatcher::new(fan_out.clone(), prober.clone());

        Self {
            registry,
            credentials,
            fan_out,
            relay,
            prober,
            matcher,
        }
    }
}
