use std::sync::Arc;

use conflux_common::{Error, Result};
use dashmap::DashMap;

use crate::{model::Provider, traits::ProviderConnector};

/// Known providers and their connectors, keyed by `provider_id`.
///
/// Grounded on the gateway's tool-registry pattern: a flat map plus
/// filtered-view helpers, generalized here to carry the connector alongside
/// the provider's static identity.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: DashMap<String, (Provider, Arc<dyn ProviderConnector>)>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, provider: Provider, connector: Arc<dyn ProviderConnector>) {
        self.entries.insert(provider.id.clone(), (provider, connector));
    }

    #[must_use]
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderConnector>> {
        self.entries.get(provider_id).map(|e| e.value().1.clone())
    }

    pub fn require(&self, provider_id: &str) -> Result<Arc<dyn ProviderConnector>> {
        self.get(provider_id).ok_or_else(|| Error::invalid_provider(provider_id))
    }

    #[must_use]
    pub fn is_known(&self, provider_id: &str) -> bool {
        self.entries.contains_key(provider_id)
    }

    /// Every registered provider, enabled or not — grounds `GET /api/sources`.
    #[must_use]
    pub fn describe_all(&self) -> Vec<Provider> {
        let mut out: Vec<_> = self.entries.iter().map(|e| e.value().0.clone()).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Providers enabled for a given principal — the planner's "configured
    /// providers" input (§4.8). This reference implementation treats every
    /// enabled provider as configured for every principal; a production
    /// deployment would intersect with the principal's connected accounts.
    #[must_use]
    pub fn enabled_provider_ids(&self) -> Vec<String> {
        self.entries.iter().filter(|e| e.value().0.enabled).map(|e| e.key().clone()).collect()
    }

    pub fn set_enabled(&self, provider_id: &str, enabled: bool) -> Result<()> {
        self.entries.get_mut(provider_id).map(|mut e| e.value_mut().0.enabled = enabled).ok_or_else(|| {
            Error::invalid_provider(provider_id)
        })
    }
}
