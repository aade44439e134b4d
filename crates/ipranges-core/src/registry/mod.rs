//! Plugin-based adapter registry
//!
//! The registry allows provider adapters to be registered dynamically at
//! runtime, so the manager never names a concrete adapter type.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ipranges_core::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//!
//! // Adapter crates register themselves
//! ipranges_provider_aws::register(&registry);
//!
//! // The manager creates adapters from config
//! let adapter = registry.create_provider(CloudProviderName::Aws, &config.aws)?;
//! ```

use crate::config::CloudProviderConfig;
use crate::error::{Error, Result};
use crate::provider_name::CloudProviderName;
use crate::traits::{IpRangeProvider, IpRangeProviderFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Adapter registry keyed by provider
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<CloudProviderName, Box<dyn IpRangeProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter factory, replacing any previous one for `name`
    pub fn register_provider(&self, name: CloudProviderName, factory: Box<dyn IpRangeProviderFactory>) {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.insert(name, factory);
    }

    /// Create an adapter for `name` from its settings
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn IpRangeProvider>)`: Created adapter
    /// - `Err(Error)`: If no factory is registered or creation fails
    pub fn create_provider(
        &self,
        name: CloudProviderName,
        config: &CloudProviderConfig,
    ) -> Result<Box<dyn IpRangeProvider>> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(&name)
            .ok_or_else(|| Error::config(format!("No adapter registered for provider {name}")))?;

        let provider = factory.create(config)?;
        if provider.provider_name() != name {
            return Err(Error::config(format!(
                "Adapter registered for {name} reports itself as {}",
                provider.provider_name()
            )));
        }

        Ok(provider)
    }

    /// List all registered providers, sorted
    pub fn list_providers(&self) -> Vec<CloudProviderName> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = providers.keys().copied().collect();
        names.sort();
        names
    }

    /// Check if an adapter is registered for `name`
    pub fn has_provider(&self, name: CloudProviderName) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(&name)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_providers())
            .finish()
    }
}
