//! Cloud provider IP range manager
//!
//! The IpRangeManager is responsible for:
//! - Creating one registration per enabled provider at startup
//! - Pulling every provider's document on a fixed interval
//! - Installing new snapshots atomically, per provider
//! - Serving read queries concurrently with refreshes
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │  IpRangeManager  │◄──── get_service_list / get_services_ip_ranges
//!                  └──────────────────┘
//!                           │ pull_ip_ranges (every interval)
//!         ┌─────────────────┼─────────────────┐
//!         ▼                 ▼                 ▼
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │ AWS slot     │  │ GCP slot     │  │ Datadog slot │
//! │ fetch→convert│  │ fetch→convert│  │ fetch→convert│
//! └──────────────┘  └──────────────┘  └──────────────┘
//! ```
//!
//! ## Failure Isolation
//!
//! Each provider is its own consistency domain. A provider that fails its
//! first pull is never registered; a provider that fails a later refresh
//! keeps serving its previous snapshot.

mod periodic;
mod registration;

pub use periodic::PeriodicPullHandle;
pub use registration::ProviderStatus;
use registration::PullOutcome;

use crate::config::CloudProvidersConfig;
use crate::error::{Error, ProviderFailure, Result};
use crate::provider_name::CloudProviderName;
use crate::registry::ProviderRegistry;
use crate::snapshot::IpRangeSnapshot;
use crate::traits::IpRangesFetcher;
use futures::future::join_all;
use registration::ProviderRegistration;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cache of cloud provider IP ranges
///
/// ## Lifecycle
///
/// 1. Create with [`IpRangeManager::new()`], which performs the initial pull
/// 2. Wrap in an `Arc` and start [`IpRangeManager::start_periodic_pull()`]
/// 3. Share the `Arc` with every reader
/// 4. Stop with [`PeriodicPullHandle::shutdown()`]
///
/// ## Threading
///
/// The provider map is fixed at construction. Each slot carries its own
/// lock, so reads never wait on each other and only briefly wait on the
/// swap of the slot they read.
pub struct IpRangeManager {
    /// Registered providers (only those that are enabled and bootstrapped)
    providers: HashMap<CloudProviderName, Arc<ProviderRegistration>>,

    /// Shared document fetcher
    fetcher: Arc<dyn IpRangesFetcher>,

    /// Interval between refresh cycles
    pull_interval: Duration,

    /// Upper bound of a single fetch
    fetch_timeout: Duration,
}

impl IpRangeManager {
    /// Create a new manager and pull every enabled provider once
    ///
    /// Providers are bootstrapped concurrently. A provider whose adapter
    /// cannot be created, or whose first fetch or conversion fails, is left
    /// out and logged; it will not be retried.
    ///
    /// # Returns
    ///
    /// - `Ok(IpRangeManager)`: Possibly with no provider at all
    /// - `Err(Error::Config)`: If the configuration is malformed
    pub async fn new(
        config: CloudProvidersConfig,
        registry: &ProviderRegistry,
        fetcher: Arc<dyn IpRangesFetcher>,
    ) -> Result<Self> {
        config.validate()?;

        let mut manager = Self {
            providers: HashMap::new(),
            fetcher,
            pull_interval: config.pull_interval(),
            fetch_timeout: config.fetch_timeout(),
        };

        if config.disable_all {
            info!("All cloud providers disabled, ip ranges will not be pulled");
            return Ok(manager);
        }

        let enabled = config.enabled_providers();
        let mut bootstraps = Vec::with_capacity(enabled.len());
        for name in &enabled {
            let provider_config = config.provider(*name).clone();
            match registry.create_provider(*name, &provider_config) {
                Ok(provider) => bootstraps.push(bootstrap(
                    *name,
                    provider,
                    provider_config,
                    Arc::clone(&manager.fetcher),
                    manager.fetch_timeout,
                )),
                Err(e) => warn!("Skipping cloud provider {}: {}", name, e),
            }
        }

        for (name, result) in join_all(bootstraps).await {
            match result {
                Ok(registration) => {
                    let snapshot = registration.snapshot();
                    info!(
                        "Registered cloud provider {} (version {}, {} services)",
                        name,
                        snapshot.version(),
                        snapshot.service_count()
                    );
                    manager.providers.insert(name, Arc::new(registration));
                }
                Err(e) => warn!("Skipping cloud provider {}: initial pull failed: {}", name, e),
            }
        }

        if manager.providers.is_empty() && !enabled.is_empty() {
            warn!("No cloud provider could be initialized, ip range queries will return no data");
        }

        Ok(manager)
    }

    /// Refresh every registered provider once
    ///
    /// Providers are refreshed concurrently and independently. A provider
    /// that fails keeps its previous snapshot.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Every provider refreshed (or was already up to date)
    /// - `Err(Error::PullFailed)`: Names every provider that failed this cycle;
    ///   all other providers were still refreshed
    pub async fn pull_ip_ranges(&self) -> Result<()> {
        let refreshes = self.providers.values().map(|registration| async move {
            let result = registration
                .refresh(self.fetcher.as_ref(), self.fetch_timeout)
                .await;
            (registration.name(), result)
        });

        let mut failures = Vec::new();
        for (name, result) in join_all(refreshes).await {
            match result {
                Ok(PullOutcome::Updated { version }) => {
                    info!("Installed {} ip ranges version {}", name, version);
                }
                Ok(PullOutcome::Unchanged { version }) => {
                    debug!("{} ip ranges unchanged at version {}", name, version);
                }
                Err(e) => {
                    warn!("Failed to refresh {} ip ranges, keeping previous snapshot: {}", name, e);
                    failures.push(ProviderFailure {
                        provider: name,
                        message: e.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort_by_key(|failure| failure.provider);
            Err(Error::PullFailed(failures))
        }
    }

    /// Service names of a provider, in document order
    ///
    /// Empty for a provider with no registration.
    pub fn get_service_list(&self, provider: CloudProviderName) -> Vec<String> {
        self.snapshot(provider)
            .map(|snapshot| snapshot.service_list().to_vec())
            .unwrap_or_default()
    }

    /// IP ranges of the requested services of a provider
    ///
    /// Each returned list is exactly as cached. A requested service that the
    /// provider does not publish is left out of the result.
    ///
    /// # Returns
    ///
    /// - `Ok(HashMap)`: Requested services that exist, with their CIDR lists
    /// - `Err(Error::UnknownProvider)`: If the provider has no registration
    pub fn get_services_ip_ranges<S: AsRef<str>>(
        &self,
        provider: CloudProviderName,
        service_names: &[S],
    ) -> Result<HashMap<String, Vec<String>>> {
        let snapshot = self
            .snapshot(provider)
            .ok_or(Error::UnknownProvider(provider))?;

        Ok(snapshot.select(service_names))
    }

    /// Currently installed snapshot of a provider
    ///
    /// The returned value stays consistent even if a refresh installs a newer
    /// snapshot afterwards.
    pub fn snapshot(&self, provider: CloudProviderName) -> Option<Arc<IpRangeSnapshot>> {
        self.providers
            .get(&provider)
            .map(|registration| registration.snapshot())
    }

    /// Monitoring view of a provider's slot
    pub fn provider_status(&self, provider: CloudProviderName) -> Option<ProviderStatus> {
        self.providers
            .get(&provider)
            .map(|registration| registration.status())
    }

    /// Registered providers, sorted
    pub fn registered_providers(&self) -> Vec<CloudProviderName> {
        let mut names: Vec<_> = self.providers.keys().copied().collect();
        names.sort();
        names
    }

    /// Whether a provider has a registration
    pub fn is_registered(&self, provider: CloudProviderName) -> bool {
        self.providers.contains_key(&provider)
    }

    /// Configured interval between refresh cycles
    pub fn pull_interval(&self) -> Duration {
        self.pull_interval
    }
}

impl std::fmt::Debug for IpRangeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpRangeManager")
            .field("providers", &self.registered_providers())
            .field("pull_interval", &self.pull_interval)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

async fn bootstrap(
    name: CloudProviderName,
    provider: Box<dyn crate::traits::IpRangeProvider>,
    config: crate::config::CloudProviderConfig,
    fetcher: Arc<dyn IpRangesFetcher>,
    timeout: Duration,
) -> (CloudProviderName, Result<ProviderRegistration>) {
    let result =
        ProviderRegistration::bootstrap(name, provider, config, fetcher.as_ref(), timeout).await;
    (name, result)
}
