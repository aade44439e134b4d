//! One provider's slot inside the manager
//!
//! A registration binds an adapter, its settings, and the currently
//! installed snapshot. The snapshot sits behind an `Arc` that is swapped as a
//! whole under a short write lock, so a reader either sees the previous
//! snapshot or the next one, never a mix of both.

use crate::config::CloudProviderConfig;
use crate::error::{Error, Result};
use crate::provider_name::CloudProviderName;
use crate::snapshot::IpRangeSnapshot;
use crate::traits::{IpRangeProvider, IpRangesFetcher};
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Result of refreshing one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PullOutcome {
    /// A new snapshot was installed
    Updated {
        /// Version of the installed snapshot
        version: String,
    },
    /// The fetched document carried the cached version; nothing was converted
    Unchanged {
        /// The cached version
        version: String,
    },
}

/// Point-in-time view of one registration, for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    /// The provider
    pub provider: CloudProviderName,
    /// Version of the installed snapshot
    pub version: String,
    /// Number of services in the installed snapshot
    pub service_count: usize,
    /// When the installed snapshot was converted
    pub installed_at: DateTime<Utc>,
    /// When the last fetch attempt finished
    pub last_attempt_at: DateTime<Utc>,
    /// Error of the last attempt, if it failed
    pub last_error: Option<String>,
    /// Failed attempts since the last successful one
    pub consecutive_failures: u32,
}

struct SlotState {
    snapshot: Arc<IpRangeSnapshot>,
    installed_at: DateTime<Utc>,
    last_attempt_at: DateTime<Utc>,
    last_error: Option<String>,
    consecutive_failures: u32,
}

pub(crate) struct ProviderRegistration {
    name: CloudProviderName,
    provider: Box<dyn IpRangeProvider>,
    config: CloudProviderConfig,
    state: RwLock<SlotState>,
    /// Serializes refreshes of this slot so an older fetch never lands last
    refresh_lock: Mutex<()>,
}

impl ProviderRegistration {
    /// Fetch and convert the first snapshot; the registration only exists on success
    pub(crate) async fn bootstrap(
        name: CloudProviderName,
        provider: Box<dyn IpRangeProvider>,
        config: CloudProviderConfig,
        fetcher: &dyn IpRangesFetcher,
        timeout: Duration,
    ) -> Result<Self> {
        let snapshot = fetch_and_convert(provider.as_ref(), fetcher, &config, timeout, None)
            .await?
            .ok_or_else(|| Error::conversion(name, "no snapshot produced"))?;
        let now = Utc::now();

        Ok(Self {
            name,
            provider,
            config,
            state: RwLock::new(SlotState {
                snapshot: Arc::new(snapshot),
                installed_at: now,
                last_attempt_at: now,
                last_error: None,
                consecutive_failures: 0,
            }),
            refresh_lock: Mutex::new(()),
        })
    }

    pub(crate) fn name(&self) -> CloudProviderName {
        self.name
    }

    /// Currently installed snapshot
    pub(crate) fn snapshot(&self) -> Arc<IpRangeSnapshot> {
        Arc::clone(&self.read().snapshot)
    }

    pub(crate) fn status(&self) -> ProviderStatus {
        let state = self.read();
        ProviderStatus {
            provider: self.name,
            version: state.snapshot.version().to_string(),
            service_count: state.snapshot.service_count(),
            installed_at: state.installed_at,
            last_attempt_at: state.last_attempt_at,
            last_error: state.last_error.clone(),
            consecutive_failures: state.consecutive_failures,
        }
    }

    /// Fetch the current document and install it if it carries a new version
    ///
    /// On failure the installed snapshot is kept and the error is recorded in
    /// the status before being returned.
    pub(crate) async fn refresh(
        &self,
        fetcher: &dyn IpRangesFetcher,
        timeout: Duration,
    ) -> Result<PullOutcome> {
        let _refresh = self.refresh_lock.lock().await;

        let cached = self.snapshot();
        let result = fetch_and_convert(
            self.provider.as_ref(),
            fetcher,
            &self.config,
            timeout,
            Some(cached.version()),
        )
        .await;

        let now = Utc::now();
        let mut state = self.write();
        state.last_attempt_at = now;

        match result {
            Ok(Some(snapshot)) => {
                let version = snapshot.version().to_string();
                state.snapshot = Arc::new(snapshot);
                state.installed_at = now;
                state.last_error = None;
                state.consecutive_failures = 0;
                Ok(PullOutcome::Updated { version })
            }
            Ok(None) => {
                state.last_error = None;
                state.consecutive_failures = 0;
                Ok(PullOutcome::Unchanged {
                    version: cached.version().to_string(),
                })
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                Err(e)
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SlotState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SlotState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fetch one document and convert it
///
/// Returns `Ok(None)` when `cached_version` is given and the adapter reports
/// the document carries that same version.
async fn fetch_and_convert(
    provider: &dyn IpRangeProvider,
    fetcher: &dyn IpRangesFetcher,
    config: &CloudProviderConfig,
    timeout: Duration,
    cached_version: Option<&str>,
) -> Result<Option<IpRangeSnapshot>> {
    let name = provider.provider_name();

    let document = match tokio::time::timeout(timeout, fetcher.fetch(&config.ip_ranges_url)).await {
        Ok(Ok(document)) => document,
        Ok(Err(e)) => return Err(Error::fetch(name, e.to_string())),
        Err(_) => {
            return Err(Error::Timeout {
                provider: name,
                after: timeout,
            });
        }
    };

    if let Some(cached_version) = cached_version
        && !provider
            .is_new_version(&document, cached_version)
            .map_err(|e| as_conversion(name, e))?
    {
        debug!("{} document still at version {}, skipping conversion", name, cached_version);
        return Ok(None);
    }

    provider
        .convert_to_generic_ip_ranges(&document)
        .map(Some)
        .map_err(|e| as_conversion(name, e))
}

fn as_conversion(name: CloudProviderName, err: Error) -> Error {
    match err {
        Error::Conversion { .. } => err,
        other => Error::conversion(name, other.to_string()),
    }
}
