// # ipranges-core
//
// Core library for caching the IP ranges published by cloud providers.
//
// ## Architecture Overview
//
// This library keeps an up-to-date, in-memory copy of the IP range documents
// published by cloud providers, so that safety checks can compute which
// ranges a network disruption must never block:
// - **IpRangeProvider**: Trait converting one provider's document into a snapshot
// - **IpRangesFetcher**: Trait retrieving raw documents
// - **IpRangeSnapshot**: Immutable parsed state of one provider
// - **IpRangeManager**: Owns one slot per enabled provider, refreshes them
//   periodically, and serves queries
// - **ProviderRegistry**: Plugin-based registry for provider adapters
//
// ## Design Principles
//
// 1. **Plugin-Based**: Adapters are registered dynamically, the manager names no concrete provider
// 2. **Failure Isolation**: One provider failing never affects another
// 3. **Atomic Refresh**: Snapshots are swapped whole, never mutated in place
// 4. **Stale Over Absent**: A failed refresh keeps the previous snapshot
// 5. **Deterministic Shutdown**: The refresh loop stops on an explicit signal

pub mod allowlist;
pub mod config;
pub mod error;
pub mod manager;
pub mod provider_name;
pub mod registry;
pub mod snapshot;
pub mod traits;

// Re-export core types for convenience
pub use allowlist::CloudServiceSelection;
pub use config::{CloudProviderConfig, CloudProvidersConfig};
pub use error::{Error, ProviderFailure, Result};
pub use manager::{IpRangeManager, PeriodicPullHandle, ProviderStatus};
pub use provider_name::CloudProviderName;
pub use registry::ProviderRegistry;
pub use snapshot::IpRangeSnapshot;
pub use traits::{IpRangeProvider, IpRangeProviderFactory, IpRangesFetcher};
