// # IP Range Provider Trait
//
// Defines the interface for turning a provider's published IP range document
// into a generic [`IpRangeSnapshot`].
//
// ## Implementations
//
// - AWS: `ipranges-provider-aws` crate
// - GCP: `ipranges-provider-gcp` crate
// - Datadog: `ipranges-provider-datadog` crate
//
// ## Usage
//
// ```rust,ignore
// use ipranges_core::IpRangeProvider;
//
// let provider = /* IpRangeProvider implementation */;
//
// if provider.is_new_version(&document, cached.version())? {
//     let snapshot = provider.convert_to_generic_ip_ranges(&document)?;
// }
// ```

use crate::config::CloudProviderConfig;
use crate::provider_name::CloudProviderName;
use crate::snapshot::IpRangeSnapshot;

/// Trait for provider adapter implementations
///
/// An adapter knows one provider's document format and nothing else.
///
/// # Thread Safety
///
/// Implementations must be thread-safe: the manager converts documents of
/// different providers concurrently and shares adapters across tasks.
///
/// # Responsibilities
///
/// Adapters are pure converters:
/// - ✅ Parse the provider-specific document
/// - ✅ Decide which published ranges make up each service
/// - ❌ Fetch documents (owned by `IpRangesFetcher`)
/// - ❌ Cache snapshots or schedule refreshes (owned by `IpRangeManager`)
/// - ❌ Retry (a failed refresh keeps the previous snapshot until the next cycle)
pub trait IpRangeProvider: Send + Sync {
    /// Provider this adapter converts documents for
    fn provider_name(&self) -> CloudProviderName;

    /// Convert a raw document into a full snapshot
    ///
    /// # Returns
    ///
    /// - `Ok(IpRangeSnapshot)`: The parsed snapshot
    /// - `Err(Error::Conversion)`: Malformed document or unsupported schema
    fn convert_to_generic_ip_ranges(&self, document: &[u8]) -> crate::Result<IpRangeSnapshot>;

    /// Check whether `document` carries a version other than `cached_version`
    ///
    /// Lets the manager skip a full conversion when nothing changed. Skipping
    /// must be equivalent to converting and getting the cached snapshot back,
    /// so an implementation must only return `false` when the versions match.
    ///
    /// The default always asks for a conversion.
    fn is_new_version(&self, document: &[u8], cached_version: &str) -> crate::Result<bool> {
        let _ = (document, cached_version);
        Ok(true)
    }
}

/// Helper trait for constructing adapters from configuration
pub trait IpRangeProviderFactory: Send + Sync {
    /// Create an adapter for the given provider settings
    ///
    /// # Returns
    ///
    /// A boxed IpRangeProvider trait object
    fn create(&self, config: &CloudProviderConfig) -> crate::Result<Box<dyn IpRangeProvider>>;
}
