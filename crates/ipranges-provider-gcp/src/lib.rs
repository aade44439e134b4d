// # GCP IP Range Adapter
//
// This crate converts Google's published IP range document (`goog.json`)
// into a generic `IpRangeSnapshot` for the ipranges system.
//
// ## Document Format
//
// ```json
// {
//   "syncToken": "1700000000000",
//   "creationTime": "2023-11-14T22:13:20.000000",
//   "prefixes": [
//     { "ipv4Prefix": "8.8.4.0/24" },
//     { "ipv6Prefix": "2001:4860::/32" }
//   ]
// }
// ```
//
// ## Mapping
//
// Google does not break its ranges down per service, so the snapshot holds a
// single service, [`GOOGLE_SERVICE`], with every `ipv4Prefix` in document
// order. Version is `syncToken`.

use ipranges_core::{
    CloudProviderConfig, CloudProviderName, Error, IpRangeProvider, IpRangeProviderFactory,
    IpRangeSnapshot, ProviderRegistry, Result,
};
use serde::Deserialize;
use tracing::debug;

/// Name of the only service published for GCP
pub const GOOGLE_SERVICE: &str = "Google";

#[derive(Deserialize)]
struct GoogleDocument {
    #[serde(rename = "syncToken")]
    sync_token: Option<String>,
    #[serde(default)]
    prefixes: Vec<GooglePrefix>,
}

#[derive(Deserialize)]
struct GooglePrefix {
    #[serde(rename = "ipv4Prefix")]
    ipv4_prefix: Option<String>,
}

#[derive(Deserialize)]
struct GoogleVersion {
    #[serde(rename = "syncToken")]
    sync_token: Option<String>,
}

/// GCP document adapter
#[derive(Debug, Default, Clone, Copy)]
pub struct GcpIpRanges;

impl GcpIpRanges {
    pub fn new() -> Self {
        Self
    }
}

fn parse<'a, T: Deserialize<'a>>(document: &'a [u8]) -> Result<T> {
    serde_json::from_slice(document).map_err(|e| {
        Error::conversion(CloudProviderName::Gcp, format!("invalid document: {}", e))
    })
}

fn sync_token(token: Option<String>) -> Result<String> {
    token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| Error::conversion(CloudProviderName::Gcp, "document has no syncToken"))
}

impl IpRangeProvider for GcpIpRanges {
    fn provider_name(&self) -> CloudProviderName {
        CloudProviderName::Gcp
    }

    fn convert_to_generic_ip_ranges(&self, document: &[u8]) -> Result<IpRangeSnapshot> {
        let document: GoogleDocument = parse(document)?;
        let version = sync_token(document.sync_token)?;

        let ranges: Vec<String> = document
            .prefixes
            .into_iter()
            .filter_map(|prefix| prefix.ipv4_prefix)
            .collect();

        if ranges.is_empty() {
            return Err(Error::conversion(
                CloudProviderName::Gcp,
                "document has no ipv4Prefix",
            ));
        }

        debug!("Converted GCP document {} ({} ranges)", version, ranges.len());

        IpRangeSnapshot::from_services(version, [(GOOGLE_SERVICE, ranges)])
            .map_err(|e| Error::conversion(CloudProviderName::Gcp, e.to_string()))
    }

    fn is_new_version(&self, document: &[u8], cached_version: &str) -> Result<bool> {
        let document: GoogleVersion = parse(document)?;
        Ok(sync_token(document.sync_token)? != cached_version)
    }
}

/// Factory for creating GCP adapters
pub struct GcpFactory;

impl IpRangeProviderFactory for GcpFactory {
    fn create(&self, _config: &CloudProviderConfig) -> Result<Box<dyn IpRangeProvider>> {
        Ok(Box::new(GcpIpRanges::new()))
    }
}

/// Register the GCP adapter with a registry
///
/// # Example
///
/// ```rust
/// use ipranges_core::{CloudProviderName, ProviderRegistry};
///
/// let registry = ProviderRegistry::new();
/// ipranges_provider_gcp::register(&registry);
/// assert!(registry.has_provider(CloudProviderName::Gcp));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider(CloudProviderName::Gcp, Box::new(GcpFactory));
}
