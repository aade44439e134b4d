// # Datadog IP Range Adapter
//
// This crate converts the Datadog published IP range document into a generic
// `IpRangeSnapshot` for the ipranges system.
//
// ## Document Format
//
// ```json
// {
//   "version": 68,
//   "modified": "2023-11-14-22-13-20",
//   "agents": { "prefixes_ipv4": ["3.233.144.0/20"], "prefixes_ipv6": [] },
//   "api":    { "prefixes_ipv4": ["3.233.144.0/20"], "prefixes_ipv6": [] },
//   "synthetics": { "prefixes_ipv4": [...], "prefixes_ipv4_by_location": {...} }
// }
// ```
//
// ## Mapping
//
// - Version: the numeric `version`, rendered as a string
// - Services: every top-level object carrying `prefixes_ipv4`, in document
//   order (relies on `serde_json`'s `preserve_order` feature)
// - Ranges: that object's `prefixes_ipv4`
//
// The service set is open: Datadog adds services without notice, so nothing
// here names them.

use ipranges_core::{
    CloudProviderConfig, CloudProviderName, Error, IpRangeProvider, IpRangeProviderFactory,
    IpRangeSnapshot, ProviderRegistry, Result,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Key of the IPv4 prefix list inside a service object
const IPV4_PREFIXES: &str = "prefixes_ipv4";

#[derive(Deserialize)]
struct DatadogVersion {
    version: Option<Value>,
}

/// Datadog document adapter
#[derive(Debug, Default, Clone, Copy)]
pub struct DatadogIpRanges;

impl DatadogIpRanges {
    pub fn new() -> Self {
        Self
    }
}

fn conversion(message: impl Into<String>) -> Error {
    Error::conversion(CloudProviderName::Datadog, message)
}

fn render_version(version: Option<&Value>) -> Result<String> {
    match version {
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(conversion("document has no version")),
    }
}

fn ipv4_prefixes(service: &str, prefixes: &Value) -> Result<Vec<String>> {
    let prefixes = prefixes
        .as_array()
        .ok_or_else(|| conversion(format!("{service}.{IPV4_PREFIXES} is not a list")))?;

    prefixes
        .iter()
        .map(|prefix| {
            prefix
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| conversion(format!("{service}.{IPV4_PREFIXES} holds a non-string")))
        })
        .collect()
}

impl IpRangeProvider for DatadogIpRanges {
    fn provider_name(&self) -> CloudProviderName {
        CloudProviderName::Datadog
    }

    fn convert_to_generic_ip_ranges(&self, document: &[u8]) -> Result<IpRangeSnapshot> {
        let document: Map<String, Value> = serde_json::from_slice(document)
            .map_err(|e| conversion(format!("invalid document: {}", e)))?;
        let version = render_version(document.get("version"))?;

        let mut services = Vec::new();
        for (name, body) in &document {
            if let Some(prefixes) = body.get(IPV4_PREFIXES) {
                services.push((name.clone(), ipv4_prefixes(name, prefixes)?));
            }
        }

        if services.is_empty() {
            return Err(conversion("document lists no service"));
        }

        debug!(
            "Converted Datadog document {} ({} services)",
            version,
            services.len()
        );

        IpRangeSnapshot::from_services(version, services).map_err(|e| conversion(e.to_string()))
    }

    fn is_new_version(&self, document: &[u8], cached_version: &str) -> Result<bool> {
        let document: DatadogVersion = serde_json::from_slice(document)
            .map_err(|e| conversion(format!("invalid document: {}", e)))?;

        Ok(render_version(document.version.as_ref())? != cached_version)
    }
}

/// Factory for creating Datadog adapters
pub struct DatadogFactory;

impl IpRangeProviderFactory for DatadogFactory {
    fn create(&self, _config: &CloudProviderConfig) -> Result<Box<dyn IpRangeProvider>> {
        Ok(Box::new(DatadogIpRanges::new()))
    }
}

/// Register the Datadog adapter with a registry
///
/// # Example
///
/// ```rust
/// use ipranges_core::{CloudProviderName, ProviderRegistry};
///
/// let registry = ProviderRegistry::new();
/// ipranges_provider_datadog::register(&registry);
/// assert!(registry.has_provider(CloudProviderName::Datadog));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider(CloudProviderName::Datadog, Box::new(DatadogFactory));
}
