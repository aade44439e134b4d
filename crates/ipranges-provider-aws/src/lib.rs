// # AWS IP Range Adapter
//
// This crate converts the AWS published IP range document into a generic
// `IpRangeSnapshot` for the ipranges system.
//
// ## Document Format
//
// ```json
// {
//   "syncToken": "1700000000",
//   "createDate": "2023-11-14-22-13-20",
//   "prefixes": [
//     { "ip_prefix": "3.5.140.0/22", "region": "ap-northeast-2",
//       "service": "AMAZON", "network_border_group": "ap-northeast-2" },
//     { "ip_prefix": "52.95.245.0/24", "region": "us-east-1",
//       "service": "S3", "network_border_group": "us-east-1" }
//   ],
//   "ipv6_prefixes": [ ... ]
// }
// ```
//
// ## Mapping
//
// - Version: `syncToken`
// - Services: every distinct `prefixes[].service`, in order of first
//   appearance, except `AMAZON` (the aggregate of all Amazon ranges)
// - Ranges: the IPv4 `ip_prefix` values of each service, in document order
//
// `ipv6_prefixes` is ignored: disruptions only filter IPv4 destinations.
//
// ## API Reference
//
// - https://docs.aws.amazon.com/vpc/latest/userguide/aws-ip-ranges.html

use ipranges_core::{
    CloudProviderConfig, CloudProviderName, Error, IpRangeProvider, IpRangeProviderFactory,
    IpRangeSnapshot, ProviderRegistry, Result,
};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Service name AWS uses for the aggregate of every Amazon range
pub const AGGREGATE_SERVICE: &str = "AMAZON";

#[derive(Deserialize)]
struct AwsDocument {
    #[serde(rename = "syncToken")]
    sync_token: Option<String>,
    #[serde(default)]
    prefixes: Vec<AwsPrefix>,
}

#[derive(Deserialize)]
struct AwsPrefix {
    ip_prefix: String,
    service: String,
}

/// Only the version field, for the cheap version check
#[derive(Deserialize)]
struct AwsVersion {
    #[serde(rename = "syncToken")]
    sync_token: Option<String>,
}

/// AWS document adapter
#[derive(Debug, Default, Clone, Copy)]
pub struct AwsIpRanges;

impl AwsIpRanges {
    pub fn new() -> Self {
        Self
    }
}

fn sync_token(token: Option<String>) -> Result<String> {
    match token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(Error::conversion(
            CloudProviderName::Aws,
            "document has no syncToken",
        )),
    }
}

impl IpRangeProvider for AwsIpRanges {
    fn provider_name(&self) -> CloudProviderName {
        CloudProviderName::Aws
    }

    fn convert_to_generic_ip_ranges(&self, document: &[u8]) -> Result<IpRangeSnapshot> {
        let document: AwsDocument = serde_json::from_slice(document).map_err(|e| {
            Error::conversion(CloudProviderName::Aws, format!("invalid document: {}", e))
        })?;
        let version = sync_token(document.sync_token)?;

        let mut services: Vec<(String, Vec<String>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for prefix in document.prefixes {
            if prefix.service == AGGREGATE_SERVICE {
                continue;
            }

            match index.get(&prefix.service) {
                Some(&i) => services[i].1.push(prefix.ip_prefix),
                None => {
                    index.insert(prefix.service.clone(), services.len());
                    services.push((prefix.service, vec![prefix.ip_prefix]));
                }
            }
        }

        if services.is_empty() {
            return Err(Error::conversion(
                CloudProviderName::Aws,
                "document lists no service besides AMAZON",
            ));
        }

        debug!(
            "Converted AWS document {} ({} services)",
            version,
            services.len()
        );

        IpRangeSnapshot::from_services(version, services)
            .map_err(|e| Error::conversion(CloudProviderName::Aws, e.to_string()))
    }

    fn is_new_version(&self, document: &[u8], cached_version: &str) -> Result<bool> {
        let document: AwsVersion = serde_json::from_slice(document).map_err(|e| {
            Error::conversion(CloudProviderName::Aws, format!("invalid document: {}", e))
        })?;

        Ok(sync_token(document.sync_token)? != cached_version)
    }
}

/// Factory for creating AWS adapters
pub struct AwsFactory;

impl IpRangeProviderFactory for AwsFactory {
    fn create(&self, _config: &CloudProviderConfig) -> Result<Box<dyn IpRangeProvider>> {
        Ok(Box::new(AwsIpRanges::new()))
    }
}

/// Register the AWS adapter with a registry
///
/// # Example
///
/// ```rust
/// use ipranges_core::{CloudProviderName, ProviderRegistry};
///
/// let registry = ProviderRegistry::new();
/// ipranges_provider_aws::register(&registry);
/// assert!(registry.has_provider(CloudProviderName::Aws));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider(CloudProviderName::Aws, Box::new(AwsFactory));
}
