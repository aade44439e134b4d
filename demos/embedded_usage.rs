//! Minimal embedding example for ipranges-core
//!
//! This example demonstrates using ipranges-core as a library with a custom
//! adapter and an in-memory fetcher. The refresh loop lifecycle is fully
//! managed by the application.

use ipranges_core::{
    CloudProviderConfig, CloudProviderName, CloudProvidersConfig, CloudServiceSelection, Error,
    IpRangeManager, IpRangeProvider, IpRangeProviderFactory, IpRangeSnapshot, IpRangesFetcher,
    ProviderRegistry, Result,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Document URL served by the in-memory fetcher
const INVENTORY_URL: &str = "http://inventory.local/ip-ranges.json";

/// Adapter for a flat `{"revision": "..", "services": {"name": [cidr]}}` document
struct InventoryAdapter;

impl IpRangeProvider for InventoryAdapter {
    fn provider_name(&self) -> CloudProviderName {
        CloudProviderName::Aws
    }

    fn convert_to_generic_ip_ranges(&self, document: &[u8]) -> Result<IpRangeSnapshot> {
        let document: serde_json::Value = serde_json::from_slice(document)?;

        let revision = document["revision"]
            .as_str()
            .ok_or_else(|| Error::conversion(CloudProviderName::Aws, "missing revision"))?;
        let services = document["services"]
            .as_object()
            .ok_or_else(|| Error::conversion(CloudProviderName::Aws, "missing services"))?;

        IpRangeSnapshot::from_services(
            revision,
            services.iter().map(|(name, ranges)| {
                let ranges: Vec<String> = ranges
                    .as_array()
                    .map(|list| {
                        list.iter()
                            .filter_map(|r| r.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                (name.clone(), ranges)
            }),
        )
    }

    fn is_new_version(&self, document: &[u8], cached_version: &str) -> Result<bool> {
        let document: serde_json::Value = serde_json::from_slice(document)?;
        Ok(document["revision"].as_str() != Some(cached_version))
    }
}

struct InventoryFactory;

impl IpRangeProviderFactory for InventoryFactory {
    fn create(&self, _config: &CloudProviderConfig) -> Result<Box<dyn IpRangeProvider>> {
        Ok(Box::new(InventoryAdapter))
    }
}

/// Fetcher serving documents from memory
#[derive(Default)]
struct MemoryFetcher {
    documents: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryFetcher {
    fn publish(&self, url: &str, document: serde_json::Value) {
        self.documents
            .lock()
            .unwrap()
            .insert(url.to_string(), document.to_string().into_bytes());
    }
}

#[async_trait::async_trait]
impl IpRangesFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.documents
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::http(format!("nothing published at {url}")))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    println!("=== Embedded ipranges-core Example ===\n");

    // Register the custom adapter in place of the AWS one
    let registry = ProviderRegistry::new();
    registry.register_provider(CloudProviderName::Aws, Box::new(InventoryFactory));

    let fetcher = Arc::new(MemoryFetcher::default());
    fetcher.publish(
        INVENTORY_URL,
        serde_json::json!({
            "revision": "r1",
            "services": {
                "control-plane": ["10.0.0.0/24"],
                "registry": ["10.0.1.0/24", "10.0.2.0/24"]
            }
        }),
    );

    let mut config = CloudProvidersConfig {
        pull_interval_secs: 1,
        ..CloudProvidersConfig::default()
    };
    config.aws = CloudProviderConfig::new(INVENTORY_URL);
    config.gcp.enabled = false;
    config.datadog.enabled = false;

    println!("1. Creating manager...");
    let manager = Arc::new(IpRangeManager::new(config, &registry, fetcher.clone()).await?);
    println!(
        "   services: {:?}",
        manager.get_service_list(CloudProviderName::Aws)
    );

    println!("2. Starting periodic pull in background...");
    let handle = manager.start_periodic_pull()?;

    println!("3. Publishing revision r2...");
    fetcher.publish(
        INVENTORY_URL,
        serde_json::json!({
            "revision": "r2",
            "services": {
                "control-plane": ["10.0.0.0/24", "10.0.8.0/24"],
                "registry": ["10.0.1.0/24"]
            }
        }),
    );
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let ranges = manager.get_services_ip_ranges(CloudProviderName::Aws, &["control-plane"])?;
    println!("   control-plane now: {:?}", ranges["control-plane"]);

    let allowlist = manager.resolve_allowlist(&[CloudServiceSelection::new(
        CloudProviderName::Aws,
        ["control-plane", "registry"],
    )])?;
    println!("4. Allow-list: {:?}", allowlist);

    println!("5. Stopping periodic pull...");
    handle.shutdown().await?;

    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- Refresh lifecycle is fully controlled by application");
    println!("- Adapters and fetchers are plain trait objects");
    println!("- No global state");

    Ok(())
}
