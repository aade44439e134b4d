//! Test doubles and common utilities for contract tests
//!
//! This module provides a fixture adapter that parses a tiny JSON format and
//! a scripted fetcher whose answers the tests control per URL.

#![allow(dead_code)]

use ipranges_core::config::{
    DEFAULT_AWS_IP_RANGES_URL, DEFAULT_DATADOG_IP_RANGES_URL, DEFAULT_GCP_IP_RANGES_URL,
};
use ipranges_core::{
    CloudProviderConfig, CloudProviderName, CloudProvidersConfig, Error, IpRangeProvider,
    IpRangeProviderFactory, IpRangeSnapshot, IpRangesFetcher, ProviderRegistry, Result,
};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Document format understood by [`FixtureProvider`]
#[derive(Deserialize)]
struct FixtureDocument {
    version: String,
    services: Vec<FixtureService>,
}

#[derive(Deserialize)]
struct FixtureService {
    name: String,
    ranges: Vec<String>,
}

#[derive(Deserialize)]
struct FixtureVersion {
    version: String,
}

/// Build a fixture document
pub fn fixture_document(version: &str, services: &[(&str, &[&str])]) -> Vec<u8> {
    let services: Vec<_> = services
        .iter()
        .map(|(name, ranges)| serde_json::json!({ "name": name, "ranges": ranges }))
        .collect();

    serde_json::to_vec(&serde_json::json!({ "version": version, "services": services }))
        .expect("fixture serializes")
}

/// Call counters shared by every adapter a factory creates
#[derive(Default)]
pub struct AdapterCounters {
    convert_calls: AtomicUsize,
    version_checks: AtomicUsize,
}

impl AdapterCounters {
    pub fn convert_calls(&self) -> usize {
        self.convert_calls.load(Ordering::SeqCst)
    }

    pub fn version_checks(&self) -> usize {
        self.version_checks.load(Ordering::SeqCst)
    }
}

/// An adapter for the fixture document format
pub struct FixtureProvider {
    name: CloudProviderName,
    counters: Arc<AdapterCounters>,
}

impl IpRangeProvider for FixtureProvider {
    fn provider_name(&self) -> CloudProviderName {
        self.name
    }

    fn convert_to_generic_ip_ranges(&self, document: &[u8]) -> Result<IpRangeSnapshot> {
        self.counters.convert_calls.fetch_add(1, Ordering::SeqCst);

        let document: FixtureDocument = serde_json::from_slice(document)
            .map_err(|e| Error::conversion(self.name, e.to_string()))?;

        IpRangeSnapshot::from_services(
            document.version,
            document.services.into_iter().map(|s| (s.name, s.ranges)),
        )
    }

    fn is_new_version(&self, document: &[u8], cached_version: &str) -> Result<bool> {
        self.counters.version_checks.fetch_add(1, Ordering::SeqCst);

        let document: FixtureVersion = serde_json::from_slice(document)
            .map_err(|e| Error::conversion(self.name, e.to_string()))?;
        Ok(document.version != cached_version)
    }
}

/// Factory handing out [`FixtureProvider`]s
pub struct FixtureFactory {
    name: CloudProviderName,
    counters: Arc<AdapterCounters>,
}

impl IpRangeProviderFactory for FixtureFactory {
    fn create(&self, _config: &CloudProviderConfig) -> Result<Box<dyn IpRangeProvider>> {
        Ok(Box::new(FixtureProvider {
            name: self.name,
            counters: Arc::clone(&self.counters),
        }))
    }
}

/// Registry with a fixture adapter for every provider
pub fn fixture_registry() -> (ProviderRegistry, HashMap<CloudProviderName, Arc<AdapterCounters>>) {
    let registry = ProviderRegistry::new();
    let mut counters = HashMap::new();

    for name in CloudProviderName::ALL {
        let shared = Arc::new(AdapterCounters::default());
        registry.register_provider(
            name,
            Box::new(FixtureFactory {
                name,
                counters: Arc::clone(&shared),
            }),
        );
        counters.insert(name, shared);
    }

    (registry, counters)
}

/// Registry with fixture adapters for the given providers only
pub fn fixture_registry_for(names: &[CloudProviderName]) -> ProviderRegistry {
    let registry = ProviderRegistry::new();
    for name in names {
        registry.register_provider(
            *name,
            Box::new(FixtureFactory {
                name: *name,
                counters: Arc::new(AdapterCounters::default()),
            }),
        );
    }
    registry
}

/// How the scripted fetcher answers one URL
#[derive(Clone)]
pub enum Scripted {
    /// Return this document
    Document(Vec<u8>),
    /// Fail with an HTTP error
    Fail(String),
    /// Sleep, then return this document
    Delayed(Duration, Vec<u8>),
}

/// A fetcher whose answers are set per URL by the test
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the answer for a URL
    pub fn set(&self, url: &str, response: Scripted) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    /// Set the answer for a provider's default URL
    pub fn set_provider(&self, name: CloudProviderName, response: Scripted) {
        self.set(default_url(name), response);
    }

    /// Number of fetches of a URL
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Number of fetches of a provider's default URL
    pub fn provider_calls(&self, name: CloudProviderName) -> usize {
        self.calls(default_url(name))
    }

    /// Number of fetches across every URL
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait::async_trait]
impl IpRangesFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        let response = self.responses.lock().unwrap().get(url).cloned();
        match response {
            Some(Scripted::Document(document)) => Ok(document),
            Some(Scripted::Fail(message)) => Err(Error::http(message)),
            Some(Scripted::Delayed(delay, document)) => {
                tokio::time::sleep(delay).await;
                Ok(document)
            }
            None => Err(Error::http(format!("404 Not Found: {url}"))),
        }
    }
}

/// A fetcher answering successive calls from a queue, tracking overlap
///
/// Once the queue is drained the last answer repeats.
pub struct SequencedFetcher {
    answers: Mutex<VecDeque<(Duration, Vec<u8>)>>,
    last: Mutex<Option<Vec<u8>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl SequencedFetcher {
    pub fn new(answers: Vec<(Duration, Vec<u8>)>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            last: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Highest number of fetches that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpRangesFetcher for SequencedFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let next = self.answers.lock().unwrap().pop_front();
        let (delay, document) = match next {
            Some((delay, document)) => {
                *self.last.lock().unwrap() = Some(document.clone());
                (delay, document)
            }
            None => {
                let last = self.last.lock().unwrap().clone();
                match last {
                    Some(document) => (Duration::ZERO, document),
                    None => {
                        self.in_flight.fetch_sub(1, Ordering::SeqCst);
                        return Err(Error::http("no answer queued"));
                    }
                }
            }
        };

        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(document)
    }
}

/// Default document URL of a provider
pub fn default_url(name: CloudProviderName) -> &'static str {
    match name {
        CloudProviderName::Aws => DEFAULT_AWS_IP_RANGES_URL,
        CloudProviderName::Gcp => DEFAULT_GCP_IP_RANGES_URL,
        CloudProviderName::Datadog => DEFAULT_DATADOG_IP_RANGES_URL,
    }
}

/// Only the given providers enabled
pub fn only_enabled_config(names: &[CloudProviderName]) -> CloudProvidersConfig {
    let mut config = all_enabled_config();
    for name in CloudProviderName::ALL {
        config.provider_mut(name).enabled = names.contains(&name);
    }
    config
}

/// Every provider enabled, one minute interval
pub fn all_enabled_config() -> CloudProvidersConfig {
    CloudProvidersConfig {
        disable_all: false,
        pull_interval_secs: 60,
        fetch_timeout_secs: 30,
        ..CloudProvidersConfig::default()
    }
}

pub fn aws_v1() -> Vec<u8> {
    fixture_document(
        "1",
        &[
            ("S3", &["1.2.3.0/24", "2.2.3.0/24"]),
            ("EC2", &["4.2.3.0/24", "5.2.3.0/24"]),
        ],
    )
}

pub fn gcp_v1() -> Vec<u8> {
    fixture_document("1", &[("Google", &["6.2.3.0/24", "7.2.3.0/24", "8.2.3.0/24"])])
}

pub fn datadog_v1() -> Vec<u8> {
    fixture_document(
        "1",
        &[
            ("api", &["3.233.144.0/20"]),
            ("logs", &["3.233.144.0/20", "54.84.0.0/16"]),
        ],
    )
}

/// A fetcher answering every default URL with the `*_v1` documents
pub fn seeded_fetcher() -> Arc<ScriptedFetcher> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.set_provider(CloudProviderName::Aws, Scripted::Document(aws_v1()));
    fetcher.set_provider(CloudProviderName::Gcp, Scripted::Document(gcp_v1()));
    fetcher.set_provider(CloudProviderName::Datadog, Scripted::Document(datadog_v1()));
    fetcher
}

/// Build a manager from the fixture registry and the given fetcher
pub async fn build_manager(
    config: CloudProvidersConfig,
    fetcher: Arc<ScriptedFetcher>,
) -> (
    ipranges_core::IpRangeManager,
    HashMap<CloudProviderName, Arc<AdapterCounters>>,
) {
    let (registry, counters) = fixture_registry();
    let manager = ipranges_core::IpRangeManager::new(config, &registry, fetcher)
        .await
        .expect("manager construction succeeds");
    (manager, counters)
}
