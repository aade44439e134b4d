//! Configuration types for the IP range system
//!
//! This module defines all configuration structures used throughout the crate.

use crate::provider_name::CloudProviderName;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public AWS IP range document
pub const DEFAULT_AWS_IP_RANGES_URL: &str = "https://ip-ranges.amazonaws.com/ip-ranges.json";

/// Public Google IP range document (general ranges, includes some API ranges)
pub const DEFAULT_GCP_IP_RANGES_URL: &str = "https://www.gstatic.com/ipranges/goog.json";

/// Public Datadog IP range document
pub const DEFAULT_DATADOG_IP_RANGES_URL: &str = "https://ip-ranges.datadoghq.com/";

/// Process-wide IP range configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudProvidersConfig {
    /// Disable every provider regardless of its own flag
    #[serde(default)]
    pub disable_all: bool,

    /// Interval between two refresh cycles (in seconds)
    #[serde(default = "default_pull_interval_secs")]
    pub pull_interval_secs: u64,

    /// Upper bound for a single provider fetch (in seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// AWS settings
    #[serde(default = "default_aws")]
    pub aws: CloudProviderConfig,

    /// GCP settings
    #[serde(default = "default_gcp")]
    pub gcp: CloudProviderConfig,

    /// Datadog settings
    #[serde(default = "default_datadog")]
    pub datadog: CloudProviderConfig,
}

impl CloudProvidersConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            disable_all: false,
            pull_interval_secs: default_pull_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            aws: default_aws(),
            gcp: default_gcp(),
            datadog: default_datadog(),
        }
    }

    /// Settings of one provider
    pub fn provider(&self, name: CloudProviderName) -> &CloudProviderConfig {
        match name {
            CloudProviderName::Aws => &self.aws,
            CloudProviderName::Gcp => &self.gcp,
            CloudProviderName::Datadog => &self.datadog,
        }
    }

    /// Mutable settings of one provider
    pub fn provider_mut(&mut self, name: CloudProviderName) -> &mut CloudProviderConfig {
        match name {
            CloudProviderName::Aws => &mut self.aws,
            CloudProviderName::Gcp => &mut self.gcp,
            CloudProviderName::Datadog => &mut self.datadog,
        }
    }

    /// Providers that should be registered, honoring `disable_all`
    pub fn enabled_providers(&self) -> Vec<CloudProviderName> {
        if self.disable_all {
            return Vec::new();
        }

        CloudProviderName::ALL
            .into_iter()
            .filter(|name| self.provider(*name).enabled)
            .collect()
    }

    /// Refresh interval as a [`Duration`]
    pub fn pull_interval(&self) -> Duration {
        Duration::from_secs(self.pull_interval_secs)
    }

    /// Fetch timeout as a [`Duration`]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Validate the configuration
    ///
    /// Provider settings are ignored when `disable_all` is set. The pull
    /// interval is checked when the periodic pull starts, not here.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.fetch_timeout_secs == 0 {
            return Err(crate::Error::config("fetch timeout must be > 0"));
        }

        for name in self.enabled_providers() {
            self.provider(name).validate(name)?;
        }

        Ok(())
    }
}

impl Default for CloudProvidersConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings of a single cloud provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudProviderConfig {
    /// Whether this provider is pulled at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Where the provider publishes its IP range document
    #[serde(default)]
    pub ip_ranges_url: String,
}

impl CloudProviderConfig {
    /// Create an enabled provider configuration
    pub fn new(ip_ranges_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            ip_ranges_url: ip_ranges_url.into(),
        }
    }

    /// Enable or disable the provider
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn validate(&self, name: CloudProviderName) -> Result<(), crate::Error> {
        let url = self.ip_ranges_url.trim();
        if url.is_empty() {
            return Err(crate::Error::config(format!(
                "{name} is enabled but has no ip ranges URL"
            )));
        }
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "{name} ip ranges URL must use HTTP or HTTPS scheme. Got: {url}"
            )));
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

fn default_pull_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_aws() -> CloudProviderConfig {
    CloudProviderConfig::new(DEFAULT_AWS_IP_RANGES_URL)
}

fn default_gcp() -> CloudProviderConfig {
    CloudProviderConfig::new(DEFAULT_GCP_IP_RANGES_URL)
}

fn default_datadog() -> CloudProviderConfig {
    CloudProviderConfig::new(DEFAULT_DATADOG_IP_RANGES_URL)
}
