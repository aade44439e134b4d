//! Identity of the supported cloud providers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A cloud provider publishing machine-readable IP range documents
///
/// Used as the map key of the manager, so it must stay stable. New providers
/// are added as new variants plus an adapter crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProviderName {
    /// Amazon Web Services
    Aws,
    /// Google Cloud Platform
    Gcp,
    /// Datadog
    Datadog,
}

impl CloudProviderName {
    /// Every supported provider, in configuration order
    pub const ALL: [CloudProviderName; 3] = [
        CloudProviderName::Aws,
        CloudProviderName::Gcp,
        CloudProviderName::Datadog,
    ];

    /// Display name (e.g. "AWS")
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProviderName::Aws => "AWS",
            CloudProviderName::Gcp => "GCP",
            CloudProviderName::Datadog => "Datadog",
        }
    }
}

impl fmt::Display for CloudProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudProviderName {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(CloudProviderName::Aws),
            "gcp" => Ok(CloudProviderName::Gcp),
            "datadog" => Ok(CloudProviderName::Datadog),
            other => Err(crate::Error::invalid_input(format!(
                "unknown cloud provider: {other}"
            ))),
        }
    }
}
