//! Error types for the IP range system
//!
//! This module defines all error types used throughout the crate.

use crate::provider_name::CloudProviderName;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for IP range operations
pub type Result<T> = std::result::Result<T, Error>;

/// One provider that failed during a refresh cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// The provider whose refresh failed
    pub provider: CloudProviderName,
    /// Rendered error for that provider
    pub message: String,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.provider, self.message)
    }
}

/// Core error type for the IP range system
#[derive(Error, Debug)]
pub enum Error {
    /// The provider's document could not be retrieved
    #[error("fetch failed for {provider}: {message}")]
    Fetch {
        provider: CloudProviderName,
        message: String,
    },

    /// The fetch did not complete within the configured timeout
    #[error("fetch for {provider} timed out after {after:?}")]
    Timeout {
        provider: CloudProviderName,
        after: Duration,
    },

    /// The retrieved document did not convert into a valid snapshot
    #[error("conversion failed for {provider}: {message}")]
    Conversion {
        provider: CloudProviderName,
        message: String,
    },

    /// A query named a provider with no active registration
    #[error("no ip ranges registered for provider {0}")]
    UnknownProvider(CloudProviderName),

    /// A requested service is not published by the provider
    #[error("service {service:?} is not published by {provider}")]
    UnknownService {
        provider: CloudProviderName,
        service: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level errors raised by a fetcher
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// At least one provider failed during a refresh cycle
    #[error("failed to pull ip ranges for: {}", render_failures(.0))]
    PullFailed(Vec<ProviderFailure>),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn render_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a fetch error
    pub fn fetch(provider: CloudProviderName, message: impl Into<String>) -> Self {
        Self::Fetch {
            provider,
            message: message.into(),
        }
    }

    /// Create a conversion error
    pub fn conversion(provider: CloudProviderName, message: impl Into<String>) -> Self {
        Self::Conversion {
            provider,
            message: message.into(),
        }
    }

    /// Create an unknown-service error
    pub fn unknown_service(provider: CloudProviderName, service: impl Into<String>) -> Self {
        Self::UnknownService {
            provider,
            service: service.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Providers named by an aggregated refresh failure
    ///
    /// Empty for every other variant.
    pub fn failed_providers(&self) -> Vec<CloudProviderName> {
        match self {
            Self::PullFailed(failures) => failures.iter().map(|f| f.provider).collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_failed_lists_every_provider() {
        let err = Error::PullFailed(vec![
            ProviderFailure {
                provider: CloudProviderName::Aws,
                message: "boom".to_string(),
            },
            ProviderFailure {
                provider: CloudProviderName::Datadog,
                message: "bad json".to_string(),
            },
        ]);

        assert_eq!(
            err.to_string(),
            "failed to pull ip ranges for: AWS (boom), Datadog (bad json)"
        );
        assert_eq!(
            err.failed_providers(),
            vec![CloudProviderName::Aws, CloudProviderName::Datadog]
        );
    }

    #[test]
    fn failed_providers_empty_for_other_variants() {
        assert!(Error::config("x").failed_providers().is_empty());
    }
}
