//! Core traits for the IP range system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpRangeProvider`]: Convert a provider document into a snapshot
//! - [`IpRangesFetcher`]: Retrieve raw provider documents

pub mod fetcher;
pub mod ip_range_provider;

pub use fetcher::IpRangesFetcher;
pub use ip_range_provider::{IpRangeProvider, IpRangeProviderFactory};
