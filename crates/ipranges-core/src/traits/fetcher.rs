// # Document Fetcher Trait
//
// Defines how raw IP range documents are retrieved. Transport, TLS, and
// status handling live in the implementation; the manager only adds a
// per-provider timeout around each call.
//
// ## Implementations
//
// - HTTP: `ipranges-http` crate

use async_trait::async_trait;

/// Trait for document fetcher implementations
///
/// # Thread Safety
///
/// A single fetcher is shared by every provider and called concurrently.
#[async_trait]
pub trait IpRangesFetcher: Send + Sync {
    /// Fetch the raw document published at `url`
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<u8>)`: The document body
    /// - `Err(Error)`: Transport or HTTP-level failure
    async fn fetch(&self, url: &str) -> crate::Result<Vec<u8>>;
}
