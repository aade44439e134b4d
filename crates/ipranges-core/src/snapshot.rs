//! Immutable parsed state of one provider document
//!
//! A snapshot is built once by an adapter and then only ever replaced as a
//! whole. There is no way to mutate a published snapshot: fields are private
//! and only exposed through read accessors.

use ipnetwork::IpNetwork;
use std::collections::{HashMap, HashSet};

/// Parsed IP ranges of one provider at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpRangeSnapshot {
    /// Provider-defined version tag (opaque)
    version: String,
    /// Service names, in document order
    service_list: Vec<String>,
    /// Service name → CIDR list, each list in document order
    ip_ranges: HashMap<String, Vec<String>>,
}

impl IpRangeSnapshot {
    /// Build a snapshot, checking its internal consistency
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if:
    /// - the version tag is empty
    /// - a service name appears twice in `service_list`
    /// - `service_list` and the keys of `ip_ranges` are not the same set
    /// - a range is not a valid CIDR
    pub fn new(
        version: impl Into<String>,
        service_list: Vec<String>,
        ip_ranges: HashMap<String, Vec<String>>,
    ) -> crate::Result<Self> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(crate::Error::invalid_input("snapshot version cannot be empty"));
        }

        let mut seen = HashSet::with_capacity(service_list.len());
        for service in &service_list {
            if !seen.insert(service.as_str()) {
                return Err(crate::Error::invalid_input(format!(
                    "service {service:?} is listed twice"
                )));
            }
            if !ip_ranges.contains_key(service) {
                return Err(crate::Error::invalid_input(format!(
                    "service {service:?} has no ip ranges entry"
                )));
            }
        }

        for (service, ranges) in &ip_ranges {
            if !seen.contains(service.as_str()) {
                return Err(crate::Error::invalid_input(format!(
                    "ip ranges entry {service:?} is missing from the service list"
                )));
            }
            for range in ranges {
                range.parse::<IpNetwork>().map_err(|e| {
                    crate::Error::invalid_input(format!(
                        "invalid range {range:?} for service {service:?}: {e}"
                    ))
                })?;
            }
        }

        Ok(Self {
            version,
            service_list,
            ip_ranges,
        })
    }

    /// Build a snapshot from `(service, ranges)` pairs in document order
    pub fn from_services<I, S, R>(version: impl Into<String>, services: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = (S, R)>,
        S: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        let mut service_list = Vec::new();
        let mut ip_ranges = HashMap::new();

        for (service, ranges) in services {
            let service = service.into();
            ip_ranges.insert(service.clone(), ranges.into_iter().map(Into::into).collect());
            service_list.push(service);
        }

        Self::new(version, service_list, ip_ranges)
    }

    /// Provider-defined version tag
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Service names in document order
    pub fn service_list(&self) -> &[String] {
        &self.service_list
    }

    /// Full service → CIDR mapping
    pub fn ip_ranges(&self) -> &HashMap<String, Vec<String>> {
        &self.ip_ranges
    }

    /// CIDR list of one service, if published
    pub fn ranges_for(&self, service: &str) -> Option<&[String]> {
        self.ip_ranges.get(service).map(Vec::as_slice)
    }

    /// Mapping restricted to the requested services
    ///
    /// Requested names that are not published are left out of the result.
    pub fn select<S: AsRef<str>>(&self, services: &[S]) -> HashMap<String, Vec<String>> {
        services
            .iter()
            .filter_map(|service| {
                let service = service.as_ref();
                self.ip_ranges
                    .get(service)
                    .map(|ranges| (service.to_string(), ranges.clone()))
            })
            .collect()
    }

    /// Number of services
    pub fn service_count(&self) -> usize {
        self.service_list.len()
    }
}
