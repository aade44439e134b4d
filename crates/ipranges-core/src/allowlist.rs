//! Allow-list resolution
//!
//! Turns a selection of cloud services into the CIDR ranges a disruption must
//! keep reachable. Resolution is strict: every selected provider must be
//! registered and every selected service must be published, otherwise the
//! allow-list would silently be missing ranges.

use crate::error::{Error, Result};
use crate::manager::IpRangeManager;
use crate::provider_name::CloudProviderName;
use crate::snapshot::IpRangeSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Services of one provider that must stay reachable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudServiceSelection {
    /// The provider publishing the services
    pub provider: CloudProviderName,
    /// Service names as listed by [`IpRangeManager::get_service_list`]
    pub services: Vec<String>,
}

impl CloudServiceSelection {
    /// Create a selection
    pub fn new<I, S>(provider: CloudProviderName, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            provider,
            services: services.into_iter().map(Into::into).collect(),
        }
    }
}

impl IpRangeManager {
    /// Resolve selections into one de-duplicated CIDR list
    ///
    /// Ranges keep the order of their first occurrence. Every provider is read
    /// from a single snapshot, even when it appears in several selections.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: The allow-list
    /// - `Err(Error::UnknownProvider)`: A selected provider has no registration
    /// - `Err(Error::UnknownService)`: A selected service is not published
    pub fn resolve_allowlist(&self, selections: &[CloudServiceSelection]) -> Result<Vec<String>> {
        let mut snapshots: HashMap<CloudProviderName, Arc<IpRangeSnapshot>> = HashMap::new();
        let mut seen = HashSet::new();
        let mut allowlist = Vec::new();

        for selection in selections {
            let snapshot = match snapshots.entry(selection.provider) {
                Entry::Occupied(entry) => Arc::clone(entry.get()),
                Entry::Vacant(entry) => {
                    let snapshot = self
                        .snapshot(selection.provider)
                        .ok_or(Error::UnknownProvider(selection.provider))?;
                    Arc::clone(entry.insert(snapshot))
                }
            };

            for service in &selection.services {
                let ranges = snapshot
                    .ranges_for(service)
                    .ok_or_else(|| Error::unknown_service(selection.provider, service.as_str()))?;

                for range in ranges {
                    if seen.insert(range.clone()) {
                        allowlist.push(range.clone());
                    }
                }
            }
        }

        Ok(allowlist)
    }
}
