//! Remote subnet listing
//!
//! [`SubnetClient`] is the seam to the cloud API. The provider issues one
//! `describe_subnets` call per distinct selector term and re-applies the term
//! to whatever comes back, so implementations may filter server-side as much
//! or as little as the backing API allows.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

#[cfg(test)]
use mockall::automock;

use crate::error::Result;
use crate::selector::{tags_match, SubnetSelectorTerm, TagConstraint};
use crate::subnet::Subnet;

/// Filter for one remote listing call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubnetFilter {
    /// Restrict to this subnet ID
    pub subnet_id: Option<String>,
    /// Every constraint must be satisfied by some tag on the subnet
    pub tags: Vec<TagConstraint>,
}

impl SubnetFilter {
    /// Whether `subnet` passes this filter
    pub fn matches(&self, subnet: &Subnet) -> bool {
        self.subnet_id.as_deref().map_or(true, |id| subnet.id == id)
            && tags_match(&subnet.tags, &self.tags)
    }
}

impl From<&SubnetSelectorTerm> for SubnetFilter {
    fn from(term: &SubnetSelectorTerm) -> Self {
        Self {
            subnet_id: term.id.clone().filter(|id| !id.is_empty()),
            tags: term.tag_constraints(),
        }
    }
}

/// Capability to list subnets from the cloud
///
/// Errors are returned to `list` callers unchanged; implementations own any
/// retry policy.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SubnetClient: Send + Sync {
    /// List subnets matching `filter`
    async fn describe_subnets(&self, filter: &SubnetFilter) -> Result<Vec<Subnet>>;
}

/// In-memory [`SubnetClient`] over a fixed subnet inventory
///
/// Applies filters (including wildcards) locally. Useful for static
/// inventories, dry runs, and tests; counts calls so cache behaviour can be
/// observed.
#[derive(Debug, Default)]
pub struct StaticSubnetClient {
    subnets: RwLock<Vec<Subnet>>,
    calls: AtomicUsize,
}

impl StaticSubnetClient {
    /// Create a client serving `subnets`
    pub fn new(subnets: Vec<Subnet>) -> Self {
        Self {
            subnets: RwLock::new(subnets),
            calls: AtomicUsize::new(0),
        }
    }

    /// Replace the served inventory
    pub fn set_subnets(&self, subnets: Vec<Subnet>) {
        *self.subnets.write() = subnets;
    }

    /// Number of `describe_subnets` calls served so far
    pub fn describe_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Reset the call counter
    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubnetClient for StaticSubnetClient {
    async fn describe_subnets(&self, filter: &SubnetFilter) -> Result<Vec<Subnet>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .subnets
            .read()
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }
}
