//! Subnet resolution
//!
//! [`SubnetProvider`] turns a list of selector terms into the deduplicated set
//! of subnets a node class may launch into. Each distinct term is resolved on
//! its own: from the [`TermCache`] when fresh, otherwise with one remote call
//! whose result is narrowed to the exact ID + tag intersection and cached for
//! that term. Term results are then unioned by subnet ID.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::TermCache;
use crate::client::{SubnetClient, SubnetFilter};
use crate::config::SubnetProviderConfig;
use crate::error::{Error, Result};
use crate::monitor::ChangeMonitor;
use crate::selector::{SelectorTermKey, SubnetSelectorTerm};
use crate::subnet::{Subnet, SubnetStatus, ZonalSubnet};

/// Predicted available IPs for a subnet handed out for launches
#[derive(Debug, Clone, Copy)]
struct Prediction {
    ips: u64,
    /// Identifies this prediction; a refresh and re-reservation gets a new epoch
    epoch: u64,
}

/// In-flight IP predictions since each subnet's last remote refresh
#[derive(Debug, Default)]
struct InflightIps {
    predictions: HashMap<String, Prediction>,
    next_epoch: u64,
}

impl InflightIps {
    fn available(&self, subnet: &Subnet) -> u64 {
        self.predictions
            .get(&subnet.id)
            .map_or(subnet.available_ip_count, |p| p.ips)
    }

    /// Reserve `ips` on a subnet, returning the epoch of its prediction
    fn reserve(&mut self, subnet_id: &str, available: u64, ips: u64) -> u64 {
        let next_epoch = &mut self.next_epoch;
        let prediction = self
            .predictions
            .entry(subnet_id.to_string())
            .or_insert_with(|| {
                let epoch = *next_epoch;
                *next_epoch += 1;
                Prediction {
                    ips: available,
                    epoch,
                }
            });
        prediction.ips = prediction.ips.saturating_sub(ips);
        prediction.epoch
    }
}

/// Resolves subnet selectors against the cloud, with per-term caching
pub struct SubnetProvider {
    client: Arc<dyn SubnetClient>,
    cache: Arc<TermCache>,
    /// Held across each select-and-reserve and each refund
    inflight: Mutex<InflightIps>,
    monitor: ChangeMonitor,
}

impl SubnetProvider {
    /// Create a provider over an existing cache
    pub fn new(client: Arc<dyn SubnetClient>, cache: Arc<TermCache>) -> Self {
        Self {
            client,
            cache,
            inflight: Mutex::new(InflightIps::default()),
            monitor: ChangeMonitor::new(),
        }
    }

    /// Create a provider with a fresh cache configured from `config`
    ///
    /// Starts the cache sweeper at `config.cleanup_interval`; it runs until
    /// `cancel` fires. Must be called from within a Tokio runtime.
    pub fn from_config(
        client: Arc<dyn SubnetClient>,
        config: &SubnetProviderConfig,
        cancel: CancellationToken,
    ) -> Self {
        let cache = Arc::new(TermCache::new(config.cache_ttl));
        Arc::clone(&cache).spawn_sweeper(config.cleanup_interval, cancel);
        Self::new(client, cache)
    }

    /// The term cache backing this provider
    pub fn cache(&self) -> &Arc<TermCache> {
        &self.cache
    }

    /// Resolve `terms` into the union of their matching subnets
    ///
    /// Each subnet appears once. Any remote failure aborts the whole call;
    /// terms that already resolved stay cached. Cancelling `cancel` while a
    /// remote call is outstanding returns [`Error::Cancelled`].
    #[instrument(skip_all, fields(terms = terms.len()))]
    pub async fn list(
        &self,
        cancel: &CancellationToken,
        terms: &[SubnetSelectorTerm],
    ) -> Result<Vec<Subnet>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut keys = HashSet::new();
        let distinct: Vec<(SelectorTermKey, &SubnetSelectorTerm)> = terms
            .iter()
            .filter_map(|term| {
                let key = term.key();
                keys.insert(key.clone()).then_some((key, term))
            })
            .collect();
        let mut selector: Vec<String> = distinct.iter().map(|(k, _)| k.to_string()).collect();
        selector.sort();

        let per_term = try_join_all(
            distinct
                .into_iter()
                .map(|(key, term)| self.resolve_term(cancel, key, term)),
        )
        .await?;

        let mut seen = HashSet::new();
        let subnets: Vec<Subnet> = per_term
            .into_iter()
            .flatten()
            .filter(|subnet| seen.insert(subnet.id.clone()))
            .collect();

        self.log_discovered(&selector.join("|"), &subnets);
        Ok(subnets)
    }

    async fn resolve_term(
        &self,
        cancel: &CancellationToken,
        key: SelectorTermKey,
        term: &SubnetSelectorTerm,
    ) -> Result<Vec<Subnet>> {
        if term.is_empty() {
            debug!("Skipping empty subnet selector term");
            return Ok(Vec::new());
        }

        if let Some(subnets) = self.cache.get(&key) {
            debug!(term = %key, count = subnets.len(), "Subnet cache hit");
            return Ok(subnets);
        }

        debug!(term = %key, "Subnet cache miss, describing subnets");
        let filter = SubnetFilter::from(term);
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(term = %key, "Subnet lookup cancelled");
                return Err(Error::cancelled("list subnets"));
            }
            result = self.client.describe_subnets(&filter) => result,
        };
        let fetched = fetched.inspect_err(|e| {
            warn!(term = %key, error = %e, "Failed to describe subnets");
        })?;

        let matched: Vec<Subnet> = fetched.into_iter().filter(|s| term.matches(s)).collect();
        {
            let mut inflight = self.inflight.lock();
            for subnet in &matched {
                inflight.predictions.remove(&subnet.id);
            }
        }
        debug!(term = %key, count = matched.len(), "Caching subnets for term");
        self.cache.put(key, &matched);
        Ok(matched)
    }

    fn log_discovered(&self, selector: &str, subnets: &[Subnet]) {
        let mut summary: Vec<String> = subnets
            .iter()
            .map(|s| format!("{} ({})", s.id, s.availability_zone))
            .collect();
        summary.sort();
        if self.monitor.has_changed(selector, &summary) {
            info!(selector = %selector, subnets = ?summary, "Discovered subnets");
        }
    }

    /// Public IP association to force at launch, given a node class's resolved subnets
    ///
    /// Returns `Some(false)` only when every referenced subnet is cached with
    /// public-IP-on-launch disabled. Returns `None` (leave the cloud default)
    /// when any subnet is missing from the cache or assigns public IPs.
    pub fn associate_public_ip_address_value(&self, status: &[SubnetStatus]) -> Option<bool> {
        for subnet in status {
            match self.cache.map_public_ip_on_launch(&subnet.id) {
                Some(false) => {}
                Some(true) => {
                    debug!(subnet_id = %subnet.id, "Subnet assigns public IPs on launch");
                    return None;
                }
                None => {
                    debug!(subnet_id = %subnet.id, "No cached public IP data for subnet");
                    return None;
                }
            }
        }
        Some(false)
    }

    /// Pick one subnet per availability zone for the next launch
    ///
    /// Prefers the subnet with the most available IPs (in-flight predictions
    /// take precedence over the reported count), breaking ties by subnet ID,
    /// and reserves `predicted_ips_per_node` on each chosen subnet.
    pub async fn zonal_subnets_for_launch(
        &self,
        cancel: &CancellationToken,
        terms: &[SubnetSelectorTerm],
        predicted_ips_per_node: u64,
    ) -> Result<BTreeMap<String, ZonalSubnet>> {
        let subnets = self.list(cancel, terms).await?;

        let mut inflight = self.inflight.lock();
        let mut zonal: BTreeMap<String, ZonalSubnet> = BTreeMap::new();
        for subnet in &subnets {
            let available = inflight.available(subnet);
            let better = match zonal.get(&subnet.availability_zone) {
                Some(current) => {
                    available > current.available_ip_count
                        || (available == current.available_ip_count && subnet.id < current.id)
                }
                None => true,
            };
            if better {
                zonal.insert(
                    subnet.availability_zone.clone(),
                    ZonalSubnet {
                        id: subnet.id.clone(),
                        zone: subnet.availability_zone.clone(),
                        available_ip_count: available,
                        reservation_epoch: 0,
                    },
                );
            }
        }

        for chosen in zonal.values_mut() {
            chosen.reservation_epoch =
                inflight.reserve(&chosen.id, chosen.available_ip_count, predicted_ips_per_node);
        }
        drop(inflight);
        debug!(zones = zonal.len(), "Selected zonal subnets for launch");
        Ok(zonal)
    }

    /// Refund reservations for offered subnets that a launch did not use
    ///
    /// Only refunds a subnet whose prediction still belongs to the offer;
    /// predictions replaced by a remote refresh are left alone.
    pub fn update_inflight_ips(
        &self,
        offered: &BTreeMap<String, ZonalSubnet>,
        launched_subnet_ids: &[String],
        predicted_ips_per_node: u64,
    ) {
        let mut inflight = self.inflight.lock();
        for subnet in offered.values() {
            if launched_subnet_ids.contains(&subnet.id) {
                continue;
            }
            match inflight.predictions.get_mut(&subnet.id) {
                Some(prediction) if prediction.epoch == subnet.reservation_epoch => {
                    prediction.ips = prediction
                        .ips
                        .saturating_add(predicted_ips_per_node)
                        .min(subnet.available_ip_count);
                }
                Some(_) => {
                    debug!(subnet_id = %subnet.id, "Skipping refund for superseded reservation");
                }
                None => {}
            }
        }
    }

    /// Current in-flight IP prediction for a subnet
    pub fn inflight_ips(&self, subnet_id: &str) -> Option<u64> {
        self.inflight
            .lock()
            .predictions
            .get(subnet_id)
            .map(|p| p.ips)
    }
}
