//! Backend groups and replica selection
//!
//! A group holds one primary and any number of read replicas. Selection
//! for reads goes through the group's balance policy and falls back to the
//! primary when there is no replica.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::config::{BalanceMode, DbGroupConfig, PoolConfig};

use super::connection::Connector;
use super::instance::DbInstance;

/// Strategy for selecting an instance from a list
pub trait InstanceSelector: Send + Sync {
    /// Returns None if the list is empty
    fn select(&self, instances: &[Arc<DbInstance>]) -> Option<Arc<DbInstance>>;
}

/// Select the first instance (used for masters)
#[derive(Debug, Default)]
pub struct FirstSelector;

impl InstanceSelector for FirstSelector {
    fn select(&self, instances: &[Arc<DbInstance>]) -> Option<Arc<DbInstance>> {
        instances.first().cloned()
    }
}

/// Round-robin selection
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    counter: AtomicUsize,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl InstanceSelector for RoundRobinSelector {
    fn select(&self, instances: &[Arc<DbInstance>]) -> Option<Arc<DbInstance>> {
        if instances.is_empty() {
            return None;
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % instances.len();
        Some(Arc::clone(&instances[idx]))
    }
}

/// Weight-proportional random selection
///
/// Instances with weight 0 are never picked unless every weight is 0.
#[derive(Debug, Default)]
pub struct WeightedRandomSelector;

impl InstanceSelector for WeightedRandomSelector {
    fn select(&self, instances: &[Arc<DbInstance>]) -> Option<Arc<DbInstance>> {
        if instances.is_empty() {
            return None;
        }

        let total: u64 = instances.iter().map(|i| u64::from(i.weight())).sum();
        let mut rng = rand::thread_rng();
        if total == 0 {
            return Some(Arc::clone(&instances[rng.gen_range(0..instances.len())]));
        }

        let mut point = rng.gen_range(0..total);
        for instance in instances {
            let weight = u64::from(instance.weight());
            if point < weight {
                return Some(Arc::clone(instance));
            }
            point -= weight;
        }
        instances.last().cloned()
    }
}

/// A primary and its replicas
pub struct DbGroup {
    name: String,
    masters: Vec<Arc<DbInstance>>,
    slaves: Vec<Arc<DbInstance>>,
    master_selector: Box<dyn InstanceSelector>,
    slave_selector: Box<dyn InstanceSelector>,
}

impl DbGroup {
    pub fn new(config: &DbGroupConfig, pool: &PoolConfig, connector: Arc<dyn Connector>) -> Self {
        let (masters, slaves): (Vec<_>, Vec<_>) = config
            .instances
            .iter()
            .map(|i| DbInstance::new(i.clone(), pool.clone(), Arc::clone(&connector)))
            .partition(|i| i.is_master());

        let slave_selector: Box<dyn InstanceSelector> = match config.balance {
            BalanceMode::RoundRobin => Box::new(RoundRobinSelector::new()),
            BalanceMode::Random => Box::new(WeightedRandomSelector),
        };

        Self {
            name: config.name.clone(),
            masters,
            slaves,
            master_selector: Box::new(FirstSelector),
            slave_selector,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pick the primary, or a replica when `want_master` is false
    ///
    /// Falls back to the primary when there are no replicas.
    pub fn select(&self, want_master: bool) -> Option<Arc<DbInstance>> {
        if want_master || self.slaves.is_empty() {
            self.master_selector.select(&self.masters)
        } else {
            self.slave_selector.select(&self.slaves)
        }
    }

    /// Look up an instance by name
    pub fn instance(&self, name: &str) -> Option<Arc<DbInstance>> {
        self.masters
            .iter()
            .chain(self.slaves.iter())
            .find(|i| i.name() == name)
            .cloned()
    }

    pub fn instances(&self) -> impl Iterator<Item = &Arc<DbInstance>> {
        self.masters.iter().chain(self.slaves.iter())
    }
}
