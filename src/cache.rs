//! Memoization of evaluation plans by support signature.
//!
//! Every polynomial built through a [`PlanCache`] asks it for the plan of its support. The
//! first request for a signature builds the plan, every later request gets a clone of the
//! same `Arc`. Concurrent first requests for one signature wait on a per-signature
//! `OnceCell`, so exactly one of them runs the builder; requests for other signatures
//! proceed independently.
//!
//! The cache holds plans indefinitely unless a capacity is configured, in which case the
//! least recently used plan is dropped once the capacity is exceeded. Polynomials keep
//! their own `Arc`, so eviction never invalidates a live polynomial.
//!
//! A process-wide instance is available through [`PlanCache::global()`]. Tests and
//! applications wanting isolation create their own instance and pass it to the `*_in`
//! constructors.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use tracing::{debug, trace};

use crate::builder::build_plan;
use crate::errors::PlanError;
use crate::support::{Signature, Support};
use crate::types::SharedPlan;

static GLOBAL_CACHE: Lazy<PlanCache> = Lazy::new(PlanCache::default);

/// Configuration of a [`PlanCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of plans kept; `None` keeps every plan.
    pub capacity: Option<usize>,
}

impl CacheConfig {
    /// Bounds the cache to `capacity` plans with least-recently-used eviction.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }
}

struct Slot {
    plan: OnceCell<SharedPlan>,
    last_used: AtomicU64,
}

/// Signature-keyed store of shared evaluation plans.
pub struct PlanCache {
    entries: DashMap<Signature, Arc<Slot>>,
    config: CacheConfig,
    clock: AtomicU64,
    builds: AtomicUsize,
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanCache")
            .field("plans", &self.len())
            .field("builds", &self.builds())
            .field("capacity", &self.config.capacity)
            .finish()
    }
}

impl PlanCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            clock: AtomicU64::new(0),
            builds: AtomicUsize::new(0),
        }
    }

    /// The process-wide cache used by the constructors without an explicit cache.
    ///
    /// It is unbounded and lives until the process exits.
    pub fn global() -> &'static PlanCache {
        &GLOBAL_CACHE
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Returns the plan of `support`, building it on the first request for its signature.
    ///
    /// # Errors
    /// Returns the builder's `PlanError` if the support cannot be compiled. A failed build
    /// leaves no entry behind, later requests try again.
    pub fn get_or_build(&self, support: &Support) -> Result<SharedPlan, PlanError> {
        let signature = support.signature();

        // Clone the slot out so the shard lock is released before building.
        let slot = self
            .entries
            .entry(signature.clone())
            .or_insert_with(|| {
                Arc::new(Slot {
                    plan: OnceCell::new(),
                    last_used: AtomicU64::new(0),
                })
            })
            .clone();
        slot.last_used
            .store(self.clock.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);

        if let Some(plan) = slot.plan.get() {
            trace!(%signature, "plan cache hit");
            return Ok(Arc::clone(plan));
        }

        let result = slot.plan.get_or_try_init(|| {
            self.builds.fetch_add(1, Ordering::Relaxed);
            let plan = build_plan(support)?;
            let stats = plan.stats();
            debug!(
                %signature,
                terms = stats.terms,
                power_steps = stats.power_steps,
                product_steps = stats.product_steps,
                "built evaluation plan"
            );
            Ok::<_, PlanError>(Arc::new(plan))
        });

        match result {
            Ok(plan) => {
                let plan = Arc::clone(plan);
                self.evict_over_capacity(&signature);
                Ok(plan)
            }
            Err(err) => {
                debug!(%signature, error = %err, "plan build failed");
                self.entries
                    .remove_if(&signature, |_, slot| slot.plan.get().is_none());
                Err(err)
            }
        }
    }

    /// Returns the cached plan of `signature` without building.
    pub fn get(&self, signature: &Signature) -> Option<SharedPlan> {
        let slot = self.entries.get(signature)?;
        let plan = slot.plan.get()?;
        slot.last_used
            .store(self.clock.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
        Some(Arc::clone(plan))
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.entries
            .get(signature)
            .is_some_and(|slot| slot.plan.get().is_some())
    }

    /// Number of signatures currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of times the builder ran since this cache was created.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Drops every cached plan. Polynomials holding a plan keep it alive.
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn evict_over_capacity(&self, keep: &Signature) {
        let Some(capacity) = self.config.capacity else {
            return;
        };
        while self.entries.len() > capacity {
            let victim = self
                .entries
                .iter()
                .filter(|entry| entry.key() != keep && entry.value().plan.get().is_some())
                .min_by_key(|entry| entry.value().last_used.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());
            match victim {
                Some(signature) => {
                    debug!(%signature, "evicting least recently used plan");
                    self.entries.remove(&signature);
                }
                None => break,
            }
        }
    }
}
