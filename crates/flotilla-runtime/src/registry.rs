#![forbid(unsafe_code)]

//! Bounded pools of reusable instance ids, one per feature type.
//!
//! Each feature type owns an independent bucket behind its own mutex, so
//! creation on one type never contends with restoration on another. Inside a
//! bucket, [`InstanceRegistry::allocate`] always hands out the lowest free id.
//!
//! Every change schedules the bucket's full slot ledger while the bucket lock
//! is held, so ledger snapshots for one type are totally ordered. Once a
//! [`WriteBehind`] is attached (the state store does this), ledgers go through
//! its thread and coalesce there; a bare registry writes them directly. A
//! failed ledger write is logged and otherwise ignored; the next change
//! rewrites the whole set.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use flotilla_core::{FeatureType, InstanceId};

use crate::storage::StorageBackend;
use crate::write_behind::WriteBehind;

/// Hard ceiling on any configured pool size.
pub const MAX_CAPACITY: u32 = 32;

#[derive(Debug)]
struct Bucket {
    capacity: u32,
    used: BTreeSet<InstanceId>,
}

impl Bucket {
    fn lowest_free(&self) -> Option<InstanceId> {
        (1..=self.capacity)
            .filter_map(InstanceId::new)
            .find(|id| !self.used.contains(id))
    }

    fn in_range(&self, id: InstanceId) -> bool {
        id.get() <= self.capacity
    }
}

/// Per-feature capacity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacities {
    pub mask: u32,
    pub spotlight: u32,
    pub signal_light: u32,
}

impl Capacities {
    #[must_use]
    pub const fn get(&self, feature: FeatureType) -> u32 {
        match feature {
            FeatureType::Mask => self.mask,
            FeatureType::Spotlight => self.spotlight,
            FeatureType::SignalLight => self.signal_light,
        }
    }
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            mask: FeatureType::Mask.default_capacity(),
            spotlight: FeatureType::Spotlight.default_capacity(),
            signal_light: FeatureType::SignalLight.default_capacity(),
        }
    }
}

/// Owned id allocator shared by `Arc` between coordinator and store.
pub struct InstanceRegistry {
    buckets: [Mutex<Bucket>; 3],
    storage: Arc<dyn StorageBackend>,
    writer: OnceLock<Arc<WriteBehind>>,
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("storage", &self.storage.name())
            .field("write_behind", &self.writer.get().is_some())
            .finish_non_exhaustive()
    }
}

impl InstanceRegistry {
    /// Create an empty registry. Capacities are clamped to `1..=MAX_CAPACITY`.
    #[must_use]
    pub fn new(capacities: Capacities, storage: Arc<dyn StorageBackend>) -> Self {
        let bucket = |feature: FeatureType| {
            Mutex::new(Bucket {
                capacity: capacities.get(feature).clamp(1, MAX_CAPACITY),
                used: BTreeSet::new(),
            })
        };
        Self {
            buckets: FeatureType::ALL.map(bucket),
            storage,
            writer: OnceLock::new(),
        }
    }

    /// Route ledger writes through `writer` from now on. The first attached
    /// writer stays; it is returned either way.
    pub fn attach_writer(&self, writer: Arc<WriteBehind>) -> Arc<WriteBehind> {
        Arc::clone(self.writer.get_or_init(|| writer))
    }

    /// Attached write-behind worker, if any.
    #[must_use]
    pub fn writer(&self) -> Option<&Arc<WriteBehind>> {
        self.writer.get()
    }

    fn bucket(&self, feature: FeatureType) -> MutexGuard<'_, Bucket> {
        self.buckets[feature.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, feature: FeatureType, bucket: &Bucket) {
        let ids: Vec<InstanceId> = bucket.used.iter().copied().collect();
        if let Some(writer) = self.writer.get() {
            writer.schedule_slots(feature, ids);
        } else if let Err(err) = self.storage.write_slots(feature, &ids) {
            tracing::warn!(%feature, error = %err, "slot ledger write failed");
        }
    }

    /// Claim the lowest free id, or `None` when the pool is full.
    pub fn allocate(&self, feature: FeatureType) -> Option<InstanceId> {
        let mut bucket = self.bucket(feature);
        let Some(id) = bucket.lowest_free() else {
            tracing::debug!(%feature, capacity = bucket.capacity, "pool exhausted");
            return None;
        };
        bucket.used.insert(id);
        self.persist(feature, &bucket);
        tracing::debug!(%feature, %id, "slot allocated");
        Some(id)
    }

    /// Return an id to the pool. Releasing a free id does nothing.
    pub fn release(&self, feature: FeatureType, id: InstanceId) {
        let mut bucket = self.bucket(feature);
        if bucket.used.remove(&id) {
            self.persist(feature, &bucket);
            tracing::debug!(%feature, %id, "slot released");
        }
    }

    /// Re-adopt a persisted id at startup. Fails when taken or out of range.
    pub fn register_existing(&self, feature: FeatureType, id: InstanceId) -> bool {
        let mut bucket = self.bucket(feature);
        if !bucket.in_range(id) || !bucket.used.insert(id) {
            return false;
        }
        self.persist(feature, &bucket);
        true
    }

    #[must_use]
    pub fn active_count(&self, feature: FeatureType) -> usize {
        self.bucket(feature).used.len()
    }

    /// Live ids in ascending order.
    #[must_use]
    pub fn active_ids(&self, feature: FeatureType) -> Vec<InstanceId> {
        self.bucket(feature).used.iter().copied().collect()
    }

    #[must_use]
    pub fn capacity(&self, feature: FeatureType) -> u32 {
        self.bucket(feature).capacity
    }

    #[must_use]
    pub fn contains(&self, feature: FeatureType, id: InstanceId) -> bool {
        self.bucket(feature).used.contains(&id)
    }

    /// Storage backend the ledger is written to.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }
}
