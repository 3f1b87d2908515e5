#![forbid(unsafe_code)]

//! Durable per-instance state with synchronous reads and write-behind
//! persistence.
//!
//! The in-memory cache is the source of truth for readers: an
//! [`update`](InstanceStateStore::update) is visible to every caller as soon
//! as it returns. Durable writes are queued on the [`WriteBehind`] worker and
//! coalesced per instance, so after a crash an instance reverts to its last
//! flushed snapshot and never to a partial record.
//!
//! Every committed change is published to each subscriber's [`ChangeFeed`].
//! A feed keeps at most one pending change per instance, so an undrained
//! feed never grows past the number of instances touched.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use ahash::AHashMap;
use flotilla_core::{InstanceKey, InstanceState};

use crate::error::StoreError;
use crate::registry::InstanceRegistry;
use crate::write_behind::{WriteBehind, WriteFailure, WriteOp};

/// A committed update (`Some`) or deletion (`None`) of one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub key: InstanceKey,
    pub state: Option<InstanceState>,
}

#[derive(Debug, Default)]
struct FeedQueue {
    order: Vec<InstanceKey>,
    latest: AHashMap<InstanceKey, Option<InstanceState>>,
}

/// Coalescing queue of [`StateChange`]s for one subscriber.
///
/// A newer change for an instance replaces the pending one in place, keeping
/// the position of the first.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    queue: Mutex<FeedQueue>,
}

impl ChangeFeed {
    fn lock(&self) -> MutexGuard<'_, FeedQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, change: &StateChange) {
        let mut queue = self.lock();
        if queue
            .latest
            .insert(change.key, change.state.clone())
            .is_none()
        {
            queue.order.push(change.key);
        }
    }

    /// Take every pending change, oldest instance first.
    pub fn drain(&self) -> Vec<StateChange> {
        let mut queue = self.lock();
        let FeedQueue { order, latest } = &mut *queue;
        order
            .drain(..)
            .filter_map(|key| {
                latest
                    .remove(&key)
                    .map(|state| StateChange { key, state })
            })
            .collect()
    }

    /// Number of instances with a pending change.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache plus write-behind persistence for instance state.
#[derive(Debug)]
pub struct InstanceStateStore {
    registry: Arc<InstanceRegistry>,
    cache: Mutex<AHashMap<InstanceKey, InstanceState>>,
    subscribers: Mutex<Vec<Weak<ChangeFeed>>>,
    writer: Arc<WriteBehind>,
}

impl InstanceStateStore {
    /// Create a store persisting through the registry's storage backend.
    ///
    /// The write-behind worker is shared with the registry, so slot ledgers
    /// leave the caller's thread too.
    pub fn new(registry: Arc<InstanceRegistry>) -> std::io::Result<Self> {
        let writer = match registry.writer() {
            Some(writer) => Arc::clone(writer),
            None => registry.attach_writer(Arc::new(WriteBehind::start(Arc::clone(
                registry.storage(),
            ))?)),
        };
        Ok(Self {
            registry,
            cache: Mutex::new(AHashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            writer,
        })
    }

    fn cache(&self) -> MutexGuard<'_, AHashMap<InstanceKey, InstanceState>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_registered(&self, key: InstanceKey) -> Result<(), StoreError> {
        if self.registry.contains(key.feature, key.id) {
            Ok(())
        } else {
            Err(StoreError::UnknownInstance(key))
        }
    }

    fn publish(&self, change: &StateChange) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|feed| match feed.upgrade() {
                Some(feed) => {
                    feed.push(change);
                    true
                }
                None => false,
            });
    }

    /// Cached state, or a freshly seeded and persisted default.
    pub fn load(&self, key: InstanceKey) -> Result<InstanceState, StoreError> {
        self.check_registered(key)?;
        let mut cache = self.cache();
        if let Some(state) = cache.get(&key) {
            return Ok(state.clone());
        }
        let state = InstanceState::seeded(key);
        cache.insert(key, state.clone());
        drop(cache);
        tracing::debug!(%key, "seeded default state");
        self.writer.schedule(key, WriteOp::Put(state.clone()));
        Ok(state)
    }

    /// Apply `mutate` in memory, schedule a durable write, and return the
    /// new state.
    pub fn update<F>(&self, key: InstanceKey, mutate: F) -> Result<InstanceState, StoreError>
    where
        F: FnOnce(&mut InstanceState),
    {
        self.check_registered(key)?;
        let state = {
            let mut cache = self.cache();
            let state = cache
                .entry(key)
                .or_insert_with(|| InstanceState::seeded(key));
            mutate(state);
            state.clone()
        };
        self.writer.schedule(key, WriteOp::Put(state.clone()));
        self.publish(&StateChange {
            key,
            state: Some(state.clone()),
        });
        Ok(state)
    }

    /// Drop the cached state and the durable record.
    pub fn delete(&self, key: InstanceKey) {
        self.cache().remove(&key);
        self.writer.schedule(key, WriteOp::Delete);
        self.publish(&StateChange { key, state: None });
    }

    /// Seed the cache from a restored record without rewriting it.
    pub fn adopt(&self, key: InstanceKey, state: InstanceState) -> Result<(), StoreError> {
        self.check_registered(key)?;
        self.cache().insert(key, state);
        Ok(())
    }

    /// Cached state without seeding.
    #[must_use]
    pub fn peek(&self, key: InstanceKey) -> Option<InstanceState> {
        self.cache().get(&key).cloned()
    }

    /// Block until every scheduled write has been attempted.
    pub fn flush(&self) {
        self.writer.flush();
    }

    /// Feed of every subsequent change. Dropping it unsubscribes.
    pub fn subscribe(&self) -> Arc<ChangeFeed> {
        let feed = Arc::new(ChangeFeed::default());
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(&feed));
        feed
    }

    /// Most recent durable-write failure, cleared once that instance is
    /// written successfully.
    #[must_use]
    pub fn last_write_error(&self) -> Option<WriteFailure> {
        self.writer.last_failure()
    }

    /// Registry used for id validity.
    #[must_use]
    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }
}
