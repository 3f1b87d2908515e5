#![forbid(unsafe_code)]

//! Dedicated durable-write thread.
//!
//! [`WriteBehind`] moves every storage write off the dispatch context onto a
//! single named thread (`flotilla-writer`). Callers never block on storage:
//! scheduling a write only touches an in-memory map and pokes a wake channel.
//!
//! # Coalescing Rules
//!
//! - Pending writes are keyed by instance. Scheduling a write for a key that
//!   already has one pending replaces it (last write wins).
//! - Slot ledgers are keyed by feature type and coalesce the same way; each
//!   carries the full id set, so only the newest one matters.
//! - The worker drains the whole map per pass and applies it sequentially, so
//!   at most one write per instance is ever in flight.
//! - A value scheduled while its predecessor is in flight lands in the map
//!   and is written on the next pass.
//!
//! # Error Propagation
//!
//! Failed writes are logged and recorded as the most recent
//! [`WriteFailure`]. There is no retry: the next mutation of the same
//! instance (or ledger) carries a full snapshot and heals the record.

use std::fmt;
use std::sync::mpsc::{self, TrySendError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use ahash::AHashMap;
use flotilla_core::{FeatureType, InstanceId, InstanceKey, InstanceState};

use crate::storage::StorageBackend;

/// One pending storage operation.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put(InstanceState),
    Delete,
}

/// What a durable write was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteTarget {
    Record(InstanceKey),
    Slots(FeatureType),
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(key) => write!(f, "{key}"),
            Self::Slots(feature) => write!(f, "{feature} slots"),
        }
    }
}

/// Most recent failed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub target: WriteTarget,
    pub message: String,
}

#[derive(Debug, Default)]
struct Queue {
    pending: AHashMap<InstanceKey, WriteOp>,
    slots: AHashMap<FeatureType, Vec<InstanceId>>,
    in_flight: bool,
    shutting_down: bool,
    stopped: bool,
    last_failure: Option<WriteFailure>,
}

impl Queue {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.slots.is_empty()
    }
}

#[derive(Debug, Default)]
struct Shared {
    queue: Mutex<Queue>,
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the write thread. Dropping it drains pending writes and joins.
pub struct WriteBehind {
    shared: Arc<Shared>,
    wake: mpsc::SyncSender<()>,
    handle: Option<JoinHandle<()>>,
}

impl WriteBehind {
    /// Spawn the writer thread.
    pub fn start(storage: Arc<dyn StorageBackend>) -> std::io::Result<Self> {
        let (wake, rx) = mpsc::sync_channel::<()>(1);
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name("flotilla-writer".into())
            .spawn(move || write_loop(&worker, storage.as_ref(), &rx))?;

        Ok(Self {
            shared,
            wake,
            handle: Some(handle),
        })
    }

    /// Queue `op` for `key`, replacing any pending op for the same key.
    pub fn schedule(&self, key: InstanceKey, op: WriteOp) {
        {
            let mut queue = self.shared.lock();
            if queue.stopped {
                tracing::warn!(%key, "writer stopped, dropping write");
                return;
            }
            if queue.pending.insert(key, op).is_some() {
                tracing::trace!(%key, "superseded pending write");
            }
        }
        self.poke();
    }

    /// Queue a full slot ledger for `feature`, replacing any pending one.
    pub fn schedule_slots(&self, feature: FeatureType, ids: Vec<InstanceId>) {
        {
            let mut queue = self.shared.lock();
            if queue.stopped {
                tracing::warn!(%feature, "writer stopped, dropping slot ledger");
                return;
            }
            queue.slots.insert(feature, ids);
        }
        self.poke();
    }

    fn poke(&self) {
        match self.wake.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::warn!("writer thread is gone");
            }
        }
    }

    /// Block until every write scheduled so far has been attempted.
    pub fn flush(&self) {
        self.poke();
        let mut queue = self.shared.lock();
        while !queue.stopped && (queue.in_flight || !queue.is_idle()) {
            queue = self
                .shared
                .idle
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Number of writes waiting for the worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        let queue = self.shared.lock();
        queue.pending.len() + queue.slots.len()
    }

    /// Most recent failed write, if any.
    #[must_use]
    pub fn last_failure(&self) -> Option<WriteFailure> {
        self.shared.lock().last_failure.clone()
    }

    /// Drain pending writes and stop the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shared.lock().shutting_down = true;
        self.poke();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WriteBehind {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WriteBehind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBehind")
            .field("pending", &self.pending())
            .field("running", &self.handle.is_some())
            .finish()
    }
}

fn write_loop(shared: &Shared, storage: &dyn StorageBackend, rx: &mpsc::Receiver<()>) {
    while rx.recv().is_ok() {
        loop {
            let (records, ledgers): (Vec<(InstanceKey, WriteOp)>, Vec<_>) = {
                let mut queue = shared.lock();
                if queue.is_idle() {
                    break;
                }
                queue.in_flight = true;
                let records = queue.pending.drain().collect();
                let ledgers: Vec<(FeatureType, Vec<InstanceId>)> = queue.slots.drain().collect();
                (records, ledgers)
            };

            let mut results = Vec::with_capacity(records.len() + ledgers.len());
            for (key, op) in records {
                let result = match &op {
                    WriteOp::Put(state) => storage.write(key, state),
                    WriteOp::Delete => storage.delete(key),
                };
                results.push((WriteTarget::Record(key), result));
            }
            for (feature, ids) in ledgers {
                results.push((WriteTarget::Slots(feature), storage.write_slots(feature, &ids)));
            }

            let mut failures = Vec::new();
            let mut healed = Vec::new();
            for (target, result) in results {
                match result {
                    Ok(()) => healed.push(target),
                    Err(err) => {
                        tracing::warn!(%target, backend = storage.name(), error = %err, "durable write failed");
                        failures.push(WriteFailure {
                            target,
                            message: err.to_string(),
                        });
                    }
                }
            }

            let mut queue = shared.lock();
            if let Some(current) = &queue.last_failure
                && healed.contains(&current.target)
            {
                queue.last_failure = None;
            }
            if let Some(failure) = failures.pop() {
                queue.last_failure = Some(failure);
            }
            queue.in_flight = false;
            shared.idle.notify_all();
        }

        let queue = shared.lock();
        if queue.shutting_down && queue.is_idle() {
            break;
        }
    }

    shared.lock().stopped = true;
    shared.idle.notify_all();
    tracing::debug!("writer thread stopped");
}
