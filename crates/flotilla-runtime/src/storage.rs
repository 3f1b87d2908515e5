#![forbid(unsafe_code)]

//! Durable-storage contract and the two built-in backends.
//!
//! A backend stores one JSON document per instance plus a per-feature slot
//! ledger. Writes carry a full snapshot, so a backend never needs to merge.
//!
//! # Backends
//!
//! | Backend | Location | Use |
//! |---------|----------|-----|
//! | [`MemoryStorage`] | in-process map | tests, embedders without a disk |
//! | [`FileStorage`] | `<root>/<feature>/<id>.json` | production |
//!
//! [`FileStorage`] writes through a temp file and `rename`, so a crash leaves
//! either the previous record or the new one, never a partial file.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use flotilla_core::{FeatureType, InstanceId, InstanceKey, InstanceState};

use crate::error::StorageError;

/// Name of the slot ledger inside each feature directory.
pub const SLOTS_FILE: &str = "slots.json";

/// One record read back at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredRecord {
    Valid {
        id: InstanceId,
        state: InstanceState,
    },
    /// Unreadable or inconsistent record; `id` is known when the record's
    /// location still names a slot.
    Malformed {
        id: Option<InstanceId>,
        reason: String,
    },
}

/// Durable-storage collaborator.
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Durably store the full state of one instance.
    fn write(&self, key: InstanceKey, state: &InstanceState) -> Result<(), StorageError>;

    /// Every record of one feature type.
    fn read_all(&self, feature: FeatureType) -> Result<Vec<StoredRecord>, StorageError>;

    /// Remove a record. Removing a missing record succeeds.
    fn delete(&self, key: InstanceKey) -> Result<(), StorageError>;

    /// Replace the slot ledger of one feature type.
    fn write_slots(&self, feature: FeatureType, ids: &[InstanceId]) -> Result<(), StorageError>;

    /// Slot ledger of one feature type; empty when never written.
    fn read_slots(&self, feature: FeatureType) -> Result<Vec<InstanceId>, StorageError>;
}

fn encode(key: InstanceKey, state: &InstanceState) -> Result<String, StorageError> {
    serde_json::to_string_pretty(state).map_err(|source| StorageError::Encode { key, source })
}

fn decode(feature: FeatureType, id: Option<InstanceId>, raw: &str) -> StoredRecord {
    let Some(id) = id else {
        return StoredRecord::Malformed {
            id: None,
            reason: "record name is not a slot id".to_string(),
        };
    };
    match serde_json::from_str::<InstanceState>(raw) {
        Ok(state) => match state.validate_for(feature) {
            Ok(()) => StoredRecord::Valid { id, state },
            Err(reason) => StoredRecord::Malformed { id: Some(id), reason },
        },
        Err(err) => StoredRecord::Malformed {
            id: Some(id),
            reason: err.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// In-process backend. Records still round-trip through JSON so encoding
/// problems surface the same way they would on disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<BTreeMap<InstanceKey, String>>,
    slots: Mutex<BTreeMap<FeatureType, Vec<InstanceId>>>,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent record or ledger write fail until turned off
    /// again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful record writes.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Decoded record for `key`, if present and well-formed.
    #[must_use]
    pub fn record(&self, key: InstanceKey) -> Option<InstanceState> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::from_str(records.get(&key)?).ok()
    }

    /// Store raw text as a record, bypassing encoding.
    pub fn insert_raw(&self, key: InstanceKey, raw: impl Into<String>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, raw.into());
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn write(&self, key: InstanceKey, state: &InstanceState) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected {
                backend: self.name(),
                reason: "write failure injected".to_string(),
            });
        }
        let raw = encode(key, state)?;
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, raw);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_all(&self, feature: FeatureType) -> Result<Vec<StoredRecord>, StorageError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .filter(|(key, _)| key.feature == feature)
            .map(|(key, raw)| decode(feature, Some(key.id), raw))
            .collect())
    }

    fn delete(&self, key: InstanceKey) -> Result<(), StorageError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        Ok(())
    }

    fn write_slots(&self, feature: FeatureType, ids: &[InstanceId]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected {
                backend: self.name(),
                reason: "write failure injected".to_string(),
            });
        }
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(feature, ids.to_vec());
        Ok(())
    }

    fn read_slots(&self, feature: FeatureType) -> Result<Vec<InstanceId>, StorageError> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(&feature).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// FileStorage
// ---------------------------------------------------------------------------

/// One JSON file per instance under a root directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage root.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        for feature in FeatureType::ALL {
            let dir = root.join(feature.as_str());
            fs::create_dir_all(&dir).map_err(|err| StorageError::io(dir.display().to_string(), err))?;
        }
        Ok(Self { root })
    }

    /// Storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn feature_dir(&self, feature: FeatureType) -> PathBuf {
        self.root.join(feature.as_str())
    }

    fn record_path(&self, key: InstanceKey) -> PathBuf {
        self.feature_dir(key.feature).join(format!("{}.json", key.id))
    }

    fn write_atomic(path: &Path, contents: &str) -> Result<(), StorageError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(|err| StorageError::io(tmp.display().to_string(), err))?;
        fs::rename(&tmp, path).map_err(|err| StorageError::io(path.display().to_string(), err))
    }
}

impl StorageBackend for FileStorage {
    fn name(&self) -> &'static str {
        "file"
    }

    fn write(&self, key: InstanceKey, state: &InstanceState) -> Result<(), StorageError> {
        let raw = encode(key, state)?;
        Self::write_atomic(&self.record_path(key), &raw)
    }

    fn read_all(&self, feature: FeatureType) -> Result<Vec<StoredRecord>, StorageError> {
        let dir = self.feature_dir(feature);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::io(dir.display().to_string(), err)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|err| StorageError::io(dir.display().to_string(), err))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json")
                || path.file_name().and_then(|name| name.to_str()) == Some(SLOTS_FILE)
            {
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u32>().ok())
                .and_then(InstanceId::new);
            let record = match fs::read_to_string(&path) {
                Ok(raw) => decode(feature, id, &raw),
                Err(err) => StoredRecord::Malformed {
                    id,
                    reason: err.to_string(),
                },
            };
            records.push(record);
        }
        records.sort_by_key(|record| match record {
            StoredRecord::Valid { id, .. } => Some(*id),
            StoredRecord::Malformed { id, .. } => *id,
        });
        Ok(records)
    }

    fn delete(&self, key: InstanceKey) -> Result<(), StorageError> {
        let path = self.record_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::io(path.display().to_string(), err)),
        }
    }

    fn write_slots(&self, feature: FeatureType, ids: &[InstanceId]) -> Result<(), StorageError> {
        let path = self.feature_dir(feature).join(SLOTS_FILE);
        let raw = serde_json::to_string(ids)
            .map_err(|source| StorageError::EncodeSlots { feature, source })?;
        Self::write_atomic(&path, &raw)
    }

    fn read_slots(&self, feature: FeatureType) -> Result<Vec<InstanceId>, StorageError> {
        let path = self.feature_dir(feature).join(SLOTS_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::io(path.display().to_string(), err)),
        };
        serde_json::from_str(&raw).map_err(|source| StorageError::Decode {
            path: path.display().to_string(),
            source,
        })
    }
}
