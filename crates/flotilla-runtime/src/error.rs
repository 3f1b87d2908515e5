#![forbid(unsafe_code)]

//! Typed errors for each runtime component.

use std::io;

use flotilla_core::{FeatureType, InstanceKey};
use thiserror::Error;

/// Failures of a durable-storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode record for {key}: {source}")]
    Encode {
        key: InstanceKey,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode {feature} slot ledger: {source}")]
    EncodeSlots {
        feature: FeatureType,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage backend '{backend}' rejected the write: {reason}")]
    Rejected {
        backend: &'static str,
        reason: String,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures of the instance state store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("instance {0} is not registered")]
    UnknownInstance(InstanceKey),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures reported by the overlay host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("host container refused surface for {key}: {reason}")]
    SurfaceRefused { key: InstanceKey, reason: String },
}

/// Failures of coordinator entry points.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("capacity reached for {feature} ({capacity} instances)")]
    CapacityReached { feature: FeatureType, capacity: u32 },
    #[error("instance {0} is not live")]
    UnknownInstance(InstanceKey),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
