#![forbid(unsafe_code)]

//! Runtime: instance lifecycle, persistence and surface orchestration.
//!
//! # Role in Flotilla
//! `flotilla-runtime` turns the pure pieces of `flotilla-core` into a running
//! system. It owns the id pools, the durable state of every instance, the
//! surfaces that show them, and the [`Coordinator`] that wires pointer input
//! through gesture engines into state commits.
//!
//! # Primary responsibilities
//! - **InstanceRegistry**: bounded, per-feature pools of reusable ids.
//! - **InstanceStateStore**: synchronous cache with write-behind persistence.
//! - **StorageBackend**: durable-storage contract (memory and file backends).
//! - **OverlayHost**: one surface per instance inside a [`HostContainer`].
//! - **Coordinator**: pointer routing, commits, lifecycle entry points.
//! - **Config / logging**: [`FlotillaConfig`] and subscriber setup.
//!
//! # Threads
//! Everything runs on the caller's dispatch context except durable writes,
//! which happen on a single `flotilla-writer` thread.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod headless;
pub mod logging;
pub mod overlay_host;
pub mod registry;
pub mod state_store;
pub mod storage;
pub mod write_behind;

pub use config::{ConfigError, FlotillaConfig};
pub use coordinator::{
    ControlLayout, Coordinator, DefaultControls, DispatchOutcome, LockAllOutcome, NoopSettings,
    RestoreReport, SettingsCollaborator, SkippedRecord,
};
pub use error::{CoordinatorError, HostError, StorageError, StoreError};
pub use headless::{ContainerCall, HeadlessContainer};
pub use logging::LoggingPolicy;
pub use overlay_host::{HostContainer, OverlayHost, SurfaceFlags, resolve_frame};
pub use registry::{Capacities, InstanceRegistry, MAX_CAPACITY};
pub use state_store::{ChangeFeed, InstanceStateStore, StateChange};
pub use storage::{FileStorage, MemoryStorage, StorageBackend, StoredRecord};
pub use write_behind::{WriteBehind, WriteFailure, WriteOp, WriteTarget};
