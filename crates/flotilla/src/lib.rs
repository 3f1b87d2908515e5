#![forbid(unsafe_code)]

//! Flotilla public facade crate.
//!
//! Re-exports the types an embedder needs from the internal crates, the
//! unified [`Error`], and a prelude for day-to-day use.
//!
//! ```no_run
//! use flotilla::prelude::*;
//!
//! fn run() -> flotilla::Result<()> {
//!     let config = FlotillaConfig::from_toml_file("flotilla.toml")?;
//!     flotilla::runtime::logging::init(&config.logging);
//!
//!     let container = HeadlessContainer::new(Size::new(1080.0, 1920.0));
//!     let mut coordinator = Coordinator::from_config(&config, container)?;
//!     coordinator.restore();
//!     let key = coordinator.add_instance(FeatureType::Spotlight)?;
//!     coordinator.close_instance(key)?;
//!     coordinator.shutdown();
//!     Ok(())
//! }
//! ```

pub mod error;

pub use error::{Error, Result, Severity};

// --- Core re-exports -------------------------------------------------------

pub use flotilla_core::{
    ControlAction, Corner, FeaturePayload, FeatureType, GestureConfig, GestureConfigError,
    GestureEngine, GesturePhase, HotZone, InstanceId, InstanceKey, InstanceState,
    InteractionEvent, Point, PointerEvent, PointerEventKind, PointerId, Rect, ResizeMode, Size,
    SpotlightShape, SurfaceContext, TapTarget,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use flotilla_runtime::{
    Capacities, ChangeFeed, ControlLayout, Coordinator, DefaultControls, DispatchOutcome,
    FileStorage, FlotillaConfig, HeadlessContainer, HostContainer, InstanceRegistry,
    InstanceStateStore, LockAllOutcome, MemoryStorage, RestoreReport, SettingsCollaborator,
    StateChange, StorageBackend, SurfaceFlags,
};

// --- Crate re-exports ------------------------------------------------------

pub use flotilla_core as core;
#[cfg(feature = "runtime")]
pub use flotilla_runtime as runtime;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ControlAction, Error, FeatureType, InstanceKey, InstanceState, InteractionEvent, Point,
        PointerEvent, Rect, Result, Severity, Size,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{
        Coordinator, DispatchOutcome, FlotillaConfig, HeadlessContainer, HostContainer,
        LockAllOutcome,
    };

    pub use crate::core;
    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}
