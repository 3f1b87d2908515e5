#![forbid(unsafe_code)]

//! Core: geometry, pointer events, gesture recognition, and the instance model.
//!
//! # Role in Flotilla
//! `flotilla-core` is the input layer. It owns the normalized pointer event
//! types, the [`gesture::GestureEngine`] state machine that turns them into
//! semantic interaction events, and the plain-data instance model that the
//! runtime persists.
//!
//! # Primary responsibilities
//! - **Geometry**: device-independent points, sizes, frames and clamping.
//! - **PointerEvent**: canonical multi-pointer input (down, move, up, cancel).
//! - **GestureEngine**: tap / move / corner-resize / pinch disambiguation.
//! - **Instance model**: feature types, ids, and durable instance state.
//!
//! # How it fits in the system
//! The runtime (`flotilla-runtime`) feeds pointer events into one engine per
//! surface and routes the resulting [`semantic_event::InteractionEvent`]s to
//! its state store and overlay host. Nothing in this crate performs I/O or
//! spawns threads.

pub mod event;
pub mod geometry;
pub mod gesture;
pub mod instance;
pub mod logging;
pub mod semantic_event;

pub use event::{PointerEvent, PointerEventKind, PointerId};
pub use geometry::{Point, Rect, SIZE_FILL, Size};
pub use gesture::{
    Corner, GestureConfig, GestureConfigError, GestureEngine, GesturePhase, HotZone,
    SurfaceContext,
};
pub use instance::{
    FeaturePayload, FeatureType, InstanceId, InstanceKey, InstanceState, SpotlightShape,
};
pub use semantic_event::{ControlAction, InteractionEvent, ResizeMode, TapTarget};
