#![forbid(unsafe_code)]

//! Semantic interaction events produced by the gesture engine.
//!
//! [`InteractionEvent`] represents what the user *meant* on one surface rather
//! than raw pointer coordinates.
//!
//! # Invariants
//! 1. Every feedback sequence is well-formed: zero or more `MoveDelta` end in
//!    exactly one `MoveFinal` or `Cancel`; likewise `ResizeFeedback` ends in
//!    `ResizeFinal` or `Cancel` (a pinch lift ends the sequence early with
//!    `ResizeFinal`).
//! 2. `Tap` and `*Final` never both emit for the same down → up interaction.
//! 3. Feedback frames are always clamped within the container.
//! 4. `Cancel` carries no geometry; it only tells the host to drop feedback.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::gesture::Corner;

/// Action bound to a control hot zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    ToggleLock,
    ToggleControls,
    ToggleHighlight,
    OpenSettings,
    Close,
    /// Embedder-defined action, passed back to the caller untouched.
    Custom(u16),
}

/// What a tap landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TapTarget {
    /// A control hot zone.
    Control(ControlAction),
    /// The surface body; no hot zone matched.
    Surface,
}

/// Which resize gesture produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Dragging the handle at this corner; the opposite corner is the anchor.
    Corner(Corner),
    /// Two-pointer pinch.
    Pinch,
}

/// High-level interaction events for one surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InteractionEvent {
    /// Short, stationary press.
    Tap { position: Point, target: TapTarget },
    /// Live drag feedback; `dx`/`dy` are relative to the current baseline.
    MoveDelta { dx: f32, dy: f32, frame: Rect },
    /// Drag ended; `frame` is the value to commit.
    MoveFinal { frame: Rect },
    /// Live resize feedback.
    ResizeFeedback { mode: ResizeMode, frame: Rect },
    /// Resize ended; `frame` is the value to commit.
    ResizeFinal { mode: ResizeMode, frame: Rect },
    /// The lock control was tapped.
    LockToggle,
    /// An open gesture was abandoned; drop feedback, commit nothing.
    Cancel,
}

impl InteractionEvent {
    /// Whether the event is visual-only feedback.
    #[must_use]
    pub const fn is_feedback(&self) -> bool {
        matches!(self, Self::MoveDelta { .. } | Self::ResizeFeedback { .. })
    }

    /// Whether the event ends a gesture with a value to persist.
    #[must_use]
    pub const fn is_commit(&self) -> bool {
        matches!(self, Self::MoveFinal { .. } | Self::ResizeFinal { .. })
    }

    /// Frame carried by feedback and commit events.
    #[must_use]
    pub const fn frame(&self) -> Option<Rect> {
        match self {
            Self::MoveDelta { frame, .. }
            | Self::MoveFinal { frame }
            | Self::ResizeFeedback { frame, .. }
            | Self::ResizeFinal { frame, .. } => Some(*frame),
            _ => None,
        }
    }
}
