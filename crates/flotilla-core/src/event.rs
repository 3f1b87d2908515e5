#![forbid(unsafe_code)]

//! Canonical pointer input events.
//!
//! Touch contacts and mouse buttons are both normalized into
//! [`PointerEvent`]s carrying a stable pointer id for the lifetime of one
//! contact. Positions are in container coordinates.

use web_time::Instant;

use crate::geometry::Point;

/// Identifier of one pointer contact, stable from down to up/cancel.
pub type PointerId = u32;

/// Kind of pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerEventKind {
    /// Contact started.
    Down,
    /// Contact moved.
    Move,
    /// Contact lifted.
    Up,
    /// Platform-forced interruption; the whole session is abandoned.
    Cancel,
}

/// One pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub pointer_id: PointerId,
    pub position: Point,
    pub time: Instant,
}

impl PointerEvent {
    /// Create an event.
    #[must_use]
    pub const fn new(
        kind: PointerEventKind,
        pointer_id: PointerId,
        position: Point,
        time: Instant,
    ) -> Self {
        Self {
            kind,
            pointer_id,
            position,
            time,
        }
    }

    /// Shorthand for a `Down` event.
    #[must_use]
    pub fn down(pointer_id: PointerId, x: f32, y: f32, time: Instant) -> Self {
        Self::new(PointerEventKind::Down, pointer_id, Point::new(x, y), time)
    }

    /// Shorthand for a `Move` event.
    #[must_use]
    pub fn moved(pointer_id: PointerId, x: f32, y: f32, time: Instant) -> Self {
        Self::new(PointerEventKind::Move, pointer_id, Point::new(x, y), time)
    }

    /// Shorthand for an `Up` event.
    #[must_use]
    pub fn up(pointer_id: PointerId, x: f32, y: f32, time: Instant) -> Self {
        Self::new(PointerEventKind::Up, pointer_id, Point::new(x, y), time)
    }

    /// Shorthand for a `Cancel` event.
    #[must_use]
    pub fn cancel(pointer_id: PointerId, time: Instant) -> Self {
        Self::new(PointerEventKind::Cancel, pointer_id, Point::default(), time)
    }
}
