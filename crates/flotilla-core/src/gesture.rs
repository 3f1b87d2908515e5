#![forbid(unsafe_code)]

//! Gesture recognition: transforms raw pointer events on one surface into
//! semantic interaction events.
//!
//! [`GestureEngine`] is a pure state machine. It never touches durable state:
//! feedback events describe where the surface should be drawn *right now*,
//! and only the `*Final` events carry a value meant to be committed.
//!
//! # State Machine
//!
//! ```text
//!            down (handle)                       up / cancel
//!   Idle ──────────────────────► ResizingCorner ─────────────► Idle
//!     │ down                                                  ▲
//!     ▼         move > slop                up / cancel        │
//!   Pending ─────────────────► Moving ─────────────────────────┤
//!     │  ▲  second down            │ second down               │
//!     │  │                         ▼                           │
//!     │  └──── one lift ──── ResizingPinch ──── cancel ────────┤
//!     └──────────────── up (tap?) / cancel ────────────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. Tap and `*Final` never both emit for the same interaction: once the
//!    session leaves `Pending` it is no longer tap-eligible.
//! 2. Move feedback is computed from a fixed baseline plus the total pointer
//!    delta, re-based only every [`GestureConfig::rebase_every`] samples.
//! 3. A corner resize never moves the anchor (opposite) corner, including
//!    when the minimum dimension clamps.
//! 4. Every emitted frame is clamped inside the container.
//! 5. A locked session never emits feedback or commits; only an
//!    `always_active` control may fire.
//!
//! # Failure Modes
//!
//! - Events for unknown pointers are ignored, never rejected.
//! - A third pointer during a pinch is ignored.
//! - If the platform cancels, the caller sends `Cancel` (or calls
//!   [`GestureEngine::cancel`]); feedback is dropped and nothing commits.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::event::{PointerEvent, PointerEventKind, PointerId};
use crate::geometry::{Point, Rect, Size, clamp_extent};
use crate::semantic_event::{ControlAction, InteractionEvent, ResizeMode, TapTarget};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default slop distance before a press becomes a drag.
pub const DEFAULT_SLOP: f32 = 8.0;

/// Default tap timeout.
pub const DEFAULT_TAP_TIMEOUT: Duration = Duration::from_millis(300);

/// Default side of the square corner-handle hit region.
pub const DEFAULT_HANDLE_EXTENT: f32 = 32.0;

/// Default number of move samples between baseline re-bases.
pub const DEFAULT_REBASE_EVERY: u32 = 120;

/// Thresholds and limits for gesture recognition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Distance a pointer must travel before a press becomes a drag.
    pub slop: f32,
    /// Longest press that still counts as a tap.
    pub tap_timeout: Duration,
    /// Side of the square hit region inside each frame corner.
    pub handle_extent: f32,
    /// Minimum surface dimensions for resize gestures.
    pub min_size: Size,
    /// Move samples between baseline re-bases during a long drag.
    pub rebase_every: u32,
    /// Floor for the initial pinch distance, so coincident pointers don't divide by zero.
    pub min_pinch_distance: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            slop: DEFAULT_SLOP,
            tap_timeout: DEFAULT_TAP_TIMEOUT,
            handle_extent: DEFAULT_HANDLE_EXTENT,
            min_size: Size::new(48.0, 48.0),
            rebase_every: DEFAULT_REBASE_EVERY,
            min_pinch_distance: 1.0,
        }
    }
}

impl GestureConfig {
    /// Check every threshold is usable.
    pub fn validate(&self) -> Result<(), GestureConfigError> {
        let positive = [
            ("slop", self.slop),
            ("handle_extent", self.handle_extent),
            ("min_width", self.min_size.width),
            ("min_height", self.min_size.height),
            ("min_pinch_distance", self.min_pinch_distance),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(GestureConfigError::NonPositive { field, value });
            }
        }
        if self.tap_timeout.is_zero() {
            return Err(GestureConfigError::ZeroTapTimeout);
        }
        if self.rebase_every == 0 {
            return Err(GestureConfigError::ZeroRebaseInterval);
        }
        Ok(())
    }
}

/// Validation errors for [`GestureConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum GestureConfigError {
    NonPositive { field: &'static str, value: f32 },
    ZeroTapTimeout,
    ZeroRebaseInterval,
}

impl fmt::Display for GestureConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositive { field, value } => {
                write!(f, "invalid {field} value {value} (must be finite and > 0)")
            }
            Self::ZeroTapTimeout => write!(f, "tap_timeout must be > 0"),
            Self::ZeroRebaseInterval => write!(f, "rebase_every must be > 0"),
        }
    }
}

impl std::error::Error for GestureConfigError {}

// ---------------------------------------------------------------------------
// Surface description
// ---------------------------------------------------------------------------

/// Frame corner carrying a resize handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// Hit-test order; bottom-right wins on tiny frames where handles overlap.
    pub const ALL: [Corner; 4] = [
        Self::BottomRight,
        Self::BottomLeft,
        Self::TopRight,
        Self::TopLeft,
    ];

    /// Whether dragging this handle moves the left edge.
    #[must_use]
    pub const fn moves_left_edge(self) -> bool {
        matches!(self, Self::TopLeft | Self::BottomLeft)
    }

    /// Whether dragging this handle moves the top edge.
    #[must_use]
    pub const fn moves_top_edge(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight)
    }

    /// The corner that stays fixed while this handle is dragged.
    #[must_use]
    pub const fn anchor(self) -> Corner {
        match self {
            Self::TopLeft => Self::BottomRight,
            Self::TopRight => Self::BottomLeft,
            Self::BottomLeft => Self::TopRight,
            Self::BottomRight => Self::TopLeft,
        }
    }

    /// Handle hit region of this corner for `frame`.
    #[must_use]
    pub fn handle_rect(self, frame: &Rect, extent: f32) -> Rect {
        let w = extent.min(frame.width);
        let h = extent.min(frame.height);
        let x = if self.moves_left_edge() {
            frame.x
        } else {
            frame.right() - w
        };
        let y = if self.moves_top_edge() {
            frame.y
        } else {
            frame.bottom() - h
        };
        Rect::new(x, y, w, h)
    }
}

/// A tappable control region, relative to the surface origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HotZone {
    pub rect: Rect,
    pub action: ControlAction,
    /// Hit-testable even when controls are hidden or the surface is locked.
    pub always_active: bool,
}

impl HotZone {
    #[must_use]
    pub const fn new(rect: Rect, action: ControlAction) -> Self {
        Self {
            rect,
            action,
            always_active: false,
        }
    }

    #[must_use]
    pub const fn always_active(mut self) -> Self {
        self.always_active = true;
        self
    }
}

/// Snapshot of the surface a pointer event is processed against.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceContext<'a> {
    /// Committed frame, already resolved against the container.
    pub frame: Rect,
    /// Container extent.
    pub bounds: Size,
    /// Pinch must preserve the aspect ratio.
    pub aspect_locked: bool,
    pub locked: bool,
    pub controls_visible: bool,
    pub hot_zones: &'a [HotZone],
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// Observable phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    Pending,
    Moving,
    ResizingCorner(Corner),
    ResizingPinch,
}

#[derive(Debug, Clone, Copy)]
struct TrackedPointer {
    id: PointerId,
    position: Point,
}

/// One open gesture session.
#[derive(Debug, Clone)]
struct Session {
    phase: GesturePhase,
    primary: TrackedPointer,
    secondary: Option<TrackedPointer>,
    anchor: Point,
    baseline: Rect,
    feedback: Rect,
    started_at: Instant,
    max_displacement: f32,
    tap_eligible: bool,
    locked: bool,
    samples_since_rebase: u32,
    pinch_distance: f32,
    /// A feedback frame has been emitted since the press armed.
    shown: bool,
}

impl Session {
    fn owns(&self, pointer_id: PointerId) -> bool {
        self.primary.id == pointer_id || self.secondary.is_some_and(|p| p.id == pointer_id)
    }

    fn track(&mut self, pointer_id: PointerId, position: Point) {
        if self.primary.id == pointer_id {
            self.primary.position = position;
            return;
        }
        if let Some(secondary) = self.secondary.as_mut().filter(|p| p.id == pointer_id) {
            secondary.position = position;
        }
    }

    fn has_feedback(&self) -> bool {
        self.shown
    }
}

// ---------------------------------------------------------------------------
// GestureEngine
// ---------------------------------------------------------------------------

/// Stateful per-surface gesture recognizer.
///
/// Call [`process`](GestureEngine::process) for each pointer event routed to
/// the surface.
#[derive(Debug, Clone)]
pub struct GestureEngine {
    config: GestureConfig,
    session: Option<Session>,
}

impl GestureEngine {
    /// Create an engine with the given configuration.
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> GesturePhase {
        self.session.as_ref().map_or(GesturePhase::Idle, |s| s.phase)
    }

    /// Whether a session is open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Whether `pointer_id` belongs to the open session.
    #[must_use]
    pub fn owns_pointer(&self, pointer_id: PointerId) -> bool {
        self.session.as_ref().is_some_and(|s| s.owns(pointer_id))
    }

    /// Current feedback frame while a gesture renders feedback.
    #[must_use]
    pub fn feedback(&self) -> Option<Rect> {
        self.session
            .as_ref()
            .filter(|s| s.has_feedback())
            .map(|s| s.feedback)
    }

    /// Process a pointer event, returning the semantic events produced.
    pub fn process(
        &mut self,
        event: &PointerEvent,
        ctx: &SurfaceContext<'_>,
    ) -> Vec<InteractionEvent> {
        let mut out = Vec::with_capacity(1);
        match event.kind {
            PointerEventKind::Down => {
                self.on_down(event.pointer_id, event.position, event.time, ctx);
            }
            PointerEventKind::Move => {
                self.on_move(event.pointer_id, event.position, ctx, &mut out);
            }
            PointerEventKind::Up => {
                self.on_up(event.pointer_id, event.position, event.time, ctx, &mut out);
            }
            PointerEventKind::Cancel => out.extend(self.cancel()),
        }
        out
    }

    /// Abandon the open session. Emits `Cancel` only if feedback was shown.
    pub fn cancel(&mut self) -> Option<InteractionEvent> {
        let session = self.session.take()?;
        crate::logging::trace!(phase = ?session.phase, "gesture cancelled");
        session.has_feedback().then_some(InteractionEvent::Cancel)
    }

    // -- transitions --------------------------------------------------------

    fn on_down(
        &mut self,
        pointer_id: PointerId,
        position: Point,
        time: Instant,
        ctx: &SurfaceContext<'_>,
    ) {
        let config = self.config;
        match self.session.as_mut() {
            None => {
                let baseline = ctx.frame.clamped_within(ctx.bounds, Size::default());
                let handle = if ctx.locked {
                    None
                } else {
                    Corner::ALL.into_iter().find(|corner| {
                        corner
                            .handle_rect(&baseline, config.handle_extent)
                            .contains(position)
                    })
                };
                let phase = handle.map_or(GesturePhase::Pending, GesturePhase::ResizingCorner);
                crate::logging::trace!(?phase, pointer_id, locked = ctx.locked, "gesture armed");
                self.session = Some(Session {
                    phase,
                    primary: TrackedPointer {
                        id: pointer_id,
                        position,
                    },
                    secondary: None,
                    anchor: position,
                    baseline,
                    feedback: baseline,
                    started_at: time,
                    max_displacement: 0.0,
                    tap_eligible: handle.is_none(),
                    locked: ctx.locked,
                    samples_since_rebase: 0,
                    pinch_distance: 0.0,
                    shown: false,
                });
            }
            Some(session) if session.owns(pointer_id) => {}
            Some(session) => {
                let can_pinch = !session.locked
                    && session.secondary.is_none()
                    && matches!(session.phase, GesturePhase::Pending | GesturePhase::Moving);
                if !can_pinch {
                    return;
                }
                session.secondary = Some(TrackedPointer {
                    id: pointer_id,
                    position,
                });
                session.baseline = session.feedback;
                session.pinch_distance = session
                    .primary
                    .position
                    .distance(position)
                    .max(config.min_pinch_distance);
                session.tap_eligible = false;
                session.phase = GesturePhase::ResizingPinch;
                crate::logging::trace!(
                    pointer_id,
                    distance = session.pinch_distance,
                    "gesture pinch started"
                );
            }
        }
    }

    fn on_move(
        &mut self,
        pointer_id: PointerId,
        position: Point,
        ctx: &SurfaceContext<'_>,
        out: &mut Vec<InteractionEvent>,
    ) {
        let config = self.config;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.owns(pointer_id) {
            return;
        }
        session.track(pointer_id, position);
        let is_primary = session.primary.id == pointer_id;

        match session.phase {
            GesturePhase::Idle => {}
            GesturePhase::Pending => {
                if !is_primary {
                    return;
                }
                let displacement = position.distance(session.anchor);
                session.max_displacement = session.max_displacement.max(displacement);
                if session.locked || displacement <= config.slop {
                    return;
                }
                session.phase = GesturePhase::Moving;
                session.tap_eligible = false;
                session.samples_since_rebase = 0;
                crate::logging::trace!(pointer_id, displacement, "gesture moving");
                out.push(move_feedback(session, position, ctx.bounds, &config));
            }
            GesturePhase::Moving => {
                if is_primary {
                    out.push(move_feedback(session, position, ctx.bounds, &config));
                }
            }
            GesturePhase::ResizingCorner(corner) => {
                if !is_primary {
                    return;
                }
                let (dx, dy) = position.delta_from(session.anchor);
                session.feedback =
                    corner_resize(session.baseline, corner, dx, dy, ctx.bounds, config.min_size);
                session.shown = true;
                out.push(InteractionEvent::ResizeFeedback {
                    mode: ResizeMode::Corner(corner),
                    frame: session.feedback,
                });
            }
            GesturePhase::ResizingPinch => {
                let Some(secondary) = session.secondary else {
                    return;
                };
                let distance = session.primary.position.distance(secondary.position);
                let scale = distance / session.pinch_distance;
                session.feedback = pinch_resize(
                    session.baseline,
                    scale,
                    ctx.bounds,
                    config.min_size,
                    ctx.aspect_locked,
                );
                session.shown = true;
                out.push(InteractionEvent::ResizeFeedback {
                    mode: ResizeMode::Pinch,
                    frame: session.feedback,
                });
            }
        }
    }

    fn on_up(
        &mut self,
        pointer_id: PointerId,
        position: Point,
        time: Instant,
        ctx: &SurfaceContext<'_>,
        out: &mut Vec<InteractionEvent>,
    ) {
        let config = self.config;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.owns(pointer_id) {
            return;
        }
        session.track(pointer_id, position);

        match session.phase {
            GesturePhase::Idle => self.session = None,
            GesturePhase::Pending => {
                if session.primary.id != pointer_id {
                    return;
                }
                let elapsed = time.saturating_duration_since(session.started_at);
                let displacement = session
                    .max_displacement
                    .max(position.distance(session.anchor));
                if session.tap_eligible
                    && elapsed < config.tap_timeout
                    && displacement < config.slop
                {
                    out.extend(resolve_tap(session, ctx));
                }
                self.session = None;
            }
            GesturePhase::Moving => {
                if session.primary.id == pointer_id {
                    out.push(InteractionEvent::MoveFinal {
                        frame: session.feedback,
                    });
                    self.session = None;
                }
            }
            GesturePhase::ResizingCorner(corner) => {
                if session.primary.id == pointer_id {
                    // A press on a handle that never moved commits nothing.
                    if session.shown {
                        out.push(InteractionEvent::ResizeFinal {
                            mode: ResizeMode::Corner(corner),
                            frame: session.feedback,
                        });
                    }
                    self.session = None;
                }
            }
            GesturePhase::ResizingPinch => {
                let Some(secondary) = session.secondary.take() else {
                    return;
                };
                if session.shown {
                    out.push(InteractionEvent::ResizeFinal {
                        mode: ResizeMode::Pinch,
                        frame: session.feedback,
                    });
                }
                let remaining = if session.primary.id == pointer_id {
                    secondary
                } else {
                    session.primary
                };
                // The remaining pointer starts a fresh, tap-ineligible press.
                session.primary = remaining;
                session.anchor = remaining.position;
                session.baseline = session.feedback;
                session.started_at = time;
                session.max_displacement = 0.0;
                session.tap_eligible = false;
                session.samples_since_rebase = 0;
                session.shown = false;
                session.phase = GesturePhase::Pending;
                crate::logging::trace!(
                    remaining = remaining.id,
                    "gesture pinch lifted, back to pending"
                );
            }
        }
    }
}

impl Default for GestureEngine {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Geometry of each gesture
// ---------------------------------------------------------------------------

fn move_feedback(
    session: &mut Session,
    position: Point,
    bounds: Size,
    config: &GestureConfig,
) -> InteractionEvent {
    let (dx, dy) = position.delta_from(session.anchor);
    let frame = session
        .baseline
        .translated(dx, dy)
        .clamped_within(bounds, Size::default());
    session.feedback = frame;
    session.shown = true;
    session.samples_since_rebase += 1;
    if session.samples_since_rebase >= config.rebase_every {
        session.baseline = frame;
        session.anchor = position;
        session.samples_since_rebase = 0;
    }
    InteractionEvent::MoveDelta { dx, dy, frame }
}

/// Resize from a corner handle, keeping the opposite corner fixed.
#[must_use]
pub fn corner_resize(
    baseline: Rect,
    corner: Corner,
    dx: f32,
    dy: f32,
    bounds: Size,
    min: Size,
) -> Rect {
    let (x, width) = if corner.moves_left_edge() {
        let anchor = baseline.right();
        let width = clamp_extent(baseline.width - dx, min.width, anchor);
        (anchor - width, width)
    } else {
        let anchor = baseline.x;
        let width = clamp_extent(baseline.width + dx, min.width, bounds.width - anchor);
        (anchor, width)
    };
    let (y, height) = if corner.moves_top_edge() {
        let anchor = baseline.bottom();
        let height = clamp_extent(baseline.height - dy, min.height, anchor);
        (anchor - height, height)
    } else {
        let anchor = baseline.y;
        let height = clamp_extent(baseline.height + dy, min.height, bounds.height - anchor);
        (anchor, height)
    };
    Rect::new(x, y, width, height)
}

/// Scale `baseline` about its centre, clamped to `[min, bounds]`.
#[must_use]
pub fn pinch_resize(
    baseline: Rect,
    scale: f32,
    bounds: Size,
    min: Size,
    aspect_locked: bool,
) -> Rect {
    let scale = if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    };
    let want_w = baseline.width * scale;
    let want_h = baseline.height * scale;
    let clamp_w = |w: f32| clamp_extent(w, min.width, bounds.width);
    let clamp_h = |h: f32| clamp_extent(h, min.height, bounds.height);
    let mut width = clamp_w(want_w);
    let mut height = clamp_h(want_h);

    if aspect_locked && baseline.width > 0.0 && baseline.height > 0.0 {
        let ratio = baseline.width / baseline.height;
        match (width != want_w, height != want_h) {
            (false, false) => {}
            (true, false) => height = clamp_h(width / ratio),
            (false, true) => width = clamp_w(height * ratio),
            (true, true) => {
                // Both axes hit a limit: keep the ratio on the tighter side.
                let fitted = if scale >= 1.0 {
                    width.min(height * ratio)
                } else {
                    width.max(height * ratio)
                };
                width = clamp_w(fitted);
                height = clamp_h(fitted / ratio);
            }
        }
    }

    let center = baseline.center();
    Rect::new(
        center.x - width / 2.0,
        center.y - height / 2.0,
        width,
        height,
    )
    .clamped_within(bounds, Size::default())
}

fn resolve_tap(session: &Session, ctx: &SurfaceContext<'_>) -> Option<InteractionEvent> {
    let origin = session.baseline.origin();
    let zone = ctx.hot_zones.iter().find(|zone| {
        let reachable = zone.always_active || (!session.locked && ctx.controls_visible);
        reachable && zone.rect.offset_by(origin).contains(session.anchor)
    });
    match zone {
        Some(zone) if zone.action == ControlAction::ToggleLock => Some(InteractionEvent::LockToggle),
        Some(zone) => Some(InteractionEvent::Tap {
            position: session.anchor,
            target: TapTarget::Control(zone.action),
        }),
        None if session.locked => None,
        None => Some(InteractionEvent::Tap {
            position: session.anchor,
            target: TapTarget::Surface,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: Size = Size::new(1080.0, 1920.0);
    const MS_50: Duration = Duration::from_millis(50);
    const MS_500: Duration = Duration::from_millis(500);

    fn frame() -> Rect {
        Rect::new(100.0, 100.0, 200.0, 200.0)
    }

    fn ctx(zones: &[HotZone]) -> SurfaceContext<'_> {
        SurfaceContext {
            frame: frame(),
            bounds: BOUNDS,
            aspect_locked: false,
            locked: false,
            controls_visible: true,
            hot_zones: zones,
        }
    }

    fn locked_ctx(zones: &[HotZone]) -> SurfaceContext<'_> {
        SurfaceContext {
            locked: true,
            ..ctx(zones)
        }
    }

    fn zones() -> Vec<HotZone> {
        vec![
            HotZone::new(Rect::new(80.0, 0.0, 40.0, 40.0), ControlAction::ToggleLock)
                .always_active(),
            HotZone::new(Rect::new(80.0, 160.0, 40.0, 40.0), ControlAction::OpenSettings),
        ]
    }

    fn engine() -> GestureEngine {
        GestureEngine::new(GestureConfig::default())
    }

    // --- Tap ---

    #[test]
    fn short_press_is_a_tap() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        assert!(ge.process(&PointerEvent::down(1, 200.0, 200.0, t), &c).is_empty());
        assert_eq!(ge.phase(), GesturePhase::Pending);
        assert!(ge.process(&PointerEvent::moved(1, 203.0, 202.0, t), &c).is_empty());
        let events = ge.process(&PointerEvent::up(1, 203.0, 202.0, t + MS_50), &c);
        assert_eq!(
            events,
            vec![InteractionEvent::Tap {
                position: Point::new(200.0, 200.0),
                target: TapTarget::Surface,
            }]
        );
        assert_eq!(ge.phase(), GesturePhase::Idle);
    }

    #[test]
    fn long_press_is_not_a_tap() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 200.0, 200.0, t), &c);
        let events = ge.process(&PointerEvent::up(1, 200.0, 200.0, t + MS_500), &c);
        assert!(events.is_empty());
    }

    #[test]
    fn tap_on_hot_zone_routes_to_control() {
        let mut ge = engine();
        let z = zones();
        let c = ctx(&z);
        let t = Instant::now();
        // Settings zone sits at local (80,160) => absolute (180,260).
        ge.process(&PointerEvent::down(1, 190.0, 270.0, t), &c);
        let events = ge.process(&PointerEvent::up(1, 190.0, 270.0, t + MS_50), &c);
        assert_eq!(
            events,
            vec![InteractionEvent::Tap {
                position: Point::new(190.0, 270.0),
                target: TapTarget::Control(ControlAction::OpenSettings),
            }]
        );
    }

    #[test]
    fn hidden_controls_fall_through_to_surface() {
        let mut ge = engine();
        let z = zones();
        let c = SurfaceContext {
            controls_visible: false,
            ..ctx(&z)
        };
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 190.0, 270.0, t), &c);
        let events = ge.process(&PointerEvent::up(1, 190.0, 270.0, t + MS_50), &c);
        assert!(matches!(
            events[..],
            [InteractionEvent::Tap {
                target: TapTarget::Surface,
                ..
            }]
        ));
    }

    #[test]
    fn lock_zone_emits_lock_toggle() {
        let mut ge = engine();
        let z = zones();
        let c = ctx(&z);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 190.0, 110.0, t), &c);
        let events = ge.process(&PointerEvent::up(1, 190.0, 110.0, t + MS_50), &c);
        assert_eq!(events, vec![InteractionEvent::LockToggle]);
    }

    // --- Move ---

    #[test]
    fn drag_beyond_slop_moves_from_fixed_baseline() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 200.0, 200.0, t), &c);
        let events = ge.process(&PointerEvent::moved(1, 230.0, 210.0, t), &c);
        assert_eq!(ge.phase(), GesturePhase::Moving);
        assert_eq!(
            events,
            vec![InteractionEvent::MoveDelta {
                dx: 30.0,
                dy: 10.0,
                frame: Rect::new(130.0, 110.0, 200.0, 200.0),
            }]
        );
        let events = ge.process(&PointerEvent::moved(1, 260.0, 240.0, t), &c);
        assert_eq!(events[0].frame(), Some(Rect::new(160.0, 140.0, 200.0, 200.0)));

        let events = ge.process(&PointerEvent::up(1, 260.0, 240.0, t + MS_500), &c);
        assert_eq!(
            events,
            vec![InteractionEvent::MoveFinal {
                frame: Rect::new(160.0, 140.0, 200.0, 200.0),
            }]
        );
        assert!(!ge.is_active());
    }

    #[test]
    fn move_is_clamped_to_container() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 200.0, 200.0, t), &c);
        let events = ge.process(&PointerEvent::moved(1, -500.0, 5000.0, t), &c);
        assert_eq!(events[0].frame(), Some(Rect::new(0.0, 1720.0, 200.0, 200.0)));
    }

    #[test]
    fn long_drag_rebases_periodically() {
        let config = GestureConfig {
            rebase_every: 2,
            ..GestureConfig::default()
        };
        let mut ge = GestureEngine::new(config);
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 200.0, 200.0, t), &c);
        // Push far off the left edge: the frame pins at x=0.
        ge.process(&PointerEvent::moved(1, -400.0, 200.0, t), &c);
        ge.process(&PointerEvent::moved(1, -500.0, 200.0, t), &c);
        // Re-based at x=0 / pointer -500; coming back 50 moves the frame 50.
        let events = ge.process(&PointerEvent::moved(1, -450.0, 200.0, t), &c);
        assert_eq!(
            events,
            vec![InteractionEvent::MoveDelta {
                dx: 50.0,
                dy: 0.0,
                frame: Rect::new(50.0, 100.0, 200.0, 200.0),
            }]
        );
    }

    // --- Corner resize ---

    #[test]
    fn bottom_right_handle_grows_without_moving_origin() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 295.0, 295.0, t), &c);
        assert_eq!(ge.phase(), GesturePhase::ResizingCorner(Corner::BottomRight));
        ge.process(&PointerEvent::moved(1, 345.0, 325.0, t), &c);
        let events = ge.process(&PointerEvent::up(1, 345.0, 325.0, t + MS_500), &c);
        assert_eq!(
            events,
            vec![InteractionEvent::ResizeFinal {
                mode: ResizeMode::Corner(Corner::BottomRight),
                frame: Rect::new(100.0, 100.0, 250.0, 230.0),
            }]
        );
    }

    #[test]
    fn handle_press_without_motion_commits_nothing() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 295.0, 295.0, t), &c);
        assert_eq!(ge.phase(), GesturePhase::ResizingCorner(Corner::BottomRight));
        assert_eq!(ge.feedback(), None);
        assert!(ge.process(&PointerEvent::up(1, 295.0, 295.0, t + MS_50), &c).is_empty());
        assert!(!ge.is_active());

        ge.process(&PointerEvent::down(1, 295.0, 295.0, t), &c);
        assert_eq!(ge.cancel(), None);
    }

    #[test]
    fn pinch_lift_without_motion_commits_nothing() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 150.0, 200.0, t), &c);
        ge.process(&PointerEvent::down(2, 250.0, 200.0, t), &c);
        assert!(ge.process(&PointerEvent::up(2, 250.0, 200.0, t), &c).is_empty());
        assert_eq!(ge.phase(), GesturePhase::Pending);
    }

    #[test]
    fn top_left_handle_shifts_origin() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 105.0, 105.0, t), &c);
        assert_eq!(ge.phase(), GesturePhase::ResizingCorner(Corner::TopLeft));
        let events = ge.process(&PointerEvent::moved(1, 125.0, 135.0, t), &c);
        assert_eq!(events[0].frame(), Some(Rect::new(120.0, 130.0, 180.0, 170.0)));
    }

    #[test]
    fn top_left_min_clamp_keeps_bottom_right_anchor() {
        let frame = corner_resize(
            Rect::new(100.0, 100.0, 200.0, 200.0),
            Corner::TopLeft,
            500.0,
            500.0,
            BOUNDS,
            Size::new(48.0, 48.0),
        );
        assert_eq!(frame, Rect::new(252.0, 252.0, 48.0, 48.0));
        assert_eq!(frame.right(), 300.0);
        assert_eq!(frame.bottom(), 300.0);
    }

    #[test]
    fn corner_resize_stops_at_container_edge() {
        let frame = corner_resize(
            Rect::new(900.0, 100.0, 100.0, 100.0),
            Corner::BottomRight,
            500.0,
            0.0,
            BOUNDS,
            Size::new(48.0, 48.0),
        );
        assert_eq!(frame, Rect::new(900.0, 100.0, 180.0, 100.0));
    }

    // --- Pinch ---

    #[test]
    fn second_pointer_switches_to_pinch() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 150.0, 200.0, t), &c);
        ge.process(&PointerEvent::down(2, 250.0, 200.0, t), &c);
        assert_eq!(ge.phase(), GesturePhase::ResizingPinch);
        // Distance 100 -> 150: scale 1.5 about the centre (200,200).
        let events = ge.process(&PointerEvent::moved(2, 300.0, 200.0, t), &c);
        assert_eq!(
            events,
            vec![InteractionEvent::ResizeFeedback {
                mode: ResizeMode::Pinch,
                frame: Rect::new(50.0, 50.0, 300.0, 300.0),
            }]
        );
    }

    #[test]
    fn second_pointer_mid_move_takes_precedence() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 150.0, 200.0, t), &c);
        ge.process(&PointerEvent::moved(1, 170.0, 200.0, t), &c);
        assert_eq!(ge.phase(), GesturePhase::Moving);
        ge.process(&PointerEvent::down(2, 270.0, 200.0, t), &c);
        assert_eq!(ge.phase(), GesturePhase::ResizingPinch);
        // Pinch baseline is the moved frame.
        let events = ge.process(&PointerEvent::moved(2, 270.0, 200.0, t), &c);
        assert_eq!(events[0].frame(), Some(Rect::new(120.0, 100.0, 200.0, 200.0)));
    }

    #[test]
    fn lifting_one_pinch_pointer_commits_and_rearms() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 150.0, 200.0, t), &c);
        ge.process(&PointerEvent::down(2, 250.0, 200.0, t), &c);
        ge.process(&PointerEvent::moved(2, 350.0, 200.0, t), &c);
        let events = ge.process(&PointerEvent::up(1, 150.0, 200.0, t), &c);
        assert_eq!(
            events,
            vec![InteractionEvent::ResizeFinal {
                mode: ResizeMode::Pinch,
                frame: Rect::new(0.0, 0.0, 400.0, 400.0),
            }]
        );
        assert_eq!(ge.phase(), GesturePhase::Pending);
        assert!(ge.owns_pointer(2));
        // The remaining pointer may drag from the new baseline.
        let events = ge.process(&PointerEvent::moved(2, 400.0, 250.0, t), &c);
        assert_eq!(events[0].frame(), Some(Rect::new(50.0, 50.0, 400.0, 400.0)));
    }

    #[test]
    fn release_after_pinch_without_move_is_not_a_tap() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 150.0, 200.0, t), &c);
        ge.process(&PointerEvent::down(2, 250.0, 200.0, t), &c);
        ge.process(&PointerEvent::up(2, 250.0, 200.0, t), &c);
        let events = ge.process(&PointerEvent::up(1, 150.0, 200.0, t + MS_50), &c);
        assert!(events.is_empty());
        assert!(!ge.is_active());
    }

    #[test]
    fn pinch_clamps_each_axis_independently() {
        let frame = pinch_resize(
            Rect::new(400.0, 400.0, 400.0, 100.0),
            0.25,
            BOUNDS,
            Size::new(48.0, 48.0),
            false,
        );
        assert_eq!(frame.size(), Size::new(100.0, 48.0));
    }

    #[test]
    fn aspect_locked_pinch_recomputes_other_axis() {
        let frame = pinch_resize(
            Rect::new(400.0, 400.0, 400.0, 100.0),
            0.25,
            BOUNDS,
            Size::new(48.0, 48.0),
            true,
        );
        // Height clamped at 48, width follows the 4:1 ratio.
        assert_eq!(frame.size(), Size::new(192.0, 48.0));
    }

    #[test]
    fn third_pointer_is_ignored() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 150.0, 200.0, t), &c);
        ge.process(&PointerEvent::down(2, 250.0, 200.0, t), &c);
        ge.process(&PointerEvent::down(3, 260.0, 260.0, t), &c);
        assert!(!ge.owns_pointer(3));
        assert!(ge.process(&PointerEvent::moved(3, 10.0, 10.0, t), &c).is_empty());
    }

    #[test]
    fn corner_resize_ignores_second_pointer() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 295.0, 295.0, t), &c);
        ge.process(&PointerEvent::down(2, 150.0, 150.0, t), &c);
        assert_eq!(ge.phase(), GesturePhase::ResizingCorner(Corner::BottomRight));
    }

    // --- Cancel ---

    #[test]
    fn cancel_during_move_discards_feedback() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 200.0, 200.0, t), &c);
        ge.process(&PointerEvent::moved(1, 260.0, 260.0, t), &c);
        let events = ge.process(&PointerEvent::cancel(1, t), &c);
        assert_eq!(events, vec![InteractionEvent::Cancel]);
        assert_eq!(ge.phase(), GesturePhase::Idle);
        assert_eq!(ge.feedback(), None);
    }

    #[test]
    fn cancel_while_pending_emits_nothing() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 200.0, 200.0, t), &c);
        assert_eq!(ge.cancel(), None);
        assert!(!ge.is_active());
    }

    // --- Locked ---

    #[test]
    fn locked_surface_ignores_drag_and_handles() {
        let mut ge = engine();
        let c = locked_ctx(&[]);
        let t = Instant::now();
        ge.process(&PointerEvent::down(1, 295.0, 295.0, t), &c);
        assert_eq!(ge.phase(), GesturePhase::Pending);
        assert!(ge.process(&PointerEvent::moved(1, 500.0, 500.0, t), &c).is_empty());
        assert!(ge.process(&PointerEvent::down(2, 150.0, 150.0, t), &c).is_empty());
        assert_eq!(ge.phase(), GesturePhase::Pending);
        assert!(ge.process(&PointerEvent::up(1, 500.0, 500.0, t + MS_50), &c).is_empty());
    }

    #[test]
    fn locked_surface_only_fires_always_active_control() {
        let mut ge = engine();
        let z = zones();
        let c = locked_ctx(&z);
        let t = Instant::now();

        ge.process(&PointerEvent::down(1, 190.0, 270.0, t), &c);
        assert!(ge.process(&PointerEvent::up(1, 190.0, 270.0, t + MS_50), &c).is_empty());

        ge.process(&PointerEvent::down(1, 200.0, 200.0, t), &c);
        assert!(ge.process(&PointerEvent::up(1, 200.0, 200.0, t + MS_50), &c).is_empty());

        ge.process(&PointerEvent::down(1, 190.0, 110.0, t), &c);
        let events = ge.process(&PointerEvent::up(1, 190.0, 110.0, t + MS_50), &c);
        assert_eq!(events, vec![InteractionEvent::LockToggle]);
    }

    // --- Config ---

    #[test]
    fn config_validation() {
        assert!(GestureConfig::default().validate().is_ok());
        let bad = GestureConfig {
            slop: 0.0,
            ..GestureConfig::default()
        };
        assert_eq!(
            bad.validate(),
            Err(GestureConfigError::NonPositive {
                field: "slop",
                value: 0.0
            })
        );
        let bad = GestureConfig {
            rebase_every: 0,
            ..GestureConfig::default()
        };
        assert_eq!(bad.validate(), Err(GestureConfigError::ZeroRebaseInterval));
    }

    #[test]
    fn unknown_pointer_events_are_ignored() {
        let mut ge = engine();
        let c = ctx(&[]);
        let t = Instant::now();
        assert!(ge.process(&PointerEvent::moved(9, 1.0, 1.0, t), &c).is_empty());
        assert!(ge.process(&PointerEvent::up(9, 1.0, 1.0, t), &c).is_empty());
        ge.process(&PointerEvent::down(1, 200.0, 200.0, t), &c);
        assert!(ge.process(&PointerEvent::up(9, 1.0, 1.0, t), &c).is_empty());
        assert_eq!(ge.phase(), GesturePhase::Pending);
    }
}
