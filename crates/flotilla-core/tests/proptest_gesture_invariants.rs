//! Property-based invariant tests for the gesture engine.
//!
//! 1. A press resolves to a tap or a move, never both
//! 2. Move feedback never leaves the container
//! 3. Corner resize keeps the opposite corner fixed
//! 4. Pinch output stays within `[min, bounds]`
//! 5. Aspect-locked pinch preserves the ratio when unconstrained
//! 6. Cancel reports only sessions that showed feedback

use std::time::Duration;

use flotilla_core::gesture::{corner_resize, pinch_resize};
use flotilla_core::{
    Corner, GestureEngine, InteractionEvent, Point, PointerEvent, Rect, Size, SurfaceContext,
};
use proptest::prelude::*;
use web_time::Instant;

const BOUNDS: Size = Size::new(1080.0, 1920.0);
const EPS: f32 = 1e-3;

fn ctx(frame: Rect) -> SurfaceContext<'static> {
    SurfaceContext {
        frame,
        bounds: BOUNDS,
        aspect_locked: false,
        locked: false,
        controls_visible: true,
        hot_zones: &[],
    }
}

fn within_bounds(frame: Rect) -> bool {
    frame.x >= -EPS
        && frame.y >= -EPS
        && frame.right() <= BOUNDS.width + EPS
        && frame.bottom() <= BOUNDS.height + EPS
}

// ── Strategies ──────────────────────────────────────────────────────────

fn frame_strategy() -> impl Strategy<Value = Rect> {
    (0.0f32..800.0, 0.0f32..1600.0, 100.0f32..280.0, 100.0f32..320.0)
        .prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
}

fn corner_strategy() -> impl Strategy<Value = Corner> {
    prop_oneof![
        Just(Corner::TopLeft),
        Just(Corner::TopRight),
        Just(Corner::BottomLeft),
        Just(Corner::BottomRight),
    ]
}

fn path_strategy() -> impl Strategy<Value = Vec<(f32, f32)>> {
    proptest::collection::vec((-60.0f32..60.0, -60.0f32..60.0), 0..20)
}

// ═══════════════════════════════════════════════════════════════════════
// 1–2. Single-pointer sessions
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn tap_and_move_are_exclusive(
        frame in frame_strategy(),
        path in path_strategy(),
        hold_ms in 0u64..600,
    ) {
        let mut engine = GestureEngine::default();
        let ctx = ctx(frame);
        let start = frame.center();
        let t0 = Instant::now();

        let mut events = engine.process(&PointerEvent::down(1, start.x, start.y, t0), &ctx);
        let mut last = start;
        for (i, (dx, dy)) in path.iter().enumerate() {
            last = Point::new(start.x + dx, start.y + dy);
            let t = t0 + Duration::from_millis(i as u64);
            events.extend(engine.process(&PointerEvent::moved(1, last.x, last.y, t), &ctx));
        }
        let t_up = t0 + Duration::from_millis(hold_ms);
        events.extend(engine.process(&PointerEvent::up(1, last.x, last.y, t_up), &ctx));

        let tapped = events.iter().any(|e| matches!(e, InteractionEvent::Tap { .. }));
        let moved = events.iter().any(|e| {
            matches!(e, InteractionEvent::MoveDelta { .. } | InteractionEvent::MoveFinal { .. })
        });
        prop_assert!(!(tapped && moved), "{events:?}");
        prop_assert!(!engine.is_active());

        let finals = events
            .iter()
            .filter(|e| matches!(e, InteractionEvent::MoveFinal { .. }))
            .count();
        prop_assert!(finals <= 1);
        prop_assert_eq!(finals == 1, moved);

        for event in &events {
            if let Some(frame) = event.frame() {
                prop_assert!(within_bounds(frame), "{frame:?}");
            }
        }
    }

    #[test]
    fn cancel_reports_only_visible_sessions(
        frame in frame_strategy(),
        path in path_strategy(),
    ) {
        let mut engine = GestureEngine::default();
        let ctx = ctx(frame);
        let start = frame.center();
        let t0 = Instant::now();

        engine.process(&PointerEvent::down(1, start.x, start.y, t0), &ctx);
        for (dx, dy) in &path {
            let p = Point::new(start.x + dx, start.y + dy);
            engine.process(&PointerEvent::moved(1, p.x, p.y, t0), &ctx);
        }
        let showed_feedback = engine.feedback().is_some();
        let cancelled = engine.cancel();
        prop_assert_eq!(cancelled.is_some(), showed_feedback);
        prop_assert!(!engine.is_active());
        prop_assert_eq!(engine.cancel(), None);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3–5. Resize geometry
// ═══════════════════════════════════════════════════════════════════════

fn corner_point(frame: Rect, corner: Corner) -> (f32, f32) {
    let x = if corner.moves_left_edge() { frame.x } else { frame.right() };
    let y = if corner.moves_top_edge() { frame.y } else { frame.bottom() };
    (x, y)
}

proptest! {
    #[test]
    fn corner_resize_keeps_opposite_corner(
        baseline in frame_strategy(),
        corner in corner_strategy(),
        dx in -1500.0f32..1500.0,
        dy in -2000.0f32..2000.0,
    ) {
        let min = Size::new(48.0, 48.0);
        let out = corner_resize(baseline, corner, dx, dy, BOUNDS, min);

        let (ax, ay) = corner_point(baseline, corner.anchor());
        let (bx, by) = corner_point(out, corner.anchor());
        prop_assert!((ax - bx).abs() <= EPS && (ay - by).abs() <= EPS, "{out:?}");
        prop_assert!(within_bounds(out), "{out:?}");
        prop_assert!(out.width >= min.width - EPS && out.height >= min.height - EPS);
    }

    #[test]
    fn pinch_stays_within_limits(
        baseline in frame_strategy(),
        scale in 0.01f32..20.0,
        aspect_locked in any::<bool>(),
    ) {
        let min = Size::new(48.0, 48.0);
        let out = pinch_resize(baseline, scale, BOUNDS, min, aspect_locked);
        prop_assert!(within_bounds(out), "{out:?}");
        prop_assert!(out.width >= min.width - EPS && out.height >= min.height - EPS);
        prop_assert!(out.width <= BOUNDS.width + EPS && out.height <= BOUNDS.height + EPS);
    }

    #[test]
    fn unconstrained_aspect_pinch_keeps_ratio(
        w in 50.0f32..500.0,
        h in 50.0f32..500.0,
        scale in 0.2f32..3.0,
    ) {
        let big = Size::new(10_000.0, 10_000.0);
        let baseline = Rect::new(4000.0, 4000.0, w, h);
        let out = pinch_resize(baseline, scale, big, Size::new(1.0, 1.0), true);
        let before = w / h;
        let after = out.width / out.height;
        prop_assert!((before - after).abs() <= 1e-3 * before.max(1.0), "{before} vs {after}");
    }
}
