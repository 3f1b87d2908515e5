#![forbid(unsafe_code)]

//! Materializes one visual surface per live instance inside a host container.
//!
//! The host keeps its own record of what each surface currently shows, so a
//! reconcile only reaches the container when something actually changed:
//! geometry through [`HostContainer::relayout_surface`], flags through
//! [`HostContainer::set_surface_flags`]. A flag-only change never relayouts.
//!
//! Z-order is creation order; [`OverlayHost::raise`] moves a surface to the
//! top. [`OverlayHost::hit_test`] walks from the top down.

use ahash::AHashMap;
use bitflags::bitflags;
use flotilla_core::{InstanceKey, InstanceState, Point, Rect, Size};

use crate::error::HostError;

bitflags! {
    /// Visual flags of a surface.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SurfaceFlags: u8 {
        /// Lock border.
        const LOCKED = 1 << 0;
        const HIGHLIGHTED = 1 << 1;
        const CONTROLS_VISIBLE = 1 << 2;
    }
}

impl SurfaceFlags {
    /// Flags derived from instance state.
    #[must_use]
    pub fn from_state(state: &InstanceState) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::LOCKED, state.locked);
        flags.set(Self::HIGHLIGHTED, state.highlighted);
        flags.set(Self::CONTROLS_VISIBLE, state.controls_visible);
        flags
    }
}

/// Platform surface container.
pub trait HostContainer {
    /// Current container extent.
    fn bounds(&self) -> Size;

    /// Create a surface. `Err` carries the container's refusal reason.
    fn add_surface(
        &mut self,
        key: InstanceKey,
        frame: Rect,
        flags: SurfaceFlags,
    ) -> Result<(), String>;

    fn relayout_surface(&mut self, key: InstanceKey, frame: Rect);

    fn set_surface_flags(&mut self, key: InstanceKey, flags: SurfaceFlags);

    fn remove_surface(&mut self, key: InstanceKey);

    /// Bring a surface to the front. Containers without z-order ignore it.
    fn raise_surface(&mut self, _key: InstanceKey) {}
}

/// Resolve a state frame (size may hold the fill sentinel) into a frame
/// clamped inside `bounds`.
#[must_use]
pub fn resolve_frame(frame: Rect, bounds: Size) -> Rect {
    Rect::from_parts(frame.origin(), frame.size().resolve(bounds))
        .clamped_within(bounds, Size::default())
}

#[derive(Debug, Clone, Copy)]
struct Surface {
    /// Committed, unresolved frame from state.
    desired: Rect,
    /// Frame the container currently shows.
    placed: Rect,
    flags: SurfaceFlags,
}

/// Owner of every live surface.
#[derive(Debug)]
pub struct OverlayHost<C> {
    container: C,
    bounds: Size,
    surfaces: AHashMap<InstanceKey, Surface>,
    z_order: Vec<InstanceKey>,
    relayouts: u64,
}

impl<C: HostContainer> OverlayHost<C> {
    #[must_use]
    pub fn new(container: C) -> Self {
        let bounds = container.bounds();
        Self {
            container,
            bounds,
            surfaces: AHashMap::new(),
            z_order: Vec::new(),
            relayouts: 0,
        }
    }

    /// Create the surface for `key` if it does not exist yet.
    ///
    /// Returns `Ok(true)` when a surface was created.
    pub fn ensure_surface(
        &mut self,
        key: InstanceKey,
        state: &InstanceState,
    ) -> Result<bool, HostError> {
        if self.surfaces.contains_key(&key) {
            return Ok(false);
        }
        let desired = state.frame();
        let placed = resolve_frame(desired, self.bounds);
        let flags = SurfaceFlags::from_state(state);
        self.container
            .add_surface(key, placed, flags)
            .map_err(|reason| {
                tracing::warn!(%key, %reason, "surface refused");
                HostError::SurfaceRefused { key, reason }
            })?;
        self.surfaces.insert(
            key,
            Surface {
                desired,
                placed,
                flags,
            },
        );
        self.z_order.push(key);
        tracing::debug!(%key, ?placed, "surface created");
        Ok(true)
    }

    fn place(&mut self, key: InstanceKey, frame: Rect) -> bool {
        let Some(surface) = self.surfaces.get_mut(&key) else {
            return false;
        };
        if surface.placed.approx_eq(&frame) {
            return false;
        }
        surface.placed = frame;
        self.container.relayout_surface(key, frame);
        self.relayouts += 1;
        true
    }

    /// Reconcile geometry and flags to `state`. Returns whether a relayout
    /// was issued.
    pub fn apply_state(&mut self, key: InstanceKey, state: &InstanceState) -> bool {
        let Some(surface) = self.surfaces.get_mut(&key) else {
            tracing::debug!(%key, "apply_state on missing surface");
            return false;
        };
        surface.desired = state.frame();
        let frame = resolve_frame(surface.desired, self.bounds);
        self.apply_flags(key, state);
        self.place(key, frame)
    }

    /// Reconcile only flags to `state`.
    pub fn apply_flags(&mut self, key: InstanceKey, state: &InstanceState) {
        let flags = SurfaceFlags::from_state(state);
        if let Some(surface) = self.surfaces.get_mut(&key)
            && surface.flags != flags
        {
            surface.flags = flags;
            self.container.set_surface_flags(key, flags);
        }
    }

    /// Record `state` as committed while feedback is on screen: flags are
    /// applied, geometry is kept for the next reconcile and no relayout is
    /// issued.
    pub fn set_committed(&mut self, key: InstanceKey, state: &InstanceState) {
        let Some(surface) = self.surfaces.get_mut(&key) else {
            return;
        };
        surface.desired = state.frame();
        self.apply_flags(key, state);
    }

    /// Show transient gesture geometry without touching the committed frame.
    pub fn apply_feedback(&mut self, key: InstanceKey, frame: Rect) -> bool {
        let frame = frame.clamped_within(self.bounds, Size::default());
        self.place(key, frame)
    }

    /// Put a surface back on its committed frame (after a cancelled gesture).
    pub fn restore_committed(&mut self, key: InstanceKey) -> bool {
        let Some(surface) = self.surfaces.get(&key) else {
            return false;
        };
        let frame = resolve_frame(surface.desired, self.bounds);
        self.place(key, frame)
    }

    /// Remove the surface. Safe for keys that never had one.
    pub fn teardown_surface(&mut self, key: InstanceKey) {
        if self.surfaces.remove(&key).is_some() {
            self.z_order.retain(|k| *k != key);
            self.container.remove_surface(key);
            tracing::debug!(%key, "surface removed");
        }
    }

    /// Topmost surface containing `point`.
    #[must_use]
    pub fn hit_test(&self, point: Point) -> Option<InstanceKey> {
        self.z_order
            .iter()
            .rev()
            .copied()
            .find(|key| self.surfaces.get(key).is_some_and(|s| s.placed.contains(point)))
    }

    /// Move a surface to the top of the z-order.
    pub fn raise(&mut self, key: InstanceKey) {
        let Some(index) = self.z_order.iter().position(|k| *k == key) else {
            return;
        };
        if index + 1 == self.z_order.len() {
            return;
        }
        self.z_order.remove(index);
        self.z_order.push(key);
        self.container.raise_surface(key);
    }

    /// Re-read container bounds and re-clamp every surface.
    ///
    /// Returns the number of surfaces relayouted.
    pub fn container_resized(&mut self) -> usize {
        self.bounds = self.container.bounds();
        let frames: Vec<(InstanceKey, Rect)> = self
            .z_order
            .iter()
            .filter_map(|key| {
                let surface = self.surfaces.get(key)?;
                Some((*key, resolve_frame(surface.desired, self.bounds)))
            })
            .collect();
        let moved = frames
            .into_iter()
            .filter(|(key, frame)| self.place(*key, *frame))
            .count();
        tracing::debug!(bounds = ?self.bounds, moved, "container resized");
        moved
    }

    /// Frame currently shown for `key`.
    #[must_use]
    pub fn frame_of(&self, key: InstanceKey) -> Option<Rect> {
        self.surfaces.get(&key).map(|s| s.placed)
    }

    /// Committed frame for `key`, resolved against the current bounds.
    #[must_use]
    pub fn committed_frame(&self, key: InstanceKey) -> Option<Rect> {
        self.surfaces
            .get(&key)
            .map(|s| resolve_frame(s.desired, self.bounds))
    }

    #[must_use]
    pub fn flags_of(&self, key: InstanceKey) -> Option<SurfaceFlags> {
        self.surfaces.get(&key).map(|s| s.flags)
    }

    #[must_use]
    pub fn contains(&self, key: InstanceKey) -> bool {
        self.surfaces.contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Surfaces bottom to top.
    #[must_use]
    pub fn z_order(&self) -> &[InstanceKey] {
        &self.z_order
    }

    #[must_use]
    pub const fn bounds(&self) -> Size {
        self.bounds
    }

    /// Total relayouts issued to the container.
    #[must_use]
    pub const fn relayout_count(&self) -> u64 {
        self.relayouts
    }

    #[must_use]
    pub const fn container(&self) -> &C {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut C {
        &mut self.container
    }
}
