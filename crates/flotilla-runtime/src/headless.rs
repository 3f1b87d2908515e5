#![forbid(unsafe_code)]

//! In-memory [`HostContainer`] that records every call.
//!
//! Used by tests and by embedders that drive the coordinator without a
//! display. Surface creation can be refused on demand.

use ahash::AHashMap;
use flotilla_core::{InstanceKey, Rect, Size};

use crate::overlay_host::{HostContainer, SurfaceFlags};

/// One recorded container call.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerCall {
    Add {
        key: InstanceKey,
        frame: Rect,
        flags: SurfaceFlags,
    },
    Relayout {
        key: InstanceKey,
        frame: Rect,
    },
    Flags {
        key: InstanceKey,
        flags: SurfaceFlags,
    },
    Remove {
        key: InstanceKey,
    },
    Raise {
        key: InstanceKey,
    },
}

/// Recording container with a fixed (but adjustable) extent.
#[derive(Debug, Clone, Default)]
pub struct HeadlessContainer {
    bounds: Size,
    surfaces: AHashMap<InstanceKey, (Rect, SurfaceFlags)>,
    calls: Vec<ContainerCall>,
    refusals: u32,
}

impl HeadlessContainer {
    #[must_use]
    pub fn new(bounds: Size) -> Self {
        Self {
            bounds,
            ..Self::default()
        }
    }

    /// Change the extent reported by `bounds()`.
    pub fn set_bounds(&mut self, bounds: Size) {
        self.bounds = bounds;
    }

    /// Refuse the next `count` surface creations.
    pub fn refuse_next(&mut self, count: u32) {
        self.refusals = count;
    }

    #[must_use]
    pub fn calls(&self) -> &[ContainerCall] {
        &self.calls
    }

    /// Return and clear the call log.
    pub fn take_calls(&mut self) -> Vec<ContainerCall> {
        std::mem::take(&mut self.calls)
    }

    /// Frame and flags of a live surface.
    #[must_use]
    pub fn surface(&self, key: InstanceKey) -> Option<(Rect, SurfaceFlags)> {
        self.surfaces.get(&key).copied()
    }

    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Relayouts recorded for one surface.
    #[must_use]
    pub fn relayouts_for(&self, key: InstanceKey) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, ContainerCall::Relayout { key: k, .. } if *k == key))
            .count()
    }
}

impl HostContainer for HeadlessContainer {
    fn bounds(&self) -> Size {
        self.bounds
    }

    fn add_surface(
        &mut self,
        key: InstanceKey,
        frame: Rect,
        flags: SurfaceFlags,
    ) -> Result<(), String> {
        if self.refusals > 0 {
            self.refusals -= 1;
            return Err("surface creation refused".to_string());
        }
        self.surfaces.insert(key, (frame, flags));
        self.calls.push(ContainerCall::Add { key, frame, flags });
        Ok(())
    }

    fn relayout_surface(&mut self, key: InstanceKey, frame: Rect) {
        if let Some(surface) = self.surfaces.get_mut(&key) {
            surface.0 = frame;
        }
        self.calls.push(ContainerCall::Relayout { key, frame });
    }

    fn set_surface_flags(&mut self, key: InstanceKey, flags: SurfaceFlags) {
        if let Some(surface) = self.surfaces.get_mut(&key) {
            surface.1 = flags;
        }
        self.calls.push(ContainerCall::Flags { key, flags });
    }

    fn remove_surface(&mut self, key: InstanceKey) {
        self.surfaces.remove(&key);
        self.calls.push(ContainerCall::Remove { key });
    }

    fn raise_surface(&mut self, key: InstanceKey) {
        self.calls.push(ContainerCall::Raise { key });
    }
}
