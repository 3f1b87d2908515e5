#![forbid(unsafe_code)]

//! Geometric primitives.
//!
//! All coordinates are device-independent units with the origin at the
//! top-left corner of the host container. Frames are never rejected for being
//! out of range; they are clamped.

use serde::{Deserialize, Serialize};

/// Size sentinel meaning "natural size": the axis resolves to the full
/// container extent.
pub const SIZE_FILL: f32 = -1.0;

/// A point in container coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    /// Create a new point.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Component-wise offset from `origin` to `self`.
    #[must_use]
    pub fn delta_from(self, origin: Self) -> (f32, f32) {
        (self.x - origin.x, self.y - origin.y)
    }

    /// Midpoint between two points.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// A width/height pair. Either axis may hold [`SIZE_FILL`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    /// Create a new size.
    #[inline]
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Size that fills the container on both axes.
    pub const FILL: Self = Self::new(SIZE_FILL, SIZE_FILL);

    /// Resolve [`SIZE_FILL`] (or any negative value) against `bounds`.
    #[must_use]
    pub fn resolve(self, bounds: Size) -> Size {
        let axis = |value: f32, extent: f32| if value < 0.0 { extent } else { value };
        Size::new(axis(self.width, bounds.width), axis(self.height, bounds.height))
    }

    /// Whether both axes are finite and non-negative.
    #[must_use]
    pub fn is_valid_bounds(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width >= 0.0 && self.height >= 0.0
    }
}

/// An axis-aligned frame in container coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new frame.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a frame from an origin and a size.
    #[inline]
    #[must_use]
    pub const fn from_parts(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// Top-left corner.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Width and height.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Right edge (exclusive).
    #[inline]
    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Centre of the frame.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether a point lies inside the frame (right/bottom edges exclusive).
    #[inline]
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Translate by a delta.
    #[must_use]
    pub fn translated(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Translate a surface-local frame into container coordinates.
    #[must_use]
    pub fn offset_by(&self, origin: Point) -> Rect {
        self.translated(origin.x, origin.y)
    }

    /// Clamp the frame into a container of size `bounds`.
    ///
    /// Size is clamped first (minimum `min`, maximum the container extent),
    /// then the origin is pulled inside so the whole frame is visible. When
    /// `min` exceeds the container, the container wins.
    #[must_use]
    pub fn clamped_within(&self, bounds: Size, min: Size) -> Rect {
        let width = clamp_extent(self.width, min.width, bounds.width);
        let height = clamp_extent(self.height, min.height, bounds.height);
        let x = clamp_origin(self.x, width, bounds.width);
        let y = clamp_origin(self.y, height, bounds.height);
        Rect::new(x, y, width, height)
    }

    /// Approximate equality, tolerant of float noise from repeated clamping.
    #[must_use]
    pub fn approx_eq(&self, other: &Rect) -> bool {
        const EPSILON: f32 = 1e-3;
        (self.x - other.x).abs() <= EPSILON
            && (self.y - other.y).abs() <= EPSILON
            && (self.width - other.width).abs() <= EPSILON
            && (self.height - other.height).abs() <= EPSILON
    }
}

/// Clamp one extent into `[min, max]`, where `max` wins over `min`.
#[must_use]
pub fn clamp_extent(value: f32, min: f32, max: f32) -> f32 {
    let max = max.max(0.0);
    let value = if value.is_finite() { value } else { max };
    value.max(min).min(max)
}

fn clamp_origin(value: f32, extent: f32, container: f32) -> f32 {
    let limit = (container - extent).max(0.0);
    let value = if value.is_finite() { value } else { 0.0 };
    value.clamp(0.0, limit)
}
