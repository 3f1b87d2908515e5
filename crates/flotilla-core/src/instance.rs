#![forbid(unsafe_code)]

//! Instance model: feature types, slot ids, and durable instance state.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Size};

/// Kind of overlay tool. Each kind owns an independent id pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Mask,
    Spotlight,
    SignalLight,
}

impl FeatureType {
    /// Every feature type, in a stable order.
    pub const ALL: [FeatureType; 3] = [Self::Mask, Self::Spotlight, Self::SignalLight];

    /// Built-in pool size.
    #[must_use]
    pub const fn default_capacity(self) -> u32 {
        match self {
            Self::Mask | Self::Spotlight => 4,
            Self::SignalLight => 7,
        }
    }

    /// Stable index into per-type tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Mask => 0,
            Self::Spotlight => 1,
            Self::SignalLight => 2,
        }
    }

    /// Stable snake_case name, used for storage paths and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mask => "mask",
            Self::Spotlight => "spotlight",
            Self::SignalLight => "signal_light",
        }
    }

    /// Inverse of [`as_str`](Self::as_str).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|feature| feature.as_str() == name)
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slot id of a live instance; always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct InstanceId(NonZeroU32);

impl InstanceId {
    /// Smallest valid id.
    pub const MIN: Self = Self(NonZeroU32::MIN);

    /// Create an id; `None` for zero.
    #[must_use]
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Raw integer value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for InstanceId {
    type Error = &'static str;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or("instance id must be positive")
    }
}

impl From<InstanceId> for u32 {
    fn from(id: InstanceId) -> Self {
        id.get()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Globally unique handle of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    pub feature: FeatureType,
    pub id: InstanceId,
}

impl InstanceKey {
    #[must_use]
    pub const fn new(feature: FeatureType, id: InstanceId) -> Self {
        Self { feature, id }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.feature, self.id)
    }
}

/// Spotlight cut-out shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotlightShape {
    Circle,
    Rectangle,
}

/// Feature-specific settings carried by an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeaturePayload {
    Mask {
        /// Packed `0xRRGGBBAA`.
        color: u32,
        opacity: f32,
    },
    Spotlight {
        shape: SpotlightShape,
        dim_opacity: f32,
    },
    SignalLight {
        lamp_count: u8,
        active_lamp: Option<u8>,
    },
}

impl FeaturePayload {
    /// Maximum lamps on one signal light.
    pub const MAX_LAMPS: u8 = 5;

    /// Default payload for a feature type.
    #[must_use]
    pub const fn default_for(feature: FeatureType) -> Self {
        match feature {
            FeatureType::Mask => Self::Mask {
                color: 0x0000_00FF,
                opacity: 0.6,
            },
            FeatureType::Spotlight => Self::Spotlight {
                shape: SpotlightShape::Circle,
                dim_opacity: 0.7,
            },
            FeatureType::SignalLight => Self::SignalLight {
                lamp_count: 3,
                active_lamp: None,
            },
        }
    }

    /// Feature type this payload belongs to.
    #[must_use]
    pub const fn feature(&self) -> FeatureType {
        match self {
            Self::Mask { .. } => FeatureType::Mask,
            Self::Spotlight { .. } => FeatureType::Spotlight,
            Self::SignalLight { .. } => FeatureType::SignalLight,
        }
    }

    /// Whether pinch-resize must preserve the aspect ratio.
    #[must_use]
    pub const fn aspect_locked(&self) -> bool {
        matches!(
            self,
            Self::Spotlight {
                shape: SpotlightShape::Circle,
                ..
            }
        )
    }

    /// Range checks on the payload values.
    pub fn validate(&self) -> Result<(), String> {
        let unit = |name: &str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(format!("{name} must be in 0..=1, got {value}"))
            }
        };
        match self {
            Self::Mask { opacity, .. } => unit("opacity", *opacity),
            Self::Spotlight { dim_opacity, .. } => unit("dim_opacity", *dim_opacity),
            Self::SignalLight {
                lamp_count,
                active_lamp,
            } => {
                if *lamp_count == 0 || *lamp_count > Self::MAX_LAMPS {
                    return Err(format!(
                        "lamp_count must be in 1..={}, got {lamp_count}",
                        Self::MAX_LAMPS
                    ));
                }
                match active_lamp {
                    Some(lamp) if lamp >= lamp_count => {
                        Err(format!("active_lamp {lamp} out of range for {lamp_count} lamps"))
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}

/// Durable state of one instance.
///
/// `size` axes may hold [`crate::SIZE_FILL`]; the resolved frame is always
/// clamped by whoever renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub position: Point,
    pub size: Size,
    pub locked: bool,
    /// Set when the lock came from a bulk lock-all rather than the user.
    #[serde(default)]
    pub locked_by_bulk: bool,
    pub highlighted: bool,
    pub controls_visible: bool,
    pub payload: FeaturePayload,
}

impl InstanceState {
    /// Spacing between default positions of consecutive ids.
    pub const CASCADE_STEP: f32 = 24.0;

    /// Default-seeded state for a freshly allocated slot.
    #[must_use]
    pub fn seeded(key: InstanceKey) -> Self {
        let step = Self::CASCADE_STEP * (key.id.get() - 1) as f32;
        let (position, size) = match key.feature {
            FeatureType::Mask => (Point::new(0.0, 0.0), Size::FILL),
            FeatureType::Spotlight => (Point::new(48.0 + step, 96.0 + step), Size::new(200.0, 200.0)),
            FeatureType::SignalLight => {
                (Point::new(48.0 + step, 96.0 + step), Size::new(120.0, 240.0))
            }
        };
        Self {
            position,
            size,
            locked: false,
            locked_by_bulk: false,
            highlighted: false,
            controls_visible: true,
            payload: FeaturePayload::default_for(key.feature),
        }
    }

    /// Unresolved frame (size may still hold the fill sentinel).
    #[must_use]
    pub fn frame(&self) -> Rect {
        Rect::from_parts(self.position, self.size)
    }

    /// Replace position and size from a committed frame.
    pub fn set_frame(&mut self, frame: Rect) {
        self.position = frame.origin();
        self.size = frame.size();
    }

    /// Check a restored record against the slot it claims to occupy.
    pub fn validate_for(&self, feature: FeatureType) -> Result<(), String> {
        if self.payload.feature() != feature {
            return Err(format!(
                "payload kind {} does not match feature {feature}",
                self.payload.feature()
            ));
        }
        let finite = [self.position.x, self.position.y, self.size.width, self.size.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err("frame contains non-finite values".to_string());
        }
        self.payload.validate()
    }
}
