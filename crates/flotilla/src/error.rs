#![forbid(unsafe_code)]

//! Unified error model and severity classification.
//!
//! Each subsystem keeps its own typed error; [`Error`] wraps them so an
//! embedder can propagate everything with `?` and still decide per failure
//! what to do:
//!
//! - [`Severity::Recoverable`]: carry on; at most one request was dropped.
//! - [`Severity::InstanceFatal`]: the affected instance is gone or was never
//!   created, every other instance is intact.
//! - [`Severity::Fatal`]: the runtime cannot start or continue.

use std::fmt;

use flotilla_core::GestureConfigError;
#[cfg(feature = "runtime")]
use flotilla_runtime::{ConfigError, CoordinatorError, HostError, StorageError, StoreError};

// ── Unified Error ───────────────────────────────────────────────────────

/// Top-level error type for Flotilla embedders.
#[derive(Debug)]
pub enum Error {
    /// Gesture thresholds rejected.
    GestureConfig(GestureConfigError),
    /// Configuration failed to load or validate.
    #[cfg(feature = "runtime")]
    Config(ConfigError),
    /// Durable storage failure.
    #[cfg(feature = "runtime")]
    Storage(StorageError),
    /// State store failure.
    #[cfg(feature = "runtime")]
    Store(StoreError),
    /// Surface container failure.
    #[cfg(feature = "runtime")]
    Host(HostError),
    /// Lifecycle or dispatch failure.
    #[cfg(feature = "runtime")]
    Coordinator(CoordinatorError),
    /// Raw I/O error (convenience variant for `?` on io::Result).
    Io(std::io::Error),
}

/// Standard result type for Flotilla APIs.
pub type Result<T> = std::result::Result<T, Error>;

// ── Severity ────────────────────────────────────────────────────────────

/// How far the damage of an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Recoverable,
    InstanceFatal,
    Fatal,
}

#[cfg(feature = "runtime")]
fn store_severity(err: &StoreError) -> Severity {
    match err {
        StoreError::UnknownInstance(_) | StoreError::Storage(_) => Severity::Recoverable,
    }
}

impl Error {
    /// Classify this error.
    pub fn severity(&self) -> Severity {
        match self {
            Self::GestureConfig(_) | Self::Io(_) => Severity::Fatal,
            #[cfg(feature = "runtime")]
            Self::Config(_) => Severity::Fatal,
            // Write-behind failures heal on the next write of the instance.
            #[cfg(feature = "runtime")]
            Self::Storage(_) => Severity::Recoverable,
            #[cfg(feature = "runtime")]
            Self::Store(err) => store_severity(err),
            #[cfg(feature = "runtime")]
            Self::Host(HostError::SurfaceRefused { .. }) => Severity::InstanceFatal,
            #[cfg(feature = "runtime")]
            Self::Coordinator(err) => match err {
                CoordinatorError::CapacityReached { .. }
                | CoordinatorError::UnknownInstance(_) => Severity::Recoverable,
                CoordinatorError::Host(_) => Severity::InstanceFatal,
                CoordinatorError::Store(err) => store_severity(err),
            },
        }
    }

    /// Whether the user should be told (e.g. with a toast).
    pub fn user_visible(&self) -> bool {
        match self {
            #[cfg(feature = "runtime")]
            Self::Host(_)
            | Self::Coordinator(CoordinatorError::CapacityReached { .. })
            | Self::Coordinator(CoordinatorError::Host(_)) => true,
            _ => false,
        }
    }

    /// Error type label for tracing fields.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::GestureConfig(_) => "gesture_config",
            #[cfg(feature = "runtime")]
            Self::Config(_) => "config",
            #[cfg(feature = "runtime")]
            Self::Storage(_) => "storage",
            #[cfg(feature = "runtime")]
            Self::Store(_) => "store",
            #[cfg(feature = "runtime")]
            Self::Host(_) => "host",
            #[cfg(feature = "runtime")]
            Self::Coordinator(_) => "coordinator",
            Self::Io(_) => "io",
        }
    }

    /// Whether the runtime can keep going.
    pub fn is_recoverable(&self) -> bool {
        self.severity() != Severity::Fatal
    }
}

// ── Display ─────────────────────────────────────────────────────────────

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GestureConfig(err) => write!(f, "gesture config: {err}"),
            #[cfg(feature = "runtime")]
            Self::Config(err) => write!(f, "config: {err}"),
            #[cfg(feature = "runtime")]
            Self::Storage(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Store(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Host(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Coordinator(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "I/O: {err}"),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "recoverable"),
            Self::InstanceFatal => write!(f, "instance_fatal"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

// ── std::error::Error ───────────────────────────────────────────────────

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::GestureConfig(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Config(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Storage(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Store(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Host(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Coordinator(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

// ── From conversions ────────────────────────────────────────────────────

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<GestureConfigError> for Error {
    fn from(err: GestureConfigError) -> Self {
        Self::GestureConfig(err)
    }
}

#[cfg(feature = "runtime")]
impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

#[cfg(feature = "runtime")]
impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

#[cfg(feature = "runtime")]
impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

#[cfg(feature = "runtime")]
impl From<HostError> for Error {
    fn from(err: HostError) -> Self {
        Self::Host(err)
    }
}

#[cfg(feature = "runtime")]
impl From<CoordinatorError> for Error {
    fn from(err: CoordinatorError) -> Self {
        Self::Coordinator(err)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
