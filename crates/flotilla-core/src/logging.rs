#![forbid(unsafe_code)]

//! Logging shims.
//!
//! With the `tracing` feature enabled the crate emits `tracing` events; without
//! it the macros below compile to nothing so the core has no logging
//! dependency.

#[cfg(feature = "tracing")]
pub use tracing::{debug, trace, warn};

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! __flotilla_noop_log {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub use crate::__flotilla_noop_log as debug;
#[cfg(not(feature = "tracing"))]
pub use crate::__flotilla_noop_log as trace;
#[cfg(not(feature = "tracing"))]
pub use crate::__flotilla_noop_log as warn;
