//! Inter-task signalling
//!
//! Typed event-flag groups, the per-domain bit assignments and the static
//! event descriptors workers report through.

pub mod domains;
pub mod flags;
pub mod info;

pub use domains::*;
pub use flags::{EventGroup, LivenessRequest, Supervised};
pub use info::{EventInfo, SupervisorEvent, SUPERVISOR_EVENTS};
