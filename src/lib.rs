//! Power-Quality Meter Supervisor Library
//!
//! Core of the firmware for a networked power-quality energy meter: the
//! system state machine, the event aggregator that classifies and
//! rate-limits fault reports, the offline event backlog and the task
//! watchdog. Everything outside this core (sensor drivers, the transport
//! protocol, the firmware updater) is a worker task that talks to the
//! supervisor through typed event-flag groups and bounded queues.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WORKERS                               │
//! │  Energy │ Vars │ Streams │ Command │ FW Update │ Time │ LED  │
//! ├───────────────── event groups / queues ─────────────────────┤
//! │                      SUPERVISOR                              │
//! │  State machine  │  Aggregator  │  Backlog  │  Conn. timer    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                       WATCHDOG                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │          BOARD: link monitor │ NVM │ reset control           │
//! ├─────────────────────────────────────────────────────────────┤
//! │           embassy-rs (async/await executor)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Single writer**: only the supervisor mutates the system state, the
//!   error histories and the backlog
//! - **Level-triggered signalling**: event bits stay set until the reader
//!   clears them
//! - **Functional core, imperative shell**: `step` and `check` return
//!   `Result<_, Fault>`; only the `run` loops reset the device
//! - **No unsafe, no panics** in the library core

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
mod fmt;

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_stm32;
pub use embassy_time;

/// System configuration and constants
pub mod config;

/// Shared types used across modules
pub mod types;

/// Error-code catalog
pub mod error_codes;

/// Event-flag groups, per-domain bit sets and event descriptors
pub mod events;

/// Shared channels between supervisor and workers
pub mod channels;

/// Event classification, de-duplication and per-domain history
pub mod aggregator;

/// Offline event backlog
pub mod backlog;

/// Task watchdog
pub mod watchdog;

/// Worker-side contract helpers
pub mod worker;

/// Board collaborator interfaces
pub mod board;

/// Hard-fault taxonomy
pub mod fault;

/// System supervisor state machine
pub mod supervisor;

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::aggregator::notify;
    pub use crate::board::{LinkMonitor, Nvm, NvmError, NvmSection, ResetControl};
    pub use crate::channels::Channels;
    pub use crate::config::*;
    pub use crate::events::*;
    pub use crate::fault::{Fault, FaultCode};
    pub use crate::supervisor::Supervisor;
    pub use crate::types::*;
    pub use crate::watchdog::{SupervisedTask, Watchdog, WatchdogEntry};
    pub use crate::worker::WorkerHandle;

    // Embassy
    pub use embassy_time::{Duration, Instant, Timer};

    // Error handling
    pub use core::result::Result;

    // Logging
    #[cfg(feature = "embedded")]
    pub use defmt::{debug, error, info, trace, warn};
}
