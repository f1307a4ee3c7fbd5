#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core feeding logic (hardware-agnostic).
//!
//! All hardware interactions go through `feeder_traits::RotationSensor` and
//! `feeder_traits::Motor`.
//!
//! ## Architecture
//!
//! - **Debounce**: time-based filtering of the rotation sensor (`debounce`)
//! - **Rotation cycle**: progress of one multi-rotation feed (`rotator`)
//! - **Controller**: non-blocking tick loop driving the motor (`controller`)
//! - **Trigger gate**: `as_of` idempotence and busy rejection (`gate`)
//! - **History**: ring buffer of admitted feeds and its persistence
//!   (`history`, `persistence`)
//! - **Requests**: JSON/form decoding and the cross-thread inbox
//!   (`request`, `inbox`)
//!
//! Rotation timing uses integer milliseconds from a monotonic `Clock`.
//! Feed records carry adjusted wall-clock seconds from a `WallClock`.

pub mod atomic;
pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod debounce;
pub mod error;
pub mod gate;
pub mod history;
pub mod hw_error;
pub mod inbox;
pub mod mocks;
pub mod persistence;
pub mod request;
pub mod rotator;
pub mod runner;
pub mod status;
pub mod util;

pub use builder::{Feeder, FeederBuilder, Missing, Set, build_controller};
pub use config::{DiagnosticsCfg, HistoryCfg, RotationCfg, SensorCfg};
pub use controller::FeedController;
pub use debounce::Debounce;
pub use error::{BuildError, FeederError, PayloadError, RejectReason, Report, Result};
pub use gate::TriggerGate;
pub use history::{FeedEvent, FeedingStore};
pub use inbox::{TriggerEnvelope, TriggerInbox, TriggerOutcome, TriggerSender, trigger_channel};
pub use persistence::{FeedingPersistence, FilePersistence, MemoryPersistence, PersistedFeedings};
pub use request::FeedRequest;
pub use rotator::{Completion, RotationCycle};
pub use status::{Admission, FeedSummary, TickStatus};
