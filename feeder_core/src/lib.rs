#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Feeding control loop (hardware-agnostic).
//!
//! This crate turns bowl-weight readings and feed requests into bounded
//! actuator activations. All hardware and transport interactions go through
//! the `feeder_traits` boundaries, so the loop runs unchanged against the
//! simulated devices in tests and against GPIO drivers on the device.
//!
//! ## Architecture
//!
//! - **Controller**: `IDLE`/`FEEDING` state machine with the watchdog (`controller`)
//! - **Scheduler**: periodic absolute top-up (`scheduler`)
//! - **Commands**: total parsers for inbound JSON payloads (`command`)
//! - **Load cell**: tare and raw→grams conversion (`load_cell`)
//! - **Telemetry**: topic layout and outbound payloads (`telemetry`)
//! - **Monitors**: climate, container level and lid switch (`monitors`)
//! - **Loop**: the cooperative tick (`runner::Feeder`), built with `FeederBuilder`
//!
//! ## Timing
//!
//! Every deadline is wall-clock relative and evaluated once per tick, so the
//! worst-case watchdog overrun is one tick period. The builder rejects a tick
//! period above a tenth of the watchdog timeout.

pub mod builder;
pub mod channel;
pub mod command;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod load_cell;
pub mod monitors;
pub mod runner;
pub mod scheduler;
pub mod session;
pub mod status;
pub mod telemetry;
pub mod util;

pub use builder::{FeederBuilder, Missing};
pub use channel::{ChannelHandle, MemoryChannel, Published, memory_channel};
pub use command::{AutoFeedUpdate, ManualCommand, ManualFeedRequest, parse_auto_feed, parse_manual_feed};
pub use config::{FeedCfg, LoadCellCfg, LoopCfg, MalformedPolicy, SensorCfg, Timeouts, WatchdogCfg};
pub use controller::FeedController;
pub use error::{BuildError, CommandError, FeederError, Result};
pub use load_cell::{LoadCell, LoadCellPayload, WeightReading};
pub use runner::Feeder;
pub use scheduler::{AutoFeedConfig, AutoFeedScheduler, ScheduleDecision};
pub use session::{FeedOrigin, FeedingSession};
pub use status::{FeedEvent, FeedOutcome, FeedState, StopReason};
pub use telemetry::{EventPayload, StatusRecord, Topics};
