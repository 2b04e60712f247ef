//! # Pomato Core Library
//!
//! This library provides the core logic for the pomato Pomodoro timer.
//! It implements a CLI-first philosophy where every operation is available
//! via the standalone CLI binary; any richer front end is meant to be a thin
//! layer over the same core.
//!
//! ## Architecture
//!
//! - **Countdown Engine**: A wall-clock state machine driven by a per-second
//!   `tick(now)`; remaining time is recomputed from the absolute deadline, so
//!   suspension and missed ticks cannot skew it
//! - **Session Runner**: Owns the ticker task and the phase-complete side
//!   effects (harvest increment, deadline notifications)
//! - **Storage**: SQLite-backed daily harvest counts and TOML configuration
//! - **Notifications**: Scheduler seam with a desktop implementation
//!
//! ## Key Components
//!
//! - [`CountdownEngine`]: Core work/break state machine
//! - [`SessionRunner`]: Ticker plus side effects around the engine
//! - [`HarvestStore`]: Completed-sessions-per-day persistence
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod notify;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, NotifyError, StoreError};
pub use events::Event;
pub use notify::{
    DesktopScheduler, NotificationId, NotificationMessage, NotificationScheduler, NullScheduler,
};
pub use storage::{data_dir, today, Config, HarvestStore};
pub use timer::{CountdownEngine, Phase, RemainingTime, SessionRunner};
