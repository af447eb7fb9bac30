//! Work/rest reminder engine: a drift-corrected work/rest timer paired with
//! a browser-automation controller that pauses video playback in a remote
//! browser during rest intervals and resumes it afterward.
//!
//! The timer and the browser controller run as independent loops; the
//! [`coordinator::Coordinator`] subscribes to both and applies all
//! cross-component policy. Browser connectivity failures degrade the
//! controller but never stop the timer.

pub mod browser;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod timer;

pub use config::Config;
pub use coordinator::{AppEvent, Coordinator, EventStreams};
pub use error::{ControlError, Result};
pub use timer::{Phase, TimerController, TimerEvent, spawn_timer};
