//! Browser-control subsystem.
//!
//! This module centralizes the remote-debugging session client, endpoint
//! discovery and launch, the reconnecting connection manager, playback
//! polling, and pause/resume dispatch.

/// Remote session client over the DevTools protocol.
pub mod cdp;
/// Idempotent pause/resume dispatch across tabs.
pub mod dispatcher;
/// Browser executable discovery.
pub mod finder;
/// Browser process launch with a debugging endpoint.
pub mod launcher;
/// Connection lifecycle and health supervision.
pub mod manager;
/// Playback polling.
pub mod monitor;
/// Endpoint probing and port classification.
pub mod probe;

/// Session capability interface and concrete CDP session.
pub use cdp::{CdpSession, SessionClient, Target, TargetKind};
/// Dispatch outcome types.
pub use dispatcher::{CommandDispatcher, CommandResult, DispatchOutcome, PlaybackAction};
/// Connection supervision types.
pub use manager::{ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStatus};
/// Playback poll types.
pub use monitor::{PlaybackEvent, PlaybackMonitor, PlaybackSnapshot};
