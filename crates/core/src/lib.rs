#![warn(clippy::all, missing_docs)]

//! Core logic for the etaboard transit kiosk.
//!
//! This crate hosts configuration, the monitored-entity registry, the
//! transit and bike-share fetchers, arrival-time normalisation and the
//! refresh cycle that feeds whatever display is attached.

pub mod board;
pub mod config;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod reading;
pub mod refresh;
pub mod registry;
pub mod transport;

pub use board::{Board, BoardEntry, BoardUpdate, ChannelSink, RenderSink, SinkClosed};
pub use config::{AppConfig, Credentials};
pub use error::FetchError;
pub use reading::ArrivalReading;
pub use refresh::{CycleReport, RefreshCycle, RefreshHandle, Scheduler, StopReason};
pub use registry::{EntityId, MonitoredEntity, Position, Registry, SourceKind};
pub use transport::{HttpTransport, Transport};
