//! Compass Engine - Local-First Reflection State
//!
//! [`ReflectionEngine`] owns reflections, responses and achievements, writes
//! every change to a durable snapshot, and mirrors it to a remote store in the
//! background. Sign-in runs the local-to-cloud upload before remote history
//! may replace local history.

pub mod achievements;
pub mod bootstrap;
pub mod cloud;
pub mod config;
pub mod engine;
pub mod sync;
pub mod telemetry;

pub use bootstrap::{open_engine, EngineHandles};
pub use cloud::CloudMigrationReport;
pub use config::{ConfigError, EngineConfig, LogConfig};
pub use engine::{ExportView, ReflectionEngine, SessionTransition};
pub use sync::{SyncEvent, SyncQueue, SyncTracker};
pub use telemetry::{init_tracing, TelemetryError};
