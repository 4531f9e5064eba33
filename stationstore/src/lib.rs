//! Buffers periodic measurement records and persists them to independent
//! storage sinks, holding a per-sink backlog while a sink is unreachable.

pub mod config;
pub mod manager;
pub mod postgres_things;
pub mod record;
pub mod sink;
pub mod station;

pub use config::options::{FatalPolicy, ManagerOptions, StoreConfig};
pub use manager::write_manager::{UpdateReport, WriteManager};
pub use manager::ManagerError;
pub use record::{Record, Schema, Value};
pub use sink::{SinkAdapter, SinkError, SinkKind};
