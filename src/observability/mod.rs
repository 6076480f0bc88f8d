//! Observability
//!
//! - Structured logging through `tracing` (JSON by default)
//! - Typed lifecycle events carried in an `event` field
//! - In-process counters exposed over HTTP
//!
//! # Usage
//!
//! ```ignore
//! use timetravel::observability::{init_logging, Event, LogFormat};
//!
//! init_logging("info", LogFormat::Json);
//! tracing::info!(event = %Event::BootStart, "starting");
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{init_logging, LogFormat};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
