//! Lifecycle events
//!
//! Every significant state change is logged with an `event` field holding
//! one of these names, so logs can be filtered without parsing messages.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & Lifecycle
    /// Startup begins
    BootStart,
    /// Configuration loaded
    ConfigLoaded,
    /// Startup complete, ready to serve
    BootComplete,
    /// HTTP listener bound
    Serving,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,

    // Recovery
    /// Version log replayed into memory
    RecoveryComplete,
    /// An incomplete trailing commit was discarded
    RecoveryTruncatedTail,

    // Migration
    /// Legacy store found, migration begins
    MigrationStart,
    /// Migration finished
    MigrationComplete,

    // Writes
    /// Record created at version 1
    RecordCreated,
    /// New version committed for an existing record
    VersionCommitted,
    /// Write abandoned because the caller went away
    WriteCancelled,

    // Failures
    /// Unexpected internal failure surfaced to a client
    InternalError,
}

impl Event {
    /// Returns the event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "BOOT_START",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::BootComplete => "BOOT_COMPLETE",
            Event::Serving => "SERVING",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Event::RecoveryComplete => "RECOVERY_COMPLETE",
            Event::RecoveryTruncatedTail => "RECOVERY_TRUNCATED_TAIL",
            Event::MigrationStart => "MIGRATION_START",
            Event::MigrationComplete => "MIGRATION_COMPLETE",
            Event::RecordCreated => "RECORD_CREATED",
            Event::VersionCommitted => "VERSION_COMMITTED",
            Event::WriteCancelled => "WRITE_CANCELLED",
            Event::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
