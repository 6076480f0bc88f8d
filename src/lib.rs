//! timetravel - a versioned key/value record store with time travel
//!
//! Every update to a record is stored as a new immutable version, so any
//! past state can be read back by version number or by timestamp.

pub mod cli;
pub mod http_server;
pub mod observability;
pub mod service;
pub mod storage;
