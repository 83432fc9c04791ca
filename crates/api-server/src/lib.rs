//! guestvault-server: anonymous upload host.
//!
//! Stores each upload by content hash, keeps metadata in SQLite and serves the
//! bytes back unchanged. Encrypted uploads are opaque envelopes; decryption
//! only ever happens on the client.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod storage;
