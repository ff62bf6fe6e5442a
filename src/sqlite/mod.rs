//! Embedded reference driver over rusqlite.
//!
//! Registered under the name `"sqlite"`. It exists so the whole bridge
//! pipeline can be exercised end-to-end against a real SQL engine; remote
//! deployments register their own drivers or load them from artifacts.
//!
//! The cursor materializes its result set at open time. Streaming row by row
//! from the remote side is a property of real call-level drivers; the bridge
//! contract only requires forward-only delivery.

pub mod connection;

#[cfg(test)]
mod tests;

pub use connection::SqliteDriver;
