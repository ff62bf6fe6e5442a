//! sqlbridge: connection and cursor lifecycle management for external SQL
//! sources.
//!
//! The crate sits between a host query engine and driver-level database
//! connectivity. It caches connections by logical identity, hands out integer
//! handles for cursors and prepared statements, normalizes driver type names
//! to the host engine's vocabulary, and marshals rows into a uniform text and
//! byte representation.
//!
//! Everything hangs off a [`Bridge`]: construct one at startup, register (or
//! load) drivers, then drive connections and statements through it.
//!
//! ```no_run
//! use sqlbridge::{Bridge, ConnectOptions};
//!
//! # fn main() -> sqlbridge::Result<()> {
//! let bridge = Bridge::new();
//! bridge.connect(1, 100, 200, &ConnectOptions::new("sqlite", "sqlite://:memory:"))?;
//! let cursor = bridge.open_cursor(1, "SELECT 1")?;
//! while let Some(row) = bridge.fetch_next_row(cursor)? {
//!     println!("{row:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod bind;
mod bridge;
mod cache;
pub mod driver;
mod error;
pub mod loader;
mod registry;
mod row;
pub mod sqlite;
mod types;


pub use bridge::Bridge;
pub use cache::ConnectionEntry;
pub use driver::{
    ColumnDescriptor, ConnectOptions, Cursor, Driver, DriverConnection, ParamValue,
    PreparedStatement, RemoteValue,
};
pub use error::{BridgeError, Result};
pub use loader::{DriverEntry, DriverLoader, DRIVER_ENTRYPOINT};
pub use registry::Handle;
pub use row::{Cell, Row};
pub use types::TypeCode;
