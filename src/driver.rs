//! Driver-facing traits and value types.
//!
//! The bridge never knows how a connection is produced. The embedding caller
//! registers `Driver` factories (or points the loader at a dynamic artifact)
//! and the bridge works entirely through the capability set these traits
//! expose: connect, prepare, execute, metadata, close.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, Utc};

use crate::error::Result;
use crate::types::TypeCode;

/// Options for establishing one remote connection.
///
/// Mirrors the engine-side server and user-mapping configuration; the bridge
/// passes it through to the driver untouched apart from the timeout, which is
/// also propagated to every statement created on the connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Driver name to resolve through the loader.
    pub driver: String,
    /// Driver-specific connection URL.
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Per-connection query timeout in seconds; 0 disables the timeout.
    pub query_timeout_secs: u32,
    /// Loadable driver artifact, for drivers not registered in-process.
    pub artifact_path: Option<PathBuf>,
}

impl ConnectOptions {
    pub fn new(driver: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            url: url.into(),
            user: None,
            password: None,
            query_timeout_secs: 0,
            artifact_path: None,
        }
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        if self.query_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.query_timeout_secs)))
        }
    }
}

/// A value bound into a prepared statement parameter slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Int(i32),
    BigInt(i64),
    Float4(f32),
    Float8(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    /// Local time of day, zone already discarded.
    Time(NaiveTime),
    /// Time of day with an explicit offset.
    TimeTz(NaiveTime, FixedOffset),
    /// Zone-qualified instant, so remote interpretation is independent of the
    /// local process time zone.
    Timestamp(DateTime<Utc>),
    /// Zone-naive fallback for drivers without zone-qualified binding. The
    /// binder only falls back here when `Timestamp` fails with `Unsupported`;
    /// implicit driver/server zone conventions apply on this path.
    TimestampNaive(NaiveDateTime),
}

/// A column value as produced by a driver cursor, before marshaling.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Null,
    /// Binary-family columns.
    Bytes(Vec<u8>),
    /// Timestamp-family columns, already forced to UTC by the driver.
    Timestamp(DateTime<Utc>),
    /// Everything else, via the driver's default string coercion.
    Text(String),
}

/// Shape of one result column.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_code: TypeCode,
    /// Driver-reported native type name; meaningful for `Array`/`Other` codes.
    pub native_type_name: String,
}

/// Factory for connections to one kind of external data source.
pub trait Driver: Send + Sync {
    /// Name the loader resolves this driver under.
    fn name(&self) -> &str;

    fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn DriverConnection>>;
}

/// One live link to an external data source.
///
/// All calls are blocking; drivers propagate the supplied timeout as their
/// client API allows. Statement close precedes connection close in the
/// teardown order, the bridge enforces that ordering.
pub trait DriverConnection: Send {
    /// Execute `query` as a forward-only, read-only cursor.
    fn open_cursor(&mut self, query: &str, timeout: Option<Duration>) -> Result<Box<dyn Cursor>>;

    /// Parse and prepare `query` without executing it.
    fn prepare(
        &mut self,
        query: &str,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn PreparedStatement>>;

    /// Quoting character string used by the remote dialect.
    fn identifier_quote_string(&mut self) -> Result<String>;

    fn table_names(&mut self) -> Result<Vec<String>>;

    fn column_names(&mut self, table: &str) -> Result<Vec<String>>;

    /// Declared column type names, as reported by the remote catalog. The
    /// bridge maps them through the declared-type table afterwards.
    fn column_types(&mut self, table: &str) -> Result<Vec<String>>;

    fn primary_key(&mut self, table: &str) -> Result<Vec<String>>;

    fn close(&mut self) -> Result<()>;
}

/// A forward-only open result stream bound to one executed query.
pub trait Cursor: Send {
    fn columns(&self) -> &[ColumnDescriptor];

    /// Advance one row; `None` signals end of data. Callers must not fetch
    /// again after end of data.
    fn next_row(&mut self) -> Result<Option<Vec<RemoteValue>>>;

    fn close(&mut self) -> Result<()>;
}

/// A parsed statement kept alive across bind/execute cycles.
pub trait PreparedStatement: Send {
    /// Set the 1-based parameter `position` to `value`, leaving previously
    /// bound parameters untouched.
    fn bind(&mut self, position: usize, value: ParamValue) -> Result<()>;

    /// Execute with the currently bound parameters, returning the affected
    /// row count. Does not clear parameters; the registry does that after a
    /// successful execution.
    fn execute(&mut self) -> Result<u64>;

    fn clear_params(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}
