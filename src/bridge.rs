//! The bridge surface.
//!
//! One explicit state object owns the driver loader, the connection cache and
//! the cursor registry; it is constructed once at startup and passed by
//! reference to every operation. There are no implicit process-wide statics.

use std::sync::Arc;

use crate::bind;
use crate::cache::{ConnectionCache, ConnectionEntry};
use crate::driver::{ConnectOptions, Driver, ParamValue};
use crate::error::Result;
use crate::loader::DriverLoader;
use crate::registry::{CursorRegistry, Handle};
use crate::row::Row;
use crate::sqlite::SqliteDriver;
use crate::types::map_declared_type;

pub struct Bridge {
    loader: DriverLoader,
    cache: ConnectionCache,
    registry: CursorRegistry,
}

impl Bridge {
    /// Create a bridge with the embedded sqlite driver pre-registered.
    /// Remote drivers are added with [`Bridge::register_driver`] or resolved
    /// from an artifact path at connect time.
    pub fn new() -> Self {
        let loader = DriverLoader::new();
        loader.register(Arc::new(SqliteDriver));
        Self {
            loader,
            cache: ConnectionCache::new(),
            registry: CursorRegistry::new(),
        }
    }

    pub fn register_driver(&self, driver: Arc<dyn Driver>) {
        self.loader.register(driver);
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    /// Return the cached live connection for `key`, or establish a new one
    /// through the driver named in `options`.
    pub fn connect(
        &self,
        key: i64,
        server_identity: u64,
        mapping_identity: u64,
        options: &ConnectOptions,
    ) -> Result<Arc<ConnectionEntry>> {
        self.cache
            .get_or_create(key, server_identity, mapping_identity, options, &self.loader)
    }

    /// Close the connection for `key`: its open statements first, then the
    /// connection handle, leaving a tombstone for the key.
    pub fn disconnect(&self, key: i64) -> Result<()> {
        self.registry.close_for_connection(key)?;
        self.cache.close(key)
    }

    pub fn invalidate_all(&self) -> Result<()> {
        self.cache.invalidate_all()
    }

    pub fn invalidate_by_server(&self, server_identity: u64) -> Result<()> {
        self.cache.invalidate_by_server(server_identity)
    }

    pub fn invalidate_by_mapping(&self, mapping_identity: u64) -> Result<()> {
        self.cache.invalidate_by_mapping(mapping_identity)
    }

    // ------------------------------------------------------------------
    // Cursors and prepared statements
    // ------------------------------------------------------------------

    pub fn open_cursor(&self, key: i64, query: &str) -> Result<Handle> {
        let conn = self.cache.get(key)?;
        self.registry.open_cursor(&conn, query)
    }

    pub fn open_prepared(&self, key: i64, query: &str) -> Result<Handle> {
        let conn = self.cache.get(key)?;
        self.registry.open_prepared(&conn, query)
    }

    pub fn execute(&self, handle: Handle) -> Result<u64> {
        self.registry.execute(handle)
    }

    pub fn fetch_next_row(&self, handle: Handle) -> Result<Option<Row>> {
        self.registry.fetch_next_row(handle)
    }

    pub fn column_count(&self, handle: Handle) -> Result<usize> {
        self.registry.column_count(handle)
    }

    pub fn affected_row_count(&self, handle: Handle) -> Result<u64> {
        self.registry.affected_row_count(handle)
    }

    pub fn cursor_column_names(&self, handle: Handle) -> Result<Vec<String>> {
        self.registry.column_names(handle)
    }

    /// Normalized target type names for an open cursor's result columns.
    pub fn cursor_column_types(&self, handle: Handle) -> Result<Vec<String>> {
        self.registry.column_types(handle)
    }

    pub fn clear(&self, handle: Handle) -> Result<()> {
        self.registry.clear(handle)
    }

    pub fn cancel(&self, handle: Handle) -> Result<()> {
        self.registry.cancel(handle)
    }

    pub fn close_all(&self) -> Result<()> {
        self.registry.close_all()
    }

    // ------------------------------------------------------------------
    // Parameter binding, one operation per value kind
    // ------------------------------------------------------------------

    pub fn bind_null(&self, handle: Handle, position: usize) -> Result<()> {
        bind::bind_value(&self.registry, handle, position, ParamValue::Null)
    }

    pub fn bind_int(&self, handle: Handle, position: usize, value: i32) -> Result<()> {
        bind::bind_value(&self.registry, handle, position, ParamValue::Int(value))
    }

    pub fn bind_bigint(&self, handle: Handle, position: usize, value: i64) -> Result<()> {
        bind::bind_value(&self.registry, handle, position, ParamValue::BigInt(value))
    }

    pub fn bind_float4(&self, handle: Handle, position: usize, value: f32) -> Result<()> {
        bind::bind_value(&self.registry, handle, position, ParamValue::Float4(value))
    }

    pub fn bind_float8(&self, handle: Handle, position: usize, value: f64) -> Result<()> {
        bind::bind_value(&self.registry, handle, position, ParamValue::Float8(value))
    }

    pub fn bind_bool(&self, handle: Handle, position: usize, value: bool) -> Result<()> {
        bind::bind_value(&self.registry, handle, position, ParamValue::Bool(value))
    }

    pub fn bind_text(&self, handle: Handle, position: usize, value: &str) -> Result<()> {
        bind::bind_value(
            &self.registry,
            handle,
            position,
            ParamValue::Text(value.to_string()),
        )
    }

    pub fn bind_bytes(&self, handle: Handle, position: usize, value: &[u8]) -> Result<()> {
        bind::bind_value(
            &self.registry,
            handle,
            position,
            ParamValue::Bytes(value.to_vec()),
        )
    }

    /// Bind a local time of day from its canonical text form.
    pub fn bind_time(&self, handle: Handle, position: usize, value: &str) -> Result<()> {
        bind::bind_time(&self.registry, handle, position, value)
    }

    /// Bind a time of day with offset from its canonical text form.
    pub fn bind_timetz(&self, handle: Handle, position: usize, value: &str) -> Result<()> {
        bind::bind_timetz(&self.registry, handle, position, value)
    }

    /// Bind a microsecond-precision instant given as signed microseconds from
    /// the Unix epoch.
    pub fn bind_timestamp(&self, handle: Handle, position: usize, epoch_micros: i64) -> Result<()> {
        bind::bind_timestamp(&self.registry, handle, position, epoch_micros)
    }

    // ------------------------------------------------------------------
    // Remote metadata
    // ------------------------------------------------------------------

    pub fn identifier_quote_string(&self, key: i64) -> Result<String> {
        self.cache.get(key)?.with_conn(|c| c.identifier_quote_string())
    }

    pub fn table_names(&self, key: i64) -> Result<Vec<String>> {
        self.cache.get(key)?.with_conn(|c| c.table_names())
    }

    pub fn column_names(&self, key: i64, table: &str) -> Result<Vec<String>> {
        self.cache.get(key)?.with_conn(|c| c.column_names(table))
    }

    /// Declared column types for `table`, mapped to the names the calling
    /// engine uses in column definitions.
    pub fn column_types(&self, key: i64, table: &str) -> Result<Vec<String>> {
        let declared = self.cache.get(key)?.with_conn(|c| c.column_types(table))?;
        Ok(declared.iter().map(|t| map_declared_type(t)).collect())
    }

    pub fn primary_key(&self, key: i64, table: &str) -> Result<Vec<String>> {
        self.cache.get(key)?.with_conn(|c| c.primary_key(table))
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &CursorRegistry {
        &self.registry
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}
