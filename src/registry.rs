//! Cursor and prepared-statement registry.
//!
//! Every open cursor or prepared statement is multiplexed through a
//! process-wide positive integer handle. Allocation is serialized and
//! monotonic, wrapping from `i32::MAX` back to 1; a handle id is never reused
//! while its entry is live. The registry itself is read concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::ConnectionEntry;
use crate::driver::{Cursor, PreparedStatement};
use crate::error::{BridgeError, Result};
use crate::row::{marshal_row, Row};
use crate::types::normalize_column_type;

/// Opaque positive integer identifying one open cursor or prepared statement.
pub type Handle = i32;

/// One registry entry: an open read cursor or a parameterized statement,
/// never both.
pub(crate) enum StatementEntry {
    Cursor {
        cursor: Box<dyn Cursor>,
        /// Fixed at creation from the executed query's result shape.
        column_count: usize,
        connection_key: i64,
    },
    Prepared {
        statement: Box<dyn PreparedStatement>,
        /// Overwritten, not accumulated, on each execution.
        affected_rows: u64,
        connection_key: i64,
    },
}

impl StatementEntry {
    fn connection_key(&self) -> i64 {
        match self {
            StatementEntry::Cursor { connection_key, .. }
            | StatementEntry::Prepared { connection_key, .. } => *connection_key,
        }
    }

    fn close(&mut self) -> Result<()> {
        match self {
            StatementEntry::Cursor { cursor, .. } => cursor.close(),
            StatementEntry::Prepared { statement, .. } => statement.close(),
        }
    }
}

pub struct CursorRegistry {
    entries: RwLock<HashMap<Handle, Arc<Mutex<StatementEntry>>>>,
    /// Last issued handle, guarded separately so lookups stay concurrent.
    next_handle: Mutex<Handle>,
}

impl CursorRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_handle: Mutex::new(0),
        }
    }

    /// Allocate a fresh handle and insert `entry` under it, atomically with
    /// respect to other allocators.
    fn insert(&self, entry: StatementEntry) -> Result<Handle> {
        let mut next = self.next_handle.lock();
        let mut entries = self.entries.write();

        let first = if *next < 1 || *next == i32::MAX {
            1
        } else {
            *next + 1
        };
        let mut candidate = first;
        while entries.contains_key(&candidate) {
            candidate = if candidate == i32::MAX { 1 } else { candidate + 1 };
            if candidate == first {
                return Err(BridgeError::RegistryExhausted);
            }
        }

        *next = candidate;
        entries.insert(candidate, Arc::new(Mutex::new(entry)));
        Ok(candidate)
    }

    /// Execute `query` as a forward-only read cursor on `conn` and register
    /// the open result stream.
    pub fn open_cursor(&self, conn: &ConnectionEntry, query: &str) -> Result<Handle> {
        let cursor = conn.with_conn(|c| c.open_cursor(query, conn.timeout()))?;
        let column_count = cursor.columns().len();
        let handle = self.insert(StatementEntry::Cursor {
            cursor,
            column_count,
            connection_key: conn.key(),
        })?;
        debug!(handle, column_count, "opened cursor");
        Ok(handle)
    }

    /// Prepare `query` on `conn` without executing it and register the
    /// statement with zero bound parameters.
    pub fn open_prepared(&self, conn: &ConnectionEntry, query: &str) -> Result<Handle> {
        let statement = conn.with_conn(|c| c.prepare(query, conn.timeout()))?;
        let handle = self.insert(StatementEntry::Prepared {
            statement,
            affected_rows: 0,
            connection_key: conn.key(),
        })?;
        debug!(handle, "opened prepared statement");
        Ok(handle)
    }

    fn entry(&self, handle: Handle) -> Result<Arc<Mutex<StatementEntry>>> {
        self.entries
            .read()
            .get(&handle)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("unknown handle {handle}")))
    }

    /// Run `f` against the prepared statement under `handle`.
    pub(crate) fn with_prepared<T>(
        &self,
        handle: Handle,
        f: impl FnOnce(&mut dyn PreparedStatement) -> Result<T>,
    ) -> Result<T> {
        let slot = self.entry(handle)?;
        let mut guard = slot.lock();
        match &mut *guard {
            StatementEntry::Prepared { statement, .. } => f(statement.as_mut()),
            StatementEntry::Cursor { .. } => Err(BridgeError::InvalidState(format!(
                "handle {handle} is a cursor, not a prepared statement"
            ))),
        }
    }

    /// Execute the prepared statement with its currently bound parameters.
    /// On success the affected row count is recorded and all bound parameters
    /// are cleared; they must be rebound before the next execution.
    pub fn execute(&self, handle: Handle) -> Result<u64> {
        let slot = self.entry(handle)?;
        let mut guard = slot.lock();
        match &mut *guard {
            StatementEntry::Prepared {
                statement,
                affected_rows,
                ..
            } => {
                let count = statement.execute()?;
                statement.clear_params()?;
                *affected_rows = count;
                Ok(count)
            }
            StatementEntry::Cursor { .. } => Err(BridgeError::InvalidState(format!(
                "handle {handle} is a cursor, not a prepared statement"
            ))),
        }
    }

    /// Advance the cursor one row. On exhaustion the underlying statement is
    /// closed, the entry is removed, and `None` signals end of data.
    pub fn fetch_next_row(&self, handle: Handle) -> Result<Option<Row>> {
        let slot = self.entry(handle)?;
        let mut guard = slot.lock();
        let fetched = match &mut *guard {
            StatementEntry::Cursor { cursor, .. } => cursor.next_row()?,
            StatementEntry::Prepared { .. } => {
                return Err(BridgeError::InvalidState(format!(
                    "handle {handle} is a prepared statement, not a cursor"
                )))
            }
        };

        match fetched {
            Some(values) => Ok(Some(marshal_row(values))),
            None => {
                let close_result = guard.close();
                drop(guard);
                self.entries.write().remove(&handle);
                debug!(handle, "cursor exhausted, handle removed");
                close_result?;
                Ok(None)
            }
        }
    }

    /// Result column count of an open cursor.
    pub fn column_count(&self, handle: Handle) -> Result<usize> {
        let slot = self.entry(handle)?;
        let guard = slot.lock();
        match &*guard {
            StatementEntry::Cursor { column_count, .. } => Ok(*column_count),
            StatementEntry::Prepared { .. } => Err(BridgeError::InvalidState(format!(
                "handle {handle} is a prepared statement, not a cursor"
            ))),
        }
    }

    /// Affected row count recorded by the last execution.
    pub fn affected_row_count(&self, handle: Handle) -> Result<u64> {
        let slot = self.entry(handle)?;
        let guard = slot.lock();
        match &*guard {
            StatementEntry::Prepared { affected_rows, .. } => Ok(*affected_rows),
            StatementEntry::Cursor { .. } => Err(BridgeError::InvalidState(format!(
                "handle {handle} is a cursor, not a prepared statement"
            ))),
        }
    }

    /// Result column names of an open cursor.
    pub fn column_names(&self, handle: Handle) -> Result<Vec<String>> {
        self.with_cursor_columns(handle, |columns| {
            columns.iter().map(|c| c.name.clone()).collect()
        })
    }

    /// Normalized target type names for an open cursor's result columns.
    pub fn column_types(&self, handle: Handle) -> Result<Vec<String>> {
        self.with_cursor_columns(handle, |columns| {
            columns
                .iter()
                .map(|c| normalize_column_type(c.type_code, &c.native_type_name))
                .collect()
        })
    }

    fn with_cursor_columns<T>(
        &self,
        handle: Handle,
        f: impl FnOnce(&[crate::driver::ColumnDescriptor]) -> T,
    ) -> Result<T> {
        let slot = self.entry(handle)?;
        let guard = slot.lock();
        match &*guard {
            StatementEntry::Cursor { cursor, .. } => Ok(f(cursor.columns())),
            StatementEntry::Prepared { .. } => Err(BridgeError::InvalidState(format!(
                "handle {handle} is a prepared statement, not a cursor"
            ))),
        }
    }

    /// Remove the entry if present, closing its underlying resource. Safe to
    /// call on an already-cleared or unknown handle.
    pub fn clear(&self, handle: Handle) -> Result<()> {
        let removed = self.entries.write().remove(&handle);
        match removed {
            Some(slot) => slot.lock().close(),
            None => Ok(()),
        }
    }

    /// Driver-level statement cancellation: the handle transitions straight
    /// to removed, same as `clear`. A race with an in-flight fetch or execute
    /// leaves the registry consistent; the loser finds the handle gone.
    pub fn cancel(&self, handle: Handle) -> Result<()> {
        debug!(handle, "canceling statement");
        self.clear(handle)
    }

    /// Clear every entry currently registered, collect-and-continue.
    pub fn close_all(&self) -> Result<()> {
        let drained: Vec<_> = {
            let mut entries = self.entries.write();
            entries.drain().collect()
        };
        let mut first_err = None;
        for (handle, slot) in drained {
            if let Err(e) = slot.lock().close() {
                warn!(handle, error = %e, "failed to close statement");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Clear every entry belonging to `connection_key`, collect-and-continue.
    /// Runs before the connection handle itself is closed.
    pub fn close_for_connection(&self, connection_key: i64) -> Result<()> {
        let matched: Vec<_> = {
            let mut entries = self.entries.write();
            let handles: Vec<Handle> = entries
                .iter()
                .filter(|(_, slot)| slot.lock().connection_key() == connection_key)
                .map(|(handle, _)| *handle)
                .collect();
            handles
                .into_iter()
                .filter_map(|h| entries.remove(&h).map(|slot| (h, slot)))
                .collect()
        };
        let mut first_err = None;
        for (handle, slot) in matched {
            if let Err(e) = slot.lock().close() {
                warn!(handle, error = %e, "failed to close statement");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Number of live entries; used by tests and diagnostics.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn set_next_handle(&self, value: Handle) {
        *self.next_handle.lock() = value;
    }
}

impl Default for CursorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
