//! SQLite driver implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::{Value, ValueRef};
use rusqlite::Connection;

use crate::driver::{
    ColumnDescriptor, ConnectOptions, Cursor, Driver, DriverConnection, ParamValue,
    PreparedStatement, RemoteValue,
};
use crate::error::{BridgeError, Result};
use crate::types::TypeCode;

pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn DriverConnection>> {
        // URL forms: sqlite://:memory: or sqlite://path/to/db
        let path = options
            .url
            .strip_prefix("sqlite://")
            .or_else(|| options.url.strip_prefix("sqlite:"))
            .unwrap_or(&options.url);

        let conn = if path.is_empty() || path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| BridgeError::Connection(e.to_string()))?;

        // SQLite has no per-statement timeout API; the configured timeout
        // bounds lock waits instead.
        if let Some(timeout) = options.timeout() {
            conn.busy_timeout(timeout)
                .map_err(|e| BridgeError::Connection(e.to_string()))?;
        }

        Ok(Box::new(SqliteConnection {
            conn: Arc::new(Mutex::new(Some(conn))),
        }))
    }
}

pub struct SqliteConnection {
    /// Shared with prepared statements so they outlive borrows of the
    /// connection; `None` once closed.
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteConnection {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock();
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(BridgeError::Connection("connection is closed".to_string())),
        }
    }

    fn query_strings(&self, sql: &str, column: usize) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql).map_err(execution_error)?;
            let mut rows = stmt.query([]).map_err(execution_error)?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(execution_error)? {
                let value: String = row.get(column).map_err(execution_error)?;
                out.push(value);
            }
            Ok(out)
        })
    }
}

impl DriverConnection for SqliteConnection {
    fn open_cursor(&mut self, query: &str, _timeout: Option<Duration>) -> Result<Box<dyn Cursor>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(query).map_err(execution_error)?;
            let columns: Vec<ColumnDescriptor> = stmt
                .columns()
                .iter()
                .map(|col| {
                    let decl = col.decl_type().unwrap_or("").to_ascii_uppercase();
                    ColumnDescriptor {
                        name: col.name().to_string(),
                        type_code: type_code_for_decl(&decl),
                        native_type_name: decl,
                    }
                })
                .collect();

            let mut buffered = Vec::new();
            let mut rows = stmt.query([]).map_err(execution_error)?;
            while let Some(row) = rows.next().map_err(execution_error)? {
                let mut values = Vec::with_capacity(columns.len());
                for (i, col) in columns.iter().enumerate() {
                    let value = row.get_ref(i).map_err(execution_error)?;
                    values.push(remote_value(value, col.type_code));
                }
                buffered.push(values);
            }

            Ok(Box::new(SqliteCursor {
                columns,
                rows: buffered.into_iter(),
            }) as Box<dyn Cursor>)
        })
    }

    fn prepare(
        &mut self,
        query: &str,
        _timeout: Option<Duration>,
    ) -> Result<Box<dyn PreparedStatement>> {
        let expected = self.with_conn(|conn| {
            let stmt = conn.prepare(query).map_err(execution_error)?;
            Ok(stmt.parameter_count())
        })?;
        Ok(Box::new(SqlitePrepared {
            conn: self.conn.clone(),
            sql: query.to_string(),
            params: Vec::new(),
            expected,
        }))
    }

    fn identifier_quote_string(&mut self) -> Result<String> {
        Ok("\"".to_string())
    }

    fn table_names(&mut self) -> Result<Vec<String>> {
        self.query_strings(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
            0,
        )
    }

    fn column_names(&mut self, table: &str) -> Result<Vec<String>> {
        // PRAGMA table_info returns: cid, name, type, notnull, dflt_value, pk
        self.query_strings(&table_info_pragma(table), 1)
    }

    fn column_types(&mut self, table: &str) -> Result<Vec<String>> {
        let types = self.query_strings(&table_info_pragma(table), 2)?;
        Ok(types.into_iter().map(|t| t.to_ascii_uppercase()).collect())
    }

    fn primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&table_info_pragma(table)).map_err(execution_error)?;
            let mut rows = stmt.query([]).map_err(execution_error)?;
            let mut key_columns: Vec<(i64, String)> = Vec::new();
            while let Some(row) = rows.next().map_err(execution_error)? {
                let name: String = row.get(1).map_err(execution_error)?;
                let pk: i64 = row.get(5).map_err(execution_error)?;
                if pk > 0 {
                    key_columns.push((pk, name));
                }
            }
            key_columns.sort_by_key(|(pk, _)| *pk);
            Ok(key_columns.into_iter().map(|(_, name)| name).collect())
        })
    }

    fn close(&mut self) -> Result<()> {
        let conn = self.conn.lock().take();
        match conn {
            Some(conn) => conn
                .close()
                .map_err(|(_, e)| BridgeError::Connection(e.to_string())),
            None => Ok(()),
        }
    }
}

struct SqliteCursor {
    columns: Vec<ColumnDescriptor>,
    rows: std::vec::IntoIter<Vec<RemoteValue>>,
}

impl Cursor for SqliteCursor {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<RemoteValue>>> {
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct SqlitePrepared {
    conn: Arc<Mutex<Option<Connection>>>,
    sql: String,
    /// 1-based parameter slots; `None` marks an unbound position.
    params: Vec<Option<Value>>,
    expected: usize,
}

impl PreparedStatement for SqlitePrepared {
    fn bind(&mut self, position: usize, value: ParamValue) -> Result<()> {
        if position == 0 {
            return Err(BridgeError::InvalidState(
                "parameter positions are 1-based".to_string(),
            ));
        }
        if position > self.params.len() {
            self.params.resize(position, None);
        }
        self.params[position - 1] = Some(sqlite_value(value));
        Ok(())
    }

    fn execute(&mut self) -> Result<u64> {
        if self.expected > 0
            && (self.params.len() < self.expected || self.params.iter().any(Option::is_none))
        {
            return Err(BridgeError::InvalidState(
                "no parameters bound for prepared statement".to_string(),
            ));
        }

        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| BridgeError::Connection("connection is closed".to_string()))?;
        let mut stmt = conn.prepare_cached(&self.sql).map_err(execution_error)?;
        let values: Vec<Value> = self
            .params
            .iter()
            .cloned()
            .map(|p| p.unwrap_or(Value::Null))
            .collect();
        let affected = stmt
            .execute(rusqlite::params_from_iter(values))
            .map_err(execution_error)?;
        Ok(affected as u64)
    }

    fn clear_params(&mut self) -> Result<()> {
        self.params.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

fn execution_error(e: rusqlite::Error) -> BridgeError {
    BridgeError::Execution(e.to_string())
}

fn table_info_pragma(table: &str) -> String {
    format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""))
}

/// Map a declared SQLite column type to a generic type code. Expression
/// columns have no declared type and come through as `Other`.
fn type_code_for_decl(decl: &str) -> TypeCode {
    match decl {
        "TINYINT" => TypeCode::TinyInt,
        "SMALLINT" | "INT2" => TypeCode::SmallInt,
        "INT" | "INTEGER" | "INT4" | "MEDIUMINT" => TypeCode::Integer,
        "BIGINT" | "INT8" => TypeCode::BigInt,
        "REAL" => TypeCode::Real,
        "FLOAT" => TypeCode::Float,
        "DOUBLE" | "DOUBLE PRECISION" => TypeCode::Double,
        "DECIMAL" => TypeCode::Decimal,
        "NUMERIC" => TypeCode::Numeric,
        "BOOL" | "BOOLEAN" => TypeCode::Boolean,
        "TEXT" | "CLOB" => TypeCode::VarChar,
        "BLOB" => TypeCode::Blob,
        "DATE" => TypeCode::Date,
        "TIME" => TypeCode::Time,
        "TIMESTAMP" | "DATETIME" => TypeCode::Timestamp,
        d if d.starts_with("VARCHAR") || d.starts_with("CHAR") || d.starts_with("NVARCHAR") => {
            TypeCode::VarChar
        }
        _ => TypeCode::Other,
    }
}

fn remote_value(value: ValueRef<'_>, code: TypeCode) -> RemoteValue {
    match value {
        ValueRef::Null => RemoteValue::Null,
        ValueRef::Blob(data) => RemoteValue::Bytes(data.to_vec()),
        ValueRef::Integer(i) => RemoteValue::Text(i.to_string()),
        ValueRef::Real(f) => RemoteValue::Text(f.to_string()),
        ValueRef::Text(data) => {
            let text = String::from_utf8_lossy(data).into_owned();
            if code.is_timestamp() {
                if let Some(instant) = parse_timestamp_text(&text) {
                    return RemoteValue::Timestamp(instant);
                }
            }
            RemoteValue::Text(text)
        }
    }
}

/// Timestamp columns are stored as text; zone-qualified values are converted
/// to UTC, naive values are taken as already UTC.
fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(zoned) = DateTime::parse_from_rfc3339(text) {
        return Some(zoned.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Convert a bridge parameter value to its SQLite storage form.
fn sqlite_value(value: ParamValue) -> Value {
    match value {
        ParamValue::Null => Value::Null,
        ParamValue::Int(i) => Value::Integer(i64::from(i)),
        ParamValue::BigInt(i) => Value::Integer(i),
        ParamValue::Float4(f) => Value::Real(f64::from(f)),
        ParamValue::Float8(f) => Value::Real(f),
        ParamValue::Bool(b) => Value::Integer(i64::from(b)),
        ParamValue::Text(s) => Value::Text(s),
        ParamValue::Bytes(b) => Value::Blob(b),
        ParamValue::Time(t) => Value::Text(t.format("%H:%M:%S%.f").to_string()),
        ParamValue::TimeTz(t, offset) => {
            Value::Text(format!("{}{}", t.format("%H:%M:%S%.f"), offset))
        }
        // Fixed six fraction digits keep microsecond precision deterministic
        // in storage.
        ParamValue::Timestamp(dt) => Value::Text(dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()),
        ParamValue::TimestampNaive(dt) => {
            Value::Text(dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string())
        }
    }
}
