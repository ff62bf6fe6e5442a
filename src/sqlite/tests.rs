//! Driver-level tests against an in-memory database.

use chrono::{TimeZone, Utc};

use crate::driver::{ConnectOptions, Driver, ParamValue, RemoteValue};
use crate::error::BridgeError;
use crate::sqlite::SqliteDriver;
use crate::types::TypeCode;

fn memory_options() -> ConnectOptions {
    ConnectOptions::new("sqlite", "sqlite://:memory:")
}

#[test]
fn test_connect_and_close() {
    let mut conn = SqliteDriver.connect(&memory_options()).unwrap();
    assert_eq!(conn.identifier_quote_string().unwrap(), "\"");
    conn.close().unwrap();

    // Everything after close reports a connection failure.
    let err = conn.table_names().unwrap_err();
    assert!(matches!(err, BridgeError::Connection(_)));
}

#[test]
fn test_cursor_columns_and_rows() {
    let mut conn = SqliteDriver.connect(&memory_options()).unwrap();
    {
        let mut ddl = conn
            .prepare("CREATE TABLE t (id INTEGER, name TEXT, payload BLOB)", None)
            .unwrap();
        ddl.execute().unwrap();
    }
    {
        let mut insert = conn
            .prepare("INSERT INTO t VALUES (?, ?, ?)", None)
            .unwrap();
        insert.bind(1, ParamValue::Int(7)).unwrap();
        insert.bind(2, ParamValue::Text("seven".to_string())).unwrap();
        insert.bind(3, ParamValue::Bytes(vec![1, 2, 3])).unwrap();
        assert_eq!(insert.execute().unwrap(), 1);
    }

    let mut cursor = conn.open_cursor("SELECT id, name, payload FROM t", None).unwrap();
    let columns = cursor.columns().to_vec();
    assert_eq!(columns.len(), 3);
    assert_eq!(columns[0].type_code, TypeCode::Integer);
    assert_eq!(columns[1].type_code, TypeCode::VarChar);
    assert_eq!(columns[2].type_code, TypeCode::Blob);

    let row = cursor.next_row().unwrap().unwrap();
    assert_eq!(row[0], RemoteValue::Text("7".to_string()));
    assert_eq!(row[1], RemoteValue::Text("seven".to_string()));
    assert_eq!(row[2], RemoteValue::Bytes(vec![1, 2, 3]));
    assert!(cursor.next_row().unwrap().is_none());
}

#[test]
fn test_timestamp_columns_are_forced_to_utc() {
    let mut conn = SqliteDriver.connect(&memory_options()).unwrap();
    {
        let mut ddl = conn.prepare("CREATE TABLE ts (v TIMESTAMP)", None).unwrap();
        ddl.execute().unwrap();
    }
    {
        let mut insert = conn.prepare("INSERT INTO ts VALUES (?)", None).unwrap();
        insert
            .bind(
                1,
                ParamValue::Timestamp(Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap()),
            )
            .unwrap();
        insert.execute().unwrap();
    }

    let mut cursor = conn.open_cursor("SELECT v FROM ts", None).unwrap();
    let row = cursor.next_row().unwrap().unwrap();
    match &row[0] {
        RemoteValue::Timestamp(instant) => {
            assert_eq!(*instant, Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap());
        }
        other => panic!("expected timestamp, got {other:?}"),
    }
}

#[test]
fn test_prepared_statement_requires_bound_parameters() {
    let mut conn = SqliteDriver.connect(&memory_options()).unwrap();
    {
        let mut ddl = conn.prepare("CREATE TABLE t (x INTEGER)", None).unwrap();
        ddl.execute().unwrap();
    }

    let mut insert = conn.prepare("INSERT INTO t VALUES (?)", None).unwrap();
    let err = insert.execute().unwrap_err();
    assert!(matches!(err, BridgeError::InvalidState(_)));

    insert.bind(1, ParamValue::Int(1)).unwrap();
    assert_eq!(insert.execute().unwrap(), 1);

    insert.clear_params().unwrap();
    let err = insert.execute().unwrap_err();
    assert!(matches!(err, BridgeError::InvalidState(_)));
}

#[test]
fn test_table_metadata() {
    let mut conn = SqliteDriver.connect(&memory_options()).unwrap();
    {
        let mut ddl = conn
            .prepare(
                "CREATE TABLE orders (id INTEGER PRIMARY KEY, item TEXT, qty BIGINT)",
                None,
            )
            .unwrap();
        ddl.execute().unwrap();
    }

    assert_eq!(conn.table_names().unwrap(), vec!["orders".to_string()]);
    assert_eq!(
        conn.column_names("orders").unwrap(),
        vec!["id".to_string(), "item".to_string(), "qty".to_string()]
    );
    assert_eq!(
        conn.column_types("orders").unwrap(),
        vec!["INTEGER".to_string(), "TEXT".to_string(), "BIGINT".to_string()]
    );
    assert_eq!(conn.primary_key("orders").unwrap(), vec!["id".to_string()]);
}
