//! Remote type normalization.
//!
//! Maps a driver-reported column type descriptor to the fixed target type
//! vocabulary the calling engine understands. Vendor-specific opaque types are
//! resolved by name through declarative lookup tables, so new vendor mappings
//! are data additions, not code changes.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Native type families reported by call-level drivers.
///
/// This mirrors the generic type-code vocabulary most client libraries expose
/// for result metadata. `Other` covers vendor-specific types that only carry a
/// native type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Float,
    Double,
    Decimal,
    Numeric,
    Bit,
    Boolean,
    Char,
    VarChar,
    LongVarChar,
    Binary,
    VarBinary,
    LongVarBinary,
    Blob,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Array,
    Other,
}

impl TypeCode {
    /// Binary-family columns are marshaled as raw byte sequences.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            TypeCode::Binary | TypeCode::VarBinary | TypeCode::LongVarBinary | TypeCode::Blob
        )
    }

    /// Timestamp-family columns are marshaled as ISO-8601 UTC instant text.
    pub fn is_timestamp(self) -> bool {
        matches!(self, TypeCode::Timestamp | TypeCode::TimestampTz)
    }
}

/// Opaque native type names with a known array-of-primitive encoding.
///
/// These show up as `Array`/`Other` type codes whose meaning is only carried
/// by the vendor's type name (GridDB array columns, for instance).
static OPAQUE_TYPE_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("BOOL_ARRAY", "BOOL[]"),
        ("STRING_ARRAY", "TEXT[]"),
        ("BYTE_ARRAY", "INT2[]"),
        ("SHORT_ARRAY", "INT2[]"),
        ("INTEGER_ARRAY", "INTEGER[]"),
        ("LONG_ARRAY", "BIGINT[]"),
        ("FLOAT_ARRAY", "FLOAT4[]"),
        ("DOUBLE_ARRAY", "FLOAT8[]"),
        ("TIMESTAMP_ARRAY", "TIMESTAMPTZ[]"),
    ])
});

/// Declared column type names, as reported by table introspection, that need
/// renaming before the calling engine can use them in a column definition.
static DECLARED_TYPE_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("BYTE", "SMALLINT"),
        ("SHORT", "SMALLINT"),
        ("LONG", "BIGINT"),
        ("CHAR", "CHAR (1)"),
        ("STRING", "TEXT"),
        ("FLOAT", "FLOAT4"),
        ("DOUBLE", "FLOAT8"),
        ("BLOB", "BYTEA"),
        ("BOOL_ARRAY", "BOOL[]"),
        ("STRING_ARRAY", "TEXT[]"),
        ("BYTE_ARRAY", "SMALLINT[]"),
        ("SHORT_ARRAY", "SMALLINT[]"),
        ("INTEGER_ARRAY", "INTEGER[]"),
        ("LONG_ARRAY", "BIGINT[]"),
        ("FLOAT_ARRAY", "FLOAT4[]"),
        ("DOUBLE_ARRAY", "FLOAT8[]"),
        ("TIMESTAMP_ARRAY", "TIMESTAMP[]"),
    ])
});

/// Normalize one result column's type descriptor to a target logical type
/// name.
///
/// `TIMESTAMP` is always normalized to the zone-aware variant: the row
/// marshaler forces timestamps to UTC, so the engine-side column must carry a
/// zone. Opaque (`Array`/`Other`) codes are resolved by native type name; an
/// unmatched name passes through verbatim for the calling engine to interpret
/// or reject.
pub fn normalize_column_type(code: TypeCode, native_name: &str) -> String {
    match code {
        TypeCode::TinyInt | TypeCode::SmallInt => "INT2".to_string(),
        TypeCode::Integer => "INT4".to_string(),
        TypeCode::BigInt => "INT8".to_string(),
        TypeCode::Real | TypeCode::Float => "FLOAT4".to_string(),
        TypeCode::Double => "FLOAT8".to_string(),
        TypeCode::Decimal | TypeCode::Numeric => "NUMERIC".to_string(),
        TypeCode::Bit | TypeCode::Boolean => "BOOL".to_string(),
        TypeCode::Char | TypeCode::VarChar | TypeCode::LongVarChar => "TEXT".to_string(),
        TypeCode::Binary | TypeCode::VarBinary | TypeCode::LongVarBinary | TypeCode::Blob => {
            "BYTEA".to_string()
        }
        TypeCode::Date => "DATE".to_string(),
        TypeCode::Time => "TIME".to_string(),
        TypeCode::TimeTz => "TIMETZ".to_string(),
        TypeCode::Timestamp | TypeCode::TimestampTz => "TIMESTAMPTZ".to_string(),
        TypeCode::Array | TypeCode::Other => OPAQUE_TYPE_NAMES
            .get(native_name)
            .map(|s| s.to_string())
            .unwrap_or_else(|| native_name.to_string()),
    }
}

/// Map a declared column type name from table introspection to the name the
/// calling engine should use. Unmatched names pass through verbatim.
pub fn map_declared_type(name: &str) -> String {
    DECLARED_TYPE_NAMES
        .get(name)
        .map(|s| s.to_string())
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_families() {
        assert_eq!(normalize_column_type(TypeCode::TinyInt, "TINYINT"), "INT2");
        assert_eq!(normalize_column_type(TypeCode::SmallInt, "SMALLINT"), "INT2");
        assert_eq!(normalize_column_type(TypeCode::Integer, "INTEGER"), "INT4");
        assert_eq!(normalize_column_type(TypeCode::BigInt, "BIGINT"), "INT8");
    }

    #[test]
    fn test_float_and_numeric_families() {
        assert_eq!(normalize_column_type(TypeCode::Real, "REAL"), "FLOAT4");
        assert_eq!(normalize_column_type(TypeCode::Float, "FLOAT"), "FLOAT4");
        assert_eq!(normalize_column_type(TypeCode::Double, "DOUBLE"), "FLOAT8");
        assert_eq!(normalize_column_type(TypeCode::Decimal, "DECIMAL"), "NUMERIC");
        assert_eq!(normalize_column_type(TypeCode::Numeric, "NUMERIC"), "NUMERIC");
    }

    #[test]
    fn test_timestamp_always_zone_aware() {
        assert_eq!(
            normalize_column_type(TypeCode::Timestamp, "TIMESTAMP"),
            "TIMESTAMPTZ"
        );
        assert_eq!(
            normalize_column_type(TypeCode::TimestampTz, "TIMESTAMPTZ"),
            "TIMESTAMPTZ"
        );
    }

    #[test]
    fn test_opaque_array_names() {
        assert_eq!(normalize_column_type(TypeCode::Other, "LONG_ARRAY"), "BIGINT[]");
        assert_eq!(normalize_column_type(TypeCode::Array, "BOOL_ARRAY"), "BOOL[]");
        assert_eq!(
            normalize_column_type(TypeCode::Other, "TIMESTAMP_ARRAY"),
            "TIMESTAMPTZ[]"
        );
    }

    #[test]
    fn test_opaque_passthrough() {
        assert_eq!(normalize_column_type(TypeCode::Other, "FOO_BAR"), "FOO_BAR");
        assert_eq!(normalize_column_type(TypeCode::Array, "GEOMETRY[]"), "GEOMETRY[]");
    }

    #[test]
    fn test_declared_type_mapping() {
        assert_eq!(map_declared_type("LONG"), "BIGINT");
        assert_eq!(map_declared_type("STRING"), "TEXT");
        assert_eq!(map_declared_type("CHAR"), "CHAR (1)");
        assert_eq!(map_declared_type("TIMESTAMP_ARRAY"), "TIMESTAMP[]");
        assert_eq!(map_declared_type("VARCHAR"), "VARCHAR");
    }

    #[test]
    fn test_family_predicates() {
        assert!(TypeCode::Blob.is_binary());
        assert!(TypeCode::VarBinary.is_binary());
        assert!(!TypeCode::VarChar.is_binary());

        assert!(TypeCode::Timestamp.is_timestamp());
        assert!(TypeCode::TimestampTz.is_timestamp());
        assert!(!TypeCode::Date.is_timestamp());
    }
}
