//! Bindable SQL values.
//!
//! [`Value`] is the owned, dynamically typed value that flows through the
//! parameter maps of statements and ends up in the positional parameter list of
//! a [`CompiledQuery`](crate::CompiledQuery). It implements `ToSql`, adapting
//! itself to the concrete server-side type of each placeholder.

use crate::dialect::Dialect;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type};
use uuid::Uuid;

type BoxError = Box<dyn StdError + Sync + Send>;

/// A single SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Json(serde_json::Value),
    Array(Vec<Value>),
    Hstore(HashMap<String, Option<String>>),
    /// A member of an enumeration: its name and underlying value.
    ///
    /// Enum columns store the member *name*; see [`SqlType::Enum`](crate::SqlType::Enum).
    Enum { name: String, value: Box<Value> },
    #[cfg(feature = "rust_decimal")]
    Numeric(rust_decimal::Decimal),
}

impl Value {
    /// Create an enum member value.
    pub fn enum_member(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Value::Enum {
            name: name.into(),
            value: Box::new(value.into()),
        }
    }

    /// Create a bytea value.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(data.into())
    }

    /// Serialize any `serde::Serialize` value into a JSON value.
    pub fn json<T: serde::Serialize>(value: &T) -> serde_json::Result<Self> {
        Ok(Value::Json(serde_json::to_value(value)?))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render this value as a SQL literal.
    ///
    /// Used by inline compilation for logging and debugging. Never send the
    /// result to the server in place of bound parameters.
    pub fn to_literal(&self, dialect: &Dialect) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) if v.is_finite() => v.to_string(),
            Value::Float(v) if v.is_nan() => "'NaN'::float8".to_string(),
            Value::Float(v) if *v > 0.0 => "'Infinity'::float8".to_string(),
            Value::Float(_) => "'-Infinity'::float8".to_string(),
            Value::Text(s) => dialect.quote_literal(s),
            Value::Bytes(data) => {
                let mut hex = String::with_capacity(data.len() * 2 + 2);
                hex.push_str("\\x");
                for b in data {
                    hex.push_str(&format!("{b:02x}"));
                }
                format!("'{hex}'::bytea")
            }
            Value::Uuid(v) => format!("'{v}'"),
            Value::Timestamp(v) => format!("'{}'", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::TimestampTz(v) => format!("'{}'", v.to_rfc3339()),
            Value::Date(v) => format!("'{}'", v.format("%Y-%m-%d")),
            Value::Json(v) => dialect.quote_literal(&v.to_string()),
            Value::Array(items) if items.is_empty() => "'{}'".to_string(),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_literal(dialect)).collect();
                format!("ARRAY[{}]", parts.join(", "))
            }
            Value::Hstore(map) => {
                // Sorted so the rendering is stable.
                let sorted: BTreeMap<_, _> = map.iter().collect();
                let pairs: Vec<String> = sorted
                    .into_iter()
                    .map(|(k, v)| match v {
                        Some(v) => format!("{}=>{}", hstore_quote(k), hstore_quote(v)),
                        None => format!("{}=>NULL", hstore_quote(k)),
                    })
                    .collect();
                dialect.quote_literal(&pairs.join(", "))
            }
            Value::Enum { name, .. } => dialect.quote_literal(name),
            #[cfg(feature = "rust_decimal")]
            Value::Numeric(v) => v.to_string(),
        }
    }
}

fn hstore_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql_checked(ty, out),
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::OID => u32::try_from(*v)?.to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            Value::Text(s) => write_text(s, ty, out),
            Value::Bytes(v) => v.to_sql_checked(ty, out),
            Value::Uuid(v) => v.to_sql_checked(ty, out),
            Value::Timestamp(v) => v.to_sql_checked(ty, out),
            Value::TimestampTz(v) => v.to_sql_checked(ty, out),
            Value::Date(v) => v.to_sql_checked(ty, out),
            Value::Json(v) => v.to_sql_checked(ty, out),
            Value::Array(items) => {
                if !matches!(ty.kind(), Kind::Array(_)) {
                    return Err(format!("cannot bind an array value to type {ty}").into());
                }
                items.to_sql(ty, out)
            }
            Value::Hstore(map) => map.to_sql_checked(ty, out),
            Value::Enum { name, value } => match ty.kind() {
                Kind::Enum(_) => write_text(name, ty, out),
                _ if <&str as ToSql>::accepts(ty) => write_text(name, ty, out),
                _ => value.to_sql(ty, out),
            },
            #[cfg(feature = "rust_decimal")]
            Value::Numeric(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// Text goes out verbatim for enum types, which share the text wire format.
fn write_text(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if matches!(ty.kind(), Kind::Enum(_)) {
        out.extend_from_slice(s.as_bytes());
        return Ok(IsNull::No);
    }
    s.to_sql_checked(ty, out)
}

macro_rules! impl_from_value {
    ($($ty:ty => |$v:ident| $expr:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $expr
                }
            }
        )*
    };
}

impl_from_value! {
    bool => |v| Value::Bool(v),
    i16 => |v| Value::Int(i64::from(v)),
    i32 => |v| Value::Int(i64::from(v)),
    i64 => |v| Value::Int(v),
    u32 => |v| Value::Int(i64::from(v)),
    f32 => |v| Value::Float(f64::from(v)),
    f64 => |v| Value::Float(v),
    String => |v| Value::Text(v),
    &str => |v| Value::Text(v.to_string()),
    Uuid => |v| Value::Uuid(v),
    NaiveDateTime => |v| Value::Timestamp(v),
    DateTime<Utc> => |v| Value::TimestampTz(v),
    NaiveDate => |v| Value::Date(v),
    serde_json::Value => |v| Value::Json(v),
    HashMap<String, Option<String>> => |v| Value::Hstore(v),
}

#[cfg(feature = "rust_decimal")]
impl From<rust_decimal::Decimal> for Value {
    fn from(v: rust_decimal::Decimal) -> Self {
        Value::Numeric(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

/// One entry of a statement's parameter row.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A client-side value, bound as a parameter.
    Value(Value),
    /// Ask the server for the next value of a named sequence (`nextval('name')`).
    NextVal(String),
}

impl ParamValue {
    /// The bound value, if this is not a server-side expression.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ParamValue::Value(v) => Some(v),
            ParamValue::NextVal(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Value(Value::Null))
    }
}

impl From<Value> for ParamValue {
    fn from(v: Value) -> Self {
        ParamValue::Value(v)
    }
}

/// One row of named parameters.
pub type ParamMap = BTreeMap<String, ParamValue>;
