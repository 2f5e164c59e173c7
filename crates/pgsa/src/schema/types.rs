use crate::dialect::Dialect;
use crate::error::{PgsaError, PgsaResult};
use crate::value::Value;
use std::sync::Arc;

/// Per-column value transformation applied right before a value is bound.
pub type BindProcessor = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A PostgreSQL enumerated type: type name plus member names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<String>,
}

impl EnumType {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

/// Column type metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SqlType {
    /// No type information (the column can be used in DML but not in DDL).
    #[default]
    Untyped,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Boolean,
    Text,
    Varchar(Option<u32>),
    Bytea,
    Uuid,
    Timestamp,
    TimestampTz,
    Date,
    Interval,
    Json,
    Jsonb,
    Hstore,
    Array(Box<SqlType>),
    Enum(EnumType),
}

impl SqlType {
    pub fn array_of(inner: SqlType) -> Self {
        SqlType::Array(Box::new(inner))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, SqlType::SmallInt | SqlType::Integer | SqlType::BigInt)
    }

    /// The bind processor implied by the type, if any.
    ///
    /// Enum members are stored by name; arrays apply their element processor
    /// to every element.
    pub fn bind_processor(&self) -> Option<BindProcessor> {
        match self {
            SqlType::Enum(_) => Some(Arc::new(enum_to_name)),
            SqlType::Array(inner) => {
                let element = inner.bind_processor()?;
                Some(Arc::new(move |value| match value {
                    Value::Array(items) => {
                        Value::Array(items.into_iter().map(|v| element(v)).collect())
                    }
                    other => other,
                }))
            }
            _ => None,
        }
    }

    /// Render the type for DDL.
    pub fn ddl(&self, dialect: &Dialect) -> PgsaResult<String> {
        let ddl = match self {
            SqlType::Untyped => {
                return Err(PgsaError::compile("cannot render DDL for an untyped column"));
            }
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Numeric => "NUMERIC".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(Some(len)) => format!("VARCHAR({len})"),
            SqlType::Varchar(None) => "VARCHAR".to_string(),
            SqlType::Bytea => "BYTEA".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Timestamp => "TIMESTAMP WITHOUT TIME ZONE".to_string(),
            SqlType::TimestampTz => "TIMESTAMP WITH TIME ZONE".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Interval => "INTERVAL".to_string(),
            SqlType::Json => "JSON".to_string(),
            SqlType::Jsonb => "JSONB".to_string(),
            SqlType::Hstore if dialect.has_native_hstore => "HSTORE".to_string(),
            SqlType::Hstore => {
                return Err(PgsaError::compile("hstore is not available in this dialect"));
            }
            SqlType::Array(inner) => format!("{}[]", inner.ddl(dialect)?),
            SqlType::Enum(e) if dialect.supports_native_enum => dialect.quote_identifier(&e.name),
            SqlType::Enum(e) => {
                let len = e.members.iter().map(|m| m.chars().count()).max().unwrap_or(1);
                format!("VARCHAR({len})")
            }
        };
        Ok(ddl)
    }
}

fn enum_to_name(value: Value) -> Value {
    match value {
        Value::Enum { name, .. } => Value::Text(name),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_processor_stores_member_name() {
        let ty = SqlType::Enum(EnumType::new("myenum", ["ITEM_1", "ITEM_2"]));
        let process = ty.bind_processor().unwrap();
        assert_eq!(
            process(Value::enum_member("ITEM_1", "item_1")),
            Value::Text("ITEM_1".into())
        );
        assert_eq!(process(Value::Null), Value::Null);
    }

    #[test]
    fn array_of_enum_processes_elements() {
        let ty = SqlType::array_of(SqlType::Enum(EnumType::new("e", ["A"])));
        let process = ty.bind_processor().unwrap();
        assert_eq!(
            process(Value::Array(vec![Value::enum_member("A", 1)])),
            Value::Array(vec![Value::Text("A".into())])
        );
        assert!(SqlType::array_of(SqlType::Text).bind_processor().is_none());
    }

    #[test]
    fn enum_ddl_depends_on_dialect() {
        let ty = SqlType::Enum(EnumType::new("myenum", ["ITEM_1", "LONGER_ITEM"]));
        assert_eq!(ty.ddl(&Dialect::postgres()).unwrap(), "myenum");
        assert_eq!(
            ty.ddl(&Dialect::postgres().native_enum(false)).unwrap(),
            "VARCHAR(11)"
        );
    }

    #[test]
    fn untyped_and_hstore_errors() {
        assert!(SqlType::Untyped.ddl(&Dialect::postgres()).is_err());
        assert!(SqlType::Hstore.ddl(&Dialect::postgres().native_hstore(false)).is_err());
        assert_eq!(
            SqlType::array_of(SqlType::Varchar(Some(60)))
                .ddl(&Dialect::postgres())
                .unwrap(),
            "VARCHAR(60)[]"
        );
    }
}
