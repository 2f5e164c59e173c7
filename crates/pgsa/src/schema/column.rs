use super::types::{BindProcessor, SqlType};
use crate::value::{ParamValue, Value};
use std::fmt;
use std::sync::Arc;

/// Context passed to callable defaults.
///
/// Always empty: callables are evaluated client-side with no statement
/// context. The type exists so callables have a stable signature.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultContext {
    _private: (),
}

/// A callable producing a default value.
pub type DefaultFn = Arc<dyn Fn(&DefaultContext) -> Value + Send + Sync>;

/// A named server-side sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub name: String,
    pub start: Option<i64>,
    pub increment: Option<i64>,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: None,
            increment: None,
        }
    }

    pub fn start(mut self, start: i64) -> Self {
        self.start = Some(start);
        self
    }

    pub fn increment(mut self, increment: i64) -> Self {
        self.increment = Some(increment);
        self
    }
}

/// Client-side default or on-update descriptor of a column.
#[derive(Clone)]
pub enum ColumnDefault {
    /// A constant value.
    Scalar(Value),
    /// Called once per missing entry.
    Callable(DefaultFn),
    /// `nextval('<sequence>')`, evaluated by the server.
    Sequence(Sequence),
}

impl ColumnDefault {
    pub fn scalar(value: impl Into<Value>) -> Self {
        ColumnDefault::Scalar(value.into())
    }

    pub fn callable<F, V>(f: F) -> Self
    where
        F: Fn(&DefaultContext) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        ColumnDefault::Callable(Arc::new(move |ctx| f(ctx).into()))
    }

    pub fn sequence(seq: Sequence) -> Self {
        ColumnDefault::Sequence(seq)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ColumnDefault::Scalar(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, ColumnDefault::Callable(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, ColumnDefault::Sequence(_))
    }

    /// Produce the parameter entry for a row that did not supply this column.
    pub fn resolve(&self) -> ParamValue {
        match self {
            ColumnDefault::Scalar(v) => ParamValue::Value(v.clone()),
            ColumnDefault::Callable(f) => ParamValue::Value(f(&DefaultContext::default())),
            ColumnDefault::Sequence(seq) => ParamValue::NextVal(seq.name.clone()),
        }
    }
}

impl fmt::Debug for ColumnDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnDefault::Scalar(v) => f.debug_tuple("Scalar").field(v).finish(),
            ColumnDefault::Callable(_) => f.write_str("Callable(..)"),
            ColumnDefault::Sequence(seq) => f.debug_tuple("Sequence").field(seq).finish(),
        }
    }
}

impl From<Sequence> for ColumnDefault {
    fn from(seq: Sequence) -> Self {
        ColumnDefault::Sequence(seq)
    }
}

/// Column metadata.
#[derive(Clone)]
pub struct Column {
    name: String,
    sql_type: SqlType,
    primary_key: bool,
    nullable: bool,
    unique: bool,
    autoincrement: Option<bool>,
    default: Option<ColumnDefault>,
    on_update: Option<ColumnDefault>,
    server_default: Option<String>,
    bind_processor: Option<BindProcessor>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            primary_key: false,
            nullable: true,
            unique: false,
            autoincrement: None,
            default: None,
            on_update: None,
            server_default: None,
            bind_processor: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Force (or forbid) autoincrement. By default a lone integer primary key
    /// without a client-side default autoincrements.
    pub fn autoincrement(mut self, enabled: bool) -> Self {
        self.autoincrement = Some(enabled);
        self
    }

    /// Default applied on insert when the column is not supplied.
    pub fn default(mut self, default: impl Into<ColumnDefault>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn default_value(self, value: impl Into<Value>) -> Self {
        self.default(ColumnDefault::scalar(value))
    }

    pub fn default_fn<F, V>(self, f: F) -> Self
    where
        F: Fn(&DefaultContext) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.default(ColumnDefault::callable(f))
    }

    /// Back the column with a sequence: inserts without a value use `nextval`.
    pub fn sequence(self, seq: Sequence) -> Self {
        self.default(ColumnDefault::Sequence(seq))
    }

    /// Default applied on update when the column is not in the SET list.
    pub fn on_update(mut self, on_update: impl Into<ColumnDefault>) -> Self {
        self.on_update = Some(on_update.into());
        self
    }

    pub fn on_update_value(self, value: impl Into<Value>) -> Self {
        self.on_update(ColumnDefault::scalar(value))
    }

    pub fn on_update_fn<F, V>(self, f: F) -> Self
    where
        F: Fn(&DefaultContext) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.on_update(ColumnDefault::callable(f))
    }

    /// Server-side default expression, used only in DDL.
    pub fn server_default(mut self, sql: impl Into<String>) -> Self {
        self.server_default = Some(sql.into());
        self
    }

    /// Override the type's bind processor.
    pub fn bind_processor<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.bind_processor = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> &SqlType {
        &self.sql_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn default_descriptor(&self) -> Option<&ColumnDefault> {
        self.default.as_ref()
    }

    pub fn on_update_descriptor(&self) -> Option<&ColumnDefault> {
        self.on_update.as_ref()
    }

    pub fn server_default_sql(&self) -> Option<&str> {
        self.server_default.as_deref()
    }

    /// The sequence backing this column, if any.
    pub fn sequence_ref(&self) -> Option<&Sequence> {
        match &self.default {
            Some(ColumnDefault::Sequence(seq)) => Some(seq),
            _ => None,
        }
    }

    /// Effective bind processor: explicit override first, then the type's.
    pub fn effective_bind_processor(&self) -> Option<BindProcessor> {
        self.bind_processor
            .clone()
            .or_else(|| self.sql_type.bind_processor())
    }

    pub(crate) fn autoincrement_flag(&self) -> Option<bool> {
        self.autoincrement
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("sql_type", &self.sql_type)
            .field("primary_key", &self.primary_key)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .field("on_update", &self.on_update)
            .finish_non_exhaustive()
    }
}
