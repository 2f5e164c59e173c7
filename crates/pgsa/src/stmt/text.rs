use crate::compile::render::RenderContext;
use crate::error::PgsaResult;
use crate::value::Value;
use std::collections::BTreeMap;

/// Hand-written SQL with `:name` placeholders and the values bound to them.
///
/// Use `\:` for a literal colon that would otherwise read as a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct TextClause {
    sql: String,
    params: BTreeMap<String, Value>,
}

/// Create a text clause.
pub fn text(sql: impl Into<String>) -> TextClause {
    TextClause {
        sql: sql.into(),
        params: BTreeMap::new(),
    }
}

impl TextClause {
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    pub(crate) fn render(&self, ctx: &mut RenderContext<'_>) -> PgsaResult<String> {
        for (name, value) in &self.params {
            ctx.bind_explicit(name, value.clone())?;
        }
        Ok(self.sql.clone())
    }
}
