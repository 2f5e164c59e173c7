//! Expression layer for WHERE clauses.
//!
//! [`Expr`] renders to SQL with named placeholders. Every bound value gets a
//! name derived from its column (`id_1`, `id_2`, ...), so the same expression
//! tree always renders to the same text.

use crate::compile::render::RenderContext;
use crate::error::PgsaResult;
use crate::stmt::TextClause;
use crate::value::Value;

/// Expression node for building WHERE clauses.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// AND group: all conditions must be true.
    And(Vec<Expr>),

    /// OR group: at least one condition must be true.
    Or(Vec<Expr>),

    /// NOT: negate the inner expression.
    Not(Box<Expr>),

    /// Simple comparison: column op :column_n
    Compare {
        column: String,
        op: &'static str,
        value: Value,
    },

    /// NULL check: column IS NULL or column IS NOT NULL
    NullCheck { column: String, is_null: bool },

    /// IN list: column IN (:column_1, :column_2, ...) or NOT IN
    InList {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },

    /// BETWEEN: column BETWEEN :column_n AND :column_m
    Between {
        column: String,
        from: Value,
        to: Value,
        negated: bool,
    },

    /// Text fragment with its own `:name` placeholders.
    Text(TextClause),

    /// Raw SQL fragment without parameters.
    Raw(String),

    /// Always true (used for empty NOT IN lists).
    True,

    /// Always false (used for empty IN lists).
    False,
}

impl Expr {
    pub fn and(exprs: Vec<Expr>) -> Self {
        Expr::And(exprs)
    }

    pub fn or(exprs: Vec<Expr>) -> Self {
        Expr::Or(exprs)
    }

    pub fn not(expr: Expr) -> Self {
        Expr::Not(Box::new(expr))
    }

    /// column = value, or `IS NULL` when the value is null.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() {
            return Expr::is_null(column);
        }
        Self::compare(column, "=", value)
    }

    /// column != value, or `IS NOT NULL` when the value is null.
    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() {
            return Expr::is_not_null(column);
        }
        Self::compare(column, "!=", value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, ">", value)
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, ">=", value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, "<", value)
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, "<=", value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::compare(column, "LIKE", pattern)
    }

    pub fn ilike(column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::compare(column, "ILIKE", pattern)
    }

    pub fn not_like(column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::compare(column, "NOT LIKE", pattern)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Expr::NullCheck {
            column: column.into(),
            is_null: true,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Expr::NullCheck {
            column: column.into(),
            is_null: false,
        }
    }

    /// column IN (values...). Each value gets its own placeholder.
    pub fn in_list<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Expr::False;
        }
        Expr::InList {
            column: column.into(),
            values,
            negated: false,
        }
    }

    /// column NOT IN (values...)
    pub fn not_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Expr::True;
        }
        Expr::InList {
            column: column.into(),
            values,
            negated: true,
        }
    }

    pub fn between(
        column: impl Into<String>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        Expr::Between {
            column: column.into(),
            from: from.into(),
            to: to.into(),
            negated: false,
        }
    }

    pub fn not_between(
        column: impl Into<String>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        Expr::Between {
            column: column.into(),
            from: from.into(),
            to: to.into(),
            negated: true,
        }
    }

    /// A text fragment with `:name` placeholders bound on the clause.
    pub fn text(clause: TextClause) -> Self {
        Expr::Text(clause)
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    /// Check if this expression is empty (contains no conditions).
    pub fn is_empty(&self) -> bool {
        match self {
            Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().all(Expr::is_empty),
            Expr::Not(inner) => inner.is_empty(),
            _ => false,
        }
    }

    fn compare(column: impl Into<String>, op: &'static str, value: impl Into<Value>) -> Self {
        Expr::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Render with named placeholders, registering bound values on `ctx`.
    pub(crate) fn render(&self, ctx: &mut RenderContext<'_>) -> PgsaResult<String> {
        let sql = match self {
            Expr::And(exprs) => render_group(exprs, " AND ", ctx, |e| matches!(e, Expr::Or(_)))?,
            Expr::Or(exprs) => render_group(exprs, " OR ", ctx, |e| matches!(e, Expr::And(_)))?,
            Expr::Not(inner) => {
                let sql = inner.render(ctx)?;
                if sql.is_empty() {
                    String::new()
                } else {
                    format!("NOT ({sql})")
                }
            }
            Expr::Compare { column, op, value } => {
                let processor = ctx.column_processor(column);
                let placeholder = ctx.bind_anon(column, value.clone(), processor);
                format!("{} {} {}", ctx.column_ref(column), op, placeholder)
            }
            Expr::NullCheck { column, is_null } => {
                let suffix = if *is_null { "IS NULL" } else { "IS NOT NULL" };
                format!("{} {}", ctx.column_ref(column), suffix)
            }
            Expr::InList {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return Ok(if *negated { "1=1" } else { "1=0" }.to_string());
                }
                let processor = ctx.column_processor(column);
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| ctx.bind_anon(column, v.clone(), processor.clone()))
                    .collect();
                let op = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", ctx.column_ref(column), op, placeholders.join(", "))
            }
            Expr::Between {
                column,
                from,
                to,
                negated,
            } => {
                let processor = ctx.column_processor(column);
                let p1 = ctx.bind_anon(column, from.clone(), processor.clone());
                let p2 = ctx.bind_anon(column, to.clone(), processor);
                let op = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                format!("{} {} {} AND {}", ctx.column_ref(column), op, p1, p2)
            }
            Expr::Text(clause) => clause.render(ctx)?,
            Expr::Raw(sql) => sql.clone(),
            Expr::True => "1=1".to_string(),
            Expr::False => "1=0".to_string(),
        };
        Ok(sql)
    }
}

fn render_group(
    exprs: &[Expr],
    sep: &str,
    ctx: &mut RenderContext<'_>,
    needs_parens: impl Fn(&Expr) -> bool,
) -> PgsaResult<String> {
    let mut parts = Vec::with_capacity(exprs.len());
    for e in exprs.iter().filter(|e| !e.is_empty()) {
        let sql = e.render(ctx)?;
        if sql.is_empty() {
            continue;
        }
        if needs_parens(e) {
            parts.push(format!("({sql})"));
        } else {
            parts.push(sql);
        }
    }
    Ok(parts.join(sep))
}

/// Conditions ANDed together, as held by UPDATE/SELECT/DELETE statements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExprGroup {
    exprs: Vec<Expr>,
}

impl ExprGroup {
    pub fn new() -> Self {
        Self { exprs: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.iter().all(Expr::is_empty)
    }

    pub fn push(&mut self, expr: Expr) {
        self.exprs.push(expr);
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    /// Render the clause content without the `WHERE` keyword.
    pub(crate) fn render(&self, ctx: &mut RenderContext<'_>) -> PgsaResult<String> {
        render_group(&self.exprs, " AND ", ctx, |e| matches!(e, Expr::Or(_)))
    }

    /// Render ` WHERE ...`, or nothing for an empty group.
    pub(crate) fn render_where(&self, ctx: &mut RenderContext<'_>) -> PgsaResult<String> {
        let sql = self.render(ctx)?;
        if sql.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" WHERE {sql}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::schema::{Column, EnumType, SqlType, Table};
    use crate::stmt::text;

    fn render(expr: &Expr) -> (String, usize) {
        let d = Dialect::postgres();
        let mut ctx = RenderContext::new(&d, None);
        let sql = expr.render(&mut ctx).unwrap();
        let rendered = ctx.finish(sql);
        (rendered.sql().to_string(), rendered.params().len())
    }

    #[test]
    fn test_simple_eq() {
        assert_eq!(render(&Expr::eq("name", "alice")), ("name = :name_1".into(), 1));
    }

    #[test]
    fn test_eq_null_becomes_is_null() {
        assert_eq!(render(&Expr::eq("deleted_at", Value::Null)), ("deleted_at IS NULL".into(), 0));
        assert_eq!(render(&Expr::ne("deleted_at", None::<i32>)), ("deleted_at IS NOT NULL".into(), 0));
    }

    #[test]
    fn test_nested_and_or() {
        let expr = Expr::and(vec![
            Expr::eq("status", "active"),
            Expr::or(vec![Expr::eq("role", "admin"), Expr::eq("role", "superuser")]),
        ]);
        assert_eq!(
            render(&expr),
            ("status = :status_1 AND (role = :role_1 OR role = :role_2)".into(), 3)
        );
    }

    #[test]
    fn test_in_list_and_empty_lists() {
        assert_eq!(
            render(&Expr::in_list("id", [1, 2, 3])),
            ("id IN (:id_1, :id_2, :id_3)".into(), 3)
        );
        assert_eq!(render(&Expr::in_list("id", Vec::<i32>::new())), ("1=0".into(), 0));
        assert_eq!(render(&Expr::not_in("id", Vec::<i32>::new())), ("1=1".into(), 0));
    }

    #[test]
    fn test_between_and_not() {
        assert_eq!(
            render(&Expr::not(Expr::between("age", 18, 65))),
            ("NOT (age BETWEEN :age_1 AND :age_2)".into(), 2)
        );
    }

    #[test]
    fn test_text_fragment_keeps_names() {
        let expr = Expr::and(vec![
            Expr::text(text("created_at > now() - :window::interval").bind("window", "1 day")),
            Expr::raw("archived = false"),
        ]);
        assert_eq!(
            render(&expr),
            ("created_at > now() - :window::interval AND archived = false".into(), 1)
        );
    }

    #[test]
    fn test_qualified_and_processed_for_table() {
        let d = Dialect::postgres();
        let t = Table::new(
            "pets",
            vec![Column::new("kind", SqlType::Enum(EnumType::new("kind", ["CAT", "DOG"])))],
        );
        let mut ctx = RenderContext::new(&d, Some(&t));
        let sql = Expr::eq("kind", Value::enum_member("CAT", 1))
            .render(&mut ctx)
            .unwrap();
        let rendered = ctx.finish(sql);
        assert_eq!(rendered.sql(), "pets.kind = :kind_1");
        assert_eq!(rendered.processed("kind_1").unwrap(), Value::Text("CAT".into()));
    }

    #[test]
    fn test_expr_group_where() {
        let d = Dialect::postgres();
        let mut ctx = RenderContext::new(&d, None);
        assert_eq!(ExprGroup::new().render_where(&mut ctx).unwrap(), "");

        let mut group = ExprGroup::new();
        group.push(Expr::gt("age", 18));
        group.push(Expr::or(vec![Expr::is_null("a"), Expr::is_null("b")]));
        assert_eq!(
            group.render_where(&mut ctx).unwrap(),
            " WHERE age > :age_1 AND (a IS NULL OR b IS NULL)"
        );
    }
}
