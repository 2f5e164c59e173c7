//! Schema statements. These never carry bound parameters.

use crate::dialect::Dialect;
use crate::error::PgsaResult;
use crate::schema::{Column, EnumType, Sequence, SqlType, Table};
use std::sync::Arc;

/// A DDL statement.
#[derive(Debug, Clone)]
pub enum Ddl {
    CreateTable { table: Arc<Table>, if_not_exists: bool },
    DropTable { table: Arc<Table>, if_exists: bool },
    CreateSequence(Sequence),
    DropSequence(Sequence),
    CreateType(EnumType),
    DropType(EnumType),
}

impl Ddl {
    pub fn create_table(table: &Arc<Table>) -> Self {
        Ddl::CreateTable {
            table: Arc::clone(table),
            if_not_exists: false,
        }
    }

    pub fn drop_table(table: &Arc<Table>) -> Self {
        Ddl::DropTable {
            table: Arc::clone(table),
            if_exists: false,
        }
    }

    pub fn create_sequence(seq: Sequence) -> Self {
        Ddl::CreateSequence(seq)
    }

    pub fn drop_sequence(seq: Sequence) -> Self {
        Ddl::DropSequence(seq)
    }

    pub fn create_type(ty: EnumType) -> Self {
        Ddl::CreateType(ty)
    }

    pub fn drop_type(ty: EnumType) -> Self {
        Ddl::DropType(ty)
    }

    /// Add `IF NOT EXISTS` / `IF EXISTS` to table statements.
    pub fn checkfirst(mut self) -> Self {
        match &mut self {
            Ddl::CreateTable { if_not_exists, .. } => *if_not_exists = true,
            Ddl::DropTable { if_exists, .. } => *if_exists = true,
            _ => {}
        }
        self
    }

    pub fn render(&self, dialect: &Dialect) -> PgsaResult<String> {
        match self {
            Ddl::CreateTable {
                table,
                if_not_exists,
            } => render_create_table(table, *if_not_exists, dialect),
            Ddl::DropTable { table, if_exists } => Ok(format!(
                "DROP TABLE {}{}",
                if *if_exists { "IF EXISTS " } else { "" },
                table.qualified_name(dialect)
            )),
            Ddl::CreateSequence(seq) => {
                let mut sql = format!("CREATE SEQUENCE {}", dialect.quote_identifier(&seq.name));
                if let Some(increment) = seq.increment {
                    sql.push_str(&format!(" INCREMENT BY {increment}"));
                }
                if let Some(start) = seq.start {
                    sql.push_str(&format!(" START WITH {start}"));
                }
                Ok(sql)
            }
            Ddl::DropSequence(seq) => Ok(format!(
                "DROP SEQUENCE {}",
                dialect.quote_identifier(&seq.name)
            )),
            Ddl::CreateType(ty) => {
                let members: Vec<String> =
                    ty.members.iter().map(|m| dialect.quote_literal(m)).collect();
                Ok(format!(
                    "CREATE TYPE {} AS ENUM ({})",
                    dialect.quote_identifier(&ty.name),
                    members.join(", ")
                ))
            }
            Ddl::DropType(ty) => Ok(format!("DROP TYPE {}", dialect.quote_identifier(&ty.name))),
        }
    }
}

fn render_create_table(table: &Table, if_not_exists: bool, dialect: &Dialect) -> PgsaResult<String> {
    let serial = table.autoincrement_column().map(Column::name);
    let mut lines = Vec::with_capacity(table.columns().len() + 2);

    for col in table.columns() {
        let ty = match col.sql_type() {
            t if Some(col.name()) == serial && t.is_integer() => serial_type(t, dialect),
            t => t.ddl(dialect)?,
        };
        let mut line = format!("{} {}", dialect.quote_identifier(col.name()), ty);
        if let Some(default) = col.server_default_sql() {
            line.push_str(&format!(" DEFAULT {default}"));
        }
        if !col.is_nullable() {
            line.push_str(" NOT NULL");
        }
        lines.push(line);
    }

    let pk: Vec<String> = table
        .primary_key()
        .iter()
        .map(|c| dialect.quote_identifier(c.name()))
        .collect();
    if !pk.is_empty() {
        lines.push(format!("PRIMARY KEY ({})", pk.join(", ")));
    }
    for col in table.columns().iter().filter(|c| c.is_unique()) {
        lines.push(format!("UNIQUE ({})", dialect.quote_identifier(col.name())));
    }
    if !dialect.supports_native_enum {
        for col in table.columns() {
            if let SqlType::Enum(e) = col.sql_type() {
                let members: Vec<String> =
                    e.members.iter().map(|m| dialect.quote_literal(m)).collect();
                lines.push(format!(
                    "CHECK ({} IN ({}))",
                    dialect.quote_identifier(col.name()),
                    members.join(", ")
                ));
            }
        }
    }

    Ok(format!(
        "CREATE TABLE {}{} (\n\t{}\n)",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        table.qualified_name(dialect),
        lines.join(",\n\t")
    ))
}

fn serial_type(ty: &SqlType, dialect: &Dialect) -> String {
    match ty {
        SqlType::SmallInt if dialect.supports_smallserial => "SMALLSERIAL",
        SqlType::BigInt => "BIGSERIAL",
        _ => "SERIAL",
    }
    .to_string()
}
