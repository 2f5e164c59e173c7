//! Table and column metadata.
//!
//! Tables carry what the compiler needs to know about columns: their order,
//! type (for DDL and bind processing), client-side defaults and on-update
//! values.

mod column;
mod table;
mod types;

pub use column::{Column, ColumnDefault, DefaultContext, DefaultFn, Sequence};
pub use table::Table;
pub use types::{BindProcessor, EnumType, SqlType};

#[cfg(test)]
mod tests;
