use super::*;
use crate::dialect::Dialect;
use crate::value::{ParamValue, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn lone_integer_pk_autoincrements() {
    let t = Table::new(
        "meows",
        vec![
            Column::new("id", SqlType::Integer).primary_key(),
            Column::new("id_1", SqlType::Integer),
        ],
    );
    assert_eq!(t.autoincrement_column().map(Column::name), Some("id"));
}

#[test]
fn pk_with_default_does_not_autoincrement() {
    let t = Table::new(
        "users",
        vec![Column::new("id", SqlType::Integer)
            .primary_key()
            .default_value(5)],
    );
    assert!(t.autoincrement_column().is_none());

    let uuid_pk = Table::new("u", vec![Column::new("id", SqlType::Uuid).primary_key()]);
    assert!(uuid_pk.autoincrement_column().is_none());
}

#[test]
fn explicit_autoincrement_flag() {
    let t = Table::new(
        "t",
        vec![
            Column::new("a", SqlType::Integer).primary_key(),
            Column::new("b", SqlType::Integer).primary_key(),
        ],
    );
    assert!(t.autoincrement_column().is_none());

    let forced = Table::new(
        "t",
        vec![
            Column::new("a", SqlType::Integer).primary_key(),
            Column::new("b", SqlType::BigInt).autoincrement(true),
        ],
    );
    assert_eq!(forced.autoincrement_column().map(Column::name), Some("b"));

    let disabled = Table::new(
        "t",
        vec![Column::new("a", SqlType::Integer)
            .primary_key()
            .autoincrement(false)],
    );
    assert!(disabled.autoincrement_column().is_none());
}

#[test]
fn callable_default_runs_on_each_resolve() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let default = ColumnDefault::callable(move |_| counter.fetch_add(1, Ordering::SeqCst) as i64);

    assert_eq!(default.resolve(), ParamValue::Value(Value::Int(0)));
    assert_eq!(default.resolve(), ParamValue::Value(Value::Int(1)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn sequence_column_resolves_to_nextval() {
    let col = Column::new("serial", SqlType::Integer).sequence(Sequence::new("serial_seq"));
    assert_eq!(col.sequence_ref().map(|s| s.name.as_str()), Some("serial_seq"));
    assert_eq!(
        col.default_descriptor().map(ColumnDefault::resolve),
        Some(ParamValue::NextVal("serial_seq".into()))
    );
}

#[test]
fn explicit_bind_processor_overrides_type() {
    let col = Column::new("e", SqlType::Enum(EnumType::new("e", ["A"])))
        .bind_processor(|_| Value::Text("custom".into()));
    let process = col.effective_bind_processor().unwrap();
    assert_eq!(process(Value::enum_member("A", 1)), Value::Text("custom".into()));

    assert!(Column::new("t", SqlType::Text).effective_bind_processor().is_none());
}

#[test]
fn qualified_names_quote_when_needed() {
    let d = Dialect::postgres();
    let t = Table::new("User", vec![]).with_schema("app");
    assert_eq!(t.qualified_name(&d), "app.\"User\"");
    assert_eq!(t.qualified_column("order", &d), "app.\"User\".\"order\"");
}
