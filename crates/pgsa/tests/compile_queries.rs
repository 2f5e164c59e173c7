use pgsa::stmt::TableExt;
use pgsa::{
    Column, Compiler, Dialect, EnumType, Expr, NullPolicy, ParamValue, PgsaError, Query, SqlType,
    Statement, Table, Value, compile_query, text,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

fn users() -> Arc<Table> {
    Arc::new(Table::new(
        "users",
        vec![
            Column::new("id", SqlType::Integer).primary_key(),
            Column::new("name", SqlType::Text).not_null(),
            Column::new("tier", SqlType::Varchar(Some(16))).default_value("free"),
            Column::new("token", SqlType::Uuid)
                .default_fn(|_| uuid::Uuid::new_v4())
                .on_update_fn(|_| uuid::Uuid::new_v4()),
        ],
    ))
}

fn insert_row(query: &Query) -> &pgsa::ParamMap {
    match query {
        Query::Statement(Statement::Insert(insert)) => insert.params().rows()[0],
        _ => panic!("expected an insert"),
    }
}

#[test]
fn update_with_in_list_numbers_placeholders_in_order() {
    let meows = Arc::new(Table::new(
        "meows",
        vec![Column::new("id", SqlType::Integer).primary_key()],
    ));
    let mut query = Query::from(
        meows
            .update()
            .value("id", Value::Null)
            .filter(Expr::in_list("id", 1..=9)),
    );
    let compiled = compile_query(&mut query, &Dialect::postgres()).unwrap();

    assert_eq!(
        compiled.sql(),
        "UPDATE meows SET id=$1 WHERE meows.id IN ($2, $3, $4, $5, $6, $7, $8, $9, $10)"
    );
    let mut expected = vec![Value::Null];
    expected.extend((1..=9).map(Value::from));
    assert_eq!(compiled.params(), expected.as_slice());
}

#[test]
fn scalar_default_is_injected_and_bound() {
    let mut query = Query::from(users().insert().value("name", "ada"));
    let compiled = compile_query(&mut query, &Dialect::postgres()).unwrap();

    let row = insert_row(&query);
    assert_eq!(
        row.get("tier"),
        Some(&ParamValue::Value(Value::Text("free".into())))
    );
    assert!(matches!(row.get("token"), Some(ParamValue::Value(Value::Uuid(_)))));
    assert_eq!(
        compiled.sql(),
        "INSERT INTO users (name, tier, token) VALUES ($1, $2, $3) RETURNING users.id"
    );
    assert!(compiled.params().contains(&Value::Text("free".into())));
}

#[test]
fn on_update_generates_a_fresh_value() {
    let stored = uuid::Uuid::new_v4();
    let mut query = Query::from(users().update().value("name", "bob").filter(Expr::eq("token", stored)));
    let compiled = compile_query(&mut query, &Dialect::postgres()).unwrap();

    assert_eq!(
        compiled.sql(),
        "UPDATE users SET name=$1, token=$2 WHERE users.token = $3"
    );
    let Value::Uuid(fresh) = compiled.params()[1] else {
        panic!("expected a generated uuid");
    };
    assert_ne!(fresh, stored);
    assert_eq!(compiled.params()[2], Value::Uuid(stored));
}

#[test]
fn compiling_twice_is_stable() {
    let calls = Arc::new(AtomicI64::new(0));
    let counter = Arc::clone(&calls);
    let table = Arc::new(Table::new(
        "events",
        vec![
            Column::new("id", SqlType::BigInt).primary_key(),
            Column::new("seq", SqlType::BigInt).default_fn(move |_| counter.fetch_add(1, Ordering::SeqCst)),
        ],
    ));
    let mut query = Query::from(table.insert());
    let compiler = Compiler::default();

    let first = compiler.compile(&mut query).unwrap();
    let second = compiler.compile(&mut query).unwrap();
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_text_parameter_names_the_key() {
    let mut query = Query::from(text("SELECT * FROM users WHERE id = :user_id").bind("other", 1));
    let err = compile_query(&mut query, &Dialect::postgres()).unwrap_err();
    assert!(matches!(err, PgsaError::MissingParameter { ref name } if name == "user_id"));
}

#[test]
fn casts_next_to_placeholders_survive() {
    let mut query = Query::from(
        text("SELECT id::text FROM users WHERE id = :id AND name = :name::text")
            .bind("id", 3)
            .bind("name", "ada"),
    );
    let compiled = compile_query(&mut query, &Dialect::postgres()).unwrap();
    assert_eq!(
        compiled.sql(),
        "SELECT id::text FROM users WHERE id = $1 AND name = $2::text"
    );
    assert_eq!(compiled.params(), &[Value::Int(3), Value::Text("ada".into())]);
}

#[test]
fn raw_sql_passes_through() {
    let sql = "SELECT 'a:b', :not_a_param FROM t WHERE x = $1";
    let mut query = Query::from(sql);
    let compiled = compile_query(&mut query, &Dialect::postgres()).unwrap();
    assert_eq!(compiled.sql(), sql);
    assert!(compiled.params().is_empty());
}

#[test]
fn explicit_null_policy_is_configurable() {
    let mut keep = Query::from(users().insert().value("name", "x").value("tier", Value::Null));
    let compiled = compile_query(&mut keep, &Dialect::postgres()).unwrap();
    assert_eq!(compiled.params()[1], Value::Null);

    let dialect = Dialect::postgres().null_policy(NullPolicy::NullAsMissing);
    let mut replace = Query::from(users().insert().value("name", "x").value("tier", Value::Null));
    let compiled = compile_query(&mut replace, &dialect).unwrap();
    assert_eq!(compiled.params()[1], Value::Text("free".into()));
}

#[test]
fn enum_members_bind_by_name() {
    let mood = EnumType::new("mood", ["happy", "sad"]);
    let table = Arc::new(Table::new(
        "diary",
        vec![
            Column::new("id", SqlType::Integer).primary_key(),
            Column::new("mood", SqlType::Enum(mood)),
        ],
    ));
    let mut query = Query::from(
        table
            .insert()
            .value("id", 1)
            .value("mood", Value::enum_member("happy", 1)),
    );
    let compiled = compile_query(&mut query, &Dialect::postgres()).unwrap();
    assert_eq!(compiled.sql(), "INSERT INTO diary (id, mood) VALUES ($1, $2)");
    assert_eq!(compiled.params()[1], Value::Text("happy".into()));
}

#[test]
fn inline_compilation_renders_literals() {
    let compiler = Compiler::default();
    let mut query = Query::from(
        users()
            .select()
            .filter(Expr::eq("name", "o'neil"))
            .limit(5),
    );
    let sql = compiler.compile_inline(&mut query).unwrap();
    assert_eq!(
        sql,
        "SELECT users.id, users.name, users.tier, users.token FROM users \
         WHERE users.name = 'o''neil' LIMIT 5"
    );
    assert!(!sql.contains('$'));
}

#[test]
fn ddl_compiles_without_parameters() {
    let mut query = Query::from(users().create_table());
    let compiled = compile_query(&mut query, &Dialect::postgres()).unwrap();
    assert!(compiled.params().is_empty());
    assert!(compiled.sql().starts_with("CREATE TABLE users (\n\tid SERIAL NOT NULL,"));
    assert!(compiled.sql().ends_with("\tPRIMARY KEY (id)\n)"));
}
