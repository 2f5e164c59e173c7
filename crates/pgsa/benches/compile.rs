use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgsa::compile::{RenderedQuery, substitute};
use pgsa::stmt::TableExt;
use pgsa::{Column, Compiler, Expr, ParamMap, ParamValue, Query, SqlType, Table, Value};
use std::sync::Arc;

/// A table with an integer key and `n` text columns, the first one defaulted.
fn wide_table(n: usize) -> Arc<Table> {
    let mut columns = vec![Column::new("id", SqlType::BigInt).primary_key()];
    for i in 0..n {
        let col = Column::new(format!("col{i}"), SqlType::Text);
        columns.push(if i == 0 { col.default_value("x") } else { col });
    }
    Arc::new(Table::new("wide", columns))
}

/// Rendered SQL with `n` distinct placeholders, each used twice.
fn rendered_with(n: usize) -> RenderedQuery {
    let mut sql = String::from("SELECT 1 FROM t WHERE ");
    let mut rendered_binds = Vec::with_capacity(n);
    for i in 0..n {
        if i > 0 {
            sql.push_str(" AND ");
        }
        sql.push_str(&format!("(a{i} = :p{i} OR b{i} = :p{i})"));
        rendered_binds.push((format!("p{i}"), i as i64));
    }
    rendered_binds
        .into_iter()
        .fold(RenderedQuery::new(sql), |q, (name, v)| q.bind(name, v))
}

fn bench_substitute(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/substitute");

    for n in [1, 10, 100] {
        let rendered = rendered_with(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &rendered, |b, rendered| {
            b.iter(|| black_box(substitute(rendered)));
        });
    }

    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/multi_row_insert");
    let compiler = Compiler::default();

    for rows in [1, 10, 100] {
        let table = wide_table(8);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, &rows| {
            b.iter(|| {
                let values = (0..rows).map(|r| {
                    (1..8)
                        .map(|i| (format!("col{i}"), ParamValue::Value(Value::Int(r))))
                        .collect::<ParamMap>()
                });
                let mut query = Query::from(table.insert().rows(values));
                black_box(compiler.compile(&mut query))
            });
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/select_in_list");
    let compiler = Compiler::default();
    let table = wide_table(4);

    for n in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let select = table
                    .select()
                    .filter(Expr::in_list("id", 0..n as i64))
                    .order_by("id")
                    .limit(10);
                black_box(compiler.compile(&mut Query::from(select)))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_substitute, bench_insert, bench_select);
criterion_main!(benches);
