//! Benchmarks for value formatting and literal parsing.
//!
//! Benchmark targets:
//! - Scalar statement literal: <1us
//! - Nested collection literal: <10us
//! - Full `INSERT` statement for a 10 column row: <20us
//! - Delimited writer: >100k rows/s

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use tablecopy::io::formats::DelimitedOptions;
use tablecopy::io::formats::csv::DelimitedWriter;
use tablecopy::io::formatter::quote_identifier;
use tablecopy::io::{RowWriter, ValueFormatter};
use tablecopy::io::literal::{parse_literal, parse_value_list};
use tablecopy::models::{ColumnSpec, ColumnType, RowRecord, RowValue};

fn nested_value(width: usize) -> (RowValue, ColumnType) {
    let ty = ColumnType::Map(
        Box::new(ColumnType::Text),
        Box::new(ColumnType::List(Box::new(ColumnType::Int))),
    );
    let entries = (0..width)
        .map(|i| {
            (
                RowValue::Text(format!("key-{i}")),
                RowValue::List((0..width as i64).map(RowValue::Int).collect()),
            )
        })
        .collect();
    (RowValue::Map(entries), ty)
}

fn sample_row() -> Vec<(String, RowValue, ColumnType)> {
    vec![
        ("id".to_string(), RowValue::Int(42), ColumnType::Int),
        ("name".to_string(), RowValue::Text("O'Brien".to_string()), ColumnType::Text),
        ("active".to_string(), RowValue::Bool(true), ColumnType::Boolean),
        ("score".to_string(), RowValue::Float(98.25), ColumnType::Double),
        ("data".to_string(), RowValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef]), ColumnType::Blob),
        (
            "tags".to_string(),
            RowValue::Set(vec![RowValue::text("a"), RowValue::text("b")]),
            ColumnType::Set(Box::new(ColumnType::Text)),
        ),
        (
            "session_id".to_string(),
            RowValue::text("6ba7b810-9dad-11d1-80b4-00c04fd430c8"),
            ColumnType::Uuid,
        ),
        ("note".to_string(), RowValue::Null, ColumnType::Text),
        ("count".to_string(), RowValue::Int(-7), ColumnType::BigInt),
        ("ratio".to_string(), RowValue::Decimal("0.125".to_string()), ColumnType::Decimal),
    ]
}

fn bench_statement_literals(c: &mut Criterion) {
    let mut group = c.benchmark_group("statement_literals");
    group.measurement_time(Duration::from_secs(5));
    let formatter = ValueFormatter::for_statement();

    let text = RowValue::text("it's a value with a quote");
    group.bench_function("text", |b| {
        b.iter(|| formatter.format(black_box(&text), "name", Some(&ColumnType::Text)));
    });

    for width in [2, 8, 32] {
        let (value, ty) = nested_value(width);
        group.bench_with_input(BenchmarkId::new("nested_map", width), &value, |b, value| {
            b.iter(|| formatter.format(black_box(value), "values", Some(&ty)));
        });
    }

    group.finish();
}

fn bench_insert_statement(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_statement");
    group.throughput(Throughput::Elements(1));
    let formatter = ValueFormatter::for_statement();
    let row = sample_row();

    group.bench_function("ten_columns", |b| {
        b.iter(|| {
            let names: Vec<String> = row.iter().map(|(name, _, _)| quote_identifier(name)).collect();
            let values: Vec<String> = row
                .iter()
                .map(|(name, value, ty)| formatter.format(black_box(value), name, Some(ty)))
                .collect();
            format!(
                "INSERT INTO ks.events ({}) VALUES ({})",
                names.join(", "),
                values.join(", ")
            )
        });
    });

    group.finish();
}

fn bench_literal_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("literal_parsing");
    let formatter = ValueFormatter::for_statement();

    for width in [2, 8, 32] {
        let (value, ty) = nested_value(width);
        let literal = formatter.format(&value, "values", Some(&ty));
        group.throughput(Throughput::Bytes(literal.len() as u64));
        group.bench_with_input(BenchmarkId::new("nested_map", width), &literal, |b, literal| {
            b.iter(|| parse_literal(black_box(literal), Some(&ty)).unwrap());
        });
    }

    let row = sample_row();
    let list = format!(
        "({})",
        row.iter()
            .map(|(name, value, ty)| formatter.format(value, name, Some(ty)))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let types: Vec<Option<&ColumnType>> = row.iter().map(|(_, _, ty)| Some(ty)).collect();
    group.bench_function("value_list", |b| {
        b.iter(|| parse_value_list(black_box(&list), &types).unwrap());
    });

    group.finish();
}

fn bench_file_fields(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_fields");
    let formatter = ValueFormatter::for_file("null");
    let row = sample_row();

    group.bench_function("ten_columns", |b| {
        b.iter(|| {
            row.iter()
                .map(|(name, value, ty)| formatter.format(black_box(value), name, Some(ty)))
                .collect::<Vec<_>>()
        });
    });

    group.finish();
}

fn bench_delimited_writer(c: &mut Criterion) {
    let mut group = c.benchmark_group("delimited_writer");
    group.measurement_time(Duration::from_secs(5));
    let sample = sample_row();
    let columns: Vec<ColumnSpec> = sample
        .iter()
        .map(|(name, _, ty)| ColumnSpec::new(name.clone(), ty.clone()))
        .collect();
    let row: RowRecord = sample
        .into_iter()
        .map(|(name, value, _)| (name, value))
        .collect();
    let options = DelimitedOptions {
        header: true,
        ..DelimitedOptions::default()
    };

    for rows in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(rows));
        group.bench_with_input(BenchmarkId::new("rows", rows), &rows, |b, &rows| {
            b.iter(|| {
                let mut writer = DelimitedWriter::new(Vec::new(), &columns, &options).unwrap();
                for _ in 0..rows {
                    writer.write_row(black_box(&row)).unwrap();
                }
                writer.flush().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_statement_literals,
    bench_insert_statement,
    bench_literal_parsing,
    bench_file_fields,
    bench_delimited_writer,
);
criterion_main!(benches);
