//! Mapping between column types, row values and Arrow arrays.
//!
//! Scalars use native Arrow types. Lists, sets and maps of scalars use Arrow
//! `List` and `Map`. Everything else (nested collections, tuples, UDTs, and
//! text-like types such as uuid or decimal) is stored as UTF-8 text in literal
//! form. The declared type is kept in the field metadata under
//! [`CQL_TYPE_KEY`] so a reader can restore the original value.

use crate::io::formatter::ValueFormatter;
use crate::io::literal::{conform, parse_literal};
use crate::models::{ColumnSpec, ColumnType, RowRecord, RowValue};
use arrow::array::{
    Array, ArrayBuilder, ArrayRef, AsArray, BinaryBuilder, BooleanBuilder, Float32Builder,
    Float64Builder, Int8Builder, Int16Builder, Int32Builder, Int64Builder, ListBuilder, MapBuilder,
    StringBuilder, TimestampMillisecondBuilder,
};
use arrow::datatypes::{
    DataType, Date32Type, Decimal128Type, Field, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, Schema, SchemaRef, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt8Type, UInt16Type,
    UInt32Type, UInt64Type,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;

/// Field metadata key holding the declared column type.
pub const CQL_TYPE_KEY: &str = "cql_type";

type Boxed = Box<dyn ArrayBuilder>;

/// Physical layout of a column.
#[derive(Debug, Clone, Copy)]
enum Layout<'a> {
    Int64,
    Int32,
    Int16,
    Int8,
    Float32,
    Float64,
    Boolean,
    Binary,
    Timestamp,
    List(&'a ColumnType),
    Map(&'a ColumnType, &'a ColumnType),
    Utf8,
}

fn layout(ty: &ColumnType) -> Layout<'_> {
    use ColumnType as T;
    match ty {
        T::BigInt | T::Counter => Layout::Int64,
        T::Int => Layout::Int32,
        T::SmallInt => Layout::Int16,
        T::TinyInt => Layout::Int8,
        T::Float => Layout::Float32,
        T::Double => Layout::Float64,
        T::Boolean => Layout::Boolean,
        T::Blob => Layout::Binary,
        T::Timestamp => Layout::Timestamp,
        T::List(e) | T::Set(e) | T::Vector(e, _) if is_scalar(e) => Layout::List(e),
        T::Map(k, v) if is_scalar(k) && is_scalar(v) => Layout::Map(k, v),
        _ => Layout::Utf8,
    }
}

const fn is_scalar(ty: &ColumnType) -> bool {
    !ty.is_composite()
}

fn new_builder(ty: &ColumnType, capacity: usize) -> Boxed {
    match layout(ty) {
        Layout::Int64 => Box::new(Int64Builder::with_capacity(capacity)),
        Layout::Int32 => Box::new(Int32Builder::with_capacity(capacity)),
        Layout::Int16 => Box::new(Int16Builder::with_capacity(capacity)),
        Layout::Int8 => Box::new(Int8Builder::with_capacity(capacity)),
        Layout::Float32 => Box::new(Float32Builder::with_capacity(capacity)),
        Layout::Float64 => Box::new(Float64Builder::with_capacity(capacity)),
        Layout::Boolean => Box::new(BooleanBuilder::with_capacity(capacity)),
        Layout::Binary => Box::new(BinaryBuilder::new()),
        Layout::Timestamp => {
            Box::new(TimestampMillisecondBuilder::with_capacity(capacity).with_timezone("UTC"))
        },
        Layout::List(elem) => Box::new(ListBuilder::new(new_builder(elem, 0))),
        Layout::Map(k, v) => Box::new(MapBuilder::new(None, new_builder(k, 0), new_builder(v, 0))),
        Layout::Utf8 => Box::new(StringBuilder::new()),
    }
}

/// Arrow data type used to store a column type.
fn data_type(ty: &ColumnType) -> DataType {
    new_builder(ty, 0).finish().data_type().clone()
}

/// Fills in a type for every untyped column from the first non-null value
/// among `sample`, falling back to text.
pub fn resolve_types(columns: &[ColumnSpec], sample: &[RowRecord]) -> Vec<ColumnSpec> {
    columns
        .iter()
        .map(|column| {
            let ty = column.column_type.clone().unwrap_or_else(|| {
                sample
                    .iter()
                    .filter_map(|row| row.get(&column.name))
                    .find(|v| !v.is_null())
                    .map_or(ColumnType::Text, infer_type)
            });
            ColumnSpec::new(column.name.clone(), ty)
        })
        .collect()
}

fn infer_type(value: &RowValue) -> ColumnType {
    fn first_type(items: &[RowValue]) -> ColumnType {
        items
            .iter()
            .find(|v| !v.is_null())
            .map_or(ColumnType::Text, infer_type)
    }
    match value {
        RowValue::Null | RowValue::Text(_) => ColumnType::Text,
        RowValue::Int(_) => ColumnType::BigInt,
        RowValue::Float(_) => ColumnType::Double,
        RowValue::Decimal(_) => ColumnType::Decimal,
        RowValue::Bool(_) => ColumnType::Boolean,
        RowValue::Bytes(_) => ColumnType::Blob,
        RowValue::Timestamp(_) => ColumnType::Timestamp,
        RowValue::List(items) => ColumnType::List(Box::new(first_type(items))),
        RowValue::Set(items) => ColumnType::Set(Box::new(first_type(items))),
        RowValue::Map(entries) => {
            let keys: Vec<RowValue> = entries.iter().map(|(k, _)| k.clone()).collect();
            let values: Vec<RowValue> = entries.iter().map(|(_, v)| v.clone()).collect();
            ColumnType::Map(Box::new(first_type(&keys)), Box::new(first_type(&values)))
        },
        RowValue::Tuple(items) => ColumnType::Tuple(items.iter().map(infer_type).collect()),
        RowValue::Udt(_) => ColumnType::Udt("record".to_string()),
    }
}

/// Builds the Arrow schema for fully typed columns.
pub fn schema_for(columns: &[ColumnSpec]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|column| {
            let ty = column.column_type.clone().unwrap_or(ColumnType::Text);
            Field::new(column.name.as_str(), data_type(&ty), true).with_metadata(HashMap::from([(
                CQL_TYPE_KEY.to_string(),
                ty.to_string(),
            )]))
        })
        .collect();
    Arc::new(Schema::new(fields))
}

/// Converts rows into a record batch for `schema`, whose fields follow
/// `columns`.
///
/// # Errors
///
/// Returns a message naming the column and value that could not be stored.
pub fn rows_to_batch(
    schema: SchemaRef,
    columns: &[ColumnSpec],
    rows: &[RowRecord],
) -> Result<RecordBatch, String> {
    let formatter = ValueFormatter::for_file("");
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
    for column in columns {
        let ty = column.column_type.clone().unwrap_or(ColumnType::Text);
        let mut builder = new_builder(&ty, rows.len());
        for row in rows {
            let value = row.get(&column.name).unwrap_or(&RowValue::Null);
            append(builder.as_mut(), &ty, value, &formatter)
                .map_err(|e| format!("column {}: {e}", column.name))?;
        }
        arrays.push(builder.finish());
    }
    RecordBatch::try_new(schema, arrays).map_err(|e| e.to_string())
}

fn downcast<T: 'static>(builder: &mut dyn ArrayBuilder) -> Result<&mut T, String> {
    builder
        .as_any_mut()
        .downcast_mut::<T>()
        .ok_or_else(|| "column builder does not match its type".to_string())
}

fn narrow<T: TryFrom<i64>>(i: i64) -> Result<T, String> {
    T::try_from(i).map_err(|_| format!("{i} is out of range"))
}

#[allow(clippy::cast_possible_truncation)]
fn append(
    builder: &mut dyn ArrayBuilder,
    ty: &ColumnType,
    value: &RowValue,
    formatter: &ValueFormatter,
) -> Result<(), String> {
    let layout = layout(ty);
    if value.is_null() {
        return append_null(builder, layout);
    }
    if let Layout::Utf8 = layout {
        let text = match value {
            RowValue::Text(s) => s.clone(),
            other => formatter.format(other, "", Some(ty)),
        };
        downcast::<StringBuilder>(builder)?.append_value(text);
        return Ok(());
    }

    let value = conform(value.clone(), ty).map_err(|e| e.to_string())?;
    match (layout, value) {
        (Layout::Int64, RowValue::Int(i)) => downcast::<Int64Builder>(builder)?.append_value(i),
        (Layout::Int32, RowValue::Int(i)) => {
            downcast::<Int32Builder>(builder)?.append_value(narrow(i)?);
        },
        (Layout::Int16, RowValue::Int(i)) => {
            downcast::<Int16Builder>(builder)?.append_value(narrow(i)?);
        },
        (Layout::Int8, RowValue::Int(i)) => downcast::<Int8Builder>(builder)?.append_value(narrow(i)?),
        (Layout::Float32, RowValue::Float(f)) => {
            downcast::<Float32Builder>(builder)?.append_value(f as f32);
        },
        (Layout::Float64, RowValue::Float(f)) => downcast::<Float64Builder>(builder)?.append_value(f),
        (Layout::Boolean, RowValue::Bool(b)) => downcast::<BooleanBuilder>(builder)?.append_value(b),
        (Layout::Binary, RowValue::Bytes(b)) => downcast::<BinaryBuilder>(builder)?.append_value(b),
        (Layout::Timestamp, RowValue::Timestamp(t)) => {
            downcast::<TimestampMillisecondBuilder>(builder)?.append_value(t.timestamp_millis());
        },
        (Layout::List(elem), RowValue::List(items) | RowValue::Set(items)) => {
            let list = downcast::<ListBuilder<Boxed>>(builder)?;
            for item in &items {
                append(list.values().as_mut(), elem, item, formatter)?;
            }
            list.append(true);
        },
        (Layout::Map(kt, vt), RowValue::Map(entries)) => {
            let map = downcast::<MapBuilder<Boxed, Boxed>>(builder)?;
            for (k, v) in &entries {
                if k.is_null() {
                    return Err("map keys cannot be null".to_string());
                }
                append(map.keys().as_mut(), kt, k, formatter)?;
                append(map.values().as_mut(), vt, v, formatter)?;
            }
            map.append(true).map_err(|e| e.to_string())?;
        },
        (_, other) => return Err(format!("cannot store {} as {ty}", other.kind())),
    }
    Ok(())
}

fn append_null(builder: &mut dyn ArrayBuilder, layout: Layout<'_>) -> Result<(), String> {
    match layout {
        Layout::Int64 => downcast::<Int64Builder>(builder)?.append_null(),
        Layout::Int32 => downcast::<Int32Builder>(builder)?.append_null(),
        Layout::Int16 => downcast::<Int16Builder>(builder)?.append_null(),
        Layout::Int8 => downcast::<Int8Builder>(builder)?.append_null(),
        Layout::Float32 => downcast::<Float32Builder>(builder)?.append_null(),
        Layout::Float64 => downcast::<Float64Builder>(builder)?.append_null(),
        Layout::Boolean => downcast::<BooleanBuilder>(builder)?.append_null(),
        Layout::Binary => downcast::<BinaryBuilder>(builder)?.append_null(),
        Layout::Timestamp => downcast::<TimestampMillisecondBuilder>(builder)?.append_null(),
        Layout::List(_) => downcast::<ListBuilder<Boxed>>(builder)?.append_null(),
        Layout::Map(..) => downcast::<MapBuilder<Boxed, Boxed>>(builder)?
            .append(false)
            .map_err(|e| e.to_string())?,
        Layout::Utf8 => downcast::<StringBuilder>(builder)?.append_null(),
    }
    Ok(())
}

/// Derives column specs from a file schema, preferring the declared type in
/// the field metadata.
pub fn columns_from_schema(schema: &Schema) -> Vec<ColumnSpec> {
    schema
        .fields()
        .iter()
        .map(|field| {
            let declared = field
                .metadata()
                .get(CQL_TYPE_KEY)
                .and_then(|t| ColumnType::parse(t));
            ColumnSpec {
                name: field.name().clone(),
                column_type: declared.or_else(|| type_for(field.data_type())),
            }
        })
        .collect()
}

fn type_for(dt: &DataType) -> Option<ColumnType> {
    Some(match dt {
        DataType::Int64 | DataType::UInt32 | DataType::UInt64 => ColumnType::BigInt,
        DataType::Int32 | DataType::UInt16 => ColumnType::Int,
        DataType::Int16 | DataType::UInt8 => ColumnType::SmallInt,
        DataType::Int8 => ColumnType::TinyInt,
        DataType::Float32 => ColumnType::Float,
        DataType::Float64 => ColumnType::Double,
        DataType::Boolean => ColumnType::Boolean,
        DataType::Binary | DataType::LargeBinary => ColumnType::Blob,
        DataType::Timestamp(..) => ColumnType::Timestamp,
        DataType::Date32 => ColumnType::Date,
        DataType::Decimal128(..) => ColumnType::Decimal,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => ColumnType::Text,
        DataType::List(item) => ColumnType::List(Box::new(type_for(item.data_type())?)),
        DataType::Map(entries, _) => match entries.data_type() {
            DataType::Struct(fields) if fields.len() == 2 => ColumnType::Map(
                Box::new(type_for(fields[0].data_type())?),
                Box::new(type_for(fields[1].data_type())?),
            ),
            _ => return None,
        },
        _ => return None,
    })
}

/// Converts a record batch into rows.
///
/// # Errors
///
/// Returns a message when a column uses an Arrow type that has no row value
/// equivalent.
pub fn batch_to_rows(batch: &RecordBatch, columns: &[ColumnSpec]) -> Result<Vec<RowRecord>, String> {
    let mut values = Vec::with_capacity(columns.len());
    for (column, array) in columns.iter().zip(batch.columns()) {
        let column_values = array_values(array.as_ref(), column.column_type.as_ref())
            .map_err(|e| format!("column {}: {e}", column.name))?;
        values.push(column_values.into_iter());
    }
    let mut rows = Vec::with_capacity(batch.num_rows());
    for _ in 0..batch.num_rows() {
        let mut row = RowRecord::with_capacity(columns.len());
        for (column, column_values) in columns.iter().zip(values.iter_mut()) {
            row.insert(column.name.clone(), column_values.next().unwrap_or(RowValue::Null));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn collect<F>(array: &dyn Array, mut value: F) -> Vec<RowValue>
where
    F: FnMut(usize) -> RowValue,
{
    (0..array.len())
        .map(|i| if array.is_null(i) { RowValue::Null } else { value(i) })
        .collect()
}

fn restore_text(s: &str, ty: Option<&ColumnType>) -> RowValue {
    let text = RowValue::Text(s.to_string());
    match ty {
        Some(ty) if ty.is_composite() => parse_literal(s, Some(ty)).unwrap_or(text),
        Some(ty) => conform(text.clone(), ty).unwrap_or(text),
        None => text,
    }
}

fn array_values(array: &dyn Array, ty: Option<&ColumnType>) -> Result<Vec<RowValue>, String> {
    let values = match array.data_type() {
        DataType::Null => vec![RowValue::Null; array.len()],
        DataType::Int64 => {
            let a = array.as_primitive::<Int64Type>();
            collect(array, |i| RowValue::Int(a.value(i)))
        },
        DataType::Int32 => {
            let a = array.as_primitive::<Int32Type>();
            collect(array, |i| RowValue::Int(i64::from(a.value(i))))
        },
        DataType::Int16 => {
            let a = array.as_primitive::<Int16Type>();
            collect(array, |i| RowValue::Int(i64::from(a.value(i))))
        },
        DataType::Int8 => {
            let a = array.as_primitive::<Int8Type>();
            collect(array, |i| RowValue::Int(i64::from(a.value(i))))
        },
        DataType::UInt8 => {
            let a = array.as_primitive::<UInt8Type>();
            collect(array, |i| RowValue::Int(i64::from(a.value(i))))
        },
        DataType::UInt16 => {
            let a = array.as_primitive::<UInt16Type>();
            collect(array, |i| RowValue::Int(i64::from(a.value(i))))
        },
        DataType::UInt32 => {
            let a = array.as_primitive::<UInt32Type>();
            collect(array, |i| RowValue::Int(i64::from(a.value(i))))
        },
        DataType::UInt64 => {
            let a = array.as_primitive::<UInt64Type>();
            collect(array, |i| {
                let v = a.value(i);
                i64::try_from(v).map_or_else(|_| RowValue::Decimal(v.to_string()), RowValue::Int)
            })
        },
        DataType::Float32 => {
            let a = array.as_primitive::<Float32Type>();
            collect(array, |i| RowValue::Float(f64::from(a.value(i))))
        },
        DataType::Float64 => {
            let a = array.as_primitive::<Float64Type>();
            collect(array, |i| RowValue::Float(a.value(i)))
        },
        DataType::Boolean => {
            let a = array.as_boolean();
            collect(array, |i| RowValue::Bool(a.value(i)))
        },
        DataType::Binary => {
            let a = array.as_binary::<i32>();
            collect(array, |i| RowValue::Bytes(a.value(i).to_vec()))
        },
        DataType::LargeBinary => {
            let a = array.as_binary::<i64>();
            collect(array, |i| RowValue::Bytes(a.value(i).to_vec()))
        },
        DataType::Utf8 => {
            let a = array.as_string::<i32>();
            collect(array, |i| restore_text(a.value(i), ty))
        },
        DataType::LargeUtf8 => {
            let a = array.as_string::<i64>();
            collect(array, |i| restore_text(a.value(i), ty))
        },
        DataType::Utf8View => {
            let a = array.as_string_view();
            collect(array, |i| restore_text(a.value(i), ty))
        },
        DataType::Timestamp(unit, _) => {
            let millis: Box<dyn Fn(usize) -> i64 + '_> = match unit {
                TimeUnit::Second => {
                    let a = array.as_primitive::<TimestampSecondType>();
                    Box::new(move |i| a.value(i).saturating_mul(1000))
                },
                TimeUnit::Millisecond => {
                    let a = array.as_primitive::<TimestampMillisecondType>();
                    Box::new(move |i| a.value(i))
                },
                TimeUnit::Microsecond => {
                    let a = array.as_primitive::<TimestampMicrosecondType>();
                    Box::new(move |i| a.value(i) / 1000)
                },
                TimeUnit::Nanosecond => {
                    let a = array.as_primitive::<TimestampNanosecondType>();
                    Box::new(move |i| a.value(i) / 1_000_000)
                },
            };
            collect(array, |i| {
                DateTime::from_timestamp_millis(millis(i)).map_or(RowValue::Null, RowValue::Timestamp)
            })
        },
        DataType::Date32 => {
            let a = array.as_primitive::<Date32Type>();
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1);
            collect(array, |i| {
                epoch
                    .and_then(|e| e.checked_add_signed(chrono::Duration::days(i64::from(a.value(i)))))
                    .map_or(RowValue::Null, |d| RowValue::Text(d.format("%Y-%m-%d").to_string()))
            })
        },
        DataType::Decimal128(..) => {
            let a = array.as_primitive::<Decimal128Type>();
            collect(array, |i| RowValue::Decimal(a.value_as_string(i)))
        },
        DataType::List(_) => {
            let a = array.as_list::<i32>();
            let elem = ty.and_then(ColumnType::element);
            let as_set = matches!(ty, Some(ColumnType::Set(_)));
            let mut out = Vec::with_capacity(a.len());
            for i in 0..a.len() {
                if a.is_null(i) {
                    out.push(RowValue::Null);
                    continue;
                }
                let items = array_values(a.value(i).as_ref(), elem)?;
                out.push(if as_set { RowValue::Set(items) } else { RowValue::List(items) });
            }
            out
        },
        DataType::Map(..) => {
            let a = array.as_map();
            let (kt, vt) = match ty {
                Some(ColumnType::Map(k, v)) => (Some(k.as_ref()), Some(v.as_ref())),
                _ => (None, None),
            };
            let mut out = Vec::with_capacity(a.len());
            for i in 0..a.len() {
                if a.is_null(i) {
                    out.push(RowValue::Null);
                    continue;
                }
                let entries = a.value(i);
                let keys = array_values(entries.column(0).as_ref(), kt)?;
                let values = array_values(entries.column(1).as_ref(), vt)?;
                out.push(RowValue::Map(keys.into_iter().zip(values).collect()));
            }
            out
        },
        other => return Err(format!("unsupported column type {other}")),
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn typed(name: &str, ty: &str) -> ColumnSpec {
        ColumnSpec::new(name, ColumnType::parse(ty).unwrap())
    }

    #[test]
    fn test_native_layouts() {
        let columns = vec![
            typed("id", "int"),
            typed("big", "bigint"),
            typed("score", "float"),
            typed("at", "timestamp"),
            typed("tags", "set<text>"),
            typed("attrs", "map<text, int>"),
            typed("pairs", "list<frozen<list<int>>>"),
            typed("uid", "uuid"),
        ];
        let schema = schema_for(&columns);
        assert_eq!(schema.field(0).data_type(), &DataType::Int32);
        assert_eq!(schema.field(1).data_type(), &DataType::Int64);
        assert_eq!(schema.field(2).data_type(), &DataType::Float32);
        assert!(matches!(
            schema.field(3).data_type(),
            DataType::Timestamp(TimeUnit::Millisecond, Some(_))
        ));
        assert!(matches!(schema.field(4).data_type(), DataType::List(_)));
        assert!(matches!(schema.field(5).data_type(), DataType::Map(..)));
        assert_eq!(schema.field(6).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(7).data_type(), &DataType::Utf8);
        assert_eq!(
            schema.field(4).metadata().get(CQL_TYPE_KEY).map(String::as_str),
            Some("set<text>")
        );
    }

    #[test]
    fn test_rows_survive_batch_conversion() {
        let columns = vec![
            typed("id", "int"),
            typed("at", "timestamp"),
            typed("tags", "set<text>"),
            typed("attrs", "map<text, int>"),
            typed("nested", "list<frozen<list<int>>>"),
            typed("uid", "uuid"),
            typed("data", "blob"),
        ];
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let row = RowRecord::new()
            .with("id", RowValue::Int(7))
            .with("at", RowValue::Timestamp(at))
            .with("tags", RowValue::Set(vec![RowValue::text("a"), RowValue::text("b")]))
            .with(
                "attrs",
                RowValue::Map(vec![(RowValue::text("k"), RowValue::Int(1))]),
            )
            .with(
                "nested",
                RowValue::List(vec![RowValue::List(vec![RowValue::Int(1), RowValue::Int(2)])]),
            )
            .with("uid", RowValue::text("123e4567-e89b-12d3-a456-426614174000"))
            .with("data", RowValue::Bytes(vec![1, 2, 3]));
        let empty = RowRecord::new().with("id", RowValue::Int(8));

        let schema = schema_for(&columns);
        let batch = rows_to_batch(schema.clone(), &columns, &[row.clone(), empty]).unwrap();
        let read_columns = columns_from_schema(&schema);
        let rows = batch_to_rows(&batch, &read_columns).unwrap();

        assert_eq!(rows[0], row);
        assert_eq!(rows[1].get("id"), Some(&RowValue::Int(8)));
        assert_eq!(rows[1].get("tags"), Some(&RowValue::Null));
    }

    #[test]
    fn test_out_of_range_value_is_rejected() {
        let columns = vec![typed("small", "tinyint")];
        let row = RowRecord::new().with("small", RowValue::Int(1000));
        let err = rows_to_batch(schema_for(&columns), &columns, &[row]).unwrap_err();
        assert!(err.contains("column small"));
    }

    #[test]
    fn test_resolve_types_from_sample() {
        let columns = vec![ColumnSpec::untyped("n"), ColumnSpec::untyped("empty")];
        let sample = vec![
            RowRecord::new().with("n", RowValue::Null),
            RowRecord::new().with("n", RowValue::Float(1.5)),
        ];
        let resolved = resolve_types(&columns, &sample);
        assert_eq!(resolved[0].column_type, Some(ColumnType::Double));
        assert_eq!(resolved[1].column_type, Some(ColumnType::Text));
    }
}
