//! Conversion of output records into Arrow record batches.

use arrow::array::{
    ArrayRef, BooleanBuilder, Date32Builder, Decimal128Builder, Float32Builder, Float64Builder,
    Int16Builder, Int32Builder, Int64Builder, Int8Builder, ListBuilder, StringBuilder,
    TimestampMicrosecondBuilder,
};
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::Datelike;
use std::collections::HashMap;
use std::sync::Arc;

use crate::caster::TypedRecord;
use crate::classifier::{InvalidRecord, REASONS_COLUMN, REPROCESS_COLUMN, SEVERITIES_COLUMN};
use crate::error::{Result, TermError};
use crate::types::{SqlType, TableSchema};
use crate::value::Value;

/// Schema metadata key holding the qualified table name.
pub const TABLE_NAME_METADATA: &str = "term_sieve.table";

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn mismatch(column: &str, ty: &SqlType, value: &Value) -> TermError {
    TermError::Internal(format!(
        "Column '{column}' of type {ty} received a {} value",
        value.type_name()
    ))
}

macro_rules! build_primitive {
    ($builder:expr, $records:expr, $index:expr, $column:expr, $ty:expr, $pattern:pat => $value:expr) => {{
        let mut builder = $builder;
        for record in $records {
            match record.get($index) {
                None | Some(Value::Null) => builder.append_null(),
                Some($pattern) => builder.append_value($value),
                Some(other) => return Err(mismatch($column, $ty, other)),
            }
        }
        Arc::new(builder.finish()) as ArrayRef
    }};
}

fn typed_column(records: &[TypedRecord], index: usize, column: &str, ty: &SqlType) -> Result<ArrayRef> {
    let n = records.len();
    Ok(match ty {
        SqlType::Text => build_primitive!(
            StringBuilder::with_capacity(n, n * 8), records, index, column, ty,
            Value::String(s) => s
        ),
        SqlType::Boolean => build_primitive!(
            BooleanBuilder::with_capacity(n), records, index, column, ty,
            Value::Boolean(b) => *b
        ),
        SqlType::TinyInt => build_primitive!(
            Int8Builder::with_capacity(n), records, index, column, ty,
            Value::Int(i) => i8::try_from(*i).map_err(|_| mismatch(column, ty, &Value::Int(*i)))?
        ),
        SqlType::SmallInt => build_primitive!(
            Int16Builder::with_capacity(n), records, index, column, ty,
            Value::Int(i) => i16::try_from(*i).map_err(|_| mismatch(column, ty, &Value::Int(*i)))?
        ),
        SqlType::Int => build_primitive!(
            Int32Builder::with_capacity(n), records, index, column, ty,
            Value::Int(i) => i32::try_from(*i).map_err(|_| mismatch(column, ty, &Value::Int(*i)))?
        ),
        SqlType::BigInt => build_primitive!(
            Int64Builder::with_capacity(n), records, index, column, ty,
            Value::Int(i) => *i
        ),
        SqlType::Float => build_primitive!(
            Float32Builder::with_capacity(n), records, index, column, ty,
            Value::Float(f) => *f as f32
        ),
        SqlType::Double => build_primitive!(
            Float64Builder::with_capacity(n), records, index, column, ty,
            Value::Float(f) => *f
        ),
        SqlType::Decimal { precision, scale } => {
            let builder = Decimal128Builder::with_capacity(n)
                .with_precision_and_scale(*precision, *scale as i8)?;
            build_primitive!(
                builder, records, index, column, ty,
                Value::Decimal(d) => d
                    .rescale(*precision, *scale)
                    .ok_or_else(|| mismatch(column, ty, &Value::Decimal(*d)))?
                    .mantissa()
            )
        }
        SqlType::Date => build_primitive!(
            Date32Builder::with_capacity(n), records, index, column, ty,
            Value::Date(d) => d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
        ),
        SqlType::Timestamp => build_primitive!(
            TimestampMicrosecondBuilder::with_capacity(n), records, index, column, ty,
            Value::Timestamp(t) => t.and_utc().timestamp_micros()
        ),
    })
}

fn schema_for(fields: Vec<Field>, table_name: &str) -> SchemaRef {
    let metadata = HashMap::from([(TABLE_NAME_METADATA.to_string(), table_name.to_string())]);
    Arc::new(Schema::new_with_metadata(fields, metadata))
}

/// Builds the batch for valid records: catalog columns, catalog types.
pub fn valid_batch(
    schema: &TableSchema,
    records: &[TypedRecord],
    table_name: &str,
) -> Result<RecordBatch> {
    let types = schema.sql_types()?;
    let mut fields = Vec::with_capacity(types.len());
    let mut arrays = Vec::with_capacity(types.len());
    for (index, (column, ty)) in schema.columns().iter().zip(&types).enumerate() {
        fields.push(Field::new(&column.name, ty.arrow_type(), true));
        arrays.push(typed_column(records, index, &column.name, ty)?);
    }
    Ok(RecordBatch::try_new(schema_for(fields, table_name), arrays)?)
}

fn string_list(records: &[InvalidRecord], values: impl Fn(&InvalidRecord) -> Vec<&str>) -> ArrayRef {
    let mut builder = ListBuilder::new(StringBuilder::new());
    for record in records {
        for value in values(record) {
            builder.values().append_value(value);
        }
        builder.append(true);
    }
    Arc::new(builder.finish())
}

/// Builds the batch for invalid records: the input columns as text followed by
/// `reasons`, `severities` and `Reprocess_IND`.
pub fn invalid_batch(
    columns: &[String],
    records: &[InvalidRecord],
    table_name: &str,
) -> Result<RecordBatch> {
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len() + 3);
    for column in columns {
        let mut builder = StringBuilder::with_capacity(records.len(), records.len() * 8);
        for record in records {
            builder.append_option(record.record.get(column).flatten());
        }
        arrays.push(Arc::new(builder.finish()));
    }

    arrays.push(string_list(records, |r| r.reasons.iter().map(String::as_str).collect()));
    arrays.push(string_list(records, |r| r.severities.iter().map(|s| s.as_str()).collect()));

    let mut reprocess = StringBuilder::with_capacity(records.len(), records.len());
    for record in records {
        reprocess.append_value(record.reprocess.as_str());
    }
    arrays.push(Arc::new(reprocess.finish()));

    let names = columns
        .iter()
        .map(String::as_str)
        .chain([REASONS_COLUMN, SEVERITIES_COLUMN, REPROCESS_COLUMN]);
    let fields = names
        .zip(&arrays)
        .map(|(name, array)| Field::new(name, array.data_type().clone(), name != REPROCESS_COLUMN))
        .collect();
    Ok(RecordBatch::try_new(schema_for(fields, table_name), arrays)?)
}
