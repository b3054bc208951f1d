use crate::domain::model::{Scalar, TypedTable};
use crate::domain::ports::TableSink;
use crate::utils::error::{EtlError, Result};
use arrow::array::{
    ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{
    DataType, Field, Float64Type, Int64Type, Schema, TimeUnit, TimestampMicrosecondType,
};
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

/// 輸出檔中固定的 schema 名稱
pub const EXTRACT_SCHEMA: &str = "Extract";
pub const SCHEMA_METADATA_KEY: &str = "extract.schema";
pub const TABLE_METADATA_KEY: &str = "extract.table";

/// 由欄位的實際值推斷出的實體欄位型別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkColumnType {
    Int,
    Float,
    Bool,
    Timestamp,
    Text,
}

impl SinkColumnType {
    fn data_type(self) -> DataType {
        match self {
            SinkColumnType::Int => DataType::Int64,
            SinkColumnType::Float => DataType::Float64,
            SinkColumnType::Bool => DataType::Boolean,
            SinkColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            SinkColumnType::Text => DataType::Utf8,
        }
    }
}

/// 全部非空值皆為同一型別才使用該型別；整數與浮點混合視為浮點；其餘一律存成文字
pub fn infer_column_type(values: &[Scalar]) -> SinkColumnType {
    let mut inferred: Option<SinkColumnType> = None;

    for value in values.iter().filter(|v| !v.is_null()) {
        let current = match value {
            Scalar::Int(_) => SinkColumnType::Int,
            Scalar::Float(_) => SinkColumnType::Float,
            Scalar::Bool(_) => SinkColumnType::Bool,
            Scalar::Timestamp(_) => SinkColumnType::Timestamp,
            _ => return SinkColumnType::Text,
        };

        inferred = Some(match (inferred, current) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(SinkColumnType::Int), SinkColumnType::Float)
            | (Some(SinkColumnType::Float), SinkColumnType::Int) => SinkColumnType::Float,
            _ => return SinkColumnType::Text,
        });
    }

    inferred.unwrap_or(SinkColumnType::Text)
}

fn build_array(values: &[Scalar], column_type: SinkColumnType) -> ArrayRef {
    match column_type {
        SinkColumnType::Int => Arc::new(Int64Array::from(
            values
                .iter()
                .map(|v| match v {
                    Scalar::Int(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        SinkColumnType::Float => Arc::new(Float64Array::from(
            values
                .iter()
                .map(|v| match v {
                    Scalar::Float(f) if !f.is_nan() => Some(*f),
                    Scalar::Int(i) => Some(*i as f64),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        SinkColumnType::Bool => Arc::new(BooleanArray::from(
            values
                .iter()
                .map(|v| match v {
                    Scalar::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        SinkColumnType::Timestamp => Arc::new(TimestampMicrosecondArray::from(
            values
                .iter()
                .map(|v| match v {
                    Scalar::Timestamp(ts) => Some(ts.and_utc().timestamp_micros()),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        SinkColumnType::Text => Arc::new(StringArray::from(
            values
                .iter()
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect::<Vec<_>>(),
        )),
    }
}

fn to_record_batch(table: &TypedTable, table_name: &str) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.column_count());
    let mut arrays = Vec::with_capacity(table.column_count());

    for column in table.columns() {
        let column_type = infer_column_type(&column.values);
        tracing::debug!("Column '{}' stored as {:?}", column.name, column_type);
        fields.push(Field::new(&column.name, column_type.data_type(), true));
        arrays.push(build_array(&column.values, column_type));
    }

    let metadata = HashMap::from([
        (SCHEMA_METADATA_KEY.to_string(), EXTRACT_SCHEMA.to_string()),
        (TABLE_METADATA_KEY.to_string(), table_name.to_string()),
    ]);
    let schema = Arc::new(Schema::new_with_metadata(fields, metadata));

    Ok(RecordBatch::try_new(schema, arrays)?)
}

fn column_values(array: &ArrayRef, field: &Field) -> Result<Vec<Scalar>> {
    let unsupported = || {
        EtlError::sink_read(format!(
            "Unsupported column type {} for '{}'",
            field.data_type(),
            field.name()
        ))
    };

    let values = match field.data_type() {
        DataType::Int64 => array
            .as_primitive_opt::<Int64Type>()
            .ok_or_else(unsupported)?
            .iter()
            .map(|v| v.map(Scalar::Int).unwrap_or_default())
            .collect(),
        DataType::Float64 => array
            .as_primitive_opt::<Float64Type>()
            .ok_or_else(unsupported)?
            .iter()
            .map(|v| v.map(Scalar::Float).unwrap_or_default())
            .collect(),
        DataType::Boolean => array
            .as_boolean_opt()
            .ok_or_else(unsupported)?
            .iter()
            .map(|v| v.map(Scalar::Bool).unwrap_or_default())
            .collect(),
        DataType::Timestamp(TimeUnit::Microsecond, _) => array
            .as_primitive_opt::<TimestampMicrosecondType>()
            .ok_or_else(unsupported)?
            .iter()
            .map(|v| {
                v.and_then(DateTime::from_timestamp_micros)
                    .map(|dt| Scalar::Timestamp(dt.naive_utc()))
                    .unwrap_or_default()
            })
            .collect(),
        DataType::Utf8 => array
            .as_string_opt::<i32>()
            .ok_or_else(unsupported)?
            .iter()
            .map(|v| v.map(Scalar::text).unwrap_or_default())
            .collect(),
        _ => return Err(unsupported()),
    };

    Ok(values)
}

/// Parquet 輸出檔；表格名稱記錄在 schema metadata
#[derive(Debug, Clone, Default)]
pub struct ParquetSink;

impl ParquetSink {
    pub fn new() -> Self {
        Self
    }

    /// 與 `read` 相同，但保留失敗原因
    pub fn try_read(&self, path: &Path, table_name: &str) -> Result<TypedTable> {
        if !path.is_file() {
            return Err(EtlError::sink_read(format!(
                "File not found: {}",
                path.display()
            )));
        }

        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        let schema = builder.schema().clone();

        // 沒有 metadata 的檔案不檢查表格名稱
        if let Some(stored) = schema.metadata().get(TABLE_METADATA_KEY) {
            if stored != table_name {
                return Err(EtlError::sink_read(format!(
                    "Table '{}' not found in {} (file holds '{}')",
                    table_name,
                    path.display(),
                    stored
                )));
            }
        }

        let mut columns: Vec<Vec<Scalar>> = vec![Vec::new(); schema.fields().len()];
        let mut row_count = 0;

        for batch in builder.build()? {
            let batch = batch?;
            row_count += batch.num_rows();
            for (i, field) in schema.fields().iter().enumerate() {
                columns[i].extend(column_values(batch.column(i), field)?);
            }
        }

        let mut table = TypedTable::with_row_count(row_count);
        for (field, values) in schema.fields().iter().zip(columns) {
            table.set_column(field.name().as_str(), values);
        }
        Ok(table)
    }
}

impl TableSink for ParquetSink {
    fn write(&self, table: &TypedTable, destination: &Path, table_name: &str) -> Result<()> {
        if table.column_count() == 0 {
            return Err(EtlError::sink_write(format!(
                "Table '{}' has no columns to write",
                table_name
            )));
        }

        if destination.exists() {
            fs::remove_file(destination)?;
        }
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let batch = to_record_batch(table, table_name)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let file = File::create(destination)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        tracing::info!(
            "💾 Wrote {} rows x {} columns to {} ({}.{})",
            table.row_count(),
            table.column_count(),
            destination.display(),
            EXTRACT_SCHEMA,
            table_name
        );
        Ok(())
    }

    fn read(&self, path: &Path, table_name: &str) -> Option<TypedTable> {
        match self.try_read(path, table_name) {
            Ok(table) => Some(table),
            Err(e) => {
                tracing::warn!("⚠️ Could not read '{}' from {}: {}", table_name, path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample() -> TypedTable {
        let ts = NaiveDate::from_ymd_opt(2025, 6, 6)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut table = TypedTable::with_row_count(2);
        table.set_column("name", vec![Scalar::text("HQ"), Scalar::text("Annex")]);
        table.set_column("floors", vec![Scalar::Int(3), Scalar::Null]);
        table.set_column("area", vec![Scalar::Int(100), Scalar::Float(20.5)]);
        table.set_column("active", vec![Scalar::Bool(true), Scalar::Bool(false)]);
        table.set_column("opened", vec![Scalar::Timestamp(ts), Scalar::Null]);
        table.set_column("mixed", vec![Scalar::Int(1), Scalar::text("x")]);
        table
    }

    #[test]
    fn test_infer_column_type() {
        assert_eq!(infer_column_type(&[Scalar::Int(1), Scalar::Null]), SinkColumnType::Int);
        assert_eq!(
            infer_column_type(&[Scalar::Int(1), Scalar::Float(1.5)]),
            SinkColumnType::Float
        );
        assert_eq!(infer_column_type(&[Scalar::Bool(true)]), SinkColumnType::Bool);
        assert_eq!(infer_column_type(&[Scalar::Null, Scalar::Null]), SinkColumnType::Text);
        assert_eq!(
            infer_column_type(&[Scalar::Bool(true), Scalar::Int(1)]),
            SinkColumnType::Text
        );
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("buildings.parquet");
        let sink = ParquetSink::new();
        let table = sample();

        sink.write(&table, &path, "Buildings").unwrap();
        let read = sink.read(&path, "Buildings").unwrap();

        assert_eq!(read.row_count(), 2);
        assert_eq!(
            read.column_names(),
            vec!["name", "floors", "area", "active", "opened", "mixed"]
        );
        assert_eq!(read.column("floors").unwrap(), &[Scalar::Int(3), Scalar::Null]);
        assert_eq!(
            read.column("area").unwrap(),
            &[Scalar::Float(100.0), Scalar::Float(20.5)]
        );
        assert_eq!(read.column("opened").unwrap(), table.column("opened").unwrap());
        assert_eq!(
            read.column("mixed").unwrap(),
            &[Scalar::text("1"), Scalar::text("x")]
        );
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.parquet");
        let sink = ParquetSink::new();

        sink.write(&sample(), &path, "Buildings").unwrap();
        let mut small = TypedTable::with_row_count(1);
        small.set_column("only", vec![Scalar::Int(1)]);
        sink.write(&small, &path, "Buildings").unwrap();

        let read = sink.read(&path, "Buildings").unwrap();
        assert_eq!(read.column_names(), vec!["only"]);
    }

    #[test]
    fn test_read_missing_file_or_other_table_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.parquet");
        let sink = ParquetSink::new();

        assert!(sink.read(&path, "Buildings").is_none());

        sink.write(&sample(), &path, "Buildings").unwrap();
        assert!(sink.read(&path, "Rooms").is_none());
        assert!(matches!(
            sink.try_read(&path, "Rooms"),
            Err(EtlError::SinkReadError { .. })
        ));
    }

    #[test]
    fn test_table_without_columns_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.parquet");
        let result = ParquetSink::new().write(&TypedTable::with_row_count(3), &path, "Buildings");
        assert!(matches!(result, Err(EtlError::SinkWriteError { .. })));
        assert!(!path.exists());
    }
}
