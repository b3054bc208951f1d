use crate::config::{AppPaths, JobDescriptor};
use crate::core::{flatten::flatten, sanitize::sanitize, transform::transform};
use crate::domain::model::{Record, TypedTable};
use crate::domain::ports::{Pipeline, RecordSource, TableSink};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// 一張表的匯出流程：抓取 → 攤平 → 清理 → 欄位轉換 → 寫檔
pub struct TablePipeline<'a, S: RecordSource, K: TableSink> {
    job: &'a JobDescriptor,
    source: &'a S,
    sink: &'a K,
    paths: &'a AppPaths,
}

impl<'a, S: RecordSource, K: TableSink> TablePipeline<'a, S, K> {
    pub fn new(job: &'a JobDescriptor, source: &'a S, sink: &'a K, paths: &'a AppPaths) -> Self {
        Self {
            job,
            source,
            sink,
            paths,
        }
    }

    pub fn destination(&self) -> PathBuf {
        self.paths.resolve(&self.job.output_file)
    }
}

#[async_trait]
impl<S: RecordSource, K: TableSink> Pipeline for TablePipeline<'_, S, K> {
    async fn extract(&self) -> Result<Vec<Record>> {
        self.source
            .fetch(&self.job.base_id, &self.job.table_name)
            .await
    }

    fn transform(&self, records: Vec<Record>) -> Result<TypedTable> {
        let raw = sanitize(&flatten(&records));
        tracing::debug!(
            "{}: {} raw columns, {} rules",
            self.job.table_name,
            raw.column_count(),
            self.job.columns.len()
        );
        transform(&raw, &self.job.columns, self.job.column_order.as_deref())
    }

    fn load(&self, table: TypedTable) -> Result<PathBuf> {
        let destination = self.destination();
        self.sink.write(&table, &destination, &self.job.table_name)?;
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Scalar;
    use crate::domain::rules::{CastType, ColumnRule};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;

    struct StaticSource(Vec<Record>);

    #[async_trait]
    impl RecordSource for StaticSource {
        async fn fetch(&self, _base_id: &str, _table_name: &str) -> Result<Vec<Record>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct MemorySink {
        written: Mutex<Vec<(PathBuf, String, TypedTable)>>,
    }

    impl TableSink for MemorySink {
        fn write(&self, table: &TypedTable, destination: &Path, table_name: &str) -> Result<()> {
            self.written.lock().unwrap().push((
                destination.to_path_buf(),
                table_name.to_string(),
                table.clone(),
            ));
            Ok(())
        }

        fn read(&self, _path: &Path, _table_name: &str) -> Option<TypedTable> {
            None
        }
    }

    fn job() -> JobDescriptor {
        JobDescriptor {
            base_id: "app123".to_string(),
            table_name: "Buildings".to_string(),
            output_file: "output/buildings.parquet".to_string(),
            columns: vec![
                ColumnRule::literal("Name").rename("name"),
                ColumnRule::literal("Tags"),
                ColumnRule::literal("Floors").cast(CastType::Int),
            ],
            column_order: Some(vec!["Floors".to_string()]),
        }
    }

    #[tokio::test]
    async fn test_pipeline_runs_all_stages() {
        let source = StaticSource(vec![
            Record::from(json!({"Name": "HQ", "Tags": ["a", "b"], "Floors": 3})),
            Record::from(json!({"Name": "Annex"})),
        ]);
        let sink = MemorySink::default();
        let paths = AppPaths::from_root("/srv/export");
        let job = job();
        let pipeline = TablePipeline::new(&job, &source, &sink, &paths);

        let records = pipeline.extract().await.unwrap();
        let table = pipeline.transform(records).unwrap();
        let destination = pipeline.load(table).unwrap();

        assert_eq!(destination, PathBuf::from("/srv/export/output/buildings.parquet"));
        let written = sink.written.lock().unwrap();
        let (_, table_name, table) = &written[0];
        assert_eq!(table_name, "Buildings");
        assert_eq!(table.column_names(), vec!["Floors", "name", "Tags"]);
        assert_eq!(
            table.column("Tags").unwrap(),
            &[Scalar::text("a, b"), Scalar::Null]
        );
        assert_eq!(table.column("Floors").unwrap(), &[Scalar::Int(3), Scalar::Null]);
    }
}
