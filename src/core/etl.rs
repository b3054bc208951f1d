use crate::config::{AppPaths, ExportConfig, JobDescriptor};
use crate::core::pipeline::TablePipeline;
use crate::domain::ports::{Pipeline, RecordSource, TableSink};
use crate::utils::error::EtlError;
use crate::utils::monitor::SystemMonitor;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Transform,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Transform => "transform",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum TableOutcome {
    Exported { path: PathBuf, rows: usize },
    /// 來源沒有任何 record，不產生輸出檔
    Empty,
    Failed { stage: Stage, error: EtlError },
}

#[derive(Debug)]
pub struct TableReport {
    pub table_name: String,
    pub outcome: TableOutcome,
}

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub reports: Vec<TableReport>,
}

impl ExportSummary {
    pub fn exported(&self) -> usize {
        self.count(|o| matches!(o, TableOutcome::Exported { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TableOutcome::Empty))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TableOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&TableOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

/// 依序執行每張表的匯出；單張表失敗只記錄，繼續下一張
pub struct ExportEngine<S: RecordSource, K: TableSink> {
    source: S,
    sink: K,
    paths: AppPaths,
    monitor: SystemMonitor,
}

impl<S: RecordSource, K: TableSink> ExportEngine<S, K> {
    pub fn new(source: S, sink: K, paths: AppPaths) -> Self {
        Self::new_with_monitoring(source, sink, paths, false)
    }

    pub fn new_with_monitoring(source: S, sink: K, paths: AppPaths, monitor_enabled: bool) -> Self {
        Self {
            source,
            sink,
            paths,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub async fn run(&self, config: &ExportConfig) -> ExportSummary {
        let mut summary = ExportSummary::default();

        for job in &config.tables {
            let outcome = self.run_job(job).await;
            self.monitor.log_stats(&job.table_name);
            summary.reports.push(TableReport {
                table_name: job.table_name.clone(),
                outcome,
            });
        }

        self.monitor.log_final_stats();
        tracing::info!(
            "🏁 {} exported, {} empty, {} failed",
            summary.exported(),
            summary.skipped(),
            summary.failed()
        );
        summary
    }

    pub async fn run_job(&self, job: &JobDescriptor) -> TableOutcome {
        let pipeline = TablePipeline::new(job, &self.source, &self.sink, &self.paths);
        let table_name = job.table_name.as_str();

        tracing::info!("📥 Fetching from {}...", table_name);
        let records = match pipeline.extract().await {
            Ok(records) => records,
            Err(error) => return failed(table_name, Stage::Fetch, error),
        };

        if records.is_empty() {
            tracing::warn!("⚠️ No records returned for table {}. Skipping.", table_name);
            return TableOutcome::Empty;
        }

        let table = match pipeline.transform(records) {
            Ok(table) => table,
            Err(error) => return failed(table_name, Stage::Transform, error),
        };

        let rows = table.row_count();
        tracing::info!(
            "💾 Writing {} rows to {}...",
            rows,
            pipeline.destination().display()
        );
        match pipeline.load(table) {
            Ok(path) => TableOutcome::Exported { path, rows },
            Err(error) => failed(table_name, Stage::Write, error),
        }
    }
}

fn failed(table_name: &str, stage: Stage, error: EtlError) -> TableOutcome {
    tracing::error!(
        "❌ {} failed during {}: {} (severity: {:?})",
        table_name,
        stage,
        error,
        error.severity()
    );
    tracing::error!("💡 Suggestion: {}", error.recovery_suggestion());
    TableOutcome::Failed { stage, error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Record, TypedTable};
    use crate::domain::rules::ColumnRule;
    use crate::utils::error::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;

    /// 表格名稱為 "Broken" 時抓取失敗，"Empty" 時回傳空集合
    struct ScriptedSource;

    #[async_trait]
    impl RecordSource for ScriptedSource {
        async fn fetch(&self, _base_id: &str, table_name: &str) -> Result<Vec<Record>> {
            match table_name {
                "Broken" => Err(EtlError::FetchError {
                    table: table_name.to_string(),
                    message: "HTTP 500".to_string(),
                }),
                "Empty" => Ok(Vec::new()),
                _ => Ok(vec![Record::from(json!({"Name": table_name}))]),
            }
        }
    }

    #[derive(Default)]
    struct CountingSink {
        tables: Mutex<Vec<String>>,
    }

    impl TableSink for CountingSink {
        fn write(&self, _table: &TypedTable, _destination: &Path, table_name: &str) -> Result<()> {
            self.tables.lock().unwrap().push(table_name.to_string());
            Ok(())
        }

        fn read(&self, _path: &Path, _table_name: &str) -> Option<TypedTable> {
            None
        }
    }

    fn job(table_name: &str, columns: Vec<ColumnRule>) -> JobDescriptor {
        JobDescriptor {
            base_id: "app123".to_string(),
            table_name: table_name.to_string(),
            output_file: format!("output/{}.parquet", table_name.to_lowercase()),
            columns,
            column_order: None,
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_later_tables() {
        let config = ExportConfig {
            tables: vec![
                job("Broken", vec![ColumnRule::literal("Name")]),
                job("Empty", vec![ColumnRule::literal("Name")]),
                job("BadRegex", vec![ColumnRule::prefix("(")]),
                job("Buildings", vec![ColumnRule::literal("Name")]),
            ],
        };
        let engine = ExportEngine::new(
            ScriptedSource,
            CountingSink::default(),
            AppPaths::from_root("/srv/export"),
        );

        let summary = engine.run(&config).await;

        assert_eq!(summary.reports.len(), 4);
        assert!(matches!(
            summary.reports[0].outcome,
            TableOutcome::Failed { stage: Stage::Fetch, .. }
        ));
        assert!(matches!(summary.reports[1].outcome, TableOutcome::Empty));
        assert!(matches!(
            summary.reports[2].outcome,
            TableOutcome::Failed { stage: Stage::Transform, .. }
        ));
        assert!(matches!(
            summary.reports[3].outcome,
            TableOutcome::Exported { rows: 1, .. }
        ));
        assert_eq!(summary.exported(), 1);
        assert_eq!(summary.failed(), 2);
        assert_eq!(*engine.sink.tables.lock().unwrap(), vec!["Buildings".to_string()]);
    }
}
