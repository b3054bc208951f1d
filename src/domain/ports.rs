use crate::domain::model::{Record, TypedTable};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// 遠端表格資料來源
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, base_id: &str, table_name: &str) -> Result<Vec<Record>>;
}

/// 欄式輸出檔：寫入時整個檔案重建
pub trait TableSink: Send + Sync {
    fn write(&self, table: &TypedTable, destination: &Path, table_name: &str) -> Result<()>;

    /// 檔案或表格不存在時回傳 None
    fn read(&self, path: &Path, table_name: &str) -> Option<TypedTable>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Record>>;
    fn transform(&self, records: Vec<Record>) -> Result<TypedTable>;
    fn load(&self, table: TypedTable) -> Result<PathBuf>;
}
