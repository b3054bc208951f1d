//! 設定檔與輸出檔的管理 API（瀏覽器 UI 的後端）

pub mod routes;
pub mod server;

use crate::adapters::airtable::AirtableClient;
use crate::config::AppPaths;
use std::path::PathBuf;
use std::sync::Arc;

/// 每個 worker 共用的狀態
#[derive(Clone)]
pub struct WebState {
    pub paths: AppPaths,
    /// 有設定 API key 時才能查詢 Airtable 中繼資料
    pub airtable: Option<Arc<AirtableClient>>,
    /// 串流匯出時執行的程式（通常是目前的執行檔）
    pub export_program: PathBuf,
}

impl WebState {
    pub fn new(paths: AppPaths, export_program: PathBuf) -> Self {
        Self {
            paths,
            airtable: None,
            export_program,
        }
    }

    pub fn with_airtable(mut self, client: AirtableClient) -> Self {
        self.airtable = Some(Arc::new(client));
        self
    }
}

pub use server::run_server;
