use crate::domain::model::Record;
use crate::domain::ports::RecordSource;
use crate::domain::rules::CastType;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_range, validate_url, Validate};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.airtable.com";
pub const API_KEY_ENV: &str = "AIRTABLE_API_KEY";

#[derive(Debug, Clone)]
pub struct AirtableSettings {
    pub api_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for AirtableSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl Validate for AirtableSettings {
    fn validate(&self) -> Result<()> {
        validate_url("api_url", &self.api_url)?;
        validate_range("max_retries", self.max_retries, 0, 10)?;
        if self.timeout.is_zero() {
            return Err(EtlError::InvalidConfigValueError {
                field: "timeout".to_string(),
                value: "0".to_string(),
                reason: "Timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Airtable 欄位的中繼資料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<RawRecord>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct BaseSchema {
    #[serde(default)]
    tables: Vec<TableSchema>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    name: String,
    #[serde(default)]
    fields: Vec<FieldMeta>,
}

pub struct AirtableClient {
    client: Client,
    api_key: String,
    settings: AirtableSettings,
}

impl AirtableClient {
    pub fn new(api_key: impl Into<String>, settings: AirtableSettings) -> Result<Self> {
        let api_key = api_key.into();
        validate_non_empty_string(API_KEY_ENV, &api_key)?;
        settings.validate()?;

        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            client,
            api_key,
            settings,
        })
    }

    /// 從環境變數讀取 API key
    pub fn from_env(settings: AirtableSettings) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| EtlError::CredentialError {
                variable: API_KEY_ENV.to_string(),
            })?;
        Self::new(api_key, settings)
    }

    pub fn settings(&self) -> &AirtableSettings {
        &self.settings
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let invalid = |reason: String| EtlError::InvalidConfigValueError {
            field: "api_url".to_string(),
            value: self.settings.api_url.clone(),
            reason,
        };

        let mut url = Url::parse(&self.settings.api_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("v0")
            .extend(segments);
        Ok(url)
    }

    /// GET 並解析 JSON；傳輸錯誤、429 與 5xx 會以固定間隔重試
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, &str)],
        table: &str,
    ) -> Result<T> {
        let mut attempt = 0;

        loop {
            let sent = self
                .client
                .get(url.clone())
                .bearer_auth(&self.api_key)
                .query(query)
                .send()
                .await;

            match sent {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.json::<T>().await?);
                }
                Ok(response) => {
                    let status = response.status();
                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    let body = response.text().await.unwrap_or_default();

                    if !retryable || attempt >= self.settings.max_retries {
                        return Err(EtlError::FetchError {
                            table: table.to_string(),
                            message: format!("HTTP {}: {}", status, body),
                        });
                    }
                    tracing::warn!(
                        "🔁 {}: HTTP {} (attempt {}/{}), retrying",
                        table,
                        status,
                        attempt + 1,
                        self.settings.max_retries + 1
                    );
                }
                Err(e) => {
                    if attempt >= self.settings.max_retries {
                        return Err(e.into());
                    }
                    tracing::warn!(
                        "🔁 {}: request failed (attempt {}/{}): {}",
                        table,
                        attempt + 1,
                        self.settings.max_retries + 1,
                        e
                    );
                }
            }

            attempt += 1;
            tokio::time::sleep(self.settings.retry_delay).await;
        }
    }

    /// 取得整張表的所有 records，依 `offset` 逐頁讀取直到最後一頁
    pub async fn fetch_records(&self, base_id: &str, table_name: &str) -> Result<Vec<Record>> {
        let url = self.endpoint(&[base_id, table_name])?;
        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        let mut pages = 0;

        loop {
            let query: Vec<(&str, &str)> = match offset.as_deref() {
                Some(token) => vec![("offset", token)],
                None => Vec::new(),
            };

            let page: RecordPage = self.get_json(&url, &query, table_name).await?;
            pages += 1;
            tracing::debug!(
                "📡 {}: page {} returned {} records",
                table_name,
                pages,
                page.records.len()
            );

            records.extend(page.records.into_iter().map(|r| Record::new(r.fields)));

            match page.offset.filter(|o| !o.is_empty()) {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        tracing::info!(
            "📥 {}: fetched {} records in {} page(s)",
            table_name,
            records.len(),
            pages
        );
        Ok(records)
    }

    /// 查詢 base 的 schema，回傳指定表格的欄位
    pub async fn table_fields(&self, base_id: &str, table_name: &str) -> Result<Vec<FieldMeta>> {
        let url = self.endpoint(&["meta", "bases", base_id, "tables"])?;
        let schema: BaseSchema = self.get_json(&url, &[], table_name).await?;

        schema
            .tables
            .into_iter()
            .find(|t| t.name == table_name)
            .map(|t| t.fields)
            .ok_or_else(|| EtlError::FetchError {
                table: table_name.to_string(),
                message: format!("Table '{}' not found in base '{}'", table_name, base_id),
            })
    }
}

#[async_trait]
impl RecordSource for AirtableClient {
    async fn fetch(&self, base_id: &str, table_name: &str) -> Result<Vec<Record>> {
        self.fetch_records(base_id, table_name).await
    }
}

/// Airtable 欄位型別對應到欄位規則型別
pub fn column_type_for(airtable_type: &str) -> CastType {
    match airtable_type {
        "number" | "currency" | "percent" => CastType::Float,
        "checkbox" => CastType::Bool,
        "count" | "autoNumber" => CastType::Int,
        _ => CastType::Str,
    }
}
