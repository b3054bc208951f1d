use crate::adapters::parquet_sink::ParquetSink;
use crate::config::job_config::{
    profile_names, profile_tables, scaffold_config, table_name_for_output, validate_config_name,
    DEFAULT_PROFILE, FALLBACK_TABLE_NAME,
};
use crate::utils::error::EtlError;
use crate::utils::file_stats::file_stats;
use crate::utils::validation::validate_file_name;
use crate::web::WebState;
use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{LinesStream, ReceiverStream};
use tokio_stream::StreamExt;

pub const ROWS_PER_PAGE: usize = 20;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/configs", web::get().to(list_configs))
            .route("/configs", web::post().to(create_config))
            .route("/configs/{file}", web::get().to(view_config))
            .route("/configs/{file}", web::put().to(save_config))
            .route("/configs/{file}", web::delete().to(delete_config))
            .route("/configs/{file}/run", web::get().to(run_export))
            .route("/outputs/{file}", web::get().to(view_output))
            .route("/download/{folder}/{file}", web::get().to(download_file)),
    );
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<EtlError> for ApiError {
    fn from(error: EtlError) -> Self {
        let status = match &error {
            EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::ConfigError { .. }
            | EtlError::SerializationError(_) => StatusCode::BAD_REQUEST,
            EtlError::CredentialError { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EtlError::FetchError { .. } | EtlError::ApiError(_) => StatusCode::BAD_GATEWAY,
            EtlError::SinkReadError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status).json(json!({"error": self.message}))
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

fn read_document(path: &Path) -> Result<Value, ApiError> {
    if !path.is_file() {
        return Err(ApiError::not_found("Config file not found"));
    }
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| ApiError::bad_request(format!("Invalid config file format: {}", e)))
}

fn write_document(path: &Path, document: &Value) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let pretty = serde_json::to_string_pretty(document).map_err(EtlError::from)?;
    std::fs::write(path, pretty)?;
    Ok(())
}

fn table_name_of(table: &Value) -> Option<&str> {
    table.get("table_name").and_then(Value::as_str)
}

/// configs 目錄中的所有 `.json` 檔
pub async fn list_configs(state: web::Data<WebState>) -> ApiResult {
    let mut paths: Vec<PathBuf> = match std::fs::read_dir(&state.paths.config_dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect(),
        Err(_) => Vec::new(),
    };
    paths.sort();

    let configs: Vec<Value> = paths
        .iter()
        .filter_map(|p| {
            let name = p.file_name()?.to_str()?;
            Some(json!({"name": name, "path": p.display().to_string()}))
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({"configs": configs})))
}

/// 設定檔內容、檔案資訊、各 profile 的 CLI 指令，以及 default profile 的欄位中繼資料
pub async fn view_config(state: web::Data<WebState>, path: web::Path<String>) -> ApiResult {
    let file_name = path.into_inner();
    validate_config_name(&file_name)?;

    let config_path = state.paths.config_file(&file_name);
    let document = read_document(&config_path)?;
    let file_info = file_stats(&config_path, &state.paths.root_dir)?;

    let mut cli_commands = Vec::new();
    for profile in profile_names(&document) {
        for table in profile_tables(&document, &profile) {
            cli_commands.push(json!({
                "profile": profile,
                "cmd": format!(
                    "airtable-export export --config configs/{} --profile {}",
                    file_name, profile
                ),
                "output_file": table.get("output_file"),
                "table_name": table.get("table_name"),
            }));
        }
    }

    let mut metadata = Vec::new();
    if let Some(client) = &state.airtable {
        for table in profile_tables(&document, DEFAULT_PROFILE) {
            let base_id = table.get("base_id").and_then(Value::as_str).unwrap_or_default();
            let table_name = table_name_of(table).unwrap_or_default();

            match client.table_fields(base_id, table_name).await {
                Ok(fields) => metadata.push(json!({
                    "base_id": base_id,
                    "table_name": table_name,
                    "fields": fields,
                })),
                Err(e) => {
                    tracing::warn!("⚠️ Metadata lookup failed for {}: {}", table_name, e);
                    metadata.push(json!({
                        "base_id": base_id,
                        "table_name": table_name,
                        "fields": [],
                        "error": e.to_string(),
                    }));
                }
            }
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "filename": file_name,
        "config": document,
        "file_info": file_info,
        "cli_commands": cli_commands,
        "metadata": metadata,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateConfigRequest {
    pub description: String,
    pub base_id: String,
    pub table_name: String,
    pub filename: String,
}

/// 依 Airtable 中繼資料建立新設定檔
pub async fn create_config(
    state: web::Data<WebState>,
    body: web::Json<CreateConfigRequest>,
) -> ApiResult {
    let request = body.into_inner();
    let all_present = [
        &request.description,
        &request.base_id,
        &request.table_name,
        &request.filename,
    ]
    .iter()
    .all(|v| !v.trim().is_empty());
    if !all_present {
        return Err(ApiError::bad_request("All fields are required"));
    }
    validate_config_name(&request.filename)?;

    let config_path = state.paths.config_file(&request.filename);
    if config_path.exists() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "A config file with that name already exists",
        ));
    }

    let client = state.airtable.as_ref().ok_or_else(|| EtlError::CredentialError {
        variable: crate::adapters::airtable::API_KEY_ENV.to_string(),
    })?;
    let fields = client
        .table_fields(&request.base_id, &request.table_name)
        .await?;

    let document = scaffold_config(
        &request.description,
        &request.base_id,
        &request.table_name,
        &fields,
    );
    write_document(&config_path, &document)?;
    tracing::info!("📝 Created config {} with {} columns", request.filename, fields.len());

    Ok(HttpResponse::Created().json(json!({
        "filename": request.filename,
        "config": document,
    })))
}

/// 上傳或編輯設定檔；內容必須是合法 JSON
pub async fn save_config(
    state: web::Data<WebState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> ApiResult {
    let file_name = path.into_inner();
    validate_config_name(&file_name)?;

    let document: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?;

    let config_path = state.paths.config_file(&file_name);
    let existed = config_path.exists();
    write_document(&config_path, &document)?;
    tracing::info!("✅ Saved config {}", file_name);

    let response = json!({"saved": file_name});
    if existed {
        Ok(HttpResponse::Ok().json(response))
    } else {
        Ok(HttpResponse::Created().json(response))
    }
}

pub async fn delete_config(state: web::Data<WebState>, path: web::Path<String>) -> ApiResult {
    let file_name = path.into_inner();
    validate_config_name(&file_name)?;

    let config_path = state.paths.config_file(&file_name);
    if !config_path.is_file() {
        return Err(ApiError::not_found("Config file not found"));
    }
    std::fs::remove_file(&config_path)?;
    tracing::info!("🗑️ Deleted config file: {}", file_name);

    Ok(HttpResponse::Ok().json(json!({"deleted": file_name})))
}

#[derive(Debug, Deserialize)]
pub struct OutputQuery {
    pub config: Option<String>,
    pub profile: Option<String>,
    pub page: Option<usize>,
}

/// 決定要讀取的表格名稱：指定的 config/profile 第一張表，否則依輸出檔名反查
fn resolve_output_table(
    state: &WebState,
    file_name: &str,
    query: &OutputQuery,
) -> Result<String, ApiError> {
    match (&query.config, &query.profile) {
        (Some(config), Some(profile)) => {
            validate_config_name(config)?;
            let document = read_document(&state.paths.config_file(config))?;
            let profile_doc = document
                .get("profiles")
                .and_then(|p| p.get(profile.as_str()))
                .ok_or_else(|| {
                    ApiError::not_found(format!("Profile '{}' not found in config", profile))
                })?;

            Ok(profile_doc
                .get("tables")
                .and_then(Value::as_array)
                .and_then(|tables| tables.first())
                .and_then(table_name_of)
                .unwrap_or(FALLBACK_TABLE_NAME)
                .to_string())
        }
        _ => Ok(table_name_for_output(
            &state.paths.config_dir,
            file_name,
            query.profile.as_deref().unwrap_or(DEFAULT_PROFILE),
        )),
    }
}

/// 分頁檢視輸出檔內容，每頁 20 列
pub async fn view_output(
    state: web::Data<WebState>,
    path: web::Path<String>,
    query: web::Query<OutputQuery>,
) -> ApiResult {
    let file_name = path.into_inner();
    validate_file_name("output", &file_name, None)?;

    let table_name = resolve_output_table(&state, &file_name, &query)?;

    let output_path = state.paths.output_file(&file_name);
    if !output_path.is_file() {
        return Err(ApiError::not_found("Output file not found"));
    }

    let table = ParquetSink::new().try_read(&output_path, &table_name)?;
    let file_info = file_stats(&output_path, &state.paths.root_dir)?;

    let total_rows = table.row_count();
    let total_pages = total_rows.div_ceil(ROWS_PER_PAGE);
    let page = query.page.unwrap_or(1).max(1);
    let visible = table.slice((page - 1).saturating_mul(ROWS_PER_PAGE), ROWS_PER_PAGE);
    let rows: Vec<Vec<_>> = visible.rows().collect();

    Ok(HttpResponse::Ok().json(json!({
        "filename": file_name,
        "table_name": table_name,
        "config_file": query.config,
        "file_info": file_info,
        "columns": visible.column_names(),
        "rows": rows,
        "page": page,
        "total_pages": total_pages,
        "total_rows": total_rows,
        "displayed_rows": visible.row_count(),
    })))
}

/// 以附件形式下載 output 或 configs 目錄中的檔案
pub async fn download_file(
    req: HttpRequest,
    state: web::Data<WebState>,
    path: web::Path<(String, String)>,
) -> ApiResult {
    let (folder, file_name) = path.into_inner();
    let directory = match folder.as_str() {
        "output" => &state.paths.output_dir,
        "configs" => &state.paths.config_dir,
        _ => return Err(ApiError::bad_request("Invalid folder")),
    };
    validate_file_name("filename", &file_name, None)?;

    let file = NamedFile::open_async(directory.join(&file_name))
        .await
        .map_err(|_| ApiError::not_found("File not found"))?
        .set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file_name)],
        });

    Ok(file.into_response(&req))
}

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    pub profile: Option<String>,
}

/// 以子行程執行匯出，stdout 與 stderr 逐行串流回傳
pub async fn run_export(
    state: web::Data<WebState>,
    path: web::Path<String>,
    query: web::Query<RunQuery>,
) -> ApiResult {
    let file_name = path.into_inner();
    validate_config_name(&file_name)?;

    let config_path = state.paths.config_file(&file_name);
    if !config_path.is_file() {
        return Err(ApiError::not_found("Config file not found"));
    }

    let profile = query
        .into_inner()
        .profile
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

    let mut command = Command::new(&state.export_program);
    command
        .arg("--root")
        .arg(&state.paths.root_dir)
        .arg("export")
        .arg("--config")
        .arg(&config_path)
        .arg("--profile")
        .arg(&profile)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let (tx, rx) = mpsc::channel::<String>(64);
    let header = format!(
        "▶️ Running export for `{}` using profile `{}`...\n\n",
        file_name, profile
    );
    tokio::spawn(stream_process(command, header, tx));

    let body = ReceiverStream::new(rx).map(|line| Ok::<_, actix_web::Error>(web::Bytes::from(line)));
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .streaming(body))
}

async fn stream_process(mut command: Command, header: String, tx: mpsc::Sender<String>) {
    if tx.send(header).await.is_err() {
        return;
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            let _ = tx.send(format!("❌ Error running export: {}\n", e)).await;
            return;
        }
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        let _ = tx.send("❌ Export output is not available\n".to_string()).await;
        return;
    };

    let mut lines = LinesStream::new(BufReader::new(stdout).lines())
        .merge(LinesStream::new(BufReader::new(stderr).lines()));

    while let Some(line) = lines.next().await {
        let text = match line {
            Ok(text) => text,
            Err(e) => format!("❌ Error reading export output: {}", e),
        };
        if tx.send(format!("{}\n", text)).await.is_err() {
            tracing::debug!("Client disconnected, stopping export stream");
            return;
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => {}
        Ok(status) => {
            let _ = tx.send(format!("❌ Export exited with {}\n", status)).await;
        }
        Err(e) => {
            let _ = tx.send(format!("❌ Error waiting for export: {}\n", e)).await;
        }
    }
}
