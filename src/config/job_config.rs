use crate::adapters::airtable::{column_type_for, FieldMeta};
use crate::domain::rules::ColumnRule;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_file_name, validate_non_empty_string, validate_path, Validate,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

pub const DEFAULT_PROFILE: &str = "default";
pub const FALLBACK_TABLE_NAME: &str = "Building";

/// 單一表格的匯出工作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub base_id: String,
    pub table_name: String,
    pub output_file: String,
    #[serde(default)]
    pub columns: Vec<ColumnRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_order: Option<Vec<String>>,
}

impl Validate for JobDescriptor {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("base_id", &self.base_id)?;
        validate_non_empty_string("table_name", &self.table_name)?;
        validate_path("output_file", &self.output_file)?;

        for (i, rule) in self.columns.iter().enumerate() {
            validate_non_empty_string(&format!("columns[{}].source", i), rule.source.raw())?;
        }
        Ok(())
    }
}

/// 解析後的 profile：依序匯出的表格清單
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    pub tables: Vec<JobDescriptor>,
}

impl Validate for ExportConfig {
    fn validate(&self) -> Result<()> {
        self.tables.iter().try_for_each(Validate::validate)
    }
}

impl ExportConfig {
    /// 從 JSON 設定檔載入指定 profile
    pub fn load<P: AsRef<Path>>(path: P, profile: &str) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::config(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&content, profile)
    }

    pub fn from_json_str(content: &str, profile: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(content)
            .map_err(|e| EtlError::config(format!("Invalid JSON in config: {}", e)))?;
        Self::from_document(&document, profile)
    }

    /// 支援 `profiles` 與舊版只有 `tables` 的兩種格式
    pub fn from_document(document: &Value, profile: &str) -> Result<Self> {
        let tables = if let Some(profiles) = document.get("profiles") {
            let selected = profiles
                .get(profile)
                .ok_or_else(|| EtlError::config(format!("Profile '{}' not found in config", profile)))?;

            selected
                .get("tables")
                .filter(|t| t.as_array().is_some_and(|a| !a.is_empty()))
                .ok_or_else(|| {
                    EtlError::config(format!("Profile '{}' must contain a 'tables' list", profile))
                })?
        } else if let Some(tables) = document.get("tables") {
            tables
        } else {
            return Err(EtlError::config(
                "Config file must contain either 'tables' or 'profiles'",
            ));
        };

        let tables: Vec<JobDescriptor> = serde_json::from_value(tables.clone())
            .map_err(|e| EtlError::config(format!("Invalid table entry: {}", e)))?;

        let config = Self { tables };
        config.validate()?;
        tracing::debug!(
            "Loaded profile '{}' with {} table(s)",
            profile,
            config.tables.len()
        );
        Ok(config)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P, profile: &str) -> Result<ExportConfig> {
    ExportConfig::load(path, profile)
}

/// 設定檔中的 profile 名稱；舊版格式只有 `default`
pub fn profile_names(document: &Value) -> Vec<String> {
    match document.get("profiles").and_then(Value::as_object) {
        Some(profiles) => profiles.keys().cloned().collect(),
        None => vec![DEFAULT_PROFILE.to_string()],
    }
}

/// profile 中的原始表格清單，不驗證內容
pub fn profile_tables<'a>(document: &'a Value, profile: &str) -> Vec<&'a Value> {
    let tables = match document.get("profiles") {
        Some(profiles) => profiles.get(profile).and_then(|p| p.get("tables")),
        None => document.get("tables"),
    };
    tables
        .and_then(Value::as_array)
        .map(|a| a.iter().collect())
        .unwrap_or_default()
}

/// 設定檔名稱只能是 configs 目錄下的單純 `.json` 檔名
pub fn validate_config_name(file_name: &str) -> Result<()> {
    validate_file_name("config", file_name, Some("json"))
}

/// 依輸出檔名反查表格名稱，找不到時回傳 `Building`
pub fn table_name_for_output(config_dir: &Path, file_name: &str, profile: &str) -> String {
    let entries = match std::fs::read_dir(config_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Cannot list {}: {}", config_dir.display(), e);
            return FALLBACK_TABLE_NAME.to_string();
        }
    };

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    for path in paths {
        let Some(document) = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str::<Value>(&text).ok())
        else {
            tracing::debug!("Skipping unreadable config {}", path.display());
            continue;
        };

        for table in profile_tables(&document, profile) {
            let output_name = table
                .get("output_file")
                .and_then(Value::as_str)
                .and_then(|f| Path::new(f).file_name())
                .and_then(|f| f.to_str());

            if output_name == Some(file_name) {
                return table
                    .get("table_name")
                    .and_then(Value::as_str)
                    .unwrap_or(FALLBACK_TABLE_NAME)
                    .to_string();
            }
        }
    }

    FALLBACK_TABLE_NAME.to_string()
}

/// 依 Airtable 欄位中繼資料產生新的 profile 設定檔內容
pub fn scaffold_config(
    description: &str,
    base_id: &str,
    table_name: &str,
    fields: &[FieldMeta],
) -> Value {
    let columns: Vec<Value> = fields
        .iter()
        .map(|f| json!({"source": f.name, "type": column_type_for(&f.field_type).as_str()}))
        .collect();

    json!({
        "profiles": {
            DEFAULT_PROFILE: {
                "description": description,
                "tables": [{
                    "base_id": base_id,
                    "table_name": table_name,
                    "output_file": format!("output/{}.parquet", table_name.to_lowercase()),
                    "columns": columns,
                }]
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PROFILED: &str = r#"{
        "profiles": {
            "default": {
                "description": "Buildings",
                "tables": [{
                    "base_id": "app123",
                    "table_name": "Buildings",
                    "output_file": "output/buildings.parquet",
                    "columns": [{"source": "Name", "rename": "name"}],
                    "column_order": ["name"]
                }]
            },
            "empty": {"tables": []}
        }
    }"#;

    #[test]
    fn test_load_profile() {
        let config = ExportConfig::from_json_str(PROFILED, "default").unwrap();
        assert_eq!(config.tables.len(), 1);
        assert_eq!(config.tables[0].table_name, "Buildings");
        assert_eq!(config.tables[0].column_order, Some(vec!["name".to_string()]));
    }

    #[test]
    fn test_missing_profile_is_config_error() {
        let err = ExportConfig::from_json_str(PROFILED, "nightly").unwrap_err();
        assert!(matches!(err, EtlError::ConfigError { ref message } if message.contains("nightly")));
    }

    #[test]
    fn test_profile_without_tables_is_config_error() {
        let err = ExportConfig::from_json_str(PROFILED, "empty").unwrap_err();
        assert!(matches!(err, EtlError::ConfigError { ref message } if message.contains("'tables'")));
    }

    #[test]
    fn test_legacy_tables_document() {
        let legacy = r#"{"tables": [{"base_id": "a", "table_name": "T", "output_file": "t.parquet"}]}"#;
        let config = ExportConfig::from_json_str(legacy, "whatever").unwrap();
        assert_eq!(config.tables[0].columns.len(), 0);
    }

    #[test]
    fn test_document_without_tables_or_profiles() {
        assert!(ExportConfig::from_json_str(r#"{"other": 1}"#, "default").is_err());
        assert!(ExportConfig::from_json_str("{not json", "default").is_err());
    }

    #[test]
    fn test_empty_base_id_fails_validation() {
        let doc = r#"{"tables": [{"base_id": " ", "table_name": "T", "output_file": "t.parquet"}]}"#;
        let err = ExportConfig::from_json_str(doc, "default").unwrap_err();
        assert!(matches!(err, EtlError::MissingConfigError { ref field } if field == "base_id"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_table_name_for_output() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.json"), "{oops").unwrap();
        fs::write(dir.path().join("buildings.json"), PROFILED).unwrap();

        assert_eq!(
            table_name_for_output(dir.path(), "buildings.parquet", "default"),
            "Buildings"
        );
        assert_eq!(
            table_name_for_output(dir.path(), "unknown.parquet", "default"),
            FALLBACK_TABLE_NAME
        );
    }

    #[test]
    fn test_scaffold_maps_field_types() {
        let fields = vec![
            FieldMeta {
                name: "Name".to_string(),
                field_type: "singleLineText".to_string(),
            },
            FieldMeta {
                name: "Floors".to_string(),
                field_type: "number".to_string(),
            },
        ];
        let doc = scaffold_config("Campus", "app123", "Buildings", &fields);

        let config = ExportConfig::from_document(&doc, DEFAULT_PROFILE).unwrap();
        assert_eq!(config.tables[0].output_file, "output/buildings.parquet");
        assert_eq!(config.tables[0].columns[1].cast.as_str(), "float");
        assert_eq!(profile_names(&doc), vec!["default".to_string()]);
    }
}
