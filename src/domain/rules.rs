use crate::domain::model::Scalar;
use crate::utils::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 欄位規則要轉換成的型別
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CastType {
    #[default]
    Str,
    Float,
    Int,
    Bool,
    Timestamp,
    /// 無法辨識的型別名稱：值原樣通過
    Other(String),
}

impl CastType {
    pub fn as_str(&self) -> &str {
        match self {
            CastType::Str => "str",
            CastType::Float => "float",
            CastType::Int => "int",
            CastType::Bool => "bool",
            CastType::Timestamp => "timestamp",
            CastType::Other(name) => name,
        }
    }
}

impl From<&str> for CastType {
    fn from(name: &str) -> Self {
        match name {
            "str" => CastType::Str,
            "float" => CastType::Float,
            "int" => CastType::Int,
            "bool" => CastType::Bool,
            "timestamp" | "datetime" => CastType::Timestamp,
            other => CastType::Other(other.to_string()),
        }
    }
}

/// 來源欄位比對方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    Literal(String),
    /// 從欄位名稱開頭比對的正規表達式
    Prefix(String),
}

impl ColumnSource {
    pub fn raw(&self) -> &str {
        match self {
            ColumnSource::Literal(name) | ColumnSource::Prefix(name) => name,
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, ColumnSource::Prefix(_))
    }

    pub fn matcher(&self) -> Result<ColumnMatcher> {
        match self {
            ColumnSource::Literal(name) => Ok(ColumnMatcher::Literal(name.clone())),
            ColumnSource::Prefix(pattern) => {
                let anchored = Regex::new(&format!("^(?:{})", pattern))?;
                Ok(ColumnMatcher::Prefix(anchored))
            }
        }
    }
}

/// 已編譯的比對器，每次套用規則時建立一次
#[derive(Debug, Clone)]
pub enum ColumnMatcher {
    Literal(String),
    Prefix(Regex),
}

impl ColumnMatcher {
    pub fn select<'a>(&self, column_names: &[&'a str]) -> Vec<&'a str> {
        match self {
            ColumnMatcher::Literal(name) => column_names
                .iter()
                .copied()
                .filter(|c| *c == name.as_str())
                .take(1)
                .collect(),
            ColumnMatcher::Prefix(regex) => column_names
                .iter()
                .copied()
                .filter(|c| regex.is_match(c))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ColumnRuleDef", into = "ColumnRuleDef")]
pub struct ColumnRule {
    pub source: ColumnSource,
    pub rename: Option<String>,
    pub cast: CastType,
    pub default: Scalar,
    pub format: Option<String>,
}

impl ColumnRule {
    pub fn literal(source: impl Into<String>) -> Self {
        Self {
            source: ColumnSource::Literal(source.into()),
            rename: None,
            cast: CastType::Str,
            default: Scalar::Null,
            format: None,
        }
    }

    pub fn prefix(pattern: impl Into<String>) -> Self {
        Self {
            source: ColumnSource::Prefix(pattern.into()),
            ..Self::literal(String::new())
        }
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    pub fn cast(mut self, cast: CastType) -> Self {
        self.cast = cast;
        self
    }

    pub fn default_value(mut self, default: Scalar) -> Self {
        self.default = default;
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// 明確給定且非空的 rename
    pub fn explicit_rename(&self) -> Option<&str> {
        self.rename.as_deref().filter(|r| !r.is_empty())
    }

    /// 來源欄位不存在時產生的欄位名稱
    pub fn placeholder_name(&self) -> &str {
        self.explicit_rename().unwrap_or_else(|| self.source.raw())
    }
}

/// JSON 設定檔中的欄位規則格式
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnRuleDef {
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rename: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    cast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    regex: bool,
}

impl From<ColumnRuleDef> for ColumnRule {
    fn from(def: ColumnRuleDef) -> Self {
        let source = if def.regex {
            ColumnSource::Prefix(def.source)
        } else {
            ColumnSource::Literal(def.source)
        };

        Self {
            source,
            rename: def.rename,
            cast: def.cast.as_deref().map(CastType::from).unwrap_or_default(),
            default: def.default.map(Scalar::from).unwrap_or_default(),
            format: def.format,
        }
    }
}

impl From<ColumnRule> for ColumnRuleDef {
    fn from(rule: ColumnRule) -> Self {
        let default = match rule.default {
            Scalar::Null => None,
            ref other => Some(Value::from(other)),
        };

        Self {
            regex: rule.source.is_regex(),
            source: rule.source.raw().to_string(),
            rename: rule.rename,
            cast: Some(rule.cast.as_str().to_string()),
            default,
            format: rule.format,
        }
    }
}
