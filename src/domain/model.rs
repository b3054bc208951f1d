use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// 來源 API 的一筆資料，保留欄位原始順序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }
}

/// 轉換後的強型別純量
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Scalar {
    /// NaN 與 null 同樣視為缺值
    pub fn is_null(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Scalar::Text(value.into())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => f.write_str(&float_text(*v)),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// 浮點數文字：最短可還原的位數，整數值保留 `.0`，
/// 指數 < -4 或 >= 16 時改用科學記號（`1e+20`、`1.5e-05`）
pub fn float_text(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..16).contains(&exponent) {
        let plain = value.to_string();
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

impl From<&Value> for Scalar {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => n.as_f64().map(Scalar::Float).unwrap_or(Scalar::Null),
            },
            Value::String(s) => Scalar::Text(s.clone()),
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        Scalar::from(&value)
    }
}

impl From<&Scalar> for Value {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Timestamp(_) => Value::String(scalar.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column<V> {
    pub name: String,
    pub values: Vec<V>,
}

/// 欄式表格：所有欄位長度一致，欄位順序即輸出順序
#[derive(Debug, Clone, PartialEq)]
pub struct Table<V> {
    columns: Vec<Column<V>>,
    row_count: usize,
}

pub type RawTable = Table<Value>;
pub type TypedTable = Table<Scalar>;

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            row_count: 0,
        }
    }
}

impl<V> Table<V> {
    pub fn with_row_count(row_count: usize) -> Self {
        Self {
            columns: Vec::new(),
            row_count,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column<V>] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[V]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// 已存在的欄位就地替換（保留原位置），否則附加在最後
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<V>) {
        let name = name.into();
        debug_assert_eq!(values.len(), self.row_count, "column '{}' length", name);

        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
    }

    /// 依指定順序排列，未列出的欄位維持原順序接在後面
    pub fn reorder(&mut self, order: &[String]) {
        let mut remaining = std::mem::take(&mut self.columns);
        let mut ordered = Vec::with_capacity(remaining.len());

        for name in order {
            if let Some(pos) = remaining.iter().position(|c| &c.name == name) {
                ordered.push(remaining.remove(pos));
            }
        }
        ordered.extend(remaining);
        self.columns = ordered;
    }

    pub fn map_values<U, F>(&self, mut f: F) -> Table<U>
    where
        F: FnMut(&V) -> U,
    {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values.iter().map(&mut f).collect(),
                })
                .collect(),
            row_count: self.row_count,
        }
    }

    pub fn row(&self, index: usize) -> Option<Vec<&V>> {
        if index >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&V>> + '_ {
        (0..self.row_count).filter_map(move |i| self.row(i))
    }

    /// 取出 [start, start + len) 範圍的列
    pub fn slice(&self, start: usize, len: usize) -> Table<V>
    where
        V: Clone,
    {
        let start = start.min(self.row_count);
        let end = start.saturating_add(len).min(self.row_count);
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values[start..end].to_vec(),
                })
                .collect(),
            row_count: end - start,
        }
    }
}
