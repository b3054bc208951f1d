use crate::domain::model::{RawTable, Record, Table};
use serde_json::Value;

pub const LIST_SEPARATOR: &str = ", ";

/// 清單值（多選、連結記錄等）合併成以逗號分隔的字串
pub fn flatten_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::String(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR),
        ),
        other => other.clone(),
    }
}

/// 將記錄轉為欄式表格；欄位依首次出現順序排列，缺值補 null
pub fn flatten(records: &[Record]) -> RawTable {
    let mut names: Vec<&str> = Vec::new();
    for record in records {
        for key in record.fields.keys() {
            if !names.contains(&key.as_str()) {
                names.push(key.as_str());
            }
        }
    }

    let mut table = Table::with_row_count(records.len());
    for name in names {
        let values = records
            .iter()
            .map(|r| r.fields.get(name).map(flatten_value).unwrap_or(Value::Null))
            .collect();
        table.set_column(name, values);
    }
    table
}
