use crate::domain::model::RawTable;
use serde_json::Value;

/// 單一儲存格正規化：null 保持 null，清單／物件與布林、數字轉成字串
pub fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(_) => value.clone(),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
    }
}

/// 數字也轉成字串，讓最終型別完全由欄位規則決定
pub fn sanitize(table: &RawTable) -> RawTable {
    table.map_values(sanitize_value)
}
