use crate::domain::model::Scalar;
use crate::domain::rules::CastType;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

const FALSE_TOKENS: [&str; 7] = ["", "false", "0", "no", "off", "n", "f"];

/// 將單一值轉成目標型別；任何失敗都退回預設值，永不回傳錯誤
pub fn cast(value: &Value, cast_type: &CastType, default: &Scalar) -> Scalar {
    if value.is_null() {
        return default.clone();
    }

    let casted = match cast_type {
        CastType::Str => Some(Scalar::Text(to_text(value))),
        CastType::Float => to_float(value).map(Scalar::Float),
        CastType::Int => to_int(value).map(Scalar::Int),
        CastType::Bool => to_bool(value).map(Scalar::Bool),
        CastType::Timestamp => to_timestamp(value).map(Scalar::Timestamp),
        CastType::Other(name) => {
            tracing::trace!("Unknown column type '{}', passing value through", name);
            Some(Scalar::from(value))
        }
    };

    casted.unwrap_or_else(|| default.clone())
}

fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// 整數轉換採截斷（toward zero），不做四捨五入
fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(truncate))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn truncate(f: f64) -> Option<i64> {
    let t = f.trunc();
    if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Some(t as i64)
    } else {
        None
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => {
            // 明確的否定字樣為 false，其餘非空字串視為 truthy
            let token = s.trim().to_ascii_lowercase();
            Some(!FALSE_TOKENS.contains(&token.as_str()))
        }
        Value::Array(items) => Some(!items.is_empty()),
        Value::Object(map) => Some(!map.is_empty()),
        Value::Null => None,
    }
}

fn to_timestamp(value: &Value) -> Option<NaiveDateTime> {
    let raw = match value {
        Value::String(s) => s.trim(),
        _ => return None,
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_returns_default_for_every_type() {
        let types = [
            CastType::Str,
            CastType::Float,
            CastType::Int,
            CastType::Bool,
            CastType::Timestamp,
            CastType::Other("weird".to_string()),
        ];
        let defaults = [Scalar::Null, Scalar::Int(7), Scalar::text("n/a")];

        for t in &types {
            for d in &defaults {
                assert_eq!(cast(&Value::Null, t, d), *d, "type {:?}", t);
            }
        }
    }

    #[test]
    fn test_int_parse_failure_uses_default() {
        assert_eq!(cast(&json!("abc"), &CastType::Int, &Scalar::Int(0)), Scalar::Int(0));
    }

    #[test]
    fn test_float_parse() {
        assert_eq!(
            cast(&json!("3.7"), &CastType::Float, &Scalar::Int(0)),
            Scalar::Float(3.7)
        );
        assert_eq!(
            cast(&json!(" 12 "), &CastType::Float, &Scalar::Null),
            Scalar::Float(12.0)
        );
        assert_eq!(
            cast(&json!("twelve"), &CastType::Float, &Scalar::Float(-1.0)),
            Scalar::Float(-1.0)
        );
    }

    #[test]
    fn test_int_truncates_decimal_strings() {
        assert_eq!(cast(&json!("3.7"), &CastType::Int, &Scalar::Int(0)), Scalar::Int(3));
        assert_eq!(cast(&json!("-3.7"), &CastType::Int, &Scalar::Int(0)), Scalar::Int(-3));
        assert_eq!(cast(&json!(9.99), &CastType::Int, &Scalar::Null), Scalar::Int(9));
        assert_eq!(cast(&json!("1e400"), &CastType::Int, &Scalar::Null), Scalar::Null);
    }

    #[test]
    fn test_str_conversion() {
        assert_eq!(cast(&json!(42), &CastType::Str, &Scalar::Null), Scalar::text("42"));
        assert_eq!(cast(&json!("Alice"), &CastType::Str, &Scalar::Null), Scalar::text("Alice"));
        assert_eq!(cast(&json!(true), &CastType::Str, &Scalar::Null), Scalar::text("true"));
    }

    #[test]
    fn test_bool_coercion() {
        let d = Scalar::Null;
        assert_eq!(cast(&json!("True"), &CastType::Bool, &d), Scalar::Bool(true));
        assert_eq!(cast(&json!("false"), &CastType::Bool, &d), Scalar::Bool(false));
        assert_eq!(cast(&json!("0"), &CastType::Bool, &d), Scalar::Bool(false));
        assert_eq!(cast(&json!(""), &CastType::Bool, &d), Scalar::Bool(false));
        assert_eq!(cast(&json!("checked"), &CastType::Bool, &d), Scalar::Bool(true));
        assert_eq!(cast(&json!(0), &CastType::Bool, &d), Scalar::Bool(false));
        assert_eq!(cast(&json!(2.5), &CastType::Bool, &d), Scalar::Bool(true));
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 6, 6)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        let d = Scalar::Null;

        assert_eq!(
            cast(&json!("2025-06-06T12:30:00.000Z"), &CastType::Timestamp, &d),
            Scalar::Timestamp(expected)
        );
        assert_eq!(
            cast(&json!("2025-06-06 12:30:00"), &CastType::Timestamp, &d),
            Scalar::Timestamp(expected)
        );
        assert_eq!(
            cast(&json!("2025-06-06"), &CastType::Timestamp, &d),
            Scalar::Timestamp(expected.date().and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(cast(&json!("yesterday"), &CastType::Timestamp, &d), Scalar::Null);
    }

    #[test]
    fn test_unknown_type_passes_value_through() {
        let t = CastType::Other("currency".to_string());
        assert_eq!(cast(&json!("12.50"), &t, &Scalar::Null), Scalar::text("12.50"));
        assert_eq!(cast(&json!(5), &t, &Scalar::Null), Scalar::Int(5));
    }
}
