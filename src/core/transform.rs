use crate::core::caster::cast;
use crate::core::format::{FormatError, PercentFormat};
use crate::domain::model::{RawTable, Scalar, TypedTable};
use crate::domain::rules::ColumnRule;
use crate::utils::error::{EtlError, Result};
use serde_json::Value;

/// 依欄位規則把原始表格轉成強型別表格
///
/// 每條規則依序處理：找出符合的來源欄位，逐欄轉型、格式化後放進輸出表格；
/// 沒有任何欄位符合時，產生一個全部填入預設值的欄位。
/// 最後依 `column_order` 重新排序，未列出的欄位接在後面，不會被丟棄。
pub fn transform(
    table: &RawTable,
    rules: &[ColumnRule],
    column_order: Option<&[String]>,
) -> Result<TypedTable> {
    let mut output = TypedTable::with_row_count(table.row_count());
    let column_names = table.column_names();

    for rule in rules {
        let matcher = rule.source.matcher().map_err(|e| {
            EtlError::transform(format!(
                "Invalid column pattern '{}': {}",
                rule.source.raw(),
                e
            ))
        })?;
        let matched = matcher.select(&column_names);

        if matched.is_empty() {
            tracing::debug!(
                "No column matches '{}', filling '{}' with default",
                rule.source.raw(),
                rule.placeholder_name()
            );
            output.set_column(
                rule.placeholder_name(),
                vec![rule.default.clone(); table.row_count()],
            );
            continue;
        }

        if let Some(rename) = rule.explicit_rename().filter(|_| matched.len() > 1) {
            tracing::warn!(
                "⚠️ Pattern '{}' matched {} columns but renames to '{}'; keeping only '{}'",
                rule.source.raw(),
                matched.len(),
                rename,
                matched[matched.len() - 1]
            );
        }

        let formatter = rule.format.as_deref().map(PercentFormat::parse);

        for name in matched {
            let raw_values = table.column(name).unwrap_or(&[]);
            let casted = cast_column(raw_values, rule);

            let values = match &formatter {
                None => casted,
                Some(Ok(format)) => match format_column(&casted, format) {
                    Ok(formatted) => formatted,
                    Err(e) => {
                        tracing::debug!("Format skipped for column '{}': {}", name, e);
                        casted
                    }
                },
                Some(Err(e)) => {
                    tracing::debug!("Format skipped for column '{}': {}", name, e);
                    casted
                }
            };

            let output_name = rule.explicit_rename().unwrap_or(name);
            output.set_column(output_name, values);
        }
    }

    if let Some(order) = column_order {
        output.reorder(order);
    }

    Ok(output)
}

fn cast_column(values: &[Value], rule: &ColumnRule) -> Vec<Scalar> {
    values
        .iter()
        .map(|v| cast(v, &rule.cast, &rule.default))
        .collect()
}

/// 任何一個值格式化失敗，整欄都不格式化
fn format_column(
    values: &[Scalar],
    format: &PercentFormat,
) -> std::result::Result<Vec<Scalar>, FormatError> {
    values
        .iter()
        .map(|v| {
            if v.is_null() {
                Ok(v.clone())
            } else {
                format.render(v).map(Scalar::Text)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{flatten::flatten, sanitize::sanitize};
    use crate::domain::model::Record;
    use crate::domain::rules::CastType;
    use serde_json::json;

    fn raw(records: Vec<Value>) -> RawTable {
        let records: Vec<Record> = records.into_iter().map(Record::from).collect();
        sanitize(&flatten(&records))
    }

    #[test]
    fn test_literal_rule_with_rename() {
        let table = raw(vec![json!({"Name": "Alice"})]);
        let rules = vec![ColumnRule::literal("Name").rename("name")];

        let out = transform(&table, &rules, None).unwrap();

        assert_eq!(out.column_names(), vec!["name"]);
        assert_eq!(out.column("name").unwrap(), &[Scalar::text("Alice")]);
    }

    #[test]
    fn test_column_order_then_remaining() {
        let table = raw(vec![json!({"a": "1", "b": "2", "c": "3"})]);
        let rules = vec![
            ColumnRule::literal("a"),
            ColumnRule::literal("b"),
            ColumnRule::literal("c"),
        ];
        let order = vec!["b".to_string(), "a".to_string()];

        let out = transform(&table, &rules, Some(order.as_slice())).unwrap();

        assert_eq!(out.column_names(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_prefix_rule_keeps_each_matched_name() {
        let table = raw(vec![json!({"OptA": "1", "OptB": "2", "Other": "x"})]);
        let rules = vec![ColumnRule::prefix("^Opt").cast(CastType::Int)];

        let out = transform(&table, &rules, None).unwrap();

        assert_eq!(out.column_names(), vec!["OptA", "OptB"]);
        assert_eq!(out.column("OptB").unwrap(), &[Scalar::Int(2)]);
    }

    #[test]
    fn test_prefix_rule_with_rename_collapses_last_wins() {
        let table = raw(vec![json!({"OptA": "1", "OptB": "2"})]);
        let rules = vec![ColumnRule::prefix("Opt").rename("option").cast(CastType::Int)];

        let out = transform(&table, &rules, None).unwrap();

        assert_eq!(out.column_names(), vec!["option"]);
        assert_eq!(out.column("option").unwrap(), &[Scalar::Int(2)]);
    }

    #[test]
    fn test_missing_source_yields_default_column() {
        let table = raw(vec![json!({"Name": "A"}), json!({"Name": "B"})]);
        let rules = vec![
            ColumnRule::literal("Name"),
            ColumnRule::literal("Region")
                .rename("region")
                .default_value(Scalar::text("unknown")),
        ];

        let out = transform(&table, &rules, None).unwrap();

        assert_eq!(out.column_names(), vec!["Name", "region"]);
        assert_eq!(
            out.column("region").unwrap(),
            &[Scalar::text("unknown"), Scalar::text("unknown")]
        );
    }

    #[test]
    fn test_cast_failure_falls_back_to_default() {
        let table = raw(vec![json!({"Floors": "abc"}), json!({"Floors": "3.7"})]);
        let rules = vec![ColumnRule::literal("Floors")
            .cast(CastType::Int)
            .default_value(Scalar::Int(0))];

        let out = transform(&table, &rules, None).unwrap();

        assert_eq!(out.column("Floors").unwrap(), &[Scalar::Int(0), Scalar::Int(3)]);
    }

    #[test]
    fn test_format_applies_to_non_null_values() {
        let table = raw(vec![json!({"Area": "12.345"}), json!({"Other": 1})]);
        let rules = vec![ColumnRule::literal("Area").cast(CastType::Float).format("%.1f m²")];

        let out = transform(&table, &rules, None).unwrap();

        assert_eq!(
            out.column("Area").unwrap(),
            &[Scalar::text("12.3 m²"), Scalar::Null]
        );
    }

    #[test]
    fn test_format_failure_keeps_whole_column_unformatted() {
        // 預設值 "n/a" 無法以 %f 格式化，整欄保留轉型後的值
        let table = raw(vec![json!({"Area": "7"}), json!({"Area": "x"})]);
        let rules = vec![ColumnRule::literal("Area")
            .cast(CastType::Float)
            .default_value(Scalar::text("n/a"))
            .format("%.1f")];

        let out = transform(&table, &rules, None).unwrap();

        assert_eq!(
            out.column("Area").unwrap(),
            &[Scalar::Float(7.0), Scalar::text("n/a")]
        );
    }

    #[test]
    fn test_invalid_pattern_is_transform_error() {
        let table = raw(vec![json!({"a": "1"})]);
        let rules = vec![ColumnRule::prefix("(")];

        let err = transform(&table, &rules, None).unwrap_err();
        assert!(matches!(err, EtlError::TransformError { .. }));
    }

    #[test]
    fn test_row_count_kept_when_nothing_matches() {
        let table = raw(vec![json!({"a": "1"}), json!({"a": "2"}), json!({"a": "3"})]);
        let rules = vec![ColumnRule::literal("zzz")];

        let out = transform(&table, &rules, None).unwrap();

        assert_eq!(out.row_count(), 3);
        assert_eq!(out.column("zzz").unwrap(), &[Scalar::Null, Scalar::Null, Scalar::Null]);
    }
}
