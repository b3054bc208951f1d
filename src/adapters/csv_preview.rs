use crate::domain::model::TypedTable;
use crate::utils::error::Result;
use std::io::Write;

/// 以 CSV（含標題列）輸出前 `limit` 列
pub fn write_preview<W: Write>(table: &TypedTable, limit: usize, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(table.column_names())?;

    for row in table.rows().take(limit) {
        csv_writer.write_record(row.iter().map(|value| value.to_string()))?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Scalar;

    #[test]
    fn test_preview_limits_rows_and_quotes() {
        let mut table = TypedTable::with_row_count(3);
        table.set_column(
            "name",
            vec![Scalar::text("HQ, North"), Scalar::text("Annex"), Scalar::text("Depot")],
        );
        table.set_column("floors", vec![Scalar::Int(3), Scalar::Null, Scalar::Int(1)]);

        let mut out = Vec::new();
        write_preview(&table, 2, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "name,floors\n\"HQ, North\",3\nAnnex,\n"
        );
    }
}
