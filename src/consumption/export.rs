//! CSV serialisation of a (usually filtered) unified table.

use super::schema::{
    CONSUMPTION, DATE, DISTRICT, DISTRICT_NAME, METERS, MUNICIPALITY, SECTION, USAGE, USAGE_RAW,
};
use super::types::UnifiedTable;
use crate::error::{Result, ResultExt as _};
use polars::prelude::*;
use std::path::Path;

/// Columns in download order. The name column only appears when the table
/// carries one, and the usage column is the leaf category when derived.
pub fn export_columns(table: &UnifiedTable) -> Vec<&'static str> {
    let frame = table.frame();
    let mut columns = vec![DATE, SECTION, DISTRICT];
    if table.has_district_names() {
        columns.push(DISTRICT_NAME);
    }
    columns.push(MUNICIPALITY);
    columns.push(if frame.column(USAGE).is_ok() { USAGE } else { USAGE_RAW });
    columns.push(METERS);
    columns.push(CONSUMPTION);
    columns
}

/// Serialises `table` as UTF-8 CSV with a header row and `YYYY-MM-DD` dates.
/// District ids are written as integers. An empty table yields no bytes at
/// all, not a bare header.
///
/// # Errors
///
/// Fails if a canonical column is missing or the writer fails.
pub fn to_csv(table: &UnifiedTable) -> Result<Vec<u8>> {
    if table.is_empty() {
        return Ok(Vec::new());
    }

    let mut selected = table.frame().select(export_columns(table))?;
    let ids = selected
        .column(DISTRICT)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    selected.with_column(ids)?;
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .with_separator(b',')
        .with_date_format(Some("%Y-%m-%d".to_owned()))
        .with_null_value(String::new())
        .finish(&mut selected)
        .context("Failed to serialise table to CSV")?;
    Ok(buf)
}

/// Writes [`to_csv`] output to `path`. Nothing is written for an empty table.
///
/// # Errors
///
/// Fails when serialisation fails or the file cannot be written.
pub fn write_csv(table: &UnifiedTable, path: &Path) -> Result<usize> {
    let bytes = to_csv(table)?;
    if bytes.is_empty() {
        tracing::warn!("Nothing to export to {}: the table is empty", path.display());
        return Ok(0);
    }
    std::fs::write(path, &bytes)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;
    tracing::info!("Exported {} row(s) to {}", table.height(), path.display());
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumption::cache::enrich;
    use crate::consumption::lookup::DistrictLookup;
    use crate::consumption::types::ColumnBuffers;
    use anyhow::Result;
    use chrono::NaiveDate;

    fn one_row(lookup: Option<&DistrictLookup>) -> Result<UnifiedTable> {
        let buffers = ColumnBuffers {
            sections: vec!["0801901001".to_owned()],
            districts: vec![Some(1.0)],
            municipalities: vec!["Barcelona".to_owned()],
            dates: vec![NaiveDate::from_ymd_opt(2023, 1, 5).unwrap_or_default()],
            usages: vec!["Domestic/Residencial".to_owned()],
            meters: vec![None],
            consumption: vec![1500.0],
        };
        Ok(UnifiedTable::new(enrich(buffers.into_frame()?, lookup, "/")?))
    }

    #[test]
    fn test_empty_table_exports_zero_bytes() -> Result<()> {
        let empty = UnifiedTable::new(crate::consumption::types::empty_canonical_frame()?);
        assert!(to_csv(&empty)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_one_row_exports_header_and_line() -> Result<()> {
        let bytes = to_csv(&one_row(None)?)?;
        let text = String::from_utf8(bytes)?;
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2, "header plus one data line");
        assert_eq!(
            lines[0],
            "Data,Seccio_censal,Districte,Municipi,Us,Numero_de_comptadors,Consum_litres_per_dia"
        );
        assert!(lines[1].starts_with("2023-01-05,0801901001,1,"), "got {}", lines[1]);
        assert!(lines[1].contains(",Barcelona,Residencial,,"), "got {}", lines[1]);
        Ok(())
    }

    #[test]
    fn test_name_column_follows_district_when_present() -> Result<()> {
        let lookup = DistrictLookup::from_pairs([(1.0, "Ciutat Vella".to_owned())]);
        let table = one_row(Some(&lookup))?;

        assert_eq!(
            export_columns(&table),
            vec![
                DATE,
                SECTION,
                DISTRICT,
                DISTRICT_NAME,
                MUNICIPALITY,
                USAGE,
                METERS,
                CONSUMPTION
            ]
        );
        let text = String::from_utf8(to_csv(&table)?)?;
        assert!(text.contains(",Ciutat Vella,"), "got {text}");
        Ok(())
    }

    #[test]
    fn test_district_ids_export_as_integers() -> Result<()> {
        let buffers = ColumnBuffers {
            sections: vec!["S1".to_owned(), "S2".to_owned()],
            districts: vec![Some(10.0), None],
            municipalities: vec!["Barcelona".to_owned(), "Badalona".to_owned()],
            dates: vec![NaiveDate::from_ymd_opt(2023, 1, 5).unwrap_or_default(); 2],
            usages: vec!["Comercial".to_owned(); 2],
            meters: vec![Some(3.0), None],
            consumption: vec![10.0, 20.0],
        };
        let table = UnifiedTable::new(enrich(buffers.into_frame()?, None, "/")?);
        let text = String::from_utf8(to_csv(&table)?)?;
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[1].starts_with("2023-01-05,S1,10,Barcelona,Comercial,"), "got {}", lines[1]);
        assert!(lines[2].starts_with("2023-01-05,S2,,Badalona,"), "got {}", lines[2]);
        assert!(!text.contains("10.0,Barcelona"), "got {text}");
        Ok(())
    }

    #[test]
    fn test_write_csv_skips_empty_tables() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("out.csv");
        let empty = UnifiedTable::new(crate::consumption::types::empty_canonical_frame()?);

        assert_eq!(write_csv(&empty, &path)?, 0);
        assert!(!path.exists());

        assert!(write_csv(&one_row(None)?, &path)? > 0);
        assert!(path.exists());
        Ok(())
    }
}
