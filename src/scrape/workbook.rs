use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;
use tracing::{debug, warn};

use crate::records::{COL_CHEMIST, COL_ITEMS, COL_MONTH, COL_PRACTICE, COL_YEAR};

/// Columns carried into the merged file, in output order. Header matching
/// is case-sensitive.
pub const COLUMNS_TO_KEEP: [&str; 5] = [COL_PRACTICE, COL_CHEMIST, COL_YEAR, COL_MONTH, COL_ITEMS];

/// The kept columns of one workbook's first sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    /// Subset of [`COLUMNS_TO_KEEP`] present in the sheet, in that order.
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl SheetData {
    /// Value of `column` in `row`, empty when the sheet lacks the column.
    pub fn value(&self, row: usize, column: &str) -> &str {
        self.columns
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.rows.get(row).and_then(|r| r.get(i)))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Reads the first sheet of a workbook, treating its first row as headers.
///
/// Returns `Ok(None)` when the sheet is empty or carries none of the wanted
/// columns; those workbooks are skipped rather than failing the merge.
pub fn read_first_sheet(bytes: Vec<u8>, source: &str) -> Result<Option<SheetData>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .with_context(|| format!("could not open workbook {source}"))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook {source} has no sheets"))?
        .with_context(|| format!("could not read first sheet of {source}"))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        warn!(source, "Workbook is empty, skipping");
        return Ok(None);
    };
    let header: Vec<String> = header.iter().map(|c| cell_text(c).trim().to_string()).collect();

    let picks: Vec<(&'static str, usize)> = COLUMNS_TO_KEEP
        .iter()
        .filter_map(|col| header.iter().position(|h| h == col).map(|i| (*col, i)))
        .collect();

    if picks.is_empty() {
        warn!(source, wanted = ?COLUMNS_TO_KEEP, "None of the wanted columns found, skipping");
        return Ok(None);
    }
    if picks.len() < COLUMNS_TO_KEEP.len() {
        let missing: Vec<_> = COLUMNS_TO_KEEP
            .iter()
            .filter(|c| !picks.iter().any(|(p, _)| p == *c))
            .collect();
        warn!(source, ?missing, "Workbook is missing columns, using the ones available");
    }

    let data: Vec<Vec<String>> = rows
        .map(|row| {
            picks
                .iter()
                .map(|(_, i)| row.get(*i).map(cell_text).unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|v| !v.is_empty()))
        .collect();

    if data.is_empty() {
        warn!(source, "Workbook has headers but no rows, skipping");
        return Ok(None);
    }

    debug!(source, rows = data.len(), "Read workbook");
    Ok(Some(SheetData {
        columns: picks.into_iter().map(|(c, _)| c).collect(),
        rows: data,
    }))
}

/// Text form of a cell. Whole floats drop their fractional part so that
/// identifiers and years read back as integers.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn workbook(headers: &[&str], rows: &[&[f64]]) -> Vec<u8> {
        let mut book = Workbook::new();
        let sheet = book.add_worksheet();
        for (c, h) in headers.iter().enumerate() {
            sheet.write_string(0, c as u16, *h).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                sheet.write_number(r as u32 + 1, c as u16, *v).unwrap();
            }
        }
        book.save_to_buffer().unwrap()
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Float(2023.0)), "2023");
        assert_eq!(cell_text(&Data::Float(12.5)), "12.5");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::String(" Jan ".into())), "Jan");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    #[test]
    fn test_keeps_wanted_columns_in_order() {
        let bytes = workbook(
            &["Number of Items", "Extra", "Chemist", "Year", "Month", "Practice"],
            &[&[120.0, 1.0, 7.0, 2023.0, 1.0, 501.0]],
        );
        let sheet = read_first_sheet(bytes, "test.xlsx").unwrap().unwrap();
        assert_eq!(sheet.columns, COLUMNS_TO_KEEP.to_vec());
        assert_eq!(sheet.rows, vec![vec!["501", "7", "2023", "1", "120"]]);
    }

    #[test]
    fn test_partial_columns() {
        let bytes = workbook(&["Chemist", "Year"], &[&[7.0, 2023.0]]);
        let sheet = read_first_sheet(bytes, "partial.xlsx").unwrap().unwrap();
        assert_eq!(sheet.columns, vec![COL_CHEMIST, COL_YEAR]);
        assert_eq!(sheet.value(0, COL_YEAR), "2023");
        assert_eq!(sheet.value(0, COL_ITEMS), "");
    }

    #[test]
    fn test_skips_sheet_without_wanted_columns() {
        let bytes = workbook(&["Foo", "Bar"], &[&[1.0, 2.0]]);
        assert!(read_first_sheet(bytes, "other.xlsx").unwrap().is_none());
    }

    #[test]
    fn test_rejects_non_workbook() {
        assert!(read_first_sheet(b"not a workbook".to_vec(), "bad.xlsx").is_err());
    }
}
