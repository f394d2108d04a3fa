use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::path::Path;
use tracing::debug;

use crate::report::table::MISSING_MARKER;
use crate::report::{Cell, ReportTable};

fn build_workbook(table: &ReportTable) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();

    for (col, header) in table.headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, &bold)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                Cell::Text(s) => {
                    sheet.write_string(r, c, s)?;
                }
                Cell::Integer(n) => {
                    sheet.write_number(r, c, *n as f64)?;
                }
                Cell::Number(x) => {
                    sheet.write_number(r, c, *x)?;
                }
                Cell::Missing => {
                    sheet.write_string(r, c, MISSING_MARKER)?;
                }
                Cell::Blank => {}
            }
        }
    }

    Ok(workbook)
}

/// Serializes the table to an in-memory `.xlsx` file.
pub fn to_xlsx_bytes(table: &ReportTable) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = build_workbook(table)?;
    let bytes = workbook.save_to_buffer()?;
    debug!(bytes = bytes.len(), rows = table.rows.len(), "Workbook built");
    Ok(bytes)
}

pub fn write_xlsx(path: &Path, table: &ReportTable) -> Result<(), XlsxError> {
    let mut workbook = build_workbook(table)?;
    workbook.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workbook_is_a_zip() {
        let table = ReportTable {
            title: "t".into(),
            headers: vec!["Year".into(), "Items C7".into(), " ".into()],
            rows: vec![vec![Cell::Integer(2023), Cell::Missing, Cell::Blank]],
        };
        let bytes = to_xlsx_bytes(&table).unwrap();
        // xlsx files are zip archives
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_cells_read_back_unchanged() {
        use calamine::{Data, Reader, Xlsx};
        use std::io::Cursor;

        let table = ReportTable {
            title: "7 (Corner) vs 9 (Main St)".into(),
            headers: ["Year", "Month", "Items C7", "Rolling Avg C7", " ", "Items C9", "Rolling Avg C9"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: vec![
                vec![
                    Cell::Integer(2023),
                    Cell::Text("March".into()),
                    Cell::Number(40.5),
                    Cell::Integer(70),
                    Cell::Blank,
                    Cell::Missing,
                    Cell::Missing,
                ],
                vec![
                    Cell::Integer(2023),
                    Cell::Text("February".into()),
                    Cell::Number(50.0),
                    Cell::Integer(85),
                    Cell::Blank,
                    Cell::Number(30.0),
                    Cell::Integer(25),
                ],
            ],
        };

        let bytes = to_xlsx_bytes(&table).unwrap();
        let mut book: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        let range = book.worksheet_range_at(0).unwrap().unwrap();
        let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();

        let header: Vec<Data> = table.headers.iter().map(|h| Data::String(h.clone())).collect();
        assert_eq!(rows[0], header);
        assert_eq!(
            rows[1],
            vec![
                Data::Float(2023.0),
                Data::String("March".into()),
                Data::Float(40.5),
                Data::Float(70.0),
                Data::Empty,
                Data::String(MISSING_MARKER.into()),
                Data::String(MISSING_MARKER.into()),
            ]
        );
        assert_eq!(
            rows[2],
            vec![
                Data::Float(2023.0),
                Data::String("February".into()),
                Data::Float(50.0),
                Data::Float(85.0),
                Data::Empty,
                Data::Float(30.0),
                Data::Float(25.0),
            ]
        );
        assert_eq!(rows.len(), 3);
    }
}
