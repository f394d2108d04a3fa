//! Flattening of a [`Report`] into header + cells, the one shape every
//! renderer and the download hand-off work from.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::report::types::{EntityReport, Report, SideValues};

pub const MISSING_MARKER: &str = "N/A";
pub const SEPARATOR_HEADER: &str = " ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Number(f64),
    /// No data for this side of a comparison.
    Missing,
    /// Visual spacer between the two chemists' columns.
    Blank,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Integer(n) => write!(f, "{n}"),
            Cell::Number(x) if x.fract() == 0.0 => write!(f, "{x:.0}"),
            Cell::Number(x) => write!(f, "{x}"),
            Cell::Missing => f.write_str(MISSING_MARKER),
            Cell::Blank => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ReportTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<&Report> for ReportTable {
    fn from(report: &Report) -> Self {
        match report {
            Report::Single(single) => single_table(report.title(), single),
            Report::Comparison(cmp) => {
                let rolling = cmp.first.rolling_window.is_some();
                let first = &cmp.first.chemist.id;
                let second = &cmp.second.chemist.id;

                let mut headers = vec!["Year".to_string(), "Month".to_string()];
                headers.extend(side_headers(first.as_str(), rolling));
                headers.push(SEPARATOR_HEADER.to_string());
                headers.extend(side_headers(second.as_str(), rolling));

                let rows = cmp
                    .rows
                    .iter()
                    .map(|row| {
                        let mut cells = vec![
                            Cell::Integer(row.period.year.into()),
                            Cell::Text(row.period.month.name().to_string()),
                        ];
                        cells.extend(side_cells(row.first.as_ref(), rolling));
                        cells.push(Cell::Blank);
                        cells.extend(side_cells(row.second.as_ref(), rolling));
                        cells
                    })
                    .collect();

                ReportTable {
                    title: report.title(),
                    headers,
                    rows,
                }
            }
        }
    }
}

fn single_table(title: String, report: &EntityReport) -> ReportTable {
    let rolling = report.rolling_window.is_some();

    let mut headers: Vec<String> = ["Chemist", "Name", "Year", "Month", "Total Items"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    if rolling {
        headers.push("Rolling 12m Avg Items".to_string());
    }

    let rows = report
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                Cell::Text(row.chemist.to_string()),
                Cell::Text(report.chemist.name.clone()),
                Cell::Integer(row.period.year.into()),
                Cell::Text(row.period.month.name().to_string()),
                Cell::Number(row.total_items),
            ];
            if rolling {
                cells.push(row.rolling_avg.map_or(Cell::Missing, Cell::Integer));
            }
            cells
        })
        .collect();

    ReportTable { title, headers, rows }
}

fn side_headers(id: &str, rolling: bool) -> Vec<String> {
    let mut headers = vec![format!("Items C{id}")];
    if rolling {
        headers.push(format!("Rolling Avg C{id}"));
    }
    headers
}

fn side_cells(values: Option<&SideValues>, rolling: bool) -> Vec<Cell> {
    let mut cells = vec![values.map_or(Cell::Missing, |v| Cell::Number(v.total_items))];
    if rolling {
        cells.push(
            values
                .and_then(|v| v.rolling_avg)
                .map_or(Cell::Missing, Cell::Integer),
        );
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::ChemistDirectory;
    use crate::records::{Dataset, EntityId};
    use crate::report::compare::build_report;
    use crate::report::types::{AggregateOptions, PeriodFilter};
    use crate::source::Table;

    fn report(first: &str, second: Option<&str>, options: AggregateOptions) -> Report {
        let data = Dataset::from_table(
            &Table::from_csv_str(
                "Chemist,Year,Month,Number of Items\n\
                 7,2023,1,10\n\
                 7,2023,2,20.5\n\
                 9,2023,2,4\n",
            )
            .unwrap(),
        )
        .unwrap();
        let details = ChemistDirectory::from_table(
            &Table::from_csv_str("Chemist ID,Name\n7,Corner Pharmacy\n9,Main St\n").unwrap(),
        )
        .unwrap();
        let second = second.map(|s| EntityId::parse(s).unwrap());
        build_report(
            &data,
            &details,
            &EntityId::parse(first).unwrap(),
            second.as_ref(),
            &PeriodFilter::default(),
            &options,
        )
    }

    #[test]
    fn test_single_table_layout() {
        let table = ReportTable::from(&report("7", None, AggregateOptions::default()));
        assert_eq!(table.title, "7 (Corner Pharmacy)");
        assert_eq!(
            table.headers,
            vec!["Chemist", "Name", "Year", "Month", "Total Items", "Rolling 12m Avg Items"]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][3], Cell::Text("January".into()));
        assert_eq!(table.rows[1][4].to_string(), "20.5");
        assert_eq!(table.rows[1][5], Cell::Integer(15));
    }

    #[test]
    fn test_single_table_without_rolling() {
        let table = ReportTable::from(&report("7", None, AggregateOptions { rolling_window: None }));
        assert_eq!(table.headers.len(), 5);
        assert!(table.rows.iter().all(|r| r.len() == 5));
    }

    #[test]
    fn test_comparison_table_marks_missing() {
        let table = ReportTable::from(&report("7", Some("9"), AggregateOptions::default()));
        assert_eq!(
            table.headers,
            vec!["Year", "Month", "Items C7", "Rolling Avg C7", " ", "Items C9", "Rolling Avg C9"]
        );
        // February first, then January where chemist 9 has nothing
        let january = &table.rows[1];
        assert_eq!(january[1], Cell::Text("January".into()));
        assert_eq!(january[2].to_string(), "10");
        assert_eq!(january[4], Cell::Blank);
        assert_eq!(january[5], Cell::Missing);
        assert_eq!(january[6].to_string(), MISSING_MARKER);
    }
}
