//! Output formatting and persistence for report tables.
//!
//! Supports a plain-text table for the terminal, an HTML table fragment,
//! CSV and an Excel workbook. All of them render a [`ReportTable`] as-is;
//! nothing is recomputed.

pub mod html;
pub mod xlsx;

pub use html::render_html;
pub use xlsx::{to_xlsx_bytes, write_xlsx};

use anyhow::Result;
use csv::WriterBuilder;
use std::fs::File;
use std::path::Path;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::debug;

use crate::report::ReportTable;

/// Renders the title line followed by a Markdown table.
pub fn render_text(table: &ReportTable) -> String {
    let mut builder = Builder::default();
    builder.push_record(table.headers.iter().cloned());
    for row in &table.rows {
        builder.push_record(row.iter().map(|c| c.to_string()));
    }

    let mut rendered = builder.build();
    rendered.with(Style::markdown());
    format!("{}\n{rendered}\n", table.title)
}

/// Writes the table as CSV with a header row and no index column.
pub fn write_csv(path: &Path, table: &ReportTable) -> Result<()> {
    debug!(path = %path.display(), rows = table.rows.len(), "Writing CSV");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().from_writer(file);

    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|c| c.to_string()))?;
    }
    writer.flush()?;

    Ok(())
}
