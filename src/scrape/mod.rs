//! Collects the monthly dispensing workbooks published on the statistics
//! site and merges them into the single CSV the report reads.
//!
//! Steps: fetch the listing page, pick out workbook links, download them
//! with bounded concurrency, keep the wanted columns of each first sheet,
//! then write everything in link order to one file.

pub mod links;
pub mod workbook;

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, info, warn};
use url::Url;

use crate::fetch::{HttpClient, fetch_bytes, fetch_text};
pub use links::{file_name, find_xlsx_links};
pub use workbook::{COLUMNS_TO_KEEP, SheetData, read_first_sheet};

pub const DEFAULT_BASE_URL: &str = "https://bso.hscni.net/directorates/operations/family-practitioner-services/directorates-operations-family-practitioner-services-information-unit/general-pharmaceutical-services-and-prescribing-statistics/dispensing-by-contractor/";

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const OUTPUT_FILENAME: &str = "merged_bso_dispensing_data.csv";

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeSummary {
    pub links_found: usize,
    pub downloaded: usize,
    pub merged_files: usize,
    pub rows: usize,
}

/// Scrapes `base_url` and writes the merged CSV to `output`.
///
/// Individual download or read failures are logged and skipped. The run
/// fails only when no links are found or nothing could be merged.
#[tracing::instrument(skip(client, base_url, output), fields(base_url = %base_url, output = %output.display()))]
pub async fn scrape<C>(
    client: Arc<C>,
    base_url: &Url,
    output: &Path,
    concurrency: usize,
) -> Result<ScrapeSummary>
where
    C: HttpClient + 'static,
{
    let page = fetch_text(client.as_ref(), base_url.as_str())
        .await
        .with_context(|| format!("could not fetch listing page {base_url}"))?;

    let links = find_xlsx_links(&page, base_url)?;
    if links.is_empty() {
        bail!("no workbook links found on {base_url}");
    }
    info!(count = links.len(), "Workbook links found");

    let mut summary = ScrapeSummary {
        links_found: links.len(),
        ..Default::default()
    };

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::with_capacity(links.len());

    for link in links {
        let sem = semaphore.clone();
        let client = client.clone();
        let name = file_name(&link);
        let span = tracing::info_span!("download", file = %name);

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire_owned().await.ok()?;
                match fetch_bytes(client.as_ref(), link.as_str()).await {
                    Ok(bytes) => {
                        debug!(bytes = bytes.len(), "Downloaded");
                        Some((name, bytes))
                    }
                    Err(e) => {
                        error!(url = %link, error = %e, "Download failed, skipping");
                        None
                    }
                }
            }
            .instrument(span),
        );
        tasks.push(task);
    }

    // Awaited in link order so the merged file keeps page order.
    let mut sheets: Vec<SheetData> = Vec::new();
    for task in tasks {
        let Some((name, bytes)) = task.await.context("download task panicked")? else {
            continue;
        };
        summary.downloaded += 1;

        match read_first_sheet(bytes, &name) {
            Ok(Some(sheet)) => {
                info!(file = %name, rows = sheet.rows.len(), columns = ?sheet.columns, "Workbook added to merge");
                sheets.push(sheet);
            }
            Ok(None) => {}
            Err(e) => warn!(file = %name, error = %e, "Could not read workbook, skipping"),
        }
    }

    if summary.downloaded == 0 {
        bail!("no workbooks could be downloaded");
    }
    if sheets.is_empty() {
        bail!("no workbook contained usable data");
    }

    summary.merged_files = sheets.len();
    summary.rows = write_merged(output, &sheets)?;

    info!(
        files = summary.merged_files,
        rows = summary.rows,
        output = %output.display(),
        "Merged dispensing data written"
    );
    Ok(summary)
}

/// Writes every sheet under one header: the kept columns seen in any sheet.
/// Cells for columns a sheet lacks are left empty. Returns the row count.
pub fn write_merged(output: &Path, sheets: &[SheetData]) -> Result<usize> {
    let columns: Vec<&str> = COLUMNS_TO_KEEP
        .iter()
        .copied()
        .filter(|c| sheets.iter().any(|s| s.columns.contains(c)))
        .collect();

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("could not create {}", output.display()))?;
    writer.write_record(&columns)?;

    let mut rows = 0;
    for sheet in sheets {
        for i in 0..sheet.rows.len() {
            writer.write_record(columns.iter().map(|c| sheet.value(i, c)))?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_xlsxwriter::Workbook;
    use std::collections::HashMap;

    struct SiteStub {
        pages: HashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl HttpClient for SiteStub {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let resp = match self.pages.get(req.url().as_str()) {
                Some(body) => http::Response::new(body.clone()),
                None => http::Response::builder()
                    .status(404)
                    .body(Vec::new())
                    .unwrap(),
            };
            Ok(resp.into())
        }
    }

    fn sheet(headers: &[&str], rows: &[&[f64]]) -> Vec<u8> {
        let mut book = Workbook::new();
        let ws = book.add_worksheet();
        for (c, h) in headers.iter().enumerate() {
            ws.write_string(0, c as u16, *h).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                ws.write_number(r as u32 + 1, c as u16, *v).unwrap();
            }
        }
        book.save_to_buffer().unwrap()
    }

    const BASE: &str = "https://bso.hscni.net/dispensing/";

    fn site() -> SiteStub {
        let page = r#"
            <a href="/wp-content/uploads/jan.xlsx">Jan</a>
            <a href="/wp-content/uploads/feb.xlsx">Feb</a>
            <a href="/wp-content/uploads/missing.xlsx">Gone</a>
        "#;
        let mut pages = HashMap::new();
        pages.insert(BASE.to_string(), page.as_bytes().to_vec());
        pages.insert(
            "https://bso.hscni.net/wp-content/uploads/jan.xlsx".to_string(),
            sheet(
                &["Practice", "Chemist", "Year", "Month", "Number of Items"],
                &[&[501.0, 7.0, 2023.0, 1.0, 120.0], &[502.0, 9.0, 2023.0, 1.0, 80.0]],
            ),
        );
        pages.insert(
            "https://bso.hscni.net/wp-content/uploads/feb.xlsx".to_string(),
            sheet(&["Chemist", "Year", "Month", "Number of Items"], &[&[7.0, 2023.0, 2.0, 95.5]]),
        );
        SiteStub { pages }
    }

    #[tokio::test]
    async fn test_scrape_merges_and_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join(OUTPUT_FILENAME);
        let base = Url::parse(BASE).unwrap();

        let summary = scrape(Arc::new(site()), &base, &output, 2).await.unwrap();
        assert_eq!(
            summary,
            ScrapeSummary {
                links_found: 3,
                downloaded: 2,
                merged_files: 2,
                rows: 3,
            }
        );

        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(
            written,
            "Practice,Chemist,Year,Month,Number of Items\n\
             501,7,2023,1,120\n\
             502,9,2023,1,80\n\
             ,7,2023,2,95.5\n"
        );
    }

    #[tokio::test]
    async fn test_scrape_without_links_fails() {
        let mut pages = HashMap::new();
        pages.insert(BASE.to_string(), b"<p>nothing here</p>".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let base = Url::parse(BASE).unwrap();

        let err = scrape(Arc::new(SiteStub { pages }), &base, &dir.path().join("x.csv"), 4)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no workbook links"));
    }

    #[test]
    fn test_write_merged_uses_union_of_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.csv");
        let sheets = vec![SheetData {
            columns: vec!["Chemist", "Year"],
            rows: vec![vec!["7".into(), "2023".into()]],
        }];
        assert_eq!(write_merged(&path, &sheets).unwrap(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Chemist,Year\n7,2023\n");
    }
}
