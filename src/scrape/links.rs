use anyhow::{Result, anyhow};
use scraper::{Html, Selector};
use url::Url;

/// Path fragment the statistics site serves its uploaded workbooks from.
const UPLOADS_MARKER: &str = "wp-content/uploads/";

/// Collects absolute `.xlsx` links from a page, in page order, without
/// duplicates. Only links into the site's upload area or naming the site's
/// host are kept.
pub fn find_xlsx_links(html: &str, base: &Url) -> Result<Vec<Url>> {
    let selector = Selector::parse("a[href]").map_err(|e| anyhow!("invalid link selector: {e:?}"))?;
    let host = base.host_str().unwrap_or_default();

    let mut links: Vec<Url> = Vec::new();
    for href in Html::parse_document(html)
        .select(&selector)
        .filter_map(|e| e.value().attr("href"))
    {
        let href = href.trim();
        if !href.ends_with(".xlsx") {
            continue;
        }
        if !href.contains(UPLOADS_MARKER) && (host.is_empty() || !href.contains(host)) {
            continue;
        }
        let Ok(url) = base.join(href) else {
            continue;
        };
        if !links.contains(&url) {
            links.push(url);
        }
    }

    Ok(links)
}

/// Last path segment of the link, always ending in `.xlsx`.
pub fn file_name(url: &Url) -> String {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("download");
    if name.to_ascii_lowercase().ends_with(".xlsx") {
        name.to_string()
    } else {
        format!("{name}.xlsx")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <a href="/wp-content/uploads/2024/01/Dispensing-Jan-2024.xlsx">Jan</a>
          <a href="https://bso.hscni.net/wp-content/uploads/2024/02/Dispensing-Feb-2024.xlsx">Feb</a>
          <a href="/wp-content/uploads/2024/01/Dispensing-Jan-2024.xlsx">Jan again</a>
          <a href="https://elsewhere.example/file.xlsx">Other site</a>
          <a href="/wp-content/uploads/2024/01/notes.pdf">PDF</a>
          <a>No href</a>
        </body></html>
    "#;

    #[test]
    fn test_finds_and_dedupes_links() {
        let base = Url::parse("https://bso.hscni.net/directorates/dispensing-by-contractor/").unwrap();
        let links = find_xlsx_links(PAGE, &base).unwrap();
        let links: Vec<_> = links.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://bso.hscni.net/wp-content/uploads/2024/01/Dispensing-Jan-2024.xlsx",
                "https://bso.hscni.net/wp-content/uploads/2024/02/Dispensing-Feb-2024.xlsx",
            ]
        );
    }

    #[test]
    fn test_file_name() {
        let url = Url::parse("https://x.test/a/b/Data.xlsx?ver=2").unwrap();
        assert_eq!(file_name(&url), "Data.xlsx");
        let url = Url::parse("https://x.test/a/export").unwrap();
        assert_eq!(file_name(&url), "export.xlsx");
    }
}
