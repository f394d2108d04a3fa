use crate::report::ReportTable;

const TABLE_CLASSES: &str = "data-table table table-striped table-hover";

/// Renders a `<table>` fragment ready to drop into a results page.
pub fn render_html(table: &ReportTable) -> String {
    let mut out = format!("<table class=\"{TABLE_CLASSES}\">\n  <thead>\n    <tr>");
    for header in &table.headers {
        out.push_str(&format!("<th>{}</th>", escape(header)));
    }
    out.push_str("</tr>\n  </thead>\n  <tbody>\n");

    for row in &table.rows {
        out.push_str("    <tr>");
        for cell in row {
            out.push_str(&format!("<td>{}</td>", escape(&cell.to_string())));
        }
        out.push_str("</tr>\n");
    }

    out.push_str("  </tbody>\n</table>\n");
    out
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
