use csv::StringRecord;

use crate::error::LoadError;

/// A header row plus string records, straight out of the CSV reader.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl Table {
    /// Parses delimited text with a header row. Rows may be shorter or
    /// longer than the header; absent fields read as missing.
    pub fn from_csv_str(text: &str) -> csv::Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let rows = rdr.records().collect::<csv::Result<Vec<_>>>()?;

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Resolves every named column or reports all of the missing ones at once.
    pub fn require(&self, description: &str, names: &[&str]) -> Result<Vec<usize>, LoadError> {
        let mut found = Vec::with_capacity(names.len());
        let mut missing = Vec::new();

        for name in names {
            match self.column(name) {
                Some(idx) => found.push(idx),
                None => missing.push(name.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(found)
        } else {
            Err(LoadError::SchemaMismatch {
                description: description.to_string(),
                missing,
            })
        }
    }
}
