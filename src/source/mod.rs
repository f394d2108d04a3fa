//! Source loading: locate a tabular file on disk or in an object store,
//! decode it with the first encoding that works and parse it as CSV.
//!
//! Failures are explicit ([`LoadError`]) so callers can tell "could not
//! read the data" apart from "the data had no rows for this selection".

pub mod blob;
pub mod decode;
pub mod table;

pub use blob::BlobStore;
pub use decode::{DEFAULT_ENCODINGS, Encoding};
pub use table::Table;

use flate2::read::GzDecoder;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::LoadError;

const BLOB_SCHEME: &str = "s3://";

/// Where a dataset lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLocation {
    Local(PathBuf),
    Blob { bucket: String, key: String },
}

impl DataLocation {
    pub fn is_gzip(&self) -> bool {
        match self {
            DataLocation::Local(path) => path.extension().is_some_and(|ext| ext == "gz"),
            DataLocation::Blob { key, .. } => key.ends_with(".gz"),
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            DataLocation::Local(path) => Some(path),
            DataLocation::Blob { .. } => None,
        }
    }
}

impl FromStr for DataLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix(BLOB_SCHEME) else {
            return Ok(DataLocation::Local(PathBuf::from(s)));
        };
        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(DataLocation::Blob {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            _ => Err(format!("expected {BLOB_SCHEME}<bucket>/<object>, got '{s}'")),
        }
    }
}

impl fmt::Display for DataLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLocation::Local(path) => write!(f, "{}", path.display()),
            DataLocation::Blob { bucket, key } => write!(f, "{BLOB_SCHEME}{bucket}/{key}"),
        }
    }
}

/// Reads [`DataLocation`]s into [`Table`]s.
#[derive(Clone)]
pub struct SourceLoader {
    blobs: Option<Arc<dyn BlobStore>>,
    encodings: Vec<Encoding>,
}

impl SourceLoader {
    pub fn new(encodings: Vec<Encoding>) -> Self {
        Self {
            blobs: None,
            encodings,
        }
    }

    pub fn with_blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(store);
        self
    }

    #[tracing::instrument(skip(self), fields(location = %location))]
    pub async fn load(&self, location: &DataLocation, description: &str) -> Result<Table, LoadError> {
        info!("Loading {description}");
        let raw = self.read_bytes(location, description).await?;

        let bytes = if location.is_gzip() {
            gunzip(&raw).map_err(|e| {
                warn!(error = %e, "Gzip decompression failed");
                LoadError::DecodeFailure {
                    description: description.to_string(),
                    location: location.to_string(),
                    tried: vec!["gzip".to_string()],
                }
            })?
        } else {
            raw
        };

        parse_with_encodings(&bytes, &self.encodings, description, &location.to_string())
    }

    async fn read_bytes(&self, location: &DataLocation, description: &str) -> Result<Vec<u8>, LoadError> {
        let not_found = || LoadError::NotFound {
            description: description.to_string(),
            location: location.to_string(),
        };

        match location {
            DataLocation::Local(path) => match tokio::fs::read(path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
                Err(e) => Err(LoadError::Storage {
                    description: description.to_string(),
                    location: location.to_string(),
                    source: Box::new(e),
                }),
            },
            DataLocation::Blob { bucket, key } => {
                let Some(store) = &self.blobs else {
                    return Err(LoadError::Storage {
                        description: description.to_string(),
                        location: location.to_string(),
                        source: "no object store configured".into(),
                    });
                };
                match store.get(bucket, key).await {
                    Ok(Some(body)) => {
                        debug!(bytes = body.len(), "Object downloaded");
                        Ok(body.to_vec())
                    }
                    Ok(None) => Err(not_found()),
                    Err(source) => Err(LoadError::Storage {
                        description: description.to_string(),
                        location: location.to_string(),
                        source,
                    }),
                }
            }
        }
    }
}

/// Tries each encoding in order; the first one that both decodes and parses
/// wins. A successful parse with zero rows is [`LoadError::EmptyData`].
pub fn parse_with_encodings(
    bytes: &[u8],
    encodings: &[Encoding],
    description: &str,
    location: &str,
) -> Result<Table, LoadError> {
    let mut parse_error = None;
    for &encoding in encodings {
        debug!(%encoding, "Trying to read {description}");

        let Some(text) = encoding.decode(bytes) else {
            warn!(%encoding, "Failed to decode {description}");
            continue;
        };

        match Table::from_csv_str(&text) {
            Ok(table) if table.is_empty() => {
                warn!(%encoding, "{description} file is empty");
                return Err(LoadError::EmptyData {
                    description: description.to_string(),
                    location: location.to_string(),
                });
            }
            Ok(table) => {
                info!(%encoding, rows = table.len(), columns = table.headers().len(), "Loaded {description}");
                return Ok(table);
            }
            Err(e) => {
                warn!(%encoding, error = %e, "Failed to parse {description}");
                parse_error = Some(e);
            }
        }
    }

    // The text decoded but never parsed: a format problem, not an encoding one.
    if let Some(e) = parse_error {
        return Err(LoadError::Malformed {
            description: description.to_string(),
            location: location.to_string(),
            reason: e.to_string(),
        });
    }

    Err(LoadError::DecodeFailure {
        description: description.to_string(),
        location: location.to_string(),
        tried: encodings.iter().map(|e| e.label().to_string()).collect(),
    })
}

fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}
