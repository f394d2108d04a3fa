//! Chemist reference data: names and addresses for display and lookup.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::records::EntityId;
use crate::source::Table;

pub const DETAILS_DESCRIPTION: &str = "Chemist Details";

pub const COL_ID: &str = "Chemist ID";
pub const COL_NAME: &str = "Name";
pub const COL_ADDRESS: &str = "Full Address";
pub const COL_POSTCODE: &str = "Postcode";

pub const UNKNOWN_NAME: &str = "Name not found";
pub const UNKNOWN_ADDRESS: &str = "Address not found";

/// Maximum number of matches returned by [`ChemistDirectory::search`].
pub const SEARCH_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDetail {
    #[serde(rename = "Chemist ID")]
    pub id: EntityId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Full Address", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "Postcode", skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
}

impl EntityDetail {
    /// `"<id> - <name> - <address> - <postcode>"`, skipping empty parts.
    pub fn display_text(&self) -> String {
        let mut parts = vec![self.id.to_string()];
        if !self.name.is_empty() {
            parts.push(self.name.clone());
        }
        parts.extend(self.address.iter().cloned());
        parts.extend(self.postcode.iter().cloned());
        parts.join(" - ")
    }
}

/// Result of resolving an identifier; placeholders when it is unknown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedChemist {
    pub id: EntityId,
    pub name: String,
    pub address: String,
    pub known: bool,
}

impl ResolvedChemist {
    pub fn unknown(id: &EntityId) -> Self {
        Self {
            id: id.clone(),
            name: UNKNOWN_NAME.to_string(),
            address: UNKNOWN_ADDRESS.to_string(),
            known: false,
        }
    }
}

/// Reference table keyed by chemist identifier, sorted ascending.
#[derive(Debug, Clone, Default)]
pub struct ChemistDirectory {
    entries: Vec<EntityDetail>,
}

impl ChemistDirectory {
    pub fn new(mut entries: Vec<EntityDetail>) -> Self {
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Self { entries }
    }

    pub fn from_table(table: &Table) -> Result<Self, LoadError> {
        let cols = table.require(DETAILS_DESCRIPTION, &[COL_ID, COL_NAME])?;
        let (id_idx, name_idx) = (cols[0], cols[1]);
        let address_idx = table.column(COL_ADDRESS);
        let postcode_idx = table.column(COL_POSTCODE);

        let optional = |row: &csv::StringRecord, idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut entries = Vec::with_capacity(table.len());
        for row in table.rows() {
            let raw_id = row.get(id_idx).unwrap_or("");
            let Some(id) = EntityId::parse(raw_id) else {
                warn!(raw_id, "Skipping chemist with invalid identifier");
                continue;
            };
            entries.push(EntityDetail {
                id,
                name: row.get(name_idx).unwrap_or("").trim().to_string(),
                address: optional(row, address_idx),
                postcode: optional(row, postcode_idx),
            });
        }

        debug!(entries = entries.len(), "Chemist details loaded");
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[EntityDetail] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &EntityId) -> Option<&EntityDetail> {
        self.entries
            .binary_search_by(|e| e.id.cmp(id))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Never fails: an unknown identifier resolves to placeholders.
    pub fn resolve(&self, id: &EntityId) -> ResolvedChemist {
        match self.get(id) {
            Some(detail) => ResolvedChemist {
                id: id.clone(),
                name: if detail.name.is_empty() {
                    UNKNOWN_NAME.to_string()
                } else {
                    detail.name.clone()
                },
                address: detail
                    .address
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string()),
                known: true,
            },
            None => {
                debug!(chemist = %id, "Chemist not in reference data");
                ResolvedChemist::unknown(id)
            }
        }
    }

    /// Case-insensitive substring match over identifier, name and address.
    /// At most `limit` entries, identifier ascending. An empty query matches
    /// everything.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&EntityDetail> {
        let needle = query.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|e| {
                needle.is_empty()
                    || e.id.as_str().to_lowercase().contains(&needle)
                    || e.name.to_lowercase().contains(&needle)
                    || e
                        .address
                        .as_deref()
                        .is_some_and(|a| a.to_lowercase().contains(&needle))
            })
            .take(limit)
            .collect()
    }
}
