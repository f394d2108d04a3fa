//! Typed rows of the merged dispensing dataset.
//!
//! Each column has its own parse function with a fixed failure mode; see
//! [`Dataset::from_table`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::months::Month;
use crate::source::Table;

pub const DISPENSING_DESCRIPTION: &str = "Dispensing Data";

pub const COL_CHEMIST: &str = "Chemist";
pub const COL_PRACTICE: &str = "Practice";
pub const COL_YEAR: &str = "Year";
pub const COL_MONTH: &str = "Month";
pub const COL_ITEMS: &str = "Number of Items";

pub const REQUIRED_COLUMNS: [&str; 4] = [COL_CHEMIST, COL_YEAR, COL_MONTH, COL_ITEMS];

/// Chemist identifier, compared as a canonical string.
///
/// Integral numbers are rendered without a fractional part so that `7`,
/// `"7"`, `"007"` and `7.0` from different spreadsheets all compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    pub fn parse(raw: &str) -> Option<EntityId> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(n) = raw.parse::<u64>() {
            return Some(EntityId(n.to_string()));
        }
        if let Ok(f) = raw.parse::<f64>() {
            // u64::MAX as f64 is 2^64, so `<` keeps the cast exact.
            if f.is_finite() && f.fract() == 0.0 && f >= 0.0 && f < u64::MAX as f64 {
                return Some(EntityId(format!("{}", f as u64)));
            }
            if !f.is_finite() {
                return None;
            }
        }
        Some(EntityId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value when the identifier is a plain integer.
    pub fn number(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Numeric identifiers sort numerically and before non-numeric ones.
impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.number(), other.number()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

pub fn parse_year(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(y) = raw.parse::<u32>() {
        return (y > 0).then_some(y);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f >= 1.0 && f <= u32::MAX as f64).then_some(f as u32)
}

pub fn parse_items(raw: &str) -> Option<f64> {
    let f = raw.trim().replace(',', "").parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0).then_some(f)
}

/// One source row. `year` and `month` stay optional here so the aggregator
/// can count how many rows of the selected chemist it had to drop.
#[derive(Debug, Clone, PartialEq)]
pub struct DispensingRecord {
    pub chemist: EntityId,
    pub practice: Option<String>,
    pub year: Option<u32>,
    pub month: Option<Month>,
    pub items: f64,
    /// Item count was present but not a non-negative number; counted as 0.
    pub items_invalid: bool,
}

/// The dispensing rows of one request.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<DispensingRecord>,
    /// Rows without a usable chemist identifier.
    pub dropped_without_chemist: usize,
}

impl Dataset {
    /// Types every row of `table`; fails only if a required column is absent.
    pub fn from_table(table: &Table) -> Result<Dataset, LoadError> {
        let cols = table.require(DISPENSING_DESCRIPTION, &REQUIRED_COLUMNS)?;
        let (chemist_idx, year_idx, month_idx, items_idx) = (cols[0], cols[1], cols[2], cols[3]);
        let practice_idx = table.column(COL_PRACTICE);

        let mut records = Vec::with_capacity(table.len());
        let mut dropped = 0;

        for row in table.rows() {
            let field = |idx: usize| row.get(idx).unwrap_or("");

            let Some(chemist) = EntityId::parse(field(chemist_idx)) else {
                dropped += 1;
                continue;
            };

            let raw_items = field(items_idx);
            let items = parse_items(raw_items);

            records.push(DispensingRecord {
                chemist,
                practice: practice_idx
                    .map(|idx| field(idx).trim().to_string())
                    .filter(|p| !p.is_empty()),
                year: parse_year(field(year_idx)),
                month: Month::normalize(field(month_idx)),
                items: items.unwrap_or(0.0),
                items_invalid: items.is_none() && !raw_items.trim().is_empty(),
            });
        }

        if dropped > 0 {
            warn!(dropped, "Rows without a chemist identifier dropped");
        }
        debug!(rows = records.len(), "Dispensing rows typed");

        Ok(Dataset {
            records,
            dropped_without_chemist: dropped,
        })
    }

    pub fn records(&self) -> &[DispensingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct valid years, most recent first.
    pub fn years(&self) -> Vec<u32> {
        let set: BTreeSet<_> = self.records.iter().filter_map(|r| r.year).collect();
        set.into_iter().rev().collect()
    }

    /// Distinct normalized months, calendar order.
    pub fn months(&self) -> Vec<Month> {
        let set: BTreeSet<_> = self.records.iter().filter_map(|r| r.month).collect();
        set.into_iter().collect()
    }
}
