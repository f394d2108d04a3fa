//! Data types produced by the aggregation pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::details::ResolvedChemist;
use crate::months::Month;
use crate::records::EntityId;

/// Label used in file names when no period filter is applied.
pub const ALL_DATA_LABEL: &str = "ALL_Data";

/// Optional year/month restriction applied to every chemist of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodFilter {
    pub year: Option<u32>,
    pub month: Option<Month>,
}

impl PeriodFilter {
    pub fn matches_year(&self, year: u32) -> bool {
        self.year.is_none_or(|y| y == year)
    }

    pub fn matches_month(&self, month: Month) -> bool {
        self.month.is_none_or(|m| m == month)
    }

    /// `ALL_Data`, `2023`, `January` or `2023_January`.
    pub fn label(&self) -> String {
        match (self.year, self.month) {
            (None, None) => ALL_DATA_LABEL.to_string(),
            (Some(y), None) => y.to_string(),
            (None, Some(m)) => m.name().to_string(),
            (Some(y), Some(m)) => format!("{y}_{}", m.name()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    /// Trailing window for the rolling average; `None` skips the column.
    pub rolling_window: Option<usize>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            rolling_window: Some(super::aggregate::ROLLING_WINDOW),
        }
    }
}

/// A (year, month) bucket. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: u32,
    pub month: Month,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month, self.year)
    }
}

/// Total items for one chemist in one period.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyAggregate {
    pub chemist: EntityId,
    pub period: Period,
    pub total_items: f64,
    pub rolling_avg: Option<i64>,
}

/// Rows of the selected chemist that could not be used as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataQuality {
    pub invalid_year: usize,
    pub invalid_month: usize,
    /// Kept with an item count of 0.
    pub invalid_items: usize,
}

impl DataQuality {
    pub fn dropped(&self) -> usize {
        self.invalid_year + self.invalid_month
    }

    pub fn is_clean(&self) -> bool {
        self.dropped() == 0 && self.invalid_items == 0
    }
}

/// Aggregation result for one chemist.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityReport {
    pub chemist: ResolvedChemist,
    /// Chronological (oldest first).
    pub rows: Vec<MonthlyAggregate>,
    pub quality: DataQuality,
    pub rolling_window: Option<usize>,
}

impl EntityReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_items(&self) -> f64 {
        self.rows.iter().map(|r| r.total_items).sum()
    }
}

/// One chemist's values in a comparison row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideValues {
    pub total_items: f64,
    pub rolling_avg: Option<i64>,
}

impl From<&MonthlyAggregate> for SideValues {
    fn from(row: &MonthlyAggregate) -> Self {
        Self {
            total_items: row.total_items,
            rolling_avg: row.rolling_avg,
        }
    }
}

/// A period and each side's values; `None` is the "no data" marker.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub period: Period,
    pub first: Option<SideValues>,
    pub second: Option<SideValues>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub first: EntityReport,
    pub second: EntityReport,
    /// Most recent first.
    pub rows: Vec<ComparisonRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Single(EntityReport),
    Comparison(ComparisonReport),
}

impl Report {
    pub fn is_empty(&self) -> bool {
        match self {
            Report::Single(r) => r.is_empty(),
            Report::Comparison(c) => c.rows.is_empty(),
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, Report::Comparison(_))
    }

    /// `7 (Corner Pharmacy)` or `7 (Corner Pharmacy) vs 9 (Main St Chemist)`.
    pub fn title(&self) -> String {
        let label = |c: &ResolvedChemist| format!("{} ({})", c.id, c.name);
        match self {
            Report::Single(r) => label(&r.chemist),
            Report::Comparison(c) => format!("{} vs {}", label(&c.first.chemist), label(&c.second.chemist)),
        }
    }

    pub fn download_filename(&self, filter: &PeriodFilter) -> String {
        let reference = filter.label().replace(' ', "_");
        match self {
            Report::Single(r) => format!("Chemist{}_FilteredData_{reference}.xlsx", r.chemist.id),
            Report::Comparison(c) => format!(
                "Compare_C{}_vs_C{}_{reference}.xlsx",
                c.first.chemist.id, c.second.chemist.id
            ),
        }
    }

    /// The per-chemist reports behind this view, in request order.
    pub fn entities(&self) -> Vec<&EntityReport> {
        match self {
            Report::Single(r) => vec![r],
            Report::Comparison(c) => vec![&c.first, &c.second],
        }
    }
}
