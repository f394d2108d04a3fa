//! Dispensing aggregation and chemist comparison.
//!
//! Rows for a chemist are grouped per (year, month), summed, sorted
//! chronologically and given a trailing 12-period average. Two chemists
//! can be laid side by side on the union of their periods.

pub mod aggregate;
pub mod compare;
pub mod rolling;
pub mod table;
pub mod types;

pub use aggregate::{ROLLING_WINDOW, aggregate_entity, report_entity};
pub use compare::{build_report, compare};
pub use table::{Cell, ReportTable};
pub use types::{
    AggregateOptions, ComparisonReport, ComparisonRow, DataQuality, EntityReport, MonthlyAggregate, Period,
    PeriodFilter, Report, SideValues,
};
