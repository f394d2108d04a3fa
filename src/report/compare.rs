use std::collections::BTreeMap;
use tracing::info;

use crate::details::ChemistDirectory;
use crate::records::{Dataset, EntityId};
use crate::report::aggregate::report_entity;
use crate::report::types::{
    AggregateOptions, ComparisonReport, ComparisonRow, EntityReport, Period, PeriodFilter, Report, SideValues,
};

/// Outer-joins two chemists' aggregates on (year, month), most recent first.
///
/// Every period present on either side yields exactly one row; the absent
/// side is `None`.
pub fn compare(first: EntityReport, second: EntityReport) -> ComparisonReport {
    let mut joined: BTreeMap<Period, (Option<SideValues>, Option<SideValues>)> = BTreeMap::new();

    for row in &first.rows {
        joined.entry(row.period).or_default().0 = Some(row.into());
    }
    for row in &second.rows {
        joined.entry(row.period).or_default().1 = Some(row.into());
    }

    let rows = joined
        .into_iter()
        .rev()
        .map(|(period, (first, second))| ComparisonRow { period, first, second })
        .collect();

    ComparisonReport { first, second, rows }
}

/// Builds the report for one chemist, or a comparison when a second,
/// different chemist is given.
pub fn build_report(
    dataset: &Dataset,
    directory: &ChemistDirectory,
    first: &EntityId,
    second: Option<&EntityId>,
    filter: &PeriodFilter,
    options: &AggregateOptions,
) -> Report {
    let first_report = report_entity(dataset, directory, first, filter, options);

    let Some(second) = second.filter(|s| *s != first) else {
        return Report::Single(first_report);
    };

    let second_report = report_entity(dataset, directory, second, filter, options);
    for side in [&first_report, &second_report] {
        if side.is_empty() {
            info!(chemist = %side.chemist.id, "No dispensing data for chemist; its columns are marked as missing");
        }
    }

    let comparison = compare(first_report, second_report);
    info!(
        first = %first,
        second = %second,
        periods = comparison.rows.len(),
        "Comparison data generated"
    );
    Report::Comparison(comparison)
}
