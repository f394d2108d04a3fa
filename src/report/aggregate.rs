use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::details::ChemistDirectory;
use crate::records::{Dataset, EntityId};
use crate::report::rolling::{round_to_int, trailing_means};
use crate::report::types::{AggregateOptions, DataQuality, EntityReport, MonthlyAggregate, Period, PeriodFilter};

/// Number of chronologically preceding periods in the rolling average.
pub const ROLLING_WINDOW: usize = 12;

/// Sums the item counts of one chemist per (year, month).
///
/// Rows with an unusable year or month are left out and counted in the
/// returned [`DataQuality`]; they never abort the aggregation. The result is
/// chronological and, when `options.rolling_window` is set, carries the
/// trailing average of the totals.
pub fn aggregate_entity(
    dataset: &Dataset,
    chemist: &EntityId,
    filter: &PeriodFilter,
    options: &AggregateOptions,
) -> (Vec<MonthlyAggregate>, DataQuality) {
    let mut quality = DataQuality::default();
    let mut totals: BTreeMap<Period, f64> = BTreeMap::new();

    for record in dataset.records().iter().filter(|r| &r.chemist == chemist) {
        let Some(year) = record.year else {
            quality.invalid_year += 1;
            continue;
        };
        let Some(month) = record.month else {
            quality.invalid_month += 1;
            continue;
        };
        if !filter.matches_year(year) || !filter.matches_month(month) {
            continue;
        }
        if record.items_invalid {
            quality.invalid_items += 1;
        }

        *totals.entry(Period { year, month }).or_default() += record.items;
    }

    if !quality.is_clean() {
        warn!(
            chemist = %chemist,
            invalid_year = quality.invalid_year,
            invalid_month = quality.invalid_month,
            invalid_items = quality.invalid_items,
            "Data quality issues in dispensing rows"
        );
    }

    let sums: Vec<f64> = totals.values().copied().collect();
    let rolling = options.rolling_window.map(|w| trailing_means(&sums, w));

    let rows = totals
        .into_iter()
        .enumerate()
        .map(|(i, (period, total_items))| MonthlyAggregate {
            chemist: chemist.clone(),
            period,
            total_items,
            rolling_avg: rolling.as_ref().map(|r| round_to_int(r[i])),
        })
        .collect();

    (rows, quality)
}

/// [`aggregate_entity`] plus the chemist's display details.
#[tracing::instrument(skip(dataset, directory, options), fields(chemist = %chemist))]
pub fn report_entity(
    dataset: &Dataset,
    directory: &ChemistDirectory,
    chemist: &EntityId,
    filter: &PeriodFilter,
    options: &AggregateOptions,
) -> EntityReport {
    let (rows, quality) = aggregate_entity(dataset, chemist, filter, options);
    info!(periods = rows.len(), "Aggregated dispensing data");

    EntityReport {
        chemist: directory.resolve(chemist),
        rows,
        quality,
        rolling_window: options.rolling_window,
    }
}
