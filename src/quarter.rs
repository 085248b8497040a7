use std::collections::BTreeMap;

use tracing::debug;

use crate::models::{MonthBucket, QuarterSummary, SubmissionRecord};
use crate::normalize::normalize;
use crate::period::Quarter;

/// The authoritative submission for `year`/`month`: the one with the latest
/// timestamp. On equal timestamps the later entry in `records` wins; records
/// without a readable timestamp lose to any that have one.
///
/// Records that carry no year are trusted to be scoped by the caller.
pub fn latest_for_month(
    records: &[SubmissionRecord],
    year: i32,
    month: u32,
) -> Option<&SubmissionRecord> {
    records
        .iter()
        .filter(|record| record.period_month == month)
        .filter(|record| record.period_year.map_or(true, |y| y == year))
        .fold(None, |best: Option<&SubmissionRecord>, record| match best {
            Some(current) if record.timestamp < current.timestamp => Some(current),
            _ => Some(record),
        })
}

/// Buckets submissions already scoped to one branch into the months of
/// `quarter`. Averages are left empty; see [`crate::aggregate::aggregate`].
pub fn assemble_quarter(
    branch_code: &str,
    records: &[SubmissionRecord],
    year: i32,
    quarter: Quarter,
) -> QuarterSummary {
    let mut months = BTreeMap::new();

    for month in quarter.months() {
        let Some(record) = latest_for_month(records, year, month) else {
            debug!(branch_code, year, month, "no submission for month");
            continue;
        };
        let normalized = normalize(record);
        months.insert(
            month,
            MonthBucket {
                month,
                total: record.total,
                timestamp: record.timestamp,
                items: normalized.items,
                observations: normalized.observations,
            },
        );
    }

    let complete = quarter.months().iter().all(|month| months.contains_key(month));

    QuarterSummary {
        branch_code: branch_code.to_string(),
        year,
        quarter,
        months,
        complete,
        quarterly_average_total: None,
        per_item_quarterly_average: BTreeMap::new(),
    }
}
