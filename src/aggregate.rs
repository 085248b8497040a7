//! Quarterly figures and the three-tier status scale.
//!
//! Two completeness gates apply: the overall average needs a bucket for
//! every month of the quarter, an item's average needs that item scored in
//! every month.

use std::fmt;

use crate::models::{ChecklistItemTemplate, QuarterSummary, SubmissionRecord};
use crate::period::Quarter;
use crate::quarter::assemble_quarter;
use crate::util::round2;

const RED_MAX: f64 = 4.0;
const YELLOW_MAX: f64 = 7.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Red,
    Yellow,
    Green,
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Red => "RED",
            Status::Yellow => "YELLOW",
            Status::Green => "GREEN",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies any score or average: `<= 4` red, `<= 7` yellow, above green.
/// No value is unknown, never red.
pub fn classify(value: Option<f64>) -> Status {
    match value {
        None => Status::Unknown,
        Some(v) if v.is_nan() => Status::Unknown,
        Some(v) if v <= RED_MAX => Status::Red,
        Some(v) if v <= YELLOW_MAX => Status::Yellow,
        Some(_) => Status::Green,
    }
}

pub fn classify_score(score: u8) -> Status {
    classify(Some(f64::from(score)))
}

/// Mean of the item's three monthly scores, or `None` unless every month of
/// the quarter has a score for it.
pub fn item_quarterly_average(summary: &QuarterSummary, item_id: &str) -> Option<f64> {
    let months = summary.quarter.months();
    let mut sum = 0.0;
    for month in months {
        let score = summary.bucket(month)?.score(item_id)?;
        sum += f64::from(score);
    }
    Some(round2(sum / months.len() as f64))
}

/// Mean of the three monthly totals, or `None` unless the quarter is complete.
pub fn quarterly_average_total(summary: &QuarterSummary) -> Option<f64> {
    if !summary.complete {
        return None;
    }
    let months = summary.quarter.months();
    let mut sum = 0.0;
    for month in months {
        sum += summary.bucket(month)?.total;
    }
    Some(round2(sum / months.len() as f64))
}

/// Fills the quarterly figures of an assembled summary. Every template item
/// gets an entry, as does any extra item id found in the buckets.
pub fn aggregate(mut summary: QuarterSummary, template: &[ChecklistItemTemplate]) -> QuarterSummary {
    let mut item_ids: Vec<String> = template.iter().map(|item| item.id.clone()).collect();
    for bucket in summary.months.values() {
        for id in bucket.items.keys() {
            if !item_ids.contains(id) {
                item_ids.push(id.clone());
            }
        }
    }

    summary.per_item_quarterly_average = item_ids
        .into_iter()
        .map(|id| {
            let average = item_quarterly_average(&summary, &id);
            (id, average)
        })
        .collect();
    summary.quarterly_average_total = quarterly_average_total(&summary);
    summary
}

/// Assembles and aggregates in one step.
pub fn summarize_quarter(
    branch_code: &str,
    records: &[SubmissionRecord],
    year: i32,
    quarter: Quarter,
    template: &[ChecklistItemTemplate],
) -> QuarterSummary {
    aggregate(assemble_quarter(branch_code, records, year, quarter), template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::parse_timestamp;

    fn template() -> Vec<ChecklistItemTemplate> {
        ["A1", "B2"]
            .iter()
            .map(|id| ChecklistItemTemplate {
                id: id.to_string(),
                label: format!("Item {id}"),
                detail: String::new(),
                weight: 0.5,
            })
            .collect()
    }

    fn record(month: u32, total: f64, items: &str) -> SubmissionRecord {
        SubmissionRecord {
            branch_code: Some("101".to_string()),
            period_year: Some(2026),
            period_month: month,
            timestamp: parse_timestamp(&format!("2026-{month:02}-15T12:00:00Z")),
            items_json: Some(items.to_string()),
            obs_json: None,
            total,
        }
    }

    fn q1() -> Quarter {
        Quarter::new(1).unwrap()
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify(Some(4.0)), Status::Red);
        assert_eq!(classify(Some(4.01)), Status::Yellow);
        assert_eq!(classify(Some(7.0)), Status::Yellow);
        assert_eq!(classify(Some(7.01)), Status::Green);
        assert_eq!(classify(Some(0.0)), Status::Red);
        assert_eq!(classify(Some(10.0)), Status::Green);
        assert_eq!(classify(None), Status::Unknown);
        assert_eq!(classify_score(4), Status::Red);
        assert_eq!(classify_score(8), Status::Green);
    }

    #[test]
    fn full_quarter_averages_totals() {
        let items = r#"[{"id":"A1","score":6},{"id":"B2","score":6}]"#;
        let records = vec![
            record(1, 6.0, items),
            record(2, 8.0, items),
            record(3, 5.0, items),
        ];
        let summary = summarize_quarter("101", &records, 2026, q1(), &template());
        assert!(summary.complete);
        assert_eq!(summary.quarterly_average_total, Some(6.33));
        assert_eq!(classify(summary.quarterly_average_total), Status::Yellow);
    }

    #[test]
    fn missing_month_nulls_quarter_figures_but_keeps_monthly_totals() {
        let items = r#"[{"id":"A1","score":6}]"#;
        let records = vec![record(1, 6.0, items), record(2, 8.0, items)];
        let summary = summarize_quarter("101", &records, 2026, q1(), &template());
        assert!(!summary.complete);
        assert_eq!(summary.quarterly_average_total, None);
        assert_eq!(summary.item_average("A1"), None);
        assert_eq!(summary.bucket(1).map(|b| b.total), Some(6.0));
        assert_eq!(summary.bucket(2).map(|b| b.total), Some(8.0));
        assert_eq!(classify(summary.quarterly_average_total), Status::Unknown);
    }

    #[test]
    fn item_missing_in_one_month_has_no_average_in_a_complete_quarter() {
        let records = vec![
            record(1, 7.0, r#"[{"id":"A1","score":7},{"id":"B2","score":9}]"#),
            record(2, 6.0, r#"[{"id":"A1","score":5}]"#),
            record(3, 8.0, r#"[{"id":"A1","score":9},{"id":"B2","score":10}]"#),
        ];
        let summary = summarize_quarter("101", &records, 2026, q1(), &template());
        assert!(summary.complete);
        assert_eq!(summary.item_average("A1"), Some(7.0));
        assert_eq!(summary.item_average("B2"), None);
        assert!(summary.per_item_quarterly_average.contains_key("B2"));
        assert_eq!(summary.quarterly_average_total, Some(7.0));
    }

    #[test]
    fn item_average_is_rounded_mean() {
        let records = vec![
            record(1, 7.0, r#"[{"id":"A1","score":7}]"#),
            record(2, 7.0, r#"[{"id":"A1","score":7}]"#),
            record(3, 7.0, r#"[{"id":"A1","score":8}]"#),
        ];
        let summary = summarize_quarter("101", &records, 2026, q1(), &template());
        assert_eq!(summary.item_average("A1"), Some(7.33));
        assert_eq!(classify(summary.item_average("A1")), Status::Green);
    }

    #[test]
    fn zero_scores_are_data_not_gaps() {
        let items = r#"[{"id":"A1","score":0}]"#;
        let records = vec![record(1, 0.0, items), record(2, 0.0, items), record(3, 0.0, items)];
        let summary = summarize_quarter("101", &records, 2026, q1(), &template());
        assert_eq!(summary.item_average("A1"), Some(0.0));
        assert_eq!(summary.quarterly_average_total, Some(0.0));
        assert_eq!(classify(summary.item_average("A1")), Status::Red);
    }

    #[test]
    fn items_outside_the_template_still_get_an_entry() {
        let items = r#"[{"id":"Z9","score":3}]"#;
        let records = vec![record(1, 3.0, items), record(2, 3.0, items), record(3, 3.0, items)];
        let summary = summarize_quarter("101", &records, 2026, q1(), &template());
        assert_eq!(summary.item_average("Z9"), Some(3.0));
        assert_eq!(summary.per_item_quarterly_average.len(), 3);
    }
}
