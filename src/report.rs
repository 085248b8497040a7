use std::fmt::Write;

use crate::aggregate::{classify, classify_score};
use crate::checklist::Checklist;
use crate::models::{Branch, ChecklistItemTemplate, Observation, QuarterSummary};
use crate::util::month_label;

const NO_DATA: &str = "—";

fn value_or_dash(value: Option<f64>) -> String {
    value.map_or_else(|| NO_DATA.to_string(), |v| v.to_string())
}

fn write_observations(output: &mut String, observations: &[Observation]) {
    if observations.is_empty() {
        let _ = writeln!(output, "No observations.");
        return;
    }
    for observation in observations {
        let _ = writeln!(output, "{}. {}", observation.n, observation.text);
    }
}

/// Review sheet shown before a checklist is saved or sent.
pub fn build_review(checklist: &Checklist) -> String {
    let mut output = String::new();
    let branch = &checklist.branch;

    let _ = writeln!(output, "# Visit Review");
    let _ = writeln!(output, "Branch: {} — {}", branch.code, branch.name);
    let _ = writeln!(output, "Zone: {} · Region: {}", branch.zone, branch.region);
    let _ = writeln!(output, "Period: {}", checklist.period);
    let _ = writeln!(
        output,
        "Supervisor: {} ({}) · {}",
        checklist.supervisor.name,
        checklist.supervisor.email,
        checklist.supervisor_kind.as_str()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "| Item | Weight | Score | Status |");
    let _ = writeln!(output, "| --- | ---: | ---: | --- |");
    for item in checklist.items() {
        let _ = writeln!(
            output,
            "| {} | {:.0}% | {} | {} |",
            item.label,
            item.weight * 100.0,
            item.score,
            classify_score(item.score)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Observations");
    write_observations(&mut output, checklist.observations().as_slice());

    let _ = writeln!(output);
    let _ = writeln!(output, "Final score: {}", checklist.total());
    output
}

/// Quarterly summary table: monthly scores per item, the quarter figure and
/// its status. Anything without data renders as a dash.
pub fn build_quarter_report(
    summary: &QuarterSummary,
    template: &[ChecklistItemTemplate],
    branch: Option<&Branch>,
) -> String {
    let mut output = String::new();
    let months = summary.quarter.months();
    let branch_label = branch.map_or_else(
        || summary.branch_code.clone(),
        |b| format!("{} {}", b.code, b.name),
    );

    let _ = writeln!(output, "# Quarterly Summary");
    let _ = writeln!(
        output,
        "{} — {} {}",
        branch_label, summary.quarter, summary.year
    );
    let _ = writeln!(output);

    if !summary.has_data() {
        let _ = writeln!(output, "No submissions recorded for this quarter.");
        return output;
    }
    if !summary.complete {
        let missing: Vec<String> = summary
            .missing_months()
            .into_iter()
            .map(month_label)
            .collect();
        let _ = writeln!(
            output,
            "Incomplete quarter, no submission for: {}",
            missing.join(", ")
        );
        let _ = writeln!(output);
    }

    let header: Vec<String> = months.iter().map(|m| month_label(*m)).collect();
    let _ = writeln!(output, "| Item | {} | Quarter | Status |", header.join(" | "));
    let _ = writeln!(output, "| --- |{} ---: | --- |", " ---: |".repeat(months.len()));

    let mut rows: Vec<(&str, &str)> = template
        .iter()
        .map(|item| (item.id.as_str(), item.label.as_str()))
        .collect();
    for id in summary.per_item_quarterly_average.keys() {
        if !rows.iter().any(|(known, _)| known == id) {
            rows.push((id.as_str(), id.as_str()));
        }
    }

    for (id, label) in rows {
        let scores: Vec<String> = months
            .iter()
            .map(|m| {
                summary
                    .bucket(*m)
                    .and_then(|bucket| bucket.score(id))
                    .map_or_else(|| NO_DATA.to_string(), |score| score.to_string())
            })
            .collect();
        let average = summary.item_average(id);
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            label,
            scores.join(" | "),
            value_or_dash(average),
            classify(average)
        );
    }

    let totals: Vec<String> = months
        .iter()
        .map(|m| value_or_dash(summary.bucket(*m).map(|bucket| bucket.total)))
        .collect();
    let _ = writeln!(
        output,
        "| **Total** | {} | {} | {} |",
        totals.join(" | "),
        value_or_dash(summary.quarterly_average_total),
        classify(summary.quarterly_average_total)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Observations");
    for month in months {
        let _ = writeln!(output);
        let Some(bucket) = summary.bucket(month) else {
            let _ = writeln!(output, "### {}", month_label(month));
            let _ = writeln!(output, "{NO_DATA}");
            continue;
        };
        match bucket.timestamp {
            Some(at) => {
                let _ = writeln!(
                    output,
                    "### {} (submitted {})",
                    month_label(month),
                    at.format("%Y-%m-%d")
                );
            }
            None => {
                let _ = writeln!(output, "### {}", month_label(month));
            }
        }
        write_observations(&mut output, &bucket.observations);
    }

    output
}
