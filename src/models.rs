use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::period::{Period, Quarter};
use crate::util;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItemTemplate {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub detail: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub weight: f64,
    pub score: u8,
}

impl ScoredItem {
    pub fn from_template(template: &ChecklistItemTemplate, score: u8) -> Self {
        Self {
            id: template.id.clone(),
            label: template.label.clone(),
            detail: template.detail.clone(),
            weight: template.weight,
            score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub n: u32,
    pub text: String,
}

/// Numbered observations. `n` always equals the 1-based position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Observations(Vec<Observation>);

impl Observations {
    /// Appends a trimmed observation and returns its number. Blank text is ignored.
    pub fn push(&mut self, text: &str) -> Option<u32> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let n = self.0.len() as u32 + 1;
        self.0.push(Observation {
            n,
            text: text.to_string(),
        });
        Some(n)
    }

    /// Removes the observation at 1-based `position` and renumbers the rest.
    pub fn remove(&mut self, position: usize) -> Option<Observation> {
        if position == 0 || position > self.0.len() {
            return None;
        }
        let removed = self.0.remove(position - 1);
        for (index, observation) in self.0.iter_mut().enumerate() {
            observation.n = index as u32 + 1;
        }
        Some(removed)
    }

    pub fn as_slice(&self) -> &[Observation] {
        &self.0
    }
}

/// Stored numbers are discarded; the list is renumbered from 1.
impl From<Vec<Observation>> for Observations {
    fn from(mut value: Vec<Observation>) -> Self {
        for (index, observation) in value.iter_mut().enumerate() {
            observation.n = index as u32 + 1;
        }
        Self(value)
    }
}

/// One stored submission as the record store hands it back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    #[serde(
        rename = "branchCode",
        alias = "branch_code",
        default,
        deserialize_with = "util::de_lenient_opt_string"
    )]
    pub branch_code: Option<String>,
    #[serde(
        rename = "period_year",
        alias = "periodYear",
        default,
        deserialize_with = "util::de_lenient_opt_i32"
    )]
    pub period_year: Option<i32>,
    #[serde(
        rename = "period_month",
        alias = "periodMonth",
        default,
        deserialize_with = "util::de_lenient_u32"
    )]
    pub period_month: u32,
    #[serde(default, deserialize_with = "util::de_lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(
        rename = "itemsJson",
        default,
        deserialize_with = "util::de_json_fragment"
    )]
    pub items_json: Option<String>,
    #[serde(
        rename = "obsJson",
        default,
        deserialize_with = "util::de_json_fragment"
    )]
    pub obs_json: Option<String>,
    #[serde(default, deserialize_with = "util::de_lenient_f64")]
    pub total: f64,
}

/// Item scores and observations decoded from one stored submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    pub items: BTreeMap<String, ScoredItem>,
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthBucket {
    pub month: u32,
    pub total: f64,
    pub timestamp: Option<DateTime<Utc>>,
    pub items: BTreeMap<String, ScoredItem>,
    pub observations: Vec<Observation>,
}

impl MonthBucket {
    pub fn score(&self, item_id: &str) -> Option<u8> {
        self.items.get(item_id).map(|item| item.score)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuarterSummary {
    pub branch_code: String,
    pub year: i32,
    pub quarter: Quarter,
    /// Present months only; a missing key means no submission that month.
    pub months: BTreeMap<u32, MonthBucket>,
    pub complete: bool,
    pub quarterly_average_total: Option<f64>,
    pub per_item_quarterly_average: BTreeMap<String, Option<f64>>,
}

impl QuarterSummary {
    pub fn bucket(&self, month: u32) -> Option<&MonthBucket> {
        self.months.get(&month)
    }

    pub fn missing_months(&self) -> Vec<u32> {
        self.quarter
            .months()
            .into_iter()
            .filter(|month| !self.months.contains_key(month))
            .collect()
    }

    pub fn has_data(&self) -> bool {
        !self.months.is_empty()
    }

    pub fn item_average(&self, item_id: &str) -> Option<f64> {
        self.per_item_quarterly_average
            .get(item_id)
            .copied()
            .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(deserialize_with = "de_code")]
    pub code: String,
    pub name: String,
    pub zone: String,
    pub region: String,
}

fn de_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    util::de_lenient_opt_string(deserializer)?
        .ok_or_else(|| serde::de::Error::custom("branch code must be a string or number"))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supervisor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl Supervisor {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.email.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SupervisorKind {
    Zonal,
    Regional,
}

impl SupervisorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zonal => "zonal",
            Self::Regional => "regional",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionAction {
    Save,
    Send,
}

/// Body posted to the record store for a new submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub visit_id: Uuid,
    pub branch_code: String,
    pub branch_name: String,
    pub zone: String,
    pub region: String,
    pub supervisor: Supervisor,
    pub supervisor_kind: String,
    pub period: Period,
    pub date: DateTime<Utc>,
    pub items: Vec<ScoredItem>,
    pub observations: Vec<Observation>,
    pub total: f64,
    pub send_email: bool,
}
