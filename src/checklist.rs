use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::AppEnvironment;
use crate::error::ChecklistError;
use crate::models::{
    Branch, ChecklistItemTemplate, NormalizedRecord, Observations, ScoredItem, SubmissionAction,
    SubmissionPayload, Supervisor, SupervisorKind,
};
use crate::period::Period;
use crate::scoring::{compute_weighted_total, validate_items, validate_score};

/// A checklist being filled in for one branch and period.
#[derive(Debug, Clone)]
pub struct Checklist {
    pub branch: Branch,
    pub period: Period,
    pub supervisor: Supervisor,
    pub supervisor_kind: SupervisorKind,
    items: Vec<ScoredItem>,
    observations: Observations,
}

impl Checklist {
    /// Every template item starts at 0 with no observations.
    pub fn new(
        template: &[ChecklistItemTemplate],
        branch: Branch,
        supervisor: Supervisor,
        supervisor_kind: SupervisorKind,
        period: Period,
    ) -> Self {
        Self {
            branch,
            period,
            supervisor,
            supervisor_kind,
            items: template
                .iter()
                .map(|item| ScoredItem::from_template(item, 0))
                .collect(),
            observations: Observations::default(),
        }
    }

    pub fn items(&self) -> &[ScoredItem] {
        &self.items
    }

    pub fn observations(&self) -> &Observations {
        &self.observations
    }

    pub fn set_score(&mut self, item_id: &str, score: i64) -> Result<(), ChecklistError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| ChecklistError::UnknownItem(item_id.to_string()))?;
        item.score = validate_score(item_id, score)?;
        Ok(())
    }

    pub fn add_observation(&mut self, text: &str) -> Option<u32> {
        self.observations.push(text)
    }

    pub fn remove_observation(&mut self, position: usize) -> Result<(), ChecklistError> {
        self.observations
            .remove(position)
            .map(|_| ())
            .ok_or(ChecklistError::UnknownObservation(position))
    }

    /// Loads a stored submission for editing. Template items missing from the
    /// record fall back to 0; stored observations replace the current ones.
    pub fn load_record(&mut self, record: &NormalizedRecord) {
        for item in &mut self.items {
            item.score = record.items.get(&item.id).map_or(0, |stored| stored.score);
        }
        self.observations = Observations::from(record.observations.clone());
    }

    pub fn total(&self) -> f64 {
        compute_weighted_total(&self.items)
    }

    pub fn validate(&self) -> Result<(), ChecklistError> {
        if !self.supervisor.is_complete() {
            return Err(ChecklistError::MissingSupervisor {
                branch_code: self.branch.code.clone(),
                kind: self.supervisor_kind.as_str().to_string(),
            });
        }
        validate_items(&self.items)
    }

    /// Builds the outbound submission. Email goes out only for a send in production.
    pub fn to_payload(
        &self,
        action: SubmissionAction,
        environment: AppEnvironment,
        now: DateTime<Utc>,
    ) -> Result<SubmissionPayload, ChecklistError> {
        self.validate()?;
        Ok(SubmissionPayload {
            visit_id: Uuid::new_v4(),
            branch_code: self.branch.code.clone(),
            branch_name: self.branch.name.clone(),
            zone: self.branch.zone.clone(),
            region: self.branch.region.clone(),
            supervisor: self.supervisor.clone(),
            supervisor_kind: self.supervisor_kind.as_str().to_string(),
            period: self.period,
            date: now,
            items: self.items.clone(),
            observations: self.observations.as_slice().to_vec(),
            total: self.total(),
            send_email: action == SubmissionAction::Send
                && environment == AppEnvironment::Production,
        })
    }
}
