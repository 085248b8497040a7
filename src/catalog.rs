use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::ChecklistError;
use crate::models::{Branch, ChecklistItemTemplate, Supervisor, SupervisorKind};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupervisorDirectory {
    #[serde(default)]
    pub zonal: BTreeMap<String, Supervisor>,
    #[serde(default)]
    pub regional: BTreeMap<String, Supervisor>,
}

/// Deployment configuration: the item template and the org hierarchy.
/// Read once at startup and passed to whoever needs it.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub template: Vec<ChecklistItemTemplate>,
    branches: Vec<Branch>,
    supervisors: SupervisorDirectory,
}

impl Catalog {
    pub fn new(
        template: Vec<ChecklistItemTemplate>,
        mut branches: Vec<Branch>,
        supervisors: SupervisorDirectory,
    ) -> Self {
        branches.sort_by(|a, b| natural_cmp(&a.code, &b.code));
        Self {
            template,
            branches,
            supervisors,
        }
    }

    /// Reads `template.json`, `branches.json` and `supervisors.json` from `dir`.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let template: Vec<ChecklistItemTemplate> = read_json(&dir.join("template.json"))?;
        let branches: Vec<Branch> = read_json(&dir.join("branches.json"))?;
        let supervisors: SupervisorDirectory = read_json(&dir.join("supervisors.json"))?;
        debug!(
            items = template.len(),
            branches = branches.len(),
            "catalog loaded"
        );
        Ok(Self::new(template, branches, supervisors))
    }

    pub fn regions(&self) -> Vec<&str> {
        let mut regions: Vec<&str> = self.branches.iter().map(|b| b.region.as_str()).collect();
        regions.sort_unstable();
        regions.dedup();
        regions
    }

    /// Zones with at least one branch in `region`. Empty when `region` is.
    pub fn zones(&self, region: &str) -> Vec<&str> {
        if region.is_empty() {
            return Vec::new();
        }
        let mut zones: Vec<&str> = self
            .branches
            .iter()
            .filter(|b| b.region == region)
            .map(|b| b.zone.as_str())
            .collect();
        zones.sort_unstable();
        zones.dedup();
        zones
    }

    /// Branches in `region`/`zone`, in natural code order. A zone that does not
    /// belong to the region yields nothing.
    pub fn branches_in(&self, region: &str, zone: &str) -> Vec<&Branch> {
        if region.is_empty() || zone.is_empty() {
            return Vec::new();
        }
        self.branches
            .iter()
            .filter(|b| b.region == region && b.zone == zone)
            .collect()
    }

    pub fn branch(&self, code: &str) -> Result<&Branch, ChecklistError> {
        self.branches
            .iter()
            .find(|b| b.code == code.trim())
            .ok_or_else(|| ChecklistError::UnknownBranch(code.to_string()))
    }

    pub fn supervisor_for(
        &self,
        branch: &Branch,
        kind: SupervisorKind,
    ) -> Result<Supervisor, ChecklistError> {
        let found = match kind {
            SupervisorKind::Zonal => self.supervisors.zonal.get(&branch.zone),
            SupervisorKind::Regional => self.supervisors.regional.get(&branch.region),
        };
        found
            .filter(|supervisor| supervisor.is_complete())
            .cloned()
            .ok_or_else(|| ChecklistError::MissingSupervisor {
                branch_code: branch.code.clone(),
                kind: kind.as_str().to_string(),
            })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Orders codes so that "9" sorts before "10" while text parts compare as text.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_run = take_digits(&mut left);
                let r_run = take_digits(&mut right);
                let l_trim = l_run.trim_start_matches('0');
                let r_trim = r_run.trim_start_matches('0');
                let ordering = l_trim
                    .len()
                    .cmp(&r_trim.len())
                    .then_with(|| l_trim.cmp(r_trim));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        run.push(c);
        chars.next();
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(code: &str, name: &str, zone: &str, region: &str) -> Branch {
        Branch {
            code: code.to_string(),
            name: name.to_string(),
            zone: zone.to_string(),
            region: region.to_string(),
        }
    }

    fn catalog() -> Catalog {
        let supervisors: SupervisorDirectory = serde_json::from_str(
            r#"{
                "zonal": {"Z1": {"name": "Ana Ruiz", "email": "ana@example.com"}, "Z3": {"name": "", "email": ""}},
                "regional": {"North": {"name": "Luis Paz", "email": "luis@example.com"}}
            }"#,
        )
        .unwrap();
        Catalog::new(
            Vec::new(),
            vec![
                branch("10", "Harbor", "Z1", "North"),
                branch("9", "Plaza", "Z1", "North"),
                branch("21", "Mill", "Z2", "North"),
                branch("30", "Ridge", "Z3", "South"),
            ],
            supervisors,
        )
    }

    #[test]
    fn natural_order_compares_digit_runs_numerically() {
        assert_eq!(natural_cmp("9", "10"), Ordering::Less);
        assert_eq!(natural_cmp("A2", "A10"), Ordering::Less);
        assert_eq!(natural_cmp("007", "7"), Ordering::Equal);
        assert_eq!(natural_cmp("b", "A"), Ordering::Greater);
    }

    #[test]
    fn cascades_region_zone_branch() {
        let catalog = catalog();
        assert_eq!(catalog.regions(), vec!["North", "South"]);
        assert_eq!(catalog.zones("North"), vec!["Z1", "Z2"]);
        assert!(catalog.zones("").is_empty());

        let codes: Vec<&str> = catalog
            .branches_in("North", "Z1")
            .iter()
            .map(|b| b.code.as_str())
            .collect();
        assert_eq!(codes, vec!["9", "10"]);
    }

    #[test]
    fn zone_from_another_region_yields_nothing() {
        let catalog = catalog();
        assert!(catalog.branches_in("South", "Z1").is_empty());
        assert!(catalog.branches_in("North", "").is_empty());
    }

    #[test]
    fn looks_up_branches_and_supervisors() {
        let catalog = catalog();
        let branch = catalog.branch("21").unwrap();
        assert_eq!(branch.name, "Mill");
        assert!(matches!(
            catalog.branch("99"),
            Err(ChecklistError::UnknownBranch(_))
        ));

        let zonal = catalog.supervisor_for(catalog.branch("9").unwrap(), SupervisorKind::Zonal);
        assert_eq!(zonal.unwrap().name, "Ana Ruiz");
        let regional = catalog.supervisor_for(branch, SupervisorKind::Regional);
        assert_eq!(regional.unwrap().email, "luis@example.com");
        assert!(catalog.supervisor_for(branch, SupervisorKind::Zonal).is_err());
    }

    #[test]
    fn shipped_data_directory_loads() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        let catalog = Catalog::load(&dir).unwrap();
        assert!(!catalog.template.is_empty());
        let weight_sum: f64 = catalog.template.iter().map(|item| item.weight).sum();
        assert!((weight_sum - 1.0).abs() < 1e-9);

        for region in catalog.regions() {
            for zone in catalog.zones(region) {
                for branch in catalog.branches_in(region, zone) {
                    assert!(catalog.supervisor_for(branch, SupervisorKind::Zonal).is_ok());
                    assert!(catalog.supervisor_for(branch, SupervisorKind::Regional).is_ok());
                }
            }
        }
    }

    #[test]
    fn blank_supervisor_entries_count_as_missing() {
        let catalog = catalog();
        let branch = catalog.branch("30").unwrap();
        assert!(matches!(
            catalog.supervisor_for(branch, SupervisorKind::Zonal),
            Err(ChecklistError::MissingSupervisor { .. })
        ));
    }
}
