use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::models::{NormalizedRecord, Observation, ScoredItem, SubmissionRecord};
use crate::scoring::MAX_SCORE;
use crate::util::{value_as_f64, value_as_string};

/// Decodes the item and observation fragments of a stored submission.
///
/// The two fragments are read independently: a malformed one degrades to an
/// empty collection and the other is still decoded. Items missing from the
/// record are absent from the map, never zero-filled.
pub fn normalize(record: &SubmissionRecord) -> NormalizedRecord {
    NormalizedRecord {
        items: parse_items(record.items_json.as_deref()),
        observations: parse_observations(record.obs_json.as_deref()),
    }
}

pub fn parse_items(raw: Option<&str>) -> BTreeMap<String, ScoredItem> {
    let mut items = BTreeMap::new();
    let Some(entries) = parse_fragment("itemsJson", raw) else {
        return items;
    };

    for entry in entries {
        match scored_item(&entry) {
            Some(item) => {
                items.insert(item.id.clone(), item);
            }
            None => warn!(entry = %entry, "skipping unreadable item entry"),
        }
    }
    items
}

pub fn parse_observations(raw: Option<&str>) -> Vec<Observation> {
    let Some(entries) = parse_fragment("obsJson", raw) else {
        return Vec::new();
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| observation(index, entry))
        .collect()
}

pub fn encode_items(items: &[ScoredItem]) -> Result<String, serde_json::Error> {
    serde_json::to_string(items)
}

pub fn encode_observations(observations: &[Observation]) -> Result<String, serde_json::Error> {
    serde_json::to_string(observations)
}

fn parse_fragment(field: &'static str, raw: Option<&str>) -> Option<Vec<Value>> {
    let raw = raw.map(str::trim).filter(|text| !text.is_empty())?;
    match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(entries) => Some(entries),
        Err(err) => {
            warn!(field, error = %err, "malformed record fragment, treating as empty");
            None
        }
    }
}

fn scored_item(entry: &Value) -> Option<ScoredItem> {
    let object = entry.as_object()?;
    let id = object.get("id").and_then(value_as_string)?;
    let score = object
        .get("score")
        .and_then(value_as_f64)
        .filter(|score| score.fract() == 0.0 && (0.0..=MAX_SCORE as f64).contains(score))?;

    Some(ScoredItem {
        id,
        label: object
            .get("label")
            .and_then(value_as_string)
            .unwrap_or_default(),
        detail: object
            .get("detail")
            .and_then(value_as_string)
            .unwrap_or_default(),
        weight: object.get("weight").and_then(value_as_f64).unwrap_or(0.0),
        score: score as u8,
    })
}

fn observation(index: usize, entry: Value) -> Observation {
    let fallback_n = index as u32 + 1;
    match entry {
        Value::Object(object) => {
            let n = object
                .get("n")
                .and_then(value_as_f64)
                .filter(|n| n.fract() == 0.0 && *n >= 1.0)
                .map(|n| n as u32)
                .unwrap_or(fallback_n);
            let text = object
                .get("text")
                .and_then(value_as_string)
                .unwrap_or_else(|| Value::Object(object.clone()).to_string());
            Observation { n, text }
        }
        Value::String(text) => Observation {
            n: fallback_n,
            text,
        },
        other => Observation {
            n: fallback_n,
            text: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(items: Option<&str>, observations: Option<&str>) -> SubmissionRecord {
        SubmissionRecord {
            period_month: 1,
            items_json: items.map(str::to_string),
            obs_json: observations.map(str::to_string),
            ..SubmissionRecord::default()
        }
    }

    #[test]
    fn decodes_items_keyed_by_id() {
        let normalized = normalize(&record(
            Some(r#"[{"id":"A1","label":"Front desk","weight":0.2,"score":7},{"id":"B2","score":"0"}]"#),
            None,
        ));
        assert_eq!(normalized.items.len(), 2);
        assert_eq!(normalized.items["A1"].score, 7);
        assert_eq!(normalized.items["A1"].label, "Front desk");
        assert_eq!(normalized.items["B2"].score, 0);
        assert!(!normalized.items.contains_key("C3"));
    }

    #[test]
    fn malformed_items_do_not_block_observations() {
        let normalized = normalize(&record(
            Some("[{\"id\": \"A1\", "),
            Some(r#"[{"n":1,"text":"Clean lobby"}]"#),
        ));
        assert!(normalized.items.is_empty());
        assert_eq!(normalized.observations.len(), 1);
        assert_eq!(normalized.observations[0].text, "Clean lobby");
    }

    #[test]
    fn malformed_observations_do_not_block_items() {
        let normalized = normalize(&record(Some(r#"[{"id":"A1","score":5}]"#), Some("oops")));
        assert_eq!(normalized.items["A1"].score, 5);
        assert!(normalized.observations.is_empty());
    }

    #[test]
    fn absent_or_blank_fragments_are_empty() {
        let normalized = normalize(&record(None, Some("  ")));
        assert!(normalized.items.is_empty());
        assert!(normalized.observations.is_empty());
    }

    #[test]
    fn entries_without_a_usable_score_are_absent() {
        let items = parse_items(Some(
            r#"[{"id":"A1","score":null},{"id":"A2","score":11},{"id":"A3","score":4.5},{"score":3},{"id":"A4","score":6}]"#,
        ));
        assert_eq!(items.keys().collect::<Vec<_>>(), vec!["A4"]);
    }

    #[test]
    fn later_duplicate_ids_win() {
        let items = parse_items(Some(r#"[{"id":"A1","score":2},{"id":"A1","score":9}]"#));
        assert_eq!(items["A1"].score, 9);
    }

    #[test]
    fn observations_get_sequential_numbers_and_text_coercion() {
        let observations = parse_observations(Some(
            r#"[{"text":"first"},"second",{"n":7,"text":"third"},42]"#,
        ));
        let pairs: Vec<(u32, &str)> = observations
            .iter()
            .map(|o| (o.n, o.text.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![(1, "first"), (2, "second"), (7, "third"), (4, "42")]
        );
    }

    #[test]
    fn normalizing_reencoded_output_is_stable() {
        let first = normalize(&record(
            Some(r#"[{"id":"B2","score":4,"weight":0.3},{"id":"A1","score":8,"weight":0.7}]"#),
            Some(r#"["one",{"text":"two"}]"#),
        ));
        let items: Vec<ScoredItem> = first.items.values().cloned().collect();
        let reencoded = record(
            Some(&encode_items(&items).unwrap()),
            Some(&encode_observations(&first.observations).unwrap()),
        );
        let second = normalize(&reencoded);
        assert_eq!(first, second);
    }
}
