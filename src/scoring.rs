use crate::error::ChecklistError;
use crate::models::ScoredItem;
use crate::util::round2;

pub const MAX_SCORE: i64 = 10;

/// Weighted mean of the item scores, normalized by the weights present and
/// rounded to two decimals. A zero weight sum yields exactly 0.
///
/// Scores are trusted as given; run [`validate_score`] upstream.
pub fn compute_weighted_total(items: &[ScoredItem]) -> f64 {
    let weight_sum: f64 = items.iter().map(|item| item.weight).sum();
    if weight_sum == 0.0 {
        return 0.0;
    }

    let weighted: f64 = items
        .iter()
        .map(|item| item.weight * f64::from(item.score))
        .sum();
    round2(weighted / weight_sum)
}

/// Accepts a raw score for `item_id` if it lies in 0..=10.
pub fn validate_score(item_id: &str, score: i64) -> Result<u8, ChecklistError> {
    if (0..=MAX_SCORE).contains(&score) {
        Ok(score as u8)
    } else {
        Err(ChecklistError::InvalidScore {
            item_id: item_id.to_string(),
            score,
        })
    }
}

pub fn validate_items(items: &[ScoredItem]) -> Result<(), ChecklistError> {
    for item in items {
        validate_score(&item.id, i64::from(item.score))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, weight: f64, score: u8) -> ScoredItem {
        ScoredItem {
            id: id.to_string(),
            label: format!("Item {id}"),
            detail: String::new(),
            weight,
            score,
        }
    }

    #[test]
    fn weighted_total_normalizes_by_present_weights() {
        let items = vec![item("A", 0.5, 8), item("B", 0.3, 6), item("C", 0.1, 10)];
        let expected = (0.5 * 8.0 + 0.3 * 6.0 + 0.1 * 10.0) / 0.9;
        let total = compute_weighted_total(&items);
        assert!((total - round2(expected)).abs() < 0.001);
        assert_eq!(total, 7.56);
    }

    #[test]
    fn weights_need_not_sum_to_one() {
        let items = vec![item("A", 2.0, 10), item("B", 2.0, 5)];
        assert_eq!(compute_weighted_total(&items), 7.5);
    }

    #[test]
    fn zero_weight_sum_is_zero() {
        assert_eq!(compute_weighted_total(&[]), 0.0);
        let items = vec![item("A", 0.0, 9), item("B", 0.0, 3)];
        let total = compute_weighted_total(&items);
        assert_eq!(total, 0.0);
        assert!(!total.is_nan());
    }

    #[test]
    fn score_bounds_are_inclusive() {
        assert_eq!(validate_score("A", 0), Ok(0));
        assert_eq!(validate_score("A", 10), Ok(10));
        assert_eq!(
            validate_score("A", 11),
            Err(ChecklistError::InvalidScore {
                item_id: "A".to_string(),
                score: 11
            })
        );
        assert!(validate_score("A", -1).is_err());
    }

    #[test]
    fn validate_items_reports_first_offender() {
        let items = vec![item("A", 0.5, 4), item("B", 0.5, 12), item("C", 0.5, 13)];
        let err = validate_items(&items).unwrap_err();
        assert_eq!(
            err,
            ChecklistError::InvalidScore {
                item_id: "B".to_string(),
                score: 12
            }
        );
    }
}
