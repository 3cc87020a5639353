// Commission math and tier schedule
//
// All amounts are minor currency units, rates are whole percentages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommissionError {
    #[error("Order total must not be negative (got {0})")]
    NegativeTotal(i64),

    #[error("Commission rate must be between 0 and 100 (got {0})")]
    RateOutOfRange(i32),
}

/// One step of the commission schedule: affiliates with at least
/// `min_conversions` completed referrals earn `rate` percent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommissionTier {
    pub min_conversions: i64,
    pub rate: i32,
}

/// `floor(order_total * rate / 100)` computed without floating point.
pub fn compute_commission(order_total: i64, rate: i32) -> Result<i64, CommissionError> {
    if order_total < 0 {
        return Err(CommissionError::NegativeTotal(order_total));
    }
    if !(0..=100).contains(&rate) {
        return Err(CommissionError::RateOutOfRange(rate));
    }

    let commission = (order_total as i128 * rate as i128) / 100;
    // rate <= 100 keeps the result within order_total
    Ok(commission as i64)
}

/// Parse a tier list such as `0:5,11:7,51:10`.
///
/// The list must contain a tier starting at zero conversions, thresholds must
/// be distinct and rates must lie in `0..=100`. Tiers are returned sorted by
/// threshold.
pub fn parse_tiers(raw: &str) -> Result<Vec<CommissionTier>, String> {
    let mut tiers = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (threshold, rate) = entry
            .split_once(':')
            .ok_or_else(|| format!("tier '{}' must look like min_conversions:rate", entry))?;

        let min_conversions: i64 = threshold
            .trim()
            .parse()
            .map_err(|_| format!("invalid conversion threshold in '{}'", entry))?;
        let rate: i32 = rate
            .trim()
            .parse()
            .map_err(|_| format!("invalid rate in '{}'", entry))?;

        if min_conversions < 0 {
            return Err(format!("negative conversion threshold in '{}'", entry));
        }
        if !(0..=100).contains(&rate) {
            return Err(format!("rate out of range in '{}'", entry));
        }

        tiers.push(CommissionTier {
            min_conversions,
            rate,
        });
    }

    tiers.sort_by_key(|t| t.min_conversions);

    if tiers.first().map(|t| t.min_conversions) != Some(0) {
        return Err("schedule must include a tier starting at 0 conversions".to_string());
    }
    if tiers
        .windows(2)
        .any(|pair| pair[0].min_conversions == pair[1].min_conversions)
    {
        return Err("duplicate conversion thresholds".to_string());
    }

    Ok(tiers)
}

/// Ordered commission tiers. The rate for an affiliate depends only on the
/// number of completed referrals they have accumulated.
#[derive(Debug, Clone)]
pub struct CommissionSchedule {
    tiers: Vec<CommissionTier>,
}

impl CommissionSchedule {
    pub fn new(mut tiers: Vec<CommissionTier>) -> Self {
        tiers.sort_by_key(|t| t.min_conversions);
        if tiers.is_empty() {
            tiers.push(CommissionTier {
                min_conversions: 0,
                rate: 5,
            });
        }
        Self { tiers }
    }

    /// Rate given to newly approved affiliates
    pub fn base_rate(&self) -> i32 {
        self.tiers[0].rate
    }

    pub fn rate_for(&self, completed_conversions: i64) -> i32 {
        self.tiers
            .iter()
            .rev()
            .find(|t| completed_conversions >= t.min_conversions)
            .map(|t| t.rate)
            .unwrap_or_else(|| self.base_rate())
    }

    /// The next tier above the current conversion count, if any
    pub fn next_tier(&self, completed_conversions: i64) -> Option<CommissionTier> {
        self.tiers
            .iter()
            .find(|t| t.min_conversions > completed_conversions)
            .copied()
    }

    pub fn tiers(&self) -> &[CommissionTier] {
        &self.tiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_schedule() -> CommissionSchedule {
        CommissionSchedule::new(parse_tiers("0:5,11:7,51:10").unwrap())
    }

    #[test]
    fn test_commission_floors() {
        assert_eq!(compute_commission(100_000, 5).unwrap(), 5_000);
        assert_eq!(compute_commission(199, 5).unwrap(), 9);
        assert_eq!(compute_commission(19, 5).unwrap(), 0);
        assert_eq!(compute_commission(0, 10).unwrap(), 0);
    }

    #[test]
    fn test_commission_never_exceeds_total() {
        for total in [0_i64, 1, 99, 101, 12_345, 9_999_999] {
            for rate in [0, 1, 5, 33, 99, 100] {
                let commission = compute_commission(total, rate).unwrap();
                assert!(commission <= total);
                assert!(commission >= 0);
            }
        }
    }

    #[test]
    fn test_commission_large_totals_do_not_overflow() {
        let commission = compute_commission(i64::MAX, 100).unwrap();
        assert_eq!(commission, i64::MAX);

        let commission = compute_commission(i64::MAX, 50).unwrap();
        assert_eq!(commission, i64::MAX / 2);
    }

    #[test]
    fn test_commission_rejects_bad_input() {
        assert_eq!(
            compute_commission(-1, 5),
            Err(CommissionError::NegativeTotal(-1))
        );
        assert_eq!(
            compute_commission(100, 101),
            Err(CommissionError::RateOutOfRange(101))
        );
    }

    #[test]
    fn test_parse_tiers_sorts_and_validates() {
        let tiers = parse_tiers("51:10, 0:5 ,11:7").unwrap();
        assert_eq!(
            tiers,
            vec![
                CommissionTier { min_conversions: 0, rate: 5 },
                CommissionTier { min_conversions: 11, rate: 7 },
                CommissionTier { min_conversions: 51, rate: 10 },
            ]
        );

        assert!(parse_tiers("").is_err());
        assert!(parse_tiers("5:5").is_err());
        assert!(parse_tiers("0:5,0:7").is_err());
        assert!(parse_tiers("0:150").is_err());
        assert!(parse_tiers("0-5").is_err());
    }

    #[test]
    fn test_rate_for_conversion_counts() {
        let schedule = default_schedule();
        assert_eq!(schedule.base_rate(), 5);
        assert_eq!(schedule.rate_for(0), 5);
        assert_eq!(schedule.rate_for(10), 5);
        assert_eq!(schedule.rate_for(11), 7);
        assert_eq!(schedule.rate_for(50), 7);
        assert_eq!(schedule.rate_for(51), 10);
        assert_eq!(schedule.rate_for(10_000), 10);
    }

    #[test]
    fn test_next_tier() {
        let schedule = default_schedule();
        assert_eq!(schedule.next_tier(3).map(|t| t.rate), Some(7));
        assert_eq!(schedule.next_tier(11).map(|t| t.min_conversions), Some(51));
        assert!(schedule.next_tier(51).is_none());
    }
}
