//! Tiered commission calculation.
//!
//! A sales record is split into three bands:
//!
//! * Tier 1 is 70% of target and is paid whatever the actual sales are.
//! * Tier 2 is the remaining 30% of target, paid in full once
//!   achievement reaches 71%, and not at all below that.
//! * Tier 3 is the overage, paid only when sales exceed target.
//!
//! With a zero target the whole sales amount is treated as Tier 1.
//! Every field of the result is rounded to two decimal places.

use std::collections::HashMap;

use crate::error::ValidationError;
use crate::models::{CommissionBreakdown, CommissionRule, SalesRecord};

/// Share of target paid at the Tier 1 rate.
pub const TIER1_SHARE: f64 = 0.7;
/// Share of target paid at the Tier 2 rate.
pub const TIER2_SHARE: f64 = 0.3;
/// Achievement percentage at which Tier 2 is unlocked (inclusive).
pub const TIER2_THRESHOLD_PERCENT: f64 = 71.0;

/// Rounds to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Computes the three-tier commission for one record.
///
/// Total over all inputs: a zero target never divides, negative rates
/// pass through the arithmetic unchanged and NaN propagates.
pub fn calculate_commission(
    sales: f64,
    target: f64,
    tier1_rate: f64,
    tier2_rate: f64,
    tier3_rate: f64,
) -> CommissionBreakdown {
    let (tier1_amount, tier2_amount, tier3_amount) = if target == 0.0 {
        (sales, 0.0, 0.0)
    } else {
        let tier1 = target * TIER1_SHARE;
        // sales / target * 100 >= 71, kept in multiplicative form so
        // 710 against 1000 lands exactly on the boundary.
        let tier2 = if sales * 100.0 >= TIER2_THRESHOLD_PERCENT * target {
            target * TIER2_SHARE
        } else {
            0.0
        };
        let tier3 = if sales > target { sales - target } else { 0.0 };
        (tier1, tier2, tier3)
    };

    let tier1_commission = tier1_amount * tier1_rate;
    let tier2_commission = tier2_amount * tier2_rate;
    let tier3_commission = tier3_amount * tier3_rate;
    let total_commission = tier1_commission + tier2_commission + tier3_commission;

    CommissionBreakdown {
        tier1_amount: round2(tier1_amount),
        tier1_commission: round2(tier1_commission),
        tier2_amount: round2(tier2_amount),
        tier2_commission: round2(tier2_commission),
        tier3_amount: round2(tier3_amount),
        tier3_commission: round2(tier3_commission),
        total_commission: round2(total_commission),
    }
}

/// Commission rules indexed by category.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: HashMap<String, CommissionRule>,
}

impl RuleBook {
    /// Indexes `rules` by category; a later duplicate replaces an earlier one.
    pub fn new(rules: &[CommissionRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| (rule.category.clone(), rule.clone()))
            .collect();
        Self { rules }
    }

    pub fn get(&self, category: &str) -> Option<&CommissionRule> {
        self.rules.get(category)
    }

    /// Commission for one record.  A category without a rule earns
    /// nothing; the tier amounts are still reported at zero rates.
    pub fn commission_for(&self, record: &SalesRecord) -> CommissionBreakdown {
        match self.get(&record.category) {
            Some(rule) => calculate_commission(
                record.sales,
                record.target,
                rule.tier1_rate,
                rule.tier2_rate,
                rule.tier3_rate,
            ),
            None => calculate_commission(record.sales, record.target, 0.0, 0.0, 0.0),
        }
    }
}

/// Parses a user-entered monetary amount.
///
/// This is the only place numeric input is validated; everything past
/// it assumes non-negative finite amounts.
pub fn parse_amount(input: &str) -> Result<f64, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyAmount);
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| ValidationError::NotANumber(trimmed.to_string()))?;
    if !value.is_finite() {
        return Err(ValidationError::NotANumber(trimmed.to_string()));
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeAmount(value));
    }
    Ok(value)
}
