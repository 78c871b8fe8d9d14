//! Data models for the Commission Engine.
//!
//! The `models` module defines the serialisable records read from the
//! data store (sales, collections, commission rules) and the derived
//! values the engine produces from them (commission breakdowns and
//! period summaries).  Persisted records are only ever read here; the
//! derived types are freshly built on every call.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// A calendar month, the granularity at which every record is kept.
///
/// Ordering is chronological: `(year, month)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    /// Builds a period, rejecting years outside `1..=9999` and months
    /// outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(ValidationError::InvalidYear(year));
        }
        if !(1..=12).contains(&month) {
            return Err(ValidationError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    /// The month immediately before this one.
    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// An inclusive range of months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub start: Period,
    pub end: Period,
}

impl PeriodRange {
    /// Builds a range; `start` must not come after `end`.
    pub fn new(start: Period, end: Period) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one month.
    pub fn single(period: Period) -> Self {
        Self { start: period, end: period }
    }

    pub fn contains(&self, year: i32, month: u32) -> bool {
        let p = Period { year, month };
        self.start <= p && p <= self.end
    }
}

/// Commission rates for one product category.
///
/// The `tier*_from` / `tier*_to` boundaries exist in the stored schema
/// but the tier amounts are derived from target and sales alone, so
/// they are carried through untouched and never read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRule {
    /// Category identifier; unique across rules.
    pub category: String,
    pub tier1_rate: f64,
    pub tier2_rate: f64,
    pub tier3_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier1_from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier1_to: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier2_from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier2_to: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier3_from: Option<f64>,
}

/// Sales and target for one representative, company and category in a
/// single month.  Upserts are keyed on
/// `(representative_id, category, year, month)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub representative_id: String,
    #[serde(default)]
    pub company_id: Option<String>,
    pub category: String,
    pub sales: f64,
    pub target: f64,
    pub year: i32,
    pub month: u32,
}

/// Cash collected for one representative in a single month.  Collections
/// carry no category, so one month holds at most one amount per
/// representative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub representative_id: String,
    #[serde(default)]
    pub company_id: Option<String>,
    pub amount: f64,
    pub year: i32,
    pub month: u32,
}

/// A sales representative as known to the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representative {
    pub id: String,
    pub name: String,
}

/// Three-tier commission split for a single sales record.  Every field
/// is rounded to two decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    /// Sales credited to the base band: 70% of target, or all of sales
    /// when there is no target.
    pub tier1_amount: f64,
    /// Commission earned on the Tier 1 band, rounded to cents.
    pub tier1_commission: f64,
    /// The remaining 30% of target once achievement reaches 71%,
    /// otherwise zero.
    pub tier2_amount: f64,
    /// Commission earned on the Tier 2 band, rounded to cents.
    pub tier2_commission: f64,
    /// Sales above target; zero unless sales exceed it.
    pub tier3_amount: f64,
    /// Commission earned on the overage, rounded to cents.
    pub tier3_commission: f64,
    /// Sum of the three tier commissions.
    pub total_commission: f64,
}

/// Aggregated totals over a set of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// Sum of sales across every category row in the range.
    pub total_sales: f64,
    /// Sum of targets across the same rows.
    pub total_target: f64,
    /// Cash collected in the range.  Zero for category summaries, since
    /// collections are not tied to a category.
    pub total_collection: f64,
    /// Sum of the per-record commissions, each already rounded.
    pub total_commission: f64,
    /// `total_sales / total_target * 100`, or zero without a target.
    pub achievement_percentage: f64,
    /// Collection as a percentage of sales.
    pub collection_rate: f64,
}

/// One representative's position in the balanced ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRepresentative {
    /// The representative being ranked.
    pub representative_id: String,
    /// Totals the scores were derived from.
    pub summary: PeriodSummary,
    /// Achievement, capped at 100, times the achievement weight.
    pub attainment_score: f64,
    /// Sales as a percentage of the period's best seller, weighted.
    pub sales_score: f64,
    /// Collection as a percentage of the period's best collector,
    /// weighted.
    pub collection_score: f64,
    /// Sum of the three weighted scores; the ranking key.
    pub balanced_score: f64,
}

/// Period-over-period change of every summary field, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    /// Change in `total_sales`.
    pub sales_change: f64,
    /// Change in `total_target`.
    pub target_change: f64,
    /// Change in `total_collection`.
    pub collection_change: f64,
    /// Change in `total_commission`.
    pub commission_change: f64,
    /// Change in `achievement_percentage` itself, not in points.
    pub achievement_change: f64,
    /// Change in `collection_rate`, likewise relative.
    pub collection_rate_change: f64,
}

/// A sales record with its computed commission, as embedded in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesDetail {
    #[serde(flatten)]
    pub record: SalesRecord,
    pub commission: CommissionBreakdown,
}

/// Report entry for a single representative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepresentativeReport {
    pub representative_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub totals: PeriodSummary,
    pub sales_details: Vec<SalesDetail>,
}

/// The full report payload served by the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub period: PeriodRange,
    pub summary: PeriodSummary,
    pub representatives: Vec<RepresentativeReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_wraps_year() {
        let jan = Period::new(2024, 1).unwrap();
        assert_eq!(jan.previous(), Period { year: 2023, month: 12 });
        assert_eq!(Period::new(2024, 7).unwrap().previous().month, 6);
    }

    #[test]
    fn rejects_years_out_of_range() {
        assert_eq!(Period::new(i32::MIN, 1), Err(ValidationError::InvalidYear(i32::MIN)));
        assert_eq!(Period::new(0, 6), Err(ValidationError::InvalidYear(0)));
        assert_eq!(Period::new(10_000, 6), Err(ValidationError::InvalidYear(10_000)));
        let earliest = Period::new(MIN_YEAR, 1).unwrap();
        assert_eq!(earliest.previous(), Period { year: 0, month: 12 });
        assert!(Period::new(MAX_YEAR, 12).is_ok());
    }

    #[test]
    fn rejects_bad_month_and_inverted_range() {
        assert!(Period::new(2024, 0).is_err());
        assert!(Period::new(2024, 13).is_err());
        let a = Period::new(2024, 5).unwrap();
        let b = Period::new(2023, 11).unwrap();
        assert!(PeriodRange::new(a, b).is_err());
        let range = PeriodRange::new(b, a).unwrap();
        assert!(range.contains(2024, 1));
        assert!(range.contains(2023, 11));
        assert!(!range.contains(2024, 6));
    }

    #[test]
    fn rule_boundaries_are_optional() {
        let rule: CommissionRule = serde_json::from_str(
            r#"{"category":"pharma","tier1_rate":0.01,"tier2_rate":0.02,"tier3_rate":0.03}"#,
        )
        .unwrap();
        assert_eq!(rule.tier3_rate, 0.03);
        assert!(rule.tier1_from.is_none());
    }
}
