//! Aggregation engine.
//!
//! The `engine` module turns snapshots of sales, collection and
//! commission-rule records into per-representative and overall
//! [`PeriodSummary`] values.  Commission is computed once per sales
//! record with [`calculate_commission`](crate::commission::calculate_commission)
//! and the rounded per-record totals are summed, never the other way
//! around.  Per-record computation is spread over the [`rayon`] pool;
//! results are collected in input order so totals are deterministic.
//!
//! Missing data contributes zero: a category without a rule earns no
//! commission and a representative without collections collects
//! nothing.  Empty input yields zeroed summaries.

use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

use crate::commission::{round2, RuleBook};
use crate::models::{
    CollectionRecord, CommissionBreakdown, CommissionRule, PeriodComparison, PeriodRange,
    PeriodSummary, RankedRepresentative, Report, Representative, RepresentativeReport,
    SalesDetail, SalesRecord,
};

/// Weights of the balanced score.  They sum to one by default, which
/// keeps the score on a 0 to 100 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub achievement: f64,
    pub sales_norm: f64,
    pub collection_norm: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            achievement: 0.5,
            sales_norm: 0.3,
            collection_norm: 0.2,
        }
    }
}

/// Result of [`aggregate_period`].  Representatives are keyed in id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub per_representative: BTreeMap<String, PeriodSummary>,
    pub overall: PeriodSummary,
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    sales: f64,
    target: f64,
    collection: f64,
    commission: f64,
}

impl Totals {
    fn add(&mut self, other: &Totals) {
        self.sales += other.sales;
        self.target += other.target;
        self.collection += other.collection;
        self.commission += other.commission;
    }

    fn summary(&self) -> PeriodSummary {
        PeriodSummary {
            total_sales: round2(self.sales),
            total_target: round2(self.target),
            total_collection: round2(self.collection),
            total_commission: round2(self.commission),
            achievement_percentage: round2(achievement_percentage(self.sales, self.target)),
            collection_rate: round2(collection_rate(self.collection, self.sales)),
        }
    }
}

/// `sales / target * 100`, or zero when there is no target.
pub fn achievement_percentage(sales: f64, target: f64) -> f64 {
    if target > 0.0 {
        sales / target * 100.0
    } else {
        0.0
    }
}

fn collection_rate(collection: f64, sales: f64) -> f64 {
    if sales > 0.0 {
        collection / sales * 100.0
    } else {
        0.0
    }
}

/// Computes each record's commission in parallel, preserving input order.
fn commissions(sales: &[SalesRecord], rules: &RuleBook) -> Vec<CommissionBreakdown> {
    sales
        .par_iter()
        .map(|record| rules.commission_for(record))
        .collect()
}

/// Aggregates sales, collections and commission per representative and
/// overall.
///
/// The caller is expected to have already filtered the records to the
/// period of interest.  Collections are summed per representative as
/// given; they are never multiplied across that representative's
/// categories.
pub fn aggregate_period(
    sales: &[SalesRecord],
    collections: &[CollectionRecord],
    rules: &[CommissionRule],
) -> Aggregation {
    let book = RuleBook::new(rules);
    let breakdowns = commissions(sales, &book);
    aggregate_breakdowns(sales, &breakdowns, collections)
}

/// Groups already computed per-record breakdowns by representative.
/// `breakdowns[i]` belongs to `sales[i]`.
fn aggregate_breakdowns(
    sales: &[SalesRecord],
    breakdowns: &[CommissionBreakdown],
    collections: &[CollectionRecord],
) -> Aggregation {
    let mut per_rep: BTreeMap<String, Totals> = BTreeMap::new();
    for (record, breakdown) in sales.iter().zip(breakdowns) {
        let totals = per_rep.entry(record.representative_id.clone()).or_default();
        totals.sales += record.sales;
        totals.target += record.target;
        totals.commission += breakdown.total_commission;
    }
    for record in collections {
        per_rep
            .entry(record.representative_id.clone())
            .or_default()
            .collection += record.amount;
    }

    let mut overall = Totals::default();
    for totals in per_rep.values() {
        overall.add(totals);
    }

    Aggregation {
        per_representative: per_rep
            .into_iter()
            .map(|(id, totals)| (id, totals.summary()))
            .collect(),
        overall: overall.summary(),
    }
}

/// Aggregates sales and commission per category.  Collections have no
/// category, so `total_collection` and `collection_rate` stay zero.
pub fn aggregate_by_category(
    sales: &[SalesRecord],
    rules: &[CommissionRule],
) -> BTreeMap<String, PeriodSummary> {
    let book = RuleBook::new(rules);
    let breakdowns = commissions(sales, &book);

    let mut per_category: BTreeMap<String, Totals> = BTreeMap::new();
    for (record, breakdown) in sales.iter().zip(&breakdowns) {
        let totals = per_category.entry(record.category.clone()).or_default();
        totals.sales += record.sales;
        totals.target += record.target;
        totals.commission += breakdown.total_commission;
    }
    per_category
        .into_iter()
        .map(|(category, totals)| (category, totals.summary()))
        .collect()
}

/// Ranks representatives by balanced score, highest first.
///
/// Achievement is capped at 100 before weighting.  Sales and collection
/// are normalised against the largest value in the input, so the best
/// seller scores the full sales weight; when that maximum is zero the
/// term is zero for everyone.  Equal scores keep their input order.
pub fn rank_by_balanced_score<'a, I>(representatives: I, weights: ScoreWeights) -> Vec<RankedRepresentative>
where
    I: IntoIterator<Item = (&'a String, &'a PeriodSummary)>,
{
    let entries: Vec<(&String, &PeriodSummary)> = representatives.into_iter().collect();
    let max_sales = entries
        .iter()
        .map(|(_, s)| s.total_sales)
        .fold(0.0_f64, f64::max);
    let max_collection = entries
        .iter()
        .map(|(_, s)| s.total_collection)
        .fold(0.0_f64, f64::max);

    let mut ranked: Vec<RankedRepresentative> = entries
        .into_iter()
        .map(|(id, summary)| {
            let attainment_score = summary.achievement_percentage.min(100.0) * weights.achievement;
            let sales_norm = if max_sales > 0.0 {
                summary.total_sales / max_sales * 100.0
            } else {
                0.0
            };
            let collection_norm = if max_collection > 0.0 {
                summary.total_collection / max_collection * 100.0
            } else {
                0.0
            };
            let sales_score = sales_norm * weights.sales_norm;
            let collection_score = collection_norm * weights.collection_norm;
            RankedRepresentative {
                representative_id: id.clone(),
                summary: *summary,
                attainment_score,
                sales_score,
                collection_score,
                balanced_score: attainment_score + sales_score + collection_score,
            }
        })
        .collect();

    // sort_by is stable, which keeps ties in input order.
    ranked.sort_by(|a, b| b.balanced_score.total_cmp(&a.balanced_score));
    ranked
}

/// Percentage change from `previous` to `current`.  From a zero base any
/// growth counts as 100% and anything else as 0%.
pub fn percentage_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

pub fn compare_periods(current: &PeriodSummary, previous: &PeriodSummary) -> PeriodComparison {
    PeriodComparison {
        sales_change: percentage_change(previous.total_sales, current.total_sales),
        target_change: percentage_change(previous.total_target, current.total_target),
        collection_change: percentage_change(previous.total_collection, current.total_collection),
        commission_change: percentage_change(previous.total_commission, current.total_commission),
        achievement_change: percentage_change(
            previous.achievement_percentage,
            current.achievement_percentage,
        ),
        collection_rate_change: percentage_change(previous.collection_rate, current.collection_rate),
    }
}

/// Builds the report payload for `range`.
///
/// Records outside the range are ignored.  Every representative that has
/// sales or collections in range gets an entry, in id order, with its
/// sales rows and their commission breakdowns.
pub fn build_report(
    range: PeriodRange,
    sales: &[SalesRecord],
    collections: &[CollectionRecord],
    rules: &[CommissionRule],
    representatives: &[Representative],
) -> Report {
    let sales: Vec<SalesRecord> = sales
        .iter()
        .filter(|r| range.contains(r.year, r.month))
        .cloned()
        .collect();
    let collections: Vec<CollectionRecord> = collections
        .iter()
        .filter(|r| range.contains(r.year, r.month))
        .cloned()
        .collect();

    let book = RuleBook::new(rules);
    let breakdowns = commissions(&sales, &book);
    let aggregation = aggregate_breakdowns(&sales, &breakdowns, &collections);

    let mut details: HashMap<&str, Vec<SalesDetail>> = HashMap::new();
    for (record, commission) in sales.iter().zip(breakdowns) {
        details
            .entry(record.representative_id.as_str())
            .or_default()
            .push(SalesDetail {
                record: record.clone(),
                commission,
            });
    }
    let names: HashMap<&str, &str> = representatives
        .iter()
        .map(|r| (r.id.as_str(), r.name.as_str()))
        .collect();

    let entries = aggregation
        .per_representative
        .iter()
        .map(|(id, totals)| RepresentativeReport {
            representative_id: id.clone(),
            name: names.get(id.as_str()).map(|n| n.to_string()),
            totals: *totals,
            sales_details: details.remove(id.as_str()).unwrap_or_default(),
        })
        .collect();

    Report {
        period: range,
        summary: aggregation.overall,
        representatives: entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::calculate_commission;
    use crate::models::Period;

    fn sale(rep: &str, category: &str, sales: f64, target: f64, month: u32) -> SalesRecord {
        SalesRecord {
            representative_id: rep.into(),
            company_id: Some("acme".into()),
            category: category.into(),
            sales,
            target,
            year: 2024,
            month,
        }
    }

    fn collection(rep: &str, amount: f64, month: u32) -> CollectionRecord {
        CollectionRecord {
            representative_id: rep.into(),
            company_id: Some("acme".into()),
            amount,
            year: 2024,
            month,
        }
    }

    fn rule(category: &str, t1: f64, t2: f64, t3: f64) -> CommissionRule {
        CommissionRule {
            category: category.into(),
            tier1_rate: t1,
            tier2_rate: t2,
            tier3_rate: t3,
            tier1_from: None,
            tier1_to: None,
            tier2_from: None,
            tier2_to: None,
            tier3_from: None,
        }
    }

    fn summary(sales: f64, target: f64, collection: f64) -> PeriodSummary {
        PeriodSummary {
            total_sales: sales,
            total_target: target,
            total_collection: collection,
            total_commission: 0.0,
            achievement_percentage: achievement_percentage(sales, target),
            collection_rate: 0.0,
        }
    }

    #[test]
    fn empty_input_is_zeroed() {
        let result = aggregate_period(&[], &[], &[]);
        assert!(result.per_representative.is_empty());
        assert_eq!(result.overall, PeriodSummary::default());
    }

    #[test]
    fn groups_by_representative() {
        let sales = vec![
            sale("a", "pharma", 800.0, 1000.0, 1),
            sale("a", "devices", 500.0, 400.0, 1),
            sale("b", "pharma", 100.0, 1000.0, 1),
        ];
        let collections = vec![collection("a", 900.0, 1), collection("c", 50.0, 1)];
        let rules = vec![rule("pharma", 0.1, 0.1, 0.1), rule("devices", 0.05, 0.05, 0.05)];

        let result = aggregate_period(&sales, &collections, &rules);
        let a = &result.per_representative["a"];
        assert_eq!(a.total_sales, 1300.0);
        assert_eq!(a.total_target, 1400.0);
        assert_eq!(a.total_collection, 900.0);
        // pharma: 70 + 30; devices: 14 + 6 + 5
        assert_eq!(a.total_commission, 125.0);
        assert_eq!(a.achievement_percentage, 92.86);

        let b = &result.per_representative["b"];
        assert_eq!(b.total_commission, 70.0);
        assert_eq!(b.achievement_percentage, 10.0);
        assert_eq!(b.total_collection, 0.0);

        // Collections without sales still show up.
        let c = &result.per_representative["c"];
        assert_eq!(c.total_collection, 50.0);
        assert_eq!(c.achievement_percentage, 0.0);

        assert_eq!(result.overall.total_sales, 1400.0);
        assert_eq!(result.overall.total_collection, 950.0);
        assert_eq!(result.overall.total_commission, 195.0);
        assert_eq!(result.overall.achievement_percentage, 58.33);
    }

    #[test]
    fn overall_commission_is_sum_of_rounded_record_commissions() {
        let sales = vec![
            sale("a", "x", 1234.567, 999.99, 1),
            sale("a", "y", 50.0, 0.0, 2),
            sale("b", "x", 321.0, 1111.11, 1),
            sale("c", "missing", 10_000.0, 5_000.0, 1),
        ];
        let rules = vec![rule("x", 0.0333, 0.0417, 0.0555), rule("y", 0.011, 0.0, 0.0)];
        let expected: f64 = sales
            .iter()
            .map(|r| match rules.iter().find(|rule| rule.category == r.category) {
                Some(rule) => {
                    calculate_commission(r.sales, r.target, rule.tier1_rate, rule.tier2_rate, rule.tier3_rate)
                        .total_commission
                }
                None => 0.0,
            })
            .sum();

        let result = aggregate_period(&sales, &[], &rules);
        assert!((result.overall.total_commission - round2(expected)).abs() < 1e-9);
        assert_eq!(result.per_representative["c"].total_commission, 0.0);
    }

    #[test]
    fn zero_target_gives_zero_achievement() {
        let result = aggregate_period(&[sale("a", "x", 500.0, 0.0, 1)], &[], &[]);
        assert_eq!(result.per_representative["a"].achievement_percentage, 0.0);
    }

    #[test]
    fn collection_rate_against_sales() {
        let result = aggregate_period(
            &[sale("a", "x", 2000.0, 2000.0, 1)],
            &[collection("a", 1500.0, 1)],
            &[],
        );
        assert_eq!(result.overall.collection_rate, 75.0);
    }

    #[test]
    fn by_category_keeps_collection_out() {
        let sales = vec![
            sale("a", "pharma", 800.0, 1000.0, 1),
            sale("b", "pharma", 1200.0, 1000.0, 1),
            sale("a", "devices", 10.0, 0.0, 1),
        ];
        let rules = vec![rule("pharma", 0.1, 0.1, 0.1)];
        let result = aggregate_by_category(&sales, &rules);
        let pharma = &result["pharma"];
        assert_eq!(pharma.total_sales, 2000.0);
        assert_eq!(pharma.total_commission, 100.0 + 120.0);
        assert_eq!(pharma.total_collection, 0.0);
        assert_eq!(result["devices"].total_commission, 0.0);
    }

    #[test]
    fn percentage_change_boundaries() {
        assert_eq!(percentage_change(0.0, 0.0), 0.0);
        assert_eq!(percentage_change(0.0, 5.0), 100.0);
        assert_eq!(percentage_change(100.0, 50.0), -50.0);
        assert_eq!(percentage_change(50.0, 75.0), 50.0);
    }

    #[test]
    fn compare_periods_per_field() {
        let previous = PeriodSummary {
            total_sales: 1000.0,
            total_target: 1000.0,
            total_collection: 0.0,
            total_commission: 80.0,
            achievement_percentage: 100.0,
            collection_rate: 0.0,
        };
        let current = PeriodSummary {
            total_sales: 1500.0,
            total_target: 1000.0,
            total_collection: 300.0,
            total_commission: 60.0,
            achievement_percentage: 150.0,
            collection_rate: 20.0,
        };
        let change = compare_periods(&current, &previous);
        assert_eq!(change.sales_change, 50.0);
        assert_eq!(change.target_change, 0.0);
        assert_eq!(change.collection_change, 100.0);
        assert_eq!(change.commission_change, -25.0);
        assert_eq!(change.achievement_change, 50.0);
        assert_eq!(change.collection_rate_change, 100.0);
    }

    #[test]
    fn zero_sales_contributes_no_sales_score() {
        let reps: BTreeMap<String, PeriodSummary> = [
            ("a".to_string(), summary(0.0, 1000.0, 500.0)),
            ("b".to_string(), summary(9000.0, 1000.0, 0.0)),
        ]
        .into_iter()
        .collect();
        let ranked = rank_by_balanced_score(&reps, ScoreWeights::default());
        let a = ranked.iter().find(|r| r.representative_id == "a").unwrap();
        assert_eq!(a.sales_score, 0.0);
        assert_eq!(a.attainment_score, 0.0);
        assert_eq!(a.balanced_score, 20.0);
        assert_eq!(ranked[0].representative_id, "b");
    }

    #[test]
    fn all_zero_period_ranks_without_nan() {
        let reps: BTreeMap<String, PeriodSummary> = [
            ("a".to_string(), PeriodSummary::default()),
            ("b".to_string(), PeriodSummary::default()),
        ]
        .into_iter()
        .collect();
        let ranked = rank_by_balanced_score(&reps, ScoreWeights::default());
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| r.balanced_score == 0.0));
        // ties keep input order
        assert_eq!(ranked[0].representative_id, "a");
        assert_eq!(ranked[1].representative_id, "b");
    }

    #[test]
    fn balanced_ranking_weights_volume_and_collection() {
        let sales = vec![
            sale("rep-high", "x", 100_000.0, 100_000.0, 1),
            sale("rep-mid", "x", 80_000.0, 100_000.0, 1),
            sale("rep-low", "x", 50_000.0, 100_000.0, 1),
        ];
        let collections = vec![
            collection("rep-high", 90_000.0, 1),
            collection("rep-mid", 85_000.0, 1),
            collection("rep-low", 40_000.0, 1),
        ];
        let rules = vec![rule("x", 0.05, 0.05, 0.05)];
        let agg = aggregate_period(&sales, &collections, &rules);
        let ranked = rank_by_balanced_score(&agg.per_representative, ScoreWeights::default());
        let order: Vec<&str> = ranked.iter().map(|r| r.representative_id.as_str()).collect();
        assert_eq!(order, vec!["rep-high", "rep-mid", "rep-low"]);
        assert!((ranked[0].balanced_score - 100.0).abs() < 1e-9);

        // A smaller target lifts rep-low's achievement above rep-mid's,
        // yet the volume and collection terms still keep it behind.
        let mut sales = sales;
        sales[2].target = 40_000.0;
        let agg = aggregate_period(&sales, &collections, &rules);
        assert!(
            agg.per_representative["rep-low"].achievement_percentage
                > agg.per_representative["rep-mid"].achievement_percentage
        );
        let ranked = rank_by_balanced_score(&agg.per_representative, ScoreWeights::default());
        let mid = ranked.iter().position(|r| r.representative_id == "rep-mid").unwrap();
        let low = ranked.iter().position(|r| r.representative_id == "rep-low").unwrap();
        assert!(mid < low);
    }

    #[test]
    fn report_filters_range_and_embeds_commission() {
        let sales = vec![
            sale("a", "x", 1200.0, 1000.0, 3),
            sale("a", "x", 9999.0, 1000.0, 4),
            sale("b", "x", 0.0, 1000.0, 3),
        ];
        let collections = vec![collection("a", 700.0, 3), collection("a", 5.0, 4)];
        let rules = vec![rule("x", 0.1, 0.1, 0.2)];
        let reps = vec![Representative { id: "a".into(), name: "Alice".into() }];
        let range = PeriodRange::single(Period::new(2024, 3).unwrap());

        let report = build_report(range, &sales, &collections, &rules, &reps);
        assert_eq!(report.representatives.len(), 2);
        let a = &report.representatives[0];
        assert_eq!(a.representative_id, "a");
        assert_eq!(a.name.as_deref(), Some("Alice"));
        assert_eq!(a.totals.total_collection, 700.0);
        assert_eq!(a.sales_details.len(), 1);
        assert_eq!(a.sales_details[0].commission.tier3_commission, 40.0);
        assert_eq!(a.totals.total_commission, 140.0);
        assert_eq!(report.representatives[1].name, None);
        assert_eq!(report.summary.total_commission, 210.0);
    }

    #[test]
    fn report_totals_agree_with_details_and_aggregation() {
        let sales = vec![
            sale("a", "x", 1234.567, 999.99, 6),
            sale("a", "y", 50.0, 0.0, 6),
            sale("b", "x", 321.0, 1111.11, 6),
            sale("b", "missing", 800.0, 700.0, 6),
        ];
        let collections = vec![collection("a", 600.0, 6), collection("b", 150.0, 6)];
        let rules = vec![rule("x", 0.0333, 0.0417, 0.0555), rule("y", 0.011, 0.0, 0.0)];
        let range = PeriodRange::single(Period::new(2024, 6).unwrap());

        let report = build_report(range, &sales, &collections, &rules, &[]);
        let aggregation = aggregate_period(&sales, &collections, &rules);
        assert_eq!(report.summary, aggregation.overall);
        for entry in &report.representatives {
            assert_eq!(entry.totals, aggregation.per_representative[&entry.representative_id]);
            let from_details: f64 = entry
                .sales_details
                .iter()
                .map(|d| d.commission.total_commission)
                .sum();
            assert!((entry.totals.total_commission - round2(from_details)).abs() < 1e-9);
        }
    }
}
