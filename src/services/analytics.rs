//! Dashboard, trend and committee-performance analytics.
//!
//! Unlike the printed statements these figures stay in rupees.

use crate::entities::{checkpost, committee, receipt, target};
use crate::errors::ServiceError;
use crate::financial_year::{FinancialMonth, FinancialYear, Quarter, Season};
use crate::services::aggregation::{
    achievement_percent, aggregate, growth_rate, share_percent, to_f64, total, Bucket, Group,
    GroupKey, ReceiptFact, UnitScale, Window,
};
use crate::services::committees::{self, CommitteeSummary};
use crate::services::reports::{load_facts, market_fee_total};
use crate::services::targets::TargetBook;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

const TOP_PERFORMERS: usize = 5;
const RECENT_RECEIPTS: u64 = 10;

fn rupees(amount: Decimal) -> f64 {
    UnitScale::Rupees.present(amount)
}

fn percent(value: Decimal) -> f64 {
    to_f64(value, 2)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub total_committees: u64,
    pub total_checkposts: u64,
    pub total_receipts: u64,
    pub total_targets: u64,
    /// Market fee collected across every financial year
    pub total_market_fee: f64,
    pub current_year_collection: f64,
    pub previous_year_collection: f64,
    pub growth_rate: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitteePerformanceSummary {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub total_collected: f64,
    pub yearly_target: f64,
    pub achievement: f64,
    pub receipt_count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrends {
    /// May first
    pub months: Vec<String>,
    pub current_year: Vec<f64>,
    pub previous_year: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentReceipt {
    pub id: Uuid,
    pub receipt_number: String,
    pub date: DateTime<Utc>,
    pub trader_name: String,
    pub market_fee: f64,
    pub committee: Option<CommitteeSummary>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub financial_year: String,
    pub overview: DashboardOverview,
    pub committee_performance: Vec<CommitteePerformanceSummary>,
    pub monthly_trends: MonthlyTrends,
    pub top_performers: Vec<CommitteePerformanceSummary>,
    pub recent_receipts: Vec<RecentReceipt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrendPeriod {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl TrendPeriod {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub period: String,
    pub amount: f64,
    pub count: u64,
    /// Change against the preceding point, 0 for the first or after an empty period
    pub growth_rate: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommodityShare {
    pub commodity: String,
    pub amount: f64,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeasonalPattern {
    pub season: Season,
    pub amount: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub total_amount: f64,
    pub total_receipts: u64,
    pub average_amount: f64,
    pub period: String,
    pub financial_year: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    pub trends: Vec<TrendPoint>,
    pub commodity_trends: Vec<CommodityShare>,
    pub seasonal_patterns: Vec<SeasonalPattern>,
    pub summary: TrendSummary,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceFigures {
    pub total_collection: f64,
    pub yearly_target: f64,
    pub achievement: f64,
    pub receipt_count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthPerformance {
    pub month: FinancialMonth,
    pub label: String,
    pub collection: f64,
    pub target: f64,
    pub achievement: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckpostPerformance {
    pub id: Uuid,
    pub name: String,
    pub collection: f64,
    pub receipt_count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitteePerformanceDetail {
    pub committee: CommitteeSummary,
    pub performance: PerformanceFigures,
    pub monthly_data: Vec<MonthPerformance>,
    pub checkpost_performance: Vec<CheckpostPerformance>,
    pub commodity_breakdown: Vec<CommodityShare>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum PerformanceReport {
    Committee(Box<CommitteePerformanceDetail>),
    All(Vec<CommitteePerformanceSummary>),
}

/// Per-committee collection against the yearly target, best achievement first.
pub fn committee_summaries(
    committees: &[committee::Model],
    targets: &TargetBook,
    facts: &[ReceiptFact],
    fy: FinancialYear,
) -> Vec<CommitteePerformanceSummary> {
    let collected = aggregate(facts, fy, GroupKey::Committee, Window::FullYear);
    let mut rows: Vec<CommitteePerformanceSummary> = committees
        .iter()
        .map(|c| {
            let bucket = collected
                .get(&Group::Committee(c.id))
                .copied()
                .unwrap_or_default();
            let yearly = targets.committee(c.id).yearly;
            CommitteePerformanceSummary {
                id: c.id,
                name: c.name.clone(),
                code: c.code.clone(),
                total_collected: rupees(bucket.amount),
                yearly_target: rupees(yearly),
                achievement: percent(achievement_percent(bucket.amount, yearly)),
                receipt_count: bucket.count,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.achievement
            .total_cmp(&a.achievement)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

/// Collections bucketed by `period`, oldest first, each with growth over its predecessor.
pub fn trend_points(facts: &[ReceiptFact], period: TrendPeriod) -> Vec<TrendPoint> {
    #[derive(PartialEq, Eq, PartialOrd, Ord)]
    enum Key {
        Month(FinancialYear, FinancialMonth),
        Quarter(FinancialYear, Quarter),
        Year(FinancialYear),
    }

    let mut buckets: BTreeMap<Key, (String, Bucket)> = BTreeMap::new();
    for fact in facts {
        let fy = fact.financial_year;
        let (key, label) = match period {
            TrendPeriod::Monthly => (
                Key::Month(fy, fact.month),
                format!("{} {}", fact.month.label(), fy.calendar_year_of(fact.month)),
            ),
            TrendPeriod::Quarterly => {
                let quarter = fact.month.quarter();
                (Key::Quarter(fy, quarter), format!("{} {}", quarter.label(), fy))
            }
            TrendPeriod::Yearly => (Key::Year(fy), fy.label()),
        };
        let entry = buckets.entry(key).or_insert_with(|| (label, Bucket::default()));
        entry.1.amount += fact.amount;
        entry.1.count += 1;
    }

    let mut previous: Option<Decimal> = None;
    buckets
        .into_values()
        .map(|(period, bucket)| {
            let growth = previous.map_or(Decimal::ZERO, |prev| growth_rate(prev, bucket.amount));
            previous = Some(bucket.amount);
            TrendPoint {
                period,
                amount: rupees(bucket.amount),
                count: bucket.count,
                growth_rate: percent(growth),
            }
        })
        .collect()
}

/// Commodity totals across all supplied facts, largest first.
pub fn commodity_shares<'a, I>(facts: I) -> Vec<CommodityShare>
where
    I: IntoIterator<Item = &'a ReceiptFact>,
{
    let mut groups: HashMap<&str, Bucket> = HashMap::new();
    let mut grand = Decimal::ZERO;
    for fact in facts {
        let bucket = groups.entry(fact.commodity.as_str()).or_default();
        bucket.amount += fact.amount;
        bucket.count += 1;
        grand += fact.amount;
    }
    let mut rows: Vec<(String, Bucket)> = groups
        .into_iter()
        .map(|(name, bucket)| (name.to_string(), bucket))
        .collect();
    rows.sort_by(|a, b| b.1.amount.cmp(&a.1.amount).then_with(|| a.0.cmp(&b.0)));
    rows.into_iter()
        .map(|(commodity, bucket)| CommodityShare {
            commodity,
            amount: rupees(bucket.amount),
            count: bucket.count,
            percentage: percent(share_percent(bucket.amount, grand)),
        })
        .collect()
}

/// Every season, in fixed order, even when empty.
pub fn seasonal_patterns(facts: &[ReceiptFact]) -> Vec<SeasonalPattern> {
    let mut buckets: BTreeMap<Season, Bucket> =
        Season::ALL.iter().map(|s| (*s, Bucket::default())).collect();
    for fact in facts {
        let bucket = buckets
            .entry(Season::of_calendar_month(fact.month.calendar_month()))
            .or_default();
        bucket.amount += fact.amount;
        bucket.count += 1;
    }
    buckets
        .into_iter()
        .map(|(season, bucket)| SeasonalPattern {
            season,
            amount: rupees(bucket.amount),
            count: bucket.count,
        })
        .collect()
}

#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<DatabaseConnection>,
}

impl AnalyticsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn active_committees(&self) -> Result<Vec<committee::Model>, ServiceError> {
        Ok(committee::Entity::find()
            .filter(committee::Column::IsActive.eq(true))
            .filter(committee::Column::DeletedAt.is_null())
            .order_by_asc(committee::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, fy: FinancialYear) -> Result<Dashboard, ServiceError> {
        let db = &*self.db;

        let total_committees = committee::Entity::find()
            .filter(committee::Column::IsActive.eq(true))
            .filter(committee::Column::DeletedAt.is_null())
            .count(db)
            .await?;
        let total_checkposts = checkpost::Entity::find()
            .filter(checkpost::Column::IsActive.eq(true))
            .filter(checkpost::Column::DeletedAt.is_null())
            .count(db)
            .await?;
        let total_receipts = receipt::Entity::find()
            .filter(receipt::Column::IsActive.eq(true))
            .filter(receipt::Column::DeletedAt.is_null())
            .count(db)
            .await?;
        let total_targets = target::Entity::find()
            .filter(target::Column::IsActive.eq(true))
            .filter(target::Column::DeletedAt.is_null())
            .count(db)
            .await?;

        let all_time = market_fee_total(db).await?;
        let facts = load_facts(db, &[fy, fy.previous()], None, true).await?;
        let current = total(&facts, fy, Window::FullYear).amount;
        let previous = total(&facts, fy.previous(), Window::FullYear).amount;

        let committees = self.active_committees().await?;
        let targets = TargetBook::load(db, fy).await?;
        let committee_performance = committee_summaries(&committees, &targets, &facts, fy);
        let top_performers = committee_performance
            .iter()
            .take(TOP_PERFORMERS)
            .cloned()
            .collect();

        let current_series = crate::services::aggregation::monthly_series(&facts, fy);
        let previous_series = crate::services::aggregation::monthly_series(&facts, fy.previous());
        let monthly_trends = MonthlyTrends {
            months: FinancialMonth::ALL
                .iter()
                .map(|m| m.label().to_string())
                .collect(),
            current_year: current_series.iter().map(|a| rupees(*a)).collect(),
            previous_year: previous_series.iter().map(|a| rupees(*a)).collect(),
        };

        let recent = receipt::Entity::find()
            .filter(receipt::Column::IsActive.eq(true))
            .filter(receipt::Column::DeletedAt.is_null())
            .order_by_desc(receipt::Column::CreatedAt)
            .limit(RECENT_RECEIPTS)
            .all(db)
            .await?;
        let names: HashMap<Uuid, CommitteeSummary> = committees
            .iter()
            .map(|c| (c.id, CommitteeSummary::from(c)))
            .collect();
        let recent_receipts = recent
            .into_iter()
            .map(|r| RecentReceipt {
                committee: names.get(&r.committee_id).cloned(),
                id: r.id,
                receipt_number: r.receipt_number,
                date: r.date,
                trader_name: r.trader_name,
                market_fee: rupees(r.market_fee),
                created_at: r.created_at,
            })
            .collect();

        Ok(Dashboard {
            financial_year: fy.label(),
            overview: DashboardOverview {
                total_committees,
                total_checkposts,
                total_receipts,
                total_targets,
                total_market_fee: rupees(all_time),
                current_year_collection: rupees(current),
                previous_year_collection: rupees(previous),
                growth_rate: percent(growth_rate(previous, current)),
            },
            committee_performance,
            monthly_trends,
            top_performers,
            recent_receipts,
        })
    }

    #[instrument(skip(self))]
    pub async fn trends(
        &self,
        period: TrendPeriod,
        fy: Option<FinancialYear>,
        committee_id: Option<Uuid>,
    ) -> Result<Trends, ServiceError> {
        let years: Vec<FinancialYear> = fy.into_iter().collect();
        let facts = load_facts(&*self.db, &years, committee_id, true).await?;

        let total_amount: Decimal = facts.iter().map(|f| f.amount).sum();
        let count = facts.len() as u64;
        let average = if count == 0 {
            Decimal::ZERO
        } else {
            total_amount / Decimal::from(count)
        };

        Ok(Trends {
            trends: trend_points(&facts, period),
            commodity_trends: commodity_shares(&facts),
            seasonal_patterns: seasonal_patterns(&facts),
            summary: TrendSummary {
                total_amount: rupees(total_amount),
                total_receipts: count,
                average_amount: rupees(average),
                period: period.as_str().to_string(),
                financial_year: fy.map(|y| y.label()),
            },
        })
    }

    #[instrument(skip(self))]
    pub async fn committee_performance(
        &self,
        fy: FinancialYear,
        committee_id: Option<Uuid>,
    ) -> Result<PerformanceReport, ServiceError> {
        let db = &*self.db;
        let targets = TargetBook::load(db, fy).await?;

        let Some(committee_id) = committee_id else {
            let committees = self.active_committees().await?;
            let facts = load_facts(db, &[fy], None, true).await?;
            return Ok(PerformanceReport::All(committee_summaries(
                &committees,
                &targets,
                &facts,
                fy,
            )));
        };

        let parent = committees::find_active(db, committee_id).await?;
        let facts = load_facts(db, &[fy], Some(committee_id), true).await?;
        let plan = targets.committee(committee_id);
        let overall = total(&facts, fy, Window::FullYear);

        let monthly_data = FinancialMonth::ALL
            .iter()
            .map(|month| {
                let collection = total(&facts, fy, Window::Month(*month)).amount;
                let target = plan.in_window(Window::Month(*month));
                MonthPerformance {
                    month: *month,
                    label: month.label().to_string(),
                    collection: rupees(collection),
                    target: rupees(target),
                    achievement: percent(achievement_percent(collection, target)),
                }
            })
            .collect();

        let by_checkpost = aggregate(&facts, fy, GroupKey::Checkpost, Window::FullYear);
        let checkpost_performance = checkpost::Entity::find()
            .filter(checkpost::Column::CommitteeId.eq(committee_id))
            .filter(checkpost::Column::IsActive.eq(true))
            .filter(checkpost::Column::DeletedAt.is_null())
            .order_by_asc(checkpost::Column::Name)
            .all(db)
            .await?
            .into_iter()
            .map(|cp| {
                let bucket = by_checkpost
                    .get(&Group::Checkpost(cp.id))
                    .copied()
                    .unwrap_or_default();
                CheckpostPerformance {
                    id: cp.id,
                    name: cp.name,
                    collection: rupees(bucket.amount),
                    receipt_count: bucket.count,
                }
            })
            .collect();

        Ok(PerformanceReport::Committee(Box::new(CommitteePerformanceDetail {
            committee: CommitteeSummary::from(&parent),
            performance: PerformanceFigures {
                total_collection: rupees(overall.amount),
                yearly_target: rupees(plan.yearly),
                achievement: percent(achievement_percent(overall.amount, plan.yearly)),
                receipt_count: overall.count,
            },
            monthly_data,
            checkpost_performance,
            commodity_breakdown: commodity_shares(facts.iter().filter(|f| f.financial_year == fy)),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aggregation::TargetPlan;
    use rust_decimal_macros::dec;

    fn fact(fy: i32, month: FinancialMonth, commodity: &str, amount: Decimal) -> ReceiptFact {
        ReceiptFact {
            committee_id: Uuid::nil(),
            checkpost_id: None,
            commodity: commodity.into(),
            financial_year: FinancialYear::new(fy),
            month,
            amount,
        }
    }

    #[test]
    fn monthly_trend_growth_follows_previous_point() {
        let facts = vec![
            fact(2025, FinancialMonth::June, "Paddy", dec!(150)),
            fact(2025, FinancialMonth::May, "Paddy", dec!(100)),
            fact(2025, FinancialMonth::January, "Paddy", dec!(75)),
        ];
        let points = trend_points(&facts, TrendPeriod::Monthly);
        let labels: Vec<&str> = points.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(labels, vec!["May 2025", "June 2025", "January 2026"]);
        assert_eq!(points[0].growth_rate, 0.0);
        assert_eq!(points[1].growth_rate, 50.0);
        assert_eq!(points[2].growth_rate, -50.0);
    }

    #[test]
    fn quarterly_and_yearly_buckets() {
        let facts = vec![
            fact(2024, FinancialMonth::March, "Paddy", dec!(10)),
            fact(2025, FinancialMonth::May, "Paddy", dec!(20)),
            fact(2025, FinancialMonth::July, "Paddy", dec!(30)),
        ];
        let quarters = trend_points(&facts, TrendPeriod::Quarterly);
        assert_eq!(quarters.len(), 2);
        assert_eq!(quarters[0].period, "Q4 2024-25");
        assert_eq!(quarters[1].amount, 50.0);
        assert_eq!(quarters[1].growth_rate, 400.0);

        let years = trend_points(&facts, TrendPeriod::Yearly);
        assert_eq!(years[1].period, "2025-26");
        assert_eq!(years[1].count, 2);
    }

    #[test]
    fn seasons_are_always_present() {
        let facts = vec![fact(2025, FinancialMonth::December, "Cotton", dec!(5))];
        let seasons = seasonal_patterns(&facts);
        assert_eq!(seasons.len(), 4);
        let winter = seasons.iter().find(|s| s.season == Season::Winter).unwrap();
        assert_eq!(winter.count, 1);
        assert!(seasons
            .iter()
            .filter(|s| s.season != Season::Winter)
            .all(|s| s.count == 0));
    }

    #[test]
    fn commodity_percentages_sum_to_whole() {
        let facts = vec![
            fact(2025, FinancialMonth::May, "Paddy", dec!(300)),
            fact(2025, FinancialMonth::May, "Maize", dec!(100)),
        ];
        let shares = commodity_shares(&facts);
        assert_eq!(shares[0].commodity, "Paddy");
        assert_eq!(shares[0].percentage, 75.0);
        assert_eq!(shares[1].percentage, 25.0);
    }

    #[test]
    fn summaries_rank_by_achievement() {
        let now = Utc::now();
        let make = |name: &str| committee::Model {
            id: Uuid::new_v4(),
            name: name.into(),
            code: format!("{}-AMC", name.to_uppercase()),
            district: "KAKINADA".into(),
            state: "Andhra Pradesh".into(),
            has_checkposts: false,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let (a, b) = (make("Tuni"), make("Karapa"));
        let mut targets = TargetBook::default();
        targets.committees.insert(a.id, TargetPlan::new(dec!(1000)));
        targets.committees.insert(b.id, TargetPlan::new(dec!(100)));

        let fy = FinancialYear::new(2025);
        let mut fa = fact(2025, FinancialMonth::May, "Paddy", dec!(100));
        fa.committee_id = a.id;
        let mut fb = fact(2025, FinancialMonth::May, "Paddy", dec!(50));
        fb.committee_id = b.id;

        let rows = committee_summaries(&[a, b], &targets, &[fa, fb], fy);
        assert_eq!(rows[0].name, "Karapa");
        assert_eq!(rows[0].achievement, 50.0);
        assert_eq!(rows[1].achievement, 10.0);
    }
}
