//! Statement reports comparing market-fee collections against targets.
//!
//! All three statements are views over the same aggregation: receipts of
//! the selected financial year and the one before it, reduced per
//! committee, per checkpost or per commodity. Amounts are reported in
//! lakhs with two decimals.

use crate::entities::{checkpost, committee, receipt, NatureOfReceipt};
use crate::errors::ServiceError;
use crate::financial_year::{FinancialMonth, FinancialYear};
use crate::services::aggregation::{
    achievement_percent, aggregate, share_percent, to_f64, total, Bucket, Group, GroupKey,
    ReceiptFact, TargetPlan, UnitScale, Window,
};
use crate::services::committees;
use crate::services::targets::TargetBook;
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::SelectStatement, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, QueryTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Add;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Ids of committees that have not been soft-deleted
fn active_committee_ids() -> SelectStatement {
    committee::Entity::find()
        .select_only()
        .column(committee::Column::Id)
        .filter(committee::Column::IsActive.eq(true))
        .filter(committee::Column::DeletedAt.is_null())
        .into_query()
}

/// Active receipts of active committees for the given years as aggregation
/// facts; no years means every year.
pub(crate) async fn load_facts<C: ConnectionTrait>(
    db: &C,
    years: &[FinancialYear],
    committee_id: Option<Uuid>,
    market_fee_only: bool,
) -> Result<Vec<ReceiptFact>, ServiceError> {
    let mut query = receipt::Entity::find()
        .filter(receipt::Column::IsActive.eq(true))
        .filter(receipt::Column::DeletedAt.is_null())
        .filter(receipt::Column::CommitteeId.in_subquery(active_committee_ids()))
        .order_by_asc(receipt::Column::Date);
    if !years.is_empty() {
        let labels: Vec<String> = years.iter().map(FinancialYear::label).collect();
        query = query.filter(receipt::Column::FinancialYear.is_in(labels));
    }
    if let Some(committee_id) = committee_id {
        query = query.filter(receipt::Column::CommitteeId.eq(committee_id));
    }
    if market_fee_only {
        query = query.filter(receipt::Column::NatureOfReceipt.eq(NatureOfReceipt::Mf));
    }
    Ok(query
        .all(db)
        .await?
        .iter()
        .filter_map(ReceiptFact::from_receipt)
        .collect())
}

/// All-time market fee of active MF receipts, summed in the database.
pub(crate) async fn market_fee_total<C: ConnectionTrait>(db: &C) -> Result<Decimal, ServiceError> {
    let sum = receipt::Entity::find()
        .select_only()
        .column_as(receipt::Column::MarketFee.sum(), "total")
        .filter(receipt::Column::IsActive.eq(true))
        .filter(receipt::Column::DeletedAt.is_null())
        .filter(receipt::Column::NatureOfReceipt.eq(NatureOfReceipt::Mf))
        .filter(receipt::Column::CommitteeId.in_subquery(active_committee_ids()))
        .into_tuple::<Option<Decimal>>()
        .one(db)
        .await?;
    Ok(sum.flatten().unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ReportKind {
    Statement1,
    Statement2,
    Commodity,
    #[default]
    All,
}

impl ReportKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "statement1" => Some(Self::Statement1),
            "statement2" => Some(Self::Statement2),
            "commodity" => Some(Self::Commodity),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Statement1 => "statement1",
            Self::Statement2 => "statement2",
            Self::Commodity => "commodity",
            Self::All => "all",
        }
    }

    fn includes(self, other: ReportKind) -> bool {
        self == ReportKind::All || self == other
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReportQuery {
    pub financial_year: FinancialYear,
    pub month: FinancialMonth,
    pub committee_id: Option<Uuid>,
    pub kind: ReportKind,
}

/// Target-versus-collection figures in rupees
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Figures {
    pub yearly_target: Decimal,
    pub monthly_target: Decimal,
    pub month_previous: Decimal,
    pub month_current: Decimal,
    pub cumulative_target: Decimal,
    pub progressive_previous: Decimal,
    pub progressive_current: Decimal,
}

impl Add for Figures {
    type Output = Figures;

    fn add(self, rhs: Figures) -> Figures {
        Figures {
            yearly_target: self.yearly_target + rhs.yearly_target,
            monthly_target: self.monthly_target + rhs.monthly_target,
            month_previous: self.month_previous + rhs.month_previous,
            month_current: self.month_current + rhs.month_current,
            cumulative_target: self.cumulative_target + rhs.cumulative_target,
            progressive_previous: self.progressive_previous + rhs.progressive_previous,
            progressive_current: self.progressive_current + rhs.progressive_current,
        }
    }
}

impl Figures {
    fn compute(
        plan: &TargetPlan,
        month: FinancialMonth,
        current: (Bucket, Bucket),
        previous: (Bucket, Bucket),
    ) -> Self {
        Self {
            yearly_target: plan.yearly,
            monthly_target: plan.in_window(Window::Month(month)),
            month_current: current.0.amount,
            progressive_current: current.1.amount,
            month_previous: previous.0.amount,
            progressive_previous: previous.1.amount,
            cumulative_target: plan.in_window(Window::Cumulative(month)),
        }
    }

    pub fn present(&self, unit: UnitScale) -> Comparison {
        Comparison {
            yearly_target: unit.present(self.yearly_target),
            monthly_target: unit.present(self.monthly_target),
            current_month_prev: unit.present(self.month_previous),
            current_month_current: unit.present(self.month_current),
            difference: unit.present(self.month_current - self.month_previous),
            cumulative_target: unit.present(self.cumulative_target),
            progressive_prev: unit.present(self.progressive_previous),
            progressive_current: unit.present(self.progressive_current),
            progressive_difference: unit.present(self.progressive_current - self.progressive_previous),
            percentage_achieved: to_f64(
                achievement_percent(self.progressive_current, self.yearly_target),
                0,
            ),
            cumulative_achievement: to_f64(
                achievement_percent(self.progressive_current, self.cumulative_target),
                2,
            ),
        }
    }
}

/// Statement columns shared by committee and checkpost rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub yearly_target: f64,
    /// Target of the selected month
    pub monthly_target: f64,
    /// Selected month of the previous financial year
    pub current_month_prev: f64,
    pub current_month_current: f64,
    pub difference: f64,
    /// Sum of monthly targets from May through the selected month
    pub cumulative_target: f64,
    pub progressive_prev: f64,
    pub progressive_current: f64,
    pub progressive_difference: f64,
    /// Progressive collection against the yearly target, whole percent
    pub percentage_achieved: f64,
    /// Progressive collection against the cumulative target
    pub cumulative_achievement: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Statement1Row {
    pub sl_no: usize,
    pub committee_id: Uuid,
    pub amc_name: String,
    pub amc_code: String,
    #[serde(flatten)]
    pub figures: Comparison,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Statement2Row {
    pub sl_no: usize,
    pub checkpost_id: Uuid,
    pub checkpost_name: String,
    pub committee_id: Uuid,
    pub amc_name: String,
    pub amc_code: String,
    #[serde(flatten)]
    pub figures: Comparison,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Statement<R> {
    pub title: String,
    pub rows: Vec<R>,
    pub totals: Comparison,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommodityRow {
    pub sl_no: usize,
    pub commodity: String,
    pub current_month: f64,
    pub progressive_current: f64,
    pub progressive_previous: f64,
    pub difference: f64,
    pub receipt_count: u64,
    /// Share of the progressive total
    pub share_percent: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommodityTotals {
    pub current_month: f64,
    pub progressive_current: f64,
    pub progressive_previous: f64,
    pub difference: f64,
    pub receipt_count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommodityStatement {
    pub title: String,
    pub rows: Vec<CommodityRow>,
    pub totals: CommodityTotals,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub financial_year: String,
    pub previous_financial_year: String,
    pub selected_month: String,
    pub generated_at: DateTime<Utc>,
    pub total_committees: usize,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarketFeeReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement1: Option<Statement<Statement1Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement2: Option<Statement<Statement2Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commodity_statement: Option<CommodityStatement>,
    pub metadata: ReportMetadata,
}

/// Everything a report needs, already loaded
pub struct ReportInputs {
    pub committees: Vec<committee::Model>,
    pub checkposts: Vec<checkpost::Model>,
    pub targets: TargetBook,
    pub facts: Vec<ReceiptFact>,
}

fn windows(month: FinancialMonth) -> (Window, Window) {
    (Window::Month(month), Window::Cumulative(month))
}

fn bucket_pair(
    facts: &[ReceiptFact],
    year: FinancialYear,
    key: GroupKey,
    month: FinancialMonth,
) -> (BTreeMap<Group, Bucket>, BTreeMap<Group, Bucket>) {
    let (single, cumulative) = windows(month);
    (
        aggregate(facts, year, key, single),
        aggregate(facts, year, key, cumulative),
    )
}

fn lookup(
    pair: &(BTreeMap<Group, Bucket>, BTreeMap<Group, Bucket>),
    group: &Group,
) -> (Bucket, Bucket) {
    (
        pair.0.get(group).copied().unwrap_or_default(),
        pair.1.get(group).copied().unwrap_or_default(),
    )
}

/// Statement No.1: one row per committee.
pub fn statement1(query: &ReportQuery, inputs: &ReportInputs) -> Statement<Statement1Row> {
    let fy = query.financial_year;
    let current = bucket_pair(&inputs.facts, fy, GroupKey::Committee, query.month);
    let previous = bucket_pair(&inputs.facts, fy.previous(), GroupKey::Committee, query.month);

    let mut totals = Figures::default();
    let rows = inputs
        .committees
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let group = Group::Committee(c.id);
            let figures = Figures::compute(
                &inputs.targets.committee(c.id),
                query.month,
                lookup(&current, &group),
                lookup(&previous, &group),
            );
            totals = totals + figures;
            Statement1Row {
                sl_no: i + 1,
                committee_id: c.id,
                amc_name: c.name.clone(),
                amc_code: c.code.clone(),
                figures: figures.present(UnitScale::Lakhs),
            }
        })
        .collect();

    Statement {
        title: format!(
            "Statement No.1: Market fee collection against targets for {} ({})",
            query.month.label(),
            fy
        ),
        rows,
        totals: totals.present(UnitScale::Lakhs),
    }
}

/// Statement No.2: one row per checkpost of committees that have checkposts.
pub fn statement2(query: &ReportQuery, inputs: &ReportInputs) -> Statement<Statement2Row> {
    let fy = query.financial_year;
    let current = bucket_pair(&inputs.facts, fy, GroupKey::Checkpost, query.month);
    let previous = bucket_pair(&inputs.facts, fy.previous(), GroupKey::Checkpost, query.month);
    let mut totals = Figures::default();
    let mut rows = Vec::new();
    for parent in inputs.committees.iter().filter(|c| c.has_checkposts) {
        for cp in inputs.checkposts.iter().filter(|cp| cp.committee_id == parent.id) {
            let group = Group::Checkpost(cp.id);
            let figures = Figures::compute(
                &inputs.targets.checkpost(cp.id),
                query.month,
                lookup(&current, &group),
                lookup(&previous, &group),
            );
            totals = totals + figures;
            rows.push(Statement2Row {
                sl_no: rows.len() + 1,
                checkpost_id: cp.id,
                checkpost_name: cp.name.clone(),
                committee_id: parent.id,
                amc_name: parent.name.clone(),
                amc_code: parent.code.clone(),
                figures: figures.present(UnitScale::Lakhs),
            });
        }
    }

    Statement {
        title: format!(
            "Statement No.2: Checkpost-wise market fee collection for {} ({})",
            query.month.label(),
            fy
        ),
        rows,
        totals: totals.present(UnitScale::Lakhs),
    }
}

/// Commodity statement: one row per distinct commodity, largest progressive total first.
pub fn commodity_statement(query: &ReportQuery, inputs: &ReportInputs) -> CommodityStatement {
    let fy = query.financial_year;
    let (month_groups, progressive) = bucket_pair(&inputs.facts, fy, GroupKey::Commodity, query.month);
    let previous = aggregate(
        &inputs.facts,
        fy.previous(),
        GroupKey::Commodity,
        Window::Cumulative(query.month),
    );
    let grand_total = total(&inputs.facts, fy, Window::Cumulative(query.month)).amount;

    let mut names: Vec<&Group> = progressive.keys().chain(previous.keys()).collect();
    names.sort();
    names.dedup();

    let mut entries: Vec<(String, Bucket, Bucket, Bucket)> = names
        .into_iter()
        .filter_map(|group| match group {
            Group::Commodity(name) => Some((
                name.clone(),
                month_groups.get(group).copied().unwrap_or_default(),
                progressive.get(group).copied().unwrap_or_default(),
                previous.get(group).copied().unwrap_or_default(),
            )),
            _ => None,
        })
        .collect();
    entries.sort_by(|a, b| b.2.amount.cmp(&a.2.amount).then_with(|| a.0.cmp(&b.0)));

    let unit = UnitScale::Lakhs;
    let mut sums = (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, 0u64);
    let rows = entries
        .into_iter()
        .enumerate()
        .map(|(i, (commodity, month, current, prev))| {
            sums.0 += month.amount;
            sums.1 += current.amount;
            sums.2 += prev.amount;
            sums.3 += current.count;
            CommodityRow {
                sl_no: i + 1,
                commodity,
                current_month: unit.present(month.amount),
                progressive_current: unit.present(current.amount),
                progressive_previous: unit.present(prev.amount),
                difference: unit.present(current.amount - prev.amount),
                receipt_count: current.count,
                share_percent: to_f64(share_percent(current.amount, grand_total), 2),
            }
        })
        .collect();

    CommodityStatement {
        title: format!(
            "Commodity-wise market fee collection up to {} ({})",
            query.month.label(),
            fy
        ),
        rows,
        totals: CommodityTotals {
            current_month: unit.present(sums.0),
            progressive_current: unit.present(sums.1),
            progressive_previous: unit.present(sums.2),
            difference: unit.present(sums.1 - sums.2),
            receipt_count: sums.3,
        },
    }
}

/// Builds the requested statements from already loaded inputs.
pub fn build_report(query: &ReportQuery, inputs: &ReportInputs) -> MarketFeeReport {
    MarketFeeReport {
        statement1: query
            .kind
            .includes(ReportKind::Statement1)
            .then(|| statement1(query, inputs)),
        statement2: query
            .kind
            .includes(ReportKind::Statement2)
            .then(|| statement2(query, inputs)),
        commodity_statement: query
            .kind
            .includes(ReportKind::Commodity)
            .then(|| commodity_statement(query, inputs)),
        metadata: ReportMetadata {
            financial_year: query.financial_year.label(),
            previous_financial_year: query.financial_year.previous().label(),
            selected_month: query.month.label().to_string(),
            generated_at: Utc::now(),
            total_committees: inputs.committees.len(),
            unit: UnitScale::Lakhs.label().to_string(),
        },
    }
}

#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn market_fees(&self, query: ReportQuery) -> Result<MarketFeeReport, ServiceError> {
        let db = &*self.db;

        let committees = match query.committee_id {
            Some(id) => vec![committees::find_active(db, id).await?],
            None => committee::Entity::find()
                .filter(committee::Column::IsActive.eq(true))
                .filter(committee::Column::DeletedAt.is_null())
                .order_by_asc(committee::Column::Name)
                .all(db)
                .await?,
        };
        let committee_ids: Vec<Uuid> = committees.iter().map(|c| c.id).collect();
        let checkposts = checkpost::Entity::find()
            .filter(checkpost::Column::IsActive.eq(true))
            .filter(checkpost::Column::DeletedAt.is_null())
            .filter(checkpost::Column::CommitteeId.is_in(committee_ids))
            .order_by_asc(checkpost::Column::Name)
            .all(db)
            .await?;

        let fy = query.financial_year;
        let inputs = ReportInputs {
            committees,
            checkposts,
            targets: TargetBook::load(db, fy).await?,
            facts: load_facts(db, &[fy, fy.previous()], query.committee_id, true).await?,
        };

        let report = build_report(&query, &inputs);
        counter!("amc.reports.generated", 1, "type" => query.kind.as_str());
        info!(
            financial_year = %fy,
            month = %query.month,
            kind = query.kind.as_str(),
            committees = inputs.committees.len(),
            "market fee report generated"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn committee(name: &str, code: &str, has_checkposts: bool) -> committee::Model {
        let now = Utc::now();
        committee::Model {
            id: Uuid::new_v4(),
            name: name.into(),
            code: code.into(),
            district: "KAKINADA".into(),
            state: "Andhra Pradesh".into(),
            has_checkposts,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn checkpost(committee_id: Uuid, name: &str) -> checkpost::Model {
        let now = Utc::now();
        checkpost::Model {
            id: Uuid::new_v4(),
            name: name.into(),
            location: None,
            committee_id,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn fact(
        committee_id: Uuid,
        checkpost_id: Option<Uuid>,
        fy: FinancialYear,
        month: FinancialMonth,
        commodity: &str,
        amount: Decimal,
    ) -> ReceiptFact {
        ReceiptFact {
            committee_id,
            checkpost_id,
            commodity: commodity.into(),
            financial_year: fy,
            month,
            amount,
        }
    }

    fn query(kind: ReportKind) -> ReportQuery {
        ReportQuery {
            financial_year: FinancialYear::new(2025),
            month: FinancialMonth::June,
            committee_id: None,
            kind,
        }
    }

    fn inputs() -> ReportInputs {
        let karapa = committee("Karapa", "KRP-AMC", true);
        let tuni = committee("Tuni", "TUNI-AMC", false);
        let penuguduru = checkpost(karapa.id, "Penuguduru");
        let fy = FinancialYear::new(2025);

        let mut targets = TargetBook::default();
        targets.committees.insert(
            karapa.id,
            TargetPlan::from_months(FinancialMonth::ALL.iter().map(|m| (*m, dec!(100000)))),
        );
        targets.checkposts.insert(
            penuguduru.id,
            TargetPlan::from_months([(FinancialMonth::June, dec!(50000))]),
        );

        let facts = vec![
            fact(karapa.id, None, fy, FinancialMonth::May, "Paddy", dec!(80000)),
            fact(karapa.id, Some(penuguduru.id), fy, FinancialMonth::June, "Maize", dec!(110000)),
            fact(karapa.id, None, fy, FinancialMonth::July, "Paddy", dec!(500000)),
            fact(karapa.id, None, fy.previous(), FinancialMonth::June, "Paddy", dec!(60000)),
            fact(tuni.id, None, fy, FinancialMonth::June, "Cashew", dec!(10000)),
        ];

        ReportInputs {
            committees: vec![karapa, tuni],
            checkposts: vec![penuguduru],
            targets,
            facts,
        }
    }

    #[test]
    fn statement1_compares_cumulative_collection() {
        let report = statement1(&query(ReportKind::Statement1), &inputs());
        let karapa = &report.rows[0];
        assert_eq!(karapa.amc_code, "KRP-AMC");
        assert_eq!(karapa.figures.yearly_target, 12.0);
        assert_eq!(karapa.figures.monthly_target, 1.0);
        assert_eq!(karapa.figures.current_month_current, 1.1);
        assert_eq!(karapa.figures.current_month_prev, 0.6);
        assert_eq!(karapa.figures.difference, 0.5);
        assert_eq!(karapa.figures.cumulative_target, 2.0);
        assert_eq!(karapa.figures.progressive_current, 1.9);
        assert_eq!(karapa.figures.cumulative_achievement, 95.0);
        assert_eq!(karapa.figures.percentage_achieved, 16.0);
    }

    #[test]
    fn committee_without_target_reports_zero_percent() {
        let report = statement1(&query(ReportKind::Statement1), &inputs());
        let tuni = &report.rows[1];
        assert_eq!(tuni.figures.yearly_target, 0.0);
        assert_eq!(tuni.figures.progressive_current, 0.1);
        assert_eq!(tuni.figures.percentage_achieved, 0.0);
        assert_eq!(report.totals.progressive_current, 2.0);
        assert_eq!(report.rows[1].sl_no, 2);
    }

    #[test]
    fn statement2_lists_checkposts_of_checkpost_committees() {
        let report = statement2(&query(ReportKind::Statement2), &inputs());
        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!(row.checkpost_name, "Penuguduru");
        assert_eq!(row.figures.yearly_target, 0.5);
        assert_eq!(row.figures.monthly_target, 0.5);
        assert_eq!(row.figures.current_month_current, 1.1);
        assert_eq!(row.figures.percentage_achieved, 220.0);
    }

    #[test]
    fn commodity_rows_are_ranked_and_shared() {
        let report = commodity_statement(&query(ReportKind::Commodity), &inputs());
        let names: Vec<&str> = report.rows.iter().map(|r| r.commodity.as_str()).collect();
        assert_eq!(names, vec!["Maize", "Paddy", "Cashew"]);
        assert_eq!(report.rows[0].share_percent, 55.0);
        assert_eq!(report.rows[1].progressive_previous, 0.6);
        assert_eq!(report.totals.receipt_count, 3);
    }

    #[test]
    fn kind_selects_statements() {
        let only_one = build_report(&query(ReportKind::Statement1), &inputs());
        assert!(only_one.statement1.is_some());
        assert!(only_one.statement2.is_none());
        assert!(only_one.commodity_statement.is_none());

        let all = build_report(&query(ReportKind::All), &inputs());
        assert!(all.statement2.is_some() && all.commodity_statement.is_some());
        assert_eq!(all.metadata.previous_financial_year, "2024-25");
        assert_eq!(all.metadata.unit, "lakhs");
        assert_eq!(all.metadata.total_committees, 2);
    }
}
