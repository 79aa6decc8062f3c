//! Target-versus-achievement arithmetic shared by statements and analytics.
//!
//! Every report is the same reduction: pick the receipts of one financial
//! year, keep the months inside a [`Window`], group them by a [`GroupKey`]
//! and sum the market fee. Missing data always reduces to zero.

use crate::entities::receipt;
use crate::financial_year::{FinancialMonth, FinancialYear};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use uuid::Uuid;

const LAKH: Decimal = dec!(100000);

/// The slice of a receipt the aggregation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptFact {
    pub committee_id: Uuid,
    pub checkpost_id: Option<Uuid>,
    pub commodity: String,
    pub financial_year: FinancialYear,
    pub month: FinancialMonth,
    pub amount: Decimal,
}

impl ReceiptFact {
    /// `None` when the stored financial-year label is unreadable.
    pub fn from_receipt(receipt: &receipt::Model) -> Option<Self> {
        let financial_year = FinancialYear::parse(&receipt.financial_year).ok()?;
        Some(Self {
            committee_id: receipt.committee_id,
            checkpost_id: receipt.checkpost_id,
            commodity: receipt.commodity.trim().to_string(),
            financial_year,
            month: FinancialMonth::of_date(&receipt.date),
            amount: receipt.market_fee,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Committee,
    Checkpost,
    Commodity,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Group {
    Committee(Uuid),
    Checkpost(Uuid),
    Commodity(String),
}

impl GroupKey {
    fn group_of(self, fact: &ReceiptFact) -> Option<Group> {
        match self {
            GroupKey::Committee => Some(Group::Committee(fact.committee_id)),
            // Office and supervisor collections have no checkpost
            GroupKey::Checkpost => fact.checkpost_id.map(Group::Checkpost),
            GroupKey::Commodity => Some(Group::Commodity(fact.commodity.clone())),
        }
    }
}

/// Which months of the financial year count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Month(FinancialMonth),
    /// May through the given month inclusive
    Cumulative(FinancialMonth),
    FullYear,
}

impl Window {
    pub fn includes(&self, month: FinancialMonth) -> bool {
        match self {
            Window::Month(selected) => month == *selected,
            Window::Cumulative(selected) => month.index() <= selected.index(),
            Window::FullYear => true,
        }
    }
}

/// Display unit for currency amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitScale {
    Rupees,
    Lakhs,
}

impl UnitScale {
    pub fn scale(self, amount: Decimal) -> Decimal {
        match self {
            UnitScale::Rupees => amount,
            UnitScale::Lakhs => amount / LAKH,
        }
    }

    /// Scaled and rounded to two places.
    pub fn present(self, amount: Decimal) -> f64 {
        to_f64(self.scale(amount), 2)
    }

    pub fn label(self) -> &'static str {
        match self {
            UnitScale::Rupees => "rupees",
            UnitScale::Lakhs => "lakhs",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bucket {
    pub amount: Decimal,
    pub count: u64,
}

impl Bucket {
    fn add(&mut self, amount: Decimal) {
        self.amount += amount;
        self.count += 1;
    }
}

/// Groups the facts of `year` inside `window` and sums each group.
pub fn aggregate<'a, I>(
    facts: I,
    year: FinancialYear,
    key: GroupKey,
    window: Window,
) -> BTreeMap<Group, Bucket>
where
    I: IntoIterator<Item = &'a ReceiptFact>,
{
    let mut groups: BTreeMap<Group, Bucket> = BTreeMap::new();
    for fact in facts {
        if fact.financial_year != year || !window.includes(fact.month) {
            continue;
        }
        if let Some(group) = key.group_of(fact) {
            groups.entry(group).or_default().add(fact.amount);
        }
    }
    groups
}

/// Ungrouped total of `year` inside `window`.
pub fn total<'a, I>(facts: I, year: FinancialYear, window: Window) -> Bucket
where
    I: IntoIterator<Item = &'a ReceiptFact>,
{
    let mut bucket = Bucket::default();
    for fact in facts {
        if fact.financial_year == year && window.includes(fact.month) {
            bucket.add(fact.amount);
        }
    }
    bucket
}

/// Per-month totals of `year`, indexed in financial-year order.
pub fn monthly_series<'a, I>(facts: I, year: FinancialYear) -> [Decimal; 12]
where
    I: IntoIterator<Item = &'a ReceiptFact>,
{
    let mut series = [Decimal::ZERO; 12];
    for fact in facts {
        if fact.financial_year == year {
            series[fact.month.index()] += fact.amount;
        }
    }
    series
}

/// Yearly target with its per-month split; absent months count as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetPlan {
    pub yearly: Decimal,
    pub monthly: BTreeMap<FinancialMonth, Decimal>,
}

impl TargetPlan {
    pub fn new(yearly: Decimal) -> Self {
        Self {
            yearly,
            monthly: BTreeMap::new(),
        }
    }

    pub fn with_month(mut self, month: FinancialMonth, amount: Decimal) -> Self {
        *self.monthly.entry(month).or_default() += amount;
        self
    }

    /// A plan whose yearly figure is the sum of its months.
    pub fn from_months<I>(months: I) -> Self
    where
        I: IntoIterator<Item = (FinancialMonth, Decimal)>,
    {
        let mut plan = Self::default();
        for (month, amount) in months {
            plan.yearly += amount;
            *plan.monthly.entry(month).or_default() += amount;
        }
        plan
    }

    pub fn in_window(&self, window: Window) -> Decimal {
        match window {
            Window::FullYear => self.yearly,
            _ => self
                .monthly
                .iter()
                .filter(|(month, _)| window.includes(**month))
                .map(|(_, amount)| *amount)
                .sum(),
        }
    }
}

/// `achieved / target * 100`, zero when there is no target.
pub fn achievement_percent(achieved: Decimal, target: Decimal) -> Decimal {
    if target <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    achieved * dec!(100) / target
}

/// `(current - previous) / previous * 100`, zero from a zero base.
pub fn growth_rate(previous: Decimal, current: Decimal) -> Decimal {
    if previous.is_zero() {
        return Decimal::ZERO;
    }
    (current - previous) * dec!(100) / previous
}

/// Share of `part` in `whole` as a percentage, zero for an empty whole.
pub fn share_percent(part: Decimal, whole: Decimal) -> Decimal {
    achievement_percent(part, whole)
}

pub fn to_f64(amount: Decimal, dp: u32) -> f64 {
    amount.round_dp(dp).to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn fy() -> FinancialYear {
        FinancialYear::new(2025)
    }

    fn fact(committee: Uuid, month: FinancialMonth, amount: Decimal) -> ReceiptFact {
        ReceiptFact {
            committee_id: committee,
            checkpost_id: None,
            commodity: "Paddy".into(),
            financial_year: fy(),
            month,
            amount,
        }
    }

    #[test]
    fn june_statement_matches_worked_example() {
        let c1 = Uuid::new_v4();
        let facts = vec![
            fact(c1, FinancialMonth::May, dec!(50000)),
            fact(c1, FinancialMonth::May, dec!(30000)),
            fact(c1, FinancialMonth::June, dec!(110000)),
            fact(c1, FinancialMonth::July, dec!(999999)),
        ];
        let plan = TargetPlan::from_months(
            FinancialMonth::ALL
                .iter()
                .map(|m| (*m, dec!(100000))),
        );
        assert_eq!(plan.yearly, dec!(1200000));

        let window = Window::Cumulative(FinancialMonth::June);
        let achieved = total(&facts, fy(), window).amount;
        let target = plan.in_window(window);

        assert_eq!(target, dec!(200000));
        assert_eq!(achieved, dec!(190000));
        assert_eq!(achievement_percent(achieved, target), dec!(95));
        assert_eq!(
            to_f64(achievement_percent(achieved, plan.yearly), 2),
            15.83
        );
    }

    #[test]
    fn zero_target_yields_zero_percent() {
        assert_eq!(achievement_percent(dec!(5000), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn growth_from_zero_base_is_zero() {
        assert_eq!(growth_rate(Decimal::ZERO, dec!(10)), Decimal::ZERO);
        assert_eq!(growth_rate(dec!(100), dec!(150)), dec!(50));
        assert_eq!(growth_rate(dec!(200), dec!(100)), dec!(-50));
    }

    #[test]
    fn other_years_are_ignored() {
        let c1 = Uuid::new_v4();
        let mut old = fact(c1, FinancialMonth::May, dec!(700));
        old.financial_year = fy().previous();
        let facts = vec![old, fact(c1, FinancialMonth::May, dec!(300))];

        assert_eq!(total(&facts, fy(), Window::FullYear).amount, dec!(300));
        assert_eq!(
            total(&facts, fy().previous(), Window::FullYear).amount,
            dec!(700)
        );
    }

    #[test]
    fn checkpost_grouping_skips_office_collections() {
        let c1 = Uuid::new_v4();
        let cp = Uuid::new_v4();
        let mut at_checkpost = fact(c1, FinancialMonth::May, dec!(10));
        at_checkpost.checkpost_id = Some(cp);
        let facts = vec![at_checkpost, fact(c1, FinancialMonth::May, dec!(99))];

        let groups = aggregate(&facts, fy(), GroupKey::Checkpost, Window::FullYear);
        assert_eq!(groups.len(), 1);
        assert_matches!(groups.get(&Group::Checkpost(cp)), Some(b) if b.amount == dec!(10) && b.count == 1);
    }

    #[test]
    fn commodity_grouping_counts_rows() {
        let c1 = Uuid::new_v4();
        let mut chilli = fact(c1, FinancialMonth::August, dec!(40));
        chilli.commodity = "Chilli".into();
        let facts = vec![
            chilli,
            fact(c1, FinancialMonth::August, dec!(10)),
            fact(c1, FinancialMonth::September, dec!(5)),
        ];
        let groups = aggregate(
            &facts,
            fy(),
            GroupKey::Commodity,
            Window::Month(FinancialMonth::August),
        );
        assert_eq!(groups[&Group::Commodity("Paddy".into())].count, 1);
        assert_eq!(groups[&Group::Commodity("Chilli".into())].amount, dec!(40));
    }

    #[test]
    fn monthly_series_is_in_financial_year_order() {
        let c1 = Uuid::new_v4();
        let facts = vec![
            fact(c1, FinancialMonth::April, dec!(4)),
            fact(c1, FinancialMonth::May, dec!(1)),
        ];
        let series = monthly_series(&facts, fy());
        assert_eq!(series[0], dec!(1));
        assert_eq!(series[11], dec!(4));
    }

    #[test]
    fn lakh_conversion_rounds_to_two_places() {
        assert_eq!(UnitScale::Lakhs.present(dec!(1234567)), 12.35);
        assert_eq!(UnitScale::Rupees.present(dec!(1234567)), 1234567.0);
    }
}
