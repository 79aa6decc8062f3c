//! Property-based tests for the market fee core: financial-year arithmetic,
//! achievement and growth figures, cumulative windows, Indian number
//! formatting, CSV quoting and pagination.
//!
//! These tests use proptest to verify invariants across a wide range of inputs,
//! helping to catch edge cases that unit tests might miss.

use amc_market_fees::{
    financial_year::{FinancialMonth, FinancialYear},
    services::{
        aggregation::{achievement_percent, growth_rate, total, ReceiptFact, Window},
        export::{self, Cell, Table},
        PageRequest,
    },
    Pagination,
};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000_000, 0u32..3).prop_map(|(units, scale)| Decimal::new(units, scale))
}

fn cell_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,\"\n\r-]{0,16}"
}

fn render_csv_blocking(table: &Table) -> String {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(export::render_csv(table, 3))
}

fn fact(month: FinancialMonth, year: FinancialYear, amount: Decimal) -> ReceiptFact {
    ReceiptFact {
        committee_id: Uuid::nil(),
        checkpost_id: None,
        commodity: "Paddy".to_string(),
        financial_year: year,
        month,
        amount,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn every_date_falls_inside_its_financial_year(
        year in 2000i32..2100,
        month in 1u32..=12,
        day in 1u32..=28,
    ) {
        let date = Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap();
        let fy = FinancialYear::containing(&date);
        let fm = FinancialMonth::of_date(&date);

        let (start, end) = fy.month_range(fm);
        prop_assert!(start <= date && date < end, "{} not in {}..{}", date, start, end);
        prop_assert_eq!(FinancialYear::parse(&fy.label()).unwrap(), fy);
    }

    #[test]
    fn calendar_month_mapping_is_a_bijection(month in 1u32..=12) {
        let fm = FinancialMonth::from_calendar_month(month).unwrap();
        prop_assert_eq!(fm.calendar_month(), month);
        prop_assert_eq!(fm.cumulative().len(), fm.index() + 1);
    }

    #[test]
    fn mismatched_year_suffix_is_rejected(start in 2000i32..2100, offset in 2i32..9) {
        let label = format!("{}-{:02}", start, (start + offset) % 100);
        prop_assert!(FinancialYear::parse(&label).is_err());
    }

    #[test]
    fn indian_grouping_keeps_digits(amount in amount_strategy()) {
        let formatted = export::format_indian(amount);
        let digits: String = formatted.chars().filter(|c| *c != ',').collect();
        let parsed: Decimal = digits.parse().unwrap();
        prop_assert_eq!(parsed, amount.round_dp(2).normalize());

        // Only the last group has three digits
        let whole = formatted.split('.').next().unwrap();
        let groups: Vec<&str> = whole.split(',').collect();
        if groups.len() > 1 {
            prop_assert_eq!(groups.last().unwrap().len(), 3);
            for group in &groups[1..groups.len() - 1] {
                prop_assert_eq!(group.len(), 2);
            }
        }
    }

    #[test]
    fn csv_fields_are_always_quoted(s in ".*") {
        let field = export::csv_field(&s);
        prop_assert!(field.starts_with('"') && field.ends_with('"'));
        let inner = &field[1..field.len() - 1];
        prop_assert_eq!(inner.replace("\"\"", "\""), s);
    }

    #[test]
    fn csv_rows_survive_a_standard_parser(
        rows in proptest::collection::vec(proptest::collection::vec(cell_text(), 3), 0..12),
    ) {
        let headers = vec![
            "Trader Name".to_string(),
            "Commodity, Grade".to_string(),
            "Remarks \"free text\"".to_string(),
        ];
        let table = Table {
            headers: headers.clone(),
            rows: rows
                .iter()
                .map(|row| row.iter().cloned().map(Cell::Text).collect())
                .collect(),
        };
        let rendered = render_csv_blocking(&table);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(rendered.as_bytes());
        let parsed_headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        prop_assert_eq!(parsed_headers, headers);

        let parsed: Vec<Vec<String>> = reader
            .records()
            .map(|record| record.unwrap().iter().map(str::to_string).collect())
            .collect();
        prop_assert_eq!(parsed, rows);
    }

    #[test]
    fn accepted_labels_print_back_unchanged(label in "[0-9+ -]{7}") {
        if let Ok(fy) = FinancialYear::parse(&label) {
            prop_assert_eq!(fy.label(), label.trim());
        }
    }

    #[test]
    fn pagination_flags_are_consistent(page in 1u64..50, limit in 1u64..100, total in 0u64..5000) {
        prop_assert!(PageRequest::new(page, limit).offset().is_ok());
        let p = Pagination::new(PageRequest::new(page, limit), total);
        prop_assert_eq!(p.total_pages, total.div_ceil(limit));
        prop_assert_eq!(p.has_prev, page > 1);
        prop_assert_eq!(p.has_next, page < p.total_pages);
    }

    #[test]
    fn achievement_is_bounded_by_target(achieved in amount_strategy(), target in amount_strategy()) {
        let pct = achievement_percent(achieved, target);
        if target.is_zero() {
            prop_assert_eq!(pct, Decimal::ZERO);
        } else if achieved <= target {
            prop_assert!(pct <= Decimal::from(100));
        } else {
            prop_assert!(pct > Decimal::from(100));
        }
    }

    #[test]
    fn growth_sign_follows_direction(previous in amount_strategy(), current in amount_strategy()) {
        let growth = growth_rate(previous, current);
        if previous.is_zero() {
            prop_assert_eq!(growth, Decimal::ZERO);
        } else if current > previous {
            prop_assert!(growth > Decimal::ZERO);
        } else if current < previous {
            prop_assert!(growth < Decimal::ZERO);
        } else {
            prop_assert_eq!(growth, Decimal::ZERO);
        }
    }

    #[test]
    fn cumulative_window_ignores_later_months(
        selected in 0usize..12,
        amounts in proptest::collection::vec((0usize..12, amount_strategy()), 0..40),
    ) {
        let year = FinancialYear::new(2025);
        let selected = FinancialMonth::ALL[selected];
        let facts: Vec<ReceiptFact> = amounts
            .iter()
            .map(|(m, amount)| fact(FinancialMonth::ALL[*m], year, *amount))
            .collect();
        let earlier: Vec<ReceiptFact> = facts
            .iter()
            .filter(|f| f.month.index() <= selected.index())
            .cloned()
            .collect();

        // Receipts after the selected month, or in another year, never change the figure
        let mut noisy = facts.clone();
        noisy.push(fact(selected, year.previous(), Decimal::from(999)));
        prop_assert_eq!(
            total(&noisy, year, Window::Cumulative(selected)).amount,
            total(&earlier, year, Window::Cumulative(selected)).amount
        );
    }
}
