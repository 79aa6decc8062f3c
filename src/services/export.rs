//! Tabular export: quoted CSV and a paged plain-text document.

use crate::errors::ServiceError;
use crate::services::receipts::ReceiptView;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_ROWS_PER_PAGE: usize = 40;

/// A typed value before formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(Decimal),
    Bool(bool),
    Date(DateTime<Utc>),
    Timestamp(DateTime<Utc>),
    Empty,
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    fn optional(value: Option<&str>) -> Self {
        value.map_or(Cell::Empty, Cell::text)
    }

    /// Raw machine-readable form used in CSV.
    pub fn raw(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.normalize().to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
            Cell::Timestamp(t) => t.to_rfc3339(),
            Cell::Empty => String::new(),
        }
    }

    /// Human-readable form used in documents.
    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_indian(*n),
            Cell::Bool(true) => "Yes".to_string(),
            Cell::Bool(false) => "No".to_string(),
            Cell::Date(d) => d.format("%d/%m/%Y").to_string(),
            Cell::Timestamp(t) => t.format("%d/%m/%Y %H:%M").to_string(),
            Cell::Empty => String::new(),
        }
    }
}

/// Formats a number with Indian digit grouping, e.g. `12,34,567.5`.
pub fn format_indian(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let text = rounded.abs().to_string();
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let digits: Vec<char> = whole.chars().collect();
    let head = digits.len().saturating_sub(3);
    let mut out = String::new();
    if rounded.is_sign_negative() && !rounded.is_zero() {
        out.push('-');
    }
    for (i, ch) in digits[..head].iter().enumerate() {
        if i > 0 && (head - i) % 2 == 0 {
            out.push(',');
        }
        out.push(*ch);
    }
    if head > 0 {
        out.push(',');
    }
    out.extend(&digits[head..]);

    let frac = frac.trim_end_matches('0');
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Headers plus rows, column order fixed by the caller's selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Wraps a field in quotes, doubling embedded quotes.
pub fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn csv_line(fields: impl Iterator<Item = String>) -> String {
    fields.map(|f| csv_field(&f)).collect::<Vec<_>>().join(",")
}

/// Renders the table as CSV, yielding to the runtime between chunks of rows.
pub async fn render_csv(table: &Table, chunk_size: usize) -> String {
    let mut lines = Vec::with_capacity(table.rows.len() + 1);
    lines.push(csv_line(table.headers.iter().cloned()));
    for chunk in table.rows.chunks(chunk_size.max(1)) {
        lines.extend(chunk.iter().map(|row| csv_line(row.iter().map(Cell::raw))));
        tokio::task::yield_now().await;
    }
    lines.join("\n")
}

/// Layout options for the paged document.
#[derive(Debug, Clone)]
pub struct DocumentOptions {
    pub title: String,
    pub subtitle: Option<String>,
    pub rows_per_page: usize,
    pub shade_alternate_rows: bool,
    pub page_numbers: bool,
    pub footer_timestamp: Option<DateTime<Utc>>,
}

impl DocumentOptions {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
            shade_alternate_rows: true,
            page_numbers: true,
            footer_timestamp: None,
        }
    }
}

const SHADE: char = '░';
const PAGE_BREAK: char = '\u{0C}';

fn pad(value: &str, width: usize, numeric: bool) -> String {
    let len = value.chars().count();
    let fill = " ".repeat(width.saturating_sub(len));
    if numeric {
        format!("{}{}", fill, value)
    } else {
        format!("{}{}", value, fill)
    }
}

/// Lays the table out as fixed-width text pages separated by form feeds.
pub fn render_document(table: &Table, options: &DocumentOptions) -> String {
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(Cell::display).collect())
        .collect();
    let numeric: Vec<bool> = (0..table.headers.len())
        .map(|i| {
            table
                .rows
                .iter()
                .any(|row| matches!(row.get(i), Some(Cell::Number(_))))
        })
        .collect();
    let widths: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render_row = |values: &[String], shaded: bool| -> String {
        let gutter = if shaded { SHADE } else { ' ' };
        let body: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, v)| pad(v, widths[i], numeric[i]))
            .collect();
        format!("{} {} {}", gutter, body.join(" | "), gutter).trim_end().to_string()
    };

    let header = render_row(&table.headers, false);
    let rule = "-".repeat(header.chars().count());
    let per_page = options.rows_per_page.max(1);
    let pages: Vec<&[Vec<String>]> = if cells.is_empty() {
        vec![&[]]
    } else {
        cells.chunks(per_page).collect()
    };
    let page_count = pages.len();

    let mut out = Vec::with_capacity(page_count);
    for (page_index, rows) in pages.into_iter().enumerate() {
        let mut page = Vec::new();
        page.push(options.title.clone());
        if let Some(subtitle) = &options.subtitle {
            page.push(subtitle.clone());
        }
        page.push(String::new());
        page.push(header.clone());
        page.push(rule.clone());
        if rows.is_empty() {
            page.push("  No records".to_string());
        }
        for (i, row) in rows.iter().enumerate() {
            let shaded = options.shade_alternate_rows && i % 2 == 1;
            page.push(render_row(row, shaded));
        }
        page.push(rule.clone());

        let mut footer = Vec::new();
        if let Some(ts) = options.footer_timestamp {
            footer.push(format!("Generated {}", ts.format("%d/%m/%Y %H:%M UTC")));
        }
        if options.page_numbers {
            footer.push(format!("Page {} of {}", page_index + 1, page_count));
        }
        if !footer.is_empty() {
            page.push(footer.join("    "));
        }
        out.push(page.join("\n"));
    }
    out.join(&format!("\n{}\n", PAGE_BREAK))
}

/// Receipt columns available for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ReceiptColumn {
    ReceiptNumber,
    BookNumber,
    Date,
    FinancialYear,
    TraderName,
    PayeeName,
    Commodity,
    TransactionValue,
    MarketFee,
    NatureOfReceipt,
    CollectionLocation,
    CommitteeName,
    CommitteeCode,
    CheckpostName,
    SupervisorName,
    CreatedAt,
}

impl ReceiptColumn {
    pub const DEFAULT: [ReceiptColumn; 16] = [
        ReceiptColumn::ReceiptNumber,
        ReceiptColumn::BookNumber,
        ReceiptColumn::Date,
        ReceiptColumn::FinancialYear,
        ReceiptColumn::TraderName,
        ReceiptColumn::PayeeName,
        ReceiptColumn::Commodity,
        ReceiptColumn::TransactionValue,
        ReceiptColumn::MarketFee,
        ReceiptColumn::NatureOfReceipt,
        ReceiptColumn::CollectionLocation,
        ReceiptColumn::CommitteeName,
        ReceiptColumn::CommitteeCode,
        ReceiptColumn::CheckpostName,
        ReceiptColumn::SupervisorName,
        ReceiptColumn::CreatedAt,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ReceiptColumn::ReceiptNumber => "receiptNumber",
            ReceiptColumn::BookNumber => "bookNumber",
            ReceiptColumn::Date => "date",
            ReceiptColumn::FinancialYear => "financialYear",
            ReceiptColumn::TraderName => "traderName",
            ReceiptColumn::PayeeName => "payeeName",
            ReceiptColumn::Commodity => "commodity",
            ReceiptColumn::TransactionValue => "transactionValue",
            ReceiptColumn::MarketFee => "marketFee",
            ReceiptColumn::NatureOfReceipt => "natureOfReceipt",
            ReceiptColumn::CollectionLocation => "collectionLocation",
            ReceiptColumn::CommitteeName => "committeeName",
            ReceiptColumn::CommitteeCode => "committeeCode",
            ReceiptColumn::CheckpostName => "checkpostName",
            ReceiptColumn::SupervisorName => "supervisorName",
            ReceiptColumn::CreatedAt => "createdAt",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReceiptColumn::ReceiptNumber => "Receipt Number",
            ReceiptColumn::BookNumber => "Book Number",
            ReceiptColumn::Date => "Date",
            ReceiptColumn::FinancialYear => "Financial Year",
            ReceiptColumn::TraderName => "Trader Name",
            ReceiptColumn::PayeeName => "Payee Name",
            ReceiptColumn::Commodity => "Commodity",
            ReceiptColumn::TransactionValue => "Transaction Value",
            ReceiptColumn::MarketFee => "Market Fee",
            ReceiptColumn::NatureOfReceipt => "Nature of Receipt",
            ReceiptColumn::CollectionLocation => "Collection Location",
            ReceiptColumn::CommitteeName => "Committee Name",
            ReceiptColumn::CommitteeCode => "Committee Code",
            ReceiptColumn::CheckpostName => "Checkpost Name",
            ReceiptColumn::SupervisorName => "Supervisor Name",
            ReceiptColumn::CreatedAt => "Created At",
        }
    }

    /// Parses a comma-separated selection; empty means the default set.
    pub fn parse_selection(value: Option<&str>) -> Result<Vec<ReceiptColumn>, ServiceError> {
        let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            return Ok(Self::DEFAULT.to_vec());
        };
        value
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|key| {
                Self::DEFAULT
                    .iter()
                    .copied()
                    .find(|c| c.key() == key)
                    .ok_or_else(|| ServiceError::ValidationError(format!("Unknown export column '{}'", key)))
            })
            .collect()
    }

    fn cell(self, r: &ReceiptView) -> Cell {
        match self {
            ReceiptColumn::ReceiptNumber => Cell::text(&r.receipt_number),
            ReceiptColumn::BookNumber => Cell::text(&r.book_number),
            ReceiptColumn::Date => Cell::Date(r.date),
            ReceiptColumn::FinancialYear => Cell::text(&r.financial_year),
            ReceiptColumn::TraderName => Cell::text(&r.trader_name),
            ReceiptColumn::PayeeName => Cell::text(&r.payee_name),
            ReceiptColumn::Commodity => Cell::text(&r.commodity),
            ReceiptColumn::TransactionValue => Cell::Number(r.transaction_value),
            ReceiptColumn::MarketFee => Cell::Number(r.market_fee),
            ReceiptColumn::NatureOfReceipt => Cell::text(r.nature_of_receipt.as_str()),
            ReceiptColumn::CollectionLocation => Cell::text(r.collection_location.as_str()),
            ReceiptColumn::CommitteeName => Cell::optional(r.committee.as_ref().map(|c| c.name.as_str())),
            ReceiptColumn::CommitteeCode => Cell::optional(r.committee.as_ref().map(|c| c.code.as_str())),
            ReceiptColumn::CheckpostName => Cell::optional(r.checkpost.as_ref().map(|c| c.name.as_str())),
            ReceiptColumn::SupervisorName => Cell::optional(r.supervisor_name.as_deref()),
            ReceiptColumn::CreatedAt => Cell::Timestamp(r.created_at),
        }
    }
}

pub fn receipt_table(columns: &[ReceiptColumn], receipts: &[ReceiptView]) -> Table {
    Table {
        headers: columns.iter().map(|c| c.label().to_string()).collect(),
        rows: receipts
            .iter()
            .map(|r| columns.iter().map(|c| c.cell(r)).collect())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn table() -> Table {
        Table {
            headers: vec!["Trader".into(), "Fee".into(), "Paid".into()],
            rows: vec![
                vec![Cell::text("Rao, \"Sons\""), Cell::Number(dec!(1500.50)), Cell::Bool(true)],
                vec![Cell::text("Lakshmi"), Cell::Number(dec!(250000)), Cell::Bool(false)],
                vec![Cell::Empty, Cell::Number(dec!(5)), Cell::Bool(false)],
            ],
        }
    }

    #[tokio::test]
    async fn csv_quotes_every_field() {
        let csv = render_csv(&table(), 2).await;
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], r#""Trader","Fee","Paid""#);
        assert_eq!(lines[1], r#""Rao, ""Sons""","1500.5","true""#);
        assert_eq!(lines[3], r#""","5","false""#);
        assert_eq!(lines.len(), 4);
    }

    #[tokio::test]
    async fn chunk_size_does_not_change_output() {
        let t = table();
        assert_eq!(render_csv(&t, 1).await, render_csv(&t, 100).await);
        assert_eq!(render_csv(&t, 0).await, render_csv(&t, 3).await);
    }

    #[test]
    fn display_formats() {
        assert_eq!(Cell::Bool(true).display(), "Yes");
        assert_eq!(Cell::Number(dec!(250000)).display(), "2,50,000");
        assert_eq!(Cell::Number(dec!(-1234.5)).display(), "-1,234.5");
        let d = DateTime::parse_from_rfc3339("2025-06-10T00:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(Cell::Date(d).display(), "10/06/2025");
        assert_eq!(Cell::Date(d).raw(), "2025-06-10");
    }

    #[test]
    fn document_pages_shade_and_number() {
        let mut options = DocumentOptions::new("Receipts Report");
        options.rows_per_page = 2;
        let doc = render_document(&table(), &options);
        let pages: Vec<&str> = doc.split(PAGE_BREAK).collect();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("Page 1 of 2"));
        assert!(pages[1].contains("Page 2 of 2"));
        assert!(pages[0].starts_with("Receipts Report"));
        let shaded: Vec<&str> = pages[0].lines().filter(|l| l.starts_with(SHADE)).collect();
        assert_eq!(shaded.len(), 1);
        assert!(shaded[0].contains("Lakshmi"));
        assert!(pages[0].contains("Yes"));
    }

    #[test]
    fn empty_document_still_has_a_page() {
        let empty = Table {
            headers: vec!["A".into()],
            rows: Vec::new(),
        };
        let doc = render_document(&empty, &DocumentOptions::new("Empty"));
        assert!(doc.contains("No records"));
        assert!(doc.contains("Page 1 of 1"));
    }

    #[test]
    fn column_selection() {
        assert_eq!(ReceiptColumn::parse_selection(None).unwrap().len(), 16);
        assert_eq!(
            ReceiptColumn::parse_selection(Some("marketFee, date")).unwrap(),
            vec![ReceiptColumn::MarketFee, ReceiptColumn::Date]
        );
        assert!(ReceiptColumn::parse_selection(Some("fee")).is_err());
    }
}
