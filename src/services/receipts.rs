//! Receipt ingestion: single and batch writes, file import and filtered reads.

use crate::entities::{checkpost, committee, receipt, AuditAction, CollectionLocation, NatureOfReceipt};
use crate::errors::{flatten_validation_errors, ServiceError};
use crate::financial_year::FinancialYear;
use crate::services::checkposts::CheckpostSummary;
use crate::services::committees::CommitteeSummary;
use crate::services::{contains_ci, Actor, AuditEntry, PageRequest, Paged};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    Iterable, PaginatorTrait, QueryFilter, QueryOrder, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const MAX_BULK_CREATE: usize = 100;
pub const MAX_BULK_UPDATE: usize = 50;

/// Receipt fields as submitted by a client
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayload {
    #[serde(default)]
    #[validate(length(min = 1, message = "Book number is required"))]
    pub book_number: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Receipt number is required"))]
    pub receipt_number: String,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    #[serde(default)]
    #[validate(custom = "validate_receipt_date")]
    pub date: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Trader name is required"))]
    pub trader_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Payee name is required"))]
    pub payee_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Commodity is required"))]
    pub commodity: String,
    #[serde(default)]
    #[schema(value_type = f64)]
    pub transaction_value: Decimal,
    #[serde(default)]
    #[schema(value_type = f64)]
    pub market_fee: Decimal,
    /// `MF` or `OTHERS`
    #[serde(default)]
    pub nature_of_receipt: String,
    pub nature_of_receipt_other: Option<String>,
    /// `OFFICE`, `CHECKPOST` or `SUPERVISOR`
    #[serde(default)]
    pub collection_location: String,
    pub collection_location_other: Option<String>,
    pub checkpost_id: Option<Uuid>,
    pub supervisor_name: Option<String>,
    #[validate(required(message = "Committee ID is required"))]
    pub committee_id: Option<Uuid>,
    #[serde(default)]
    #[validate(custom = "validate_financial_year")]
    pub financial_year: String,
    pub remarks: Option<String>,
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReceiptRequest {
    pub book_number: Option<String>,
    pub receipt_number: Option<String>,
    pub date: Option<String>,
    pub trader_name: Option<String>,
    pub payee_name: Option<String>,
    pub commodity: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub transaction_value: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub market_fee: Option<Decimal>,
    pub nature_of_receipt: Option<String>,
    pub nature_of_receipt_other: Option<String>,
    pub collection_location: Option<String>,
    pub collection_location_other: Option<String>,
    pub checkpost_id: Option<Uuid>,
    pub supervisor_name: Option<String>,
    pub committee_id: Option<Uuid>,
    pub financial_year: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateItem {
    pub id: Uuid,
    pub data: UpdateReceiptRequest,
}

/// A row of an import file; committee and checkpost are referenced by code and name
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportReceiptRow {
    #[serde(default)]
    pub book_number: String,
    #[serde(default)]
    pub receipt_number: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub trader_name: String,
    #[serde(default)]
    pub payee_name: String,
    #[serde(default)]
    pub commodity: String,
    #[serde(default)]
    #[schema(value_type = f64)]
    pub transaction_value: Decimal,
    #[serde(default)]
    #[schema(value_type = f64)]
    pub market_fee: Decimal,
    #[serde(default)]
    pub nature_of_receipt: String,
    pub nature_of_receipt_other: Option<String>,
    #[serde(default)]
    pub collection_location: String,
    pub collection_location_other: Option<String>,
    pub checkpost_name: Option<String>,
    pub supervisor_name: Option<String>,
    #[serde(default)]
    pub committee_code: String,
    #[serde(default)]
    pub financial_year: String,
    pub remarks: Option<String>,
}

/// Outcome of an import run
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase", untagged)]
pub enum ImportOutcome {
    Validated {
        valid: bool,
        count: usize,
        message: String,
    },
    Imported {
        receipts: Vec<ReceiptView>,
        count: usize,
        #[serde(rename = "importedAt")]
        imported_at: DateTime<Utc>,
    },
}

/// Receipt as returned by the API, with its committee and checkpost
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptView {
    pub id: Uuid,
    pub book_number: String,
    pub receipt_number: String,
    pub date: DateTime<Utc>,
    pub trader_name: String,
    pub payee_name: String,
    pub commodity: String,
    #[schema(value_type = String)]
    pub transaction_value: Decimal,
    #[schema(value_type = String)]
    pub market_fee: Decimal,
    pub nature_of_receipt: NatureOfReceipt,
    pub nature_of_receipt_other: Option<String>,
    pub collection_location: CollectionLocation,
    pub collection_location_other: Option<String>,
    pub supervisor_name: Option<String>,
    pub remarks: Option<String>,
    pub financial_year: String,
    pub committee_id: Uuid,
    pub checkpost_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub committee: Option<CommitteeSummary>,
    pub checkpost: Option<CheckpostSummary>,
}

impl ReceiptView {
    fn build(
        model: receipt::Model,
        committee: Option<CommitteeSummary>,
        checkpost: Option<CheckpostSummary>,
    ) -> Self {
        Self {
            id: model.id,
            book_number: model.book_number,
            receipt_number: model.receipt_number,
            date: model.date,
            trader_name: model.trader_name,
            payee_name: model.payee_name,
            commodity: model.commodity,
            transaction_value: model.transaction_value,
            market_fee: model.market_fee,
            nature_of_receipt: model.nature_of_receipt,
            nature_of_receipt_other: model.nature_of_receipt_other,
            collection_location: model.collection_location,
            collection_location_other: model.collection_location_other,
            supervisor_name: model.supervisor_name,
            remarks: model.remarks,
            financial_year: model.financial_year,
            committee_id: model.committee_id,
            checkpost_id: model.checkpost_id,
            created_by: model.created_by,
            updated_by: model.updated_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
            committee,
            checkpost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiptSortField {
    #[default]
    Date,
    ReceiptNumber,
    MarketFee,
    TransactionValue,
    TraderName,
    CreatedAt,
}

impl ReceiptSortField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "date" => Some(Self::Date),
            "receiptNumber" => Some(Self::ReceiptNumber),
            "marketFee" => Some(Self::MarketFee),
            "transactionValue" => Some(Self::TransactionValue),
            "traderName" => Some(Self::TraderName),
            "createdAt" => Some(Self::CreatedAt),
            _ => None,
        }
    }

    fn column(self) -> receipt::Column {
        match self {
            Self::Date => receipt::Column::Date,
            Self::ReceiptNumber => receipt::Column::ReceiptNumber,
            Self::MarketFee => receipt::Column::MarketFee,
            Self::TransactionValue => receipt::Column::TransactionValue,
            Self::TraderName => receipt::Column::TraderName,
            Self::CreatedAt => receipt::Column::CreatedAt,
        }
    }
}

/// Filters shared by listing and export
#[derive(Debug, Clone, Default)]
pub struct ReceiptFilter {
    pub search: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub end_before: Option<DateTime<Utc>>,
    pub financial_year: Option<String>,
    pub committee_id: Option<Uuid>,
    pub checkpost_id: Option<Uuid>,
    pub nature_of_receipt: Option<NatureOfReceipt>,
    pub sort_by: ReceiptSortField,
    pub ascending: bool,
}

impl ReceiptFilter {
    fn apply(&self, mut query: Select<receipt::Entity>) -> Select<receipt::Entity> {
        query = query
            .filter(receipt::Column::IsActive.eq(true))
            .filter(receipt::Column::DeletedAt.is_null());

        if let Some(term) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(contains_ci(receipt::Column::ReceiptNumber, term))
                    .add(contains_ci(receipt::Column::TraderName, term))
                    .add(contains_ci(receipt::Column::PayeeName, term))
                    .add(contains_ci(receipt::Column::Commodity, term)),
            );
        }
        if let Some(start) = self.start_date {
            query = query.filter(receipt::Column::Date.gte(start));
        }
        if let Some(end) = self.end_before {
            query = query.filter(receipt::Column::Date.lt(end));
        }
        if let Some(fy) = &self.financial_year {
            query = query.filter(receipt::Column::FinancialYear.eq(fy.clone()));
        }
        if let Some(committee_id) = self.committee_id {
            query = query.filter(receipt::Column::CommitteeId.eq(committee_id));
        }
        if let Some(checkpost_id) = self.checkpost_id {
            query = query.filter(receipt::Column::CheckpostId.eq(checkpost_id));
        }
        if let Some(nature) = self.nature_of_receipt {
            query = query.filter(receipt::Column::NatureOfReceipt.eq(nature));
        }

        let column = self.sort_by.column();
        if self.ascending {
            query.order_by_asc(column).order_by_asc(receipt::Column::Id)
        } else {
            query.order_by_desc(column).order_by_desc(receipt::Column::Id)
        }
    }
}

/// A payload that passed field validation, with typed values
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptDraft {
    pub book_number: String,
    pub receipt_number: String,
    pub date: DateTime<Utc>,
    pub trader_name: String,
    pub payee_name: String,
    pub commodity: String,
    pub transaction_value: Decimal,
    pub market_fee: Decimal,
    pub nature_of_receipt: NatureOfReceipt,
    pub nature_of_receipt_other: Option<String>,
    pub collection_location: CollectionLocation,
    pub collection_location_other: Option<String>,
    pub checkpost_id: Option<Uuid>,
    pub supervisor_name: Option<String>,
    pub committee_id: Uuid,
    pub financial_year: String,
    pub remarks: Option<String>,
}

type ReceiptKey = (String, String, Uuid);

impl ReceiptDraft {
    fn key(&self) -> ReceiptKey {
        (
            self.book_number.clone(),
            self.receipt_number.clone(),
            self.committee_id,
        )
    }

    fn into_active(self, id: Uuid, actor: &Actor) -> receipt::ActiveModel {
        let now = Utc::now();
        receipt::ActiveModel {
            id: Set(id),
            book_number: Set(self.book_number),
            receipt_number: Set(self.receipt_number),
            date: Set(self.date),
            trader_name: Set(self.trader_name),
            payee_name: Set(self.payee_name),
            commodity: Set(self.commodity),
            transaction_value: Set(self.transaction_value),
            market_fee: Set(self.market_fee),
            nature_of_receipt: Set(self.nature_of_receipt),
            nature_of_receipt_other: Set(self.nature_of_receipt_other),
            collection_location: Set(self.collection_location),
            collection_location_other: Set(self.collection_location_other),
            supervisor_name: Set(self.supervisor_name),
            remarks: Set(self.remarks),
            financial_year: Set(self.financial_year),
            committee_id: Set(self.committee_id),
            checkpost_id: Set(self.checkpost_id),
            created_by: Set(Some(actor.user_id)),
            updated_by: Set(None),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
    }

    /// Copies the draft over an existing row, keeping identity and creation stamps
    fn apply_to(self, existing: receipt::Model, actor: &Actor) -> receipt::ActiveModel {
        let mut active: receipt::ActiveModel = existing.into();
        active.book_number = Set(self.book_number);
        active.receipt_number = Set(self.receipt_number);
        active.date = Set(self.date);
        active.trader_name = Set(self.trader_name);
        active.payee_name = Set(self.payee_name);
        active.commodity = Set(self.commodity);
        active.transaction_value = Set(self.transaction_value);
        active.market_fee = Set(self.market_fee);
        active.nature_of_receipt = Set(self.nature_of_receipt);
        active.nature_of_receipt_other = Set(self.nature_of_receipt_other);
        active.collection_location = Set(self.collection_location);
        active.collection_location_other = Set(self.collection_location_other);
        active.supervisor_name = Set(self.supervisor_name);
        active.remarks = Set(self.remarks);
        active.financial_year = Set(self.financial_year);
        active.committee_id = Set(self.committee_id);
        active.checkpost_id = Set(self.checkpost_id);
        active.updated_by = Set(Some(actor.user_id));
        active.updated_at = Set(Utc::now());
        active
    }
}

impl ReceiptPayload {
    /// Runs every field rule and collects all failures as `field: message`.
    pub fn check(&self) -> Result<ReceiptDraft, Vec<String>> {
        let mut errors = match self.validate() {
            Ok(()) => Vec::new(),
            Err(e) => flatten_validation_errors(&e),
        };

        if self.transaction_value <= Decimal::ZERO {
            errors.push("transactionValue: Transaction value must be greater than 0".to_string());
        }
        if self.market_fee <= Decimal::ZERO {
            errors.push("marketFee: Market fee must be greater than 0".to_string());
        }

        let nature = parse_nature(&self.nature_of_receipt);
        if nature.is_none() {
            errors.push("natureOfReceipt: Must be one of MF, OTHERS".to_string());
        }
        let location = parse_location(&self.collection_location);
        if location.is_none() {
            errors.push("collectionLocation: Must be one of OFFICE, CHECKPOST, SUPERVISOR".to_string());
        }

        let nature_other = non_blank(&self.nature_of_receipt_other);
        if nature == Some(NatureOfReceipt::Others) && nature_other.is_none() {
            errors.push(
                "natureOfReceiptOther: Nature of receipt must be specified when it is OTHERS"
                    .to_string(),
            );
        }
        if location == Some(CollectionLocation::Checkpost) && self.checkpost_id.is_none() {
            errors.push(
                "checkpostId: Checkpost is required when collection location is CHECKPOST"
                    .to_string(),
            );
        }
        let supervisor = non_blank(&self.supervisor_name);
        if location == Some(CollectionLocation::Supervisor) && supervisor.is_none() {
            errors.push(
                "supervisorName: Supervisor name is required when collection location is SUPERVISOR"
                    .to_string(),
            );
        }

        let date = parse_receipt_date(&self.date);
        let financial_year = FinancialYear::parse(&self.financial_year).ok();

        match (nature, location, date, financial_year, self.committee_id) {
            (Some(nature), Some(location), Some(date), Some(financial_year), Some(committee_id))
                if errors.is_empty() =>
            {
                Ok(ReceiptDraft {
                    book_number: self.book_number.trim().to_string(),
                    receipt_number: self.receipt_number.trim().to_string(),
                    date,
                    trader_name: self.trader_name.trim().to_string(),
                    payee_name: self.payee_name.trim().to_string(),
                    commodity: self.commodity.trim().to_string(),
                    transaction_value: self.transaction_value,
                    market_fee: self.market_fee,
                    nature_of_receipt: nature,
                    nature_of_receipt_other: if nature == NatureOfReceipt::Others {
                        nature_other
                    } else {
                        None
                    },
                    collection_location: location,
                    collection_location_other: non_blank(&self.collection_location_other),
                    // Only checkpost collections are attributed to a checkpost
                    checkpost_id: if location == CollectionLocation::Checkpost {
                        self.checkpost_id
                    } else {
                        None
                    },
                    supervisor_name: supervisor,
                    committee_id,
                    financial_year: financial_year.label(),
                    remarks: non_blank(&self.remarks),
                })
            }
            _ => Err(errors),
        }
    }

    /// The payload a stored receipt would have produced
    fn from_model(model: &receipt::Model) -> Self {
        Self {
            book_number: model.book_number.clone(),
            receipt_number: model.receipt_number.clone(),
            date: model.date.to_rfc3339(),
            trader_name: model.trader_name.clone(),
            payee_name: model.payee_name.clone(),
            commodity: model.commodity.clone(),
            transaction_value: model.transaction_value,
            market_fee: model.market_fee,
            nature_of_receipt: model.nature_of_receipt.as_str().to_string(),
            nature_of_receipt_other: model.nature_of_receipt_other.clone(),
            collection_location: model.collection_location.as_str().to_string(),
            collection_location_other: model.collection_location_other.clone(),
            checkpost_id: model.checkpost_id,
            supervisor_name: model.supervisor_name.clone(),
            committee_id: Some(model.committee_id),
            financial_year: model.financial_year.clone(),
            remarks: model.remarks.clone(),
        }
    }

    fn merge(mut self, update: UpdateReceiptRequest) -> Self {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if let Some(value) = update.$field { self.$field = value; })*
            };
        }
        overlay!(
            book_number,
            receipt_number,
            date,
            trader_name,
            payee_name,
            commodity,
            transaction_value,
            market_fee,
            nature_of_receipt,
            collection_location,
            financial_year
        );
        if update.nature_of_receipt_other.is_some() {
            self.nature_of_receipt_other = update.nature_of_receipt_other;
        }
        if update.collection_location_other.is_some() {
            self.collection_location_other = update.collection_location_other;
        }
        if update.checkpost_id.is_some() {
            self.checkpost_id = update.checkpost_id;
        }
        if update.supervisor_name.is_some() {
            self.supervisor_name = update.supervisor_name;
        }
        if update.committee_id.is_some() {
            self.committee_id = update.committee_id;
        }
        if update.remarks.is_some() {
            self.remarks = update.remarks;
        }
        self
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

pub(crate) fn parse_nature(value: &str) -> Option<NatureOfReceipt> {
    NatureOfReceipt::iter().find(|n| n.as_str().eq_ignore_ascii_case(value.trim()))
}

fn parse_location(value: &str) -> Option<CollectionLocation> {
    CollectionLocation::iter().find(|l| l.as_str().eq_ignore_ascii_case(value.trim()))
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_receipt_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| Utc.from_utc_datetime(&d.and_time(chrono::NaiveTime::MIN)))
}

/// Parses a filter bound; a date-only upper bound covers that whole day.
pub fn parse_date_bound(value: &str, upper: bool) -> Option<DateTime<Utc>> {
    let parsed = parse_receipt_date(value)?;
    let date_only = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_ok();
    if upper && date_only {
        Some(parsed + Duration::days(1))
    } else if upper {
        Some(parsed + Duration::milliseconds(1))
    } else {
        Some(parsed)
    }
}

fn validate_receipt_date(value: &str) -> Result<(), ValidationError> {
    if parse_receipt_date(value).is_some() {
        return Ok(());
    }
    let mut err = ValidationError::new("date");
    err.message = Some("Invalid date format".into());
    Err(err)
}

fn validate_financial_year(value: &str) -> Result<(), ValidationError> {
    if FinancialYear::parse(value).is_ok() {
        return Ok(());
    }
    let mut err = ValidationError::new("financial_year");
    err.message = Some("Financial year must be in YYYY-YY format".into());
    Err(err)
}

fn prefix_row(row: usize, messages: Vec<String>) -> impl Iterator<Item = String> {
    messages
        .into_iter()
        .map(move |message| format!("Row {}: {}", row, message))
}

fn has_batch_duplicates(drafts: &[ReceiptDraft]) -> bool {
    let mut seen = HashSet::new();
    drafts.iter().any(|d| !seen.insert(d.key()))
}

/// Active committees and checkposts referenced by a batch
struct References {
    committees: HashMap<Uuid, committee::Model>,
    checkposts: HashMap<Uuid, checkpost::Model>,
}

impl References {
    async fn load<C: ConnectionTrait>(db: &C, drafts: &[&ReceiptDraft]) -> Result<Self, ServiceError> {
        let committee_ids: Vec<Uuid> = drafts.iter().map(|d| d.committee_id).collect();
        let checkpost_ids: Vec<Uuid> = drafts.iter().filter_map(|d| d.checkpost_id).collect();

        let committees = committee::Entity::find()
            .filter(committee::Column::Id.is_in(committee_ids))
            .filter(committee::Column::IsActive.eq(true))
            .filter(committee::Column::DeletedAt.is_null())
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let checkposts = if checkpost_ids.is_empty() {
            HashMap::new()
        } else {
            checkpost::Entity::find()
                .filter(checkpost::Column::Id.is_in(checkpost_ids))
                .filter(checkpost::Column::IsActive.eq(true))
                .filter(checkpost::Column::DeletedAt.is_null())
                .all(db)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        };

        Ok(Self {
            committees,
            checkposts,
        })
    }

    fn check(&self, draft: &ReceiptDraft) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.committees.contains_key(&draft.committee_id) {
            errors.push("committeeId: Committee not found".to_string());
        }
        if let Some(checkpost_id) = draft.checkpost_id {
            match self.checkposts.get(&checkpost_id) {
                Some(cp) if cp.committee_id == draft.committee_id => {}
                Some(_) => errors
                    .push("checkpostId: Checkpost does not belong to the committee".to_string()),
                None => errors.push("checkpostId: Checkpost not found".to_string()),
            }
        }
        errors
    }
}

/// Active receipts already holding any of `keys`, ignoring rows in `exclude`
async fn existing_duplicates<C: ConnectionTrait>(
    db: &C,
    keys: &[ReceiptKey],
    exclude: &[Uuid],
) -> Result<Vec<receipt::Model>, ServiceError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let mut any = Condition::any();
    for (book, number, committee_id) in keys {
        any = any.add(
            Condition::all()
                .add(receipt::Column::BookNumber.eq(book.clone()))
                .add(receipt::Column::ReceiptNumber.eq(number.clone()))
                .add(receipt::Column::CommitteeId.eq(*committee_id)),
        );
    }
    let mut query = receipt::Entity::find()
        .filter(receipt::Column::IsActive.eq(true))
        .filter(receipt::Column::DeletedAt.is_null())
        .filter(any);
    if !exclude.is_empty() {
        query = query.filter(receipt::Column::Id.is_not_in(exclude.to_vec()));
    }
    Ok(query.all(db).await?)
}

fn duplicate_conflict(duplicates: &[receipt::Model]) -> ServiceError {
    let labels: Vec<String> = duplicates
        .iter()
        .map(|r| format!("{}-{}", r.book_number, r.receipt_number))
        .collect();
    ServiceError::Conflict(format!("Duplicate receipts found: {}", labels.join(", ")))
}

/// Attaches committee and checkpost summaries
async fn hydrate<C: ConnectionTrait>(
    db: &C,
    receipts: Vec<receipt::Model>,
) -> Result<Vec<ReceiptView>, ServiceError> {
    if receipts.is_empty() {
        return Ok(Vec::new());
    }
    let committee_ids: HashSet<Uuid> = receipts.iter().map(|r| r.committee_id).collect();
    let checkpost_ids: HashSet<Uuid> = receipts.iter().filter_map(|r| r.checkpost_id).collect();

    let committees: HashMap<Uuid, CommitteeSummary> = committee::Entity::find()
        .filter(committee::Column::Id.is_in(committee_ids))
        .all(db)
        .await?
        .iter()
        .map(|c| (c.id, CommitteeSummary::from(c)))
        .collect();

    let checkposts: HashMap<Uuid, CheckpostSummary> = if checkpost_ids.is_empty() {
        HashMap::new()
    } else {
        checkpost::Entity::find()
            .filter(checkpost::Column::Id.is_in(checkpost_ids))
            .all(db)
            .await?
            .iter()
            .map(|c| (c.id, CheckpostSummary::from(c)))
            .collect()
    };

    Ok(receipts
        .into_iter()
        .map(|r| {
            let committee = committees.get(&r.committee_id).cloned();
            let checkpost = r.checkpost_id.and_then(|id| checkposts.get(&id).cloned());
            ReceiptView::build(r, committee, checkpost)
        })
        .collect())
}

#[derive(Clone)]
pub struct ReceiptService {
    db: Arc<DatabaseConnection>,
}

impl ReceiptService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &ReceiptFilter,
        page: PageRequest,
    ) -> Result<Paged<ReceiptView>, ServiceError> {
        let db = &*self.db;
        let paginator = filter.apply(receipt::Entity::find()).paginate(db, page.limit);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.page - 1).await?;
        Ok(Paged {
            items: hydrate(db, rows).await?,
            total,
        })
    }

    /// Every receipt matching the filter, newest first
    #[instrument(skip(self))]
    pub async fn export_rows(&self, filter: &ReceiptFilter) -> Result<Vec<ReceiptView>, ServiceError> {
        let db = &*self.db;
        let filter = ReceiptFilter {
            sort_by: ReceiptSortField::Date,
            ascending: false,
            ..filter.clone()
        };
        let rows = filter.apply(receipt::Entity::find()).all(db).await?;
        hydrate(db, rows).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<ReceiptView, ServiceError> {
        let db = &*self.db;
        let model = find_active(db, id).await?;
        hydrate(db, vec![model])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::NotFound("Receipt not found".to_string()))
    }

    #[instrument(skip(self, payload, actor))]
    pub async fn create(
        &self,
        payload: ReceiptPayload,
        actor: &Actor,
    ) -> Result<ReceiptView, ServiceError> {
        let draft = payload.check().map_err(ServiceError::ValidationErrors)?;

        let txn = self.db.begin().await?;
        let refs = References::load(&txn, &[&draft]).await?;
        let ref_errors = refs.check(&draft);
        if !ref_errors.is_empty() {
            return Err(ServiceError::ValidationErrors(ref_errors));
        }

        let duplicates = existing_duplicates(&txn, &[draft.key()], &[]).await?;
        if let Some(dup) = duplicates.first() {
            return Err(ServiceError::Conflict(format!(
                "Receipt {}-{} already exists for this committee",
                dup.book_number, dup.receipt_number
            )));
        }

        let created = draft.into_active(Uuid::new_v4(), actor).insert(&txn).await?;
        actor
            .audit(AuditEntry::new("receipts", created.id, AuditAction::Create).new_values(&created))
            .write(&txn)
            .await?;
        txn.commit().await?;

        counter!("amc.receipts.created", 1);
        info!(receipt_id = %created.id, committee_id = %created.committee_id, "receipt created");
        self.get(created.id).await
    }

    #[instrument(skip(self, update, actor))]
    pub async fn update(
        &self,
        id: Uuid,
        update: UpdateReceiptRequest,
        actor: &Actor,
    ) -> Result<ReceiptView, ServiceError> {
        let txn = self.db.begin().await?;
        let existing = find_active(&txn, id).await?;

        let draft = ReceiptPayload::from_model(&existing)
            .merge(update)
            .check()
            .map_err(ServiceError::ValidationErrors)?;

        let refs = References::load(&txn, &[&draft]).await?;
        let ref_errors = refs.check(&draft);
        if !ref_errors.is_empty() {
            return Err(ServiceError::ValidationErrors(ref_errors));
        }

        let key_changed = draft.key()
            != (
                existing.book_number.clone(),
                existing.receipt_number.clone(),
                existing.committee_id,
            );
        if key_changed {
            let duplicates = existing_duplicates(&txn, &[draft.key()], &[id]).await?;
            if !duplicates.is_empty() {
                return Err(duplicate_conflict(&duplicates));
            }
        }

        let updated = draft.apply_to(existing.clone(), actor).update(&txn).await?;
        actor
            .audit(
                AuditEntry::new("receipts", id, AuditAction::Update)
                    .old(&existing)
                    .new_values(&updated),
            )
            .write(&txn)
            .await?;
        txn.commit().await?;

        info!(receipt_id = %id, "receipt updated");
        self.get(id).await
    }

    #[instrument(skip(self, actor))]
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let existing = find_active(&txn, id).await?;

        let now = Utc::now();
        let mut active: receipt::ActiveModel = existing.clone().into();
        active.is_active = Set(false);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.updated_by = Set(Some(actor.user_id));
        active.update(&txn).await?;

        actor
            .audit(AuditEntry::new("receipts", id, AuditAction::Delete).old(&existing))
            .write(&txn)
            .await?;
        txn.commit().await?;

        info!(receipt_id = %id, "receipt deleted");
        Ok(())
    }

    /// All-or-nothing creation of up to [`MAX_BULK_CREATE`] receipts
    #[instrument(skip(self, payloads, actor), fields(rows = payloads.len()))]
    pub async fn bulk_create(
        &self,
        payloads: Vec<ReceiptPayload>,
        actor: &Actor,
    ) -> Result<Vec<ReceiptView>, ServiceError> {
        if payloads.is_empty() || payloads.len() > MAX_BULK_CREATE {
            return Err(ServiceError::ValidationError(format!(
                "Between 1 and {} receipts can be created at once",
                MAX_BULK_CREATE
            )));
        }

        let mut errors = Vec::new();
        let mut drafts = Vec::with_capacity(payloads.len());
        for (i, payload) in payloads.iter().enumerate() {
            match payload.check() {
                Ok(draft) => drafts.push((i + 1, draft)),
                Err(messages) => errors.extend(prefix_row(i + 1, messages)),
            }
        }

        let refs = References::load(&*self.db, &drafts.iter().map(|(_, d)| d).collect::<Vec<_>>())
            .await?;
        for (row, draft) in &drafts {
            errors.extend(prefix_row(*row, refs.check(draft)));
        }
        if !errors.is_empty() {
            return Err(ServiceError::ValidationErrors(errors));
        }

        let drafts: Vec<ReceiptDraft> = drafts.into_iter().map(|(_, d)| d).collect();
        let created = self.insert_batch(drafts, actor).await?;
        info!(count = created.len(), "bulk receipts created");
        Ok(created)
    }

    /// Resolves committee codes and checkpost names, then imports as one batch
    #[instrument(skip(self, rows, actor), fields(rows = rows.len()))]
    pub async fn import(
        &self,
        rows: Vec<ImportReceiptRow>,
        validate_only: bool,
        actor: &Actor,
    ) -> Result<ImportOutcome, ServiceError> {
        if rows.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one receipt is required".to_string(),
            ));
        }

        let db = &*self.db;
        let committees: HashMap<String, committee::Model> = committee::Entity::find()
            .filter(committee::Column::IsActive.eq(true))
            .filter(committee::Column::DeletedAt.is_null())
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.code.clone(), c))
            .collect();
        let checkposts: HashMap<(Uuid, String), checkpost::Model> = checkpost::Entity::find()
            .filter(checkpost::Column::IsActive.eq(true))
            .filter(checkpost::Column::DeletedAt.is_null())
            .all(db)
            .await?
            .into_iter()
            .map(|cp| ((cp.committee_id, cp.name.clone()), cp))
            .collect();

        let mut errors = Vec::new();
        let mut drafts = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            let row_num = i + 1;
            let code = row.committee_code.trim().to_string();
            let Some(parent) = committees.get(&code) else {
                errors.push(format!(
                    "Row {}: Committee with code '{}' not found",
                    row_num, code
                ));
                continue;
            };

            let mut checkpost_id = None;
            let at_checkpost =
                parse_location(&row.collection_location) == Some(CollectionLocation::Checkpost);
            if at_checkpost {
                match non_blank(&row.checkpost_name) {
                    Some(name) => match checkposts.get(&(parent.id, name.clone())) {
                        Some(cp) => checkpost_id = Some(cp.id),
                        None => {
                            errors.push(format!(
                                "Row {}: Checkpost '{}' not found for committee '{}'",
                                row_num, name, code
                            ));
                            continue;
                        }
                    },
                    None => {
                        errors.push(format!(
                            "Row {}: checkpostName: Checkpost name is required when collection location is CHECKPOST",
                            row_num
                        ));
                        continue;
                    }
                }
            }

            let payload = ReceiptPayload {
                book_number: row.book_number,
                receipt_number: row.receipt_number,
                date: row.date,
                trader_name: row.trader_name,
                payee_name: row.payee_name,
                commodity: row.commodity,
                transaction_value: row.transaction_value,
                market_fee: row.market_fee,
                nature_of_receipt: row.nature_of_receipt,
                nature_of_receipt_other: row.nature_of_receipt_other,
                collection_location: row.collection_location,
                collection_location_other: row.collection_location_other,
                checkpost_id,
                supervisor_name: row.supervisor_name,
                committee_id: Some(parent.id),
                financial_year: row.financial_year,
                remarks: row.remarks,
            };
            match payload.check() {
                Ok(draft) => drafts.push(draft),
                Err(messages) => errors.extend(prefix_row(row_num, messages)),
            }
        }

        if !errors.is_empty() {
            warn!(errors = errors.len(), "receipt import rejected");
            return Err(ServiceError::ValidationErrors(errors));
        }

        if validate_only {
            if has_batch_duplicates(&drafts) {
                return Err(ServiceError::BadRequest(
                    "Duplicate receipt numbers found in the batch".to_string(),
                ));
            }
            let keys: Vec<ReceiptKey> = drafts.iter().map(ReceiptDraft::key).collect();
            let duplicates = existing_duplicates(db, &keys, &[]).await?;
            if !duplicates.is_empty() {
                return Err(duplicate_conflict(&duplicates));
            }
            let count = drafts.len();
            return Ok(ImportOutcome::Validated {
                valid: true,
                count,
                message: format!("{} receipts are valid and ready for import", count),
            });
        }

        let receipts = self.insert_batch(drafts, actor).await?;
        counter!("amc.receipts.imported", receipts.len() as u64);
        info!(count = receipts.len(), "receipts imported");
        Ok(ImportOutcome::Imported {
            count: receipts.len(),
            receipts,
            imported_at: Utc::now(),
        })
    }

    /// All-or-nothing update of up to [`MAX_BULK_UPDATE`] receipts
    #[instrument(skip(self, items, actor), fields(rows = items.len()))]
    pub async fn bulk_update(
        &self,
        items: Vec<BulkUpdateItem>,
        actor: &Actor,
    ) -> Result<Vec<ReceiptView>, ServiceError> {
        if items.is_empty() || items.len() > MAX_BULK_UPDATE {
            return Err(ServiceError::ValidationError(format!(
                "Between 1 and {} receipts can be updated at once",
                MAX_BULK_UPDATE
            )));
        }

        let txn = self.db.begin().await?;
        let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let existing: HashMap<Uuid, receipt::Model> = receipt::Entity::find()
            .filter(receipt::Column::Id.is_in(ids.clone()))
            .filter(receipt::Column::IsActive.eq(true))
            .filter(receipt::Column::DeletedAt.is_null())
            .all(&txn)
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !existing.contains_key(id))
            .map(Uuid::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "Receipts not found: {}",
                missing.join(", ")
            )));
        }

        let mut errors = Vec::new();
        let mut drafts = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let Some(current) = existing.get(&item.id) else {
                continue;
            };
            match ReceiptPayload::from_model(current).merge(item.data).check() {
                Ok(draft) => drafts.push((i + 1, item.id, draft)),
                Err(messages) => errors.extend(prefix_row(i + 1, messages)),
            }
        }

        let refs = References::load(&txn, &drafts.iter().map(|(_, _, d)| d).collect::<Vec<_>>())
            .await?;
        for (row, _, draft) in &drafts {
            errors.extend(prefix_row(*row, refs.check(draft)));
        }
        if !errors.is_empty() {
            return Err(ServiceError::ValidationErrors(errors));
        }

        let only_drafts: Vec<ReceiptDraft> = drafts.iter().map(|(_, _, d)| d.clone()).collect();
        if has_batch_duplicates(&only_drafts) {
            return Err(ServiceError::BadRequest(
                "Duplicate receipt numbers found in the batch".to_string(),
            ));
        }
        let keys: Vec<ReceiptKey> = only_drafts.iter().map(ReceiptDraft::key).collect();
        let duplicates = existing_duplicates(&txn, &keys, &ids).await?;
        if !duplicates.is_empty() {
            return Err(duplicate_conflict(&duplicates));
        }

        let mut updated = Vec::with_capacity(drafts.len());
        for (_, id, draft) in drafts {
            let Some(before) = existing.get(&id) else {
                continue;
            };
            let after = draft.apply_to(before.clone(), actor).update(&txn).await?;
            actor
                .audit(
                    AuditEntry::new("receipts", id, AuditAction::Update)
                        .old(before)
                        .new_values(&after),
                )
                .write(&txn)
                .await?;
            updated.push(after);
        }
        txn.commit().await?;

        info!(count = updated.len(), "bulk receipts updated");
        hydrate(&*self.db, updated).await
    }

    /// Duplicate checks and inserts for an already validated batch, in one transaction
    async fn insert_batch(
        &self,
        drafts: Vec<ReceiptDraft>,
        actor: &Actor,
    ) -> Result<Vec<ReceiptView>, ServiceError> {
        if has_batch_duplicates(&drafts) {
            return Err(ServiceError::BadRequest(
                "Duplicate receipt numbers found in the batch".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let keys: Vec<ReceiptKey> = drafts.iter().map(ReceiptDraft::key).collect();
        let duplicates = existing_duplicates(&txn, &keys, &[]).await?;
        if !duplicates.is_empty() {
            return Err(duplicate_conflict(&duplicates));
        }

        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let model = draft.into_active(Uuid::new_v4(), actor).insert(&txn).await?;
            actor
                .audit(AuditEntry::new("receipts", model.id, AuditAction::Create).new_values(&model))
                .write(&txn)
                .await?;
            created.push(model);
        }
        txn.commit().await?;

        counter!("amc.receipts.created", created.len() as u64);
        hydrate(&*self.db, created).await
    }
}

async fn find_active<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<receipt::Model, ServiceError> {
    receipt::Entity::find_by_id(id)
        .filter(receipt::Column::IsActive.eq(true))
        .filter(receipt::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Receipt not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payload() -> ReceiptPayload {
        ReceiptPayload {
            book_number: "B1".into(),
            receipt_number: "R1".into(),
            date: "2025-06-10".into(),
            trader_name: "Sri Lakshmi Traders".into(),
            payee_name: "K. Rao".into(),
            commodity: "Paddy".into(),
            transaction_value: dec!(100000),
            market_fee: dec!(1000),
            nature_of_receipt: "MF".into(),
            collection_location: "OFFICE".into(),
            committee_id: Some(Uuid::new_v4()),
            financial_year: "2025-26".into(),
            ..Default::default()
        }
    }

    #[test]
    fn valid_payload_becomes_draft() {
        let draft = payload().check().unwrap();
        assert_eq!(draft.nature_of_receipt, NatureOfReceipt::Mf);
        assert_eq!(draft.collection_location, CollectionLocation::Office);
        assert_eq!(draft.date.to_rfc3339(), "2025-06-10T00:00:00+00:00");
        assert_eq!(draft.checkpost_id, None);
    }

    #[test]
    fn every_failure_is_reported_at_once() {
        let bad = ReceiptPayload {
            book_number: String::new(),
            market_fee: Decimal::ZERO,
            nature_of_receipt: "FEE".into(),
            financial_year: "2025-27".into(),
            date: "10/06/2025".into(),
            ..payload()
        };
        let errors = bad.check().unwrap_err();
        assert!(errors.contains(&"bookNumber: Book number is required".to_string()));
        assert!(errors.contains(&"marketFee: Market fee must be greater than 0".to_string()));
        assert!(errors.contains(&"natureOfReceipt: Must be one of MF, OTHERS".to_string()));
        assert!(errors.iter().any(|e| e.starts_with("financialYear: ")));
        assert!(errors.iter().any(|e| e.starts_with("date: ")));
    }

    #[test]
    fn conditional_fields_follow_location_and_nature() {
        let checkpost_without_id = ReceiptPayload {
            collection_location: "CHECKPOST".into(),
            ..payload()
        };
        assert_eq!(
            checkpost_without_id.check().unwrap_err(),
            vec!["checkpostId: Checkpost is required when collection location is CHECKPOST"]
        );

        let others_without_detail = ReceiptPayload {
            nature_of_receipt: "OTHERS".into(),
            ..payload()
        };
        assert!(others_without_detail.check().unwrap_err()[0].starts_with("natureOfReceiptOther"));

        let supervisor_without_name = ReceiptPayload {
            collection_location: "SUPERVISOR".into(),
            supervisor_name: Some("  ".into()),
            ..payload()
        };
        assert!(supervisor_without_name.check().unwrap_err()[0].starts_with("supervisorName"));
    }

    #[test]
    fn office_collections_drop_stray_checkpost() {
        let draft = ReceiptPayload {
            checkpost_id: Some(Uuid::new_v4()),
            ..payload()
        }
        .check()
        .unwrap();
        assert_eq!(draft.checkpost_id, None);
    }

    #[test]
    fn missing_committee_is_a_field_error() {
        let errors = ReceiptPayload {
            committee_id: None,
            ..payload()
        }
        .check()
        .unwrap_err();
        assert_eq!(errors, vec!["committeeId: Committee ID is required"]);
    }

    #[test]
    fn merge_overlays_only_supplied_fields() {
        let base = payload();
        let merged = base.clone().merge(UpdateReceiptRequest {
            market_fee: Some(dec!(2500)),
            remarks: Some("corrected".into()),
            ..Default::default()
        });
        assert_eq!(merged.market_fee, dec!(2500));
        assert_eq!(merged.remarks.as_deref(), Some("corrected"));
        assert_eq!(merged.book_number, base.book_number);
    }

    #[test]
    fn batch_duplicate_detection() {
        let a = payload().check().unwrap();
        let mut b = a.clone();
        assert!(has_batch_duplicates(&[a.clone(), b.clone()]));
        b.receipt_number = "R2".into();
        assert!(!has_batch_duplicates(&[a, b]));
    }

    #[test]
    fn date_bounds() {
        let end = parse_date_bound("2025-06-30", true).unwrap();
        assert_eq!(end.to_rfc3339(), "2025-07-01T00:00:00+00:00");
        let start = parse_date_bound("2025-06-01", false).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-06-01T00:00:00+00:00");
        assert!(parse_receipt_date("2025-06-10T08:30:00Z").is_some());
        assert!(parse_receipt_date("June 10").is_none());
    }

    #[test]
    fn sort_fields_parse_wire_names() {
        assert_eq!(ReceiptSortField::parse("marketFee"), Some(ReceiptSortField::MarketFee));
        assert_eq!(ReceiptSortField::parse("amount"), None);
    }
}
