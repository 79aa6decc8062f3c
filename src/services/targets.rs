use crate::entities::{checkpost, checkpost_target, committee, monthly_target, target, AuditAction};
use crate::errors::{flatten_validation_errors, ServiceError};
use crate::financial_year::{FinancialMonth, FinancialYear};
use crate::services::aggregation::TargetPlan;
use crate::services::committees::{self, CommitteeSummary};
use crate::services::{Actor, AuditEntry, PageRequest, Paged};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTargetInput {
    /// `MAY`..`APRIL`, or an English month name
    pub month: String,
    #[schema(value_type = f64)]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckpostTargetInput {
    pub checkpost_id: Uuid,
    pub month: String,
    #[schema(value_type = f64)]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetRequest {
    #[validate(required(message = "Committee ID is required"))]
    pub committee_id: Option<Uuid>,
    #[serde(default)]
    #[validate(custom = "validate_financial_year")]
    pub financial_year: String,
    #[serde(default)]
    #[schema(value_type = f64)]
    pub yearly_target: Decimal,
    pub description: Option<String>,
    #[serde(default)]
    pub monthly_targets: Vec<MonthlyTargetInput>,
    #[serde(default)]
    pub checkpost_targets: Vec<CheckpostTargetInput>,
}

/// Replaces the yearly figure and description; breakdowns are replaced only when present
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTargetRequest {
    #[schema(value_type = Option<f64>)]
    pub yearly_target: Option<Decimal>,
    pub description: Option<String>,
    pub monthly_targets: Option<Vec<MonthlyTargetInput>>,
    pub checkpost_targets: Option<Vec<CheckpostTargetInput>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTargetView {
    pub month: FinancialMonth,
    #[schema(value_type = String)]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckpostTargetView {
    pub checkpost_id: Uuid,
    pub checkpost_name: Option<String>,
    pub month: FinancialMonth,
    #[schema(value_type = String)]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetView {
    pub id: Uuid,
    pub committee_id: Uuid,
    pub financial_year: String,
    #[schema(value_type = String)]
    pub yearly_target: Decimal,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub committee: Option<CommitteeSummary>,
    /// Financial-year order
    pub monthly_targets: Vec<MonthlyTargetView>,
    pub checkpost_targets: Vec<CheckpostTargetView>,
}

/// Validated monthly and checkpost breakdown
#[derive(Debug, Clone, Default, PartialEq)]
struct Breakdown {
    monthly: Vec<(FinancialMonth, Decimal)>,
    checkpost: Vec<(Uuid, FinancialMonth, Decimal)>,
}

fn validate_financial_year(value: &str) -> Result<(), ValidationError> {
    if FinancialYear::parse(value).is_ok() {
        return Ok(());
    }
    let mut err = ValidationError::new("financial_year");
    err.message = Some("Financial year must be in YYYY-YY format".into());
    Err(err)
}

fn check_yearly(amount: Decimal, errors: &mut Vec<String>) {
    if amount <= Decimal::ZERO {
        errors.push("yearlyTarget: Yearly target must be positive".to_string());
    }
}

fn check_monthly(inputs: &[MonthlyTargetInput], errors: &mut Vec<String>) -> Vec<(FinancialMonth, Decimal)> {
    let mut seen = HashSet::new();
    let mut months = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let Ok(month) = FinancialMonth::from_str(&input.month) else {
            errors.push(format!("monthlyTargets[{}].month: Invalid month '{}'", i, input.month));
            continue;
        };
        if !seen.insert(month) {
            errors.push(format!(
                "monthlyTargets[{}].month: {} appears more than once",
                i,
                month.label()
            ));
        }
        if input.amount <= Decimal::ZERO {
            errors.push(format!(
                "monthlyTargets[{}].amount: Monthly target must be positive",
                i
            ));
        }
        months.push((month, input.amount));
    }
    months
}

fn check_checkpost(
    inputs: &[CheckpostTargetInput],
    errors: &mut Vec<String>,
) -> Vec<(Uuid, FinancialMonth, Decimal)> {
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let Ok(month) = FinancialMonth::from_str(&input.month) else {
            errors.push(format!("checkpostTargets[{}].month: Invalid month '{}'", i, input.month));
            continue;
        };
        if !seen.insert((input.checkpost_id, month)) {
            errors.push(format!(
                "checkpostTargets[{}]: {} target for this checkpost appears more than once",
                i,
                month.label()
            ));
        }
        if input.amount < Decimal::ZERO {
            errors.push(format!(
                "checkpostTargets[{}].amount: Checkpost target cannot be negative",
                i
            ));
        }
        rows.push((input.checkpost_id, month, input.amount));
    }
    rows
}

impl CreateTargetRequest {
    fn check(&self) -> Result<(Uuid, FinancialYear, Breakdown), ServiceError> {
        let mut errors = match self.validate() {
            Ok(()) => Vec::new(),
            Err(e) => flatten_validation_errors(&e),
        };
        check_yearly(self.yearly_target, &mut errors);
        let monthly = check_monthly(&self.monthly_targets, &mut errors);
        let checkpost = check_checkpost(&self.checkpost_targets, &mut errors);

        match (self.committee_id, FinancialYear::parse(&self.financial_year)) {
            (Some(committee_id), Ok(fy)) if errors.is_empty() => {
                Ok((committee_id, fy, Breakdown { monthly, checkpost }))
            }
            _ => Err(ServiceError::ValidationErrors(errors)),
        }
    }
}

/// Checkpost targets need a committee with checkposts, and each checkpost must be its own.
async fn check_checkpost_owners<C: ConnectionTrait>(
    db: &C,
    parent: &committee::Model,
    rows: &[(Uuid, FinancialMonth, Decimal)],
) -> Result<(), ServiceError> {
    if rows.is_empty() {
        return Ok(());
    }
    if !parent.has_checkposts {
        return Err(ServiceError::ValidationError(format!(
            "Committee '{}' has no checkposts; checkpost targets are not allowed",
            parent.code
        )));
    }
    let owned: HashSet<Uuid> = checkpost::Entity::find()
        .filter(checkpost::Column::CommitteeId.eq(parent.id))
        .filter(checkpost::Column::IsActive.eq(true))
        .filter(checkpost::Column::DeletedAt.is_null())
        .all(db)
        .await?
        .into_iter()
        .map(|cp| cp.id)
        .collect();
    let foreign: Vec<String> = rows
        .iter()
        .filter(|(id, _, _)| !owned.contains(id))
        .map(|(id, _, _)| id.to_string())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    if !foreign.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "Checkposts do not belong to committee '{}': {}",
            parent.code,
            foreign.join(", ")
        )));
    }
    Ok(())
}

async fn write_breakdown<C: ConnectionTrait>(
    db: &C,
    target_id: Uuid,
    breakdown: &Breakdown,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    for (month, amount) in &breakdown.monthly {
        monthly_target::ActiveModel {
            id: Set(Uuid::new_v4()),
            target_id: Set(target_id),
            month: Set(*month),
            amount: Set(*amount),
            created_at: Set(now),
        }
        .insert(db)
        .await?;
    }
    for (checkpost_id, month, amount) in &breakdown.checkpost {
        checkpost_target::ActiveModel {
            id: Set(Uuid::new_v4()),
            target_id: Set(target_id),
            checkpost_id: Set(*checkpost_id),
            month: Set(*month),
            amount: Set(*amount),
            created_at: Set(now),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Loads breakdown rows and committee summaries for a set of targets
async fn hydrate<C: ConnectionTrait>(
    db: &C,
    targets: Vec<target::Model>,
) -> Result<Vec<TargetView>, ServiceError> {
    if targets.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = targets.iter().map(|t| t.id).collect();
    let committee_ids: HashSet<Uuid> = targets.iter().map(|t| t.committee_id).collect();

    let committees: HashMap<Uuid, CommitteeSummary> = committee::Entity::find()
        .filter(committee::Column::Id.is_in(committee_ids))
        .all(db)
        .await?
        .iter()
        .map(|c| (c.id, CommitteeSummary::from(c)))
        .collect();

    let mut monthly: HashMap<Uuid, Vec<MonthlyTargetView>> = HashMap::new();
    for row in monthly_target::Entity::find()
        .filter(monthly_target::Column::TargetId.is_in(ids.clone()))
        .all(db)
        .await?
    {
        monthly.entry(row.target_id).or_default().push(MonthlyTargetView {
            month: row.month,
            amount: row.amount,
        });
    }

    let cp_rows = checkpost_target::Entity::find()
        .filter(checkpost_target::Column::TargetId.is_in(ids))
        .all(db)
        .await?;
    let cp_names: HashMap<Uuid, String> = if cp_rows.is_empty() {
        HashMap::new()
    } else {
        checkpost::Entity::find()
            .filter(checkpost::Column::Id.is_in(cp_rows.iter().map(|r| r.checkpost_id).collect::<HashSet<_>>()))
            .all(db)
            .await?
            .into_iter()
            .map(|cp| (cp.id, cp.name))
            .collect()
    };
    let mut by_checkpost: HashMap<Uuid, Vec<CheckpostTargetView>> = HashMap::new();
    for row in cp_rows {
        by_checkpost.entry(row.target_id).or_default().push(CheckpostTargetView {
            checkpost_id: row.checkpost_id,
            checkpost_name: cp_names.get(&row.checkpost_id).cloned(),
            month: row.month,
            amount: row.amount,
        });
    }

    Ok(targets
        .into_iter()
        .map(|t| {
            let mut monthly_targets = monthly.remove(&t.id).unwrap_or_default();
            monthly_targets.sort_by_key(|m| m.month);
            let mut checkpost_targets = by_checkpost.remove(&t.id).unwrap_or_default();
            checkpost_targets.sort_by(|a, b| {
                a.checkpost_name
                    .cmp(&b.checkpost_name)
                    .then(a.month.cmp(&b.month))
            });
            TargetView {
                committee: committees.get(&t.committee_id).cloned(),
                id: t.id,
                committee_id: t.committee_id,
                financial_year: t.financial_year,
                yearly_target: t.yearly_target,
                description: t.description,
                created_by: t.created_by,
                created_at: t.created_at,
                updated_at: t.updated_at,
                monthly_targets,
                checkpost_targets,
            }
        })
        .collect())
}

fn active_targets() -> sea_orm::Select<target::Entity> {
    target::Entity::find()
        .filter(target::Column::IsActive.eq(true))
        .filter(target::Column::DeletedAt.is_null())
}

/// Committee and checkpost plans of one financial year, as reports consume them
#[derive(Debug, Clone, Default)]
pub struct TargetBook {
    pub committees: HashMap<Uuid, TargetPlan>,
    pub checkposts: HashMap<Uuid, TargetPlan>,
}

impl TargetBook {
    pub fn committee(&self, id: Uuid) -> TargetPlan {
        self.committees.get(&id).cloned().unwrap_or_default()
    }

    pub fn checkpost(&self, id: Uuid) -> TargetPlan {
        self.checkposts.get(&id).cloned().unwrap_or_default()
    }

    /// Loads the active target of every committee for `fy`. When several are
    /// active for one committee the most recently created wins.
    pub async fn load<C: ConnectionTrait>(db: &C, fy: FinancialYear) -> Result<Self, ServiceError> {
        let mut chosen: HashMap<Uuid, target::Model> = HashMap::new();
        for t in active_targets()
            .filter(target::Column::FinancialYear.eq(fy.label()))
            .order_by_desc(target::Column::CreatedAt)
            .all(db)
            .await?
        {
            chosen.entry(t.committee_id).or_insert(t);
        }
        if chosen.is_empty() {
            return Ok(Self::default());
        }

        let target_ids: Vec<Uuid> = chosen.values().map(|t| t.id).collect();
        let owner: HashMap<Uuid, Uuid> = chosen.values().map(|t| (t.id, t.committee_id)).collect();

        let mut committees: HashMap<Uuid, TargetPlan> = chosen
            .values()
            .map(|t| (t.committee_id, TargetPlan::new(t.yearly_target)))
            .collect();
        for row in monthly_target::Entity::find()
            .filter(monthly_target::Column::TargetId.is_in(target_ids.clone()))
            .all(db)
            .await?
        {
            if let Some(plan) = owner.get(&row.target_id).and_then(|c| committees.get_mut(c)) {
                *plan = std::mem::take(plan).with_month(row.month, row.amount);
            }
        }

        let mut months_by_checkpost: HashMap<Uuid, Vec<(FinancialMonth, Decimal)>> = HashMap::new();
        for row in checkpost_target::Entity::find()
            .filter(checkpost_target::Column::TargetId.is_in(target_ids))
            .all(db)
            .await?
        {
            months_by_checkpost
                .entry(row.checkpost_id)
                .or_default()
                .push((row.month, row.amount));
        }
        let checkposts = months_by_checkpost
            .into_iter()
            .map(|(id, months)| (id, TargetPlan::from_months(months)))
            .collect();

        Ok(Self {
            committees,
            checkposts,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct TargetFilter {
    pub committee_id: Option<Uuid>,
    pub financial_year: Option<String>,
}

#[derive(Clone)]
pub struct TargetService {
    db: Arc<DatabaseConnection>,
}

impl TargetService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &TargetFilter,
        page: PageRequest,
    ) -> Result<Paged<TargetView>, ServiceError> {
        let db = &*self.db;
        let mut query = active_targets()
            .order_by_desc(target::Column::FinancialYear)
            .order_by_desc(target::Column::CreatedAt);
        if let Some(committee_id) = filter.committee_id {
            query = query.filter(target::Column::CommitteeId.eq(committee_id));
        }
        if let Some(fy) = &filter.financial_year {
            query = query.filter(target::Column::FinancialYear.eq(fy.clone()));
        }
        let paginator = query.paginate(db, page.limit);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.page - 1).await?;
        Ok(Paged {
            items: hydrate(db, rows).await?,
            total,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<TargetView, ServiceError> {
        let db = &*self.db;
        let model = find_active(db, id).await?;
        hydrate(db, vec![model])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::NotFound("Target not found".to_string()))
    }

    #[instrument(skip(self, request, actor))]
    pub async fn create(
        &self,
        request: CreateTargetRequest,
        actor: &Actor,
    ) -> Result<TargetView, ServiceError> {
        let (committee_id, fy, breakdown) = request.check()?;

        let txn = self.db.begin().await?;
        let parent = committees::find_active(&txn, committee_id).await?;

        let clash = active_targets()
            .filter(target::Column::CommitteeId.eq(committee_id))
            .filter(target::Column::FinancialYear.eq(fy.label()))
            .one(&txn)
            .await?;
        if clash.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Target for committee '{}' and financial year {} already exists",
                parent.code, fy
            )));
        }
        check_checkpost_owners(&txn, &parent, &breakdown.checkpost).await?;

        let now = Utc::now();
        let created = target::ActiveModel {
            id: Set(Uuid::new_v4()),
            committee_id: Set(committee_id),
            financial_year: Set(fy.label()),
            yearly_target: Set(request.yearly_target),
            description: Set(request.description.filter(|d| !d.trim().is_empty())),
            created_by: Set(Some(actor.user_id)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;
        write_breakdown(&txn, created.id, &breakdown).await?;

        let view = hydrate(&txn, vec![created.clone()])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::InternalError("Target vanished after insert".to_string()))?;
        actor
            .audit(AuditEntry::new("targets", created.id, AuditAction::Create).new_values(&view))
            .write(&txn)
            .await?;
        txn.commit().await?;

        info!(target_id = %created.id, committee_id = %committee_id, financial_year = %fy, "target created");
        Ok(view)
    }

    #[instrument(skip(self, request, actor))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateTargetRequest,
        actor: &Actor,
    ) -> Result<TargetView, ServiceError> {
        let mut errors = Vec::new();
        if let Some(yearly) = request.yearly_target {
            check_yearly(yearly, &mut errors);
        }
        let monthly = request
            .monthly_targets
            .as_deref()
            .map(|m| check_monthly(m, &mut errors));
        let checkpost = request
            .checkpost_targets
            .as_deref()
            .map(|c| check_checkpost(c, &mut errors));
        if !errors.is_empty() {
            return Err(ServiceError::ValidationErrors(errors));
        }

        let txn = self.db.begin().await?;
        let existing = find_active(&txn, id).await?;
        let before = hydrate(&txn, vec![existing.clone()]).await?.pop();
        let parent = committees::find_active(&txn, existing.committee_id).await?;

        if let Some(rows) = &checkpost {
            check_checkpost_owners(&txn, &parent, rows).await?;
        }

        if let Some(months) = monthly {
            for row in existing.find_related(monthly_target::Entity).all(&txn).await? {
                row.delete(&txn).await?;
            }
            write_breakdown(&txn, id, &Breakdown { monthly: months, checkpost: Vec::new() }).await?;
        }
        if let Some(rows) = checkpost {
            for row in existing.find_related(checkpost_target::Entity).all(&txn).await? {
                row.delete(&txn).await?;
            }
            write_breakdown(&txn, id, &Breakdown { monthly: Vec::new(), checkpost: rows }).await?;
        }

        let mut active: target::ActiveModel = existing.into();
        if let Some(yearly) = request.yearly_target {
            active.yearly_target = Set(yearly);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description).filter(|d| !d.trim().is_empty()));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        let after = hydrate(&txn, vec![updated])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::NotFound("Target not found".to_string()))?;
        let mut entry = AuditEntry::new("targets", id, AuditAction::Update).new_values(&after);
        if let Some(before) = &before {
            entry = entry.old(before);
        }
        actor.audit(entry).write(&txn).await?;
        txn.commit().await?;

        info!(target_id = %id, "target updated");
        Ok(after)
    }

    #[instrument(skip(self, actor))]
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let existing = find_active(&txn, id).await?;

        let now = Utc::now();
        let mut active: target::ActiveModel = existing.clone().into();
        active.is_active = Set(false);
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        actor
            .audit(AuditEntry::new("targets", id, AuditAction::Delete).old(&existing))
            .write(&txn)
            .await?;
        txn.commit().await?;

        info!(target_id = %id, "target deleted");
        Ok(())
    }
}

async fn find_active<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<target::Model, ServiceError> {
    active_targets()
        .filter(target::Column::Id.eq(id))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Target not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn request() -> CreateTargetRequest {
        CreateTargetRequest {
            committee_id: Some(Uuid::new_v4()),
            financial_year: "2025-26".into(),
            yearly_target: dec!(1200000),
            monthly_targets: FinancialMonth::ALL
                .iter()
                .map(|m| MonthlyTargetInput {
                    month: m.as_str().to_string(),
                    amount: dec!(100000),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn full_year_split_is_accepted() {
        let (_, fy, breakdown) = request().check().unwrap();
        assert_eq!(fy, FinancialYear::new(2025));
        assert_eq!(breakdown.monthly.len(), 12);
        assert_eq!(breakdown.monthly[0], (FinancialMonth::May, dec!(100000)));
    }

    #[test]
    fn monthly_sum_need_not_match_yearly() {
        let mut req = request();
        req.monthly_targets.truncate(2);
        assert!(req.check().is_ok());
    }

    #[test]
    fn repeated_month_and_bad_amounts_are_rejected() {
        let mut req = request();
        req.yearly_target = Decimal::ZERO;
        req.monthly_targets[1].month = "May".into();
        req.monthly_targets[2].amount = dec!(-5);
        let err = req.check().unwrap_err();
        assert_matches!(err, ServiceError::ValidationErrors(ref errors) if errors.len() == 3);
        if let ServiceError::ValidationErrors(errors) = err {
            assert!(errors.contains(&"yearlyTarget: Yearly target must be positive".to_string()));
            assert!(errors.iter().any(|e| e.contains("appears more than once")));
        }
    }

    #[test]
    fn checkpost_targets_may_be_zero_but_not_negative() {
        let cp = Uuid::new_v4();
        let mut errors = Vec::new();
        let rows = check_checkpost(
            &[
                CheckpostTargetInput {
                    checkpost_id: cp,
                    month: "JUNE".into(),
                    amount: Decimal::ZERO,
                },
                CheckpostTargetInput {
                    checkpost_id: cp,
                    month: "July".into(),
                    amount: dec!(-1),
                },
            ],
            &mut errors,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn bad_financial_year_is_field_annotated() {
        let mut req = request();
        req.financial_year = "2025".into();
        assert_matches!(
            req.check(),
            Err(ServiceError::ValidationErrors(errors))
                if errors == vec!["financialYear: Financial year must be in YYYY-YY format"]
        );
    }
}
