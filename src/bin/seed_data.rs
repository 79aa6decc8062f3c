//! Seed data script - populates the database with the district's committees
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - 9 Agricultural Market Committees and their checkposts
//! - An admin account (SEED_ADMIN_EMAIL / SEED_ADMIN_PASSWORD)
//! - Default system configuration
//! - One target per committee for the current financial year
//! - A few sample market fee receipts
//!
//! Existing committee codes, users and config keys are skipped, so the
//! script can be re-run safely.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use sea_orm_migration::MigratorTrait;
use std::time::Duration as StdDuration;
use tracing::info;
use uuid::Uuid;

use amc_market_fees::{
    auth::hash_password,
    entities::{
        checkpost, committee, monthly_target, receipt, system_config, target, user,
        CollectionLocation, ConfigDataType, NatureOfReceipt, Role,
    },
    financial_year::{FinancialMonth, FinancialYear},
    migrator::Migrator,
};

const DISTRICT: &str = "Kakinada";
const STATE: &str = "Andhra Pradesh";

/// (code, name, checkposts)
const COMMITTEES: &[(&str, &str, &[&str])] = &[
    ("KRP-AMC", "Karapa", &["Penuguduru"]),
    ("KKDR-AMC", "Kakinada Rural", &["Atchempeta", "Turangi Bypass"]),
    ("PTM-AMC", "Pithapuram", &["Pithapuram", "Chebrolu"]),
    ("TUNI-AMC", "Tuni", &["Tuni", "K/P/Puram", "Rekavanipalem"]),
    ("PTD-AMC", "Prathipadu", &["Kathipudi", "Prathipadu", "Yerravaram"]),
    ("JPT-AMC", "Jaggampeta", &["Jaggampeta", "Rajupalem"]),
    ("PDM-AMC", "Peddapuram", &["Peddapuram"]),
    ("SMLK-AMC", "Samalkota", &[]),
    ("KKD-AMC", "Kakinada", &[]),
];

/// (key, value, data type, category, description)
const DEFAULT_CONFIG: &[(&str, &str, ConfigDataType, &str, &str)] = &[
    ("app_name", "AMC Market Fee Portal", ConfigDataType::Text, "general", "Display name"),
    ("district", DISTRICT, ConfigDataType::Text, "general", "District served"),
    ("default_page_size", "20", ConfigDataType::Number, "api", "Default list page size"),
    ("low_performance_threshold", "50", ConfigDataType::Number, "alerts", "Achievement % below which a committee is flagged"),
    ("allow_receipt_import", "true", ConfigDataType::Boolean, "receipts", "Whether bulk import is enabled"),
];

const SAMPLE_COMMODITIES: &[(&str, Decimal)] = &[
    ("Paddy", dec!(250000)),
    ("Coconut", dec!(120000)),
    ("Cashew", dec!(410000)),
    ("Maize", dec!(95000)),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("=== AMC Market Fee Seed Data ===");

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://amc.db?mode=rwc".to_string());

    let mut options = ConnectOptions::new(database_url.clone());
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(StdDuration::from_secs(10))
        .acquire_timeout(StdDuration::from_secs(10))
        .sqlx_logging(false);

    info!("Connecting to database: {}", database_url);
    let db = Database::connect(options).await?;
    Migrator::up(&db, None).await?;

    info!("Creating admin user...");
    let admin_id = seed_admin(&db).await?;

    info!("Creating system configuration...");
    let config_count = seed_config(&db).await?;
    info!("  Created {} config entries", config_count);

    info!("Creating committees...");
    let fy = FinancialYear::current();
    let mut created = 0;
    for (index, (code, name, checkposts)) in COMMITTEES.iter().enumerate() {
        if committee::Entity::find()
            .filter(committee::Column::Code.eq(*code))
            .one(&db)
            .await?
            .is_some()
        {
            info!("  {} exists, skipping", code);
            continue;
        }

        let committee_id = seed_committee(&db, code, name, checkposts).await?;
        seed_target(&db, committee_id, &fy, index, admin_id).await?;
        seed_receipts(&db, committee_id, code, admin_id).await?;
        created += 1;
    }
    info!("  Created {} committees for FY {}", created, fy.label());

    info!("=== Seed complete ===");
    Ok(())
}

async fn seed_admin(db: &DatabaseConnection) -> anyhow::Result<Uuid> {
    let email = std::env::var("SEED_ADMIN_EMAIL")
        .unwrap_or_else(|_| "admin@amc.local".to_string())
        .to_lowercase();
    let password =
        std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "ChangeMe123!".to_string());

    if let Some(existing) = user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?
    {
        info!("  {} exists, skipping", email);
        return Ok(existing.id);
    }

    let now = Utc::now();
    let admin = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.clone()),
        name: Set("District Administrator".to_string()),
        password_hash: Set(hash_password(&password)?),
        role: Set(Role::Admin),
        is_active: Set(true),
        last_login: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
    }
    .insert(db)
    .await?;
    info!("  Created admin {}", email);
    Ok(admin.id)
}

async fn seed_config(db: &DatabaseConnection) -> anyhow::Result<usize> {
    let mut count = 0;
    for (key, value, data_type, category, description) in DEFAULT_CONFIG {
        let exists = system_config::Entity::find()
            .filter(system_config::Column::Key.eq(*key))
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }
        let now = Utc::now();
        system_config::ActiveModel {
            id: Set(Uuid::new_v4()),
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            data_type: Set(*data_type),
            category: Set(category.to_string()),
            description: Set(Some(description.to_string())),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
        count += 1;
    }
    Ok(count)
}

async fn seed_committee(
    db: &DatabaseConnection,
    code: &str,
    name: &str,
    checkposts: &[&str],
) -> anyhow::Result<Uuid> {
    let now = Utc::now();
    let model = committee::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        code: Set(code.to_string()),
        district: Set(DISTRICT.to_string()),
        state: Set(STATE.to_string()),
        has_checkposts: Set(!checkposts.is_empty()),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
    }
    .insert(db)
    .await?;

    for checkpost_name in checkposts {
        checkpost::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(checkpost_name.to_string()),
            location: Set(Some(format!("{}, {}", checkpost_name, DISTRICT))),
            committee_id: Set(model.id),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(db)
        .await?;
    }

    info!("  {} {} ({} checkposts)", code, name, checkposts.len());
    Ok(model.id)
}

async fn seed_target(
    db: &DatabaseConnection,
    committee_id: Uuid,
    fy: &FinancialYear,
    index: usize,
    created_by: Uuid,
) -> anyhow::Result<()> {
    // 12 lakhs a month for the first committee, 1 lakh more for each after it
    let monthly = dec!(1200000) + Decimal::from(index as u64) * dec!(100000);
    let now = Utc::now();
    let model = target::ActiveModel {
        id: Set(Uuid::new_v4()),
        committee_id: Set(committee_id),
        financial_year: Set(fy.label()),
        yearly_target: Set(monthly * dec!(12)),
        description: Set(Some(format!("Seeded target for {}", fy.label()))),
        created_by: Set(Some(created_by)),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
    }
    .insert(db)
    .await?;

    for month in FinancialMonth::ALL {
        monthly_target::ActiveModel {
            id: Set(Uuid::new_v4()),
            target_id: Set(model.id),
            month: Set(month),
            amount: Set(monthly),
            created_at: Set(now),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

async fn seed_receipts(
    db: &DatabaseConnection,
    committee_id: Uuid,
    code: &str,
    created_by: Uuid,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let prefix = code.trim_end_matches("-AMC");
    for (offset, (commodity, value)) in SAMPLE_COMMODITIES.iter().enumerate() {
        let date = now - Duration::days(offset as i64 * 3);
        receipt::ActiveModel {
            id: Set(Uuid::new_v4()),
            book_number: Set(format!("{}-B001", prefix)),
            receipt_number: Set(format!("{}-{:04}", prefix, offset + 1)),
            date: Set(date),
            trader_name: Set(format!("{} Traders", commodity)),
            payee_name: Set(format!("{} Farmers Cooperative", commodity)),
            commodity: Set(commodity.to_string()),
            transaction_value: Set(*value),
            market_fee: Set((*value * dec!(0.01)).round_dp(2)),
            nature_of_receipt: Set(NatureOfReceipt::Mf),
            nature_of_receipt_other: Set(None),
            collection_location: Set(CollectionLocation::Office),
            collection_location_other: Set(None),
            supervisor_name: Set(None),
            remarks: Set(Some("Seeded sample".to_string())),
            financial_year: Set(FinancialYear::containing(&date).label()),
            committee_id: Set(committee_id),
            checkpost_id: Set(None),
            created_by: Set(Some(created_by)),
            updated_by: Set(None),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}
