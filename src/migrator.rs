use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250501_000001_create_users_table::Migration),
            Box::new(m20250501_000002_create_committees_table::Migration),
            Box::new(m20250501_000003_create_checkposts_table::Migration),
            Box::new(m20250501_000004_create_receipts_table::Migration),
            Box::new(m20250501_000005_create_target_tables::Migration),
            Box::new(m20250501_000006_create_audit_logs_table::Migration),
            Box::new(m20250501_000007_create_system_configs_table::Migration),
            Box::new(m20250601_000008_unique_active_receipt_key::Migration),
        ]
    }
}

mod m20250501_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250501_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Users::Role)
                                .string_len(10)
                                .not_null()
                                .default("USER"),
                        )
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Users::LastLogin).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Users::DeletedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Users {
        Table,
        Id,
        Email,
        Name,
        PasswordHash,
        Role,
        IsActive,
        LastLogin,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20250501_000002_create_committees_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250501_000002_create_committees_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Committees::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Committees::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Committees::Name).string_len(255).not_null())
                        .col(ColumnDef::new(Committees::Code).string_len(50).not_null())
                        .col(
                            ColumnDef::new(Committees::District)
                                .string()
                                .not_null()
                                .default("KAKINADA"),
                        )
                        .col(
                            ColumnDef::new(Committees::State)
                                .string()
                                .not_null()
                                .default("Andhra Pradesh"),
                        )
                        .col(
                            ColumnDef::new(Committees::HasCheckposts)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Committees::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Committees::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Committees::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Committees::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Code uniqueness is checked among active rows by the service
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_committees_code")
                        .table(Committees::Table)
                        .col(Committees::Code)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Committees::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Committees {
        Table,
        Id,
        Name,
        Code,
        District,
        State,
        HasCheckposts,
        IsActive,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20250501_000003_create_checkposts_table {
    use super::m20250501_000002_create_committees_table::Committees;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250501_000003_create_checkposts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Checkposts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Checkposts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Checkposts::Name).string_len(255).not_null())
                        .col(ColumnDef::new(Checkposts::Location).string().null())
                        .col(ColumnDef::new(Checkposts::CommitteeId).uuid().not_null())
                        .col(
                            ColumnDef::new(Checkposts::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Checkposts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Checkposts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Checkposts::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_checkposts_committee_id")
                                .from(Checkposts::Table, Checkposts::CommitteeId)
                                .to(Committees::Table, Committees::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_checkposts_committee_name")
                        .table(Checkposts::Table)
                        .col(Checkposts::CommitteeId)
                        .col(Checkposts::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Checkposts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Checkposts {
        Table,
        Id,
        Name,
        Location,
        CommitteeId,
        IsActive,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20250501_000004_create_receipts_table {
    use super::m20250501_000002_create_committees_table::Committees;
    use super::m20250501_000003_create_checkposts_table::Checkposts;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250501_000004_create_receipts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Receipts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Receipts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Receipts::BookNumber).string().not_null())
                        .col(ColumnDef::new(Receipts::ReceiptNumber).string().not_null())
                        .col(
                            ColumnDef::new(Receipts::Date)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Receipts::TraderName).string().not_null())
                        .col(ColumnDef::new(Receipts::PayeeName).string().not_null())
                        .col(ColumnDef::new(Receipts::Commodity).string().not_null())
                        .col(
                            ColumnDef::new(Receipts::TransactionValue)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Receipts::MarketFee)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Receipts::NatureOfReceipt)
                                .string_len(10)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Receipts::NatureOfReceiptOther).string().null())
                        .col(
                            ColumnDef::new(Receipts::CollectionLocation)
                                .string_len(12)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Receipts::CollectionLocationOther)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(Receipts::SupervisorName).string().null())
                        .col(ColumnDef::new(Receipts::Remarks).string().null())
                        .col(
                            ColumnDef::new(Receipts::FinancialYear)
                                .string_len(7)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Receipts::CommitteeId).uuid().not_null())
                        .col(ColumnDef::new(Receipts::CheckpostId).uuid().null())
                        .col(ColumnDef::new(Receipts::CreatedBy).uuid().null())
                        .col(ColumnDef::new(Receipts::UpdatedBy).uuid().null())
                        .col(
                            ColumnDef::new(Receipts::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Receipts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Receipts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Receipts::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receipts_committee_id")
                                .from(Receipts::Table, Receipts::CommitteeId)
                                .to(Committees::Table, Committees::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receipts_checkpost_id")
                                .from(Receipts::Table, Receipts::CheckpostId)
                                .to(Checkposts::Table, Checkposts::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Duplicate detection among active rows goes through this index
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receipts_book_receipt_committee")
                        .table(Receipts::Table)
                        .col(Receipts::BookNumber)
                        .col(Receipts::ReceiptNumber)
                        .col(Receipts::CommitteeId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receipts_fy_committee")
                        .table(Receipts::Table)
                        .col(Receipts::FinancialYear)
                        .col(Receipts::CommitteeId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receipts_date")
                        .table(Receipts::Table)
                        .col(Receipts::Date)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Receipts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Receipts {
        Table,
        Id,
        BookNumber,
        ReceiptNumber,
        Date,
        TraderName,
        PayeeName,
        Commodity,
        TransactionValue,
        MarketFee,
        NatureOfReceipt,
        NatureOfReceiptOther,
        CollectionLocation,
        CollectionLocationOther,
        SupervisorName,
        Remarks,
        FinancialYear,
        CommitteeId,
        CheckpostId,
        CreatedBy,
        UpdatedBy,
        IsActive,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20250501_000005_create_target_tables {
    use super::m20250501_000002_create_committees_table::Committees;
    use super::m20250501_000003_create_checkposts_table::Checkposts;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250501_000005_create_target_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Targets::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Targets::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Targets::CommitteeId).uuid().not_null())
                        .col(ColumnDef::new(Targets::FinancialYear).string_len(7).not_null())
                        .col(
                            ColumnDef::new(Targets::YearlyTarget)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Targets::Description).string().null())
                        .col(ColumnDef::new(Targets::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(Targets::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Targets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Targets::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Targets::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_targets_committee_id")
                                .from(Targets::Table, Targets::CommitteeId)
                                .to(Committees::Table, Committees::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_targets_committee_fy")
                        .table(Targets::Table)
                        .col(Targets::CommitteeId)
                        .col(Targets::FinancialYear)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MonthlyTargets::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MonthlyTargets::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MonthlyTargets::TargetId).uuid().not_null())
                        .col(ColumnDef::new(MonthlyTargets::Month).string_len(10).not_null())
                        .col(
                            ColumnDef::new(MonthlyTargets::Amount)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MonthlyTargets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_monthly_targets_target_id")
                                .from(MonthlyTargets::Table, MonthlyTargets::TargetId)
                                .to(Targets::Table, Targets::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_monthly_targets_target_month")
                        .table(MonthlyTargets::Table)
                        .col(MonthlyTargets::TargetId)
                        .col(MonthlyTargets::Month)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CheckpostTargets::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CheckpostTargets::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CheckpostTargets::TargetId).uuid().not_null())
                        .col(ColumnDef::new(CheckpostTargets::CheckpostId).uuid().not_null())
                        .col(
                            ColumnDef::new(CheckpostTargets::Month)
                                .string_len(10)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckpostTargets::Amount)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckpostTargets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_checkpost_targets_target_id")
                                .from(CheckpostTargets::Table, CheckpostTargets::TargetId)
                                .to(Targets::Table, Targets::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_checkpost_targets_checkpost_id")
                                .from(CheckpostTargets::Table, CheckpostTargets::CheckpostId)
                                .to(Checkposts::Table, Checkposts::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_checkpost_targets_unique")
                        .table(CheckpostTargets::Table)
                        .col(CheckpostTargets::TargetId)
                        .col(CheckpostTargets::CheckpostId)
                        .col(CheckpostTargets::Month)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CheckpostTargets::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(MonthlyTargets::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Targets::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Targets {
        Table,
        Id,
        CommitteeId,
        FinancialYear,
        YearlyTarget,
        Description,
        CreatedBy,
        IsActive,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }

    #[derive(DeriveIden)]
    enum MonthlyTargets {
        Table,
        Id,
        TargetId,
        Month,
        Amount,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum CheckpostTargets {
        Table,
        Id,
        TargetId,
        CheckpostId,
        Month,
        Amount,
        CreatedAt,
    }
}

mod m20250501_000006_create_audit_logs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250501_000006_create_audit_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AuditLogs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(AuditLogs::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(AuditLogs::TableName).string().not_null())
                        .col(ColumnDef::new(AuditLogs::RecordId).string().not_null())
                        .col(ColumnDef::new(AuditLogs::Action).string_len(10).not_null())
                        .col(ColumnDef::new(AuditLogs::OldValues).text().null())
                        .col(ColumnDef::new(AuditLogs::NewValues).text().null())
                        .col(ColumnDef::new(AuditLogs::UserId).uuid().null())
                        .col(ColumnDef::new(AuditLogs::IpAddress).string().null())
                        .col(ColumnDef::new(AuditLogs::UserAgent).string().null())
                        .col(
                            ColumnDef::new(AuditLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_logs_table_record")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::TableName)
                        .col(AuditLogs::RecordId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_logs_created_at")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AuditLogs {
        Table,
        Id,
        TableName,
        RecordId,
        Action,
        OldValues,
        NewValues,
        UserId,
        IpAddress,
        UserAgent,
        CreatedAt,
    }
}

mod m20250501_000007_create_system_configs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250501_000007_create_system_configs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SystemConfigs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SystemConfigs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SystemConfigs::Key)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(SystemConfigs::Value).text().not_null())
                        .col(
                            ColumnDef::new(SystemConfigs::DataType)
                                .string_len(10)
                                .not_null()
                                .default("STRING"),
                        )
                        .col(
                            ColumnDef::new(SystemConfigs::Category)
                                .string()
                                .not_null()
                                .default("general"),
                        )
                        .col(ColumnDef::new(SystemConfigs::Description).string().null())
                        .col(
                            ColumnDef::new(SystemConfigs::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(SystemConfigs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SystemConfigs::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SystemConfigs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SystemConfigs {
        Table,
        Id,
        Key,
        Value,
        DataType,
        Category,
        Description,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250601_000008_unique_active_receipt_key {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250601_000008_unique_active_receipt_key"
        }
    }

    // Partial index: soft-deleted receipts release their book/receipt number
    const CREATE: &str = "CREATE UNIQUE INDEX IF NOT EXISTS uq_receipts_active_book_receipt_committee \
         ON receipts (book_number, receipt_number, committee_id) \
         WHERE is_active AND deleted_at IS NULL";

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager.get_connection().execute_unprepared(CREATE).await?;
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_index(
                    Index::drop()
                        .if_exists()
                        .name("uq_receipts_active_book_receipt_committee")
                        .to_owned(),
                )
                .await
        }
    }
}

pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
