//! SeaORM entities for the market-fee schema.
//!
//! Every table except `audit_logs` and the target breakdown rows is
//! soft-deleted through `is_active` / `deleted_at`; queries filter on
//! `is_active = true`.

pub mod audit_log;
pub mod checkpost;
pub mod checkpost_target;
pub mod committee;
pub mod monthly_target;
pub mod receipt;
pub mod system_config;
pub mod target;
pub mod user;

pub use audit_log::AuditAction;
pub use receipt::{CollectionLocation, NatureOfReceipt};
pub use system_config::ConfigDataType;
pub use user::Role;
