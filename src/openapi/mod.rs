use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AMC Market Fee API",
        version = "1.0.0",
        description = r#"
# Agricultural Market Committee Market Fee API

Administrative backend for the market fee receipts collected by a district's
Agricultural Market Committees (AMCs).

## Features

- **Committees & Checkposts**: Master data for every AMC and its checkposts
- **Receipts**: Entry, bulk entry, bulk update, validated import and export (JSON, CSV, document)
- **Targets**: Yearly and monthly collection targets per committee and financial year
- **Reports**: Statement 1 (achievement), Statement 2 (payment mode) and commodity-wise collection
- **Analytics**: Dashboard, trends and committee performance
- **Notifications, Search & System**: Activity feed, global search, statistics, backups and configuration

## Financial Year

Financial years run April to March and are written `YYYY-YY`, e.g. `2025-26`.

## Authentication

Every endpoint except health, login and register expects a JWT:

```
Authorization: Bearer <your-jwt-token>
```

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100)
and return a `pagination` block with `total`, `totalPages`, `hasNext` and `hasPrev`.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Service and database health"),
        (name = "auth", description = "Login, registration and session endpoints"),
        (name = "committees", description = "Agricultural Market Committee master data"),
        (name = "checkposts", description = "Checkposts belonging to a committee"),
        (name = "receipts", description = "Market fee receipt entry, import and export"),
        (name = "targets", description = "Collection targets per financial year"),
        (name = "reports", description = "Market fee statements"),
        (name = "analytics", description = "Dashboard, trends and performance"),
        (name = "search", description = "Global search"),
        (name = "notifications", description = "Activity feed"),
        (name = "system", description = "Statistics, backups and configuration")
    ),
    paths(
        // Health
        crate::handlers::health::health_check,

        // Auth
        crate::handlers::auth::login,
        crate::handlers::auth::register,
        crate::handlers::auth::logout,
        crate::handlers::auth::me,

        // Committees
        crate::handlers::committees::list_committees,
        crate::handlers::committees::get_committee,
        crate::handlers::committees::create_committee,
        crate::handlers::committees::update_committee,
        crate::handlers::committees::delete_committee,

        // Checkposts
        crate::handlers::checkposts::list_checkposts,
        crate::handlers::checkposts::create_checkpost,
        crate::handlers::checkposts::delete_checkpost,

        // Receipts
        crate::handlers::receipts::list_receipts,
        crate::handlers::receipts::get_receipt,
        crate::handlers::receipts::create_receipt,
        crate::handlers::receipts::update_receipt,
        crate::handlers::receipts::delete_receipt,
        crate::handlers::receipts::bulk_create_receipts,
        crate::handlers::receipts::bulk_update_receipts,
        crate::handlers::receipts::import_receipts,
        crate::handlers::receipts::export_receipts,

        // Targets
        crate::handlers::targets::list_targets,
        crate::handlers::targets::get_target,
        crate::handlers::targets::create_target,
        crate::handlers::targets::update_target,
        crate::handlers::targets::delete_target,

        // Reports & analytics
        crate::handlers::reports::market_fee_report,
        crate::handlers::analytics::dashboard,
        crate::handlers::analytics::trends,
        crate::handlers::analytics::committee_performance,

        // Search, notifications, system
        crate::handlers::search::search,
        crate::handlers::notifications::list_notifications,
        crate::handlers::system::system_stats,
        crate::handlers::system::download_backup,
        crate::handlers::system::list_config,
        crate::handlers::system::upsert_config,
    ),
    components(
        schemas(
            crate::Pagination,
            crate::ResponseMeta,
            crate::entities::Role,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_every_area() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("AMC Market Fee API"));
        assert!(json.contains("/api/v1/receipts/export"));
        assert!(json.contains("/api/v1/reports/market-fees"));
        assert!(json.contains("/api/v1/system/config/{key}"));
        assert!(json.contains("\"Bearer\""));
    }
}
