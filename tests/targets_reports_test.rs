//! Integration tests for collection targets, market fee statements and analytics.

mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::{json, Value};

const MONTHS: [&str; 12] = [
    "MAY", "JUNE", "JULY", "AUGUST", "SEPTEMBER", "OCTOBER", "NOVEMBER", "DECEMBER", "JANUARY",
    "FEBRUARY", "MARCH", "APRIL",
];

fn even_target(committee_id: &str, monthly: f64) -> Value {
    json!({
        "committeeId": committee_id,
        "financialYear": "2025-26",
        "yearlyTarget": monthly * 12.0,
        "monthlyTargets": MONTHS
            .iter()
            .map(|m| json!({ "month": m, "amount": monthly }))
            .collect::<Vec<_>>()
    })
}

#[tokio::test]
async fn target_lifecycle() {
    let app = TestApp::new().await;
    let committee_id = app.create_committee("Karapa", "KRP-AMC").await;

    let created = app
        .admin(
            Method::POST,
            "/api/v1/targets",
            Some(even_target(&committee_id, 100000.0)),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.text);
    assert_eq!(created.json["data"]["monthlyTargets"].as_array().map(Vec::len), Some(12));
    assert_eq!(created.json["data"]["monthlyTargets"][0]["month"], "MAY");
    let id = created.json["data"]["id"].as_str().unwrap().to_string();

    let second = app
        .admin(
            Method::POST,
            "/api/v1/targets",
            Some(even_target(&committee_id, 50000.0)),
        )
        .await;
    assert_eq!(second.status, StatusCode::CONFLICT);

    let listed = app
        .admin(Method::GET, "/api/v1/targets?financialYear=2025-26", None)
        .await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.json["pagination"]["total"], 1);

    let updated = app
        .admin(
            Method::PUT,
            &format!("/api/v1/targets/{}", id),
            Some(json!({ "description": "Revised" })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.text);
    assert_eq!(updated.json["data"]["description"], "Revised");

    let deleted = app
        .admin(Method::DELETE, &format!("/api/v1/targets/{}", id), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
}

#[tokio::test]
async fn target_rejects_bad_financial_year() {
    let app = TestApp::new().await;
    let committee_id = app.create_committee("Karapa", "KRP-AMC").await;

    let res = app
        .admin(
            Method::POST,
            "/api/v1/targets",
            Some(json!({
                "committeeId": committee_id,
                "financialYear": "2025-27",
                "yearlyTarget": 1000
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn statement_one_cumulative_achievement() {
    let app = TestApp::new().await;
    let committee_id = app.create_committee("Karapa", "KRP-AMC").await;
    let target = app
        .admin(
            Method::POST,
            "/api/v1/targets",
            Some(even_target(&committee_id, 100000.0)),
        )
        .await;
    assert_eq!(target.status, StatusCode::CREATED, "{}", target.text);

    for (number, date, fee) in [
        ("M-1", "2025-05-10", 50000.0),
        ("M-2", "2025-05-20", 30000.0),
        ("J-1", "2025-06-12", 110000.0),
    ] {
        let res = app.create_receipt(&committee_id, number, date, fee).await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
    }

    let report = app
        .admin(
            Method::GET,
            "/api/v1/reports/market-fees?financialYear=2025-26&month=June&type=statement1",
            None,
        )
        .await;
    assert_eq!(report.status, StatusCode::OK, "{}", report.text);

    let data = &report.json["data"];
    assert!(data["statement2"].is_null());
    let row = &data["statement1"]["rows"][0];
    assert_eq!(row["amcCode"], "KRP-AMC");
    assert_eq!(row["cumulativeTarget"], 2.0);
    assert_eq!(row["progressiveCurrent"], 1.9);
    assert_eq!(row["currentMonthCurrent"], 1.1);
    assert_eq!(row["cumulativeAchievement"], 95.0);
    assert_eq!(data["metadata"]["selectedMonth"], "June");
    assert_eq!(data["metadata"]["previousFinancialYear"], "2024-25");
}

#[tokio::test]
async fn report_requires_year_and_month() {
    let app = TestApp::new().await;

    let res = app
        .admin(Method::GET, "/api/v1/reports/market-fees?financialYear=2025-26", None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let bad_type = app
        .admin(
            Method::GET,
            "/api/v1/reports/market-fees?financialYear=2025-26&month=June&type=weekly",
            None,
        )
        .await;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dashboard_and_trends_respond() {
    let app = TestApp::new().await;
    let committee_id = app.create_committee("Karapa", "KRP-AMC").await;
    app.create_receipt(&committee_id, "D-1", "2025-06-12", 5000.0)
        .await;

    let dashboard = app
        .admin(
            Method::GET,
            "/api/v1/analytics/dashboard?financialYear=2025-26",
            None,
        )
        .await;
    assert_eq!(dashboard.status, StatusCode::OK, "{}", dashboard.text);
    assert_eq!(dashboard.json["success"], true);

    let trends = app
        .admin(
            Method::GET,
            "/api/v1/analytics/trends?financialYear=2025-26&period=monthly",
            None,
        )
        .await;
    assert_eq!(trends.status, StatusCode::OK, "{}", trends.text);

    let performance = app
        .admin(
            Method::GET,
            &format!(
                "/api/v1/analytics/committee-performance?financialYear=2025-26&committeeId={}",
                committee_id
            ),
            None,
        )
        .await;
    assert_eq!(performance.status, StatusCode::OK, "{}", performance.text);
}

#[tokio::test]
async fn deleted_rows_drop_out_of_reports_and_analytics() {
    let app = TestApp::new().await;
    let karapa = app.create_committee("Karapa", "KRP-AMC").await;
    let tuni = app.create_committee("Tuni", "TUNI-AMC").await;
    app.create_receipt(&karapa, "K-1", "2025-06-10", 100000.0).await;
    let removed = app.create_receipt(&karapa, "K-2", "2025-06-11", 50000.0).await;
    app.create_receipt(&tuni, "T-1", "2025-06-12", 200000.0).await;

    let removed_id = removed.json["data"]["id"].as_str().unwrap().to_string();
    let res = app
        .admin(Method::DELETE, &format!("/api/v1/receipts/{}", removed_id), None)
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);

    let report_uri = "/api/v1/reports/market-fees?financialYear=2025-26&month=June";
    let report = app.admin(Method::GET, report_uri, None).await;
    assert_eq!(report.status, StatusCode::OK, "{}", report.text);
    let statement = &report.json["data"]["statement1"];
    assert_eq!(statement["rows"][0]["amcCode"], "KRP-AMC");
    assert_eq!(statement["rows"][0]["progressiveCurrent"], 1.0);
    assert_eq!(statement["totals"]["progressiveCurrent"], 3.0);
    assert_eq!(
        report.json["data"]["commodityStatement"]["totals"]["progressiveCurrent"],
        3.0
    );

    let dashboard_uri = "/api/v1/analytics/dashboard?financialYear=2025-26";
    let dashboard = app.admin(Method::GET, dashboard_uri, None).await;
    assert_eq!(dashboard.status, StatusCode::OK, "{}", dashboard.text);
    assert_eq!(dashboard.json["data"]["overview"]["totalMarketFee"], 300000.0);
    assert_eq!(dashboard.json["data"]["overview"]["currentYearCollection"], 300000.0);

    let res = app
        .admin(Method::DELETE, &format!("/api/v1/committees/{}", tuni), None)
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);

    let report = app.admin(Method::GET, report_uri, None).await;
    let statement = &report.json["data"]["statement1"];
    assert_eq!(statement["rows"].as_array().map(Vec::len), Some(1));
    assert_eq!(statement["totals"]["progressiveCurrent"], 1.0);
    assert_eq!(
        report.json["data"]["commodityStatement"]["totals"]["progressiveCurrent"],
        1.0
    );

    let dashboard = app.admin(Method::GET, dashboard_uri, None).await;
    assert_eq!(dashboard.json["data"]["overview"]["totalMarketFee"], 100000.0);

    let performance = app
        .admin(
            Method::GET,
            "/api/v1/analytics/committee-performance?financialYear=2025-26",
            None,
        )
        .await;
    assert_eq!(performance.status, StatusCode::OK, "{}", performance.text);
    assert!(!performance.text.contains("TUNI-AMC"), "{}", performance.text);
}
