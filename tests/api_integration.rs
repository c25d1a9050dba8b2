//! Router tests driving the full HTTP surface against in-memory storage.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use course_dashboard::config::Config;
use course_dashboard::storage::{ADS_KEY, BlobStorage, FileStorage, MemoryStorage, SALES_KEY};
use course_dashboard::store::Store;
use course_dashboard::{AppState, init_router};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app_with(storage: Arc<dyn BlobStorage>) -> Router {
    init_router(AppState::new(Store::open(storage), Config::default()))
}

fn app() -> (Router, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (app_with(storage.clone()), storage)
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

fn sale_body(course: &str, paid: Value) -> Value {
    json!({
        "date": "2024-10-03",
        "client": "Sara Adel",
        "phone": "01001234567",
        "gender": "female",
        "courseId": course,
        "roundId": "none",
        "paymentMethod": "wallet",
        "moderatorName": "Omar",
        "platform": "Facebook",
        "discount": "400",
        "paidAmount": paid,
    })
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = app();
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_gate_and_roles() {
    let (app, _) = app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "marketing", "password": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "BAD_CREDENTIALS");

    let (status, _) = call(&app, Method::GET, "/courses", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = login(&app, " MARKETING", "1111").await;
    let (_, me) = call(&app, Method::GET, "/auth/me", Some(&admin), None).await;
    assert_eq!(me["data"]["role"], "admin");
    assert_eq!(me["data"]["landingView"], "landing");

    let moderator = login(&app, "moderation", "1234").await;
    let (status, _) = call(&app, Method::GET, "/courses", Some(&moderator), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, Method::GET, "/reports/financial", Some(&moderator), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = call(&app, Method::POST, "/auth/logout", Some(&moderator), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/courses", Some(&moderator), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn moderator_records_sale_admin_edits_it() {
    let (app, storage) = app();
    let moderator = login(&app, "moderation", "1234").await;
    let admin = login(&app, "marketing", "1111").await;

    let (status, body) = call(&app, Method::POST, "/sales", Some(&moderator), Some(sale_body("script", json!(1000)))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let sale = &body["data"];
    assert_eq!(sale["basePrice"], 3900.0);
    assert_eq!(sale["finalPrice"], 3500.0);
    assert_eq!(sale["remainingAmount"], 2500.0);
    assert_eq!(sale["status"], "partial");
    assert_eq!(sale["courseName"], "Script");
    assert_eq!(sale["roundName"], "غير محدد");
    let id = sale["id"].as_i64().unwrap();
    assert!(storage.read(SALES_KEY).unwrap().unwrap().contains("Sara Adel"));

    let uri = format!("/sales/{id}");
    let (status, _) = call(&app, Method::PUT, &uri, Some(&moderator), Some(sale_body("script", json!(3500)))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, Method::PUT, &uri, Some(&admin), Some(sale_body("script", json!("3500")))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "paid");
    assert_eq!(body["data"]["remainingAmount"], 0.0);

    let (_, body) = call(&app, Method::GET, "/sales/installments", Some(&moderator), None).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn missing_client_is_a_validation_error() {
    let (app, _) = app();
    let admin = login(&app, "marketing", "1111").await;
    let mut body = sale_body("script", json!(0));
    body["client"] = json!("");
    let (status, resp) = call(&app, Method::POST, "/sales", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["code"], "VALIDATION_FAILED");
    assert!(resp["request_id"].is_string());
}

#[tokio::test]
async fn destructive_actions_need_confirmation() {
    let (app, _) = app();
    let admin = login(&app, "marketing", "1111").await;
    let (_, body) = call(&app, Method::POST, "/sales", Some(&admin), Some(sale_body("reels", json!(0)))).await;
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = call(&app, Method::POST, &format!("/sales/{id}/withdraw"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CONFIRMATION_REQUIRED");

    let (status, body) = call(&app, Method::POST, &format!("/sales/{id}/withdraw?confirm=true"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "withdrawn");

    let (_, list) = call(&app, Method::GET, "/sales?course_id=reels", Some(&admin), None).await;
    assert_eq!(list["count"], 0);

    let (status, _) = call(&app, Method::POST, &format!("/sales/{id}/withdraw?confirm=true"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, Method::DELETE, &format!("/sales/{id}?confirm=true"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, Method::DELETE, &format!("/sales/{id}?confirm=true"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn catalog_changes_leave_sales_dangling() {
    let (app, _) = app();
    let admin = login(&app, "marketing", "1111").await;

    let (status, body) = call(&app, Method::POST, "/courses", Some(&admin), Some(json!({ "name": "Voice Over", "price": 2000 }))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["id"], "voice-over");

    let (status, _) = call(&app, Method::POST, "/courses", Some(&admin), Some(json!({ "name": "Voice Over", "price": 1 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &app,
        Method::POST,
        "/courses/voice-over/rounds",
        Some(&admin),
        Some(json!({ "name": "November", "startDate": "2024-11-02" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let round_id = body["data"]["id"].as_str().unwrap().to_string();

    let mut sale = sale_body("voice-over", json!(1600));
    sale["roundId"] = json!(round_id);
    let (_, body) = call(&app, Method::POST, "/sales", Some(&admin), Some(sale)).await;
    assert_eq!(body["data"]["roundName"], "November");
    assert_eq!(body["data"]["finalPrice"], 1600.0);

    let (status, _) = call(&app, Method::DELETE, "/courses/voice-over?confirm=true", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = call(&app, Method::GET, "/sales?course_id=voice-over", Some(&admin), None).await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["data"][0]["courseName"], "voice-over");
    assert_eq!(list["data"][0]["roundName"], "غير محدد");
}

#[tokio::test]
async fn paste_import_then_report() {
    let (app, storage) = app();
    let admin = login(&app, "marketing", "1111").await;

    let text = "Campaign name\tAmount spent\tLeads\tDay\n\
                Script_Oct_Leads\t1000\t40\t2024-10-02\n\
                Reels awareness\tN/A\t5\t2024-10-02\n\
                Reels awareness\t500\t10\t2024-10-04";
    let (status, body) = call(&app, Method::POST, "/ads/import/preview", Some(&admin), Some(json!({ "text": text }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["courseId"], "script");
    assert!(storage.read(ADS_KEY).unwrap().is_none());

    let (status, body) = call(&app, Method::POST, "/ads/import/confirm", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert!(storage.read(ADS_KEY).unwrap().is_some());

    let (status, _) = call(&app, Method::POST, "/ads/import/confirm", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for (course, paid) in [("script", 3500), ("script", 3500), ("reels", 2700)] {
        let (status, _) = call(&app, Method::POST, "/sales", Some(&admin), Some(sale_body(course, json!(paid)))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call(
        &app,
        Method::GET,
        "/reports/financial?start=2024-10-01&end=2024-10-31&platform=All",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let report = &body["data"];
    let script = report["metrics"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["id"] == "script")
        .unwrap();
    assert_eq!(script["revenue"], 7000.0);
    assert_eq!(script["spend"], 1000.0);
    assert_eq!(script["roas"], 7.0);
    assert_eq!(script["cpl"], 25.0);
    assert_eq!(script["conversion"], 5.0);

    let totals = &report["totals"];
    assert_eq!(totals["revenue"], 9700.0);
    assert_eq!(totals["spend"], 1500.0);
    assert_eq!(totals["leads"], 50);
    assert_eq!(totals["salesCount"], 3);
    assert_eq!(totals["profit"], 8200.0);
    assert_eq!(totals["avgRoas"], 6.5);
    assert_eq!(totals["avgCpl"], 30.0);

    let (_, body) = call(
        &app,
        Method::GET,
        "/reports/financial?start=2024-10-01&end=2024-10-31&platform=TikTok",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(body["data"]["totals"]["revenue"], 0.0);
    assert_eq!(body["data"]["totals"]["spend"], 1500.0);

    let (status, body) = call(
        &app,
        Method::GET,
        "/reports/financial?start=2024-10-31&end=2024-10-01",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let totals = &body["data"]["totals"];
    assert_eq!(totals["revenue"], 0.0);
    assert_eq!(totals["spend"], 0.0);
    assert_eq!(totals["salesCount"], 0);
}

#[tokio::test]
async fn manual_ads_list_and_delete() {
    let (app, _) = app();
    let admin = login(&app, "marketing", "1111").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/ads",
        Some(&admin),
        Some(json!({ "date": "2024-10-05", "campaignName": "montage promo", "spend": "120.5", "leads": "7" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["courseId"], "montage");
    assert_eq!(body["data"]["spend"], 120.5);
    assert_eq!(body["data"]["leads"], 7);
    let id = body["data"]["id"].as_f64().unwrap();

    let (_, list) = call(&app, Method::GET, "/ads", Some(&admin), None).await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["data"][0]["courseName"], "Montage");

    let (status, _) = call(&app, Method::DELETE, &format!("/ads/{id}?confirm=true"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, list) = call(&app, Method::GET, "/ads", Some(&admin), None).await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn fractional_ad_ids_from_older_imports_can_be_deleted() {
    let storage = MemoryStorage::new().with_blob(
        ADS_KEY,
        r#"[{"id": 1727780000000.4312, "date": "2024-10-02", "campaignName": "Script_Oct",
             "courseId": "script", "spend": 1000, "leads": 40, "platform": "Facebook"}]"#,
    );
    let app = app_with(Arc::new(storage));
    let admin = login(&app, "marketing", "1111").await;

    let (_, list) = call(&app, Method::GET, "/ads", Some(&admin), None).await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["data"][0]["id"], 1727780000000.4312);

    let (status, body) = call(&app, Method::DELETE, "/ads/1727780000000.4312?confirm=true", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (_, list) = call(&app, Method::GET, "/ads", Some(&admin), None).await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn state_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();

    let app = app_with(Arc::new(FileStorage::open(dir.path()).unwrap()));
    let admin = login(&app, "marketing", "1111").await;
    let (status, _) = call(&app, Method::POST, "/sales", Some(&admin), Some(sale_body("branding", json!(0)))).await;
    assert_eq!(status, StatusCode::CREATED);
    drop(app);

    let app = app_with(Arc::new(FileStorage::open(dir.path()).unwrap()));
    let admin = login(&app, "marketing", "1111").await;
    let (_, list) = call(&app, Method::GET, "/sales?course_id=branding", Some(&admin), None).await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["data"][0]["client"], "Sara Adel");
}
