use crate::fixtures::test_app::{TestApp, booking};
use bailbook_db::models::County;
use serde_json::Value;

#[tokio::test]
async fn light_health_without_datastore() {
    let app = TestApp::spawn_without_db().await;

    let resp = app
        .client
        .get(app.url("/api/health/light"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "bailbook-api");
    assert_eq!(json["time"], "2024-01-15T18:00:00Z");
}

#[tokio::test]
async fn full_health_without_datastore_is_still_200() {
    let app = TestApp::spawn_without_db().await;

    let resp = app.client.get(app.url("/api/health")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["ok"], false);
    assert_eq!(json["datastore"]["configured"], false);
    assert_eq!(json["datastore"]["ping"], "not_configured");
}

#[tokio::test]
async fn full_health_audits_every_county() {
    let app = TestApp::spawn().await;
    app.insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await;
    app.insert_booking(County::Jefferson, booking("Bo Roe", "2024-01-05", 10.0))
        .await;

    let json: Value = app
        .client
        .get(app.url("/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["ok"], true);
    assert_eq!(json["datastore"]["ping"], "ok");
    let collections = json["collections"].as_array().unwrap();
    assert_eq!(collections.len(), 5);

    let harris = collections.iter().find(|c| c["county"] == "harris").unwrap();
    assert_eq!(harris["newestBookingDate"], "2024-01-15");
    assert_eq!(harris["staleDays"], 0);
    assert_eq!(harris["stale"], false);

    let jefferson = collections.iter().find(|c| c["county"] == "jefferson").unwrap();
    assert_eq!(jefferson["staleDays"], 10);
    assert_eq!(jefferson["stale"], true);
}

#[tokio::test]
async fn field_coverage_counts_present_fields() {
    let app = TestApp::spawn().await;
    app.insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await;

    let json: Value = app
        .client
        .get(app.url("/api/health/fields?sample=50"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["sample"], 50);
    let harris = json["collections"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["county"] == "harris")
        .unwrap();
    assert_eq!(harris["sampled"], 1);
    let full_name = harris["fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["field"] == "full_name")
        .unwrap();
    assert_eq!(full_name["present"], 1);
}

#[tokio::test]
async fn exhausted_budget_skips_every_collection() {
    let app = TestApp::spawn_with(|s| s.health.overall_budget_ms = 0).await;
    app.insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await;

    let resp = app.client.get(app.url("/api/health")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["ok"], false);
    assert_eq!(json["budgetMs"], 0);
    assert_ne!(json["datastore"]["ping"], "ok");
    let collections = json["collections"].as_array().unwrap();
    assert_eq!(collections.len(), 5);
    for c in collections {
        assert_eq!(c["skipped"], true);
        assert!(c["estimatedCount"].is_null());
    }

    let json: Value = app
        .client
        .get(app.url("/api/health/fields"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["configured"], true);
    let collections = json["collections"].as_array().unwrap();
    assert_eq!(collections.len(), 5);
    assert!(collections.iter().all(|c| c["skipped"] == true && c["sampled"] == 0));
}
