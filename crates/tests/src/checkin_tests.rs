use crate::fixtures::test_app::{TestApp, booking, fixed_now};
use bailbook_db::models::County;
use bailbook_services::dao::checkin::CheckInDao;
use serde_json::{Value, json};

async fn create_checkin(app: &TestApp, token: &str, case_id: &str, due_at: &str) -> Value {
    let resp = app
        .auth_post(&format!("/api/cases/{case_id}/checkins"), token)
        .json(&json!({ "due_at": due_at, "note": "Weekly call" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn checkins_are_created_listed_and_completed() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let case_id = app
        .insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await
        .to_hex();

    let first = create_checkin(&app, &token, &case_id, "2024-01-16T15:00:00Z").await;
    assert_eq!(first["status"], "pending");
    assert_eq!(first["county"], "harris");
    create_checkin(&app, &token, &case_id, "2024-01-20T15:00:00Z").await;

    let list: Value = app
        .auth_get(&format!("/api/cases/{case_id}/checkins"), &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["due_at"], "2024-01-20T15:00:00Z");

    let id = first["id"].as_str().unwrap();
    let resp = app
        .auth_post(&format!("/api/checkins/{id}/done"), &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let done: Value = resp.json().await.unwrap();
    assert_eq!(done["status"], "done");
    assert_eq!(done["completed_at"], "2024-01-15T18:00:00Z");
}

#[tokio::test]
async fn checkin_rejects_bad_due_date() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let case_id = app
        .insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await
        .to_hex();

    let resp = app
        .auth_post(&format!("/api/cases/{case_id}/checkins"), &token)
        .json(&json!({ "due_at": "next tuesday" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn pings_are_range_checked() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let case_id = app
        .insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await
        .to_hex();
    let checkin = create_checkin(&app, &token, &case_id, "2024-01-16T15:00:00Z").await;
    let path = format!("/api/checkins/{}/pings", checkin["id"].as_str().unwrap());

    let resp = app
        .auth_post(&path, &token)
        .json(&json!({ "lat": 29.76, "lng": -95.36, "accuracy_m": 12.5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let ping: Value = resp.json().await.unwrap();
    assert_eq!(ping["checkin_id"], checkin["id"]);

    let resp = app
        .auth_post(&path, &token)
        .json(&json!({ "lat": 91.0, "lng": -95.36 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    let resp = app
        .auth_post(&path, &token)
        .json(&json!({ "lat": 29.76, "lng": -181.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn sweep_marks_past_due_as_overdue() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let case_id = app
        .insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await
        .to_hex();
    let past = create_checkin(&app, &token, &case_id, "2024-01-14T15:00:00Z").await;
    let future = create_checkin(&app, &token, &case_id, "2024-01-18T15:00:00Z").await;
    let done = create_checkin(&app, &token, &case_id, "2024-01-13T15:00:00Z").await;
    app.auth_post(
        &format!("/api/checkins/{}/done", done["id"].as_str().unwrap()),
        &token,
    )
    .send()
    .await
    .unwrap();

    let dao = CheckInDao::new(app.db());
    let moved = dao
        .sweep_overdue(bson::DateTime::from_chrono(fixed_now()))
        .await
        .unwrap();
    assert_eq!(moved, 1);

    let list: Value = app
        .auth_get(&format!("/api/cases/{case_id}/checkins"), &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let status_of = |id: &Value| {
        list.as_array()
            .unwrap()
            .iter()
            .find(|c| c["id"] == *id)
            .unwrap()["status"]
            .clone()
    };
    assert_eq!(status_of(&past["id"]), "overdue");
    assert_eq!(status_of(&future["id"]), "pending");
    assert_eq!(status_of(&done["id"]), "done");
}

#[tokio::test]
async fn checkins_follow_case_scope() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let outsider = app.seed_user("agent-9", &["agent"], &["south"]).await;
    let case_id = app
        .insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await
        .to_hex();
    let checkin = create_checkin(&app, &admin, &case_id, "2024-01-16T15:00:00Z").await;

    let resp = app
        .auth_post(
            &format!("/api/checkins/{}/done", checkin["id"].as_str().unwrap()),
            &outsider,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
