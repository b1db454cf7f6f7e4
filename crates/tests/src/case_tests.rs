use crate::fixtures::test_app::{TestApp, booking};
use bailbook_db::models::County;
use bson::doc;
use serde_json::{Value, json};

#[tokio::test]
async fn list_cases_filters_by_county_and_search() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    app.insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await;
    app.insert_booking(County::Harris, booking("Bo Roe", "2024-01-14", 10.0))
        .await;
    app.insert_booking(County::Jefferson, booking("Ann Smith", "2024-01-13", 20.0))
        .await;

    let json: Value = app
        .auth_get("/api/cases?per_page=10", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 3);
    assert_eq!(json["items"][0]["fullName"], "Ann Doe");

    let json: Value = app
        .auth_get("/api/cases?county=harris", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 2);

    let json: Value = app
        .auth_get("/api/cases?q=ann", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 2);
    let names: Vec<&str> = json["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["fullName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ann Doe", "Ann Smith"]);
}

#[tokio::test]
async fn list_cases_paginates() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    for day in 10..15 {
        app.insert_booking(
            County::Galveston,
            booking(&format!("Person {day}"), &format!("2024-01-{day}"), 1.0),
        )
        .await;
    }

    let json: Value = app
        .auth_get("/api/cases?page=2&per_page=2", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 5);
    assert_eq!(json["total_pages"], 3);
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["fullName"], "Person 12");
}

#[tokio::test]
async fn list_cases_past_the_end_is_empty() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    app.insert_booking(County::Galveston, booking("Only One", "2024-01-15", 1.0))
        .await;

    let resp = app
        .auth_get("/api/cases?page=18446744073709551615&per_page=100", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["total"], 1);
    assert!(json["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn list_cases_rejects_unknown_county() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let resp = app
        .auth_get("/api/cases?county=travis", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn get_case_tolerates_null_crm_fields() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let mut raw = booking("Null Fields", "2024-01-15", 250.0);
    raw.insert("crm_details", bson::Bson::Null);
    raw.insert("manual_tags", bson::Bson::Null);
    raw.insert("tags", bson::Bson::Null);
    let id = app.insert_booking(County::Harris, raw).await;

    let resp = app
        .auth_get(&format!("/api/cases/{}", id.to_hex()), &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["full_name"], "Null Fields");
    assert_eq!(json["crm_stage"], "new");
}

#[tokio::test]
async fn get_case_by_id() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let id = app
        .insert_booking(County::Fortbend, booking("Ann Doe", "2024-01-15", 5000.0))
        .await;

    let resp = app
        .auth_get(&format!("/api/cases/{}", id.to_hex()), &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["id"], id.to_hex());
    assert_eq!(json["county"], "fortbend");
    assert_eq!(json["crm_stage"], "new");
    assert_eq!(json["bond_amount"].as_f64(), Some(5000.0));

    let resp = app.auth_get("/api/cases/not-an-id", &token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let missing = bson::oid::ObjectId::new().to_hex();
    let resp = app
        .auth_get(&format!("/api/cases/{missing}"), &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn agents_only_see_their_department() {
    let app = TestApp::spawn().await;
    let token = app.seed_user("agent-1", &["agent"], &["north"]).await;

    let mut north = booking("North Case", "2024-01-15", 10.0);
    north.insert("crm_details", doc! { "assigned_department": "north" });
    let north_id = app.insert_booking(County::Harris, north).await;

    let mut south = booking("South Case", "2024-01-15", 10.0);
    south.insert("crm_details", doc! { "assigned_department": "south" });
    let south_id = app.insert_booking(County::Harris, south).await;

    let mut mine = booking("Assigned To Me", "2024-01-14", 10.0);
    mine.insert("crm_details", doc! { "assigned_to": "agent-1" });
    app.insert_booking(County::Brazoria, mine).await;

    let json: Value = app
        .auth_get("/api/cases", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 2);

    let resp = app
        .auth_get(&format!("/api/cases/{}", north_id.to_hex()), &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .auth_get(&format!("/api/cases/{}", south_id.to_hex()), &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn update_crm_stamps_acceptance_and_leaves_booking_fields() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let id = app
        .insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await;

    let resp = app
        .auth_patch(&format!("/api/cases/{}/crm", id.to_hex()), &token)
        .json(&json!({
            "crm_stage": "accepted",
            "notes": "Cosigner verified",
            "score": 80,
            "reason": "Stable employment",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["crm_stage"], "accepted");
    assert_eq!(json["crm_details"]["qualification_notes"], "Cosigner verified");
    assert_eq!(json["crm_details"]["qualification_score"], 80);
    assert_eq!(json["crm_details"]["acceptance"]["by"], "admin-1");
    assert_eq!(json["crm_details"]["acceptance"]["reason"], "Stable employment");
    assert_eq!(json["full_name"], "Ann Doe");
    assert_eq!(json["bond_amount"].as_f64(), Some(5000.0));

    let stored = app
        .db()
        .collection::<bson::Document>("simple_harris")
        .find_one(doc! { "_id": id })
        .await
        .unwrap()
        .unwrap();
    assert!(stored.get_datetime("updated_at").is_ok());
    assert_eq!(stored.get_str("booking_date").unwrap(), "2024-01-15");
}

#[tokio::test]
async fn update_crm_validates_input() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let id = app
        .insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await;
    let path = format!("/api/cases/{}/crm", id.to_hex());

    let resp = app
        .auth_patch(&path, &token)
        .json(&json!({ "crm_stage": "released" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    let resp = app
        .auth_patch(&path, &token)
        .json(&json!({ "score": 101 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn viewers_cannot_edit_cases() {
    let app = TestApp::spawn().await;
    let token = app.seed_user("viewer-1", &["viewer"], &[]).await;
    let mut record = booking("Ann Doe", "2024-01-15", 5000.0);
    record.insert("crm_details", doc! { "assigned_to": "viewer-1" });
    let id = app.insert_booking(County::Harris, record).await;

    let resp = app
        .auth_patch(&format!("/api/cases/{}/crm", id.to_hex()), &token)
        .json(&json!({ "notes": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn checklist_starts_from_defaults() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let id = app
        .insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await;

    let resp = app
        .auth_patch(&format!("/api/cases/{}/checklist/id_copy", id.to_hex()), &token)
        .json(&json!({ "completed": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let items: Value = resp.json().await.unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 4);
    let id_copy = items.iter().find(|i| i["key"] == "id_copy").unwrap();
    assert_eq!(id_copy["completed"], true);
    assert!(id_copy["completed_at"].is_string());

    // Second update goes through the stored checklist
    let resp = app
        .auth_patch(&format!("/api/cases/{}/checklist/id_copy", id.to_hex()), &token)
        .json(&json!({ "completed": false }))
        .send()
        .await
        .unwrap();
    let items: Value = resp.json().await.unwrap();
    let id_copy = items
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["key"] == "id_copy")
        .unwrap()
        .clone();
    assert_eq!(id_copy["completed"], false);
    assert!(id_copy["completed_at"].is_null());

    let resp = app
        .auth_patch(&format!("/api/cases/{}/checklist/nope", id.to_hex()), &token)
        .json(&json!({ "completed": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
