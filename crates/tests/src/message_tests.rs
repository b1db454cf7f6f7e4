use crate::fixtures::test_app::{TestApp, booking};
use bailbook_db::models::County;
use bson::doc;
use serde_json::{Value, json};

async fn send(app: &TestApp, token: &str, body: Value) -> reqwest::Response {
    app.auth_post("/api/messages/send", token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

/// Stands in for the delivery worker, which records the provider sid.
async fn assign_sid(app: &TestApp, message_id: &str, sid: &str) {
    let id = bson::oid::ObjectId::parse_str(message_id).unwrap();
    app.db()
        .collection::<bson::Document>("messages")
        .update_one(doc! { "_id": id }, doc! { "$set": { "provider_sid": sid } })
        .await
        .unwrap();
}

#[tokio::test]
async fn send_queues_message_for_case() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let case_id = app
        .insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await
        .to_hex();

    let resp = send(
        &app,
        &token,
        json!({ "to": "+14155550100", "body": "Court date reminder", "case_id": case_id }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 202);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "queued");
    assert_eq!(json["direction"], "outbound");
    assert_eq!(json["from"], "+15005550006");
    assert_eq!(json["county"], "harris");
    assert_eq!(json["sent_by"], "admin-1");

    let list: Value = app
        .auth_get(&format!("/api/messages?case_id={case_id}"), &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["total"], 1);
    assert_eq!(list["items"][0]["body"], "Court date reminder");
}

#[tokio::test]
async fn send_validates_number_and_body() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;

    let resp = send(&app, &token, json!({ "to": "555-0100", "body": "hi" })).await;
    assert_eq!(resp.status().as_u16(), 422);

    let resp = send(&app, &token, json!({ "to": "+14155550100", "body": "" })).await;
    assert_eq!(resp.status().as_u16(), 422);

    let long = "x".repeat(1601);
    let resp = send(&app, &token, json!({ "to": "+14155550100", "body": long })).await;
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn viewers_cannot_send() {
    let app = TestApp::spawn().await;
    let token = app.seed_user("viewer-1", &["viewer"], &[]).await;
    let resp = send(&app, &token, json!({ "to": "+14155550100", "body": "hi" })).await;
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn status_callbacks_only_move_forward() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let sent: Value = send(&app, &token, json!({ "to": "+14155550100", "body": "hi" }))
        .await
        .json()
        .await
        .unwrap();
    let message_id = sent["id"].as_str().unwrap();
    assign_sid(&app, message_id, "SM100").await;

    for (status, applied) in [("sent", true), ("delivered", true), ("sent", false)] {
        let resp = app
            .signed_webhook(
                "/twilio/status",
                &[("MessageSid", "SM100"), ("MessageStatus", status)],
            )
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["applied"], applied, "{status}");
    }

    let list: Value = app
        .auth_get("/api/messages", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let message = &list["items"][0];
    assert_eq!(message["status"], "delivered");
    let history: Vec<&str> = message["status_history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["status"].as_str().unwrap())
        .collect();
    assert_eq!(history, vec!["queued", "sent", "delivered"]);
}

#[tokio::test]
async fn failed_status_keeps_error_details() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let sent: Value = send(&app, &token, json!({ "to": "+14155550100", "body": "hi" }))
        .await
        .json()
        .await
        .unwrap();
    assign_sid(&app, sent["id"].as_str().unwrap(), "SM200").await;

    let resp = app
        .signed_webhook(
            "/twilio/status",
            &[
                ("MessageSid", "SM200"),
                ("MessageStatus", "undelivered"),
                ("ErrorCode", "30003"),
            ],
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let list: Value = app
        .auth_get("/api/messages", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["items"][0]["status"], "failed");
    assert_eq!(list["items"][0]["error_code"], "30003");
}

#[tokio::test]
async fn unknown_sid_is_a_no_op() {
    let app = TestApp::spawn().await;
    let resp = app
        .signed_webhook(
            "/twilio/status",
            &[("MessageSid", "SMnope"), ("MessageStatus", "delivered")],
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["applied"], false);
}

#[tokio::test]
async fn webhook_signature_is_enforced() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/twilio/status"))
        .form(&[("MessageSid", "SM1"), ("MessageStatus", "sent")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .client
        .post(app.url("/twilio/status"))
        .header("X-Twilio-Signature", "bm90IGEgcmVhbCBzaWduYXR1cmU=")
        .form(&[("MessageSid", "SM1"), ("MessageStatus", "sent")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // Signed for different parameters than were sent
    let signed = app.signed_webhook("/twilio/inbound", &[("From", "+14155550100")]);
    let resp = signed
        .form(&[("From", "+14155550199")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn inbound_reply_threads_onto_case() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let case_id = app
        .insert_booking(County::Jefferson, booking("Bo Roe", "2024-01-15", 2500.0))
        .await
        .to_hex();
    send(
        &app,
        &token,
        json!({ "to": "+14155550100", "body": "Please call us", "case_id": case_id }),
    )
    .await;

    let params = [
        ("MessageSid", "SMin1"),
        ("From", "+14155550100"),
        ("To", "+15005550006"),
        ("Body", "Calling now"),
    ];
    for _ in 0..2 {
        let resp = app
            .signed_webhook("/twilio/inbound", &params)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(resp.headers()["content-type"], "text/xml");
        let body = resp.text().await.unwrap();
        assert!(body.contains("<Response></Response>"));
    }

    let list: Value = app
        .auth_get(&format!("/api/messages?case_id={case_id}"), &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["total"], 2);
    let inbound: Vec<&Value> = list["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["direction"] == "inbound")
        .collect();
    assert_eq!(inbound.len(), 1);
    assert_eq!(inbound[0]["status"], "received");
    assert_eq!(inbound[0]["body"], "Calling now");
    assert_eq!(inbound[0]["county"], "jefferson");
}
