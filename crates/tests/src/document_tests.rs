use crate::fixtures::test_app::{TestApp, booking};
use bailbook_db::models::County;
use reqwest::multipart;
use serde_json::{Value, json};

async fn case_with_token(app: &TestApp) -> (String, String) {
    let token = app.admin_token().await;
    let id = app
        .insert_booking(County::Harris, booking("Ann Doe", "2024-01-15", 5000.0))
        .await;
    (id.to_hex(), token)
}

async fn upload(app: &TestApp, case_id: &str, token: &str) -> Value {
    let file_part = multipart::Part::bytes(b"Hello, World!".to_vec())
        .file_name("id.txt")
        .mime_str("text/plain")
        .unwrap();
    let form = multipart::Form::new()
        .part("file", file_part)
        .text("label", "Driver license")
        .text("checklist_key", "id_copy");

    let resp = app
        .auth_post(&format!("/api/cases/{case_id}/documents"), token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn upload_without_file_is_rejected() {
    let app = TestApp::spawn().await;
    let (case_id, token) = case_with_token(&app).await;

    let form = multipart::Form::new().text("label", "No file here");
    let resp = app
        .auth_post(&format!("/api/cases/{case_id}/documents"), &token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn uploaded_document_is_listed_and_downloadable() {
    let app = TestApp::spawn().await;
    let (case_id, token) = case_with_token(&app).await;

    let json = upload(&app, &case_id, &token).await;
    let attachment_id = json["id"].as_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&attachment_id).is_ok());
    assert_eq!(json["filename"], "id.txt");
    assert_eq!(json["content_type"], "text/plain");
    assert_eq!(json["size"], 13);
    assert_eq!(json["label"], "Driver license");
    assert_eq!(json["checklist_key"], "id_copy");

    let list: Value = app
        .auth_get(&format!("/api/cases/{case_id}/documents"), &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], attachment_id);

    let resp = app
        .auth_get(
            &format!("/api/cases/{case_id}/documents/{attachment_id}/download"),
            &token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["content-type"], "text/plain");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"Hello, World!");
}

#[tokio::test]
async fn download_encodes_non_ascii_filenames() {
    let app = TestApp::spawn().await;
    let (case_id, token) = case_with_token(&app).await;

    let part = multipart::Part::bytes(b"%PDF-1.4".to_vec())
        .file_name("résumé.pdf")
        .mime_str("application/pdf")
        .unwrap();
    let uploaded: Value = app
        .auth_post(&format!("/api/cases/{case_id}/documents"), &token)
        .multipart(multipart::Form::new().part("file", part))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(uploaded["filename"], "résumé.pdf");
    let attachment_id = uploaded["id"].as_str().unwrap();

    let resp = app
        .auth_get(
            &format!("/api/cases/{case_id}/documents/{attachment_id}/download"),
            &token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let disposition = resp.headers()["content-disposition"].to_str().unwrap();
    assert_eq!(
        disposition,
        "attachment; filename=\"r_sum_.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
    );
}

#[tokio::test]
async fn patch_updates_only_provided_fields() {
    let app = TestApp::spawn().await;
    let (case_id, token) = case_with_token(&app).await;
    let uploaded = upload(&app, &case_id, &token).await;
    let attachment_id = uploaded["id"].as_str().unwrap();

    let resp = app
        .auth_patch(
            &format!("/api/cases/{case_id}/documents/{attachment_id}"),
            &token,
        )
        .json(&json!({ "note": "Expires 2026" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["note"], "Expires 2026");
    assert_eq!(json["label"], "Driver license");
    assert_eq!(json["checklist_key"], "id_copy");
    assert_eq!(json["filename"], "id.txt");
    assert!(json["updated_at"].is_string());
}

#[tokio::test]
async fn patch_unknown_attachment_is_not_found() {
    let app = TestApp::spawn().await;
    let (case_id, token) = case_with_token(&app).await;
    upload(&app, &case_id, &token).await;

    let resp = app
        .auth_patch(
            &format!("/api/cases/{case_id}/documents/does-not-exist"),
            &token,
        )
        .json(&json!({ "label": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn delete_removes_attachment() {
    let app = TestApp::spawn().await;
    let (case_id, token) = case_with_token(&app).await;
    let uploaded = upload(&app, &case_id, &token).await;
    let attachment_id = uploaded["id"].as_str().unwrap();
    let path = format!("/api/cases/{case_id}/documents/{attachment_id}");

    let resp = app.auth_delete(&path, &token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let list: Value = app
        .auth_get(&format!("/api/cases/{case_id}/documents"), &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.as_array().unwrap().is_empty());

    let resp = app.auth_delete(&path, &token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
