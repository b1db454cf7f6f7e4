use crate::fixtures::test_app::TestApp;
use serde_json::{Value, json};

#[tokio::test]
async fn me_returns_profile_and_permissions() {
    let app = TestApp::spawn().await;
    let token = app.seed_user("agent-1", &["agent"], &["north"]).await;

    let resp = app.auth_get("/api/users/me", &token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["uid"], "agent-1");
    assert_eq!(json["roles"], json!(["agent"]));
    assert_eq!(json["departments"], json!(["north"]));
    assert_eq!(json["status"], "active");
    assert!(json["permissions"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let app = TestApp::spawn().await;
    let token = app.seed_user("agent-1", &["agent"], &[]).await;

    let resp = app
        .client
        .get(app.url("/api/users/me"))
        .header("Cookie", format!("theme=dark; __asap_session={token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn sessions_are_checked() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .get(app.url("/api/users/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app.auth_get("/api/users/me", "garbage").send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    // Valid signature, but nobody by that uid
    let token = app.token_for("ghost");
    let resp = app.auth_get("/api/users/me", &token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn listing_users_requires_manage_users() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let manager = app.seed_user("manager-1", &["manager"], &[]).await;

    let resp = app.auth_get("/api/users", &manager).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let json: Value = app
        .auth_get("/api/users", &admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 2);
    let emails: Vec<&str> = json["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap())
        .collect();
    assert_eq!(emails, vec!["admin-1@bailbook.test", "manager-1@bailbook.test"]);
}

#[tokio::test]
async fn admin_updates_roles_and_disables_users() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let agent = app.seed_user("agent-1", &["agent"], &[]).await;

    let resp = app
        .auth_patch("/api/users/agent-1", &admin)
        .json(&json!({ "roles": ["manager"], "departments": ["south"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["roles"], json!(["manager"]));
    assert_eq!(json["departments"], json!(["south"]));

    let resp = app
        .auth_patch("/api/users/agent-1", &admin)
        .json(&json!({ "roles": ["overlord"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
    let json: Value = resp.json().await.unwrap();
    let message = json["message"].as_str().unwrap();
    assert!(message.contains("overlord"));
    assert!(message.contains("known: admin, manager, agent, viewer"));

    let resp = app
        .auth_patch("/api/users/agent-1", &admin)
        .json(&json!({ "status": "disabled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app.auth_get("/api/users/me", &agent).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_patch("/api/users/nobody", &admin)
        .json(&json!({ "roles": ["viewer"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
