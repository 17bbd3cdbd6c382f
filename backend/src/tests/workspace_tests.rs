use axum::http::{StatusCode, header};
use serde_json::{Value, json};

use super::common::{self, bearer};

/// Creates a second user through the API and returns an access token for them.
async fn second_user_token(app: &common::TestApp, token: &str) -> (String, String) {
    let created = app
        .server
        .post("/users")
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&json!({
            "organization_id": app.organization.id,
            "role_id": "viewer",
            "name": "Second User",
            "username": "second",
            "email": "second@example.com",
            "password": "second-user-password",
        }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let user_id = created.json::<Value>()["data"]["id"].as_str().unwrap().to_string();

    let login = app
        .server
        .post("/auth/login")
        .json(&json!({ "email": "second@example.com", "password": "second-user-password" }))
        .await;
    login.assert_status_ok();
    let access = login.json::<Value>()["data"]["access_token"].as_str().unwrap().to_string();
    (user_id, access)
}

#[tokio::test]
async fn test_settings_keys_map_and_unique_key() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    for (key, value) in [("site_name", "Open Data"), ("theme", "dark")] {
        app.server
            .post("/settings")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "key": key, "value": value, "category": "general" }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let duplicate = app
        .server
        .post("/settings")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "key": "theme", "value": "light", "category": "general" }))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);
    assert_eq!(duplicate.json::<Value>()["message"], "Setting key already exists");

    let values = app
        .server
        .get("/settings/keys")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .add_query_param("keys", "site_name, theme,missing")
        .await;
    values.assert_status_ok();
    assert_eq!(
        values.json::<Value>()["data"],
        json!({ "site_name": "Open Data", "theme": "dark" })
    );

    let by_key = app
        .server
        .get("/settings/key/theme")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    by_key.assert_status_ok();
    assert_eq!(by_key.json::<Value>()["data"]["type"], "string");

    let by_category = app
        .server
        .get("/settings/category/general")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(by_category.json::<Value>()["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_notifications_are_scoped_to_caller() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    let (other_id, other_token) = second_user_token(&app, &token).await;

    let bulk = app
        .server
        .post("/notifications/bulk")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "user_ids": [app.user.id, other_id],
            "title": "Maintenance",
            "message": "The portal is down tonight",
            "category": "system",
            "type": "warning",
        }))
        .await;
    bulk.assert_status(StatusCode::CREATED);
    assert_eq!(bulk.json::<Value>()["data"].as_array().unwrap().len(), 2);

    let own = app
        .server
        .post("/notifications")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "title": "Hello", "message": "Welcome aboard", "category": "account" }))
        .await;
    own.assert_status(StatusCode::CREATED);
    assert_eq!(own.json::<Value>()["data"]["user_id"], app.user.id.as_str());

    let mine = app
        .server
        .get("/notifications")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    let body: Value = mine.json();
    assert_eq!(body["meta"]["total"], 2);
    let foreign_id = {
        let theirs = app
            .server
            .get("/notifications")
            .add_header(header::AUTHORIZATION, bearer(&other_token))
            .await;
        let body: Value = theirs.json();
        assert_eq!(body["meta"]["total"], 1);
        body["data"][0]["id"].as_str().unwrap().to_string()
    };

    // another user's notification looks missing
    app.server
        .get(&format!("/notifications/{foreign_id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notifications_mark_read_and_unread_count() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    let mut ids = Vec::new();
    for title in ["One", "Two", "Three"] {
        let created = app
            .server
            .post("/notifications")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "title": title, "message": "Something happened", "category": "system" }))
            .await;
        ids.push(created.json::<Value>()["data"]["id"].as_str().unwrap().to_string());
    }

    let unread = |token: String| {
        let server = &app.server;
        async move {
            let response = server
                .get("/notifications/unread-count")
                .add_header(header::AUTHORIZATION, bearer(&token))
                .await;
            response.json::<Value>()["data"]["count"].as_i64().unwrap()
        }
    };
    assert_eq!(unread(token.clone()).await, 3);

    let marked = app
        .server
        .post("/notifications/mark-read")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "ids": [ids[0], ids[1]] }))
        .await;
    marked.assert_status_ok();
    assert_eq!(marked.json::<Value>()["data"]["updated"], 2);
    assert_eq!(unread(token.clone()).await, 1);

    let read_only = app
        .server
        .get("/notifications")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .add_query_param("is_read", "true")
        .await;
    assert_eq!(read_only.json::<Value>()["meta"]["total"], 2);

    app.server
        .post("/notifications/mark-all-read")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status_ok();
    assert_eq!(unread(token.clone()).await, 0);
}

#[tokio::test]
async fn test_ticket_resolution_sets_and_clears_resolved_at() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    let created = app
        .server
        .post("/tickets")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "title": "Broken download",
            "description": "The CSV export returns an empty file",
            "category": "bug",
            "priority": "high",
        }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let ticket = created.json::<Value>()["data"].clone();
    assert_eq!(ticket["status"], "open");
    assert_eq!(ticket["user_id"], app.user.id.as_str());
    assert!(ticket["resolved_at"].is_null());
    let id = ticket["id"].as_str().unwrap();

    let status = |status: &'static str| {
        app.server
            .patch(&format!("/tickets/{id}/status"))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "status": status }))
    };

    let resolved = status("resolved").await;
    resolved.assert_status_ok();
    assert!(resolved.json::<Value>()["data"]["resolved_at"].is_string());

    let reopened = status("open").await;
    assert!(reopened.json::<Value>()["data"]["resolved_at"].is_null());

    status("done").await.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let assigned = app
        .server
        .patch(&format!("/tickets/{id}/assign"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "assigned_to": app.user.id }))
        .await;
    assigned.assert_status_ok();
    assert_eq!(assigned.json::<Value>()["data"]["assigned_to"], app.user.id.as_str());

    let filtered = app
        .server
        .get("/tickets")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .add_query_param("assigned_to", &app.user.id)
        .await;
    assert_eq!(filtered.json::<Value>()["meta"]["total"], 1);
}

#[tokio::test]
async fn test_data_rows_bulk_and_stats() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    let dataset = app.create_dataset(&token, "Rows").await;
    let dataset_id = dataset["id"].as_str().unwrap();
    let rows_path = format!("/datasets/{dataset_id}/data-rows");

    let single = app
        .server
        .post(&rows_path)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "data": { "year": 2023, "value": 1 } }))
        .await;
    single.assert_status(StatusCode::CREATED);
    assert_eq!(single.json::<Value>()["data"]["row_index"], 0);

    let bulk = app
        .server
        .post(&format!("{rows_path}/bulk"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "rows": [{ "year": 2024 }, { "year": 2025 }] }))
        .await;
    bulk.assert_status(StatusCode::CREATED);
    let created = bulk.json::<Value>()["data"].clone();
    assert_eq!(created[0]["row_index"], 1);
    assert_eq!(created[1]["row_index"], 2);

    let rejected = app
        .server
        .post(&format!("{rows_path}/bulk"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "rows": [{ "year": 2026 }, 7] }))
        .await;
    rejected.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let stats = app
        .server
        .get(&format!("{rows_path}/stats"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    stats.assert_status_ok();
    let data = &stats.json::<Value>()["data"];
    assert_eq!(data["total_rows"], 3);
    assert_eq!(data["max_row_index"], 2);

    let page = app
        .server
        .get(&rows_path)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .add_query_param("sort_by", "row_index")
        .add_query_param("sort_order", "asc")
        .add_query_param("limit", "2")
        .await;
    let body: Value = page.json();
    assert_eq!(body["meta"]["total"], 3);
    assert_eq!(body["meta"]["total_pages"], 2);
    assert_eq!(body["data"][0]["data"]["year"], 2023);

    let cleared = app
        .server
        .delete(&rows_path)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    cleared.assert_status_ok();
    assert_eq!(cleared.json::<Value>()["data"]["deleted"], 3);

    app.server
        .get("/datasets/missing/data-rows")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_integration_api_key_is_never_serialized() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    let created = app
        .server
        .post("/integrations")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "name": "Statistics Bureau",
            "type": "api",
            "endpoint": "https://example.org/api",
            "api_key": "super-secret",
        }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let integration = created.json::<Value>()["data"].clone();
    assert!(integration.get("api_key").is_none());
    assert_eq!(integration["status"], "active");
    let id = integration["id"].as_str().unwrap();

    let stored: Option<String> = sqlx::query_scalar("SELECT api_key FROM integrations WHERE id = ?")
        .bind(id)
        .fetch_one(&app.context.db)
        .await
        .unwrap();
    assert_eq!(stored.as_deref(), Some("super-secret"));

    // an update without a key keeps the stored one
    app.server
        .put(&format!("/integrations/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Statistics Bureau v2", "type": "api" }))
        .await
        .assert_status_ok();
    let stored: Option<String> = sqlx::query_scalar("SELECT api_key FROM integrations WHERE id = ?")
        .bind(id)
        .fetch_one(&app.context.db)
        .await
        .unwrap();
    assert_eq!(stored.as_deref(), Some("super-secret"));
}

#[tokio::test]
async fn test_analytics_dashboard() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    let dataset = app.create_dataset(&token, "Popular").await;
    let id = dataset["id"].as_str().unwrap();
    app.server
        .patch(&format!("/datasets/{id}/status"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "status": "published" }))
        .await
        .assert_status_ok();
    app.create_dataset(&token, "Draft Only").await;

    let response = app.server.get("/analytics/dashboard").await;

    response.assert_status_ok();
    let data = &response.json::<Value>()["data"];
    assert_eq!(data["datasets"]["total"], 2);
    assert_eq!(data["datasets"]["published"], 1);
    assert_eq!(data["datasets"]["draft"], 1);
    assert_eq!(data["organizations"]["total"], 1);
    assert_eq!(data["users"]["total"], 1);
    assert_eq!(data["users"]["created_this_month"], 1);
    assert_eq!(data["popular_datasets"][0]["id"], id);
    let trend = data["dataset_trend"].as_array().unwrap();
    assert_eq!(trend.len(), 1);
    assert_eq!(trend[0]["count"], 2);
}

#[tokio::test]
async fn test_analytics_popular_limit_is_capped() {
    let app = common::spawn_app().await;

    let response = app
        .server
        .get("/analytics/popular/datasets")
        .add_query_param("limit", "1000")
        .await;

    response.assert_status_ok();
    assert!(response.json::<Value>()["data"].as_array().unwrap().is_empty());
}
