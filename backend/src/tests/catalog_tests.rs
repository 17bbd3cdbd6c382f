use axum::http::{StatusCode, header};
use serde_json::{Value, json};

use super::common::{self, bearer};

#[tokio::test]
async fn test_organization_code_is_uppercased_and_unique() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    let created = app
        .server
        .post("/organizations")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "code": "bps", "name": "Badan Pusat Statistik", "email": "info@bps.example" }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let organization = created.json::<Value>()["data"].clone();
    assert_eq!(organization["code"], "BPS");
    assert_eq!(organization["slug"], "badan-pusat-statistik");
    assert_eq!(organization["status"], "active");

    let duplicate = app
        .server
        .post("/organizations")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "code": "BPS", "name": "Another Bureau" }))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);
    assert_eq!(duplicate.json::<Value>()["message"], "Organization code already exists");

    let by_code = app.server.get("/organizations/code/bps").await;
    by_code.assert_status_ok();
    assert_eq!(by_code.json::<Value>()["data"]["id"], organization["id"]);

    let by_slug = app.server.get("/organizations/slug/badan-pusat-statistik").await;
    by_slug.assert_status_ok();
    assert_eq!(by_slug.json::<Value>()["data"]["code"], "BPS");
}

#[tokio::test]
async fn test_organization_validation_and_delete() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    let invalid = app
        .server
        .post("/organizations")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "code": "", "name": "X", "status": "closed" }))
        .await;
    invalid.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(invalid.json::<Value>()["code"], "VALIDATION_FAILED");

    let created = app
        .server
        .post("/organizations")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "code": "TMP", "name": "Temporary Office" }))
        .await;
    let id = created.json::<Value>()["data"]["id"].as_str().unwrap().to_string();

    let deleted = app
        .server
        .delete(&format!("/organizations/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    deleted.assert_status_ok();
    assert_eq!(deleted.json::<Value>()["code"], "RESOURCE_DELETED");

    let missing = app.server.get(&format!("/organizations/{id}")).await;
    missing.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(missing.json::<Value>()["message"], "Organization not found");
}

#[tokio::test]
async fn test_lookup_tables_crud() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    for (path, label) in [("/tags", "Tag"), ("/topics", "Topic"), ("/business-fields", "Business field")] {
        let created = app
            .server
            .post(path)
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "name": "Public Health" }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let body: Value = created.json();
        assert_eq!(body["message"], format!("{label} created successfully"));
        assert_eq!(body["data"]["slug"], "public-health");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let updated = app
            .server
            .put(&format!("{path}/{id}"))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "name": "Health Care" }))
            .await;
        updated.assert_status_ok();
        assert_eq!(updated.json::<Value>()["data"]["slug"], "health-care");

        let listed = app.server.get(path).await;
        assert_eq!(listed.json::<Value>()["meta"]["total"], 1);

        app.server
            .delete(&format!("{path}/{id}"))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status_ok();
        app.server
            .get(&format!("{path}/{id}"))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_units_require_symbol() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    let invalid = app
        .server
        .post("/units")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Percent" }))
        .await;
    invalid.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let created = app
        .server
        .post("/units")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Percent", "symbol": "%" }))
        .await;
    created.assert_status(StatusCode::CREATED);
    assert_eq!(created.json::<Value>()["data"]["symbol"], "%");

    let searched = app.server.get("/units").add_query_param("search", "%").await;
    assert_eq!(searched.json::<Value>()["meta"]["total"], 1);
}

#[tokio::test]
async fn test_lookup_writes_require_auth() {
    let app = common::spawn_app().await;

    let response = app.server.post("/tags").json(&json!({ "name": "Open" })).await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_user_delete_releases_email() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    let request = json!({
        "organization_id": app.organization.id,
        "role_id": "editor",
        "name": "Data Editor",
        "username": "editor",
        "email": "editor@example.com",
        "password": "editor-password",
    });

    let created = app
        .server
        .post("/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&request)
        .await;
    created.assert_status(StatusCode::CREATED);
    let user = created.json::<Value>()["data"].clone();
    assert!(user.get("password_hash").is_none());
    let id = user["id"].as_str().unwrap().to_string();

    let duplicate = app
        .server
        .post("/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&request)
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);
    assert_eq!(duplicate.json::<Value>()["message"], "Email already registered");

    let suspended = app
        .server
        .patch(&format!("/users/{id}/status"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "status": "suspended" }))
        .await;
    suspended.assert_status_ok();
    let fetched = app
        .server
        .get(&format!("/users/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(fetched.json::<Value>()["data"]["status"], "suspended");

    app.server
        .delete(&format!("/users/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status_ok();
    app.server
        .get(&format!("/users/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.server
        .post("/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&request)
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_listing_pagination_contract() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    for name in ["Alpha", "Bravo", "Charlie", "Delta", "Echo"] {
        app.server
            .post("/tags")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "name": name }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let page = app
        .server
        .get("/tags")
        .add_query_param("page", "2")
        .add_query_param("limit", "2")
        .add_query_param("sort_by", "name")
        .add_query_param("sort_order", "asc")
        .await;
    let body: Value = page.json();
    assert_eq!(body["meta"], json!({ "page": 2, "limit": 2, "total": 5, "total_pages": 3 }));
    assert_eq!(body["data"][0]["name"], "Charlie");

    // out-of-range paging falls back to the defaults
    let clamped = app
        .server
        .get("/tags")
        .add_query_param("page", "0")
        .add_query_param("limit", "500")
        .await;
    let meta = &clamped.json::<Value>()["meta"];
    assert_eq!(meta["page"], 1);
    assert_eq!(meta["limit"], 100);

    // unknown sort columns are ignored rather than interpolated
    let unsorted = app
        .server
        .get("/tags")
        .add_query_param("sort_by", "name; DROP TABLE tags")
        .await;
    unsorted.assert_status_ok();
    assert_eq!(unsorted.json::<Value>()["meta"]["total"], 5);

    let searched = app.server.get("/tags").add_query_param("search", "ech").await;
    let body: Value = searched.json();
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["name"], "Echo");
}
