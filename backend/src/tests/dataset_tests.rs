use axum::http::{StatusCode, header};
use serde_json::{Value, json};

use super::common::{self, bearer};

async fn organization_counters(app: &common::TestApp) -> (i64, i64) {
    let response = app.server.get(&format!("/organizations/{}", app.organization.id)).await;
    response.assert_status_ok();
    let data = &response.json::<Value>()["data"];
    (
        data["total_datasets"].as_i64().unwrap(),
        data["public_datasets"].as_i64().unwrap(),
    )
}

async fn set_status(app: &common::TestApp, token: &str, id: &str, status: &str) -> axum_test::TestResponse {
    app.server
        .patch(&format!("/datasets/{id}/status"))
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&json!({ "status": status }))
        .await
}

#[tokio::test]
async fn test_create_dataset_with_tags() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    let tag = app
        .server
        .post("/tags")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Health Care" }))
        .await;
    tag.assert_status(StatusCode::CREATED);
    let tag_id = tag.json::<Value>()["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .server
        .post("/datasets")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "name": "Hospital Beds",
            "classification": "public",
            "category": "health",
            "metadatas": { "source": "ministry" },
            "tag_ids": [tag_id, tag_id, " "],
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["code"], "RESOURCE_CREATED");
    assert_eq!(body["message"], "Dataset created successfully");
    let data = &body["data"];
    assert_eq!(data["slug"], "hospital-beds");
    assert_eq!(data["status"], "draft");
    assert_eq!(data["validation_status"], "pending");
    assert_eq!(data["organization_id"], app.organization.id.as_str());
    assert_eq!(data["created_by"], app.user.id.as_str());
    assert_eq!(data["organization"]["name"], "Dinas Komunikasi");
    assert_eq!(data["metadatas"]["source"], "ministry");
    assert_eq!(data["tags"].as_array().unwrap().len(), 1);
    assert_eq!(data["tags"][0]["slug"], "health-care");

    assert_eq!(organization_counters(&app).await, (1, 0));
}

#[tokio::test]
async fn test_create_dataset_validation() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    let response = app
        .server
        .post("/datasets")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "x", "validation_status": "maybe" }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_FAILED");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["field"].as_str())
        .collect();
    for field in ["name", "classification", "category", "validation_status"] {
        assert!(fields.contains(&field), "missing detail for {field}");
    }
}

#[tokio::test]
async fn test_create_dataset_requires_auth() {
    let app = common::spawn_app().await;

    let response = app
        .server
        .post("/datasets")
        .json(&json!({ "name": "Budget", "classification": "public", "category": "finance" }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_names_get_suffixed_slugs() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    let first = app.create_dataset(&token, "Population Census").await;
    let second = app.create_dataset(&token, "Population Census").await;
    let third = app.create_dataset(&token, "Population Census").await;

    assert_eq!(first["slug"], "population-census");
    assert_eq!(second["slug"], "population-census-2");
    assert_eq!(third["slug"], "population-census-3");

    let by_slug = app.server.get("/datasets/slug/population-census-2").await;
    by_slug.assert_status_ok();
    assert_eq!(by_slug.json::<Value>()["data"]["id"], second["id"]);
}

#[tokio::test]
async fn test_get_missing_dataset() {
    let app = common::spawn_app().await;

    let response = app.server.get("/datasets/does-not-exist").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["message"], "Dataset not found");
}

#[tokio::test]
async fn test_update_dataset_replaces_fields() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    let dataset = app.create_dataset(&token, "Road Length").await;
    let id = dataset["id"].as_str().unwrap();

    let response = app
        .server
        .put(&format!("/datasets/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "name": "Road Network Length",
            "classification": "internal",
            "category": "infrastructure",
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["code"], "RESOURCE_UPDATED");
    assert_eq!(body["data"]["slug"], "road-network-length");
    assert_eq!(body["data"]["classification"], "internal");
    assert!(body["data"]["tags"].as_array().unwrap().is_empty());

    let missing = app
        .server
        .put("/datasets/nope")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Whatever", "classification": "a", "category": "b" }))
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_transitions_maintain_counters() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    let dataset = app.create_dataset(&token, "Rainfall").await;
    let id = dataset["id"].as_str().unwrap();

    let published = set_status(&app, &token, id, "published").await;
    published.assert_status_ok();
    assert_eq!(published.json::<Value>()["data"]["status"], "published");
    assert_eq!(organization_counters(&app).await, (1, 1));

    set_status(&app, &token, id, "draft").await.assert_status_ok();
    assert_eq!(organization_counters(&app).await, (1, 0));

    let invalid = set_status(&app, &token, id, "gone").await;
    invalid.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_archived_dataset_is_terminal_and_still_readable() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    app.create_dataset(&token, "Kept").await;
    let archived = app.create_dataset(&token, "Archived").await;
    let id = archived["id"].as_str().unwrap();

    let response = app
        .server
        .delete(&format!("/datasets/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["code"], "RESOURCE_DELETED");
    assert_eq!(body["message"], "Dataset deleted successfully");
    assert_eq!(organization_counters(&app).await, (1, 0));

    let locked = set_status(&app, &token, id, "published").await;
    locked.assert_status(StatusCode::CONFLICT);
    assert_eq!(locked.json::<Value>()["message"], "Archived datasets cannot change status");

    // archiving only changes the status, every read path still sees the row
    let listed = app.server.get("/datasets").await;
    listed.assert_status_ok();
    assert_eq!(listed.json::<Value>()["meta"]["total"], 2);

    let archived_only = app.server.get("/datasets").add_query_param("status", "archived").await;
    let body: Value = archived_only.json();
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["id"], archived["id"]);

    let by_id = app.server.get(&format!("/datasets/{id}")).await;
    by_id.assert_status_ok();
    assert_eq!(by_id.json::<Value>()["data"]["status"], "archived");

    let by_slug = app.server.get("/datasets/slug/archived").await;
    by_slug.assert_status_ok();
    assert_eq!(by_slug.json::<Value>()["data"]["id"], archived["id"]);
}

#[tokio::test]
async fn test_list_datasets_by_organization_and_tag() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    app.create_dataset(&token, "Schools").await;
    app.create_dataset(&token, "Teachers").await;

    let response = app
        .server
        .get(&format!("/organizations/{}/datasets", app.organization.id))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["meta"]["total"], 2);

    let by_tag = app.server.get("/datasets").add_query_param("tag_id", "unknown").await;
    by_tag.assert_status_ok();
    assert_eq!(by_tag.json::<Value>()["meta"]["total"], 0);
}

async fn create_term(app: &common::TestApp, token: &str, path: &str, name: &str) -> String {
    let response = app
        .server
        .post(path)
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&json!({ "name": name }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["data"]["id"].as_str().unwrap().to_string()
}

fn tag_ids(dataset: &Value) -> Vec<String> {
    let mut ids: Vec<String> = dataset["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tag| tag["id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

fn listed_names(response: &axum_test::TestResponse) -> Vec<String> {
    response.json::<Value>()["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|dataset| dataset["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_update_relinks_tags() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    let t1 = create_term(&app, &token, "/tags", "Population").await;
    let t2 = create_term(&app, &token, "/tags", "Census").await;
    let t3 = create_term(&app, &token, "/tags", "Households").await;

    let created = app
        .server
        .post("/datasets")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "name": "Residents",
            "classification": "public",
            "category": "statistics",
            "tag_ids": [t1, t2],
        }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let dataset = created.json::<Value>()["data"].clone();
    let id = dataset["id"].as_str().unwrap();
    let mut expected = vec![t1.clone(), t2.clone()];
    expected.sort();
    assert_eq!(tag_ids(&dataset), expected);

    let updated = app
        .server
        .put(&format!("/datasets/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "name": "Residents",
            "classification": "public",
            "category": "statistics",
            "tag_ids": [t2, t3],
        }))
        .await;
    updated.assert_status_ok();

    let fetched = app.server.get(&format!("/datasets/{id}")).await;
    let mut expected = vec![t2, t3];
    expected.sort();
    assert_eq!(tag_ids(&fetched.json::<Value>()["data"]), expected);
}

#[tokio::test]
async fn test_failed_relink_rolls_back_update() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    let t1 = create_term(&app, &token, "/tags", "Rivers").await;
    let t2 = create_term(&app, &token, "/tags", "Lakes").await;

    let created = app
        .server
        .post("/datasets")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "name": "Water Bodies",
            "classification": "public",
            "category": "environment",
            "tag_ids": [t1, t2],
        }))
        .await;
    let id = created.json::<Value>()["data"]["id"].as_str().unwrap().to_string();

    let rejected = app
        .server
        .put(&format!("/datasets/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({
            "name": "Renamed Water Bodies",
            "classification": "internal",
            "category": "environment",
            "tag_ids": ["no-such-tag"],
        }))
        .await;
    rejected.assert_status_bad_request();

    let fetched = app.server.get(&format!("/datasets/{id}")).await;
    let data = &fetched.json::<Value>()["data"];
    assert_eq!(data["name"], "Water Bodies");
    assert_eq!(data["slug"], "water-bodies");
    assert_eq!(data["classification"], "public");
    assert_eq!(data["tags"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_sort_falls_back_to_newest_first() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    for name in ["First", "Second", "Third"] {
        app.create_dataset(&token, name).await;
    }

    let fallback = app
        .server
        .get("/datasets")
        .add_query_param("sort_by", "does_not_exist")
        .add_query_param("sort_order", "xyz")
        .await;
    fallback.assert_status_ok();
    let explicit = app
        .server
        .get("/datasets")
        .add_query_param("sort_by", "created_at")
        .add_query_param("sort_order", "DESC")
        .await;

    assert_eq!(listed_names(&fallback), ["Third", "Second", "First"]);
    assert_eq!(listed_names(&fallback), listed_names(&explicit));

    let ascending = app
        .server
        .get("/datasets")
        .add_query_param("sort_by", "name")
        .add_query_param("sort_order", "asc")
        .await;
    assert_eq!(listed_names(&ascending), ["First", "Second", "Third"]);
}

#[tokio::test]
async fn test_list_datasets_filters() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    let tag = create_term(&app, &token, "/tags", "Transport").await;
    let topic = create_term(&app, &token, "/topics", "Mobility").await;

    let create = |body: Value| {
        app.server
            .post("/datasets")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&body)
    };
    create(json!({
        "name": "Bus Routes",
        "description": "Every city bus line",
        "classification": "public",
        "category": "transport",
        "topic_id": topic,
        "tag_ids": [tag],
    }))
    .await
    .assert_status(StatusCode::CREATED);
    create(json!({
        "name": "Traffic Counts",
        "classification": "internal",
        "category": "transport",
    }))
    .await
    .assert_status(StatusCode::CREATED);
    create(json!({
        "name": "Harbour Arrivals",
        "description": "Ships and bus ferries",
        "classification": "public",
        "category": "maritime",
    }))
    .await
    .assert_status(StatusCode::CREATED);

    let by_tag = app.server.get("/datasets").add_query_param("tag_id", &tag).await;
    assert_eq!(listed_names(&by_tag), ["Bus Routes"]);

    let by_topic = app.server.get("/datasets").add_query_param("topic_id", &topic).await;
    assert_eq!(listed_names(&by_topic), ["Bus Routes"]);

    let by_classification = app
        .server
        .get("/datasets")
        .add_query_param("classification", "internal")
        .await;
    assert_eq!(listed_names(&by_classification), ["Traffic Counts"]);

    // search covers the name and the description
    let searched = app
        .server
        .get("/datasets")
        .add_query_param("search", "BUS")
        .add_query_param("sort_by", "name")
        .add_query_param("sort_order", "asc")
        .await;
    assert_eq!(listed_names(&searched), ["Bus Routes", "Harbour Arrivals"]);

    let combined = app
        .server
        .get("/datasets")
        .add_query_param("search", "bus")
        .add_query_param("classification", "public")
        .add_query_param("tag_id", &tag)
        .await;
    assert_eq!(combined.json::<Value>()["meta"]["total"], 1);
}
