use axum::http::{StatusCode, header};
use axum_test::multipart::{MultipartForm, Part};
use serde_json::{Value, json};

use super::common::{self, bearer};

async fn create_publication(app: &common::TestApp, token: &str, title: &str, featured: bool) -> Value {
    let response = app
        .server
        .post("/publications")
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&json!({
            "title": title,
            "content": "Quarterly figures",
            "organization_id": app.organization.id,
            "is_featured": featured,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["data"].clone()
}

#[tokio::test]
async fn test_publication_views_and_downloads_are_counted() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    let publication = create_publication(&app, &token, "Annual Report", false).await;
    let id = publication["id"].as_str().unwrap();
    assert_eq!(publication["status"], "draft");
    assert_eq!(publication["view_count"], 0);

    app.server.get(&format!("/publications/{id}")).await.assert_status_ok();
    let second = app.server.get(&format!("/publications/{id}")).await;
    assert_eq!(second.json::<Value>()["data"]["view_count"], 2);

    let download = app.server.post(&format!("/publications/{id}/download")).await;
    download.assert_status_ok();
    assert_eq!(download.json::<Value>()["data"]["download_count"], 1);
}

#[tokio::test]
async fn test_publication_filters_and_soft_delete() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    create_publication(&app, &token, "Featured Brief", true).await;
    let plain = create_publication(&app, &token, "Plain Brief", false).await;

    let featured = app.server.get("/publications").add_query_param("is_featured", "true").await;
    featured.assert_status_ok();
    let body: Value = featured.json();
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["title"], "Featured Brief");

    let by_organization = app
        .server
        .get(&format!("/publications/organization/{}", app.organization.id))
        .await;
    assert_eq!(by_organization.json::<Value>()["meta"]["total"], 2);

    let id = plain["id"].as_str().unwrap();
    let deleted = app
        .server
        .delete(&format!("/publications/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    deleted.assert_status_ok();

    app.server
        .get(&format!("/publications/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let remaining = app.server.get("/publications").await;
    assert_eq!(remaining.json::<Value>()["meta"]["total"], 1);
}

#[tokio::test]
async fn test_publication_status_must_be_known() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    let publication = create_publication(&app, &token, "Status Check", false).await;
    let id = publication["id"].as_str().unwrap();

    let published = app
        .server
        .patch(&format!("/publications/{id}/status"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "status": "published" }))
        .await;
    published.assert_status_ok();
    assert_eq!(published.json::<Value>()["data"]["status"], "published");

    let unknown = app
        .server
        .patch(&format!("/publications/{id}/status"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "status": "retracted" }))
        .await;
    unknown.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_visualization_stats_and_type_filter() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    for (title, kind, status, highlight) in [
        ("Bar One", "bar", "published", true),
        ("Bar Two", "bar", "draft", false),
        ("Line One", "line", "published", false),
    ] {
        let response = app
            .server
            .post("/visualizations")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({
                "title": title,
                "type": kind,
                "status": status,
                "is_highlight": highlight,
                "config": { "x": "year" },
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<Value>()["data"]["type"], kind);
    }

    let stats = app.server.get("/visualizations/stats").await;
    stats.assert_status_ok();
    let data = &stats.json::<Value>()["data"];
    assert_eq!(data["total"], 3);
    assert_eq!(data["published"], 2);
    assert_eq!(data["draft"], 1);
    assert_eq!(data["highlighted"], 1);

    let bars = app.server.get("/visualizations").add_query_param("type", "bar").await;
    assert_eq!(bars.json::<Value>()["meta"]["total"], 2);

    let highlighted = app
        .server
        .get("/visualizations")
        .add_query_param("is_highlight", "1")
        .await;
    let body: Value = highlighted.json();
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["config"]["x"], "year");
}

#[tokio::test]
async fn test_feedback_validation_and_lifecycle() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    let invalid = app
        .server
        .post("/feedbacks")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "rating": 6, "comment": "too short", "category": "" }))
        .await;
    invalid.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(invalid.json::<Value>()["details"].as_array().unwrap().len(), 3);

    let created = app
        .server
        .post("/feedbacks")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "rating": 4, "comment": "Useful data, thanks a lot", "category": "quality" }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let feedback = created.json::<Value>()["data"].clone();
    assert_eq!(feedback["user_id"], app.user.id.as_str());
    let id = feedback["id"].as_str().unwrap();

    let listed = app
        .server
        .get("/feedbacks")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .add_query_param("search", "useful")
        .await;
    assert_eq!(listed.json::<Value>()["meta"]["total"], 1);

    let deleted = app
        .server
        .delete(&format!("/feedbacks/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    deleted.assert_status_ok();
    app.server
        .get(&format!("/feedbacks/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_file_upload_and_delete() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    let form = MultipartForm::new().add_text("name", "Population table").add_part(
        "file",
        Part::bytes(b"year,count\n2024,10\n".as_slice())
            .file_name("population.csv")
            .mime_type("text/csv"),
    );
    let response = app
        .server
        .post("/files/upload")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(form)
        .await;

    response.assert_status(StatusCode::CREATED);
    let file = response.json::<Value>()["data"].clone();
    assert_eq!(file["name"], "Population table");
    assert_eq!(file["original_name"], "population.csv");
    assert_eq!(file["extension"], "csv");
    assert_eq!(file["size"], 19);
    assert_eq!(file["uploaded_by"], app.user.id.as_str());

    let stored = app.context.storage.resolve(file["path"].as_str().unwrap()).unwrap();
    assert!(stored.exists());

    let id = file["id"].as_str().unwrap();
    app.server
        .delete(&format!("/files/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status_ok();
    assert!(!stored.exists());
    app.server
        .get(&format!("/files/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_file_upload_requires_file_part() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;

    let response = app
        .server
        .post("/files/upload")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(MultipartForm::new().add_text("name", "nothing"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "File is required");
}
