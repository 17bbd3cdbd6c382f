use axum::http::{StatusCode, header};
use axum_test::TestServer;
use serde_json::{Value, json};

use crate::app;
use crate::auth;
use crate::cfg;
use crate::core;
use crate::db;

pub const TEST_PASSWORD: &str = "correct-horse-battery";
pub const TEST_EMAIL: &str = "admin@example.com";
pub const TEST_USERNAME: &str = "admin";
const TEST_SECRET: &str = "test__secret__key__for__jwt__testing__0123";

/// A running router over a fresh in-memory database holding one organization and one active user.
pub struct TestApp {
    pub server: TestServer,
    pub context: core::ArcContext,
    pub organization: db::Organization,
    pub user: db::User,
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn test_settings() -> cfg::AppSettings {
    let mut settings = cfg::AppSettings::default();
    // every connection to sqlite::memory: is its own database, so the pool keeps exactly one
    settings.database = cfg::DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        max_lifetime: 3600,
    };
    settings.jwt.secret = TEST_SECRET.to_string();
    settings.jwt.cleanup_interval = 0;
    settings.storage.root = std::env::temp_dir()
        .join(format!("portal-data-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string();
    settings
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_settings()).await
}

pub async fn spawn_app_with(settings: cfg::AppSettings) -> TestApp {
    let db = app::create_db_context(&settings.database).await.unwrap();
    app::run_migrations(&db).await.unwrap();

    let jwt = auth::JwtContext::new(&settings.jwt, &settings.jwt.secret);
    let context = core::Context::new(db, jwt, settings);

    let organization = db::create_organization(
        &context.db,
        &db::OrganizationFields {
            code: "DISKOMINFO".to_string(),
            name: "Dinas Komunikasi".to_string(),
            slug: "dinas-komunikasi".to_string(),
            status: "active".to_string(),
            ..Default::default()
        },
        "system",
    )
    .await
    .unwrap();

    let user = db::create_user(
        &context.db,
        &db::NewUser {
            organization_id: organization.id.clone(),
            role_id: "admin".to_string(),
            name: "Admin".to_string(),
            username: TEST_USERNAME.to_string(),
            email: TEST_EMAIL.to_string(),
            password_hash: auth::hash_password(TEST_PASSWORD).unwrap(),
            employee_id: None,
            position: None,
            address: None,
            phone: None,
        },
    )
    .await
    .unwrap();

    let server = TestServer::new(app::create_router(context.clone())).unwrap();
    TestApp {
        server,
        context,
        organization,
        user,
    }
}

impl TestApp {
    /// Logs the seeded user in and returns the `data` part of the response.
    pub async fn login(&self) -> Value {
        let response = self
            .server
            .post("/auth/login")
            .json(&json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["data"].clone()
    }

    pub async fn access_token(&self) -> String {
        self.login().await["access_token"].as_str().unwrap().to_string()
    }

    /// Creates a dataset through the API and returns its JSON.
    pub async fn create_dataset(&self, token: &str, name: &str) -> Value {
        let response = self
            .server
            .post("/datasets")
            .add_header(header::AUTHORIZATION, bearer(token))
            .json(&json!({
                "name": name,
                "classification": "public",
                "category": "statistics",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["data"].clone()
    }
}
