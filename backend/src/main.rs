#![deny(clippy::all)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![warn(clippy::todo)]
// #![warn(clippy::cargo)]
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]

#[tokio::main]
async fn main() {
    app::run().await;
}

#[cfg(test)]
mod tests {
    mod common;

    mod auth_tests;
    mod catalog_tests;
    mod content_tests;
    mod dataset_tests;
    mod http_tests;
    mod workspace_tests;
}

pub mod cfg {
    mod app_settings;
    mod database_settings;
    mod jwt_settings;
    mod server_settings;
    mod storage_settings;

    pub use app_settings::*;
    pub use database_settings::*;
    pub use jwt_settings::*;
    pub use server_settings::*;
    pub use storage_settings::*;
}

pub mod core {
    mod context;
    mod dberror;
    mod listing;
    mod response;
    mod validation;

    pub use context::*;
    pub use dberror::*;
    pub use listing::*;
    pub use response::*;
    pub use validation::*;
}

pub mod auth {
    mod identity;
    mod jwt;
    mod password;

    pub use identity::*;
    pub use jwt::*;
    pub use password::*;
}

pub mod db {
    mod analytics;
    mod data_rows;
    mod datasets;
    mod feedbacks;
    mod files;
    mod integrations;
    mod notifications;
    mod organizations;
    mod publications;
    mod refresh_tokens;
    mod settings;
    mod taxonomy;
    mod tickets;
    mod users;
    mod visualizations;

    pub use analytics::*;
    pub use data_rows::*;
    pub use datasets::*;
    pub use feedbacks::*;
    pub use files::*;
    pub use integrations::*;
    pub use notifications::*;
    pub use organizations::*;
    pub use publications::*;
    pub use refresh_tokens::*;
    pub use settings::*;
    pub use taxonomy::*;
    pub use tickets::*;
    pub use users::*;
    pub use visualizations::*;
}

pub mod routes {
    pub mod analytics;
    pub mod auth;
    pub mod data_rows;
    pub mod datasets;
    pub mod feedbacks;
    pub mod files;
    pub mod health;
    pub mod integrations;
    pub mod notifications;
    pub mod organizations;
    pub mod publications;
    pub mod settings;
    pub mod taxonomy;
    pub mod tickets;
    pub mod users;
    pub mod visualizations;
}

pub mod services {
    pub mod auth;
    pub mod datasets;
    pub mod files;
    pub mod storage;
}

pub mod middleware {
    mod auth_gate;
    mod content_type;

    pub use auth_gate::*;
    pub use content_type::*;
}

pub mod app {
    mod cli;
    mod migrations;
    mod router;
    mod server;

    pub use cli::*;
    pub use migrations::*;
    pub use router::*;
    pub use server::*;
}
