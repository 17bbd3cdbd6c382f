use crate::auth;
use crate::cfg;
use crate::core;
use crate::services::storage::LocalStorage;

pub type ArcContext = std::sync::Arc<Context>;

/// Shared, immutable per-process state handed to every handler.
#[derive(Clone)]
pub struct Context {
    pub db: core::DbContext,
    pub jwt: auth::JwtContext,
    pub storage: LocalStorage,
    pub settings: cfg::AppSettings,
}

impl Context {
    #[must_use]
    pub fn new(db: core::DbContext, jwt: auth::JwtContext, settings: cfg::AppSettings) -> ArcContext {
        Self {
            db,
            jwt,
            storage: LocalStorage::new(&settings.storage.root),
            settings,
        }
        .into()
    }
}
