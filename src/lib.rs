use std::sync::Arc;

use axum::extract::FromRef;
use diesel_async::{pooled_connection::deadpool::Pool, AsyncPgConnection};
use once_cell::sync::OnceCell;
use tower_cookies::Key;

use crate::{config::Config, notifications::Mailer, storage::Storage};

pub mod admin;
pub mod auth;
pub mod comments;
pub mod config;
pub mod csrf;
pub mod flash;
pub mod notifications;
pub mod policy;
pub mod posts;
pub mod schema;
pub mod sessions;
pub mod storage;
pub mod users;

/// Key for the private cookie jar, set once at startup from the app secret.
pub static COOKIES_SECRET: OnceCell<Key> = OnceCell::new();

#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<InnerAppState>,
}

pub struct InnerAppState {
    pub pool: Pool<AsyncPgConnection>,
    pub storage: Storage,
    pub mailer: Mailer,
    pub config: Config,
}

impl FromRef<AppState> for Arc<InnerAppState> {
    fn from_ref(state: &AppState) -> Self {
        state.inner.clone()
    }
}

impl FromRef<AppState> for Pool<AsyncPgConnection> {
    fn from_ref(state: &AppState) -> Self {
        state.inner.pool.clone()
    }
}
