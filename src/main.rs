use std::{net::SocketAddr, sync::Arc};

use axum::{middleware, Router};
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager},
    AsyncPgConnection,
};
use minirsn::{
    admin::routes::admin_router, comments::routes::comments_router, config::Config,
    notifications::Mailer, posts::routes::posts_router, sessions::refresh_session,
    storage::Storage, users::routes::auth_router, AppState, InnerAppState, COOKIES_SECRET,
};
use tower_cookies::{CookieManagerLayer, Key};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "minirsn=debug,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env().expect("configuration");

    if COOKIES_SECRET
        .set(Key::derive_from(config.app_secret.as_bytes()))
        .is_err()
    {
        panic!("cookies secret key set twice");
    }

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
    let pool = Pool::builder(manager)
        .max_size(config.max_connections)
        .build()
        .expect("db pool");

    let storage = Storage::new(config.uploads_dir.clone());
    storage.ensure_root().await.expect("uploads directory");

    let mailer = Mailer::new(&config.mail).expect("mailer");

    let addr = SocketAddr::new(config.host.parse().expect("bind host"), config.port);

    let app_state = AppState {
        inner: Arc::new(InnerAppState {
            pool,
            storage,
            mailer,
            config,
        }),
    };

    let app = Router::new()
        .merge(auth_router())
        .nest("/post", posts_router())
        .nest("/comment", comments_router())
        .nest("/admin", admin_router())
        .nest_service(
            "/uploads/posts",
            ServeDir::new(&app_state.inner.config.uploads_dir),
        )
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            refresh_session,
        ))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    tracing::debug!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .expect("start server");
}
