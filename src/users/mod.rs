use axum::{http::StatusCode, response::IntoResponse};

pub mod models;
pub mod routes;

#[derive(thiserror::Error, Debug)]
pub enum UsersError {
    #[error("internal server error")]
    InternalServerError,

    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),

    #[error(transparent)]
    PoolError(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    #[error(transparent)]
    Argon2(#[from] argon2::password_hash::Error),

    #[error("failed to render page")]
    Render(#[from] askama::Error),
}

impl IntoResponse for UsersError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("{:#?}", self);

        match self {
            UsersError::Diesel(diesel::result::Error::NotFound) => {
                (StatusCode::NOT_FOUND, "user not found").into_response()
            }
            UsersError::InternalServerError
            | UsersError::Diesel(_)
            | UsersError::PoolError(_)
            | UsersError::Argon2(_)
            | UsersError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}
