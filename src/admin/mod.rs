use axum::{http::StatusCode, response::IntoResponse};

pub mod routes;

#[derive(thiserror::Error, Debug)]
pub enum AdminError {
    #[error("internal server error")]
    InternalServerError,

    #[error("user not found")]
    UserNotFound,

    #[error("post not found")]
    PostNotFound,

    #[error("comment not found")]
    CommentNotFound,

    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),

    #[error(transparent)]
    PoolError(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    #[error("failed to render page")]
    Render(#[from] askama::Error),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("{:#?}", self);

        match self {
            AdminError::UserNotFound
            | AdminError::PostNotFound
            | AdminError::CommentNotFound => {
                (StatusCode::NOT_FOUND, self.to_string()).into_response()
            }
            AdminError::Diesel(diesel::result::Error::NotFound) => {
                (StatusCode::NOT_FOUND, "not found").into_response()
            }
            AdminError::InternalServerError
            | AdminError::Diesel(_)
            | AdminError::PoolError(_)
            | AdminError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}
