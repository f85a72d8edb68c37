use axum::{http::StatusCode, response::IntoResponse};

pub mod models;
pub mod routes;

#[derive(thiserror::Error, Debug)]
pub enum CommentsError {
    #[error("internal server error")]
    InternalServerError,

    #[error("comment not found")]
    CommentNotFound,

    #[error("post not found")]
    PostNotFound,

    #[error("You can only modify your own comments.")]
    Forbidden,

    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),

    #[error(transparent)]
    PoolError(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    #[error("failed to render page")]
    Render(#[from] askama::Error),
}

impl IntoResponse for CommentsError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("{:#?}", self);

        match self {
            CommentsError::CommentNotFound | CommentsError::PostNotFound => {
                (StatusCode::NOT_FOUND, self.to_string()).into_response()
            }
            CommentsError::Forbidden => {
                (StatusCode::FORBIDDEN, self.to_string()).into_response()
            }
            CommentsError::Diesel(diesel::result::Error::NotFound) => {
                (StatusCode::NOT_FOUND, "comment not found").into_response()
            }
            CommentsError::InternalServerError
            | CommentsError::Diesel(_)
            | CommentsError::PoolError(_)
            | CommentsError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}
