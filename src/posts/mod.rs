use axum::{http::StatusCode, response::IntoResponse};

use self::routes::FILE_SIZE_LIMIT_MB;

pub mod models;
pub mod routes;

#[derive(thiserror::Error, Debug)]
pub enum PostsError {
    #[error("internal server error")]
    InternalServerError,

    #[error("post not found")]
    PostNotFound,

    #[error("bad request")]
    BadRequest,

    #[error("You can only modify your own posts.")]
    Forbidden,

    #[error("image size too large, maximum image size is {}MB", FILE_SIZE_LIMIT_MB)]
    ImageTooLarge,

    #[error("unsupported image type, allowed types are JPEG, PNG and GIF")]
    UnsupportedImageType,

    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),

    #[error(transparent)]
    PoolError(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    #[error("failed to render page")]
    Render(#[from] askama::Error),
}

impl IntoResponse for PostsError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("{:#?}", self);

        match self {
            PostsError::PostNotFound => {
                (StatusCode::NOT_FOUND, self.to_string()).into_response()
            }
            PostsError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()).into_response(),
            PostsError::BadRequest
            | PostsError::ImageTooLarge
            | PostsError::UnsupportedImageType => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            PostsError::Diesel(diesel::result::Error::NotFound) => {
                (StatusCode::NOT_FOUND, "post not found").into_response()
            }
            PostsError::InternalServerError
            | PostsError::Diesel(_)
            | PostsError::PoolError(_)
            | PostsError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}
