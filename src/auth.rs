use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::StatusCode,
    response::{IntoResponse, Redirect},
    RequestPartsExt,
};
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::{
    schema::{sessions, users},
    sessions::{models::Session, UserSession},
    users::models::{User, UserResponseBrief, UserRole},
    AppState,
};

/// Authenticated-user extractor. `USER_ROLE` is the minimum role the route
/// requires; `UserRole::User` admits any logged-in account.
pub struct AuthExtractor<const USER_ROLE: u32> {
    pub current_user: UserResponseBrief,
    pub session_id: Uuid,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    PoolError(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),

    #[error("invalid session")]
    InvalidSession,

    #[error("access denied")]
    Forbidden,

    #[error("invalid session")]
    SessionError(#[from] crate::sessions::SessionError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("{:#?}", self);

        match self {
            AuthError::InvalidSession => Redirect::to("/login").into_response(),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "access denied").into_response(),
            AuthError::Diesel(_) | AuthError::PoolError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            AuthError::SessionError(e) => e.into_response(),
        }
    }
}

#[async_trait]
impl<const USER_ROLE: u32> FromRequestParts<AppState> for AuthExtractor<USER_ROLE> {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let mut db = state.inner.pool.get().await?;

        let session_id = parts
            .extract_with_state::<UserSession, _>(state)
            .await?
            .session_id
            .ok_or_else(|| {
                tracing::debug!("auth-extractor: missing session_id");
                AuthError::InvalidSession
            })?;

        let Ok((user, session)) = sessions::table
            .inner_join(users::table)
            .filter(sessions::id.eq(session_id))
            .filter(sessions::expires_at.gt(Utc::now()))
            .select((User::as_select(), Session::as_select()))
            .get_result::<(User, Session)>(&mut db)
            .await
        else {
            // expired or stale cookie, clean the row up
            diesel::delete(sessions::table.filter(sessions::id.eq(session_id)))
                .execute(&mut db)
                .await?;
            return Err(AuthError::InvalidSession);
        };

        // Safety: USER_ROLE is only provided by casting UserRole variants
        let required: UserRole = unsafe { std::mem::transmute(USER_ROLE) };

        if required == UserRole::Admin && user.role != UserRole::Admin {
            return Err(AuthError::Forbidden);
        }

        Ok(AuthExtractor {
            current_user: UserResponseBrief {
                id: user.id,
                username: user.username,
                email: user.email,
                role: user.role,
            },
            session_id: session.id,
        })
    }
}
