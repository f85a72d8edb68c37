use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, PasswordHash,
};
use askama::Template;
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use chrono::{Duration, Utc};
use diesel::{
    result::{DatabaseErrorKind, Error::DatabaseError},
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
};
use diesel_async::RunQueryDsl;
use garde::Validate;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::{
    auth::AuthExtractor,
    flash::{self, Flash},
    schema::{sessions, users},
    sessions::{models::CreateSession, SESSION_COOKIE_NAME, SESSION_DURATION_DAYS},
    users::models::{CreateUser, User, UserLogin, UserRole},
    AppState, InnerAppState, COOKIES_SECRET,
};

use super::UsersError;

pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
        .route("/register", get(register_form).post(register))
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    flash: Option<Flash>,
    email: String,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    flash: Option<Flash>,
    username: String,
    email: String,
    errors: Vec<String>,
}

/// Logged-in users land on the post list, everyone else on the login form.
pub async fn home(auth: Option<AuthExtractor<{ UserRole::User as u32 }>>) -> Redirect {
    if auth.is_some() {
        Redirect::to("/post/")
    } else {
        Redirect::to("/login")
    }
}

pub async fn login_form(cookies: Cookies) -> Result<Html<String>, UsersError> {
    let template = LoginTemplate {
        flash: flash::take(&cookies),
        email: String::new(),
        error: None,
    };

    Ok(Html(template.render()?))
}

pub async fn login(
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Form(payload): Form<UserLogin>,
) -> Result<Response, UsersError> {
    let mut db = state.pool.get().await?;

    let user = users::table
        .filter(users::email.eq(&payload.email))
        .select(User::as_select())
        .get_result::<User>(&mut db)
        .await
        .optional()?;

    let Some(user) = user else {
        return render_login_failure(payload.email);
    };

    let parsed_password = PasswordHash::new(&user.password)?;

    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_password)
        .is_err()
    {
        return render_login_failure(payload.email);
    }

    let session = CreateSession {
        id: Uuid::now_v7(),
        user_id: user.id,
        created_at: Utc::now(),
        expires_at: Utc::now() + Duration::days(SESSION_DURATION_DAYS),
    };

    diesel::insert_into(sessions::table)
        .values(&session)
        .execute(&mut db)
        .await?;

    let key = COOKIES_SECRET.get().expect("cookies secret key");

    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, session.id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookies.private(key).add(cookie);

    Ok(Redirect::to("/").into_response())
}

fn render_login_failure(email: String) -> Result<Response, UsersError> {
    let template = LoginTemplate {
        flash: None,
        email,
        error: Some("Invalid credentials.".to_string()),
    };

    Ok(Html(template.render()?).into_response())
}

pub async fn logout(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
) -> Result<Redirect, UsersError> {
    let mut db = state.pool.get().await?;

    diesel::delete(sessions::table.find(auth.session_id))
        .execute(&mut db)
        .await?;

    let key = COOKIES_SECRET.get().expect("cookies secret key");

    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, "");
    cookie.set_path("/");
    cookies.private(key).remove(cookie);

    flash::set(&cookies, Flash::success("You have been logged out."));

    Ok(Redirect::to("/login"))
}

pub async fn register_form(cookies: Cookies) -> Result<Html<String>, UsersError> {
    let template = RegisterTemplate {
        flash: flash::take(&cookies),
        username: String::new(),
        email: String::new(),
        errors: vec![],
    };

    Ok(Html(template.render()?))
}

pub async fn register(
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Form(payload): Form<CreateUser>,
) -> Result<Response, UsersError> {
    if let Err(errors) = payload.validate(&()) {
        let template = RegisterTemplate {
            flash: None,
            username: payload.username,
            email: payload.email,
            errors: errors
                .flatten()
                .iter()
                .map(|(path, error)| format!("{path}: {error}"))
                .collect(),
        };
        return Ok(Html(template.render()?).into_response());
    }

    let salt = SaltString::generate(&mut OsRng);

    let hashed_password = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)?
        .to_string();

    let mut db = state.pool.get().await?;

    let user = User {
        id: Uuid::now_v7(),
        username: payload.username.clone(),
        email: payload.email.clone(),
        password: hashed_password,
        role: UserRole::User,
        created_at: Utc::now(),
    };

    if let Err(err) = diesel::insert_into(users::table)
        .values(&user)
        .execute(&mut db)
        .await
    {
        if let DatabaseError(DatabaseErrorKind::UniqueViolation, ref message) = err {
            let taken = match message.constraint_name() {
                Some("users_username_key") => "username already taken",
                Some("users_email_key") => "email already taken",
                _ => return Err(err.into()),
            };
            let template = RegisterTemplate {
                flash: None,
                username: payload.username,
                email: payload.email,
                errors: vec![taken.to_string()],
            };
            return Ok(Html(template.render()?).into_response());
        }
        return Err(err.into());
    }

    flash::set(&cookies, Flash::success("Account created, you can now log in."));

    Ok(Redirect::to("/login").into_response())
}
