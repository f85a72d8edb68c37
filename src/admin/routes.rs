use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, State},
    response::{Html, Redirect},
    routing::get,
    Router,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    auth::AuthExtractor,
    comments::models::Comment,
    flash::{self, Flash},
    posts::models::Post,
    schema::{comments, posts, users},
    users::models::{User, UserRole},
    AppState, InnerAppState,
};

use super::AdminError;

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/users", get(list_users))
        .route("/users/:user_id/edit", get(edit_user).post(edit_user))
        .route("/users/:user_id/delete", get(delete_user))
        .route("/posts", get(list_posts))
        .route("/post/:post_id/delete", get(delete_post))
        .route("/comments", get(list_comments))
        .route("/comment/:comment_id/delete", get(delete_comment))
}

#[derive(Template)]
#[template(path = "admin/index.html")]
struct DashboardTemplate {
    flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "admin/users.html")]
struct AdminUsersTemplate {
    flash: Option<Flash>,
    users: Vec<User>,
}

#[derive(Template)]
#[template(path = "admin/user_edit.html")]
struct AdminUserEditTemplate {
    flash: Option<Flash>,
    user: User,
}

struct AdminPostRow {
    post: Post,
    author: String,
}

#[derive(Template)]
#[template(path = "admin/posts.html")]
struct AdminPostsTemplate {
    flash: Option<Flash>,
    posts: Vec<AdminPostRow>,
}

struct AdminCommentRow {
    comment: Comment,
    author: String,
}

#[derive(Template)]
#[template(path = "admin/comments.html")]
struct AdminCommentsTemplate {
    flash: Option<Flash>,
    comments: Vec<AdminCommentRow>,
}

pub async fn dashboard(
    _admin: AuthExtractor<{ UserRole::Admin as u32 }>,
    cookies: Cookies,
) -> Result<Html<String>, AdminError> {
    let template = DashboardTemplate {
        flash: flash::take(&cookies),
    };

    Ok(Html(template.render()?))
}

pub async fn list_users(
    _admin: AuthExtractor<{ UserRole::Admin as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
) -> Result<Html<String>, AdminError> {
    let mut db = state.pool.get().await?;

    let all_users = users::table
        .select(User::as_select())
        .load::<User>(&mut db)
        .await?;

    let template = AdminUsersTemplate {
        flash: flash::take(&cookies),
        users: all_users,
    };

    Ok(Html(template.render()?))
}

/// User editing is a stub: the page renders, nothing is persisted yet.
// TODO: persist role/email changes once the admin user form exists
pub async fn edit_user(
    _admin: AuthExtractor<{ UserRole::Admin as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(user_id): Path<Uuid>,
) -> Result<Html<String>, AdminError> {
    let mut db = state.pool.get().await?;

    let Some(user) = users::table
        .find(user_id)
        .select(User::as_select())
        .get_result::<User>(&mut db)
        .await
        .optional()?
    else {
        return Err(AdminError::UserNotFound);
    };

    let template = AdminUserEditTemplate {
        flash: flash::take(&cookies),
        user,
    };

    Ok(Html(template.render()?))
}

/// Hard delete. Posts, comments and sessions go with the row (FK cascade);
/// the posts' image files are unlinked afterwards, best-effort.
pub async fn delete_user(
    _admin: AuthExtractor<{ UserRole::Admin as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(user_id): Path<Uuid>,
) -> Result<Redirect, AdminError> {
    let mut db = state.pool.get().await?;

    let images = posts::table
        .filter(posts::user_id.eq(user_id))
        .select(posts::image)
        .load::<Option<String>>(&mut db)
        .await?;

    let deleted = diesel::delete(users::table.find(user_id))
        .execute(&mut db)
        .await?;

    if deleted < 1 {
        tracing::error!("user not found: {}", user_id);
        return Err(AdminError::UserNotFound);
    }

    for image in images.into_iter().flatten() {
        if let Err(err) = state.storage.delete(&image).await {
            tracing::error!("failed to remove image {image}: {err}");
        }
    }

    flash::set(&cookies, Flash::success("User deleted successfully"));

    Ok(Redirect::to("/admin/users"))
}

pub async fn list_posts(
    _admin: AuthExtractor<{ UserRole::Admin as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
) -> Result<Html<String>, AdminError> {
    let mut db = state.pool.get().await?;

    let rows = posts::table
        .inner_join(users::table)
        .select((Post::as_select(), User::as_select()))
        .load::<(Post, User)>(&mut db)
        .await?;

    let template = AdminPostsTemplate {
        flash: flash::take(&cookies),
        posts: rows
            .into_iter()
            .map(|(post, user)| AdminPostRow {
                post,
                author: user.username,
            })
            .collect(),
    };

    Ok(Html(template.render()?))
}

pub async fn delete_post(
    _admin: AuthExtractor<{ UserRole::Admin as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(post_id): Path<Uuid>,
) -> Result<Redirect, AdminError> {
    let mut db = state.pool.get().await?;

    let Some(post) = posts::table
        .find(post_id)
        .select(Post::as_select())
        .get_result::<Post>(&mut db)
        .await
        .optional()?
    else {
        return Err(AdminError::PostNotFound);
    };

    diesel::delete(posts::table.find(post.id))
        .execute(&mut db)
        .await?;

    if let Some(image) = &post.image {
        if let Err(err) = state.storage.delete(image).await {
            tracing::error!("failed to remove image {image}: {err}");
        }
    }

    flash::set(&cookies, Flash::success("Post deleted successfully"));

    Ok(Redirect::to("/admin/posts"))
}

pub async fn list_comments(
    _admin: AuthExtractor<{ UserRole::Admin as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
) -> Result<Html<String>, AdminError> {
    let mut db = state.pool.get().await?;

    let rows = comments::table
        .inner_join(users::table)
        .select((Comment::as_select(), User::as_select()))
        .load::<(Comment, User)>(&mut db)
        .await?;

    let template = AdminCommentsTemplate {
        flash: flash::take(&cookies),
        comments: rows
            .into_iter()
            .map(|(comment, user)| AdminCommentRow {
                comment,
                author: user.username,
            })
            .collect(),
    };

    Ok(Html(template.render()?))
}

pub async fn delete_comment(
    _admin: AuthExtractor<{ UserRole::Admin as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(comment_id): Path<Uuid>,
) -> Result<Redirect, AdminError> {
    let mut db = state.pool.get().await?;

    let deleted = diesel::delete(comments::table.find(comment_id))
        .execute(&mut db)
        .await?;

    if deleted < 1 {
        tracing::error!("comment not found: {}", comment_id);
        return Err(AdminError::CommentNotFound);
    }

    flash::set(&cookies, Flash::success("Comment deleted successfully"));

    Ok(Redirect::to("/admin/comments"))
}
