use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::Utc;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use garde::Validate;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    auth::AuthExtractor,
    csrf::{self, TokenForm},
    flash::{self, Flash},
    policy,
    posts::{models::Post, routes::format_field_errors},
    schema::{comments, posts, users},
    users::models::{User, UserRole},
    AppState, InnerAppState,
};

use super::{
    models::{Comment, CommentForm, CommentInput, QuickAddForm, UpdateComment},
    CommentsError,
};

pub fn comments_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/new/:post_id", get(new_comment_form).post(create_comment))
        .route("/quick-add/:post_id", post(quick_add_comment))
        .route("/:comment_id", get(show_comment).post(delete_comment))
        .route("/:comment_id/edit", get(edit_comment_form).post(update_comment))
}

#[derive(Template)]
#[template(path = "comments/index.html")]
struct CommentsIndexTemplate {
    flash: Option<Flash>,
    comments: Vec<Comment>,
}

#[derive(Template)]
#[template(path = "comments/new.html")]
struct NewCommentTemplate {
    flash: Option<Flash>,
    post: Post,
    post_author: String,
    content: String,
    errors: Vec<String>,
    csrf_token: String,
}

#[derive(Template)]
#[template(path = "comments/edit.html")]
struct EditCommentTemplate {
    flash: Option<Flash>,
    comment_id: Uuid,
    content: String,
    errors: Vec<String>,
    csrf_token: String,
}

#[derive(Template)]
#[template(path = "comments/show.html")]
struct CommentShowTemplate {
    flash: Option<Flash>,
    comment: Comment,
    author: String,
}

/// The current user's own comments, newest first.
pub async fn index(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
) -> Result<Html<String>, CommentsError> {
    let mut db = state.pool.get().await?;

    let own_comments = comments::table
        .filter(comments::user_id.eq(auth.current_user.id))
        .order(comments::created_at.desc())
        .select(Comment::as_select())
        .load::<Comment>(&mut db)
        .await?;

    let template = CommentsIndexTemplate {
        flash: flash::take(&cookies),
        comments: own_comments,
    };

    Ok(Html(template.render()?))
}

pub async fn new_comment_form(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(post_id): Path<Uuid>,
) -> Result<Html<String>, CommentsError> {
    let mut db = state.pool.get().await?;

    let Some((post, author)) = posts::table
        .inner_join(users::table)
        .filter(posts::id.eq(post_id))
        .select((Post::as_select(), User::as_select()))
        .get_result::<(Post, User)>(&mut db)
        .await
        .optional()?
    else {
        return Err(CommentsError::PostNotFound);
    };

    let template = NewCommentTemplate {
        flash: flash::take(&cookies),
        post,
        post_author: author.username,
        content: String::new(),
        errors: vec![],
        csrf_token: csrf::token(
            state.config.app_secret.as_bytes(),
            auth.session_id,
            csrf::COMMENT_FORM_ACTION,
        ),
    };

    Ok(Html(template.render()?))
}

pub async fn create_comment(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(post_id): Path<Uuid>,
    Form(form): Form<CommentForm>,
) -> Result<Response, CommentsError> {
    let mut db = state.pool.get().await?;

    let Some((post, author)) = posts::table
        .inner_join(users::table)
        .filter(posts::id.eq(post_id))
        .select((Post::as_select(), User::as_select()))
        .get_result::<(Post, User)>(&mut db)
        .await
        .optional()?
    else {
        return Err(CommentsError::PostNotFound);
    };

    let secret = state.config.app_secret.as_bytes();

    if csrf::verify(secret, auth.session_id, csrf::COMMENT_FORM_ACTION, &form.token).is_err() {
        flash::set(&cookies, Flash::error("Invalid security token."));
        return Ok(Redirect::to(&format!("/comment/new/{post_id}")).into_response());
    }

    let input = CommentInput::new(&form.content);

    if let Err(errors) = input.validate(&()) {
        let template = NewCommentTemplate {
            flash: None,
            post,
            post_author: author.username,
            content: form.content,
            errors: format_field_errors(&errors),
            csrf_token: csrf::token(secret, auth.session_id, csrf::COMMENT_FORM_ACTION),
        };
        return Ok(Html(template.render()?).into_response());
    }

    let comment = Comment {
        id: Uuid::now_v7(),
        content: input.content,
        created_at: Utc::now(),
        updated_at: None,
        post_id: post.id,
        user_id: auth.current_user.id,
    };

    diesel::insert_into(comments::table)
        .values(&comment)
        .execute(&mut db)
        .await?;

    flash::set(&cookies, Flash::success("Comment added successfully!"));

    Ok(Redirect::to(&format!("/post/{}", post.id)).into_response())
}

/// Inline creation path next to a post; same bounds as the full form.
pub async fn quick_add_comment(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(post_id): Path<Uuid>,
    Form(form): Form<QuickAddForm>,
) -> Result<Response, CommentsError> {
    let mut db = state.pool.get().await?;

    let Some(post) = posts::table
        .find(post_id)
        .select(Post::as_select())
        .get_result::<Post>(&mut db)
        .await
        .optional()?
    else {
        return Err(CommentsError::PostNotFound);
    };

    if csrf::verify(
        state.config.app_secret.as_bytes(),
        auth.session_id,
        csrf::COMMENT_QUICK_ADD_ACTION,
        &form.token,
    )
    .is_err()
    {
        flash::set(&cookies, Flash::error("Invalid security token."));
        return Ok(Redirect::to(&format!("/post/{}", post.id)).into_response());
    }

    let input = CommentInput::new(&form.comment_text);

    if input.validate(&()).is_err() {
        let message = if input.content.chars().count() < 3 {
            "The comment must contain at least 3 characters."
        } else {
            "The comment cannot exceed 1000 characters."
        };
        flash::set(&cookies, Flash::error(message));
        return Ok(Redirect::to(&format!("/post/{}", post.id)).into_response());
    }

    let comment = Comment {
        id: Uuid::now_v7(),
        content: input.content,
        created_at: Utc::now(),
        updated_at: None,
        post_id: post.id,
        user_id: auth.current_user.id,
    };

    diesel::insert_into(comments::table)
        .values(&comment)
        .execute(&mut db)
        .await?;

    flash::set(&cookies, Flash::success("Comment added successfully!"));

    Ok(Redirect::to(&format!("/post/{}", post.id)).into_response())
}

pub async fn show_comment(
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(comment_id): Path<Uuid>,
) -> Result<Html<String>, CommentsError> {
    let mut db = state.pool.get().await?;

    let Some((comment, author)) = comments::table
        .inner_join(users::table)
        .filter(comments::id.eq(comment_id))
        .select((Comment::as_select(), User::as_select()))
        .get_result::<(Comment, User)>(&mut db)
        .await
        .optional()?
    else {
        return Err(CommentsError::CommentNotFound);
    };

    let template = CommentShowTemplate {
        flash: flash::take(&cookies),
        comment,
        author: author.username,
    };

    Ok(Html(template.render()?))
}

pub async fn edit_comment_form(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(comment_id): Path<Uuid>,
) -> Result<Html<String>, CommentsError> {
    let mut db = state.pool.get().await?;

    let Some(comment) = comments::table
        .find(comment_id)
        .select(Comment::as_select())
        .get_result::<Comment>(&mut db)
        .await
        .optional()?
    else {
        return Err(CommentsError::CommentNotFound);
    };

    if !policy::can_edit_comment(&auth.current_user, &comment) {
        return Err(CommentsError::Forbidden);
    }

    let template = EditCommentTemplate {
        flash: flash::take(&cookies),
        comment_id: comment.id,
        content: comment.content,
        errors: vec![],
        csrf_token: csrf::token(
            state.config.app_secret.as_bytes(),
            auth.session_id,
            csrf::COMMENT_FORM_ACTION,
        ),
    };

    Ok(Html(template.render()?))
}

pub async fn update_comment(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(comment_id): Path<Uuid>,
    Form(form): Form<CommentForm>,
) -> Result<Response, CommentsError> {
    let mut db = state.pool.get().await?;

    let Some(comment) = comments::table
        .find(comment_id)
        .select(Comment::as_select())
        .get_result::<Comment>(&mut db)
        .await
        .optional()?
    else {
        return Err(CommentsError::CommentNotFound);
    };

    if !policy::can_edit_comment(&auth.current_user, &comment) {
        return Err(CommentsError::Forbidden);
    }

    let secret = state.config.app_secret.as_bytes();

    if csrf::verify(secret, auth.session_id, csrf::COMMENT_FORM_ACTION, &form.token).is_err() {
        flash::set(&cookies, Flash::error("Invalid security token."));
        return Ok(Redirect::to(&format!("/comment/{comment_id}/edit")).into_response());
    }

    let input = CommentInput::new(&form.content);

    if let Err(errors) = input.validate(&()) {
        let template = EditCommentTemplate {
            flash: None,
            comment_id: comment.id,
            content: form.content,
            errors: format_field_errors(&errors),
            csrf_token: csrf::token(secret, auth.session_id, csrf::COMMENT_FORM_ACTION),
        };
        return Ok(Html(template.render()?).into_response());
    }

    diesel::update(comments::table.find(comment.id))
        .set(UpdateComment {
            content: input.content,
            updated_at: Some(Utc::now()),
        })
        .execute(&mut db)
        .await?;

    flash::set(&cookies, Flash::success("Comment updated successfully!"));

    Ok(Redirect::to(&format!("/post/{}", comment.post_id)).into_response())
}

pub async fn delete_comment(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(comment_id): Path<Uuid>,
    Form(form): Form<TokenForm>,
) -> Result<Response, CommentsError> {
    let mut db = state.pool.get().await?;

    let Some(comment) = comments::table
        .find(comment_id)
        .select(Comment::as_select())
        .get_result::<Comment>(&mut db)
        .await
        .optional()?
    else {
        return Err(CommentsError::CommentNotFound);
    };

    if !policy::can_delete_comment(&auth.current_user, &comment) {
        return Err(CommentsError::Forbidden);
    }

    if csrf::verify(
        state.config.app_secret.as_bytes(),
        auth.session_id,
        &csrf::delete_action(comment.id),
        &form.token,
    )
    .is_err()
    {
        flash::set(&cookies, Flash::error("Error while deleting the comment."));
        return Ok(Redirect::to(&format!("/post/{}", comment.post_id)).into_response());
    }

    diesel::delete(comments::table.find(comment.id))
        .execute(&mut db)
        .await?;

    flash::set(&cookies, Flash::success("Comment deleted successfully!"));

    Ok(Redirect::to(&format!("/post/{}", comment.post_id)).into_response())
}
