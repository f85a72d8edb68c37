use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use chrono::Utc;
use diesel::{
    BelongingToDsl, ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
};
use diesel_async::RunQueryDsl;
use garde::Validate;
use tower_cookies::Cookies;
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use crate::{
    auth::AuthExtractor,
    comments::models::Comment,
    csrf::{self, TokenForm},
    flash::{self, Flash},
    notifications, policy,
    schema::{comments, posts, users},
    storage,
    users::models::{User, UserRole},
    AppState, InnerAppState,
};

use super::{
    models::{Post, PostData, PostInput, UpdatePost, UploadedImage},
    PostsError,
};

const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

pub const FILE_SIZE_LIMIT_MB: usize = 2;

const FILE_SIZE_LIMIT: usize = FILE_SIZE_LIMIT_MB * 1024 * 1024; // 2mb

// text fields and multipart framing on top of the image itself
const REQUEST_SIZE_LIMIT: usize = FILE_SIZE_LIMIT + 64 * 1024;

pub fn posts_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/new", get(new_post_form).post(create_post))
        .route("/:post_id", get(show_post).post(delete_post))
        .route("/:post_id/edit", get(edit_post_form).post(update_post))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(REQUEST_SIZE_LIMIT))
}

struct PostListItem {
    post: Post,
    author: String,
}

struct CommentView {
    comment: Comment,
    author: String,
    can_delete: bool,
    delete_token: String,
}

#[derive(Template)]
#[template(path = "posts/index.html")]
struct PostsIndexTemplate {
    flash: Option<Flash>,
    posts: Vec<PostListItem>,
}

#[derive(Template)]
#[template(path = "posts/new.html")]
struct NewPostTemplate {
    flash: Option<Flash>,
    content: String,
    errors: Vec<String>,
    csrf_token: String,
}

#[derive(Template)]
#[template(path = "posts/edit.html")]
struct EditPostTemplate {
    flash: Option<Flash>,
    post_id: Uuid,
    content: String,
    errors: Vec<String>,
    csrf_token: String,
}

#[derive(Template)]
#[template(path = "posts/show.html")]
struct PostShowTemplate {
    flash: Option<Flash>,
    post: Post,
    author: String,
    can_edit: bool,
    can_delete: bool,
    delete_token: String,
    quick_add_token: String,
    comments: Vec<CommentView>,
}

/// All posts, newest first.
pub async fn index(
    _auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
) -> Result<Html<String>, PostsError> {
    let mut db = state.pool.get().await?;

    let rows = posts::table
        .inner_join(users::table)
        .order(posts::created_at.desc())
        .select((Post::as_select(), User::as_select()))
        .load::<(Post, User)>(&mut db)
        .await?;

    let template = PostsIndexTemplate {
        flash: flash::take(&cookies),
        posts: rows
            .into_iter()
            .map(|(post, user)| PostListItem {
                post,
                author: user.username,
            })
            .collect(),
    };

    Ok(Html(template.render()?))
}

pub async fn new_post_form(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
) -> Result<Html<String>, PostsError> {
    let template = NewPostTemplate {
        flash: flash::take(&cookies),
        content: String::new(),
        errors: vec![],
        csrf_token: csrf::token(
            state.config.app_secret.as_bytes(),
            auth.session_id,
            csrf::POST_FORM_ACTION,
        ),
    };

    Ok(Html(template.render()?))
}

pub async fn create_post(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    mut fields: Multipart,
) -> Result<Response, PostsError> {
    let data = read_post_form(&mut fields).await?;
    let secret = state.config.app_secret.as_bytes();

    if csrf::verify(
        secret,
        auth.session_id,
        csrf::POST_FORM_ACTION,
        data.token.as_deref().unwrap_or_default(),
    )
    .is_err()
    {
        flash::set(&cookies, Flash::error("Invalid security token."));
        return Ok(Redirect::to("/post/new").into_response());
    }

    let input = PostInput::new(&data.content);

    if let Err(errors) = input.validate(&()) {
        let template = NewPostTemplate {
            flash: None,
            content: data.content,
            errors: format_field_errors(&errors),
            csrf_token: csrf::token(secret, auth.session_id, csrf::POST_FORM_ACTION),
        };
        return Ok(Html(template.render()?).into_response());
    }

    // the file goes in first so a stored post can never point at nothing
    let mut image_name = None;
    let mut upload_failed = false;

    if let Some(upload) = data.image {
        let extension =
            extension_for(&upload.content_type).ok_or(PostsError::UnsupportedImageType)?;
        let file_name = storage::unique_file_name(&upload.file_name, extension);

        match state.storage.put(&file_name, &upload.bytes).await {
            Ok(()) => image_name = Some(file_name),
            Err(err) => {
                tracing::error!("failed to store upload: {err}");
                upload_failed = true;
            }
        }
    }

    let mut db = state.pool.get().await?;

    let post = Post {
        id: Uuid::now_v7(),
        content: input.content,
        image: image_name,
        created_at: Utc::now(),
        updated_at: None,
        user_id: auth.current_user.id,
    };

    let post = diesel::insert_into(posts::table)
        .values(&post)
        .returning(Post::as_returning())
        .get_result::<Post>(&mut db)
        .await?;

    // the post is committed at this point, a mail failure must not undo that
    if let Err(err) =
        notifications::notify_new_post(&mut db, &state.mailer, &post, &auth.current_user).await
    {
        tracing::error!("new-post notification failed: {err}");
    }

    if upload_failed {
        flash::set(
            &cookies,
            Flash::error("Image upload failed, the post was created without it."),
        );
    } else {
        flash::set(&cookies, Flash::success("Post created successfully!"));
    }

    Ok(Redirect::to("/post/").into_response())
}

pub async fn show_post(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(post_id): Path<Uuid>,
) -> Result<Html<String>, PostsError> {
    let mut db = state.pool.get().await?;

    let Some((post, author)) = posts::table
        .inner_join(users::table)
        .filter(posts::id.eq(post_id))
        .select((Post::as_select(), User::as_select()))
        .get_result::<(Post, User)>(&mut db)
        .await
        .optional()?
    else {
        return Err(PostsError::PostNotFound);
    };

    let rows = Comment::belonging_to(&post)
        .inner_join(users::table)
        .order(comments::created_at.desc())
        .select((Comment::as_select(), User::as_select()))
        .load::<(Comment, User)>(&mut db)
        .await?;

    let secret = state.config.app_secret.as_bytes();

    let comment_views = rows
        .into_iter()
        .map(|(comment, user)| CommentView {
            delete_token: csrf::token(
                secret,
                auth.session_id,
                &csrf::delete_action(comment.id),
            ),
            can_delete: policy::can_delete_comment(&auth.current_user, &comment),
            author: user.username,
            comment,
        })
        .collect();

    let template = PostShowTemplate {
        flash: flash::take(&cookies),
        can_edit: policy::can_edit_post(&auth.current_user, &post),
        can_delete: policy::can_delete_post(&auth.current_user, &post),
        delete_token: csrf::token(secret, auth.session_id, &csrf::delete_action(post.id)),
        quick_add_token: csrf::token(secret, auth.session_id, csrf::COMMENT_QUICK_ADD_ACTION),
        author: author.username,
        comments: comment_views,
        post,
    };

    Ok(Html(template.render()?))
}

pub async fn edit_post_form(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(post_id): Path<Uuid>,
) -> Result<Html<String>, PostsError> {
    let mut db = state.pool.get().await?;

    let Some(post) = posts::table
        .find(post_id)
        .select(Post::as_select())
        .get_result::<Post>(&mut db)
        .await
        .optional()?
    else {
        return Err(PostsError::PostNotFound);
    };

    if !policy::can_edit_post(&auth.current_user, &post) {
        return Err(PostsError::Forbidden);
    }

    let template = EditPostTemplate {
        flash: flash::take(&cookies),
        post_id: post.id,
        content: post.content,
        errors: vec![],
        csrf_token: csrf::token(
            state.config.app_secret.as_bytes(),
            auth.session_id,
            csrf::POST_FORM_ACTION,
        ),
    };

    Ok(Html(template.render()?))
}

pub async fn update_post(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(post_id): Path<Uuid>,
    mut fields: Multipart,
) -> Result<Response, PostsError> {
    let mut db = state.pool.get().await?;

    let Some(post) = posts::table
        .find(post_id)
        .select(Post::as_select())
        .get_result::<Post>(&mut db)
        .await
        .optional()?
    else {
        return Err(PostsError::PostNotFound);
    };

    if !policy::can_edit_post(&auth.current_user, &post) {
        return Err(PostsError::Forbidden);
    }

    let data = read_post_form(&mut fields).await?;
    let secret = state.config.app_secret.as_bytes();

    if csrf::verify(
        secret,
        auth.session_id,
        csrf::POST_FORM_ACTION,
        data.token.as_deref().unwrap_or_default(),
    )
    .is_err()
    {
        flash::set(&cookies, Flash::error("Invalid security token."));
        return Ok(Redirect::to(&format!("/post/{post_id}/edit")).into_response());
    }

    let input = PostInput::new(&data.content);

    if let Err(errors) = input.validate(&()) {
        let template = EditPostTemplate {
            flash: None,
            post_id: post.id,
            content: data.content,
            errors: format_field_errors(&errors),
            csrf_token: csrf::token(secret, auth.session_id, csrf::POST_FORM_ACTION),
        };
        return Ok(Html(template.render()?).into_response());
    }

    // write the replacement before touching the old file, so a failure can
    // never leave the post with no image at all
    let mut new_image = None;
    let mut upload_failed = false;

    if let Some(upload) = data.image {
        let extension =
            extension_for(&upload.content_type).ok_or(PostsError::UnsupportedImageType)?;
        let file_name = storage::unique_file_name(&upload.file_name, extension);

        match state.storage.put(&file_name, &upload.bytes).await {
            Ok(()) => new_image = Some(file_name),
            Err(err) => {
                tracing::error!("failed to store replacement image: {err}");
                upload_failed = true;
            }
        }
    }

    diesel::update(posts::table.find(post.id))
        .set(UpdatePost {
            content: input.content,
            updated_at: Some(Utc::now()),
            image: new_image.clone(),
        })
        .execute(&mut db)
        .await?;

    if let (Some(_), Some(old_image)) = (&new_image, &post.image) {
        if let Err(err) = state.storage.delete(old_image).await {
            tracing::error!("failed to remove replaced image {old_image}: {err}");
        }
    }

    if upload_failed {
        flash::set(
            &cookies,
            Flash::error("Image upload failed, the post kept its previous image."),
        );
    } else {
        flash::set(&cookies, Flash::success("Post updated successfully!"));
    }

    Ok(Redirect::to(&format!("/post/{}", post.id)).into_response())
}

pub async fn delete_post(
    auth: AuthExtractor<{ UserRole::User as u32 }>,
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    Path(post_id): Path<Uuid>,
    Form(form): Form<TokenForm>,
) -> Result<Response, PostsError> {
    let mut db = state.pool.get().await?;

    let Some(post) = posts::table
        .find(post_id)
        .select(Post::as_select())
        .get_result::<Post>(&mut db)
        .await
        .optional()?
    else {
        return Err(PostsError::PostNotFound);
    };

    if !policy::can_delete_post(&auth.current_user, &post) {
        return Err(PostsError::Forbidden);
    }

    if csrf::verify(
        state.config.app_secret.as_bytes(),
        auth.session_id,
        &csrf::delete_action(post.id),
        &form.token,
    )
    .is_err()
    {
        flash::set(&cookies, Flash::error("Invalid security token."));
        return Ok(Redirect::to("/post/").into_response());
    }

    // dependent comments go with the row (FK cascade)
    diesel::delete(posts::table.find(post.id))
        .execute(&mut db)
        .await?;

    if let Some(image) = &post.image {
        if let Err(err) = state.storage.delete(image).await {
            tracing::error!("failed to remove image {image}: {err}");
        }
    }

    flash::set(&cookies, Flash::success("Post deleted successfully!"));

    Ok(Redirect::to("/post/").into_response())
}

async fn read_post_form(fields: &mut Multipart) -> Result<PostData, PostsError> {
    let mut post = PostData::builder();

    while let Some(mut field) = fields.next_field().await.map_err(|err| {
        tracing::debug!("post form multipart error: {:#?}", err);
        PostsError::BadRequest
    })? {
        if let Some(field_name) = field.name() {
            match field_name {
                "content" => {
                    tracing::debug!("adding content");
                    post = post.content(field.text().await.map_err(|err| {
                        tracing::debug!("content field error: {:#?}", err);
                        PostsError::BadRequest
                    })?);
                }
                "_token" => {
                    post = post.token(field.text().await.ok());
                }
                "image" => {
                    tracing::debug!("adding image");
                    let content_type = field
                        .content_type()
                        .ok_or(PostsError::BadRequest)?
                        .to_string();

                    let file_name = field.file_name().unwrap_or_default().to_string();

                    let mut bytes: Vec<u8> = Vec::new();

                    while let Some(chunk) = field.chunk().await.map_err(|err| {
                        tracing::debug!("image field chunk error: {:#?}", err);
                        PostsError::BadRequest
                    })? {
                        if bytes.len() + chunk.len() > FILE_SIZE_LIMIT {
                            return Err(PostsError::ImageTooLarge);
                        }
                        bytes.extend_from_slice(&chunk);
                    }

                    // browsers submit an empty file part when nothing is selected
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }

                    if !ALLOWED_MIME_TYPES.contains(&content_type.as_str()) {
                        return Err(PostsError::UnsupportedImageType);
                    }

                    post = post.image(Some(UploadedImage {
                        file_name,
                        content_type,
                        bytes,
                    }));
                }
                _ => continue,
            }
        }
    }

    post.build().map_err(|_| PostsError::BadRequest)
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

pub(crate) fn format_field_errors(errors: &garde::Errors) -> Vec<String> {
    errors
        .flatten()
        .iter()
        .map(|(path, error)| format!("{path}: {error}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_follow_the_validated_mime_type() {
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/gif"), Some("gif"));
        assert_eq!(extension_for("image/webp"), None);
        assert_eq!(extension_for("application/pdf"), None);
    }
}
