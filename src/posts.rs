use std::io::ErrorKind;
use std::path::Path;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::web::Bytes;
use actix_web::{web, HttpRequest, HttpResponse};
use diesel::prelude::*;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::common::db;
use crate::common::errors::AppError;
use crate::common::flash::{redirect_with, FlashCategory};
use crate::common::helpers::{allowed_file, now_utc, secure_filename, with_suffix};
use crate::models::models::{FeedEntry, NewPost, Post};
use crate::schema::{follows, posts, users};
use crate::templates::{render_feed, render_upload};

// === Queries ===

/// Posts by `user_id` or anyone they follow, newest first.
pub fn get_feed(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Vec<FeedEntry>> {
    let followed = follows::table
        .filter(follows::follower_id.eq(user_id))
        .select(follows::followed_id);

    let rows = posts::table
        .inner_join(users::table)
        .filter(posts::user_id.eq(user_id).or(posts::user_id.eq_any(followed)))
        .order((posts::timestamp.desc(), posts::id.desc()))
        .select((Post::as_select(), users::username))
        .load::<(Post, String)>(conn)?;

    Ok(rows.into_iter().map(|(post, author)| FeedEntry { post, author }).collect())
}

pub fn get_user_posts(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Vec<FeedEntry>> {
    let rows = posts::table
        .inner_join(users::table)
        .filter(posts::user_id.eq(user_id))
        .order((posts::timestamp.desc(), posts::id.desc()))
        .select((Post::as_select(), users::username))
        .load::<(Post, String)>(conn)?;

    Ok(rows.into_iter().map(|(post, author)| FeedEntry { post, author }).collect())
}

pub fn create_post(conn: &mut SqliteConnection, user_id: i32, image_file: &str) -> QueryResult<Post> {
    diesel::insert_into(posts::table)
        .values(&NewPost {
            image_file,
            timestamp: now_utc(),
            user_id,
        })
        .returning(Post::as_returning())
        .get_result(conn)
}

pub fn find_post(conn: &mut SqliteConnection, post_id: i32) -> QueryResult<Option<Post>> {
    posts::table
        .find(post_id)
        .select(Post::as_select())
        .first(conn)
        .optional()
}

// === Feed ===

pub async fn get_feed_page(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: CurrentUser,
) -> Result<HttpResponse, AppError> {
    let user_id = user.0.id;
    let entries = db::run(&state.pool, move |conn| Ok(get_feed(conn, user_id)?)).await?;
    Ok(render_feed(&req, &user.0, &entries)?)
}

// === Upload ===

pub async fn upload_form(req: HttpRequest, user: CurrentUser) -> Result<HttpResponse, AppError> {
    Ok(render_upload(&req, &user.0)?)
}

const NOT_ALLOWED: &str = "File type not allowed. Use png, jpg, jpeg or gif.";

fn upload_error(message: &str) -> HttpResponse {
    redirect_with("/upload", FlashCategory::Danger, message)
}

struct UploadedFile {
    filename: String,
    data: Bytes,
}

/// Pulls the `file` field out of a buffered multipart body.
async fn read_file_field(body: Bytes, boundary: String) -> Result<Option<UploadedFile>, multer::Error> {
    let mut multipart = multer::Multipart::with_reader(std::io::Cursor::new(body), boundary);
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        return Ok(Some(UploadedFile { filename, data }));
    }
    Ok(None)
}

/// Writes `data` under `dir` as `name`, or as `name` with a random suffix
/// when that name is already taken. Returns the name actually used.
async fn store_upload(dir: &Path, name: &str, data: &[u8]) -> std::io::Result<String> {
    tokio::fs::create_dir_all(dir).await?;
    let mut candidate = name.to_string();
    loop {
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&candidate))
            .await;
        match opened {
            Ok(mut file) => {
                file.write_all(data).await?;
                file.flush().await?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let suffix = Uuid::new_v4().simple().to_string();
                candidate = with_suffix(name, &suffix[..8]);
            }
            Err(e) => return Err(e),
        }
    }
}

pub async fn upload_photo(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
    user: CurrentUser,
) -> Result<HttpResponse, AppError> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let Ok(boundary) = multer::parse_boundary(content_type) else {
        return Ok(upload_error("No file part"));
    };

    let body = match payload.to_bytes_limited(state.config.max_upload_bytes).await {
        Ok(Ok(body)) => body,
        Ok(Err(e)) => return Err(AppError::BadRequest(format!("Could not read upload: {}", e))),
        Err(_) => return Ok(upload_error("File is too large.")),
    };

    let file = match read_file_field(body, boundary).await {
        Ok(Some(file)) => file,
        Ok(None) | Err(_) => return Ok(upload_error("No file part")),
    };

    if file.filename.is_empty() {
        return Ok(upload_error("No selected file"));
    }
    if !allowed_file(&file.filename) {
        return Ok(upload_error(NOT_ALLOWED));
    }
    let safe_name = secure_filename(&file.filename);
    if !allowed_file(&safe_name) {
        return Ok(upload_error(NOT_ALLOWED));
    }

    let upload_dir = state.config.upload_dir.clone();
    let stored = store_upload(&upload_dir, &safe_name, &file.data).await?;

    let user_id = user.0.id;
    let image_file = stored.clone();
    let created = db::run(&state.pool, move |conn| Ok(create_post(conn, user_id, &image_file)?)).await;
    let post = match created {
        Ok(post) => post,
        Err(e) => {
            let _ = tokio::fs::remove_file(upload_dir.join(&stored)).await;
            return Err(e);
        }
    };

    tracing::info!(user_id, post_id = post.id, file = %post.image_file, bytes = file.data.len(), "photo uploaded");
    Ok(redirect_with("/feed", FlashCategory::Success, "Your photo has been uploaded!"))
}

// === Delete ===

enum DeleteOutcome {
    Missing,
    NotOwner,
    /// Row removed; carries the file name if no other post still uses it.
    Deleted(Option<String>),
}

pub async fn delete_post(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let post_id = path.into_inner();
    let user_id = user.0.id;

    let outcome = db::run(&state.pool, move |conn| {
        let Some(post) = find_post(conn, post_id)? else {
            return Ok(DeleteOutcome::Missing);
        };
        if post.user_id != user_id {
            return Ok(DeleteOutcome::NotOwner);
        }
        diesel::delete(posts::table.find(post.id)).execute(conn)?;
        let still_used = posts::table
            .filter(posts::image_file.eq(&post.image_file))
            .count()
            .get_result::<i64>(conn)?
            > 0;
        Ok(DeleteOutcome::Deleted((!still_used).then_some(post.image_file)))
    })
    .await?;

    match outcome {
        DeleteOutcome::Missing => Err(AppError::NotFound("Post not found".to_string())),
        DeleteOutcome::NotOwner => {
            tracing::warn!(user_id, post_id, "refused to delete another user's post");
            Ok(redirect_with(
                "/account",
                FlashCategory::Danger,
                "You do not have permission to delete this post",
            ))
        }
        DeleteOutcome::Deleted(file) => {
            if let Some(file) = file {
                let path = state.config.upload_dir.join(&file);
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    if e.kind() != ErrorKind::NotFound {
                        tracing::warn!(error = %e, file = %file, "could not remove image file");
                    }
                }
            }
            tracing::info!(user_id, post_id, "post deleted");
            Ok(redirect_with("/account", FlashCategory::Success, "Your photo has been deleted"))
        }
    }
}
