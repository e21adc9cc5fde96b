use std::future::Future;
use std::pin::Pin;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;
use crate::AppState;
use crate::common::db;
use crate::common::errors::AppError;
use crate::common::flash::{redirect, redirect_with, FlashCategory};
use crate::common::helpers::{
    hash_password, is_valid_email, is_valid_password, is_valid_username, now_utc, sanitize_text,
    verify_password,
};
use crate::config::{MAX_NAME_LENGTH, SESSION_COOKIE};
use crate::models::models::{NewUser, Session, User};
use crate::schema::{sessions, users};
use crate::templates::{render_login, render_register};

// === Sessions ===

pub fn create_session(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<String> {
    let session = Session {
        token: Uuid::new_v4().to_string(),
        user_id,
        created_at: now_utc(),
    };
    diesel::insert_into(sessions::table)
        .values(&session)
        .execute(conn)?;
    Ok(session.token)
}

/// Resolves a session token to its user. Expired sessions are removed and
/// treated as absent.
pub fn find_session_user(
    conn: &mut SqliteConnection,
    token: &str,
    expiration_hours: i64,
) -> QueryResult<Option<User>> {
    let found = sessions::table
        .inner_join(users::table)
        .filter(sessions::token.eq(token))
        .select((Session::as_select(), User::as_select()))
        .first::<(Session, User)>(conn)
        .optional()?;

    let Some((session, user)) = found else {
        return Ok(None);
    };

    let age = now_utc() - session.created_at;
    if age > chrono::Duration::hours(expiration_hours) {
        delete_session(conn, token)?;
        return Ok(None);
    }
    Ok(Some(user))
}

/// Removes every session older than `expiration_hours`.
pub fn prune_expired_sessions(conn: &mut SqliteConnection, expiration_hours: i64) -> QueryResult<usize> {
    let cutoff = now_utc() - chrono::Duration::hours(expiration_hours);
    diesel::delete(sessions::table.filter(sessions::created_at.lt(cutoff))).execute(conn)
}

pub fn delete_session(conn: &mut SqliteConnection, token: &str) -> QueryResult<usize> {
    diesel::delete(sessions::table.filter(sessions::token.eq(token))).execute(conn)
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .finish()
}

/// The logged-in user. Requests without a valid session are redirected to
/// the login form.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());

        Box::pin(async move {
            let state = state
                .ok_or_else(|| AppError::InternalError("Application state missing".to_string()))?;
            let token = token.ok_or(AppError::LoginRequired)?;
            let hours = state.config.session_expiration_hours;
            let user = db::run(&state.pool, move |conn| {
                Ok(find_session_user(conn, &token, hours)?)
            })
            .await?;
            user.map(CurrentUser).ok_or(AppError::LoginRequired)
        })
    }
}

// === Credentials ===

pub fn find_user_by_username(conn: &mut SqliteConnection, username: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::username.eq(username))
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub fn authenticate(conn: &mut SqliteConnection, username: &str, password: &str) -> QueryResult<Option<User>> {
    let user = find_user_by_username(conn, username)?;
    Ok(user.filter(|u| verify_password(password, &u.password)))
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// First rule the form breaks, in the order users see them.
pub fn registration_error(conn: &mut SqliteConnection, form: &RegisterForm) -> QueryResult<Option<&'static str>> {
    if !is_valid_username(&form.username) {
        return Ok(Some("Username must be 3-50 characters without spaces or slashes."));
    }
    if find_user_by_username(conn, &form.username)?.is_some() {
        return Ok(Some("Username already exists."));
    }
    let email_taken = users::table
        .filter(users::email.eq(&form.email))
        .count()
        .get_result::<i64>(conn)?
        > 0;
    if email_taken {
        return Ok(Some("Email already registered."));
    }
    if !is_valid_email(&form.email) {
        return Ok(Some("Invalid email format."));
    }
    if !is_valid_password(&form.password) {
        return Ok(Some(
            "Password must be at least 8 characters long and contain both letters and numbers.",
        ));
    }
    if form.first_name.chars().count() > MAX_NAME_LENGTH || form.last_name.chars().count() > MAX_NAME_LENGTH {
        return Ok(Some("Names must be at most 100 characters."));
    }
    Ok(None)
}

pub fn create_user(conn: &mut SqliteConnection, form: &RegisterForm) -> Result<User, AppError> {
    let password = hash_password(&form.password)?;
    Ok(insert_user(conn, form, &password)?)
}

/// Stores `form` with an already hashed password.
pub fn insert_user(conn: &mut SqliteConnection, form: &RegisterForm, password_hash: &str) -> QueryResult<User> {
    let first_name = sanitize_text(&form.first_name);
    let last_name = sanitize_text(&form.last_name);
    diesel::insert_into(users::table)
        .values(&NewUser {
            username: &form.username,
            email: &form.email,
            password: password_hash,
            first_name: &first_name,
            last_name: &last_name,
        })
        .returning(User::as_returning())
        .get_result(conn)
}

// === HTTP Handlers ===

pub async fn index() -> HttpResponse {
    redirect("/login")
}

pub async fn login_form(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Ok(render_login(&req)?)
}

pub async fn login_user(state: web::Data<AppState>, form: web::Form<LoginForm>) -> Result<HttpResponse, AppError> {
    let LoginForm { username, password } = form.into_inner();
    let attempted = username.clone();
    let hours = state.config.session_expiration_hours;

    let logged_in = db::run(&state.pool, move |conn| {
        match authenticate(conn, &username, &password)? {
            Some(user) => {
                let pruned = prune_expired_sessions(conn, hours)?;
                if pruned > 0 {
                    tracing::debug!(pruned, "removed expired sessions");
                }
                let token = create_session(conn, user.id)?;
                Ok(Some((user, token)))
            }
            None => Ok(None),
        }
    })
    .await?;

    match logged_in {
        Some((user, token)) => {
            tracing::info!(user_id = user.id, "user logged in");
            Ok(HttpResponse::Found()
                .insert_header((header::LOCATION, "/feed"))
                .cookie(session_cookie(token, state.config.secure_cookies))
                .finish())
        }
        None => {
            tracing::warn!(username = %attempted, "failed login attempt");
            Ok(redirect_with(
                "/login",
                FlashCategory::Danger,
                "Login Unsuccessful. Please check username and password",
            ))
        }
    }
}

pub async fn register_form(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Ok(render_register(&req)?)
}

pub async fn register_user(state: web::Data<AppState>, form: web::Form<RegisterForm>) -> Result<HttpResponse, AppError> {
    let mut form = form.into_inner();
    form.username = form.username.trim().to_string();
    form.email = form.email.trim().to_string();

    // Uniqueness checks and the insert run under one write lock.
    let outcome = db::run(&state.pool, move |conn| {
        let password_hash = hash_password(&form.password)?;
        conn.immediate_transaction::<_, AppError, _>(|conn| {
            if let Some(message) = registration_error(conn, &form)? {
                return Ok(Err(message));
            }
            Ok(Ok(insert_user(conn, &form, &password_hash)?))
        })
    })
    .await?;

    match outcome {
        Ok(user) => {
            tracing::info!(user_id = user.id, username = %user.username, "registered new user");
            Ok(redirect_with(
                "/login",
                FlashCategory::Success,
                "Your account has been created! You are now able to log in",
            ))
        }
        Err(message) => Ok(redirect_with("/register", FlashCategory::Danger, message)),
    }
}

pub async fn logout_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: CurrentUser,
) -> Result<HttpResponse, AppError> {
    if let Some(token) = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()) {
        db::run(&state.pool, move |conn| Ok(delete_session(conn, &token)?)).await?;
    }
    tracing::info!(user_id = user.0.id, "user logged out");

    let mut removal = session_cookie(String::new(), state.config.secure_cookies);
    removal.make_removal();
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, "/login"))
        .cookie(removal)
        .finish())
}
