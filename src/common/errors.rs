use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use std::fmt;
use crate::common::flash::{Flash, FlashCategory};
use crate::templates::render_error_page;

#[derive(Debug)]
pub enum AppError {
    /// No valid session; answered with a redirect to the login form.
    LoginRequired,
    BadRequest(String),
    NotFound(String),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::LoginRequired => write!(f, "Login required"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::LoginRequired => StatusCode::FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::LoginRequired => {
                let flash = Flash::new(FlashCategory::Info, "Please log in to access this page.");
                let mut resp = HttpResponse::Found();
                resp.insert_header((header::LOCATION, "/login"));
                if let Some(cookie) = flash.into_cookie() {
                    resp.cookie(cookie);
                }
                resp.finish()
            }
            AppError::BadRequest(msg) => html_error(self.status_code(), msg),
            AppError::NotFound(msg) => html_error(self.status_code(), msg),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "request failed");
                html_error(self.status_code(), "Something went wrong on our side.")
            }
        }
    }
}

fn html_error(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(render_error_page(status, message))
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        AppError::InternalError(format!("database: {}", err))
    }
}

impl From<diesel::r2d2::PoolError> for AppError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        AppError::InternalError(format!("connection pool: {}", err))
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(format!("io: {}", err))
    }
}
