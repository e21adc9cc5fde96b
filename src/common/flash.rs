//! One-shot notifications carried across a redirect in a cookie and consumed
//! by the next rendered page.

use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use crate::config::FLASH_COOKIE;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Danger,
    Info,
}

impl FlashCategory {
    pub fn css_class(&self) -> &'static str {
        match self {
            FlashCategory::Success => "flash-success",
            FlashCategory::Danger => "flash-danger",
            FlashCategory::Info => "flash-info",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
    pub category: FlashCategory,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Flash {
    messages: Vec<FlashMessage>,
}

impl Flash {
    pub fn new(category: FlashCategory, message: impl Into<String>) -> Self {
        Self {
            messages: vec![FlashMessage { category, message: message.into() }],
        }
    }

    pub fn into_cookie(self) -> Option<Cookie<'static>> {
        if self.messages.is_empty() {
            return None;
        }
        let value = encode_messages(&self.messages)?;
        Some(
            Cookie::build(FLASH_COOKIE, value)
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .finish(),
        )
    }
}

fn encode_messages(messages: &[FlashMessage]) -> Option<String> {
    let json = serde_json::to_string(messages).ok()?;
    Some(urlencoding::encode(&json).into_owned())
}

fn decode_messages(raw: &str) -> Vec<FlashMessage> {
    urlencoding::decode(raw)
        .ok()
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}

/// Pending messages for this request; pair with [`removal_cookie`] on the
/// response that shows them.
pub fn pending_messages(req: &HttpRequest) -> Vec<FlashMessage> {
    req.cookie(FLASH_COOKIE)
        .map(|c| decode_messages(c.value()))
        .unwrap_or_default()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(FLASH_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Redirect to `location`, showing `message` on the page it lands on.
pub fn redirect_with(location: &str, category: FlashCategory, message: impl Into<String>) -> HttpResponse {
    let mut resp = HttpResponse::Found();
    resp.insert_header((header::LOCATION, location));
    if let Some(cookie) = Flash::new(category, message).into_cookie() {
        resp.cookie(cookie);
    }
    resp.finish()
}
