// One-shot flash message carried in the `flash` cookie as a urlencoded
// `category|message`. Set on redirect, shown and cleared by the next page.

use axum::http::HeaderValue;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Success,
    Danger,
    Warning,
    Info,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Success => "success",
            Category::Danger => "danger",
            Category::Warning => "warning",
            Category::Info => "info",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Category::Success),
            "danger" => Some(Category::Danger),
            "warning" => Some(Category::Warning),
            "info" => Some(Category::Info),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub category: Category,
    pub message: String,
}

impl Flash {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Category::Success, message)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(Category::Danger, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Category::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Category::Info, message)
    }

    pub fn encode(&self) -> String {
        urlencoding::encode(&format!("{}|{}", self.category.as_str(), self.message)).into_owned()
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let decoded = urlencoding::decode(raw).ok()?;
        let (category, message) = decoded.split_once('|')?;
        Some(Self::new(Category::parse(category)?, message))
    }
}

pub fn read(jar: &CookieJar) -> Option<Flash> {
    jar.get(FLASH_COOKIE).and_then(|cookie| Flash::decode(cookie.value()))
}

fn cookie(value: String) -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn set(jar: CookieJar, flash: &Flash) -> CookieJar {
    jar.add(cookie(flash.encode()))
}

/// `Set-Cookie` value that deletes the flash cookie
pub fn clear_header() -> Option<HeaderValue> {
    let mut removal = cookie(String::new());
    removal.make_removal();
    HeaderValue::from_str(&removal.to_string()).ok()
}

/// 303 to `to` carrying `flash`
pub fn redirect(to: &str, flash: Flash) -> Response {
    (set(CookieJar::new(), &flash), Redirect::to(to)).into_response()
}
