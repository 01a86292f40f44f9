// Request handlers, one module per area of the site
//
// Handlers lock the database only inside synchronous blocks; the guard is
// always dropped before any `.await`.

pub mod account;
pub mod agenda;
pub mod api;
pub mod dashboard;
pub mod events;
pub mod exports;
pub mod finance;
pub mod members;
pub mod messaging;
pub mod ministries;
pub mod public;
pub mod session;
pub mod users;

use axum::body::Bytes;
use axum::extract::Multipart;
use axum::response::Response;
use chrono::NaiveDate;
use std::collections::HashMap;

use super::flash::{self, Flash};
use crate::error::{Error, Result};

/// Form errors become a flash on `back`; anything else propagates
pub(crate) fn form_result(result: Result<Response>, back: &str) -> Result<Response> {
    match result {
        Err(e) if e.is_form_error() => Ok(flash::redirect(back, Flash::danger(e.user_message()))),
        other => other,
    }
}

/// HTML `<input type="date">` value
pub(crate) fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| Error::validation(format!("Data inválida em {field}.")))
}

pub(crate) fn parse_optional_date(value: &str, field: &str) -> Result<Option<NaiveDate>> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        parse_date(value, field).map(Some)
    }
}

pub(crate) fn parse_optional_id(value: Option<&str>) -> Result<Option<i64>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::validation(format!("Identificador inválido: {raw}"))),
    }
}

pub(crate) struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// `multipart/form-data` body split into text fields and files
pub(crate) struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let invalid = |e: axum::extract::multipart::MultipartError| {
            Error::validation(format!("Formulário inválido: {e}"))
        };

        let mut fields = HashMap::new();
        let mut files = HashMap::new();
        while let Some(field) = multipart.next_field().await.map_err(invalid)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field.bytes().await.map_err(invalid)?;
                    if !filename.is_empty() && !bytes.is_empty() {
                        files.insert(name, UploadedFile { filename, bytes });
                    }
                }
                None => {
                    let text = field.text().await.map_err(invalid)?;
                    fields.insert(name, text);
                }
            }
        }
        Ok(Self { fields, files })
    }

    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(|v| v.trim()).unwrap_or_default()
    }

    /// Unchecked checkboxes are not submitted at all
    pub fn checkbox(&self, name: &str) -> bool {
        matches!(self.text(name), "on" | "true" | "1" | "sim")
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }
}
