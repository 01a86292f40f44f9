// 🖼️ Uploads - member photos and event images
//
// Files land in the configured uploads directory under a sanitized name.
// Same name overwrites (last write wins).

use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Keep ASCII letters, digits, `.`, `-` and `_`; whitespace becomes `_`.
/// Leading dots and underscores are dropped so the result can never be
/// `..`, hidden, or contain a path separator.
pub fn sanitize_filename(name: &str) -> String {
    // Browsers on Windows may send a full path
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();

    cleaned.trim_start_matches(['.', '_']).to_string()
}

pub fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn is_allowed_image(name: &str) -> bool {
    extension(name).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Validate and write an uploaded image; returns the stored filename
pub fn save_image(uploads_dir: &Path, original_name: &str, bytes: &[u8]) -> Result<String> {
    let filename = sanitize_filename(original_name);
    if filename.is_empty() || !is_allowed_image(&filename) {
        return Err(Error::validation(format!(
            "Arquivo não permitido: {original_name} (use {})",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    std::fs::create_dir_all(uploads_dir)?;
    std::fs::write(uploads_dir.join(&filename), bytes)?;
    info!(file = %filename, size = bytes.len(), "upload saved");
    Ok(filename)
}
