// Error model shared by the library, the CLI and the web layer.
//
// Library code returns `error::Result<T>`; binaries wrap it in `anyhow`.

use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Input rejected before touching storage (bad month, empty name, ...)
    #[error("{0}")]
    Validation(String),

    /// Requested row does not exist
    #[error("{resource} {id} não encontrado")]
    NotFound { resource: &'static str, id: i64 },

    /// Unique constraint or business-rule conflict
    #[error("{0}")]
    Conflict(String),

    /// Request needs a logged-in user
    #[error("Not authenticated")]
    Unauthenticated,

    /// Logged-in user lacks the access level for the route
    #[error("Access denied")]
    Forbidden,

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Template(#[from] minijinja::Error),

    /// Outbound adapter failure (SMTP, SMS gateway, PDF renderer)
    #[error("{service}: {message}")]
    External { service: &'static str, message: String },

    /// Generic internal failure
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn internal(operation: impl Into<String>) -> Self {
        Error::Internal {
            operation: operation.into(),
        }
    }

    /// True when the underlying SQLite error is a UNIQUE/constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::Database(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }

    /// Errors a form submission reports back as a flash message
    pub fn is_form_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Conflict(_) | Error::NotFound { .. } | Error::Csv(_)
        )
    }

    /// Message safe to show to an office user
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(message) | Error::Conflict(message) => message.clone(),
            Error::NotFound { .. } => self.to_string(),
            Error::Unauthenticated => "Faça login para acessar esta página.".to_string(),
            Error::Forbidden => "Acesso negado.".to_string(),
            Error::External { service, .. } => format!("Falha no serviço externo ({service})."),
            Error::Database(_)
            | Error::Csv(_)
            | Error::Io(_)
            | Error::Template(_)
            | Error::Internal { .. }
            | Error::Other(_) => "Erro interno do servidor.".to_string(),
        }
    }
}

#[cfg(feature = "server")]
mod http {
    use super::Error;
    use axum::{
        http::StatusCode,
        response::{Html, IntoResponse, Response},
    };

    impl Error {
        pub fn status_code(&self) -> StatusCode {
            match self {
                Error::Validation(_) | Error::Csv(_) => StatusCode::BAD_REQUEST,
                Error::NotFound { .. } => StatusCode::NOT_FOUND,
                Error::Conflict(_) => StatusCode::CONFLICT,
                Error::Unauthenticated => StatusCode::UNAUTHORIZED,
                Error::Forbidden => StatusCode::FORBIDDEN,
                Error::External { .. } => StatusCode::BAD_GATEWAY,
                Error::Database(_)
                | Error::Io(_)
                | Error::Template(_)
                | Error::Internal { .. }
                | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl IntoResponse for Error {
        fn into_response(self) -> Response {
            let status = self.status_code();
            if status.is_server_error() {
                tracing::error!(error = %self, "request failed");
            } else {
                tracing::debug!(error = %self, "request rejected");
            }

            let body = format!(
                "<!doctype html><html lang=\"pt-BR\"><head><meta charset=\"utf-8\"><title>{code}</title>\
                 <link rel=\"stylesheet\" href=\"/static/style.css\"></head><body><main class=\"error\">\
                 <h1>{code}</h1><p>{message}</p><p><a href=\"/\">Voltar ao início</a></p></main></body></html>",
                code = status.as_u16(),
                message = escape_html(&self.user_message()),
            );
            (status, Html(body)).into_response()
        }
    }

    fn escape_html(input: &str) -> String {
        input
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }
}
