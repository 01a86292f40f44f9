// 🌐 Web layer - axum router over the shared application state

pub mod flash;
pub mod guard;
mod handlers;
pub mod templates;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::entities::Channel;
use crate::error::{Error, Result};
use crate::messaging::{EmailSender, MessageSender, SmsSender};
use crate::reports::{PdfRenderer, Wkhtmltopdf};
use templates::Templates;

/// Built once at startup and cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: Arc<AppConfig>,
    pub templates: Arc<Templates>,
    pub email: Arc<dyn MessageSender>,
    pub sms: Arc<dyn MessageSender>,
    pub pdf: Arc<dyn PdfRenderer>,
}

impl AppState {
    /// State with the adapters the configuration asks for
    pub fn new(conn: Connection, config: AppConfig) -> Result<Self> {
        let email = Arc::new(EmailSender::new(&config.messaging.email)?);
        let sms = Arc::new(SmsSender::new(&config.messaging.sms)?);
        let pdf = Arc::new(Wkhtmltopdf::new(config.reports.wkhtmltopdf_path.clone()));
        Self::with_adapters(conn, config, email, sms, pdf)
    }

    pub fn with_adapters(
        conn: Connection,
        config: AppConfig,
        email: Arc<dyn MessageSender>,
        sms: Arc<dyn MessageSender>,
        pdf: Arc<dyn PdfRenderer>,
    ) -> Result<Self> {
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
            templates: Arc::new(Templates::new()?),
            email,
            sms,
            pdf,
        })
    }

    /// Never hold the guard across an `.await`
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| Error::internal("lock database"))
    }

    pub fn sender(&self, channel: Channel) -> Arc<dyn MessageSender> {
        match channel {
            Channel::Email => Arc::clone(&self.email),
            Channel::Sms => Arc::clone(&self.sms),
        }
    }
}

pub fn router(state: AppState) -> Router {
    use handlers::*;

    let api_routes = Router::new()
        .route("/health", get(api::health_check))
        .route("/financeiro/resumo", get(api::finance_summary));

    let office_routes = Router::new()
        .route("/", get(dashboard::dashboard))
        // ministries
        .route("/ministerios", get(ministries::list))
        .route("/ministerios/novo", get(ministries::new_form).post(ministries::create))
        .route("/ministerios/editar/:id", get(ministries::edit_form).post(ministries::update))
        .route("/ministerios/excluir/:id", post(ministries::delete))
        // events
        .route("/eventos", get(events::list))
        .route("/eventos/novo", get(events::new_form).post(events::create))
        .route("/eventos/editar/:id", get(events::edit_form).post(events::update))
        .route("/eventos/excluir/:id", post(events::delete))
        // agenda
        .route("/agenda", get(agenda::list))
        .route("/agenda/novo", get(agenda::new_form).post(agenda::create))
        .route("/agenda/editar/:id", get(agenda::edit_form).post(agenda::update))
        .route("/agenda/concluir/:id", post(agenda::complete))
        .route("/agenda/excluir/:id", post(agenda::delete))
        // messaging
        .route("/enviar_mensagem", get(messaging::compose).post(messaging::send))
        .route("/mensagens", get(messaging::history))
        // users (admin)
        .route("/usuarios", get(users::list))
        .route("/usuarios/novo", get(users::new_form).post(users::create))
        .route("/usuarios/vincular/:id", post(users::link))
        .route("/usuarios/excluir/:id", post(users::delete));

    let member_routes = Router::new()
        .route("/", get(members::list))
        .route("/novo", get(members::new_form).post(members::create))
        .route("/editar/:id", get(members::edit_form).post(members::update))
        .route("/excluir/:id", post(members::delete))
        .route("/importar", get(members::import_form).post(members::import));

    let finance_routes = Router::new()
        .route("/", get(finance::overview).post(finance::register))
        .route("/editar/:id", get(finance::edit_form).post(finance::update))
        .route("/excluir/:id", post(finance::delete))
        .route("/configuracao", get(finance::config_form).post(finance::save_config))
        .route("/custos", get(finance::fixed_costs).post(finance::add_fixed_cost))
        .route("/custos/alternar/:id", post(finance::toggle_fixed_cost))
        .route("/custos/excluir/:id", post(finance::delete_fixed_cost));

    Router::new()
        .route("/", get(public::index))
        .route("/eventos", get(public::events))
        .route("/ministerios", get(public::ministries))
        .route("/sobre", get(public::about))
        .route("/contato", get(public::contact))
        .route("/login", get(session::login_form).post(session::login))
        .route("/logout", get(session::logout))
        .route("/minha-conta", get(account::my_account))
        .route("/exportar/pdf", get(exports::pdf))
        .route("/exportar/excel", get(exports::spreadsheet))
        .nest("/secretaria", office_routes)
        .nest("/membros", member_routes)
        .nest("/financeiro", finance_routes)
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new("static"))
        .nest_service("/uploads", ServeDir::new(&state.config.uploads_dir))
        .layer(middleware::from_fn_with_state(state.clone(), guard::authorize))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
