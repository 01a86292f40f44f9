// /secretaria/agenda - office appointments

use axum::{
    extract::{Path, State},
    response::{Html, Response},
    Extension, Form,
};
use minijinja::context;
use serde::Deserialize;

use super::{form_result, parse_date};
use crate::entities::{appointment, AppointmentInput};
use crate::error::Result;
use crate::web::{
    flash::{self, Flash},
    guard::RequestContext,
    AppState,
};

const LIST_PATH: &str = "/secretaria/agenda";

#[derive(Debug, Deserialize)]
pub struct AppointmentForm {
    pub titulo: String,
    #[serde(default)]
    pub descricao: String,
    pub data: String,
    #[serde(default)]
    pub hora: String,
    #[serde(default)]
    pub local: String,
}

impl AppointmentForm {
    fn into_input(self) -> Result<AppointmentInput> {
        let hora = self.hora.trim();
        Ok(AppointmentInput {
            date: parse_date(&self.data, "data do compromisso")?,
            time: (!hora.is_empty()).then(|| hora.to_string()),
            title: self.titulo,
            notes: self.descricao.trim().to_string(),
            location: self.local.trim().to_string(),
        })
    }
}

pub async fn list(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    let appointments = appointment::list(&*state.db()?)?;
    state
        .templates
        .render(&ctx, "agenda/lista.html", context! { appointments })
}

pub async fn new_form(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    state.templates.render(&ctx, "agenda/form.html", context! {})
}

pub async fn edit_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<i64>,
) -> Result<Html<String>> {
    let appointment = appointment::require(&*state.db()?, id)?;
    state
        .templates
        .render(&ctx, "agenda/form.html", context! { appointment })
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Form(form): Form<AppointmentForm>,
) -> Result<Response> {
    let created_by = ctx.user.as_ref().map(|u| u.id);
    let result = form.into_input().and_then(|input| {
        appointment::insert(&*state.db()?, &input, created_by)?;
        Ok(flash::redirect(LIST_PATH, Flash::success("Compromisso adicionado à agenda!")))
    });
    form_result(result, "/secretaria/agenda/novo")
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<AppointmentForm>,
) -> Result<Response> {
    let result = form.into_input().and_then(|input| {
        appointment::update(&*state.db()?, id, &input)?;
        Ok(flash::redirect(LIST_PATH, Flash::success("Compromisso atualizado!")))
    });
    form_result(result, &format!("/secretaria/agenda/editar/{id}"))
}

/// Flips the completed flag, so the same button reopens a finished entry
pub async fn complete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    let result = (|| -> Result<Response> {
        let conn = state.db()?;
        let current = appointment::require(&conn, id)?;
        appointment::set_completed(&conn, id, !current.completed)?;
        let message = if current.completed {
            "Compromisso reaberto."
        } else {
            "Compromisso concluído!"
        };
        Ok(flash::redirect(LIST_PATH, Flash::success(message)))
    })();
    form_result(result, LIST_PATH)
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    let result = appointment::delete(&*state.db()?, id)
        .map(|_| flash::redirect(LIST_PATH, Flash::success("Compromisso excluído.")));
    form_result(result, LIST_PATH)
}
