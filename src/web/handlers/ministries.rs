// /secretaria/ministerios

use axum::{
    extract::{Path, State},
    response::{Html, Response},
    Extension, Form,
};
use minijinja::context;
use serde::Deserialize;

use super::form_result;
use crate::entities::{ministry, MinistryInput};
use crate::error::Result;
use crate::web::{
    flash::{self, Flash},
    guard::RequestContext,
    AppState,
};

const LIST_PATH: &str = "/secretaria/ministerios";

#[derive(Debug, Deserialize)]
pub struct MinistryForm {
    pub nome: String,
    #[serde(default)]
    pub lider: String,
    #[serde(default)]
    pub descricao: String,
}

impl From<MinistryForm> for MinistryInput {
    fn from(form: MinistryForm) -> Self {
        MinistryInput {
            name: form.nome,
            leader: form.lider.trim().to_string(),
            description: form.descricao.trim().to_string(),
        }
    }
}

pub async fn list(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    let ministries = ministry::list(&*state.db()?)?;
    state
        .templates
        .render(&ctx, "ministerios/lista.html", context! { ministries })
}

pub async fn new_form(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    state.templates.render(&ctx, "ministerios/form.html", context! {})
}

pub async fn edit_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<i64>,
) -> Result<Html<String>> {
    let ministry = ministry::require(&*state.db()?, id)?;
    state
        .templates
        .render(&ctx, "ministerios/form.html", context! { ministry })
}

pub async fn create(State(state): State<AppState>, Form(form): Form<MinistryForm>) -> Result<Response> {
    let input = MinistryInput::from(form);
    let result = ministry::insert(&*state.db()?, &input).map(|_| {
        flash::redirect(
            LIST_PATH,
            Flash::success(format!("Ministério {} criado!", input.name.trim())),
        )
    });
    form_result(result, "/secretaria/ministerios/novo")
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<MinistryForm>,
) -> Result<Response> {
    let result = ministry::update(&*state.db()?, id, &form.into())
        .map(|_| flash::redirect(LIST_PATH, Flash::success("Ministério atualizado!")));
    form_result(result, &format!("/secretaria/ministerios/editar/{id}"))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    let result = ministry::delete(&*state.db()?, id)
        .map(|_| flash::redirect(LIST_PATH, Flash::success("Ministério excluído.")));
    form_result(result, LIST_PATH)
}
