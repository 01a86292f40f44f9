// /secretaria/eventos - events with an optional cover image

use axum::{
    extract::{Multipart, Path, State},
    response::{Html, Response},
    Extension,
};
use minijinja::context;
use tracing::info;

use super::{form_result, parse_date, MultipartForm};
use crate::entities::{event, EventInput};
use crate::error::Result;
use crate::uploads;
use crate::web::{
    flash::{self, Flash},
    guard::RequestContext,
    AppState,
};

const LIST_PATH: &str = "/secretaria/eventos";

pub async fn list(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    let events = event::list_latest(&*state.db()?, None)?;
    state.templates.render(&ctx, "eventos/lista.html", context! { events })
}

pub async fn new_form(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    state.templates.render(&ctx, "eventos/form.html", context! {})
}

pub async fn edit_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<i64>,
) -> Result<Html<String>> {
    let event = event::require(&*state.db()?, id)?;
    state.templates.render(&ctx, "eventos/form.html", context! { event })
}

fn event_input(state: &AppState, form: &MultipartForm) -> Result<EventInput> {
    let date = parse_date(form.text("data"), "data do evento")?;
    let image = form
        .file("imagem")
        .map(|file| uploads::save_image(&state.config.uploads_dir, &file.filename, &file.bytes))
        .transpose()?;
    let input = EventInput {
        title: form.text("titulo").to_string(),
        description: form.text("descricao").to_string(),
        date,
        image,
    };
    input.validate()?;
    Ok(input)
}

pub async fn create(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let form = MultipartForm::read(multipart).await?;
    let result = event_input(&state, &form).and_then(|input| {
        let id = event::insert(&*state.db()?, &input)?;
        info!(event_id = id, "event created");
        Ok(flash::redirect(LIST_PATH, Flash::success("Evento criado com sucesso!")))
    });
    form_result(result, "/secretaria/eventos/novo")
}

pub async fn update(State(state): State<AppState>, Path(id): Path<i64>, multipart: Multipart) -> Result<Response> {
    let form = MultipartForm::read(multipart).await?;
    let result = event_input(&state, &form).and_then(|input| {
        event::update(&*state.db()?, id, &input)?;
        Ok(flash::redirect(LIST_PATH, Flash::success("Evento atualizado!")))
    });
    form_result(result, &format!("/secretaria/eventos/editar/{id}"))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    let result = event::delete(&*state.db()?, id)
        .map(|_| flash::redirect(LIST_PATH, Flash::success("Evento excluído.")));
    form_result(result, LIST_PATH)
}
