// Public site: home, events, ministries, about, contact

use axum::{extract::State, response::Html, Extension};
use chrono::Local;
use minijinja::context;

use crate::entities::{event, ministry};
use crate::error::Result;
use crate::web::{guard::RequestContext, AppState};

const HOME_EVENTS: u32 = 3;

pub async fn index(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    let (events, ministries) = {
        let conn = state.db()?;
        (
            event::list_upcoming(&conn, Local::now().date_naive(), HOME_EVENTS)?,
            ministry::list(&conn)?,
        )
    };
    state
        .templates
        .render(&ctx, "publico/index.html", context! { events, ministries })
}

pub async fn events(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    let events = event::list_latest(&*state.db()?, None)?;
    state.templates.render(&ctx, "publico/eventos.html", context! { events })
}

pub async fn ministries(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Html<String>> {
    let ministries = ministry::list(&*state.db()?)?;
    state
        .templates
        .render(&ctx, "publico/ministerios.html", context! { ministries })
}

pub async fn about(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    state.templates.render(&ctx, "publico/sobre.html", context! {})
}

pub async fn contact(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    state.templates.render(&ctx, "publico/contato.html", context! {})
}
