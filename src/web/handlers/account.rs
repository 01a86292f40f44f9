// /minha-conta - the logged-in user and their linked member record

use axum::{extract::State, response::Html, Extension};
use minijinja::context;

use crate::entities::member;
use crate::error::Result;
use crate::web::{guard::RequestContext, AppState};

pub async fn my_account(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    let user = ctx.user()?;
    let member = match user.member_id {
        Some(id) => member::get(&*state.db()?, id)?,
        None => None,
    };
    state.templates.render(
        &ctx,
        "conta/minha_conta.html",
        context! { member, level_label => user.level.label() },
    )
}
