// /secretaria/usuarios - admin-only account management

use axum::{
    extract::{Path, State},
    response::{Html, Response},
    Extension, Form,
};
use minijinja::context;
use serde::Deserialize;
use tracing::{info, warn};

use super::{form_result, parse_optional_id};
use crate::auth;
use crate::entities::{member, user, AccessLevel, NewUser};
use crate::error::{Error, Result};
use crate::web::{
    flash::{self, Flash},
    guard::RequestContext,
    AppState,
};

const LIST_PATH: &str = "/secretaria/usuarios";

fn level_options() -> Vec<(u8, &'static str)> {
    AccessLevel::ALL.iter().map(|l| (l.value(), l.label())).collect()
}

pub async fn list(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    let (users, members) = {
        let conn = state.db()?;
        (user::list(&conn)?, member::list(&conn)?)
    };
    state.templates.render(
        &ctx,
        "usuarios/lista.html",
        context! { users, members, levels => level_options() },
    )
}

pub async fn new_form(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    let members = member::list(&*state.db()?)?;
    state.templates.render(
        &ctx,
        "usuarios/form.html",
        context! { members, levels => level_options() },
    )
}

#[derive(Debug, Deserialize)]
pub struct NewUserForm {
    pub nome: String,
    pub email: String,
    pub senha: String,
    pub nivel_acesso: String,
    #[serde(default)]
    pub membro_id: Option<String>,
}

pub async fn create(State(state): State<AppState>, Form(form): Form<NewUserForm>) -> Result<Response> {
    let result = (|| -> Result<Response> {
        if form.nome.trim().is_empty() {
            return Err(Error::validation("O nome é obrigatório."));
        }
        let level: i64 = form
            .nivel_acesso
            .trim()
            .parse()
            .map_err(|_| Error::validation("Nível de acesso inválido."))?;
        let new_user = NewUser {
            name: form.nome.trim().to_string(),
            email: form.email.clone(),
            password_hash: auth::hash_password(&form.senha)?,
            access_level: AccessLevel::new(level)?,
            member_id: parse_optional_id(form.membro_id.as_deref())?,
        };
        let id = user::insert(&*state.db()?, &new_user)?;
        info!(user_id = id, level, "user created");
        Ok(flash::redirect(
            LIST_PATH,
            Flash::success(format!("Usuário {} criado!", new_user.name)),
        ))
    })();
    form_result(result, "/secretaria/usuarios/novo")
}

#[derive(Debug, Deserialize)]
pub struct LinkForm {
    #[serde(default)]
    pub membro_id: Option<String>,
}

/// A blank member id unlinks
pub async fn link(State(state): State<AppState>, Path(id): Path<i64>, Form(form): Form<LinkForm>) -> Result<Response> {
    let result = (|| -> Result<Response> {
        let member_id = parse_optional_id(form.membro_id.as_deref())?;
        user::link_member(&*state.db()?, id, member_id)?;
        let message = match member_id {
            Some(_) => "Usuário vinculado ao membro.",
            None => "Vínculo removido.",
        };
        Ok(flash::redirect(LIST_PATH, Flash::success(message)))
    })();
    form_result(result, LIST_PATH)
}

/// Refuses self-deletion and removing the last admin
pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<i64>,
) -> Result<Response> {
    let current = ctx.user()?;
    let result = (|| -> Result<Response> {
        if current.id == id {
            return Err(Error::Conflict("Você não pode excluir o próprio usuário.".to_string()));
        }
        let conn = state.db()?;
        let target = user::get(&conn, id)?.ok_or(Error::NotFound { resource: "Usuário", id })?;
        if target.access_level.is_admin() && user::count_admins(&conn)? <= 1 {
            return Err(Error::Conflict("Não é possível excluir o último administrador.".to_string()));
        }
        user::delete(&conn, id)?;
        warn!(user_id = id, deleted_by = current.id, "user deleted");
        Ok(flash::redirect(
            LIST_PATH,
            Flash::success(format!("Usuário {} excluído.", target.name)),
        ))
    })();
    form_result(result, LIST_PATH)
}
