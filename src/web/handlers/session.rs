// Login / logout

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Duration;
use minijinja::context;
use serde::Deserialize;
use tokio::task;
use tracing::info;

use crate::auth;
use crate::entities::user;
use crate::error::{Error, Result};
use crate::web::{
    flash::{self, Flash},
    guard::{RequestContext, SESSION_COOKIE},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub senha: String,
}

pub async fn login_form(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Response> {
    if let Some(user) = &ctx.user {
        return Ok(Redirect::to(user.level.landing_path()).into_response());
    }
    Ok(state
        .templates
        .render(&ctx, "auth/login.html", context! {})?
        .into_response())
}

pub async fn login(State(state): State<AppState>, jar: CookieJar, Form(form): Form<LoginForm>) -> Result<Response> {
    let secret = &state.config.server.secret_key;
    let candidate = user::find_by_email(&*state.db()?, &form.email)?;
    let password = form.senha;
    let verified = task::spawn_blocking(move || auth::check_login(candidate, &password))
        .await
        .map_err(|e| Error::internal(format!("password check: {e}")))??;

    let session = match verified {
        Some(user) => {
            let conn = state.db()?;
            let ttl = Duration::hours(state.config.server.session_ttl_hours);
            let token = auth::create_session(&conn, secret, user.id, ttl)?;
            auth::purge_expired_sessions(&conn)?;
            Some((user, token))
        }
        None => None,
    };

    let Some((user, token)) = session else {
        return Ok(flash::redirect("/login", Flash::danger("Credenciais inválidas!")));
    };

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.server.secure_cookies)
        .build();
    let jar = flash::set(jar.add(cookie), &Flash::success(format!("Bem-vindo(a), {}!", user.name)));
    Ok((jar, Redirect::to(user.access_level.landing_path())).into_response())
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Result<Response> {
    if let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        auth::revoke_session(&*state.db()?, &state.config.server.secret_key, &token)?;
        info!("logout");
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    let jar = flash::set(jar, &Flash::info("Você saiu do sistema."));
    Ok((jar, Redirect::to("/")).into_response())
}
