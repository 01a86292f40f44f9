// 🛡️ Authorization middleware
//
// Every request passes through `authorize` once:
//   1. resolve the session cookie to a user
//   2. look the route up in ROUTE_POLICY (first match wins)
//   3. redirect to /login, redirect with "Acesso negado.", or continue
// The resolved user and pending flash are handed to handlers as a
// `RequestContext` extension.

use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::{debug, warn};

use super::flash::{self, Flash};
use super::AppState;
use crate::auth;
use crate::entities::{AccessLevel, User};
use crate::error::{Error, Result};

pub const SESSION_COOKIE: &str = "session";

// ============================================================================
// POLICY TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    /// Access level numerically at or below the ceiling
    MaxLevel(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MethodMatch {
    Any,
    Post,
}

#[derive(Debug)]
struct RouteRule {
    method: MethodMatch,
    prefix: &'static str,
    requirement: Requirement,
}

const fn rule(method: MethodMatch, prefix: &'static str, requirement: Requirement) -> RouteRule {
    RouteRule {
        method,
        prefix,
        requirement,
    }
}

use MethodMatch::{Any, Post};
use Requirement::{Authenticated, MaxLevel, Public};

const ADMIN: Requirement = MaxLevel(1);
const OFFICE: Requirement = MaxLevel(3);

/// Ordered; the trailing "/" rule makes every other page public
const ROUTE_POLICY: &[RouteRule] = &[
    rule(Any, "/static", Public),
    rule(Any, "/uploads", Public),
    rule(Any, "/api/health", Public),
    rule(Any, "/login", Public),
    rule(Any, "/logout", Public),
    // office
    rule(Any, "/secretaria/usuarios", ADMIN),
    rule(Any, "/secretaria", OFFICE),
    rule(Any, "/membros", OFFICE),
    // finance management
    rule(Any, "/financeiro/editar", OFFICE),
    rule(Any, "/financeiro/excluir", OFFICE),
    rule(Any, "/financeiro/configuracao", OFFICE),
    rule(Any, "/financeiro/custos", OFFICE),
    rule(Post, "/financeiro", OFFICE),
    // finance read + self-service (levels 4-5 see only their own records)
    rule(Any, "/financeiro", Authenticated),
    rule(Any, "/exportar", Authenticated),
    rule(Any, "/api/financeiro", Authenticated),
    rule(Any, "/minha-conta", Authenticated),
    rule(Any, "/", Public),
];

fn prefix_matches(prefix: &str, path: &str) -> bool {
    prefix == "/"
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn requirement_for(method: &Method, path: &str) -> Requirement {
    ROUTE_POLICY
        .iter()
        .find(|rule| {
            (rule.method == Any || (rule.method == Post && *method == Method::POST))
                && prefix_matches(rule.prefix, path)
        })
        .map(|rule| rule.requirement)
        .unwrap_or(Authenticated)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Login,
    Deny,
}

pub fn decide(requirement: Requirement, user: Option<&CurrentUser>) -> Decision {
    match (requirement, user) {
        (Public, _) => Decision::Allow,
        (_, None) => Decision::Login,
        (Authenticated, Some(_)) => Decision::Allow,
        (MaxLevel(ceiling), Some(user)) if user.level.allows(ceiling) => Decision::Allow,
        (MaxLevel(_), Some(_)) => Decision::Deny,
    }
}

// ============================================================================
// REQUEST CONTEXT
// ============================================================================

/// The logged-in user as seen by handlers and templates
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub level: AccessLevel,
    pub member_id: Option<i64>,
    pub is_admin: bool,
    pub is_office: bool,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            level: user.access_level,
            member_id: user.member_id,
            is_admin: user.access_level.is_admin(),
            is_office: user.access_level.is_office(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestContext {
    pub user: Option<CurrentUser>,
    pub flash: Option<Flash>,
}

impl RequestContext {
    /// The guard already rejected anonymous requests on protected routes
    pub fn user(&self) -> Result<&CurrentUser> {
        self.user.as_ref().ok_or(Error::Unauthenticated)
    }
}

// ============================================================================
// MIDDLEWARE
// ============================================================================

fn current_user(state: &AppState, jar: &CookieJar) -> Result<Option<CurrentUser>> {
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
        return Ok(None);
    };
    let conn = state.db()?;
    let user = auth::resolve_session(&conn, &state.config.server.secret_key, &token)?;
    Ok(user.map(CurrentUser::from))
}

pub async fn authorize(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let user = match current_user(&state, &jar) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let path = req.uri().path().to_string();
    let requirement = requirement_for(req.method(), &path);

    match decide(requirement, user.as_ref()) {
        Decision::Allow => {}
        Decision::Login if path.starts_with("/api/") => return Error::Unauthenticated.into_response(),
        Decision::Login => {
            debug!(%path, "anonymous request redirected to login");
            return flash::redirect("/login", Flash::info("Faça login para acessar esta página."));
        }
        Decision::Deny => {
            let landing = user.as_ref().map_or("/", |u| u.level.landing_path());
            warn!(%path, user_id = user.as_ref().map(|u| u.id), "access denied");
            if path.starts_with("/api/") {
                return Error::Forbidden.into_response();
            }
            return flash::redirect(landing, Flash::danger("Acesso negado."));
        }
    }

    let pending_flash = flash::read(&jar);
    let had_flash = pending_flash.is_some();
    req.extensions_mut().insert(RequestContext {
        user,
        flash: pending_flash,
    });

    let mut response = next.run(req).await;

    // A rendered page has shown the flash; a redirect carries it forward
    if had_flash
        && !response.status().is_redirection()
        && !response.headers().contains_key(SET_COOKIE)
    {
        if let Some(clear) = flash::clear_header() {
            response.headers_mut().append(SET_COOKIE, clear);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(level: AccessLevel) -> CurrentUser {
        CurrentUser {
            id: 1,
            name: "Teste".to_string(),
            email: "teste@igreja.org".to_string(),
            level,
            member_id: None,
            is_admin: level.is_admin(),
            is_office: level.is_office(),
        }
    }

    #[test]
    fn test_policy_lookup() {
        let get = Method::GET;
        let post = Method::POST;

        assert_eq!(requirement_for(&get, "/"), Public);
        assert_eq!(requirement_for(&get, "/eventos"), Public);
        assert_eq!(requirement_for(&get, "/static/style.css"), Public);
        assert_eq!(requirement_for(&get, "/secretaria"), OFFICE);
        assert_eq!(requirement_for(&get, "/secretaria/eventos/novo"), OFFICE);
        assert_eq!(requirement_for(&post, "/secretaria/usuarios/excluir/3"), ADMIN);
        assert_eq!(requirement_for(&get, "/membros/editar/2"), OFFICE);
        assert_eq!(requirement_for(&get, "/financeiro"), Authenticated);
        assert_eq!(requirement_for(&post, "/financeiro"), OFFICE);
        assert_eq!(requirement_for(&get, "/financeiro/custos"), OFFICE);
        assert_eq!(requirement_for(&get, "/exportar/pdf"), Authenticated);
        assert_eq!(requirement_for(&get, "/minha-conta"), Authenticated);
        // segment-aware prefixes
        assert_eq!(requirement_for(&get, "/membrosx"), Public);
    }

    #[test]
    fn test_decisions_by_level() {
        let admin = user(AccessLevel::ADMIN);
        let finance = user(AccessLevel::FINANCE);
        let viewer = user(AccessLevel::VIEWER);

        assert_eq!(decide(Public, None), Decision::Allow);
        assert_eq!(decide(Authenticated, None), Decision::Login);
        assert_eq!(decide(OFFICE, None), Decision::Login);

        assert_eq!(decide(ADMIN, Some(&admin)), Decision::Allow);
        assert_eq!(decide(ADMIN, Some(&finance)), Decision::Deny);
        assert_eq!(decide(OFFICE, Some(&finance)), Decision::Allow);
        assert_eq!(decide(OFFICE, Some(&viewer)), Decision::Deny);
        assert_eq!(decide(Authenticated, Some(&viewer)), Decision::Allow);
    }
}
