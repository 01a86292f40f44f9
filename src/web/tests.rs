// Router-level tests: guard, login flow and the main finance pages

use super::*;
use crate::auth;
use crate::db::test_connection;
use crate::entities::{
    member, transaction, user, AccessLevel, MemberInput, NewUser, PaymentMethod, TransactionInput, TransactionKind,
};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use chrono::NaiveDate;
use tempfile::TempDir;
use tower::ServiceExt;

struct NullSender(Channel);

#[async_trait]
impl MessageSender for NullSender {
    fn channel(&self) -> Channel {
        self.0
    }

    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<()> {
        Ok(())
    }
}

struct FakePdf;

#[async_trait]
impl PdfRenderer for FakePdf {
    async fn render(&self, html: &str) -> Result<Vec<u8>> {
        Ok(format!("%PDF-fake\n{html}").into_bytes())
    }
}

const PASSWORD: &str = "segredo123";

struct TestApp {
    state: AppState,
    _uploads: TempDir,
    member_id: i64,
}

impl TestApp {
    fn new() -> Self {
        let uploads = TempDir::new().unwrap();
        let config = AppConfig {
            uploads_dir: uploads.path().to_path_buf(),
            ..AppConfig::default()
        };
        let conn = test_connection();

        let member_id = member::insert(&conn, &MemberInput::named("Maria Souza")).unwrap();
        let hash = auth::hash_password(PASSWORD).unwrap();
        for (name, email, level, linked) in [
            ("Admin", "admin@paroquia.local", AccessLevel::ADMIN, None),
            ("Visitante", "viewer@paroquia.local", AccessLevel::VIEWER, Some(member_id)),
            ("Sem vínculo", "solto@paroquia.local", AccessLevel::MEMBER, None),
        ] {
            user::insert(
                &conn,
                &NewUser {
                    name: name.to_string(),
                    email: email.to_string(),
                    password_hash: hash.clone(),
                    access_level: level,
                    member_id: linked,
                },
            )
            .unwrap();
        }

        let march = |day| NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        for (kind, amount, member, day) in [
            (TransactionKind::Tithe, 200.0, Some(member_id), 5),
            (TransactionKind::Offering, 100.0, None, 9),
            (TransactionKind::Expense, 120.5, None, 12),
        ] {
            transaction::insert(
                &conn,
                &TransactionInput {
                    kind,
                    category: kind.label().to_string(),
                    amount,
                    method: PaymentMethod::Pix,
                    date: march(day),
                    member_id: member,
                    recurring: false,
                },
            )
            .unwrap();
        }

        let state = AppState::with_adapters(
            conn,
            config,
            Arc::new(NullSender(Channel::Email)),
            Arc::new(NullSender(Channel::Sms)),
            Arc::new(FakePdf),
        )
        .unwrap();

        Self {
            state,
            _uploads: uploads,
            member_id,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        router(self.state.clone()).oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    /// `fields` are text parts; `file` is (field, filename, bytes)
    async fn post_multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        file: (&str, &str, &[u8]),
        cookie: &str,
    ) -> Response {
        const BOUNDARY: &str = "parish-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                    .as_bytes(),
            );
        }
        let (name, filename, bytes) = file;
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                 Content-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .header(header::COOKIE, cookie)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    fn uploaded_files(&self) -> usize {
        std::fs::read_dir(&self.state.config.uploads_dir).unwrap().count()
    }

    /// Logs in and returns the `session=...` cookie pair
    async fn login(&self, email: &str) -> String {
        let body = format!("email={}&senha={PASSWORD}", email.replace('@', "%40"));
        let response = self.post_form("/login", &body, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("session cookie")
    }
}

fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[tokio::test]
async fn test_public_pages_are_open() {
    let app = TestApp::new();
    for uri in ["/", "/eventos", "/ministerios", "/sobre", "/contato", "/login"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let response = app.get("/api/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], "OK");
}

#[tokio::test]
async fn test_anonymous_redirected_to_login() {
    let app = TestApp::new();
    for uri in ["/secretaria", "/membros", "/financeiro", "/minha-conta"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/login", "{uri}");
    }

    let api = app.get("/api/financeiro/resumo", None).await;
    assert_eq!(api.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bad_password_rejected() {
    let app = TestApp::new();
    let response = app
        .post_form("/login", "email=admin%40paroquia.local&senha=errada", None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_admin_login_reaches_dashboard() {
    let app = TestApp::new();
    let cookie = app.login("admin@paroquia.local").await;

    let response = app.get("/secretaria", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Secretaria"));

    let users = app.get("/secretaria/usuarios", Some(&cookie)).await;
    assert_eq!(users.status(), StatusCode::OK);

    let logout = app.get("/logout", Some(&cookie)).await;
    assert_eq!(location(&logout), "/");
    let after = app.get("/secretaria", Some(&cookie)).await;
    assert_eq!(location(&after), "/login");
}

#[tokio::test]
async fn test_viewer_denied_office_routes() {
    let app = TestApp::new();
    let cookie = app.login("viewer@paroquia.local").await;

    for uri in ["/secretaria", "/membros", "/financeiro/custos"] {
        let response = app.get(uri, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/financeiro", "{uri}");
    }

    let post = app
        .post_form(
            "/financeiro",
            "data=2025-03-20&tipo=oferta&categoria=x&valor=10&metodo=pix",
            Some(&cookie),
        )
        .await;
    assert_eq!(location(&post), "/financeiro");
    let (income, _) = transaction::lifetime_totals(&*app.state.db().unwrap()).unwrap();
    assert_eq!(income, 300.0);
}

#[tokio::test]
async fn test_viewer_sees_own_statement_only() {
    let app = TestApp::new();
    let cookie = app.login("viewer@paroquia.local").await;

    let response = app.get("/financeiro?mes=2025-03", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("R$ 200,00"));
    assert!(!html.contains("R$ 120,50"));

    // exports ignore membro_id and stay pinned to the linked member
    let pdf = app.get("/exportar/pdf?mes=2025-03&membro_id=999", Some(&cookie)).await;
    assert_eq!(pdf.status(), StatusCode::OK);
    let body = body_text(pdf).await;
    assert!(body.contains("Maria Souza"));
    assert!(body.contains("R$ 200,00"));
    assert!(!body.contains("R$ 120,50"));

    let api = app.get("/api/financeiro/resumo?mes=2025-03", Some(&cookie)).await;
    assert_eq!(api.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unlinked_member_sent_home() {
    let app = TestApp::new();
    let cookie = app.login("solto@paroquia.local").await;
    let response = app.get("/financeiro", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_finance_summary_api() {
    let app = TestApp::new();
    let cookie = app.login("admin@paroquia.local").await;

    let response = app.get("/api/financeiro/resumo?mes=2025-03", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["resumo"]["mes"], "2025-03");
    assert_eq!(json["data"]["resumo"]["entradas"], 300.0);
    assert_eq!(json["data"]["resumo"]["saidas"], 120.5);
    assert_eq!(json["data"]["grafico"].as_array().unwrap().len(), 12);

    let bad = app.get("/api/financeiro/resumo?mes=2025-3", Some(&cookie)).await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_transaction_returns_to_viewed_month() {
    let app = TestApp::new();
    let cookie = app.login("admin@paroquia.local").await;

    let response = app
        .post_form(
            "/financeiro",
            "data=2025-04-02&tipo=doacao&categoria=Campanha&valor=50%2C25&metodo=dinheiro&mes=2025-03",
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/financeiro?mes=2025-03");

    let (income, _) = transaction::lifetime_totals(&*app.state.db().unwrap()).unwrap();
    assert_eq!(income, 350.25);

    // no viewed month: land on the transaction's month
    let unviewed = app
        .post_form(
            "/financeiro",
            "data=2025-04-10&tipo=oferta&categoria=Missa&valor=10&metodo=pix",
            Some(&cookie),
        )
        .await;
    assert_eq!(location(&unviewed), "/financeiro?mes=2025-04");

    let invalid = app
        .post_form(
            "/financeiro",
            "data=2025-04-02&tipo=doacao&categoria=Campanha&valor=0&metodo=dinheiro&mes=2025-03",
            Some(&cookie),
        )
        .await;
    assert_eq!(location(&invalid), "/financeiro?mes=2025-03");
}

#[tokio::test]
async fn test_pdf_export_headers() {
    let app = TestApp::new();
    let cookie = app.login("admin@paroquia.local").await;

    let response = app.get("/exportar/pdf?mes=2025-03", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("financeiro_2025-03.pdf"));
    assert!(body_text(response).await.starts_with("%PDF-fake"));
}

#[tokio::test]
async fn test_spreadsheet_export_is_xlsx() {
    let app = TestApp::new();
    let cookie = app.login("admin@paroquia.local").await;

    let response = app.get("/exportar/excel?mes=2025-03", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("financeiro_2025-03.xlsx"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let app = TestApp::new();
    let cookie = app.login("admin@paroquia.local").await;
    let admin_id = user::find_by_email(&*app.state.db().unwrap(), "admin@paroquia.local")
        .unwrap()
        .unwrap()
        .id;

    let response = app
        .post_form(&format!("/secretaria/usuarios/excluir/{admin_id}"), "", Some(&cookie))
        .await;
    assert_eq!(location(&response), "/secretaria/usuarios");
    assert!(user::get(&*app.state.db().unwrap(), admin_id).unwrap().is_some());
}

#[tokio::test]
async fn test_account_page_shows_linked_member() {
    let app = TestApp::new();
    let cookie = app.login("viewer@paroquia.local").await;
    let response = app.get("/minha-conta", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Maria Souza"));
    assert!(member::get(&*app.state.db().unwrap(), app.member_id).unwrap().is_some());
}

#[tokio::test]
async fn test_rejected_member_form_keeps_no_photo() {
    let app = TestApp::new();
    let cookie = app.login("admin@paroquia.local").await;
    let photo: &[u8] = b"\x89PNG fake";

    let blank_name = app
        .post_multipart("/membros/novo", &[("nome", "")], ("foto", "joao.png", photo), &cookie)
        .await;
    assert_eq!(location(&blank_name), "/membros/novo");
    let bad_children = app
        .post_multipart(
            "/membros/novo",
            &[("nome", "João"), ("filhos", "dois")],
            ("foto", "joao.png", photo),
            &cookie,
        )
        .await;
    assert_eq!(location(&bad_children), "/membros/novo");
    assert_eq!(app.uploaded_files(), 0);

    let accepted = app
        .post_multipart("/membros/novo", &[("nome", "João")], ("foto", "joao.png", photo), &cookie)
        .await;
    assert_eq!(accepted.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.uploaded_files(), 1);
}
