// /membros - member registry and CSV import

use axum::{
    extract::{Multipart, Path, Query, State},
    response::{Html, IntoResponse, Response},
    Extension,
};
use minijinja::context;
use serde::Deserialize;
use tracing::{info, instrument};

use super::{form_result, parse_optional_date, MultipartForm};
use crate::entities::{member, ministry, MemberInput, MemberStatus};
use crate::error::{Error, Result};
use crate::import;
use crate::uploads;
use crate::web::{
    flash::{self, Flash},
    guard::RequestContext,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[instrument(skip(state, ctx))]
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Html<String>> {
    let q = query.q.unwrap_or_default().trim().to_string();
    let members = {
        let conn = state.db()?;
        if q.is_empty() {
            member::list(&conn)?
        } else {
            member::search(&conn, &q)?
        }
    };
    state
        .templates
        .render(&ctx, "membros/lista.html", context! { members, q })
}

fn render_form(state: &AppState, ctx: &RequestContext, member_id: Option<i64>) -> Result<Html<String>> {
    let (member, ministries) = {
        let conn = state.db()?;
        let member = member_id.map(|id| member::require(&conn, id)).transpose()?;
        (member, ministry::list(&conn)?)
    };
    state.templates.render(
        ctx,
        "membros/form.html",
        context! {
            member,
            ministries,
            statuses => [MemberStatus::Active, MemberStatus::Inactive]
                .iter()
                .map(|s| (s.as_str(), s.label()))
                .collect::<Vec<_>>(),
        },
    )
}

pub async fn new_form(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Result<Html<String>> {
    render_form(&state, &ctx, None)
}

pub async fn edit_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<i64>,
) -> Result<Html<String>> {
    render_form(&state, &ctx, Some(id))
}

/// Form fields -> input; a new photo is saved and referenced only once the
/// rest of the form validates, no photo leaves `photo` as None
fn member_input(state: &AppState, form: &MultipartForm) -> Result<MemberInput> {
    let children = match form.text("filhos") {
        "" => 0,
        raw => raw
            .parse()
            .map_err(|_| Error::validation("Quantidade de filhos inválida."))?,
    };

    let defaults = MemberInput::named(form.text("nome"));
    let or_default = |value: &str, default: String| {
        if value.is_empty() {
            default
        } else {
            value.to_string()
        }
    };

    let input = MemberInput {
        email: form.text("email").to_string(),
        phone: form.text("telefone").to_string(),
        mobile: form.text("celular").to_string(),
        address: form.text("endereco").to_string(),
        cep: form.text("cep").to_string(),
        neighborhood: form.text("bairro").to_string(),
        city: or_default(form.text("cidade"), defaults.city.clone()),
        state: or_default(form.text("estado"), defaults.state.clone()),
        birth_date: parse_optional_date(form.text("data_nascimento"), "data de nascimento")?,
        marital_status: form.text("estado_civil").to_lowercase(),
        spouse: form.text("conjuge").to_string(),
        children,
        baptized: form.checkbox("batizado"),
        baptism_date: parse_optional_date(form.text("data_batismo"), "data de batismo")?,
        ministry: form.text("ministerio").to_string(),
        photo: None,
        status: match form.text("status") {
            "" => MemberStatus::Active,
            raw => raw.parse()?,
        },
        ..defaults
    };
    input.validate()?;

    let photo = form
        .file("foto")
        .map(|file| uploads::save_image(&state.config.uploads_dir, &file.filename, &file.bytes))
        .transpose()?;
    Ok(MemberInput { photo, ..input })
}

pub async fn create(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let form = MultipartForm::read(multipart).await?;
    let result = member_input(&state, &form).and_then(|input| {
        let id = member::insert(&*state.db()?, &input)?;
        info!(member_id = id, "member created");
        Ok(flash::redirect(
            "/membros",
            Flash::success(format!("Membro {} cadastrado com sucesso!", input.name.trim())),
        ))
    });
    form_result(result, "/membros/novo")
}

pub async fn update(State(state): State<AppState>, Path(id): Path<i64>, multipart: Multipart) -> Result<Response> {
    let form = MultipartForm::read(multipart).await?;
    let result = member_input(&state, &form).and_then(|input| {
        member::update(&*state.db()?, id, &input)?;
        Ok(flash::redirect("/membros", Flash::success("Membro atualizado com sucesso!")))
    });
    form_result(result, &format!("/membros/editar/{id}"))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    let result = member::delete(&*state.db()?, id).map(|removed| {
        info!(member_id = id, "member deleted");
        flash::redirect("/membros", Flash::success(format!("Membro {} excluído.", removed.name)))
    });
    form_result(result, "/membros")
}

pub async fn import_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Html<String>> {
    state.templates.render(&ctx, "membros/importar.html", context! {})
}

pub async fn import(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let form = MultipartForm::read(multipart).await?;
    let Some(file) = form
        .file("csv_file")
        .filter(|f| f.filename.to_lowercase().ends_with(".csv"))
    else {
        return Ok(flash::redirect("/membros/importar", Flash::danger("Envie um arquivo .csv.")));
    };

    let report = {
        let mut conn = state.db()?;
        import::import_members(&mut conn, file.bytes.as_ref())?
    };

    let message = if report.skipped == 0 {
        format!("{} membros importados com sucesso!", report.imported)
    } else {
        format!(
            "{} membros importados com sucesso! {} linhas ignoradas.",
            report.imported, report.skipped
        )
    };
    let flash = if report.skipped == 0 {
        Flash::success(message)
    } else {
        Flash::warning(message)
    };
    Ok(flash::redirect("/membros", flash).into_response())
}
