// /exportar/pdf and /exportar/excel

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use tracing::info;

use crate::error::Result;
use crate::reports::{self, FinanceReport, ReportFilter, ReportQuery};
use crate::web::{
    flash::{self, Flash},
    guard::RequestContext,
    AppState,
};

/// Parsed filter with the member pin applied for restricted users, or the
/// redirect to show instead
fn load_report(state: &AppState, ctx: &RequestContext, query: &ReportQuery) -> Result<Result<FinanceReport, Response>> {
    let user = ctx.user()?;
    let filter = match ReportFilter::from_query(query) {
        Ok(filter) => filter,
        Err(e) => return Ok(Err(flash::redirect("/financeiro", Flash::danger(e.user_message())))),
    };

    let filter = if user.is_office {
        filter
    } else {
        match user.member_id {
            Some(member_id) => filter.restricted_to(member_id),
            None => {
                return Ok(Err(flash::redirect(
                    "/",
                    Flash::warning("Sua conta não está vinculada a um membro."),
                )))
            }
        }
    };

    let report = reports::build_report(&*state.db()?, &filter)?;
    Ok(Ok(report))
}

fn attachment(filename: &str) -> String {
    format!("attachment; filename=\"{filename}\"")
}

pub async fn pdf(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ReportQuery>,
) -> Result<Response> {
    let report = match load_report(&state, &ctx, &query)? {
        Ok(report) => report,
        Err(redirect) => return Ok(redirect),
    };
    let html = reports::render_html(&report)?;
    let bytes = state.pdf.render(&html).await?;
    info!(period = %report.period_slug, rows = report.transactions.len(), "pdf exported");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&reports::pdf_filename(&report))),
        ],
        bytes,
    )
        .into_response())
}

pub async fn spreadsheet(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ReportQuery>,
) -> Result<Response> {
    let report = match load_report(&state, &ctx, &query)? {
        Ok(report) => report,
        Err(redirect) => return Ok(redirect),
    };
    let bytes = reports::render_spreadsheet(&report)?;
    info!(period = %report.period_slug, rows = report.transactions.len(), "spreadsheet exported");

    Ok((
        [
            (header::CONTENT_TYPE, reports::SPREADSHEET_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                attachment(&reports::spreadsheet_filename(&report)),
            ),
        ],
        bytes,
    )
        .into_response())
}
