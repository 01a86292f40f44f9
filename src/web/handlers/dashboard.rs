// /secretaria - office dashboard

use axum::{extract::State, response::Html, Extension};
use chrono::Local;
use minijinja::context;
use tracing::instrument;

use crate::entities::{appointment, event, member, transaction};
use crate::error::Result;
use crate::finance::{self, YearMonth};
use crate::web::{guard::RequestContext, AppState};

const DASHBOARD_LIST_LIMIT: u32 = 5;

#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Html<String>> {
    let today = Local::now().date_naive();
    let page = {
        let conn = state.db()?;
        let (income, expenses) = transaction::lifetime_totals(&conn)?;
        context! {
            member_count => member::count(&conn)?,
            events => event::list_upcoming(&conn, today, DASHBOARD_LIST_LIMIT)?,
            appointments => appointment::list_pending(&conn, today, DASHBOARD_LIST_LIMIT)?,
            summary => finance::monthly_summary(&conn, YearMonth::current())?,
            lifetime_balance => income - expenses,
        }
    };
    state.templates.render(&ctx, "secretaria/painel.html", page)
}
