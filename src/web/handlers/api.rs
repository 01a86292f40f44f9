// /api - JSON endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Serialize;

use super::finance::MonthQuery;
use crate::error::Result;
use crate::finance::{self, ChartPoint, MonthlySummary};
use crate::web::{guard::RequestContext, AppState};

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(status: StatusCode, message: impl Into<String>) -> Response {
        let body = ApiResponse::<T> {
            success: false,
            data: None,
            error: Some(message.into()),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub resumo: MonthlySummary,
    pub grafico: Vec<ChartPoint>,
}

/// GET /api/health
pub async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/financeiro/resumo?mes=YYYY-MM
///
/// Church-wide figures, so restricted users get 403.
pub async fn finance_summary(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<MonthQuery>,
) -> Result<Response> {
    if !ctx.user()?.is_office {
        return Ok(ApiResponse::<SummaryResponse>::err(StatusCode::FORBIDDEN, "Acesso negado."));
    }
    let month = match finance::parse_month_param(query.mes.as_deref()) {
        Ok(month) => month,
        Err(e) => {
            return Ok(ApiResponse::<SummaryResponse>::err(
                StatusCode::BAD_REQUEST,
                e.user_message(),
            ))
        }
    };

    let settings = &state.config.finance;
    let response = {
        let conn = state.db()?;
        SummaryResponse {
            resumo: finance::monthly_summary(&conn, month)?,
            grafico: finance::trailing_chart(
                &conn,
                month,
                settings.chart_months,
                settings.chart_includes_fixed_costs,
            )?,
        }
    };
    Ok(Json(ApiResponse::ok(response)).into_response())
}
