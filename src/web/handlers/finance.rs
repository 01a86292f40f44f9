// /financeiro - monthly ledger, configuration and fixed costs

use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
    Extension, Form,
};
use minijinja::context;
use serde::Deserialize;
use tracing::{info, instrument};

use super::{form_result, parse_date, parse_optional_id};
use crate::entities::{
    fixed_cost, member, transaction, FixedCostInput, PaymentMethod, TransactionFilter, TransactionInput,
    TransactionKind,
};
use crate::error::{Error, Result};
use crate::finance::{self, format_brl, FinanceConfig, YearMonth};
use crate::web::{
    flash::{self, Flash},
    guard::RequestContext,
    AppState,
};

const COSTS_PATH: &str = "/financeiro/custos";

#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    pub mes: Option<String>,
}

fn month_path(month: YearMonth) -> String {
    format!("/financeiro?mes={month}")
}

/// Accepts `1234.56`, `1234,56` and `1.234,56`
fn parse_amount(raw: &str) -> Result<f64> {
    let raw = raw.trim().trim_start_matches("R$").trim();
    let normalized = if raw.contains(',') {
        raw.replace('.', "").replace(',', ".")
    } else {
        raw.to_string()
    };
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::validation(format!("Valor inválido: {raw}")))
}

fn kind_options() -> Vec<(&'static str, &'static str)> {
    TransactionKind::ALL.iter().map(|k| (k.as_str(), k.label())).collect()
}

fn method_options() -> Vec<(&'static str, &'static str)> {
    PaymentMethod::ALL.iter().map(|m| (m.as_str(), m.label())).collect()
}

// ============================================================================
// OVERVIEW
// ============================================================================

#[instrument(skip(state, ctx))]
pub async fn overview(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<MonthQuery>,
) -> Result<Response> {
    let user = ctx.user()?;
    let month = match finance::parse_month_param(query.mes.as_deref()) {
        Ok(month) => month,
        Err(e) => return Ok(flash::redirect("/financeiro", Flash::danger(e.user_message()))),
    };

    if !user.is_office {
        let Some(member_id) = user.member_id else {
            return Ok(flash::redirect(
                "/",
                Flash::warning("Sua conta não está vinculada a um membro."),
            ));
        };
        let statement = finance::member_statement(&*state.db()?, member_id, month)?;
        let page = context! {
            statement,
            month => month.to_string(),
            previous => month.previous().to_string(),
            next => month.next().to_string(),
        };
        return Ok(state
            .templates
            .render(&ctx, "financeiro/extrato.html", page)?
            .into_response());
    }

    let settings = &state.config.finance;
    let page = {
        let conn = state.db()?;
        context! {
            summary => finance::monthly_summary(&conn, month)?,
            chart => finance::trailing_chart(
                &conn,
                month,
                settings.chart_months,
                settings.chart_includes_fixed_costs,
            )?,
            transactions => transaction::list(
                &conn,
                &TransactionFilter::between(month.first_day(), month.last_day()),
            )?,
            members => member::list_active(&conn)?,
            fixed_costs => fixed_cost::list_active(&conn)?,
            kinds => kind_options(),
            methods => method_options(),
            month => month.to_string(),
            month_label => month.label(),
            previous => month.previous().to_string(),
            next => month.next().to_string(),
        }
    };
    Ok(state
        .templates
        .render(&ctx, "financeiro/painel.html", page)?
        .into_response())
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TransactionForm {
    pub data: String,
    pub tipo: String,
    pub categoria: String,
    pub valor: String,
    pub metodo: String,
    #[serde(default)]
    pub membro_id: Option<String>,
    #[serde(default)]
    pub recorrente: Option<String>,
    /// Month being viewed when the form was submitted
    #[serde(default)]
    pub mes: Option<String>,
}

impl TransactionForm {
    fn to_input(&self) -> Result<TransactionInput> {
        let input = TransactionInput {
            kind: self.tipo.parse()?,
            category: self.categoria.trim().to_string(),
            amount: parse_amount(&self.valor)?,
            method: self.metodo.parse()?,
            date: parse_date(&self.data, "data")?,
            member_id: parse_optional_id(self.membro_id.as_deref())?,
            recurring: self.recorrente.is_some(),
        };
        input.validate()?;
        Ok(input)
    }

    fn return_month(&self, fallback: YearMonth) -> YearMonth {
        self.mes
            .as_deref()
            .and_then(|m| m.trim().parse().ok())
            .unwrap_or(fallback)
    }
}

pub async fn register(State(state): State<AppState>, Form(form): Form<TransactionForm>) -> Result<Response> {
    let back = month_path(form.return_month(YearMonth::current()));
    let result = form.to_input().and_then(|input| {
        let id = transaction::insert(&*state.db()?, &input)?;
        info!(transaction_id = id, kind = input.kind.as_str(), "transaction registered");
        let message = format!(
            "Transação de {} registrada para {}!",
            format_brl(input.amount),
            input.date.format("%d/%m/%Y")
        );
        Ok(flash::redirect(
            &month_path(form.return_month(YearMonth::from_date(input.date))),
            Flash::success(message),
        ))
    });
    form_result(result, &back)
}

pub async fn edit_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<i64>,
    Query(query): Query<MonthQuery>,
) -> Result<Html<String>> {
    let (transaction, members) = {
        let conn = state.db()?;
        (transaction::require(&conn, id)?, member::list_active(&conn)?)
    };
    let month = query
        .mes
        .as_deref()
        .and_then(|m| m.parse().ok())
        .unwrap_or_else(|| YearMonth::from_date(transaction.date));
    state.templates.render(
        &ctx,
        "financeiro/editar.html",
        context! {
            transaction,
            members,
            kinds => kind_options(),
            methods => method_options(),
            month => month.to_string(),
        },
    )
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<TransactionForm>,
) -> Result<Response> {
    let result = form.to_input().and_then(|input| {
        transaction::update(&*state.db()?, id, &input)?;
        let month = form.return_month(YearMonth::from_date(input.date));
        Ok(flash::redirect(&month_path(month), Flash::success("Transação atualizada!")))
    });
    form_result(result, &format!("/financeiro/editar/{id}"))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(query): Form<MonthQuery>,
) -> Result<Response> {
    let month = query
        .mes
        .as_deref()
        .and_then(|m| m.parse().ok())
        .unwrap_or_else(YearMonth::current);
    let back = month_path(month);
    let result = transaction::delete(&*state.db()?, id).map(|_| {
        info!(transaction_id = id, "transaction deleted");
        flash::redirect(&back, Flash::success("Transação excluída."))
    });
    form_result(result, &back)
}

// ============================================================================
// CONFIGURATION
// ============================================================================

pub async fn config_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Html<String>> {
    let config = finance::load_config(&*state.db()?)?;
    state.templates.render(
        &ctx,
        "financeiro/configuracao.html",
        context! { config, average_tithe => config.average_tithe() },
    )
}

#[derive(Debug, Deserialize)]
pub struct ConfigForm {
    pub provisao_extras: String,
    pub salario_medio: String,
}

pub async fn save_config(State(state): State<AppState>, Form(form): Form<ConfigForm>) -> Result<Response> {
    let result = (|| -> Result<Response> {
        let config = FinanceConfig {
            provision: parse_amount(&form.provisao_extras)?,
            average_salary: parse_amount(&form.salario_medio)?,
        };
        finance::save_config(&*state.db()?, &config)?;
        info!(provision = config.provision, average_salary = config.average_salary, "finance config saved");
        Ok(flash::redirect("/financeiro", Flash::success("Configurações salvas!")))
    })();
    form_result(result, "/financeiro/configuracao")
}

// ============================================================================
// FIXED COSTS
// ============================================================================

pub async fn fixed_costs(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Html<String>> {
    let costs = fixed_cost::list(&*state.db()?)?;
    let active_total: f64 = costs.iter().filter(|c| c.active).map(|c| c.amount).sum();
    state.templates.render(
        &ctx,
        "financeiro/custos.html",
        context! { costs, active_total },
    )
}

#[derive(Debug, Deserialize)]
pub struct FixedCostForm {
    pub descricao: String,
    pub valor: String,
    #[serde(default)]
    pub dia_vencimento: String,
}

pub async fn add_fixed_cost(State(state): State<AppState>, Form(form): Form<FixedCostForm>) -> Result<Response> {
    let result = (|| -> Result<Response> {
        let due_day = match form.dia_vencimento.trim() {
            "" => None,
            raw => Some(
                raw.parse()
                    .map_err(|_| Error::validation(format!("Dia de vencimento inválido: {raw}")))?,
            ),
        };
        let input = FixedCostInput {
            description: form.descricao.trim().to_string(),
            amount: parse_amount(&form.valor)?,
            due_day,
        };
        fixed_cost::insert(&*state.db()?, &input)?;
        Ok(flash::redirect(COSTS_PATH, Flash::success("Custo fixo adicionado!")))
    })();
    form_result(result, COSTS_PATH)
}

pub async fn toggle_fixed_cost(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    let result = fixed_cost::toggle_active(&*state.db()?, id).map(|active| {
        let message = if active {
            "Custo fixo ativado."
        } else {
            "Custo fixo desativado."
        };
        flash::redirect(COSTS_PATH, Flash::success(message))
    });
    form_result(result, COSTS_PATH)
}

pub async fn delete_fixed_cost(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    let result = fixed_cost::delete(&*state.db()?, id)
        .map(|_| flash::redirect(COSTS_PATH, Flash::success("Custo fixo excluído.")));
    form_result(result, COSTS_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("150").unwrap(), 150.0);
        assert_eq!(parse_amount("150.50").unwrap(), 150.5);
        assert_eq!(parse_amount("150,50").unwrap(), 150.5);
        assert_eq!(parse_amount("R$ 1.234,56").unwrap(), 1234.56);
        assert!(parse_amount("").is_err());
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_transaction_form_to_input() {
        let form = TransactionForm {
            data: "2025-03-10".into(),
            tipo: "dizimo".into(),
            categoria: " Dízimo mensal ".into(),
            valor: "200,00".into(),
            metodo: "pix".into(),
            membro_id: Some("".into()),
            recorrente: Some("on".into()),
            mes: Some("2025-02".into()),
        };
        let input = form.to_input().unwrap();
        assert_eq!(input.kind, TransactionKind::Tithe);
        assert_eq!(input.category, "Dízimo mensal");
        assert_eq!(input.amount, 200.0);
        assert_eq!(input.member_id, None);
        assert!(input.recurring);
        assert_eq!(form.return_month(YearMonth::current()).to_string(), "2025-02");

        let bad = TransactionForm {
            valor: "0".into(),
            ..form
        };
        assert!(bad.to_input().is_err());
    }
}
