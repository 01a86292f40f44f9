// 🧾 Reports - filtered ledger exports (PDF and spreadsheet)
//
// Period precedence for the `mes` / `ano` query parameters:
//   1. non-empty `mes`           -> that month
//   2. non-empty `ano`           -> that calendar year
//   3. `mes` present but empty   -> all time
//   4. neither                   -> current month

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use minijinja::{context, Environment};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::entities::{transaction, PaymentMethod, Transaction, TransactionFilter, TransactionKind};
use crate::error::{Error, Result};
use crate::finance::{format_brl, YearMonth};

const REPORT_TEMPLATE: &str = include_str!("../templates/relatorios/pdf_financeiro.html");

// ============================================================================
// FILTERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Month(YearMonth),
    Year(i32),
    AllTime,
}

impl ReportPeriod {
    pub fn from_params(mes: Option<&str>, ano: Option<&str>) -> Result<Self> {
        let mes = mes.map(str::trim);
        let ano = ano.map(str::trim).filter(|a| !a.is_empty());

        match (mes, ano) {
            (Some(m), _) if !m.is_empty() => Ok(ReportPeriod::Month(m.parse()?)),
            (_, Some(a)) => {
                if a.len() != 4 || !a.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::validation(format!("Ano inválido: {a}")));
                }
                a.parse()
                    .map(ReportPeriod::Year)
                    .map_err(|_| Error::validation(format!("Ano inválido: {a}")))
            }
            (Some(_), None) => Ok(ReportPeriod::AllTime),
            (None, None) => Ok(ReportPeriod::Month(YearMonth::current())),
        }
    }

    /// Inclusive date bounds; None means unbounded
    pub fn bounds(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match self {
            ReportPeriod::Month(month) => (Some(month.first_day()), Some(month.last_day())),
            ReportPeriod::Year(year) => (
                NaiveDate::from_ymd_opt(*year, 1, 1),
                NaiveDate::from_ymd_opt(*year, 12, 31),
            ),
            ReportPeriod::AllTime => (None, None),
        }
    }

    /// Used in download filenames
    pub fn slug(&self) -> String {
        match self {
            ReportPeriod::Month(month) => month.to_string(),
            ReportPeriod::Year(year) => year.to_string(),
            ReportPeriod::AllTime => "todos".to_string(),
        }
    }

    pub fn title(&self) -> String {
        match self {
            ReportPeriod::Month(month) => format!("{:02}/{}", month.month(), month.year()),
            ReportPeriod::Year(year) => format!("Ano {year}"),
            ReportPeriod::AllTime => "Todo o período".to_string(),
        }
    }
}

/// Raw `/exportar/*` query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub mes: Option<String>,
    pub ano: Option<String>,
    pub tipo: Option<String>,
    pub membro_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportFilter {
    pub period: ReportPeriod,
    pub kind: Option<TransactionKind>,
    pub member_id: Option<i64>,
}

impl ReportFilter {
    pub fn from_query(query: &ReportQuery) -> Result<Self> {
        let period = ReportPeriod::from_params(query.mes.as_deref(), query.ano.as_deref())?;

        let kind = match query.tipo.as_deref().map(str::trim) {
            None | Some("") | Some("todos") => None,
            Some(kind) => Some(kind.parse()?),
        };

        let member_id = match query.membro_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(id) => Some(
                id.parse()
                    .map_err(|_| Error::validation(format!("Membro inválido: {id}")))?,
            ),
        };

        Ok(Self {
            period,
            kind,
            member_id,
        })
    }

    /// Pin the filter to one member, whatever was requested
    pub fn restricted_to(self, member_id: i64) -> Self {
        Self {
            member_id: Some(member_id),
            ..self
        }
    }

    fn as_transaction_filter(&self) -> TransactionFilter {
        let (from, to) = self.period.bounds();
        TransactionFilter {
            from,
            to,
            kind: self.kind,
            member_id: self.member_id,
        }
    }
}

// ============================================================================
// REPORT DATA
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct FinanceReport {
    pub title: String,
    pub period_slug: String,
    pub generated_at: String,
    pub transactions: Vec<Transaction>,
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
}

#[instrument(skip(conn))]
pub fn build_report(conn: &Connection, filter: &ReportFilter) -> Result<FinanceReport> {
    let transactions = transaction::list(conn, &filter.as_transaction_filter())?;
    let (total_income, total_expense) = transactions.iter().fold((0.0, 0.0), |(inc, exp), t| {
        if t.kind.is_income() {
            (inc + t.amount, exp)
        } else {
            (inc, exp + t.amount)
        }
    });
    debug!(rows = transactions.len(), "report rows loaded");

    Ok(FinanceReport {
        title: filter.period.title(),
        period_slug: filter.period.slug(),
        generated_at: Local::now().format("%d/%m/%Y %H:%M").to_string(),
        transactions,
        total_income,
        total_expense,
        balance: total_income - total_expense,
    })
}

pub fn pdf_filename(report: &FinanceReport) -> String {
    format!("financeiro_{}.pdf", report.period_slug)
}

pub fn spreadsheet_filename(report: &FinanceReport) -> String {
    format!("financeiro_{}.xlsx", report.period_slug)
}

// ============================================================================
// RENDERING
// ============================================================================

/// Filters shared by the report document and the web pages:
/// `brl`, `kind_label`, `method_label`, `date_br`
pub fn add_ledger_filters(env: &mut Environment<'_>) {
    env.add_filter("brl", format_brl);
    env.add_filter("kind_label", |kind: String| {
        kind.parse::<TransactionKind>()
            .map(|k| k.label().to_string())
            .unwrap_or(kind)
    });
    env.add_filter("method_label", |method: String| {
        method
            .parse::<PaymentMethod>()
            .map(|m| m.label().to_string())
            .unwrap_or(method)
    });
    env.add_filter("date_br", |date: String| {
        NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or(date)
    });
}

/// Standalone HTML document fed to the PDF renderer
pub fn render_html(report: &FinanceReport) -> Result<String> {
    let mut env = Environment::new();
    add_ledger_filters(&mut env);
    env.add_template("pdf_financeiro.html", REPORT_TEMPLATE)?;
    let html = env
        .get_template("pdf_financeiro.html")?
        .render(context! { report => report })?;
    Ok(html)
}

pub const SPREADSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const SPREADSHEET_COLUMNS: [&str; 6] = ["Data", "Tipo", "Categoria", "Método", "Membro", "Valor"];

/// One-sheet workbook, columns: Data, Tipo, Categoria, Método, Membro, Valor
pub fn render_spreadsheet(report: &FinanceReport) -> Result<Vec<u8>> {
    write_workbook(report).map_err(|e| Error::internal(format!("write spreadsheet: {e}")))
}

fn write_workbook(report: &FinanceReport) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let money = Format::new().set_num_format("#,##0.00");

    let sheet = workbook.add_worksheet();
    sheet.set_name("Financeiro")?;
    for (col, title) in (0u16..).zip(SPREADSHEET_COLUMNS) {
        sheet.write_string_with_format(0, col, title, &header)?;
    }

    for (row, t) in (1u32..).zip(&report.transactions) {
        sheet.write_string(row, 0, t.date.format("%d/%m/%Y").to_string())?;
        sheet.write_string(row, 1, t.kind.label())?;
        sheet.write_string(row, 2, t.category.as_str())?;
        sheet.write_string(row, 3, t.method.label())?;
        sheet.write_string(row, 4, t.member_name.as_deref().unwrap_or("-"))?;
        sheet.write_number_with_format(row, 5, t.amount, &money)?;
    }
    sheet.set_column_width(2, 24)?;
    sheet.set_column_width(4, 28)?;

    workbook.save_to_buffer()
}

#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: &str) -> Result<Vec<u8>>;
}

/// Pipes HTML through `wkhtmltopdf - -`
pub struct Wkhtmltopdf {
    binary: PathBuf,
}

impl Wkhtmltopdf {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl PdfRenderer for Wkhtmltopdf {
    async fn render(&self, html: &str) -> Result<Vec<u8>> {
        let external = |message: String| Error::External {
            service: "wkhtmltopdf",
            message,
        };

        let mut child = Command::new(&self.binary)
            .args(["--quiet", "--encoding", "utf-8", "-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| external(format!("spawn {}: {e}", self.binary.display())))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| external("stdin not captured".to_string()))?;
        stdin.write_all(html.as_bytes()).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(external(format!(
                "exit {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::entities::{member, MemberInput, PaymentMethod, TransactionInput};

    fn query(mes: Option<&str>, ano: Option<&str>) -> ReportQuery {
        ReportQuery {
            mes: mes.map(String::from),
            ano: ano.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_period_precedence() {
        let month: YearMonth = "2025-03".parse().unwrap();
        assert_eq!(
            ReportPeriod::from_params(Some("2025-03"), Some("2024")).unwrap(),
            ReportPeriod::Month(month)
        );
        assert_eq!(ReportPeriod::from_params(Some(""), Some("2024")).unwrap(), ReportPeriod::Year(2024));
        assert_eq!(ReportPeriod::from_params(Some(""), None).unwrap(), ReportPeriod::AllTime);
        assert_eq!(ReportPeriod::from_params(Some(""), Some("")).unwrap(), ReportPeriod::AllTime);
        assert_eq!(
            ReportPeriod::from_params(None, None).unwrap(),
            ReportPeriod::Month(YearMonth::current())
        );
        assert!(ReportPeriod::from_params(Some("03/2025"), None).is_err());
        assert!(ReportPeriod::from_params(None, Some("25")).is_err());
    }

    #[test]
    fn test_filter_from_query() {
        let mut q = query(Some("2025-03"), None);
        q.tipo = Some("todos".to_string());
        q.membro_id = Some("".to_string());
        let filter = ReportFilter::from_query(&q).unwrap();
        assert_eq!(filter.kind, None);
        assert_eq!(filter.member_id, None);

        q.tipo = Some("despesa".to_string());
        q.membro_id = Some("7".to_string());
        let filter = ReportFilter::from_query(&q).unwrap();
        assert_eq!(filter.kind, Some(TransactionKind::Expense));
        assert_eq!(filter.restricted_to(3).member_id, Some(3));

        q.tipo = Some("bingo".to_string());
        assert!(ReportFilter::from_query(&q).is_err());
    }

    fn seed(conn: &Connection) -> i64 {
        let member_id = member::insert(conn, &MemberInput::named("Fábio")).unwrap();
        let rows = [
            (TransactionKind::Tithe, 300.0, "2025-03-02", Some(member_id)),
            (TransactionKind::Expense, 120.5, "2025-03-20", None),
            (TransactionKind::Offering, 80.0, "2024-11-10", None),
        ];
        for (kind, amount, date, member) in rows {
            transaction::insert(
                conn,
                &TransactionInput {
                    kind,
                    category: "culto".to_string(),
                    amount,
                    method: PaymentMethod::Pix,
                    date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                    member_id: member,
                    recurring: false,
                },
            )
            .unwrap();
        }
        member_id
    }

    #[test]
    fn test_build_report_periods() {
        let conn = test_connection();
        let member_id = seed(&conn);

        let march = ReportFilter::from_query(&query(Some("2025-03"), None)).unwrap();
        let report = build_report(&conn, &march).unwrap();
        assert_eq!(report.transactions.len(), 2);
        assert_eq!(report.total_income, 300.0);
        assert_eq!(report.total_expense, 120.5);
        assert_eq!(pdf_filename(&report), "financeiro_2025-03.pdf");

        let year = ReportFilter::from_query(&query(Some(""), Some("2024"))).unwrap();
        let report = build_report(&conn, &year).unwrap();
        assert_eq!(report.transactions.len(), 1);
        assert_eq!(spreadsheet_filename(&report), "financeiro_2024.xlsx");

        let all = ReportFilter::from_query(&query(Some(""), None)).unwrap();
        assert_eq!(build_report(&conn, &all).unwrap().transactions.len(), 3);

        let own = all.restricted_to(member_id);
        let report = build_report(&conn, &own).unwrap();
        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.transactions[0].member_name.as_deref(), Some("Fábio"));
    }

    #[test]
    fn test_spreadsheet_is_a_workbook() {
        let conn = test_connection();
        seed(&conn);
        let filter = ReportFilter::from_query(&query(Some("2025-03"), None)).unwrap();
        let report = build_report(&conn, &filter).unwrap();

        let bytes = render_spreadsheet(&report).unwrap();
        // xlsx is a zip container
        assert!(bytes.starts_with(b"PK"));
        assert_eq!(spreadsheet_filename(&report), "financeiro_2025-03.xlsx");

        let empty = FinanceReport {
            transactions: Vec::new(),
            ..report
        };
        assert!(render_spreadsheet(&empty).unwrap().starts_with(b"PK"));
    }

    #[test]
    fn test_render_html_contains_totals() {
        let conn = test_connection();
        seed(&conn);
        let filter = ReportFilter::from_query(&query(Some("2025-03"), None)).unwrap();
        let report = build_report(&conn, &filter).unwrap();

        let html = render_html(&report).unwrap();
        assert!(html.contains("03/2025"));
        assert!(html.contains("R$ 300,00"));
        assert!(html.contains("R$ 179,50"));
    }
}
