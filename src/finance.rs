// 📊 Finance Engine - monthly ledger aggregation and projection
//
// For a calendar month:
//   entradas   = Σ tithes + offerings + donations
//   saidas     = Σ expenses
//   fixos      = Σ recurring transactions + Σ active fixed costs
//   saldo_final = entradas - (saidas + fixos)
//   saldo_real  = saldo_final - provision
//
// and how many average tithers are needed to cover
//   despesa_total = saidas + fixos + provision
//
// `summarize` is a pure function of its inputs; `monthly_summary` loads the
// rows for it.

use chrono::{Datelike, Local, NaiveDate};
use rusqlite::{params, Connection};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::entities::{fixed_cost, transaction, FixedCost, Transaction, TransactionFilter};
use crate::error::{Error, Result};

pub const DEFAULT_PROVISION: f64 = 0.0;
pub const DEFAULT_AVERAGE_SALARY: f64 = 2000.0;

/// Share of the average salary assumed as one tither's monthly tithe
pub const TITHE_RATE: f64 = 0.10;

// ============================================================================
// YEAR-MONTH
// ============================================================================

/// A calendar month, written `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
            return Err(Error::validation(format!(
                "Mês inválido: {year:04}-{month:02}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or_default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// `count` months ending at (and including) `self`, oldest first
    pub fn trailing(&self, count: u32) -> Vec<YearMonth> {
        let mut months = Vec::with_capacity(count as usize);
        let mut cursor = *self;
        for _ in 0..count {
            months.push(cursor);
            cursor = cursor.previous();
        }
        months.reverse();
        months
    }

    /// Chart label, e.g. `Mar/2025`
    pub fn label(&self) -> String {
        self.first_day().format("%b/%Y").to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    /// Strict `YYYY-MM`: 4 digits, dash, 2 digits
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::validation(format!("Mês inválido (use AAAA-MM): {s}"));
        let bytes = s.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(invalid());
        }
        let (year, month) = (&s[..4], &s[5..]);
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        YearMonth::new(year, month).map_err(|_| invalid())
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `?mes=` handling: absent or blank means the current month
pub fn parse_month_param(param: Option<&str>) -> Result<YearMonth> {
    match param.map(str::trim) {
        None | Some("") => Ok(YearMonth::current()),
        Some(value) => value.parse(),
    }
}

// ============================================================================
// FINANCE CONFIG (singleton row, lazily created)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FinanceConfig {
    /// "Provisão para extras": buffer reserved for unbudgeted spending
    #[serde(rename = "provisao_extras")]
    pub provision: f64,
    #[serde(rename = "salario_medio")]
    pub average_salary: f64,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            provision: DEFAULT_PROVISION,
            average_salary: DEFAULT_AVERAGE_SALARY,
        }
    }
}

impl FinanceConfig {
    pub fn average_tithe(&self) -> f64 {
        self.average_salary * TITHE_RATE
    }

    pub fn validate(&self) -> Result<()> {
        if !self.provision.is_finite() || self.provision < 0.0 {
            return Err(Error::validation("A provisão não pode ser negativa."));
        }
        if !self.average_salary.is_finite() || self.average_salary < 0.0 {
            return Err(Error::validation("O salário médio não pode ser negativo."));
        }
        Ok(())
    }
}

/// Read the config row, inserting the defaults first when it is missing
pub fn load_config(conn: &Connection) -> Result<FinanceConfig> {
    conn.execute(
        "INSERT OR IGNORE INTO finance_config (id, provision, average_salary) VALUES (1, ?1, ?2)",
        params![DEFAULT_PROVISION, DEFAULT_AVERAGE_SALARY],
    )?;
    Ok(conn.query_row(
        "SELECT provision, average_salary FROM finance_config WHERE id = 1",
        [],
        |row| {
            Ok(FinanceConfig {
                provision: row.get(0)?,
                average_salary: row.get(1)?,
            })
        },
    )?)
}

pub fn save_config(conn: &Connection, config: &FinanceConfig) -> Result<()> {
    config.validate()?;
    conn.execute(
        "INSERT INTO finance_config (id, provision, average_salary) VALUES (1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET provision = excluded.provision,
                                       average_salary = excluded.average_salary",
        params![config.provision, config.average_salary],
    )?;
    Ok(())
}

// ============================================================================
// MONTHLY SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceStatus {
    Positive,
    Negative,
}

impl BalanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceStatus::Positive => "positive",
            BalanceStatus::Negative => "negative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    #[serde(rename = "mes")]
    pub month: YearMonth,
    #[serde(rename = "entradas")]
    pub income: f64,
    #[serde(rename = "saidas")]
    pub expenses: f64,
    #[serde(rename = "fixos")]
    pub fixed_costs: f64,
    #[serde(rename = "provisao")]
    pub provision: f64,
    #[serde(rename = "dizimo_medio")]
    pub average_tithe: f64,
    #[serde(rename = "despesa_total")]
    pub total_expense: f64,
    #[serde(rename = "dizimistas_necessarios")]
    pub tithers_needed: u64,
    #[serde(rename = "saldo_final")]
    pub final_balance: f64,
    #[serde(rename = "saldo_real")]
    pub real_balance: f64,
    #[serde(rename = "saldo_status")]
    pub status: BalanceStatus,
}

/// Aggregate one month. Transactions outside `month` and inactive fixed
/// costs are ignored, so callers may pass wider sets.
pub fn summarize(
    month: YearMonth,
    transactions: &[Transaction],
    fixed_costs: &[FixedCost],
    config: &FinanceConfig,
) -> MonthlySummary {
    let in_month = || transactions.iter().filter(|t| month.contains(t.date));

    let income: f64 = in_month().filter(|t| t.kind.is_income()).map(|t| t.amount).sum();
    let expenses: f64 = in_month().filter(|t| !t.kind.is_income()).map(|t| t.amount).sum();
    let recurring: f64 = in_month().filter(|t| t.recurring).map(|t| t.amount).sum();
    let fixed_total: f64 = fixed_costs.iter().filter(|c| c.active).map(|c| c.amount).sum();
    let fixed = recurring + fixed_total;

    let provision = config.provision;
    let average_tithe = config.average_tithe();
    let total_expense = expenses + fixed + provision;

    let final_balance = income - (expenses + fixed);
    let real_balance = final_balance - provision;

    MonthlySummary {
        month,
        income,
        expenses,
        fixed_costs: fixed,
        provision,
        average_tithe,
        total_expense,
        tithers_needed: tithers_needed(total_expense, average_tithe),
        final_balance,
        real_balance,
        status: if real_balance >= 0.0 {
            BalanceStatus::Positive
        } else {
            BalanceStatus::Negative
        },
    }
}

/// Smallest n with n × average_tithe ≥ total_expense; 0 when the average
/// tithe (or the total) is not positive
pub fn tithers_needed(total_expense: f64, average_tithe: f64) -> u64 {
    if !total_expense.is_finite() || !average_tithe.is_finite() {
        return 0;
    }
    if average_tithe <= 0.0 || total_expense <= 0.0 {
        return 0;
    }
    // the quotient can land one off either side of the exact product
    let mut n = (total_expense / average_tithe).ceil();
    while n > 0.0 && (n - 1.0) * average_tithe >= total_expense {
        n -= 1.0;
    }
    while n * average_tithe < total_expense {
        n += 1.0;
    }
    n as u64
}

fn to_cents(value: f64) -> i64 {
    if value.is_finite() {
        (value * 100.0).round() as i64
    } else {
        0
    }
}

/// Load the month's rows and aggregate them
pub fn monthly_summary(conn: &Connection, month: YearMonth) -> Result<MonthlySummary> {
    let transactions = transaction::list(
        conn,
        &TransactionFilter::between(month.first_day(), month.last_day()),
    )?;
    let fixed_costs = fixed_cost::list_active(conn)?;
    let config = load_config(conn)?;
    Ok(summarize(month, &transactions, &fixed_costs, &config))
}

// ============================================================================
// TRAILING CHART
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    #[serde(rename = "mes")]
    pub month: YearMonth,
    #[serde(rename = "saldo")]
    pub net: f64,
}

/// entradas - saidas for one month, minus active fixed costs when
/// `include_fixed` is set
pub fn month_net(
    month: YearMonth,
    transactions: &[Transaction],
    fixed_costs: &[FixedCost],
    include_fixed: bool,
) -> f64 {
    let net: f64 = transactions
        .iter()
        .filter(|t| month.contains(t.date))
        .map(|t| if t.kind.is_income() { t.amount } else { -t.amount })
        .sum();

    if include_fixed {
        net - fixed_costs.iter().filter(|c| c.active).map(|c| c.amount).sum::<f64>()
    } else {
        net
    }
}

pub fn chart_points(
    end: YearMonth,
    months: u32,
    transactions: &[Transaction],
    fixed_costs: &[FixedCost],
    include_fixed: bool,
) -> Vec<ChartPoint> {
    end.trailing(months)
        .into_iter()
        .map(|month| ChartPoint {
            label: month.label(),
            month,
            net: round2(month_net(month, transactions, fixed_costs, include_fixed)),
        })
        .collect()
}

/// One query over the whole window, bucketed in memory
pub fn trailing_chart(
    conn: &Connection,
    end: YearMonth,
    months: u32,
    include_fixed: bool,
) -> Result<Vec<ChartPoint>> {
    let window = end.trailing(months.max(1));
    let start = window[0];
    let transactions = transaction::list(
        conn,
        &TransactionFilter::between(start.first_day(), end.last_day()),
    )?;
    let fixed_costs = fixed_cost::list_active(conn)?;
    Ok(chart_points(end, months.max(1), &transactions, &fixed_costs, include_fixed))
}

// ============================================================================
// MEMBER STATEMENT (restricted self-service view)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MemberStatement {
    #[serde(rename = "mes")]
    pub month: YearMonth,
    #[serde(rename = "transacoes")]
    pub transactions: Vec<Transaction>,
    /// Σ income-kind entries (what the member contributed)
    #[serde(rename = "total_contribuido")]
    pub total_contributed: f64,
}

pub fn member_statement(conn: &Connection, member_id: i64, month: YearMonth) -> Result<MemberStatement> {
    let filter = TransactionFilter {
        member_id: Some(member_id),
        ..TransactionFilter::between(month.first_day(), month.last_day())
    };
    let transactions = transaction::list(conn, &filter)?;
    let total_contributed = transactions
        .iter()
        .filter(|t| t.kind.is_income())
        .map(|t| t.amount)
        .sum();

    Ok(MemberStatement {
        month,
        transactions,
        total_contributed,
    })
}

// ============================================================================
// FORMATTING
// ============================================================================

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Brazilian currency format: `R$ 1.234,56`, `-R$ 10,00`
pub fn format_brl(value: f64) -> String {
    let cents = to_cents(value);
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let (whole, fraction) = (cents / 100, cents % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{sign}R$ {grouped},{fraction:02}")
}
