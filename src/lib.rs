// Parish Office - Core Library
// Shared by the admin CLI, the web server and the tests

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod finance;
pub mod import;
pub mod messaging;
pub mod reports;
pub mod uploads;

#[cfg(feature = "server")]
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{open_database, setup_database};
pub use entities::{
    AccessLevel, Appointment, Channel, Event, FixedCost, Member, MemberStatus, Ministry, PaymentMethod,
    Transaction, TransactionKind, User,
};
pub use error::{Error, Result};
pub use finance::{FinanceConfig, MonthlySummary, YearMonth};
pub use import::ImportReport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
