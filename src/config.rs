// ⚙️ Application configuration
//
// Layering: built-in defaults → parish.toml (optional) → PARISH_* env vars.
// Nested keys use `__` in env vars, e.g. PARISH_SERVER__LISTEN_PORT=8080.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "parish.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,

    /// SQLite file; created on first start
    pub database_path: PathBuf,

    /// Member photos and event images
    pub uploads_dir: PathBuf,

    /// Fallback filter when RUST_LOG is unset
    pub log_level: String,

    pub finance: FinanceSettings,
    pub messaging: MessagingConfig,
    pub reports: ReportsConfig,
    pub bootstrap: BootstrapConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database_path: PathBuf::from("parish.db"),
            uploads_dir: PathBuf::from("uploads"),
            log_level: "info".to_string(),
            finance: FinanceSettings::default(),
            messaging: MessagingConfig::default(),
            reports: ReportsConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: IpAddr,
    pub listen_port: u16,

    /// Required when listening on a non-loopback address
    pub secret_key: String,

    pub session_ttl_hours: i64,

    /// Adds `Secure` to cookies; enable behind HTTPS
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            listen_port: 5000,
            secret_key: String::new(),
            session_ttl_hours: 12,
            secure_cookies: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceSettings {
    /// Number of months in the trailing balance chart (current month included)
    pub chart_months: u32,

    /// Subtract active fixed costs from every chart point
    pub chart_includes_fixed_costs: bool,
}

impl Default for FinanceSettings {
    fn default() -> Self {
        Self {
            chart_months: 12,
            chart_includes_fixed_costs: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub email: EmailConfig,
    pub sms: SmsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub transport: EmailTransportConfig,
    pub from_email: String,
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: EmailTransportConfig::Disabled,
            from_email: "secretaria@paroquia.local".to_string(),
            from_name: "Secretaria Paroquial".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmailTransportConfig {
    Smtp {
        host: String,
        port: u16,
        username: String,
        password: String,
        use_tls: bool,
    },
    /// Writes .eml files into `path` (development)
    File { path: PathBuf },
    Disabled,
}

impl EmailTransportConfig {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, EmailTransportConfig::Disabled)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// HTTP endpoint accepting `{"to", "from", "text"}`; empty disables SMS
    pub gateway_url: String,
    pub api_token: String,
    pub sender: String,
}

impl SmsConfig {
    pub fn is_enabled(&self) -> bool {
        !self.gateway_url.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub wkhtmltopdf_path: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            wkhtmltopdf_path: PathBuf::from("wkhtmltopdf"),
        }
    }
}

/// Admin account created by `parish setup` when set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

impl BootstrapConfig {
    pub fn is_configured(&self) -> bool {
        !self.admin_email.trim().is_empty() && !self.admin_password.is_empty()
    }
}

impl AppConfig {
    /// Defaults, then the TOML file (if present), then environment.
    pub fn figment() -> Figment {
        let path = std::env::var("PARISH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("PARISH_").ignore(&["CONFIG"]).split("__"))
    }

    pub fn load() -> Result<Self> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| Error::validation(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.server.listen_addr.is_loopback() && self.server.secret_key.trim().is_empty() {
            return Err(Error::validation(
                "server.secret_key must be set when listening on a public address",
            ));
        }
        if self.server.session_ttl_hours <= 0 {
            return Err(Error::validation("server.session_ttl_hours must be positive"));
        }
        if self.finance.chart_months == 0 {
            return Err(Error::validation("finance.chart_months must be at least 1"));
        }
        Ok(())
    }
}
