// 📣 Messaging - email and SMS broadcasts to members
//
// Each recipient is attempted once and every attempt is written to
// `sent_messages`. A member with no address for the channel counts as a
// failure; nothing is retried.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::config::{EmailConfig, EmailTransportConfig, SmsConfig};
use crate::entities::{
    member,
    message::{self, Channel, DeliveryStatus, MessageLogEntry},
    Member,
};
use crate::error::{Error, Result};

const SMS_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// SENDERS
// ============================================================================

#[async_trait]
pub trait MessageSender: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
    Disabled,
}

pub struct EmailSender {
    transport: EmailTransport,
    from: Mailbox,
}

impl EmailSender {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let transport = match &config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    warn!("SMTP TLS is disabled");
                }
                let builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                        .map_err(|e| Error::internal(format!("create SMTP transport: {e}")))?
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                };
                let builder = builder.port(*port);
                let builder = if username.is_empty() {
                    builder
                } else {
                    builder.credentials(Credentials::new(username.clone(), password.clone()))
                };
                EmailTransport::Smtp(builder.build())
            }
            EmailTransportConfig::File { path } => {
                std::fs::create_dir_all(path)?;
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(path))
            }
            EmailTransportConfig::Disabled => EmailTransport::Disabled,
        };

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::validation(format!("messaging.email.from_email inválido: {e}")))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl MessageSender for EmailSender {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let external = |message: String| Error::External {
            service: "email",
            message,
        };

        let to = to
            .parse::<Mailbox>()
            .map_err(|e| external(format!("invalid address {to}: {e}")))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| external(format!("build message: {e}")))?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| external(e.to_string()))?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| external(e.to_string()))?;
            }
            EmailTransport::Disabled => {
                return Err(external("email delivery is disabled".to_string()));
            }
        }
        Ok(())
    }
}

/// JSON body posted to the SMS gateway
#[derive(Debug, Serialize)]
struct SmsRequest<'a> {
    to: &'a str,
    from: &'a str,
    text: &'a str,
}

pub struct SmsSender {
    client: reqwest::Client,
    config: SmsConfig,
}

impl SmsSender {
    pub fn new(config: &SmsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SMS_TIMEOUT)
            .build()
            .map_err(|e| Error::internal(format!("create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl MessageSender for SmsSender {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    /// SMS has no subject; it is ignored
    async fn send(&self, to: &str, _subject: &str, body: &str) -> Result<()> {
        let external = |message: String| Error::External {
            service: "sms",
            message,
        };
        if !self.config.is_enabled() {
            return Err(external("SMS gateway is not configured".to_string()));
        }

        let mut request = self.client.post(&self.config.gateway_url).json(&SmsRequest {
            to,
            from: &self.config.sender,
            text: body,
        });
        if !self.config.api_token.is_empty() {
            request = request.bearer_auth(&self.config.api_token);
        }

        let response = request.send().await.map_err(|e| external(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(external(format!("gateway returned {status}: {detail}")));
        }
        Ok(())
    }
}

// ============================================================================
// AUDIENCE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    AllActive,
    Ministry(String),
    Members(Vec<i64>),
}

impl Audience {
    /// Form encoding: `destino` = todos | ministerio | selecionados
    pub fn from_form(destino: &str, ministry: Option<&str>, member_ids: &[i64]) -> Result<Self> {
        match destino {
            "todos" => Ok(Audience::AllActive),
            "ministerio" => match ministry.map(str::trim) {
                Some(name) if !name.is_empty() => Ok(Audience::Ministry(name.to_string())),
                _ => Err(Error::validation("Escolha um ministério.")),
            },
            "selecionados" if !member_ids.is_empty() => Ok(Audience::Members(member_ids.to_vec())),
            "selecionados" => Err(Error::validation("Selecione pelo menos um membro.")),
            other => Err(Error::validation(format!("Destino inválido: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub member_id: i64,
    pub name: String,
    /// None when the member has no address for the channel
    pub address: Option<String>,
}

impl Recipient {
    fn for_channel(member: &Member, channel: Channel) -> Self {
        let address = match channel {
            Channel::Email => member.email.trim(),
            Channel::Sms => member.mobile.trim(),
        };
        Self {
            member_id: member.id,
            name: member.name.clone(),
            address: (!address.is_empty()).then(|| address.to_string()),
        }
    }
}

pub fn resolve_audience(conn: &Connection, audience: &Audience, channel: Channel) -> Result<Vec<Recipient>> {
    let members = match audience {
        Audience::AllActive => member::list_active(conn)?,
        Audience::Ministry(name) => member::list_by_ministry(conn, name)?,
        Audience::Members(ids) => {
            let mut members = Vec::with_capacity(ids.len());
            for id in ids {
                members.push(member::require(conn, *id)?);
            }
            members
        }
    };

    Ok(members
        .iter()
        .map(|m| Recipient::for_channel(m, channel))
        .collect())
}

// ============================================================================
// BROADCAST
// ============================================================================

#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub subject: String,
    pub body: String,
    pub sent_by: Option<i64>,
}

impl OutgoingMessage {
    pub fn validate(&self, channel: Channel) -> Result<()> {
        if self.body.trim().is_empty() {
            return Err(Error::validation("A mensagem não pode estar vazia."));
        }
        if channel == Channel::Email && self.subject.trim().is_empty() {
            return Err(Error::validation("Informe o assunto do e-mail."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastOutcome {
    pub sent: usize,
    pub failed: usize,
}

impl BroadcastOutcome {
    pub fn flash_message(&self) -> String {
        format!("Mensagens enviadas: {}. Falhas: {}.", self.sent, self.failed)
    }
}

/// Deliver to every recipient and log each attempt. The connection is
/// locked only around the log insert, never across a send.
#[instrument(skip_all, fields(channel = ?sender.channel(), recipients = recipients.len()))]
pub async fn broadcast(
    db: &Mutex<Connection>,
    sender: &dyn MessageSender,
    recipients: &[Recipient],
    message: &OutgoingMessage,
) -> Result<BroadcastOutcome> {
    let channel = sender.channel();
    message.validate(channel)?;

    let mut outcome = BroadcastOutcome::default();
    for recipient in recipients {
        let result = match &recipient.address {
            Some(address) => sender.send(address, &message.subject, &message.body).await,
            None => Err(Error::validation(format!(
                "{} sem {} cadastrado",
                recipient.name,
                match channel {
                    Channel::Email => "e-mail",
                    Channel::Sms => "celular",
                }
            ))),
        };

        let (status, error) = match result {
            Ok(()) => {
                outcome.sent += 1;
                (DeliveryStatus::Sent, None)
            }
            Err(e) => {
                warn!(member_id = recipient.member_id, error = %e, "delivery failed");
                outcome.failed += 1;
                (DeliveryStatus::Failed, Some(e.to_string()))
            }
        };

        let entry = MessageLogEntry {
            channel,
            recipient: recipient.address.clone().unwrap_or_default(),
            member_id: Some(recipient.member_id),
            subject: message.subject.clone(),
            body: message.body.clone(),
            status,
            error,
            sent_by: message.sent_by,
        };
        {
            let conn = db.lock().map_err(|_| Error::internal("lock database"))?;
            message::insert(&conn, &entry)?;
        }
    }

    info!(sent = outcome.sent, failed = outcome.failed, "broadcast finished");
    Ok(outcome)
}
