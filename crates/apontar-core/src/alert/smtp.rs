//! E-mail delivery of anomaly alerts over SMTP.

use std::fmt;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{AlertHook, AnomalyEvent};
use crate::error::{Error, Result};

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// SMTP relay settings for anomaly alerts.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Sends the alert report with the pre-merge workbook attached.
pub struct SmtpAlertHook {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl fmt::Debug for SmtpAlertHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpAlertHook")
            .field("from", &self.from.to_string())
            .field("to", &self.to.len())
            .finish_non_exhaustive()
    }
}

impl SmtpAlertHook {
    /// Build the hook. No connection is made until an alert is sent.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from = parse_mailbox(&config.from)?;
        let to = config
            .to
            .iter()
            .map(|address| parse_mailbox(address))
            .collect::<Result<Vec<_>>>()?;
        if to.is_empty() {
            return Err(Error::Config("alert recipient list is empty".to_string()));
        }

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|error| Error::Config(format!("invalid SMTP host: {error}")))?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        if let Some(port) = config.port {
            builder = builder.port(port);
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    fn build_message(&self, event: &AnomalyEvent) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(format!(
                "[apontar] Record count dropped from {} to {}",
                event.before_count, event.after_count
            ));
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        let mut body = MultiPart::mixed().singlepart(SinglePart::plain(event.report()));
        if !event.backup.is_empty() {
            let content_type = ContentType::parse(XLSX_CONTENT_TYPE)
                .map_err(|error| Error::Alert(error.to_string()))?;
            body = body.singlepart(
                Attachment::new(backup_file_name(event)).body(event.backup.clone(), content_type),
            );
        }

        builder
            .multipart(body)
            .map_err(|error| Error::Alert(error.to_string()))
    }
}

impl AlertHook for SmtpAlertHook {
    async fn notify(&self, event: &AnomalyEvent) -> bool {
        let message = match self.build_message(event) {
            Ok(message) => message,
            Err(error) => {
                tracing::error!("Failed to build alert e-mail: {error}");
                return false;
            }
        };

        match self.transport.send(message).await {
            Ok(_) => {
                tracing::info!(recipients = self.to.len(), "Anomaly alert e-mail sent");
                true
            }
            Err(error) => {
                tracing::error!("Failed to send alert e-mail: {error}");
                false
            }
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse()
        .map_err(|error| Error::Config(format!("invalid e-mail address '{address}': {error}")))
}

fn backup_file_name(event: &AnomalyEvent) -> String {
    event
        .backup_path
        .as_deref()
        .and_then(|path| path.rsplit('/').next())
        .map_or_else(
            || format!("backup-{}.xlsx", event.timestamp.format("%Y%m%dT%H%M%S")),
            ToString::to_string,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::tests::sample_event;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: Some(2525),
            username: "alerts".to_string(),
            password: "hunter2".to_string(),
            from: "alerts@example.com".to_string(),
            to: vec!["qa@example.com".to_string(), "lead@example.com".to_string()],
        }
    }

    #[test]
    fn debug_redacts_password() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn rejects_invalid_addresses() {
        let mut bad = config();
        bad.to = vec!["not an address".to_string()];
        assert!(matches!(SmtpAlertHook::new(&bad), Err(Error::Config(_))));

        bad.to = Vec::new();
        assert!(matches!(SmtpAlertHook::new(&bad), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn message_carries_counts_and_backup() {
        let hook = SmtpAlertHook::new(&config()).unwrap();
        let message = hook.build_message(&sample_event()).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();

        assert!(raw.contains("Record count dropped from 10 to 8"));
        assert!(raw.contains("qa@example.com"));
        assert!(raw.contains("apontamentos.backup-20240601T080000.xlsx"));
    }

    #[test]
    fn backup_name_falls_back_to_timestamp() {
        let mut event = sample_event();
        event.backup_path = None;
        assert_eq!(backup_file_name(&event), "backup-20240601T080000.xlsx");
    }
}
