//! Runtime configuration read from the environment.
//!
//! Every setting has a default except the Graph credentials, which are
//! required once the Graph backend is selected, and SMTP alerting, which is
//! all-or-nothing.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::alert::{AlertChannel, LogAlertHook, SmtpAlertHook, SmtpConfig};
use crate::reconcile::{BackoffPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL};
use crate::storage::{AnyStore, GraphConfig, GraphDriveStore, LocalFileStore, DEFAULT_GRAPH_BASE_URL};
use crate::util::normalize_text_option;
use crate::{Error, Result};

pub const ENV_BACKEND: &str = "APONTAR_BACKEND";
pub const ENV_PATH: &str = "APONTAR_PATH";
pub const ENV_LOCAL_DIR: &str = "APONTAR_LOCAL_DIR";
pub const ENV_ACTOR: &str = "APONTAR_ACTOR";
pub const ENV_STUDIES_PATH: &str = "APONTAR_STUDIES_PATH";
pub const ENV_GRAPH_DRIVE_ID: &str = "GRAPH_DRIVE_ID";
pub const ENV_GRAPH_ACCESS_TOKEN: &str = "GRAPH_ACCESS_TOKEN";
pub const ENV_GRAPH_BASE_URL: &str = "GRAPH_BASE_URL";
pub const ENV_RETRY_INTERVAL_SECS: &str = "APONTAR_RETRY_INTERVAL_SECS";
pub const ENV_RETRY_MAX_ATTEMPTS: &str = "APONTAR_RETRY_MAX_ATTEMPTS";
pub const ENV_VERIFY_DELAY_SECS: &str = "APONTAR_VERIFY_DELAY_SECS";
pub const ENV_BACKUP_ON_ANOMALY: &str = "APONTAR_BACKUP_ON_ANOMALY";
pub const ENV_SMTP_HOST: &str = "SMTP_HOST";
pub const ENV_SMTP_PORT: &str = "SMTP_PORT";
pub const ENV_SMTP_USERNAME: &str = "SMTP_USERNAME";
pub const ENV_SMTP_PASSWORD: &str = "SMTP_PASSWORD";
pub const ENV_ALERT_FROM: &str = "ALERT_FROM";
pub const ENV_ALERT_TO: &str = "ALERT_TO";

pub const DEFAULT_WORKBOOK_PATH: &str = "apontamentos.xlsx";

/// Where the shared workbook lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// A directory on this machine or a synced network share.
    Local { dir: PathBuf },
    /// A SharePoint/OneDrive drive reached through Microsoft Graph.
    Graph(GraphConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: Backend,
    /// Workbook path relative to the backend root.
    pub path: String,
    /// Study catalog CSV in the same store. Study codes are free text when unset.
    pub studies_path: Option<String>,
    pub actor: Option<String>,
    pub retry_interval: Duration,
    pub retry_max_attempts: u32,
    pub verify_delay: Option<Duration>,
    pub backup_on_anomaly: bool,
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        parse_config(|key| env::var(key).ok())
    }

    #[must_use]
    pub const fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.retry_interval, self.retry_max_attempts)
    }

    /// Build the configured store.
    pub fn open_store(&self) -> Result<AnyStore> {
        match &self.backend {
            Backend::Local { dir } => Ok(AnyStore::Local(LocalFileStore::new(dir.clone()))),
            Backend::Graph(config) => Ok(AnyStore::Graph(GraphDriveStore::new(config.clone())?)),
        }
    }

    /// Build the configured alert channel. Without SMTP settings alerts go to the log.
    pub fn alert_channel(&self) -> Result<AlertChannel> {
        match &self.smtp {
            Some(config) => Ok(AlertChannel::Smtp(Box::new(SmtpAlertHook::new(config)?))),
            None => Ok(AlertChannel::Log(LogAlertHook)),
        }
    }
}

/// Parse configuration through `lookup`, which maps a variable name to its value.
pub fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<AppConfig> {
    let read = |key: &str| normalize_text_option(lookup(key));

    let backend = match read(ENV_BACKEND).map(|value| value.to_ascii_lowercase()).as_deref() {
        None | Some("local") => Backend::Local {
            dir: read(ENV_LOCAL_DIR).map_or_else(|| PathBuf::from("."), PathBuf::from),
        },
        Some("graph") => Backend::Graph(parse_graph(&read)?),
        Some(other) => {
            return Err(Error::Config(format!(
                "{ENV_BACKEND} must be 'local' or 'graph', got '{other}'"
            )))
        }
    };

    let retry_interval = read(ENV_RETRY_INTERVAL_SECS)
        .map(|value| parse_seconds(ENV_RETRY_INTERVAL_SECS, &value))
        .transpose()?
        .unwrap_or(DEFAULT_RETRY_INTERVAL);
    let retry_max_attempts = match read(ENV_RETRY_MAX_ATTEMPTS) {
        Some(value) => match value.parse::<u32>() {
            Ok(attempts) if attempts > 0 => attempts,
            _ => {
                return Err(Error::Config(format!(
                    "{ENV_RETRY_MAX_ATTEMPTS} must be a positive integer, got '{value}'"
                )))
            }
        },
        None => DEFAULT_MAX_ATTEMPTS,
    };
    let verify_delay = read(ENV_VERIFY_DELAY_SECS)
        .map(|value| parse_seconds(ENV_VERIFY_DELAY_SECS, &value))
        .transpose()?;
    let backup_on_anomaly = read(ENV_BACKUP_ON_ANOMALY)
        .map(|value| parse_flag(ENV_BACKUP_ON_ANOMALY, &value))
        .transpose()?
        .unwrap_or(true);

    Ok(AppConfig {
        backend,
        path: read(ENV_PATH).unwrap_or_else(|| DEFAULT_WORKBOOK_PATH.to_string()),
        studies_path: read(ENV_STUDIES_PATH),
        actor: read(ENV_ACTOR),
        retry_interval,
        retry_max_attempts,
        verify_delay,
        backup_on_anomaly,
        smtp: parse_smtp(&read)?,
    })
}

fn parse_graph(read: &impl Fn(&str) -> Option<String>) -> Result<GraphConfig> {
    let drive_id = read(ENV_GRAPH_DRIVE_ID);
    let access_token = read(ENV_GRAPH_ACCESS_TOKEN);

    let mut missing = Vec::new();
    if drive_id.is_none() {
        missing.push(ENV_GRAPH_DRIVE_ID);
    }
    if access_token.is_none() {
        missing.push(ENV_GRAPH_ACCESS_TOKEN);
    }
    let (Some(drive_id), Some(access_token)) = (drive_id, access_token) else {
        return Err(Error::Config(format!(
            "Graph backend is incomplete. Missing: {}",
            missing.join(", ")
        )));
    };

    Ok(GraphConfig {
        base_url: read(ENV_GRAPH_BASE_URL).unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.to_string()),
        drive_id,
        access_token,
    })
}

fn parse_smtp(read: &impl Fn(&str) -> Option<String>) -> Result<Option<SmtpConfig>> {
    const REQUIRED: [&str; 5] = [
        ENV_SMTP_HOST,
        ENV_SMTP_USERNAME,
        ENV_SMTP_PASSWORD,
        ENV_ALERT_FROM,
        ENV_ALERT_TO,
    ];

    let values = REQUIRED.map(|key| read(key));
    let port = read(ENV_SMTP_PORT);
    if values.iter().all(Option::is_none) && port.is_none() {
        return Ok(None);
    }

    let missing: Vec<&str> = REQUIRED
        .iter()
        .zip(&values)
        .filter(|(_, value)| value.is_none())
        .map(|(key, _)| *key)
        .collect();
    let [Some(host), Some(username), Some(password), Some(from), Some(to)] = values else {
        return Err(Error::Config(format!(
            "SMTP alerting is incomplete. Missing: {}",
            missing.join(", ")
        )));
    };

    let port = port
        .map(|value| {
            value.parse::<u16>().map_err(|_| {
                Error::Config(format!("{ENV_SMTP_PORT} must be a port number, got '{value}'"))
            })
        })
        .transpose()?;
    let to = to
        .split([',', ';'])
        .filter_map(|address| normalize_text_option(Some(address.to_string())))
        .collect::<Vec<_>>();
    if to.is_empty() {
        return Err(Error::Config(format!("{ENV_ALERT_TO} lists no addresses")));
    }

    Ok(Some(SmtpConfig {
        host,
        port,
        username,
        password,
        from,
        to,
    }))
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration> {
    value
        .parse::<f64>()
        .ok()
        .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
        .ok_or_else(|| {
            Error::Config(format!("{key} must be a non-negative number of seconds, got '{value}'"))
        })
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{key} must be true or false, got '{value}'"))),
    }
}
