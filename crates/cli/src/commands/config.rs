use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cargolink_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct Entry {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

impl Entry {
    fn new(key: &'static str, env_key: &'static str, value: impl Into<String>) -> Self {
        Self { key, env_key, value: value.into() }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries(&config) {
        let source = field_source(
            entry.key,
            entry.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }

    lines.join("\n")
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    let database = &config.database;
    let telegram = &config.telegram;
    let payments = &config.payments;
    let server = &config.server;
    let reminders = &config.reminders;

    vec![
        Entry::new("database.url", "CARGOLINK_DATABASE_URL", &database.url),
        Entry::new(
            "database.max_connections",
            "CARGOLINK_DATABASE_MAX_CONNECTIONS",
            database.max_connections.to_string(),
        ),
        Entry::new(
            "database.timeout_secs",
            "CARGOLINK_DATABASE_TIMEOUT_SECS",
            database.timeout_secs.to_string(),
        ),
        Entry::new(
            "telegram.delivery_bot_token",
            "CARGOLINK_TELEGRAM_DELIVERY_BOT_TOKEN",
            redact_bot_token(&telegram.delivery_bot_token),
        ),
        Entry::new(
            "telegram.fulfilment_bot_token",
            "CARGOLINK_TELEGRAM_FULFILMENT_BOT_TOKEN",
            redact_bot_token(&telegram.fulfilment_bot_token),
        ),
        Entry::new(
            "telegram.driver_bot_token",
            "CARGOLINK_TELEGRAM_DRIVER_BOT_TOKEN",
            redact_bot_token(&telegram.driver_bot_token),
        ),
        Entry::new(
            "telegram.api_base_url",
            "CARGOLINK_TELEGRAM_API_BASE_URL",
            &telegram.api_base_url,
        ),
        Entry::new(
            "crm.webhook_url",
            "CARGOLINK_CRM_WEBHOOK_URL",
            redact_url(&config.crm.webhook_url),
        ),
        Entry::new(
            "crm.timeout_secs",
            "CARGOLINK_CRM_TIMEOUT_SECS",
            config.crm.timeout_secs.to_string(),
        ),
        Entry::new(
            "payments.token_url",
            "CARGOLINK_PAYMENTS_TOKEN_URL",
            or_unset(&payments.token_url),
        ),
        Entry::new(
            "payments.invoice_url",
            "CARGOLINK_PAYMENTS_INVOICE_URL",
            or_unset(&payments.invoice_url),
        ),
        Entry::new("payments.user", "CARGOLINK_PAYMENTS_USER", or_unset(&payments.user)),
        Entry::new("payments.password", "CARGOLINK_PAYMENTS_PASSWORD", redact(&payments.password)),
        Entry::new("payments.secret", "CARGOLINK_PAYMENTS_SECRET", redact(&payments.secret)),
        Entry::new(
            "payments.amount_tolerance",
            "CARGOLINK_PAYMENTS_AMOUNT_TOLERANCE",
            payments.amount_tolerance.to_string(),
        ),
        Entry::new(
            "lookup.dadata_token",
            "CARGOLINK_LOOKUP_DADATA_TOKEN",
            redact(&config.lookup.dadata_token),
        ),
        Entry::new("lookup.base_url", "CARGOLINK_LOOKUP_BASE_URL", &config.lookup.base_url),
        Entry::new("server.bind_address", "CARGOLINK_SERVER_BIND_ADDRESS", &server.bind_address),
        Entry::new("server.port", "CARGOLINK_SERVER_PORT", server.port.to_string()),
        Entry::new("server.api_prefix", "CARGOLINK_SERVER_API_PREFIX", &server.api_prefix),
        Entry::new(
            "server.graceful_shutdown_secs",
            "CARGOLINK_SERVER_GRACEFUL_SHUTDOWN_SECS",
            server.graceful_shutdown_secs.to_string(),
        ),
        Entry::new(
            "reminders.enabled",
            "CARGOLINK_REMINDERS_ENABLED",
            reminders.enabled.to_string(),
        ),
        Entry::new(
            "reminders.time",
            "CARGOLINK_REMINDERS_HOUR",
            format!("{:02}:{:02}", reminders.hour, reminders.minute),
        ),
        Entry::new(
            "reminders.timezone",
            "CARGOLINK_REMINDERS_TIMEZONE",
            reminders.timezone.name(),
        ),
        Entry::new("logging.level", "CARGOLINK_LOGGING_LEVEL", &config.logging.level),
        Entry::new(
            "logging.format",
            "CARGOLINK_LOGGING_FORMAT",
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("cargolink.toml"), PathBuf::from("config/cargolink.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    // `reminders.time` is rendered from two file keys.
    let file_key = if key_path == "reminders.time" { "reminders.hour" } else { key_path };
    if let Some(doc) = config_file_doc {
        if contains_path(doc, file_key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn or_unset(value: &str) -> String {
    if value.trim().is_empty() {
        "<unset>".to_string()
    } else {
        value.to_string()
    }
}

fn redact(secret: &SecretString) -> String {
    if secret.expose_secret().trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}

/// Bot API tokens are `<bot id>:<key>`; the bot id is not secret.
fn redact_bot_token(secret: &SecretString) -> String {
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "<redacted>".to_string(),
    }
}

/// Webhook URLs carry the key in the path, so only scheme and host are shown.
fn redact_url(secret: &SecretString) -> String {
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once("://") {
        Some((scheme, rest)) => {
            let host = rest.split('/').next().unwrap_or_default();
            format!("{scheme}://{host}/***")
        }
        None => "<redacted>".to_string(),
    }
}
