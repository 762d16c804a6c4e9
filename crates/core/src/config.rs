use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub crm: CrmConfig,
    pub payments: PaymentsConfig,
    pub lookup: LookupConfig,
    pub server: ServerConfig,
    pub reminders: ReminderConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub delivery_bot_token: SecretString,
    pub fulfilment_bot_token: SecretString,
    pub driver_bot_token: SecretString,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    /// Inbound webhook base, e.g. `https://example.bitrix24.ru/rest/1/<key>`.
    pub webhook_url: SecretString,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PaymentsConfig {
    pub token_url: String,
    pub invoice_url: String,
    pub user: String,
    pub password: SecretString,
    /// Shared secret for the payment notification digest.
    pub secret: SecretString,
    pub amount_tolerance: Decimal,
}

#[derive(Clone, Debug)]
pub struct LookupConfig {
    pub dadata_token: SecretString,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub api_prefix: String,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub hour: u32,
    pub minute: u32,
    pub timezone: Tz,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://cargolink.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            telegram: TelegramConfig {
                delivery_bot_token: String::new().into(),
                fulfilment_bot_token: String::new().into(),
                driver_bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
            },
            crm: CrmConfig { webhook_url: String::new().into(), timeout_secs: 20 },
            payments: PaymentsConfig {
                token_url: String::new(),
                invoice_url: String::new(),
                user: String::new(),
                password: String::new().into(),
                secret: String::new().into(),
                amount_tolerance: Decimal::new(1, 2),
            },
            lookup: LookupConfig {
                dadata_token: String::new().into(),
                base_url: "https://suggestions.dadata.ru".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                api_prefix: "/api".to_string(),
                graceful_shutdown_secs: 15,
            },
            reminders: ReminderConfig {
                enabled: true,
                hour: 9,
                minute: 0,
                timezone: chrono_tz::Europe::Moscow,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cargolink.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Whether every outbound collaborator has credentials.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let secrets = [
            ("telegram.delivery_bot_token", &self.telegram.delivery_bot_token),
            ("telegram.fulfilment_bot_token", &self.telegram.fulfilment_bot_token),
            ("telegram.driver_bot_token", &self.telegram.driver_bot_token),
            ("crm.webhook_url", &self.crm.webhook_url),
            ("payments.password", &self.payments.password),
            ("payments.secret", &self.payments.secret),
            ("lookup.dadata_token", &self.lookup.dadata_token),
        ];
        let mut missing: Vec<&'static str> = secrets
            .into_iter()
            .filter(|(_, value)| value.expose_secret().trim().is_empty())
            .map(|(name, _)| name)
            .collect();
        if self.payments.token_url.trim().is_empty() {
            missing.push("payments.token_url");
        }
        if self.payments.invoice_url.trim().is_empty() {
            missing.push("payments.invoice_url");
        }
        missing
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(token) = telegram.delivery_bot_token {
                self.telegram.delivery_bot_token = secret_value(token);
            }
            if let Some(token) = telegram.fulfilment_bot_token {
                self.telegram.fulfilment_bot_token = secret_value(token);
            }
            if let Some(token) = telegram.driver_bot_token {
                self.telegram.driver_bot_token = secret_value(token);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(webhook_url) = crm.webhook_url {
                self.crm.webhook_url = secret_value(webhook_url);
            }
            if let Some(timeout_secs) = crm.timeout_secs {
                self.crm.timeout_secs = timeout_secs;
            }
        }

        if let Some(payments) = patch.payments {
            if let Some(token_url) = payments.token_url {
                self.payments.token_url = token_url;
            }
            if let Some(invoice_url) = payments.invoice_url {
                self.payments.invoice_url = invoice_url;
            }
            if let Some(user) = payments.user {
                self.payments.user = user;
            }
            if let Some(password) = payments.password {
                self.payments.password = secret_value(password);
            }
            if let Some(secret) = payments.secret {
                self.payments.secret = secret_value(secret);
            }
            if let Some(tolerance) = payments.amount_tolerance {
                self.payments.amount_tolerance =
                    parse_decimal("payments.amount_tolerance", &tolerance)?;
            }
        }

        if let Some(lookup) = patch.lookup {
            if let Some(token) = lookup.dadata_token {
                self.lookup.dadata_token = secret_value(token);
            }
            if let Some(base_url) = lookup.base_url {
                self.lookup.base_url = base_url;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(api_prefix) = server.api_prefix {
                self.server.api_prefix = api_prefix;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(reminders) = patch.reminders {
            if let Some(enabled) = reminders.enabled {
                self.reminders.enabled = enabled;
            }
            if let Some(hour) = reminders.hour {
                self.reminders.hour = hour;
            }
            if let Some(minute) = reminders.minute {
                self.reminders.minute = minute;
            }
            if let Some(timezone) = reminders.timezone {
                self.reminders.timezone = parse_timezone(&timezone)?;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CARGOLINK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CARGOLINK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("CARGOLINK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CARGOLINK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CARGOLINK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CARGOLINK_TELEGRAM_DELIVERY_BOT_TOKEN") {
            self.telegram.delivery_bot_token = secret_value(value);
        }
        if let Some(value) = read_env("CARGOLINK_TELEGRAM_FULFILMENT_BOT_TOKEN") {
            self.telegram.fulfilment_bot_token = secret_value(value);
        }
        if let Some(value) = read_env("CARGOLINK_TELEGRAM_DRIVER_BOT_TOKEN") {
            self.telegram.driver_bot_token = secret_value(value);
        }
        if let Some(value) = read_env("CARGOLINK_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }

        if let Some(value) = read_env("CARGOLINK_CRM_WEBHOOK_URL") {
            self.crm.webhook_url = secret_value(value);
        }
        if let Some(value) = read_env("CARGOLINK_CRM_TIMEOUT_SECS") {
            self.crm.timeout_secs = parse_u64("CARGOLINK_CRM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CARGOLINK_PAYMENTS_TOKEN_URL") {
            self.payments.token_url = value;
        }
        if let Some(value) = read_env("CARGOLINK_PAYMENTS_INVOICE_URL") {
            self.payments.invoice_url = value;
        }
        if let Some(value) = read_env("CARGOLINK_PAYMENTS_USER") {
            self.payments.user = value;
        }
        if let Some(value) = read_env("CARGOLINK_PAYMENTS_PASSWORD") {
            self.payments.password = secret_value(value);
        }
        if let Some(value) = read_env("CARGOLINK_PAYMENTS_SECRET") {
            self.payments.secret = secret_value(value);
        }
        if let Some(value) = read_env("CARGOLINK_PAYMENTS_AMOUNT_TOLERANCE") {
            self.payments.amount_tolerance = Decimal::from_str(value.trim()).map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "CARGOLINK_PAYMENTS_AMOUNT_TOLERANCE".to_string(),
                    value,
                }
            })?;
        }

        if let Some(value) = read_env("CARGOLINK_LOOKUP_DADATA_TOKEN") {
            self.lookup.dadata_token = secret_value(value);
        }
        if let Some(value) = read_env("CARGOLINK_LOOKUP_BASE_URL") {
            self.lookup.base_url = value;
        }

        if let Some(value) = read_env("CARGOLINK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CARGOLINK_SERVER_PORT") {
            self.server.port = parse_u16("CARGOLINK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CARGOLINK_SERVER_API_PREFIX") {
            self.server.api_prefix = value;
        }
        if let Some(value) = read_env("CARGOLINK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CARGOLINK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CARGOLINK_REMINDERS_ENABLED") {
            self.reminders.enabled = parse_bool("CARGOLINK_REMINDERS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CARGOLINK_REMINDERS_HOUR") {
            self.reminders.hour = parse_u32("CARGOLINK_REMINDERS_HOUR", &value)?;
        }
        if let Some(value) = read_env("CARGOLINK_REMINDERS_MINUTE") {
            self.reminders.minute = parse_u32("CARGOLINK_REMINDERS_MINUTE", &value)?;
        }
        if let Some(value) = read_env("CARGOLINK_REMINDERS_TIMEZONE") {
            self.reminders.timezone = value.trim().parse::<Tz>().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "CARGOLINK_REMINDERS_TIMEZONE".to_string(),
                    value: value.clone(),
                }
            })?;
        }

        let log_level =
            read_env("CARGOLINK_LOGGING_LEVEL").or_else(|| read_env("CARGOLINK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CARGOLINK_LOGGING_FORMAT").or_else(|| read_env("CARGOLINK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_telegram(&self.telegram)?;
        validate_crm(&self.crm)?;
        validate_payments(&self.payments)?;
        validate_server(&self.server)?;
        validate_reminders(&self.reminders)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cargolink.toml"), PathBuf::from("config/cargolink.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let tokens = [
        ("telegram.delivery_bot_token", &telegram.delivery_bot_token),
        ("telegram.fulfilment_bot_token", &telegram.fulfilment_bot_token),
        ("telegram.driver_bot_token", &telegram.driver_bot_token),
    ];
    for (name, token) in tokens {
        let token = token.expose_secret();
        if token.is_empty() {
            continue;
        }
        let well_formed = token
            .split_once(':')
            .is_some_and(|(bot_id, rest)| {
                !bot_id.is_empty() && bot_id.chars().all(|c| c.is_ascii_digit()) && !rest.is_empty()
            });
        if !well_formed {
            return Err(ConfigError::Validation(format!(
                "{name} must look like `<bot id>:<secret>`. Get it from @BotFather"
            )));
        }
    }

    validate_http_url("telegram.api_base_url", &telegram.api_base_url)
}

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    let webhook_url = crm.webhook_url.expose_secret();
    if !webhook_url.is_empty() {
        validate_http_url("crm.webhook_url", webhook_url)?;
    }

    if crm.timeout_secs == 0 || crm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "crm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_payments(payments: &PaymentsConfig) -> Result<(), ConfigError> {
    for (name, url) in [
        ("payments.token_url", &payments.token_url),
        ("payments.invoice_url", &payments.invoice_url),
    ] {
        if !url.is_empty() {
            validate_http_url(name, url)?;
        }
    }

    if payments.amount_tolerance.is_sign_negative() {
        return Err(ConfigError::Validation(
            "payments.amount_tolerance must not be negative".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if !server.api_prefix.starts_with('/') || server.api_prefix.ends_with('/') {
        return Err(ConfigError::Validation(
            "server.api_prefix must start with `/` and must not end with `/`".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_reminders(reminders: &ReminderConfig) -> Result<(), ConfigError> {
    if reminders.hour > 23 || reminders.minute > 59 {
        return Err(ConfigError::Validation(
            "reminders.hour must be 0..=23 and reminders.minute must be 0..=59".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(name: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{name} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(name: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim())
        .map_err(|_| ConfigError::Validation(format!("{name} must be a decimal number")))
}

fn parse_timezone(value: &str) -> Result<Tz, ConfigError> {
    value.trim().parse::<Tz>().map_err(|_| {
        ConfigError::Validation(format!("reminders.timezone `{value}` is not an IANA timezone"))
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    telegram: Option<TelegramPatch>,
    crm: Option<CrmPatch>,
    payments: Option<PaymentsPatch>,
    lookup: Option<LookupPatch>,
    server: Option<ServerPatch>,
    reminders: Option<RemindersPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    delivery_bot_token: Option<String>,
    fulfilment_bot_token: Option<String>,
    driver_bot_token: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    webhook_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PaymentsPatch {
    token_url: Option<String>,
    invoice_url: Option<String>,
    user: Option<String>,
    password: Option<String>,
    secret: Option<String>,
    amount_tolerance: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LookupPatch {
    dadata_token: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    api_prefix: Option<String>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RemindersPatch {
    enabled: Option<bool>,
    hour: Option<u32>,
    minute: Option<u32>,
    timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
