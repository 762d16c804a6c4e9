use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use cargolink_core::config::AppConfig;
use cargolink_core::domain::session::BotRole;
use cargolink_core::ports::SystemClock;
use cargolink_core::pricing::TariffPricingEngine;
use cargolink_db::{
    connect_with_settings, migrations, DbPool, SqlCalculationRepository, SqlOrderRepository,
    SqlSessionRepository,
};
use cargolink_telegram::{BotApiClient, Notifiers};
use cargolink_workflow::{ConversationDispatcher, PaymentReminderJob, Services, WorkflowSettings};
use reqwest::Client;
use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, warn};

use crate::bitrix::BitrixCrm;
use crate::dadata::DaDataLookup;
use crate::paykeeper::PayKeeperGateway;
use crate::{health, webhooks};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub services: Arc<Services>,
    pub dispatcher: Arc<ConversationDispatcher>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl Application {
    /// Webhook routes under the API prefix plus `/health`.
    pub fn router(&self) -> Router {
        let state = webhooks::WebhookState::new(Arc::clone(&self.dispatcher));
        webhooks::router(state, &self.config.server.api_prefix)
            .merge(health::router(self.db_pool.clone()))
    }

    pub fn reminder_job(&self) -> PaymentReminderJob {
        PaymentReminderJob::new(Arc::clone(&self.services))
    }
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let missing = config.missing_credentials();
    if !missing.is_empty() {
        warn!(
            event_name = "system.bootstrap.credentials_missing",
            correlation_id = "bootstrap",
            missing = %missing.join(","),
            "outbound collaborators without credentials will fail at call time"
        );
    }

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let services = Arc::new(build_services(&config, &db_pool)?);
    let dispatcher = Arc::new(ConversationDispatcher::new(Arc::clone(&services)));
    info!(
        event_name = "system.bootstrap.services_ready",
        correlation_id = "bootstrap",
        "workflow services wired"
    );

    Ok(Application { config, db_pool, services, dispatcher })
}

fn build_services(config: &AppConfig, db_pool: &DbPool) -> Result<Services, BootstrapError> {
    let http = Client::builder()
        .timeout(Duration::from_secs(config.crm.timeout_secs))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let telegram = &config.telegram;
    let bot = |role: BotRole, token: SecretString| {
        let base_url = telegram.api_base_url.clone();
        Arc::new(BotApiClient::with_client(role, http.clone(), base_url, token))
    };
    let notifiers = Notifiers {
        delivery: bot(BotRole::ClientDelivery, telegram.delivery_bot_token.clone()),
        fulfilment: bot(BotRole::ClientFulfilment, telegram.fulfilment_bot_token.clone()),
        driver: bot(BotRole::Driver, telegram.driver_bot_token.clone()),
    };

    let payments = &config.payments;
    let settings = WorkflowSettings::new(payments.secret.clone())
        .with_amount_tolerance(payments.amount_tolerance);

    Ok(Services {
        sessions: Arc::new(SqlSessionRepository::new(db_pool.clone())),
        orders: Arc::new(SqlOrderRepository::new(db_pool.clone())),
        calculations: Arc::new(SqlCalculationRepository::new(db_pool.clone())),
        notifiers,
        crm: Arc::new(BitrixCrm::new(http.clone(), config.crm.webhook_url.clone())),
        payments: Arc::new(PayKeeperGateway::new(
            http.clone(),
            payments.token_url.clone(),
            payments.invoice_url.clone(),
            payments.user.clone(),
            payments.password.clone(),
        )),
        lookup: Arc::new(DaDataLookup::new(
            http.clone(),
            config.lookup.base_url.clone(),
            config.lookup.dadata_token.clone(),
        )),
        pricing: Arc::new(TariffPricingEngine),
        clock: Arc::new(SystemClock::new(config.reminders.timezone)),
        settings,
    })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use cargolink_core::config::AppConfig;
    use tower::ServiceExt;

    use crate::bootstrap::{bootstrap_with_config, BootstrapError};

    #[tokio::test]
    async fn bootstrap_reports_unreachable_database() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite:///cargolink-missing-dir/nested/cargolink.db".to_string();
        config.database.timeout_secs = 1;

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::DatabaseConnect(_))));
    }

    #[tokio::test]
    async fn bootstrap_applies_schema_and_serves_health() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();

        let app = bootstrap_with_config(config).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('chat_sessions', 'orders', 'calculations')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 3, "bootstrap should apply the store schema");

        let response = app
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health responds");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
