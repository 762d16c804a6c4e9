//! Inbound HTTP surface: Bot API webhooks, CRM robot hooks and payment notices.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use cargolink_core::domain::session::BotRole;
use cargolink_core::errors::{ApplicationError, InterfaceError};
use cargolink_telegram::{ChatEvent, Update};
use cargolink_workflow::{
    ConversationDispatcher, CrmHook, DispatchOutcome, EventContext, PaymentAck, WorkflowError,
};

#[derive(Clone)]
pub struct WebhookState {
    dispatcher: Arc<ConversationDispatcher>,
}

impl WebhookState {
    pub fn new(dispatcher: Arc<ConversationDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
}

impl Ack {
    fn note(message: &'static str) -> Self {
        Self { ok: true, message: Some(message), deal_id: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
    pub correlation_id: String,
}

type Rejection = (StatusCode, Json<ErrorBody>);

pub fn router(state: WebhookState, api_prefix: &str) -> Router {
    let prefix = normalize_prefix(api_prefix);
    Router::new()
        .route(&format!("{prefix}/telegram/{{role}}"), post(telegram_update))
        .route(&format!("{prefix}/bitrix"), get(crm_hook).post(crm_hook))
        .route(&format!("{prefix}/payments"), post(payment_notice))
        .with_state(state)
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn new_correlation_id(source: &str) -> String {
    format!("{source}-{}", Uuid::new_v4().simple())
}

fn rejection(error: InterfaceError) -> Rejection {
    let (status, correlation_id) = match &error {
        InterfaceError::BadRequest { correlation_id, .. } => {
            (StatusCode::BAD_REQUEST, correlation_id.clone())
        }
        InterfaceError::NotFound { correlation_id, .. } => {
            (StatusCode::NOT_FOUND, correlation_id.clone())
        }
        InterfaceError::ServiceUnavailable { correlation_id, .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, correlation_id.clone())
        }
        InterfaceError::Internal { correlation_id, .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, correlation_id.clone())
        }
    };
    (status, Json(ErrorBody { ok: false, error: error.message().to_owned(), correlation_id }))
}

fn workflow_rejection(error: WorkflowError, ctx: &EventContext) -> Rejection {
    rejection(ApplicationError::from(error).into_interface(ctx.correlation_id.clone()))
}

/// Always acknowledges a decodable update so the Bot API does not redeliver it.
async fn telegram_update(
    Path(role_raw): Path<String>,
    State(state): State<WebhookState>,
    Json(update): Json<Update>,
) -> Result<Json<Ack>, Rejection> {
    let role = BotRole::from_str(&role_raw).map_err(|error| {
        rejection(ApplicationError::NotFound(error.to_string()).into_interface("telegram"))
    })?;

    let Some(event) = ChatEvent::from_update(role, update) else {
        debug!(event_name = "telegram.update.skipped", bot_role = %role, "update has no event");
        return Ok(Json(Ack::note("skipped")));
    };
    let ctx = EventContext::for_event(&event);

    match state.dispatcher.dispatch(&event, &ctx).await {
        Ok(DispatchOutcome::Handled(_)) => Ok(Json(Ack::note("handled"))),
        Ok(DispatchOutcome::Ignored) => Ok(Json(Ack::note("ignored"))),
        Err(failure) => {
            error!(
                event_name = "telegram.update.failed",
                correlation_id = %ctx.correlation_id,
                bot_role = %role,
                chat_id = event.chat_id,
                error = %failure,
                "chat event handler failed"
            );
            Ok(Json(Ack { ok: false, message: Some("failed"), deal_id: None }))
        }
    }
}

async fn crm_hook(
    State(state): State<WebhookState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Ack>, Rejection> {
    let ctx = EventContext::new(new_correlation_id("crm"));
    let hook = CrmHook::from_query(&params).map_err(|failure| {
        warn!(
            event_name = "crm.hook.rejected",
            correlation_id = %ctx.correlation_id,
            error = %failure,
            "CRM hook has no supported stage"
        );
        workflow_rejection(failure, &ctx)
    })?;

    let ack = state
        .dispatcher
        .coordinator()
        .handle_hook(&hook, &ctx)
        .await
        .map_err(|failure| {
            error!(
                event_name = "crm.hook.failed",
                correlation_id = %ctx.correlation_id,
                error = %failure,
                "CRM hook handling failed"
            );
            workflow_rejection(failure, &ctx)
        })?;
    Ok(Json(Ack {
        ok: true,
        message: Some(ack.message()),
        deal_id: hook.deal.map(|deal| deal.to_string()),
    }))
}

async fn payment_notice(
    State(state): State<WebhookState>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Json<Ack>, Rejection> {
    let ctx = EventContext::new(new_correlation_id("payment"));
    let ack = state
        .dispatcher
        .coordinator()
        .confirm_payment(&form, &ctx)
        .await
        .map_err(|failure| {
            error!(
                event_name = "payment.notice.failed",
                correlation_id = %ctx.correlation_id,
                error = %failure,
                "payment notice was not applied"
            );
            workflow_rejection(failure, &ctx)
        })?;

    let deal_id = match &ack {
        PaymentAck::Confirmed(deal) | PaymentAck::AlreadyPaid(deal) => deal.to_string(),
    };
    Ok(Json(Ack { ok: true, message: Some(ack.message()), deal_id: Some(deal_id) }))
}
