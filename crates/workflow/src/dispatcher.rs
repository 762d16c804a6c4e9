use std::sync::Arc;

use cargolink_core::domain::session::{BotRole, ConversationState};
use cargolink_telegram::{ChatEvent, EventKind};

use crate::error::WorkflowError;
use crate::handlers::{calc, driver, intake, menu, Turn};
use crate::lifecycle::LifecycleCoordinator;
use crate::routes::{Route, RouteTable};
use crate::services::Services;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into() }
    }

    pub fn for_event(event: &ChatEvent) -> Self {
        Self::new(event.correlation_id())
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled(Route),
    /// No route for this event; nothing was read back or written.
    Ignored,
}

/// Conversational Dispatcher: one inbound chat event in, at most one handler run.
pub struct ConversationDispatcher {
    services: Arc<Services>,
    routes: RouteTable,
    coordinator: LifecycleCoordinator,
}

impl ConversationDispatcher {
    pub fn new(services: Arc<Services>) -> Self {
        Self::with_routes(services, RouteTable::standard())
    }

    pub fn with_routes(services: Arc<Services>, routes: RouteTable) -> Self {
        let coordinator = LifecycleCoordinator::new(Arc::clone(&services));
        Self { services, routes, coordinator }
    }

    pub fn coordinator(&self) -> &LifecycleCoordinator {
        &self.coordinator
    }

    pub async fn dispatch(
        &self,
        event: &ChatEvent,
        ctx: &EventContext,
    ) -> Result<DispatchOutcome, WorkflowError> {
        if let EventKind::Callback { query_id, .. } = &event.kind {
            self.acknowledge(event.bot_role, query_id, ctx).await;
        }

        let key = event.session_key();
        let stored = self.services.sessions.find(&key).await?;
        let state = stored.as_ref().and_then(|session| session.state);

        let Some(route) = self.routes.resolve(event, state) else {
            tracing::debug!(
                event_name = "dispatch.unrouted",
                correlation_id = %ctx.correlation_id,
                chat_id = event.chat_id,
                bot_role = %event.bot_role,
                state = ?state,
                "no handler for event"
            );
            return Ok(DispatchOutcome::Ignored);
        };

        let session =
            self.services.sessions.register(&key, &event.sender, self.services.clock.now()).await?;
        tracing::debug!(
            event_name = "dispatch.routed",
            correlation_id = %ctx.correlation_id,
            chat_id = event.chat_id,
            bot_role = %event.bot_role,
            route = ?route,
            "dispatching event"
        );

        let turn = Turn { services: &self.services, event, session, ctx };
        self.run(&turn, route).await?;
        Ok(DispatchOutcome::Handled(route))
    }

    async fn run(&self, turn: &Turn<'_>, route: Route) -> Result<(), WorkflowError> {
        let coordinator = &self.coordinator;
        match route {
            Route::Welcome => menu::welcome(turn).await,
            Route::IntakeIntro => menu::intake_intro(turn).await,
            Route::IntakeBegin => intake::begin(turn).await,
            Route::CalcBegin => calc::begin(turn).await,
            Route::PayByInvoice => coordinator.request_invoice(turn.chat_id(), turn.ctx).await,
            Route::PayBySbp => coordinator.request_sbp(turn.chat_id(), turn.ctx).await,
            Route::DriverRegister => driver::register(turn).await,
            Route::Driver(action) => driver::action(turn, coordinator, action).await,
            Route::Reprompt(state) => driver::reprompt(turn, coordinator, state).await,
            Route::Step(state) => match (turn.role(), state) {
                (BotRole::Driver, _) => driver::step(turn, coordinator, state).await,
                (_, ConversationState::Start) => menu::fulfilment_idle(turn).await,
                (
                    _,
                    ConversationState::CalcWarehouse
                    | ConversationState::CalcCargoType
                    | ConversationState::CalcQuantity,
                ) => calc::step(turn, state).await,
                _ => intake::step(turn, state).await,
            },
        }
    }

    async fn acknowledge(&self, role: BotRole, query_id: &str, ctx: &EventContext) {
        if let Err(error) = self.services.notifiers.for_role(role).answer_callback(query_id).await {
            tracing::warn!(
                event_name = "notify.callback_answer_failed",
                correlation_id = %ctx.correlation_id,
                bot_role = %role,
                error = %error,
                "callback query was not answered"
            );
        }
    }
}
