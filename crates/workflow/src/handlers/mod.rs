//! Per-route handlers. Each runs against one [`Turn`]: the event, the session as it was
//! when the route was chosen, and the shared services.

pub mod calc;
pub mod driver;
pub mod intake;
pub mod menu;

use cargolink_core::domain::order::{DealType, Order};
use cargolink_core::domain::session::{BotRole, ChatSession, SessionKey, SessionPatch, StateGuard};
use cargolink_core::domain::{ChatId, MessageId};
use cargolink_telegram::{ChatEvent, EventKind, OutgoingMessage};

use crate::dispatcher::EventContext;
use crate::error::WorkflowError;
use crate::messages::{self, Wording};
use crate::services::Services;

pub struct Turn<'a> {
    pub services: &'a Services,
    pub event: &'a ChatEvent,
    pub session: ChatSession,
    pub ctx: &'a EventContext,
}

impl Turn<'_> {
    pub fn role(&self) -> BotRole {
        self.event.bot_role
    }

    pub fn chat_id(&self) -> ChatId {
        self.event.chat_id
    }

    pub fn key(&self) -> SessionKey {
        self.session.key
    }

    /// Free text of the event; empty for contacts and callbacks.
    pub fn text(&self) -> &str {
        match &self.event.kind {
            EventKind::Text(text) => text,
            _ => "",
        }
    }

    pub fn deal_type(&self) -> DealType {
        self.role().deal_type().unwrap_or(DealType::Delivery)
    }

    pub fn wording(&self) -> &'static Wording {
        messages::wording(self.role())
    }

    pub async fn reply(&self, message: OutgoingMessage) -> Option<MessageId> {
        self.services.say(self.role(), self.chat_id(), &message).await
    }

    /// Applies `patch` only if the session is still in the state this turn was routed on.
    pub async fn transition(&self, patch: SessionPatch) -> Result<bool, WorkflowError> {
        let applied = self
            .services
            .sessions
            .update(
                &self.key(),
                StateGuard::Is(self.session.state),
                &patch,
                self.services.clock.now(),
            )
            .await?;
        if !applied {
            tracing::info!(
                event_name = "dispatch.stale_state",
                correlation_id = %self.ctx.correlation_id,
                chat_id = self.chat_id(),
                bot_role = %self.role(),
                expected_state = ?self.session.state,
                "session moved on while the event was handled"
            );
        }
        Ok(applied)
    }

    /// Unconditional update, for commands that apply whatever the current state.
    pub async fn overwrite(&self, patch: SessionPatch) -> Result<(), WorkflowError> {
        self.services
            .sessions
            .update(&self.key(), StateGuard::Any, &patch, self.services.clock.now())
            .await?;
        Ok(())
    }

    pub async fn active_order(&self) -> Result<Option<Order>, WorkflowError> {
        match &self.session.active_order {
            Some(order_id) => Ok(self.services.orders.find_by_id(order_id).await?),
            None => Ok(None),
        }
    }

    pub async fn save_order(&self, order: &mut Order) -> Result<(), WorkflowError> {
        order.updated_at = self.services.clock.now();
        self.services.orders.save(order).await?;
        Ok(())
    }
}
