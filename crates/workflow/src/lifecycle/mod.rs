//! Order Lifecycle Coordinator.
//!
//! Everything that happens to an order after submission arrives here: CRM hooks, driver
//! taps and replies, payment commands and the provider's payment notice. Each handler
//! loads the order by deal id, applies one lifecycle event through the transition table,
//! persists the order, and only then fans out to the CRM and the chats involved.
//!
//! Side effects after the local write are best-effort. A failed CRM update or chat send is
//! logged and does not undo the stored transition.
//! The payment notice is the one exception: the won stage must reach the CRM before the
//! order is marked paid.

mod crm;
mod driver;
mod payment;

use std::sync::Arc;

use cargolink_core::domain::order::{DealId, Order};
use cargolink_core::domain::session::{BotRole, SessionKey};
use cargolink_core::domain::{ChatId, MessageId};
use cargolink_core::flows::{LifecycleEvent, TransitionOutcome};
use cargolink_core::ports::DealUpdate;
use cargolink_telegram::{OutgoingMessage, ReplyMarkup};

use crate::dispatcher::EventContext;
use crate::error::WorkflowError;
use crate::services::Services;

pub use crm::{CrmHook, CrmHookAction, HookAck};
pub use payment::PaymentAck;

#[derive(Clone)]
pub struct LifecycleCoordinator {
    services: Arc<Services>,
}

impl LifecycleCoordinator {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    async fn order_for_deal(
        &self,
        deal: &DealId,
        ctx: &EventContext,
    ) -> Result<Option<Order>, WorkflowError> {
        let order = self.services.orders.find_by_deal_id(deal).await?;
        if order.is_none() {
            tracing::info!(
                event_name = "lifecycle.order_missing",
                correlation_id = %ctx.correlation_id,
                deal_id = %deal,
                "no order carries this deal id"
            );
        }
        Ok(order)
    }

    /// Applies `event`, or logs and returns `None` when the table forbids it.
    fn advance(
        order: &mut Order,
        event: LifecycleEvent,
        ctx: &EventContext,
    ) -> Option<TransitionOutcome> {
        match order.advance(event) {
            Ok(outcome) => {
                tracing::info!(
                    event_name = "lifecycle.transition",
                    correlation_id = %ctx.correlation_id,
                    deal_id = %order.deal_label(),
                    from = outcome.from.as_str(),
                    to = outcome.to.as_str(),
                    "order advanced"
                );
                Some(outcome)
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "lifecycle.transition_rejected",
                    correlation_id = %ctx.correlation_id,
                    deal_id = %order.deal_label(),
                    status = order.status.as_str(),
                    ?event,
                    error = %error,
                    "event does not apply to the order's status"
                );
                None
            }
        }
    }

    async fn save(&self, order: &mut Order) -> Result<(), WorkflowError> {
        order.updated_at = self.services.clock.now();
        self.services.orders.save(order).await?;
        Ok(())
    }

    async fn push_stage(&self, deal: &DealId, outcome: &TransitionOutcome, ctx: &EventContext) {
        if let Some(stage) = outcome.crm_stage() {
            self.push_update(deal, &DealUpdate::stage(stage), ctx).await;
        }
    }

    /// Best-effort CRM update; returns whether it went through.
    async fn push_update(&self, deal: &DealId, update: &DealUpdate, ctx: &EventContext) -> bool {
        if update.is_empty() {
            return true;
        }
        match self.services.crm.update_deal(deal, update).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    event_name = "lifecycle.crm_update_failed",
                    correlation_id = %ctx.correlation_id,
                    deal_id = %deal,
                    service = error.service,
                    error = %error,
                    "deal update was not applied"
                );
                false
            }
        }
    }

    /// Telegram username of the client chat that placed `order`, or a dash.
    async fn client_username(&self, order: &Order) -> Result<String, WorkflowError> {
        let key = SessionKey::new(order.chat_id, BotRole::for_deal_type(order.deal_type));
        let username = self
            .services
            .sessions
            .find(&key)
            .await?
            .and_then(|session| session.username().map(str::to_owned))
            .unwrap_or_else(|| "—".to_owned());
        Ok(username)
    }

    async fn notify_client(&self, order: &Order, message: OutgoingMessage) -> Option<MessageId> {
        let role = BotRole::for_deal_type(order.deal_type);
        self.services.say(role, order.chat_id, &message).await
    }

    async fn notify_driver(&self, chat_id: ChatId, message: OutgoingMessage) -> Option<MessageId> {
        self.services.say(BotRole::Driver, chat_id, &message).await
    }

    /// Swaps the single button under the order card in the assigned driver's chat.
    async fn set_driver_button(&self, order: &Order, markup: ReplyMarkup) {
        if let (Some(driver), Some(message_id)) = (&order.driver, order.messages.driver_order) {
            self.services.swap_markup(BotRole::Driver, driver.chat_id, message_id, &markup).await;
        }
    }

    /// Driver taps are honoured only from the chat the order was assigned to.
    fn assigned_to(order: &Order, driver_chat: ChatId, ctx: &EventContext) -> bool {
        let assigned = order.driver.as_ref().is_some_and(|driver| driver.chat_id == driver_chat);
        if !assigned {
            tracing::warn!(
                event_name = "lifecycle.foreign_driver",
                correlation_id = %ctx.correlation_id,
                chat_id = driver_chat,
                deal_id = %order.deal_label(),
                "driver action from a chat the order is not assigned to"
            );
        }
        assigned
    }
}
