use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::SecretString;

use cargolink_core::domain::session::BotRole;
use cargolink_core::domain::{ChatId, MessageId};
use cargolink_core::ports::{Clock, CrmGateway, IdentityLookup, PaymentGateway};
use cargolink_core::pricing::PricingEngine;
use cargolink_core::schedule::DEFAULT_HORIZON_DAYS;
use cargolink_db::{CalculationRepository, OrderRepository, SessionRepository};
use cargolink_telegram::{Notifiers, OutgoingMessage, ReplyMarkup};

#[derive(Clone)]
pub struct WorkflowSettings {
    pub horizon_days: u32,
    pub amount_tolerance: Decimal,
    /// Shared secret for the payment-notice digest.
    pub payment_secret: SecretString,
}

impl WorkflowSettings {
    pub fn new(payment_secret: SecretString) -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            amount_tolerance: Decimal::new(1, 2),
            payment_secret,
        }
    }

    pub fn with_amount_tolerance(mut self, tolerance: Decimal) -> Self {
        self.amount_tolerance = tolerance;
        self
    }
}

/// Everything a handler may touch. Built once at bootstrap and shared behind an `Arc`.
#[derive(Clone)]
pub struct Services {
    pub sessions: Arc<dyn SessionRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub calculations: Arc<dyn CalculationRepository>,
    pub notifiers: Notifiers,
    pub crm: Arc<dyn CrmGateway>,
    pub payments: Arc<dyn PaymentGateway>,
    pub lookup: Arc<dyn IdentityLookup>,
    pub pricing: Arc<dyn PricingEngine>,
    pub clock: Arc<dyn Clock>,
    pub settings: WorkflowSettings,
}

impl Services {
    /// Sends through the bot of `role`. Delivery is best-effort: failures are logged, not raised.
    pub async fn say(
        &self,
        role: BotRole,
        chat_id: ChatId,
        message: &OutgoingMessage,
    ) -> Option<MessageId> {
        match self.notifiers.for_role(role).send(chat_id, message).await {
            Ok(message_id) => Some(message_id),
            Err(error) => {
                tracing::warn!(
                    event_name = "notify.send_failed",
                    bot_role = %role,
                    chat_id,
                    error = %error,
                    "chat message was not delivered"
                );
                None
            }
        }
    }

    pub async fn retext(
        &self,
        role: BotRole,
        chat_id: ChatId,
        message_id: MessageId,
        message: &OutgoingMessage,
    ) {
        if let Err(error) =
            self.notifiers.for_role(role).edit_text(chat_id, message_id, message).await
        {
            tracing::warn!(
                event_name = "notify.edit_failed",
                bot_role = %role,
                chat_id,
                message_id,
                error = %error,
                "message text was not updated"
            );
        }
    }

    pub async fn swap_markup(
        &self,
        role: BotRole,
        chat_id: ChatId,
        message_id: MessageId,
        markup: &ReplyMarkup,
    ) {
        if let Err(error) =
            self.notifiers.for_role(role).edit_markup(chat_id, message_id, markup).await
        {
            tracing::warn!(
                event_name = "notify.markup_failed",
                bot_role = %role,
                chat_id,
                message_id,
                error = %error,
                "button was not updated"
            );
        }
    }

    pub async fn retract(&self, role: BotRole, chat_id: ChatId, message_id: MessageId) {
        if let Err(error) = self.notifiers.for_role(role).delete(chat_id, message_id).await {
            tracing::warn!(
                event_name = "notify.delete_failed",
                bot_role = %role,
                chat_id,
                message_id,
                error = %error,
                "message was not deleted"
            );
        }
    }
}
