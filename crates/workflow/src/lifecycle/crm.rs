use std::collections::HashMap;

use cargolink_core::domain::driver::{driver_display_name, driver_username};
use cargolink_core::domain::order::{DealId, DriverAssignment, MessageRefs};
use cargolink_core::domain::session::{BotRole, SessionKey, SessionPatch, StateGuard};
use cargolink_core::flows::LifecycleEvent;
use cargolink_telegram::{CallbackIntent, OutgoingMessage};

use super::LifecycleCoordinator;
use crate::dispatcher::EventContext;
use crate::error::WorkflowError;
use crate::messages::{self, driver_buttons};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrmHookAction {
    SetDriver,
    ChangeDriver,
    Payed,
}

impl CrmHookAction {
    pub fn parse(stage: &str) -> Option<Self> {
        match stage {
            "set_driver" => Some(Self::SetDriver),
            "change_driver" => Some(Self::ChangeDriver),
            "payed" => Some(Self::Payed),
            _ => None,
        }
    }
}

/// A CRM robot call: `?stage=set_driver&deal=D_123&driver=Иван tg:@ivan`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrmHook {
    pub action: CrmHookAction,
    pub deal: Option<DealId>,
    pub driver: Option<String>,
}

impl CrmHook {
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, WorkflowError> {
        let stage = params.get("stage").map(|stage| stage.trim()).unwrap_or_default();
        let action = CrmHookAction::parse(stage)
            .ok_or_else(|| WorkflowError::UnknownHookStage(stage.to_owned()))?;
        Ok(Self {
            action,
            deal: params.get("deal").and_then(|raw| DealId::from_hook_param(raw)),
            driver: params
                .get("driver")
                .map(|driver| driver.trim().to_owned())
                .filter(|driver| !driver.is_empty()),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookAck {
    DriverAssigned,
    DriverChanged,
    PaymentReceived,
}

impl HookAck {
    pub fn message(self) -> &'static str {
        match self {
            Self::DriverAssigned => "driver assigned",
            Self::DriverChanged => "driver changed",
            Self::PaymentReceived => "payment received",
        }
    }
}

impl LifecycleCoordinator {
    /// Runs a CRM hook. Unknown orders or drivers are logged and acknowledged anyway.
    pub async fn handle_hook(
        &self,
        hook: &CrmHook,
        ctx: &EventContext,
    ) -> Result<HookAck, WorkflowError> {
        tracing::info!(
            event_name = "lifecycle.crm_hook",
            correlation_id = %ctx.correlation_id,
            action = ?hook.action,
            deal_id = hook.deal.as_ref().map(ToString::to_string).unwrap_or_default(),
            "CRM hook received"
        );
        match hook.action {
            CrmHookAction::SetDriver => {
                if let (Some(deal), Some(driver)) = (&hook.deal, &hook.driver) {
                    self.assign_driver(deal, driver, ctx).await?;
                }
                Ok(HookAck::DriverAssigned)
            }
            CrmHookAction::ChangeDriver => {
                if let Some(deal) = &hook.deal {
                    self.change_driver(deal, ctx).await?;
                }
                Ok(HookAck::DriverChanged)
            }
            CrmHookAction::Payed => {
                if let Some(deal) = &hook.deal {
                    self.crm_payed(deal, ctx).await?;
                }
                Ok(HookAck::PaymentReceived)
            }
        }
    }

    pub async fn assign_driver(
        &self,
        deal: &DealId,
        driver_field: &str,
        ctx: &EventContext,
    ) -> Result<(), WorkflowError> {
        let Some(mut order) = self.order_for_deal(deal, ctx).await? else {
            return Ok(());
        };
        let services = self.services();

        let Some(username) = driver_username(driver_field) else {
            tracing::warn!(
                event_name = "lifecycle.driver_unresolved",
                correlation_id = %ctx.correlation_id,
                deal_id = %deal,
                driver = driver_field,
                "driver field carries no telegram mention"
            );
            return Ok(());
        };
        let Some(driver) = services.sessions.find_by_username(BotRole::Driver, &username).await?
        else {
            tracing::warn!(
                event_name = "lifecycle.driver_unregistered",
                correlation_id = %ctx.correlation_id,
                deal_id = %deal,
                username = %username,
                "driver has not started the driver bot"
            );
            return Ok(());
        };
        let driver_chat = driver.key.chat_id;

        let Some(outcome) = Self::advance(&mut order, LifecycleEvent::DriverAssigned, ctx) else {
            return Ok(());
        };

        let client_username = self.client_username(&order).await?;

        // Re-assignment to someone else leaves the previous card stale; mark it cancelled.
        if let (Some(previous), Some(card)) = (&order.driver, order.messages.driver_order) {
            if previous.chat_id != driver_chat {
                services
                    .swap_markup(
                        BotRole::Driver,
                        previous.chat_id,
                        card,
                        &messages::driver_status(driver_buttons::CANCELLED),
                    )
                    .await;
            }
        }

        let picked_up = CallbackIntent::PickedUp(deal.clone());
        let card = OutgoingMessage::html(messages::driver_card(&order, &client_username))
            .markup(messages::driver_action(driver_buttons::PICKED_UP, picked_up));
        order.messages.driver_order = self.notify_driver(driver_chat, card).await;
        order.driver = Some(DriverAssignment { chat_id: driver_chat, username: username.clone() });

        let notice = messages::driver_assigned(&order, &driver_display_name(driver_field));
        order.messages.client_driver_notice =
            self.notify_client(&order, OutgoingMessage::markdown(notice)).await;
        self.save(&mut order).await?;

        tracing::info!(
            event_name = "lifecycle.driver_assigned",
            correlation_id = %ctx.correlation_id,
            deal_id = %deal,
            chat_id = driver_chat,
            username = %username,
            from = outcome.from.as_str(),
            "driver assigned"
        );
        Ok(())
    }

    pub async fn change_driver(
        &self,
        deal: &DealId,
        ctx: &EventContext,
    ) -> Result<(), WorkflowError> {
        let Some(mut order) = self.order_for_deal(deal, ctx).await? else {
            return Ok(());
        };
        let services = self.services();

        if let Some(driver) = order.driver.clone() {
            let cancelled = OutgoingMessage::markdown(messages::order_cancelled(deal));
            self.notify_driver(driver.chat_id, cancelled).await;
            let cancelled_button = messages::driver_status(driver_buttons::CANCELLED);
            self.set_driver_button(&order, cancelled_button).await;

            // A driver still mid-prompt for this deal must not be able to finish it.
            let key = SessionKey::new(driver.chat_id, BotRole::Driver);
            if let Some(session) = services.sessions.find(&key).await? {
                let waiting = session.state.filter(|state| state.is_blocking());
                if waiting.is_some() && session.active_deal.as_ref() == Some(deal) {
                    services
                        .sessions
                        .update(
                            &key,
                            StateGuard::Is(waiting),
                            &SessionPatch::reset(),
                            services.clock.now(),
                        )
                        .await?;
                }
            }
        }
        if let Some(notice) = order.messages.client_driver_notice {
            services
                .retract(BotRole::for_deal_type(order.deal_type), order.chat_id, notice)
                .await;
        }

        if Self::advance(&mut order, LifecycleEvent::DriverReleased, ctx).is_some() {
            order.driver = None;
            order.messages =
                MessageRefs { summary: order.messages.summary, ..MessageRefs::default() };
            self.save(&mut order).await?;
        }
        tracing::info!(
            event_name = "lifecycle.driver_changed",
            correlation_id = %ctx.correlation_id,
            deal_id = %deal,
            "driver released"
        );
        Ok(())
    }

    /// Payment recorded by an operator in the CRM. No stage push: the CRM already moved.
    pub async fn crm_payed(&self, deal: &DealId, ctx: &EventContext) -> Result<(), WorkflowError> {
        let services = self.services();
        if !services.orders.mark_paid(deal, services.clock.now()).await? {
            tracing::info!(
                event_name = "lifecycle.already_paid",
                correlation_id = %ctx.correlation_id,
                deal_id = %deal,
                "order missing or already paid"
            );
            return Ok(());
        }
        let Some(order) = self.order_for_deal(deal, ctx).await? else {
            return Ok(());
        };
        self.announce_paid(&order).await;
        Ok(())
    }
}
