use cargolink_core::domain::order::{DealId, Handover, OrderStatus};
use cargolink_core::domain::session::{
    BotRole, ConversationState, SessionKey, SessionPatch, StateGuard,
};
use cargolink_core::domain::ChatId;
use cargolink_core::flows::{LifecycleEvent, OrderLifecycle};
use cargolink_core::ports::DealUpdate;
use cargolink_telegram::{CallbackIntent, OutgoingMessage, ReplyMarkup};

use super::LifecycleCoordinator;
use crate::dispatcher::EventContext;
use crate::error::WorkflowError;
use crate::messages::{self, driver_buttons};

impl LifecycleCoordinator {
    /// Parks the driver session on `state` for `deal`, whatever it held before.
    async fn hold_driver(
        &self,
        driver_chat: ChatId,
        state: ConversationState,
        deal: &DealId,
    ) -> Result<(), WorkflowError> {
        let services = self.services();
        services
            .sessions
            .update(
                &SessionKey::new(driver_chat, BotRole::Driver),
                StateGuard::Any,
                &SessionPatch::to_state(state).with_active_deal(deal.clone()),
                services.clock.now(),
            )
            .await?;
        Ok(())
    }

    /// Releases the driver session if it still waits in `state`. `false` means another
    /// event already consumed the wait.
    async fn release_driver(
        &self,
        driver_chat: ChatId,
        state: ConversationState,
    ) -> Result<bool, WorkflowError> {
        let services = self.services();
        let released = services
            .sessions
            .update(
                &SessionKey::new(driver_chat, BotRole::Driver),
                StateGuard::Is(Some(state)),
                &SessionPatch::reset(),
                services.clock.now(),
            )
            .await?;
        Ok(released)
    }

    pub async fn picked_up(
        &self,
        driver_chat: ChatId,
        deal: &DealId,
        ctx: &EventContext,
    ) -> Result<(), WorkflowError> {
        let Some(order) = self.order_for_deal(deal, ctx).await? else {
            return Ok(());
        };
        if !Self::assigned_to(&order, driver_chat, ctx) {
            return Ok(());
        }
        if !OrderLifecycle.can_apply(order.status, LifecycleEvent::QuantityConfirmed) {
            tracing::info!(
                event_name = "lifecycle.duplicate_tap",
                correlation_id = %ctx.correlation_id,
                deal_id = %deal,
                status = order.status.as_str(),
                "pickup already confirmed"
            );
            return Ok(());
        }

        let waiting = messages::driver_status(driver_buttons::AWAITING_QUANTITY);
        self.set_driver_button(&order, waiting).await;
        self.hold_driver(driver_chat, ConversationState::AwaitingFinalQuantity, deal).await?;
        self.notify_driver(
            driver_chat,
            OutgoingMessage::plain(messages::enter_final_quantity(order.cargo_unit(), deal)),
        )
        .await;
        Ok(())
    }

    /// The driver's count at pickup. A changed count reprices the order and rewrites both
    /// earlier summaries before the shared confirmation tail runs.
    pub async fn final_quantity(
        &self,
        driver_chat: ChatId,
        deal: &DealId,
        quantity: u32,
        ctx: &EventContext,
    ) -> Result<(), WorkflowError> {
        if !self.release_driver(driver_chat, ConversationState::AwaitingFinalQuantity).await? {
            return Ok(());
        }
        let Some(mut order) = self.order_for_deal(deal, ctx).await? else {
            return Ok(());
        };
        if !Self::assigned_to(&order, driver_chat, ctx) {
            return Ok(());
        }

        let services = self.services();
        let revised = order.quantity != Some(quantity);
        if let (true, Some(warehouse), Some(cargo)) = (revised, order.warehouse, order.cargo_type)
        {
            let cost =
                services.pricing.price(order.deal_type, warehouse, cargo, i64::from(quantity));
            tracing::info!(
                event_name = "lifecycle.quantity_revised",
                correlation_id = %ctx.correlation_id,
                deal_id = %deal,
                previous = ?order.quantity,
                quantity,
                cost,
                "driver corrected the cargo count"
            );
            order.quantity = Some(quantity);
            order.cost = Some(cost);
            self.save(&mut order).await?;

            let update = DealUpdate {
                quantity: Some(quantity),
                opportunity: Some(cost),
                ..DealUpdate::default()
            };
            self.push_update(deal, &update, ctx).await;

            if let Some(card) = order.messages.driver_order {
                let client_username = self.client_username(&order).await?;
                let rewritten =
                    OutgoingMessage::html(messages::driver_card(&order, &client_username))
                        .markup(packing_button(deal));
                services.retext(BotRole::Driver, driver_chat, card, &rewritten).await;
            }
            if let Some(summary) = order.messages.summary {
                let role = BotRole::for_deal_type(order.deal_type);
                let text = messages::final_summary(&order, messages::wording(role));
                let rewritten = OutgoingMessage::plain(text);
                services.retext(role, order.chat_id, summary, &rewritten).await;
            }
        }

        let confirmed = Self::advance(&mut order, LifecycleEvent::QuantityConfirmed, ctx);
        let Some(outcome) = confirmed else {
            return Ok(());
        };
        self.save(&mut order).await?;

        let accepted = OutgoingMessage::markdown(messages::accepted_by_driver(&order));
        self.notify_client(&order, accepted).await;
        self.set_driver_button(&order, packing_button(deal)).await;
        let updated = OutgoingMessage::plain(messages::order_updated(deal));
        self.notify_driver(driver_chat, updated).await;
        self.push_stage(deal, &outcome, ctx).await;
        Ok(())
    }

    pub async fn packing(
        &self,
        driver_chat: ChatId,
        deal: &DealId,
        ctx: &EventContext,
    ) -> Result<(), WorkflowError> {
        let Some(mut order) = self.order_for_deal(deal, ctx).await? else {
            return Ok(());
        };
        if !Self::assigned_to(&order, driver_chat, ctx) {
            return Ok(());
        }
        let Some(outcome) = Self::advance(&mut order, LifecycleEvent::PackingStarted, ctx) else {
            return Ok(());
        };
        self.save(&mut order).await?;

        self.push_stage(deal, &outcome, ctx).await;
        let next = CallbackIntent::Delivering(deal.clone());
        self.set_driver_button(&order, messages::driver_action(driver_buttons::IN_TRANSIT, next))
            .await;
        self.notify_client(&order, OutgoingMessage::markdown(messages::packing(&order))).await;
        Ok(())
    }

    pub async fn delivering(
        &self,
        driver_chat: ChatId,
        deal: &DealId,
        ctx: &EventContext,
    ) -> Result<(), WorkflowError> {
        let Some(mut order) = self.order_for_deal(deal, ctx).await? else {
            return Ok(());
        };
        if !Self::assigned_to(&order, driver_chat, ctx) {
            return Ok(());
        }
        let Some(outcome) = Self::advance(&mut order, LifecycleEvent::TransitStarted, ctx) else {
            return Ok(());
        };
        self.save(&mut order).await?;

        self.push_stage(deal, &outcome, ctx).await;
        let next = CallbackIntent::Delivered(deal.clone());
        self.set_driver_button(&order, messages::driver_action(driver_buttons::DELIVERED, next))
            .await;
        self.notify_client(&order, OutgoingMessage::markdown(messages::in_transit(&order))).await;
        Ok(())
    }

    pub async fn delivered(
        &self,
        driver_chat: ChatId,
        deal: &DealId,
        ctx: &EventContext,
    ) -> Result<(), WorkflowError> {
        let Some(order) = self.order_for_deal(deal, ctx).await? else {
            return Ok(());
        };
        if !Self::assigned_to(&order, driver_chat, ctx) {
            return Ok(());
        }
        if order.status != OrderStatus::InTransit {
            tracing::info!(
                event_name = "lifecycle.duplicate_tap",
                correlation_id = %ctx.correlation_id,
                deal_id = %deal,
                status = order.status.as_str(),
                "delivery already recorded"
            );
            return Ok(());
        }

        self.hold_driver(driver_chat, ConversationState::AwaitingGateNumber, deal).await?;
        self.set_driver_button(&order, messages::driver_status(driver_buttons::AWAITING_GATE))
            .await;
        self.notify_driver(driver_chat, OutgoingMessage::plain(messages::enter_gate(deal))).await;
        Ok(())
    }

    /// Records the hand-over gate, closes the driver's part and asks the client to pay.
    pub async fn gate_number(
        &self,
        driver_chat: ChatId,
        deal: &DealId,
        gate: &str,
        ctx: &EventContext,
    ) -> Result<(), WorkflowError> {
        if !self.release_driver(driver_chat, ConversationState::AwaitingGateNumber).await? {
            return Ok(());
        }
        let Some(mut order) = self.order_for_deal(deal, ctx).await? else {
            return Ok(());
        };
        if !Self::assigned_to(&order, driver_chat, ctx) {
            return Ok(());
        }
        let Some(outcome) = Self::advance(&mut order, LifecycleEvent::GateRecorded, ctx) else {
            return Ok(());
        };
        let handed_over_at = self.services().clock.local_now();
        order.handover = Some(Handover { gate_number: gate.to_owned(), handed_over_at });
        self.save(&mut order).await?;

        let update = DealUpdate {
            stage: outcome.crm_stage(),
            gate_number: Some(gate.to_owned()),
            handed_over_at: Some(handed_over_at),
            ..DealUpdate::default()
        };
        self.push_update(deal, &update, ctx).await;

        self.set_driver_button(&order, messages::driver_status(driver_buttons::COMPLETED)).await;
        self.notify_driver(driver_chat, OutgoingMessage::plain(messages::order_completed(deal)))
            .await;
        self.notify_client(
            &order,
            OutgoingMessage::markdown(messages::handed_over(&order, gate, handed_over_at)),
        )
        .await;

        self.request_payment(&mut order, deal, ctx).await
    }

    /// Repeats the prompt of a blocking driver state after unrelated input.
    pub async fn reprompt_driver(
        &self,
        driver_chat: ChatId,
        state: ConversationState,
        deal: Option<&DealId>,
        ctx: &EventContext,
    ) -> Result<(), WorkflowError> {
        let Some(deal) = deal else {
            return Ok(());
        };
        let text = match state {
            ConversationState::AwaitingFinalQuantity => {
                let unit = match self.order_for_deal(deal, ctx).await? {
                    Some(order) => order.cargo_unit(),
                    None => "коробов",
                };
                messages::repeat_final_quantity(unit, deal)
            }
            ConversationState::AwaitingGateNumber => messages::enter_gate(deal),
            _ => return Ok(()),
        };
        self.notify_driver(driver_chat, OutgoingMessage::plain(text)).await;
        Ok(())
    }
}

fn packing_button(deal: &DealId) -> ReplyMarkup {
    messages::driver_action(driver_buttons::PACKING, CallbackIntent::Packing(deal.clone()))
}
