use std::collections::HashMap;

use secrecy::ExposeSecret;

use cargolink_core::domain::order::{DealId, DealType, Order, OrderStatus, PaymentMethod};
use cargolink_core::domain::payment::{amount_matches, PaymentNotice};
use cargolink_core::domain::session::BotRole;
use cargolink_core::domain::ChatId;
use cargolink_core::errors::DomainError;
use cargolink_core::flows::{CrmStage, LifecycleEvent, OrderLifecycle};
use cargolink_core::ports::{DealUpdate, InvoiceRequest};
use cargolink_telegram::OutgoingMessage;

use super::LifecycleCoordinator;
use crate::dispatcher::EventContext;
use crate::error::{PaymentRejection, WorkflowError};
use crate::messages;

const DEFAULT_SERVICE_NAME: &str = "Услуга";

/// Outcome of a verified payment notice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentAck {
    Confirmed(DealId),
    /// The order was already paid; nothing was repeated.
    AlreadyPaid(DealId),
}

impl PaymentAck {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Confirmed(_) => "payment confirmed",
            Self::AlreadyPaid(_) => "already paid",
        }
    }
}

impl LifecycleCoordinator {
    /// After hand-over: name the billable service, move to awaiting payment and either send
    /// the fulfilment invoice right away or let the delivery client pick a method.
    pub(super) async fn request_payment(
        &self,
        order: &mut Order,
        deal: &DealId,
        ctx: &EventContext,
    ) -> Result<(), WorkflowError> {
        let services = self.services();
        match services.crm.set_service_row(deal).await {
            Ok(service_name) => order.payment.service_name = Some(service_name),
            Err(error) => tracing::warn!(
                event_name = "lifecycle.service_row_failed",
                correlation_id = %ctx.correlation_id,
                deal_id = %deal,
                error = %error,
                "deal product row was not written"
            ),
        }
        if Self::advance(order, LifecycleEvent::PaymentRequested, ctx).is_none() {
            self.save(order).await?;
            return Ok(());
        }

        match order.deal_type {
            DealType::Fulfilment => {
                let invoice = self.issue_invoice(order, deal, ctx).await;
                self.save(order).await?;
                if let Some(url) = invoice {
                    let ready = OutgoingMessage::plain(messages::invoice_ready(&url));
                    self.notify_client(order, ready).await;
                }
            }
            DealType::Delivery => {
                self.save(order).await?;
                let choose = OutgoingMessage::plain(messages::CHOOSE_PAYMENT_METHOD)
                    .markup(messages::payment_method_keyboard());
                self.notify_client(order, choose).await;
            }
        }
        Ok(())
    }

    async fn issue_invoice(
        &self,
        order: &mut Order,
        deal: &DealId,
        ctx: &EventContext,
    ) -> Option<String> {
        match self.services().crm.generate_invoice(deal).await {
            Ok(url) => {
                order.payment.invoice_url = Some(url.clone());
                order.payment.method = Some(PaymentMethod::Invoice);
                Some(url)
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "payment.invoice_failed",
                    correlation_id = %ctx.correlation_id,
                    deal_id = %deal,
                    error = %error,
                    "invoice document was not generated"
                );
                None
            }
        }
    }

    /// "Pay by invoice" on the delivery bot.
    pub async fn request_invoice(
        &self,
        chat_id: ChatId,
        ctx: &EventContext,
    ) -> Result<(), WorkflowError> {
        let role = BotRole::ClientDelivery;
        let services = self.services();
        let reply = |text: String| OutgoingMessage::plain(text).markup(messages::main_menu(role));

        let Some(mut order) = services.orders.latest_unbilled(chat_id, DealType::Delivery).await?
        else {
            services.say(role, chat_id, &reply(messages::NOTHING_TO_INVOICE.to_owned())).await;
            return Ok(());
        };
        let Some(deal) = order.crm_deal_id.clone() else {
            services.say(role, chat_id, &reply(messages::NO_DEAL_LINK.to_owned())).await;
            return Ok(());
        };
        let Some(url) = self.issue_invoice(&mut order, &deal, ctx).await else {
            services.say(role, chat_id, &reply(messages::INVOICE_FAILED.to_owned())).await;
            return Ok(());
        };
        self.save(&mut order).await?;
        services.say(role, chat_id, &reply(messages::invoice_ready(&url))).await;
        Ok(())
    }

    /// "Pay by SBP" on the delivery bot: a payment-provider link for the order cost.
    pub async fn request_sbp(
        &self,
        chat_id: ChatId,
        ctx: &EventContext,
    ) -> Result<(), WorkflowError> {
        let role = BotRole::ClientDelivery;
        let services = self.services();
        let reply = |text: String| OutgoingMessage::plain(text).markup(messages::main_menu(role));

        let Some(mut order) = services.orders.latest_unbilled(chat_id, DealType::Delivery).await?
        else {
            services.say(role, chat_id, &reply(messages::NOTHING_FOR_SBP.to_owned())).await;
            return Ok(());
        };
        let Some(deal) = order.crm_deal_id.clone() else {
            services.say(role, chat_id, &reply(messages::NO_DEAL_LINK.to_owned())).await;
            return Ok(());
        };

        let token = match services.payments.fetch_token().await {
            Ok(token) => token,
            Err(error) => {
                tracing::warn!(
                    event_name = "payment.token_failed",
                    correlation_id = %ctx.correlation_id,
                    deal_id = %deal,
                    service = error.service,
                    error = %error,
                    "payment provider token fetch failed"
                );
                services.say(role, chat_id, &reply(messages::SBP_TOKEN_FAILED.to_owned())).await;
                return Ok(());
            }
        };

        let request = InvoiceRequest {
            amount: order.cost.unwrap_or_default(),
            client_id: order.org_name().to_owned(),
            order_reference: format!("Заказ №{deal}"),
            service_name: order
                .payment
                .service_name
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_owned()),
            client_phone: order.phone.clone().unwrap_or_default(),
        };
        let link = match services.payments.create_invoice(&token, &request).await {
            Ok(link) => link,
            Err(error) => {
                tracing::warn!(
                    event_name = "payment.sbp_failed",
                    correlation_id = %ctx.correlation_id,
                    deal_id = %deal,
                    service = error.service,
                    error = %error,
                    "payment provider invoice creation failed"
                );
                let failed = reply(messages::SBP_INVOICE_FAILED.to_owned());
                services.say(role, chat_id, &failed).await;
                return Ok(());
            }
        };

        order.payment.invoice_url = Some(link.clone());
        order.payment.method = Some(PaymentMethod::Sbp);
        self.save(&mut order).await?;
        services.say(role, chat_id, &reply(messages::sbp_link(&deal, &link))).await;
        Ok(())
    }

    /// Handles the payment provider's notice.
    ///
    /// Signature and amount are checked before any state is touched. The deal moves to won
    /// before the order is marked paid, so a failed CRM push leaves the order unpaid and the
    /// provider's retry pushes again. The conditional `mark_paid` is the idempotency
    /// boundary: only the caller whose update changed the row notifies the client.
    pub async fn confirm_payment(
        &self,
        form: &HashMap<String, String>,
        ctx: &EventContext,
    ) -> Result<PaymentAck, WorkflowError> {
        let services = self.services();
        let notice = PaymentNotice::from_form(form).map_err(PaymentRejection::from)?;
        if let Err(error) = notice.verify(services.settings.payment_secret.expose_secret()) {
            tracing::warn!(
                event_name = "payment.signature_rejected",
                correlation_id = %ctx.correlation_id,
                payment_id = %notice.id,
                "payment notice signature mismatch"
            );
            return Err(PaymentRejection::from(error).into());
        }
        let deal = notice.deal_id().map_err(PaymentRejection::from)?;
        let paid = notice.amount().map_err(PaymentRejection::from)?;

        let order = services
            .orders
            .find_by_deal_id(&deal)
            .await?
            .ok_or_else(|| WorkflowError::OrderNotFound(deal.clone()))?;

        let expected = order.cost.unwrap_or_default();
        if !amount_matches(paid, expected, services.settings.amount_tolerance) {
            tracing::warn!(
                event_name = "payment.amount_mismatch",
                correlation_id = %ctx.correlation_id,
                deal_id = %deal,
                paid = %paid,
                expected,
                "payment sum differs from order cost"
            );
            return Err(PaymentRejection::SumMismatch { paid, expected }.into());
        }

        if order.status == OrderStatus::Paid {
            return Ok(PaymentAck::AlreadyPaid(deal));
        }
        OrderLifecycle
            .apply(order.status, LifecycleEvent::PaymentConfirmed)
            .map_err(DomainError::from)?;

        if let Err(error) = services.crm.update_deal(&deal, &DealUpdate::stage(CrmStage::Won)).await
        {
            tracing::warn!(
                event_name = "payment.crm_won_failed",
                correlation_id = %ctx.correlation_id,
                deal_id = %deal,
                payment_id = %notice.id,
                service = error.service,
                error = %error,
                "deal not moved to won; order left unpaid for the provider retry"
            );
            return Err(error.into());
        }

        if !services.orders.mark_paid(&deal, services.clock.now()).await? {
            return Ok(PaymentAck::AlreadyPaid(deal));
        }
        tracing::info!(
            event_name = "payment.confirmed",
            correlation_id = %ctx.correlation_id,
            deal_id = %deal,
            payment_id = %notice.id,
            amount = %paid,
            "order marked paid"
        );

        let refreshed = services.orders.find_by_deal_id(&deal).await?.unwrap_or(order);
        self.announce_paid(&refreshed).await;
        Ok(PaymentAck::Confirmed(deal))
    }

    pub(super) async fn announce_paid(&self, order: &Order) {
        let role = BotRole::for_deal_type(order.deal_type);
        let message =
            OutgoingMessage::markdown(messages::paid(order)).markup(messages::main_menu(role));
        self.notify_client(order, message).await;
    }
}
