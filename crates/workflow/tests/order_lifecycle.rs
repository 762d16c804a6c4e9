//! Post-submission flows: CRM hooks, driver taps and replies, payment, reminders.

mod support;

use std::sync::atomic::Ordering;

use cargolink_core::domain::order::{DealId, DealType, DriverAssignment, OrderStatus, PaymentMethod};
use cargolink_core::domain::payment::PaymentNoticeError;
use cargolink_core::domain::session::{BotRole, ConversationState};
use cargolink_core::flows::CrmStage;
use cargolink_core::ports::DealUpdate;
use cargolink_telegram::notifier::recording::Recorded;
use cargolink_telegram::CallbackIntent;
use cargolink_workflow::messages::{self, buttons, driver_buttons};
use cargolink_workflow::{
    CrmHook, CrmHookAction, DispatchOutcome, EventContext, PaymentAck, PaymentRejection,
    PaymentReminderJob, Route, WorkflowError,
};

use support::{
    in_transit_order, now, payment_form, submitted_order, Harness, CLIENT_CHAT, DRIVER_CHAT,
    INVOICE_URL,
};

fn deal() -> DealId {
    DealId("501".to_owned())
}

fn hook(action: CrmHookAction, driver: Option<&str>) -> CrmHook {
    CrmHook { action, deal: Some(deal()), driver: driver.map(str::to_owned) }
}

/// Submitted delivery order with `ivan_p` assigned through the CRM hook.
async fn assigned(harness: &Harness) {
    harness.seed(&submitted_order(DealType::Delivery, "501", OrderStatus::Submitted)).await;
    harness.register_driver().await;
    let ack = harness
        .coordinator()
        .handle_hook(
            &hook(CrmHookAction::SetDriver, Some("Иван Петров tg:@ivan_p")),
            &EventContext::default(),
        )
        .await
        .expect("hook handled");
    assert_eq!(ack.message(), "driver assigned");
}

async fn driver_state(harness: &Harness) -> Option<ConversationState> {
    harness.session(BotRole::Driver, DRIVER_CHAT).await.and_then(|session| session.state)
}

#[tokio::test]
async fn assignment_sends_card_and_client_notice() {
    let harness = Harness::new();
    assigned(&harness).await;

    let order = harness.order(&deal()).await;
    assert_eq!(order.status, OrderStatus::DriverAssigned);
    assert_eq!(
        order.driver,
        Some(DriverAssignment { chat_id: DRIVER_CHAT, username: "ivan_p".to_owned() })
    );
    assert!(order.messages.driver_order.is_some());
    assert!(order.messages.client_driver_notice.is_some());

    let card = harness.driver.last_sent(DRIVER_CHAT).await.expect("card sent");
    assert!(card.text.contains("501"));
    let notice = harness.delivery.last_sent(CLIENT_CHAT).await.expect("notice sent");
    assert!(notice.text.contains("Иван Петров"));
    assert!(!notice.text.contains("tg:"));
}

#[tokio::test]
async fn unchanged_quantity_pushes_stage_only() {
    let harness = Harness::new();
    assigned(&harness).await;

    let outcome = harness.tap(DRIVER_CHAT, CallbackIntent::PickedUp(deal())).await;
    assert!(matches!(outcome, DispatchOutcome::Handled(_)));
    assert_eq!(driver_state(&harness).await, Some(ConversationState::AwaitingFinalQuantity));
    assert!(harness
        .driver
        .calls()
        .await
        .contains(&Recorded::Answered { query_id: "q-1".to_owned() }));

    harness.text(BotRole::Driver, DRIVER_CHAT, "10").await;

    let order = harness.order(&deal()).await;
    assert_eq!(order.status, OrderStatus::DriverConfirmed);
    assert_eq!(order.cost, Some(2_500));
    assert_eq!(driver_state(&harness).await, None);
    assert_eq!(
        harness.crm.updates().await,
        vec![(deal(), DealUpdate::stage(CrmStage::PrepaymentInvoice))]
    );
}

#[tokio::test]
async fn changed_quantity_reprices_before_confirming() {
    let harness = Harness::new();
    assigned(&harness).await;
    harness.tap(DRIVER_CHAT, CallbackIntent::PickedUp(deal())).await;

    harness.text(BotRole::Driver, DRIVER_CHAT, "12").await;

    let order = harness.order(&deal()).await;
    assert_eq!(order.quantity, Some(12));
    assert_eq!(order.cost, Some(2_900));
    assert_eq!(order.status, OrderStatus::DriverConfirmed);
    let revised =
        DealUpdate { quantity: Some(12), opportunity: Some(2_900), ..DealUpdate::default() };
    assert_eq!(
        harness.crm.updates().await,
        vec![(deal(), revised), (deal(), DealUpdate::stage(CrmStage::PrepaymentInvoice))]
    );
}

#[tokio::test]
async fn blocked_driver_is_reprompted_on_other_input() {
    let harness = Harness::new();
    assigned(&harness).await;
    harness.tap(DRIVER_CHAT, CallbackIntent::PickedUp(deal())).await;
    harness.driver.clear().await;

    harness.text(BotRole::Driver, DRIVER_CHAT, "десять").await;
    let outcome = harness.tap(DRIVER_CHAT, CallbackIntent::Packing(deal())).await;

    assert!(matches!(outcome, DispatchOutcome::Handled(Route::Reprompt(_))));
    assert_eq!(driver_state(&harness).await, Some(ConversationState::AwaitingFinalQuantity));
    assert_eq!(harness.order(&deal()).await.status, OrderStatus::DriverAssigned);
    assert_eq!(harness.driver.sent_texts(DRIVER_CHAT).await.len(), 2);
}

#[tokio::test]
async fn taps_from_another_driver_chat_change_nothing() {
    let harness = Harness::new();
    assigned(&harness).await;

    harness.tap(DRIVER_CHAT + 1, CallbackIntent::PickedUp(deal())).await;

    assert_eq!(harness.order(&deal()).await.status, OrderStatus::DriverAssigned);
    assert!(harness.crm.updates().await.is_empty());
}

#[tokio::test]
async fn packing_tap_advances_stage_and_swaps_button() {
    let harness = Harness::new();
    let mut order = in_transit_order(DealType::Delivery, "501");
    order.status = OrderStatus::DriverConfirmed;
    harness.seed(&order).await;
    harness.register_driver().await;

    harness.tap(DRIVER_CHAT, CallbackIntent::Packing(deal())).await;

    let order = harness.order(&deal()).await;
    assert_eq!(order.status, OrderStatus::Packing);
    assert_eq!(harness.crm.updates().await, vec![(deal(), DealUpdate::stage(CrmStage::Executing))]);
    let in_transit =
        messages::driver_action(driver_buttons::IN_TRANSIT, CallbackIntent::Delivering(deal()));
    assert!(harness.driver.calls().await.contains(&Recorded::EditedMarkup {
        chat_id: DRIVER_CHAT,
        message_id: 7,
        markup: in_transit,
    }));
    assert_eq!(harness.delivery.sent_texts(CLIENT_CHAT).await, vec![messages::packing(&order)]);

    harness.tap(DRIVER_CHAT, CallbackIntent::Packing(deal())).await;
    assert_eq!(harness.crm.updates().await.len(), 1);
}

#[tokio::test]
async fn delivering_tap_moves_order_in_transit() {
    let harness = Harness::new();
    let mut order = in_transit_order(DealType::Delivery, "501");
    order.status = OrderStatus::Packing;
    harness.seed(&order).await;
    harness.register_driver().await;

    harness.tap(DRIVER_CHAT, CallbackIntent::Delivering(deal())).await;

    let order = harness.order(&deal()).await;
    assert_eq!(order.status, OrderStatus::InTransit);
    assert_eq!(
        harness.crm.updates().await,
        vec![(deal(), DealUpdate::stage(CrmStage::FinalInvoice))]
    );
    let delivered =
        messages::driver_action(driver_buttons::DELIVERED, CallbackIntent::Delivered(deal()));
    assert!(harness.driver.calls().await.contains(&Recorded::EditedMarkup {
        chat_id: DRIVER_CHAT,
        message_id: 7,
        markup: delivered,
    }));
    assert_eq!(harness.delivery.sent_texts(CLIENT_CHAT).await, vec![messages::in_transit(&order)]);
}

#[tokio::test]
async fn delivery_handover_offers_payment_methods() {
    let harness = Harness::new();
    harness.seed(&in_transit_order(DealType::Delivery, "501")).await;
    harness.register_driver().await;

    harness.tap(DRIVER_CHAT, CallbackIntent::Delivered(deal())).await;
    harness.text(BotRole::Driver, DRIVER_CHAT, "12").await;

    let order = harness.order(&deal()).await;
    assert_eq!(order.status, OrderStatus::AwaitingPayment);
    assert_eq!(order.handover.as_ref().map(|h| h.gate_number.as_str()), Some("12"));
    assert_eq!(order.payment.service_name.as_deref(), Some("Доставка груза"));
    assert_eq!(order.payment.invoice_url, None);
    assert_eq!(order.payment.method, None);
    assert!(harness.crm.invoices.lock().await.is_empty());
    assert_eq!(driver_state(&harness).await, None);

    let last = harness.delivery.last_sent(CLIENT_CHAT).await.expect("choice sent");
    assert_eq!(last.text, messages::CHOOSE_PAYMENT_METHOD);
    assert_eq!(last.markup, Some(messages::payment_method_keyboard()));
    let completed = messages::order_completed(&deal());
    assert!(harness.driver.sent_texts(DRIVER_CHAT).await.contains(&completed));
}

#[tokio::test]
async fn fulfilment_handover_issues_invoice() {
    let harness = Harness::new();
    harness.seed(&in_transit_order(DealType::Fulfilment, "501")).await;
    harness.register_driver().await;

    harness.tap(DRIVER_CHAT, CallbackIntent::Delivered(deal())).await;
    assert_eq!(driver_state(&harness).await, Some(ConversationState::AwaitingGateNumber));
    harness.text(BotRole::Driver, DRIVER_CHAT, "5").await;

    let order = harness.order(&deal()).await;
    let local_now = now().with_timezone(&chrono_tz::Europe::Moscow).naive_local();
    assert_eq!(order.status, OrderStatus::AwaitingPayment);
    let handover = order.handover.as_ref().expect("handover recorded");
    assert_eq!(handover.gate_number, "5");
    assert_eq!(handover.handed_over_at, local_now);
    assert_eq!(order.payment.invoice_url.as_deref(), Some(INVOICE_URL));
    assert_eq!(order.payment.method, Some(PaymentMethod::Invoice));
    assert_eq!(order.payment.service_name.as_deref(), Some("Доставка груза"));

    let handed_over = DealUpdate {
        stage: Some(CrmStage::Handover),
        gate_number: Some("5".to_owned()),
        handed_over_at: Some(local_now),
        ..DealUpdate::default()
    };
    assert_eq!(harness.crm.updates().await, vec![(deal(), handed_over)]);
    let last = harness.fulfilment.last_sent(CLIENT_CHAT).await.expect("invoice sent");
    assert_eq!(last.text, messages::invoice_ready(INVOICE_URL));
}

#[tokio::test]
async fn change_driver_returns_order_to_submitted() {
    let harness = Harness::new();
    assigned(&harness).await;
    let notice = harness.order(&deal()).await.messages.client_driver_notice.expect("notice");

    let ack = harness
        .coordinator()
        .handle_hook(&hook(CrmHookAction::ChangeDriver, None), &EventContext::default())
        .await
        .expect("hook handled");

    assert_eq!(ack.message(), "driver changed");
    let order = harness.order(&deal()).await;
    assert_eq!(order.status, OrderStatus::Submitted);
    assert_eq!(order.driver, None);
    assert_eq!(order.messages.driver_order, None);
    assert!(harness
        .delivery
        .calls()
        .await
        .contains(&Recorded::Deleted { chat_id: CLIENT_CHAT, message_id: notice }));
    let cancelled = messages::order_cancelled(&deal());
    assert!(harness.driver.sent_texts(DRIVER_CHAT).await.contains(&cancelled));
}

#[tokio::test]
async fn mismatched_amount_is_rejected_without_side_effects() {
    let harness = Harness::new();
    harness.seed(&submitted_order(DealType::Delivery, "501", OrderStatus::AwaitingPayment)).await;

    let result = harness
        .coordinator()
        .confirm_payment(&payment_form("501", "2400.00"), &EventContext::default())
        .await;

    assert!(matches!(
        result,
        Err(WorkflowError::PaymentRejected(PaymentRejection::SumMismatch { expected: 2_500, .. }))
    ));
    assert_eq!(harness.order(&deal()).await.status, OrderStatus::AwaitingPayment);
    assert!(harness.crm.updates().await.is_empty());
    assert!(harness.delivery.calls().await.is_empty());
}

#[tokio::test]
async fn forged_signature_is_rejected() {
    let harness = Harness::new();
    harness.seed(&submitted_order(DealType::Delivery, "501", OrderStatus::AwaitingPayment)).await;
    let mut form = payment_form("501", "2500.00");
    form.insert("key".to_owned(), "0".repeat(32));

    let result = harness.coordinator().confirm_payment(&form, &EventContext::default()).await;

    assert!(matches!(
        result,
        Err(WorkflowError::PaymentRejected(PaymentRejection::Notice(PaymentNoticeError::Signature)))
    ));
    assert_eq!(harness.order(&deal()).await.status, OrderStatus::AwaitingPayment);
}

#[tokio::test]
async fn replayed_payment_notice_is_applied_once() {
    let harness = Harness::new();
    harness.seed(&submitted_order(DealType::Delivery, "501", OrderStatus::AwaitingPayment)).await;
    let form = payment_form("501", "2500.00");
    let ctx = EventContext::default();

    let first = harness.coordinator().confirm_payment(&form, &ctx).await.expect("confirmed");
    let second = harness.coordinator().confirm_payment(&form, &ctx).await.expect("replay");

    assert_eq!(first, PaymentAck::Confirmed(deal()));
    assert_eq!(second, PaymentAck::AlreadyPaid(deal()));
    let order = harness.order(&deal()).await;
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment.paid_at, Some(now()));
    assert_eq!(harness.delivery.sent_texts(CLIENT_CHAT).await.len(), 1);
    assert_eq!(harness.crm.updates().await, vec![(deal(), DealUpdate::stage(CrmStage::Won))]);
}

#[tokio::test]
async fn failed_won_push_leaves_order_unpaid_for_retry() {
    let harness = Harness::new();
    harness.seed(&submitted_order(DealType::Delivery, "501", OrderStatus::AwaitingPayment)).await;
    let form = payment_form("501", "2500.00");
    let ctx = EventContext::default();

    harness.crm.fail_updates.store(true, Ordering::SeqCst);
    let failed = harness.coordinator().confirm_payment(&form, &ctx).await;
    assert!(matches!(failed, Err(WorkflowError::External(_))));
    let order = harness.order(&deal()).await;
    assert_eq!(order.status, OrderStatus::AwaitingPayment);
    assert_eq!(order.payment.paid_at, None);
    assert!(harness.delivery.calls().await.is_empty());

    harness.crm.fail_updates.store(false, Ordering::SeqCst);
    let retried = harness.coordinator().confirm_payment(&form, &ctx).await.expect("confirmed");

    assert_eq!(retried, PaymentAck::Confirmed(deal()));
    assert_eq!(harness.order(&deal()).await.status, OrderStatus::Paid);
    assert_eq!(harness.crm.updates().await, vec![(deal(), DealUpdate::stage(CrmStage::Won))]);
    assert_eq!(harness.delivery.sent_texts(CLIENT_CHAT).await.len(), 1);
}

#[tokio::test]
async fn crm_payed_hook_after_notice_sends_nothing_more() {
    let harness = Harness::new();
    harness.seed(&submitted_order(DealType::Delivery, "501", OrderStatus::AwaitingPayment)).await;
    let ctx = EventContext::default();
    harness
        .coordinator()
        .confirm_payment(&payment_form("501", "2500.00"), &ctx)
        .await
        .expect("confirmed");

    let ack = harness
        .coordinator()
        .handle_hook(&hook(CrmHookAction::Payed, None), &ctx)
        .await
        .expect("hook handled");

    assert_eq!(ack.message(), "payment received");
    assert_eq!(harness.order(&deal()).await.status, OrderStatus::Paid);
    assert_eq!(harness.delivery.sent_texts(CLIENT_CHAT).await.len(), 1);
    assert_eq!(harness.crm.updates().await.len(), 1);
}

#[tokio::test]
async fn crm_payed_hook_marks_unpaid_order_paid() {
    let harness = Harness::new();
    harness.seed(&submitted_order(DealType::Delivery, "501", OrderStatus::AwaitingPayment)).await;
    let ctx = EventContext::default();

    harness
        .coordinator()
        .handle_hook(&hook(CrmHookAction::Payed, None), &ctx)
        .await
        .expect("hook handled");
    let replay = harness
        .coordinator()
        .confirm_payment(&payment_form("501", "2500.00"), &ctx)
        .await
        .expect("replay");

    assert_eq!(replay, PaymentAck::AlreadyPaid(deal()));
    let order = harness.order(&deal()).await;
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(
        harness.delivery.sent_texts(CLIENT_CHAT).await,
        vec![messages::paid(&order)]
    );
    assert!(harness.crm.updates().await.is_empty());
}

#[tokio::test]
async fn invoice_request_generates_crm_invoice() {
    let harness = Harness::new();
    harness.seed(&submitted_order(DealType::Delivery, "501", OrderStatus::AwaitingPayment)).await;

    let outcome = harness.text(BotRole::ClientDelivery, CLIENT_CHAT, buttons::PAY_BY_INVOICE).await;

    assert!(matches!(outcome, DispatchOutcome::Handled(Route::PayByInvoice)));
    assert_eq!(harness.crm.invoices.lock().await.clone(), vec![deal()]);
    let order = harness.order(&deal()).await;
    assert_eq!(order.payment.method, Some(PaymentMethod::Invoice));
    assert_eq!(order.payment.invoice_url.as_deref(), Some(INVOICE_URL));
    let last = harness.delivery.last_sent(CLIENT_CHAT).await.expect("invoice sent");
    assert_eq!(last.text, messages::invoice_ready(INVOICE_URL));
}

#[tokio::test]
async fn invoice_request_skips_orders_already_billed() {
    let harness = Harness::new();
    let mut billed = submitted_order(DealType::Delivery, "501", OrderStatus::AwaitingPayment);
    billed.payment.invoice_url = Some("https://pay.example/bill/77".to_owned());
    billed.payment.method = Some(PaymentMethod::Sbp);
    harness.seed(&billed).await;

    harness.text(BotRole::ClientDelivery, CLIENT_CHAT, buttons::PAY_BY_INVOICE).await;

    assert!(harness.crm.invoices.lock().await.is_empty());
    assert_eq!(harness.order(&deal()).await.payment.method, Some(PaymentMethod::Sbp));
    assert_eq!(
        harness.delivery.sent_texts(CLIENT_CHAT).await,
        vec![messages::NOTHING_TO_INVOICE.to_owned()]
    );
}

#[tokio::test]
async fn sbp_request_creates_provider_link() {
    let harness = Harness::new();
    harness.seed(&submitted_order(DealType::Delivery, "501", OrderStatus::AwaitingPayment)).await;

    harness.text(BotRole::ClientDelivery, CLIENT_CHAT, buttons::PAY_BY_SBP).await;

    let requests = harness.payments.requests.lock().await.clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount, 2_500);
    assert_eq!(requests[0].order_reference, "Заказ №501");
    let order = harness.order(&deal()).await;
    assert_eq!(order.payment.method, Some(PaymentMethod::Sbp));
    assert_eq!(order.payment.invoice_url.as_deref(), Some("https://pay.example/bill/77"));
}

#[tokio::test]
async fn reminder_goes_only_to_orders_with_a_link() {
    let harness = Harness::new();
    let mut billed = submitted_order(DealType::Delivery, "501", OrderStatus::AwaitingPayment);
    billed.payment.invoice_url = Some(INVOICE_URL.to_owned());
    harness.seed(&billed).await;
    harness.seed(&submitted_order(DealType::Delivery, "502", OrderStatus::AwaitingPayment)).await;

    let report = PaymentReminderJob::new(harness.services.clone()).run_once().await.expect("ran");

    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(
        harness.delivery.sent_texts(CLIENT_CHAT).await,
        vec![messages::payment_reminder(&deal(), INVOICE_URL)]
    );
    assert_eq!(harness.order(&deal()).await.payment.last_reminder_at, Some(now()));
}
