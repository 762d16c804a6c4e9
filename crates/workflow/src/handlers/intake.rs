//! Order intake: legal identity, warehouse and dates, cargo, pickup contact, submission.
//!
//! Each step reads the draft referenced by the session, validates the reply, persists the
//! draft and only then advances the session state with a guarded update.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use cargolink_core::domain::order::{CargoType, Order};
use cargolink_core::domain::session::{ConversationState, SessionPatch, StateGuard};
use cargolink_core::domain::warehouse::Warehouse;
use cargolink_core::flows::LifecycleEvent;
use cargolink_core::schedule::{self, ScheduleError};
use cargolink_telegram::{EventKind, OutgoingMessage, ReplyMarkup};

use crate::error::WorkflowError;
use crate::handlers::Turn;
use crate::messages::{self, buttons};

/// Runs the intake step the session is parked on. Non-intake states are ignored.
pub async fn step(turn: &Turn<'_>, state: ConversationState) -> Result<(), WorkflowError> {
    use ConversationState as S;

    match state {
        S::AwaitingInn => inn(turn).await,
        S::SelectExistingOrg => existing_org(turn).await,
        S::ConfirmInn => confirm_inn(turn).await,
        S::AwaitingBankAccount => bank_account(turn).await,
        S::AwaitingBankCode => bank_code(turn).await,
        S::SelectWarehouse => warehouse(turn).await,
        S::SelectDeliveryDate => delivery_date(turn).await,
        S::SelectPickupDate => pickup_date(turn).await,
        S::SelectCargoType => cargo_type(turn).await,
        S::EnterCargoQuantity => quantity(turn).await,
        S::EnterPickupAddress => pickup_address(turn).await,
        S::EnterPhoneNumber => phone(turn).await,
        S::AwaitingOrderSubmit => submit(turn).await,
        _ => Ok(()),
    }
}

/// "Create order": offer the organisations this chat already completed, or ask for an INN.
pub async fn begin(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let known: BTreeSet<String> = turn
        .services
        .orders
        .list_for_chat(turn.chat_id())
        .await?
        .into_iter()
        .filter(|order| order.org.is_complete())
        .filter_map(|order| order.org.name)
        .collect();

    if known.is_empty() {
        turn.overwrite(SessionPatch::reset().with_state(ConversationState::AwaitingInn)).await?;
        turn.reply(
            OutgoingMessage::plain(turn.wording().enter_inn).markup(messages::restart_keyboard()),
        )
        .await;
        return Ok(());
    }

    let names: Vec<String> = known.into_iter().collect();
    turn.overwrite(SessionPatch::reset().with_state(ConversationState::SelectExistingOrg))
        .await?;
    turn.reply(
        OutgoingMessage::plain(turn.wording().choose_org)
            .markup(messages::org_choice_keyboard(&names)),
    )
    .await;
    Ok(())
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn looks_like_inn(value: &str) -> bool {
    is_digits(value) && matches!(value.len(), 10 | 12)
}

async fn inn(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let inn = turn.text().trim();
    let not_found = || {
        OutgoingMessage::plain(turn.wording().org_not_found).markup(messages::restart_keyboard())
    };
    if !looks_like_inn(inn) {
        turn.reply(not_found()).await;
        return Ok(());
    }

    let profile = match turn.services.lookup.find_by_inn(inn).await {
        Ok(profile) => profile,
        Err(error) => {
            tracing::warn!(
                event_name = "intake.lookup_failed",
                correlation_id = %turn.ctx.correlation_id,
                chat_id = turn.chat_id(),
                error = %error,
                "company lookup failed"
            );
            None
        }
    };
    let Some(profile) = profile else {
        turn.reply(not_found()).await;
        return Ok(());
    };

    let mut order = Order::new_draft(turn.chat_id(), turn.deal_type(), turn.services.clock.now());
    order.org.inn = Some(inn.to_owned());
    order.org.name = Some(profile.name.clone());
    order.org.address = Some(profile.address.clone());
    turn.save_order(&mut order).await?;

    let patch = SessionPatch::to_state(ConversationState::ConfirmInn).with_active_order(order.id);
    if turn.transition(patch).await? {
        turn.reply(
            OutgoingMessage::plain(messages::org_found(
                turn.wording(),
                &profile.name,
                &profile.address,
            ))
            .markup(messages::confirm_org_keyboard()),
        )
        .await;
    }
    Ok(())
}

async fn existing_org(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let choice = turn.text().trim();
    if is_digits(choice) {
        return inn(turn).await;
    }

    let previous = turn.services.orders.latest_complete_org(turn.chat_id(), choice).await?;
    let Some(previous) = previous else {
        turn.reply(
            OutgoingMessage::plain(turn.wording().org_incomplete)
                .markup(messages::restart_keyboard()),
        )
        .await;
        return Ok(());
    };

    let mut order = Order::draft_with_org(
        turn.chat_id(),
        turn.deal_type(),
        previous.org,
        turn.services.clock.now(),
    );
    turn.save_order(&mut order).await?;

    let patch =
        SessionPatch::to_state(ConversationState::SelectWarehouse).with_active_order(order.id);
    if turn.transition(patch).await? {
        prompt_warehouse(turn, messages::CHOOSE_WAREHOUSE).await;
    }
    Ok(())
}

async fn confirm_inn(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    match turn.text() {
        buttons::CONTINUE => {
            let next = SessionPatch::to_state(ConversationState::AwaitingBankAccount);
            if turn.transition(next).await? {
                turn.reply(
                    OutgoingMessage::plain(turn.wording().enter_account)
                        .markup(messages::restart_keyboard()),
                )
                .await;
            }
        }
        buttons::OTHER_INN => {
            if turn.transition(SessionPatch::to_state(ConversationState::AwaitingInn)).await? {
                turn.reply(
                    OutgoingMessage::plain(turn.wording().enter_inn)
                        .markup(messages::restart_keyboard()),
                )
                .await;
            }
        }
        _ => {
            turn.reply(
                OutgoingMessage::plain(turn.wording().confirm_again)
                    .markup(messages::confirm_org_keyboard()),
            )
            .await;
        }
    }
    Ok(())
}

/// Loads the draft this session points at, or tells the client to start over.
async fn draft(turn: &Turn<'_>) -> Result<Option<Order>, WorkflowError> {
    if let Some(order) = turn.active_order().await? {
        return Ok(Some(order));
    }
    tracing::info!(
        event_name = "intake.draft_missing",
        correlation_id = %turn.ctx.correlation_id,
        chat_id = turn.chat_id(),
        state = ?turn.session.state,
        "session has no draft to continue"
    );
    restart_lost(turn).await?;
    Ok(None)
}

async fn bank_account(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let account = turn.text().trim();
    if account.is_empty() {
        turn.reply(
            OutgoingMessage::plain(turn.wording().enter_account)
                .markup(messages::restart_keyboard()),
        )
        .await;
        return Ok(());
    }
    let Some(mut order) = draft(turn).await? else {
        return Ok(());
    };
    order.org.bank_account = Some(account.to_owned());
    turn.save_order(&mut order).await?;

    if turn.transition(SessionPatch::to_state(ConversationState::AwaitingBankCode)).await? {
        turn.reply(
            OutgoingMessage::plain(messages::ENTER_BANK_CODE).markup(messages::restart_keyboard()),
        )
        .await;
    }
    Ok(())
}

async fn bank_code(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let code = turn.text().trim();
    if code.is_empty() {
        turn.reply(
            OutgoingMessage::plain(messages::ENTER_BANK_CODE).markup(messages::restart_keyboard()),
        )
        .await;
        return Ok(());
    }
    let Some(mut order) = draft(turn).await? else {
        return Ok(());
    };
    order.org.bank_code = Some(code.to_owned());
    turn.save_order(&mut order).await?;

    if turn.transition(SessionPatch::to_state(ConversationState::SelectWarehouse)).await? {
        prompt_warehouse(turn, messages::CHOOSE_WAREHOUSE).await;
    }
    Ok(())
}

async fn prompt_warehouse(turn: &Turn<'_>, text: &str) {
    turn.reply(OutgoingMessage::plain(text).markup(messages::warehouse_keyboard())).await;
}

async fn warehouse(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let Ok(warehouse) = turn.text().parse::<Warehouse>() else {
        prompt_warehouse(turn, messages::INVALID_WAREHOUSE).await;
        return Ok(());
    };
    let Some(mut order) = draft(turn).await? else {
        return Ok(());
    };
    order.warehouse = Some(warehouse);
    order.delivery_date = None;
    order.pickup_date = None;
    turn.save_order(&mut order).await?;

    let services = turn.services;
    match schedule::delivery_menu(warehouse, services.clock.today(), services.settings.horizon_days)
    {
        Ok(dates) => {
            if turn.transition(SessionPatch::to_state(ConversationState::SelectDeliveryDate)).await?
            {
                turn.reply(
                    OutgoingMessage::plain(messages::CHOOSE_DELIVERY_DATE)
                        .markup(messages::dates_keyboard(&dates)),
                )
                .await;
            }
        }
        Err(ScheduleError::Exhausted { .. }) => {
            tracing::info!(
                event_name = "intake.no_slots",
                correlation_id = %turn.ctx.correlation_id,
                chat_id = turn.chat_id(),
                warehouse = warehouse.name(),
                "no delivery dates within horizon"
            );
            turn.reply(
                OutgoingMessage::plain(messages::NO_SLOTS).markup(messages::restart_keyboard()),
            )
            .await;
        }
    }
    Ok(())
}

async fn delivery_date(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let Some(mut order) = draft(turn).await? else {
        return Ok(());
    };
    let Some(warehouse) = order.warehouse else {
        turn.transition(SessionPatch::to_state(ConversationState::SelectWarehouse)).await?;
        prompt_warehouse(turn, messages::CHOOSE_WAREHOUSE).await;
        return Ok(());
    };

    let today = turn.services.clock.today();
    let menu = schedule::delivery_menu(warehouse, today, turn.services.settings.horizon_days)
        .unwrap_or_default();
    let chosen = schedule::parse_date(turn.text()).filter(|date| menu.contains(date));
    let Some(delivery) = chosen else {
        turn.reply(
            OutgoingMessage::plain(messages::INVALID_DATE_FORMAT)
                .markup(messages::dates_keyboard(&menu)),
        )
        .await;
        return Ok(());
    };

    let pickups = schedule::pickup_dates(warehouse, delivery, today);
    order.delivery_date = Some(delivery);

    if let [only] = pickups.as_slice() {
        order.pickup_date = Some(*only);
        turn.save_order(&mut order).await?;
        if turn.transition(SessionPatch::to_state(ConversationState::SelectCargoType)).await? {
            prompt_cargo(turn, messages::CHOOSE_CARGO_TYPE).await;
        }
        return Ok(());
    }

    order.pickup_date = None;
    turn.save_order(&mut order).await?;
    if turn.transition(SessionPatch::to_state(ConversationState::SelectPickupDate)).await? {
        turn.reply(
            OutgoingMessage::plain(messages::CHOOSE_PICKUP_DATE)
                .markup(messages::dates_keyboard(&pickups)),
        )
        .await;
    }
    Ok(())
}

async fn pickup_date(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let Some(mut order) = draft(turn).await? else {
        return Ok(());
    };
    let (Some(warehouse), Some(delivery)) = (order.warehouse, order.delivery_date) else {
        turn.transition(SessionPatch::to_state(ConversationState::SelectWarehouse)).await?;
        prompt_warehouse(turn, messages::CHOOSE_WAREHOUSE).await;
        return Ok(());
    };

    let allowed = schedule::pickup_dates(warehouse, delivery, turn.services.clock.today());
    let chosen = schedule::parse_date(turn.text()).filter(|date| allowed.contains(date));
    let Some(pickup) = chosen else {
        turn.reply(
            OutgoingMessage::plain(messages::INVALID_PICKUP_DATE)
                .markup(messages::dates_keyboard(&allowed)),
        )
        .await;
        return Ok(());
    };

    order.pickup_date = Some(pickup);
    turn.save_order(&mut order).await?;
    if turn.transition(SessionPatch::to_state(ConversationState::SelectCargoType)).await? {
        prompt_cargo(turn, messages::CHOOSE_CARGO_TYPE).await;
    }
    Ok(())
}

async fn prompt_cargo(turn: &Turn<'_>, text: &str) {
    turn.reply(OutgoingMessage::plain(text).markup(messages::cargo_keyboard())).await;
}

async fn cargo_type(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let Some(cargo) = CargoType::from_button(turn.text()) else {
        prompt_cargo(turn, messages::INVALID_CHOICE).await;
        return Ok(());
    };
    let Some(mut order) = draft(turn).await? else {
        return Ok(());
    };
    order.cargo_type = Some(cargo);
    turn.save_order(&mut order).await?;

    if turn.transition(SessionPatch::to_state(ConversationState::EnterCargoQuantity)).await? {
        turn.reply(
            OutgoingMessage::plain(messages::enter_quantity(cargo.unit()))
                .markup(messages::restart_keyboard()),
        )
        .await;
    }
    Ok(())
}

async fn quantity(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let Some(mut order) = draft(turn).await? else {
        return Ok(());
    };
    let parsed = turn.text().trim().parse::<u32>().ok().filter(|value| *value > 0);
    let Some(quantity) = parsed else {
        turn.reply(
            OutgoingMessage::plain(messages::invalid_quantity(order.cargo_unit()))
                .markup(messages::restart_keyboard()),
        )
        .await;
        return Ok(());
    };
    order.quantity = Some(quantity);
    turn.save_order(&mut order).await?;

    if turn.transition(SessionPatch::to_state(ConversationState::EnterPickupAddress)).await? {
        let addresses = previous_values(turn, |order| order.pickup_address.clone()).await?;
        let addresses: Vec<String> =
            addresses.into_iter().filter(|address| !is_digits(address)).collect();
        let prompt = if addresses.is_empty() {
            OutgoingMessage::plain(messages::ENTER_ADDRESS).markup(messages::restart_keyboard())
        } else {
            OutgoingMessage::plain(messages::CHOOSE_ADDRESS)
                .markup(messages::address_keyboard(&addresses))
        };
        turn.reply(prompt).await;
    }
    Ok(())
}

/// Distinct non-empty values from the chat's earlier orders, newest first.
async fn previous_values(
    turn: &Turn<'_>,
    pick: impl Fn(&Order) -> Option<String>,
) -> Result<Vec<String>, WorkflowError> {
    let mut seen = BTreeSet::new();
    let values = turn
        .services
        .orders
        .list_for_chat(turn.chat_id())
        .await?
        .iter()
        .filter(|order| Some(&order.id) != turn.session.active_order.as_ref())
        .filter_map(|order| pick(order))
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty() && seen.insert(value.clone()))
        .collect();
    Ok(values)
}

async fn pickup_address(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let text = turn.text();
    let address = text.strip_prefix(buttons::ADDRESS_PREFIX).unwrap_or(text).trim();
    if address.is_empty() {
        turn.reply(
            OutgoingMessage::plain(messages::EMPTY_ADDRESS).markup(messages::restart_keyboard()),
        )
        .await;
        return Ok(());
    }
    let Some(mut order) = draft(turn).await? else {
        return Ok(());
    };
    order.pickup_address = Some(address.to_owned());
    turn.save_order(&mut order).await?;

    if turn.transition(SessionPatch::to_state(ConversationState::EnterPhoneNumber)).await? {
        prompt_phone(turn).await?;
    }
    Ok(())
}

async fn prompt_phone(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let phones = previous_values(turn, |order| order.phone.clone()).await?;
    turn.reply(
        OutgoingMessage::plain(messages::CHOOSE_PHONE).markup(messages::phone_keyboard(&phones)),
    )
    .await;
    Ok(())
}

fn phone_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+\d+$").ok()).as_ref()
}

fn with_plus(phone: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with('+') {
        phone.to_owned()
    } else {
        format!("+{phone}")
    }
}

/// Accepts a shared contact, a remembered-number button, or a typed `+digits` number.
fn parse_phone(kind: &EventKind) -> Option<String> {
    match kind {
        EventKind::Contact { phone } if !phone.trim().is_empty() => Some(with_plus(phone)),
        EventKind::Text(text) => {
            if let Some(saved) = text.strip_prefix(buttons::PHONE_PREFIX) {
                return Some(with_plus(saved)).filter(|phone| phone.len() > 1);
            }
            let typed = text.trim();
            phone_pattern().filter(|pattern| pattern.is_match(typed)).map(|_| typed.to_owned())
        }
        _ => None,
    }
}

async fn phone(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let Some(phone) = parse_phone(&turn.event.kind) else {
        return prompt_phone(turn).await;
    };
    let Some(mut order) = draft(turn).await? else {
        return Ok(());
    };
    let (Some(warehouse), Some(cargo), Some(quantity)) =
        (order.warehouse, order.cargo_type, order.quantity)
    else {
        return restart_lost(turn).await;
    };

    order.phone = Some(phone);
    order.cost = Some(turn.services.pricing.price(
        order.deal_type,
        warehouse,
        cargo,
        i64::from(quantity),
    ));
    turn.save_order(&mut order).await?;

    if !turn.transition(SessionPatch::to_state(ConversationState::AwaitingOrderSubmit)).await? {
        return Ok(());
    }
    let summary = OutgoingMessage::markdown(messages::review_summary(&order, turn.wording()))
        .markup(messages::submit_keyboard());
    if let Some(message_id) = turn.reply(summary).await {
        order.messages.summary = Some(message_id);
        turn.save_order(&mut order).await?;
    }
    Ok(())
}

async fn restart_lost(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    turn.overwrite(SessionPatch::reset().with_state(ConversationState::Start)).await?;
    turn.reply(
        OutgoingMessage::plain(messages::ORDER_LOST).markup(messages::main_menu(turn.role())),
    )
    .await;
    Ok(())
}

async fn submit(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    if turn.text() != buttons::SUBMIT {
        turn.reply(
            OutgoingMessage::plain(messages::PRESS_SUBMIT).markup(messages::submit_keyboard()),
        )
        .await;
        return Ok(());
    }

    let order = turn.active_order().await?.filter(Order::is_ready_for_submission);
    let Some(mut order) = order else {
        turn.overwrite(SessionPatch::reset().with_state(ConversationState::Start)).await?;
        turn.reply(
            OutgoingMessage::plain(turn.wording().missing_order)
                .markup(messages::main_menu(turn.role())),
        )
        .await;
        return Ok(());
    };

    // Claim the submission first so a double tap cannot create two deals.
    if !turn.transition(SessionPatch::to_state(ConversationState::Submitted)).await? {
        return Ok(());
    }

    let services = turn.services;
    let deal_id = match services.crm.submit_order(&order, turn.session.username()).await {
        Ok(deal_id) => deal_id,
        Err(error) => {
            tracing::warn!(
                event_name = "intake.submit_failed",
                correlation_id = %turn.ctx.correlation_id,
                chat_id = turn.chat_id(),
                order_id = %order.id,
                error = %error,
                "CRM rejected the order"
            );
            services
                .sessions
                .update(
                    &turn.key(),
                    StateGuard::Is(Some(ConversationState::Submitted)),
                    &SessionPatch::to_state(ConversationState::AwaitingOrderSubmit),
                    services.clock.now(),
                )
                .await?;
            turn.reply(
                OutgoingMessage::plain(messages::SUBMIT_FAILED).markup(messages::submit_keyboard()),
            )
            .await;
            return Ok(());
        }
    };

    order.crm_deal_id = Some(deal_id.clone());
    order.advance(LifecycleEvent::Submitted)?;
    if let Some(review) = order.messages.summary.take() {
        services.retract(turn.role(), turn.chat_id(), review).await;
    }
    order.messages.summary = turn
        .reply(
            OutgoingMessage::plain(messages::final_summary(&order, turn.wording()))
                .markup(ReplyMarkup::remove()),
        )
        .await;
    turn.save_order(&mut order).await?;

    services
        .sessions
        .update(
            &turn.key(),
            StateGuard::Is(Some(ConversationState::Submitted)),
            &SessionPatch::default().without_active_order(),
            services.clock.now(),
        )
        .await?;

    tracing::info!(
        event_name = "order.submitted",
        correlation_id = %turn.ctx.correlation_id,
        chat_id = turn.chat_id(),
        order_id = %order.id,
        deal_id = %deal_id,
        deal_type = order.deal_type.as_str(),
        "order submitted to CRM"
    );
    turn.reply(
        OutgoingMessage::plain(messages::STATUS_UPDATES).markup(messages::restart_keyboard()),
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use cargolink_telegram::EventKind;

    use super::{looks_like_inn, parse_phone};

    #[test]
    fn inn_has_ten_or_twelve_digits() {
        assert!(looks_like_inn("7707083893"));
        assert!(looks_like_inn("500100732259"));
        assert!(!looks_like_inn("77070838"));
        assert!(!looks_like_inn("77070838AB"));
    }

    #[test]
    fn phone_sources_are_normalized() {
        let contact = EventKind::Contact { phone: "79991234567".to_owned() };
        assert_eq!(parse_phone(&contact).as_deref(), Some("+79991234567"));

        let saved = EventKind::Text("📞 +79990000000".to_owned());
        assert_eq!(parse_phone(&saved).as_deref(), Some("+79990000000"));

        let typed = EventKind::Text("+74951112233".to_owned());
        assert_eq!(parse_phone(&typed).as_deref(), Some("+74951112233"));

        assert_eq!(parse_phone(&EventKind::Text("8 999 123".to_owned())), None);
    }
}
