use cargolink_core::domain::calculation::Calculation;
use cargolink_core::domain::order::{CargoType, DealType};
use cargolink_core::domain::session::{ConversationState, SessionPatch};
use cargolink_core::domain::warehouse::Warehouse;
use cargolink_core::schedule;
use cargolink_telegram::OutgoingMessage;

use crate::error::WorkflowError;
use crate::handlers::Turn;
use crate::messages;

pub async fn begin(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let calculation = Calculation::new(turn.chat_id(), turn.services.clock.now());
    turn.services.calculations.save(&calculation).await?;
    turn.overwrite(
        SessionPatch::reset()
            .with_state(ConversationState::CalcWarehouse)
            .with_active_calculation(calculation.id),
    )
    .await?;
    turn.reply(
        OutgoingMessage::plain(messages::CALC_CHOOSE_WAREHOUSE)
            .markup(messages::warehouse_keyboard()),
    )
    .await;
    Ok(())
}

pub async fn step(turn: &Turn<'_>, state: ConversationState) -> Result<(), WorkflowError> {
    match state {
        ConversationState::CalcWarehouse => warehouse(turn).await,
        ConversationState::CalcCargoType => cargo_type(turn).await,
        ConversationState::CalcQuantity => quantity(turn).await,
        _ => Ok(()),
    }
}

async fn active(turn: &Turn<'_>) -> Result<Option<Calculation>, WorkflowError> {
    let found = match &turn.session.active_calculation {
        Some(id) => turn.services.calculations.find_by_id(id).await?,
        None => None,
    };
    if found.is_none() {
        turn.reply(OutgoingMessage::markdown(messages::CALC_MISSING)).await;
    }
    Ok(found)
}

async fn warehouse(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let Ok(warehouse) = turn.text().parse::<Warehouse>() else {
        turn.reply(
            OutgoingMessage::plain(messages::CALC_INVALID_WAREHOUSE)
                .markup(messages::warehouse_keyboard()),
        )
        .await;
        return Ok(());
    };
    let Some(mut calculation) = active(turn).await? else {
        return Ok(());
    };
    calculation.warehouse = Some(warehouse);
    turn.services.calculations.save(&calculation).await?;

    if turn.transition(SessionPatch::to_state(ConversationState::CalcCargoType)).await? {
        turn.reply(
            OutgoingMessage::plain(messages::CALC_CHOOSE_CARGO)
                .markup(messages::calc_cargo_keyboard()),
        )
        .await;
    }
    Ok(())
}

async fn cargo_type(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let Some(cargo) = CargoType::from_label(turn.text()) else {
        turn.reply(
            OutgoingMessage::plain(messages::CALC_INVALID_CARGO)
                .markup(messages::calc_cargo_keyboard()),
        )
        .await;
        return Ok(());
    };
    let Some(mut calculation) = active(turn).await? else {
        return Ok(());
    };
    calculation.cargo_type = Some(cargo);
    turn.services.calculations.save(&calculation).await?;

    if turn.transition(SessionPatch::to_state(ConversationState::CalcQuantity)).await? {
        turn.reply(
            OutgoingMessage::markdown(messages::calc_enter_quantity(cargo.unit()))
                .markup(messages::restart_keyboard()),
        )
        .await;
    }
    Ok(())
}

/// Prices the quick quote with the standard table and lists the open slots.
async fn quantity(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let Some(mut calculation) = active(turn).await? else {
        return Ok(());
    };
    let Some(warehouse) = calculation.warehouse else {
        turn.transition(SessionPatch::to_state(ConversationState::CalcWarehouse)).await?;
        turn.reply(
            OutgoingMessage::plain(messages::CALC_NEEDS_WAREHOUSE)
                .markup(messages::warehouse_keyboard()),
        )
        .await;
        return Ok(());
    };
    let cargo = calculation.cargo_type.unwrap_or(CargoType::Boxes);

    let parsed = turn.text().trim().parse::<u32>().ok().filter(|value| *value > 0);
    let Some(quantity) = parsed else {
        turn.reply(
            OutgoingMessage::markdown(messages::calc_invalid_quantity(cargo.unit()))
                .markup(messages::restart_keyboard()),
        )
        .await;
        return Ok(());
    };

    let services = turn.services;
    let cost = services.pricing.price(DealType::Delivery, warehouse, cargo, i64::from(quantity));
    calculation.quantity = Some(quantity);
    calculation.cost = Some(cost);
    services.calculations.save(&calculation).await?;

    let slots =
        schedule::schedule(warehouse, services.clock.today(), services.settings.horizon_days);
    if !turn.transition(SessionPatch::reset()).await? {
        return Ok(());
    }
    tracing::info!(
        event_name = "calc.quoted",
        correlation_id = %turn.ctx.correlation_id,
        chat_id = turn.chat_id(),
        warehouse = warehouse.name(),
        quantity,
        cost,
        "quick quote computed"
    );
    turn.reply(
        OutgoingMessage::plain(messages::estimate(cost, &slots))
            .markup(messages::main_menu(turn.role())),
    )
    .await;
    Ok(())
}
