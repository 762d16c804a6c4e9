use cargolink_core::domain::session::{ConversationState, SessionPatch};
use cargolink_telegram::{EventKind, OutgoingMessage};

use crate::error::WorkflowError;
use crate::handlers::Turn;
use crate::lifecycle::LifecycleCoordinator;
use crate::messages;
use crate::routes::DriverAction;

/// `/start` on the driver bot. The username is what CRM mentions resolve against.
pub async fn register(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    turn.overwrite(SessionPatch::reset()).await?;
    let text = match turn.session.username() {
        Some(username) => {
            tracing::info!(
                event_name = "driver.registered",
                correlation_id = %turn.ctx.correlation_id,
                chat_id = turn.chat_id(),
                username,
                "driver chat registered"
            );
            messages::driver_registered(username)
        }
        None => messages::DRIVER_NEEDS_USERNAME.to_owned(),
    };
    turn.reply(OutgoingMessage::plain(text)).await;
    Ok(())
}

pub async fn action(
    turn: &Turn<'_>,
    coordinator: &LifecycleCoordinator,
    action: DriverAction,
) -> Result<(), WorkflowError> {
    let EventKind::Callback { intent, .. } = &turn.event.kind else {
        return Ok(());
    };
    let Some((_, deal)) = DriverAction::of(intent) else {
        return Ok(());
    };
    let chat = turn.chat_id();
    match action {
        DriverAction::PickedUp => coordinator.picked_up(chat, deal, turn.ctx).await,
        DriverAction::Packing => coordinator.packing(chat, deal, turn.ctx).await,
        DriverAction::Delivering => coordinator.delivering(chat, deal, turn.ctx).await,
        DriverAction::Delivered => coordinator.delivered(chat, deal, turn.ctx).await,
    }
}

/// Text typed while the session waits for a count or a gate number.
pub async fn step(
    turn: &Turn<'_>,
    coordinator: &LifecycleCoordinator,
    state: ConversationState,
) -> Result<(), WorkflowError> {
    let Some(deal) = turn.session.active_deal.clone() else {
        turn.overwrite(SessionPatch::reset()).await?;
        return Ok(());
    };
    let text = turn.text().trim();

    match state {
        ConversationState::AwaitingFinalQuantity => match text.parse::<u32>() {
            Ok(quantity) if text.chars().all(|c| c.is_ascii_digit()) => {
                coordinator.final_quantity(turn.chat_id(), &deal, quantity, turn.ctx).await
            }
            _ => reprompt(turn, coordinator, state).await,
        },
        ConversationState::AwaitingGateNumber if !text.is_empty() => {
            coordinator.gate_number(turn.chat_id(), &deal, text, turn.ctx).await
        }
        _ => reprompt(turn, coordinator, state).await,
    }
}

pub async fn reprompt(
    turn: &Turn<'_>,
    coordinator: &LifecycleCoordinator,
    state: ConversationState,
) -> Result<(), WorkflowError> {
    coordinator
        .reprompt_driver(turn.chat_id(), state, turn.session.active_deal.as_ref(), turn.ctx)
        .await
}
