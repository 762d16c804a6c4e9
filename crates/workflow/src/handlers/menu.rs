use cargolink_core::domain::session::{BotRole, ConversationState, SessionPatch};
use cargolink_telegram::OutgoingMessage;

use crate::error::WorkflowError;
use crate::handlers::Turn;
use crate::messages;

/// `/start` on the delivery bot: drop any draft pointer and show the main menu.
pub async fn welcome(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    turn.overwrite(SessionPatch::reset().with_state(ConversationState::Start)).await?;
    turn.reply(
        OutgoingMessage::markdown(messages::WELCOME).markup(messages::main_menu(turn.role())),
    )
    .await;
    Ok(())
}

/// Lists what intake will ask for. The fulfilment bot also lands here on `/start`.
pub async fn intake_intro(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    let next = match turn.role() {
        BotRole::ClientDelivery => ConversationState::AwaitingInn,
        _ => ConversationState::Start,
    };
    turn.overwrite(SessionPatch::reset().with_state(next)).await?;
    turn.reply(
        OutgoingMessage::markdown(messages::intro(turn.wording()))
            .markup(messages::intro_keyboard(turn.role())),
    )
    .await;
    Ok(())
}

/// Idle fulfilment chat typed something other than the start button.
pub async fn fulfilment_idle(turn: &Turn<'_>) -> Result<(), WorkflowError> {
    turn.reply(
        OutgoingMessage::markdown(messages::FULFILMENT_IDLE)
            .markup(messages::main_menu(turn.role())),
    )
    .await;
    Ok(())
}
