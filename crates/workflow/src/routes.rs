use std::collections::HashMap;

use cargolink_core::domain::order::DealId;
use cargolink_core::domain::session::{BotRole, ConversationState};
use cargolink_telegram::{CallbackIntent, ChatEvent, EventKind};

use crate::messages::{buttons, commands};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DriverAction {
    PickedUp,
    Packing,
    Delivering,
    Delivered,
}

impl DriverAction {
    pub fn of(intent: &CallbackIntent) -> Option<(Self, &DealId)> {
        match intent {
            CallbackIntent::PickedUp(deal) => Some((Self::PickedUp, deal)),
            CallbackIntent::Packing(deal) => Some((Self::Packing, deal)),
            CallbackIntent::Delivering(deal) => Some((Self::Delivering, deal)),
            CallbackIntent::Delivered(deal) => Some((Self::Delivered, deal)),
            CallbackIntent::Inert => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Welcome,
    IntakeIntro,
    IntakeBegin,
    CalcBegin,
    PayByInvoice,
    PayBySbp,
    DriverRegister,
    Step(ConversationState),
    Driver(DriverAction),
    /// A blocking wait state swallowed the event; repeat its prompt.
    Reprompt(ConversationState),
}

/// Static `(bot_role, key) → route` tables consulted by the dispatcher.
///
/// Commands are matched on exact text before the session state is considered.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    commands: HashMap<BotRole, HashMap<&'static str, Route>>,
    states: HashMap<BotRole, HashMap<ConversationState, Route>>,
    callbacks: HashMap<BotRole, HashMap<DriverAction, Route>>,
}

impl RouteTable {
    pub fn standard() -> Self {
        use ConversationState as S;

        let mut table = Self::default();

        let delivery = BotRole::ClientDelivery;
        table
            .command(delivery, commands::START, Route::Welcome)
            .command(delivery, buttons::RESTART, Route::Welcome)
            .command(delivery, commands::NEW, Route::IntakeIntro)
            .command(delivery, buttons::NEW_ORDER, Route::IntakeIntro)
            .command(delivery, buttons::CREATE_ORDER, Route::IntakeBegin)
            .command(delivery, commands::CALC, Route::CalcBegin)
            .command(delivery, buttons::CALCULATE, Route::CalcBegin)
            .command(delivery, buttons::PAY_BY_INVOICE, Route::PayByInvoice)
            .command(delivery, buttons::PAY_BY_SBP, Route::PayBySbp);
        let calc_steps = [S::CalcWarehouse, S::CalcCargoType, S::CalcQuantity];
        for state in INTAKE_STEPS.into_iter().chain(calc_steps) {
            table.state(delivery, state);
        }

        let fulfilment = BotRole::ClientFulfilment;
        table
            .command(fulfilment, commands::START, Route::IntakeIntro)
            .command(fulfilment, buttons::RESTART, Route::IntakeIntro)
            .command(fulfilment, buttons::FULFILMENT_NEW_ORDER, Route::IntakeBegin);
        for state in INTAKE_STEPS.into_iter().chain([S::Start]) {
            table.state(fulfilment, state);
        }

        let driver = BotRole::Driver;
        table.command(driver, commands::START, Route::DriverRegister);
        table.state(driver, S::AwaitingFinalQuantity).state(driver, S::AwaitingGateNumber);
        for action in [
            DriverAction::PickedUp,
            DriverAction::Packing,
            DriverAction::Delivering,
            DriverAction::Delivered,
        ] {
            table.callback(driver, action);
        }

        table
    }

    pub fn command(&mut self, role: BotRole, text: &'static str, route: Route) -> &mut Self {
        self.commands.entry(role).or_default().insert(text, route);
        self
    }

    pub fn state(&mut self, role: BotRole, state: ConversationState) -> &mut Self {
        self.states.entry(role).or_default().insert(state, Route::Step(state));
        self
    }

    pub fn callback(&mut self, role: BotRole, action: DriverAction) -> &mut Self {
        self.callbacks.entry(role).or_default().insert(action, Route::Driver(action));
        self
    }

    pub fn command_route(&self, role: BotRole, text: &str) -> Option<Route> {
        let table = self.commands.get(&role)?;
        if let Some(route) = table.get(text) {
            return Some(*route);
        }
        // `/start@bot_name`, as sent from group chats.
        let command = text.strip_prefix('/').and(text.split('@').next())?;
        table.get(command).copied()
    }

    pub fn state_route(&self, role: BotRole, state: ConversationState) -> Option<Route> {
        self.states.get(&role)?.get(&state).copied()
    }

    pub fn callback_route(&self, role: BotRole, action: DriverAction) -> Option<Route> {
        self.callbacks.get(&role)?.get(&action).copied()
    }

    /// Picks the route for `event` given the stored session state, or `None` when unrouted.
    ///
    /// A blocking state takes every event except the role's registration command.
    pub fn resolve(&self, event: &ChatEvent, state: Option<ConversationState>) -> Option<Route> {
        let role = event.bot_role;
        let blocking = state.filter(|state| state.is_blocking());

        match &event.kind {
            EventKind::Callback { intent, .. } => {
                let action = DriverAction::of(intent).map(|(action, _)| action)?;
                let route = self.callback_route(role, action)?;
                Some(blocking.map_or(route, Route::Reprompt))
            }
            EventKind::Text(text) => {
                let command = self.command_route(role, text);
                if let Some(state) = blocking {
                    return match command {
                        Some(Route::DriverRegister) => command,
                        _ => self.state_route(role, state),
                    };
                }
                command.or_else(|| state.and_then(|state| self.state_route(role, state)))
            }
            EventKind::Contact { .. } => state.and_then(|state| self.state_route(role, state)),
        }
    }
}

const INTAKE_STEPS: [ConversationState; 13] = [
    ConversationState::AwaitingInn,
    ConversationState::SelectExistingOrg,
    ConversationState::ConfirmInn,
    ConversationState::AwaitingBankAccount,
    ConversationState::AwaitingBankCode,
    ConversationState::SelectWarehouse,
    ConversationState::SelectDeliveryDate,
    ConversationState::SelectPickupDate,
    ConversationState::SelectCargoType,
    ConversationState::EnterCargoQuantity,
    ConversationState::EnterPickupAddress,
    ConversationState::EnterPhoneNumber,
    ConversationState::AwaitingOrderSubmit,
];

#[cfg(test)]
mod tests {
    use cargolink_core::domain::order::DealId;
    use cargolink_core::domain::session::{BotRole, ChatProfile, ConversationState};
    use cargolink_telegram::{CallbackIntent, ChatEvent, EventKind};

    use super::{DriverAction, Route, RouteTable};

    fn event(role: BotRole, kind: EventKind) -> ChatEvent {
        ChatEvent { update_id: 1, bot_role: role, chat_id: 7, sender: ChatProfile::default(), kind }
    }

    fn text(role: BotRole, value: &str) -> ChatEvent {
        event(role, EventKind::Text(value.to_owned()))
    }

    #[test]
    fn commands_win_over_state() {
        let table = RouteTable::standard();
        let restart = text(BotRole::ClientDelivery, "🔄 Начать заново");
        assert_eq!(
            table.resolve(&restart, Some(ConversationState::EnterCargoQuantity)),
            Some(Route::Welcome)
        );

        let quantity = text(BotRole::ClientDelivery, "12");
        assert_eq!(
            table.resolve(&quantity, Some(ConversationState::EnterCargoQuantity)),
            Some(Route::Step(ConversationState::EnterCargoQuantity))
        );
    }

    #[test]
    fn unknown_command_without_state_is_unrouted() {
        let table = RouteTable::standard();
        assert_eq!(table.resolve(&text(BotRole::ClientDelivery, "/help"), None), None);
        assert_eq!(table.resolve(&text(BotRole::ClientFulfilment, "/calc"), None), None);
        let idle_text = text(BotRole::ClientDelivery, "привет");
        assert_eq!(table.resolve(&idle_text, Some(ConversationState::Submitted)), None);
    }

    #[test]
    fn commands_are_scoped_per_bot() {
        let table = RouteTable::standard();
        assert_eq!(
            table.command_route(BotRole::ClientFulfilment, "/start"),
            Some(Route::IntakeIntro)
        );
        assert_eq!(
            table.command_route(BotRole::ClientDelivery, "/start@cargo_bot"),
            Some(Route::Welcome)
        );
        assert_eq!(table.command_route(BotRole::Driver, "📦 Создать заявку"), None);
    }

    #[test]
    fn blocking_state_swallows_commands_and_callbacks() {
        let table = RouteTable::standard();
        let waiting = Some(ConversationState::AwaitingGateNumber);

        let callback = event(
            BotRole::Driver,
            EventKind::Callback {
                query_id: "q".to_owned(),
                message_id: Some(3),
                intent: CallbackIntent::Packing(DealId("9".to_owned())),
            },
        );
        assert_eq!(
            table.resolve(&callback, waiting),
            Some(Route::Reprompt(ConversationState::AwaitingGateNumber))
        );
        assert_eq!(table.resolve(&callback, None), Some(Route::Driver(DriverAction::Packing)));

        assert_eq!(
            table.resolve(&text(BotRole::Driver, "/start"), waiting),
            Some(Route::DriverRegister)
        );
        assert_eq!(
            table.resolve(&text(BotRole::Driver, "4B"), waiting),
            Some(Route::Step(ConversationState::AwaitingGateNumber))
        );
    }

    #[test]
    fn inert_buttons_and_contacts_outside_phone_step_are_unrouted() {
        let table = RouteTable::standard();
        let inert = event(
            BotRole::Driver,
            EventKind::Callback {
                query_id: "q".to_owned(),
                message_id: None,
                intent: CallbackIntent::Inert,
            },
        );
        assert_eq!(table.resolve(&inert, None), None);

        let contact =
            event(BotRole::ClientDelivery, EventKind::Contact { phone: "7999".to_owned() });
        assert_eq!(table.resolve(&contact, None), None);
        assert_eq!(
            table.resolve(&contact, Some(ConversationState::EnterPhoneNumber)),
            Some(Route::Step(ConversationState::EnterPhoneNumber))
        );
    }
}
