use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::calculation::CalculationId;
use crate::domain::order::{DealId, DealType, OrderId};
use crate::domain::ChatId;
use crate::errors::DomainError;

/// Which of the three bots a chat belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotRole {
    #[serde(rename = "delivery")]
    ClientDelivery,
    #[serde(rename = "fulfilment")]
    ClientFulfilment,
    Driver,
}

impl BotRole {
    pub const ALL: [BotRole; 3] =
        [BotRole::ClientDelivery, BotRole::ClientFulfilment, BotRole::Driver];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientDelivery => "delivery",
            Self::ClientFulfilment => "fulfilment",
            Self::Driver => "driver",
        }
    }

    /// Deal type of orders drafted through this bot; drivers draft none.
    pub fn deal_type(self) -> Option<DealType> {
        match self {
            Self::ClientDelivery => Some(DealType::Delivery),
            Self::ClientFulfilment => Some(DealType::Fulfilment),
            Self::Driver => None,
        }
    }

    pub fn for_deal_type(deal_type: DealType) -> Self {
        match deal_type {
            DealType::Delivery => Self::ClientDelivery,
            DealType::Fulfilment => Self::ClientFulfilment,
        }
    }
}

impl fmt::Display for BotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BotRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "delivery" => Ok(Self::ClientDelivery),
            "fulfilment" => Ok(Self::ClientFulfilment),
            "driver" => Ok(Self::Driver),
            other => Err(DomainError::InvariantViolation(format!("unknown bot role `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub chat_id: ChatId,
    pub role: BotRole,
}

impl SessionKey {
    pub fn new(chat_id: ChatId, role: BotRole) -> Self {
        Self { chat_id, role }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatProfile {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Start,
    AwaitingInn,
    SelectExistingOrg,
    ConfirmInn,
    AwaitingBankAccount,
    AwaitingBankCode,
    SelectWarehouse,
    SelectDeliveryDate,
    SelectPickupDate,
    SelectCargoType,
    EnterCargoQuantity,
    EnterPickupAddress,
    EnterPhoneNumber,
    AwaitingOrderSubmit,
    Submitted,
    CalcWarehouse,
    CalcCargoType,
    CalcQuantity,
    AwaitingFinalQuantity,
    AwaitingGateNumber,
}

impl ConversationState {
    pub const ALL: [ConversationState; 20] = [
        Self::Start,
        Self::AwaitingInn,
        Self::SelectExistingOrg,
        Self::ConfirmInn,
        Self::AwaitingBankAccount,
        Self::AwaitingBankCode,
        Self::SelectWarehouse,
        Self::SelectDeliveryDate,
        Self::SelectPickupDate,
        Self::SelectCargoType,
        Self::EnterCargoQuantity,
        Self::EnterPickupAddress,
        Self::EnterPhoneNumber,
        Self::AwaitingOrderSubmit,
        Self::Submitted,
        Self::CalcWarehouse,
        Self::CalcCargoType,
        Self::CalcQuantity,
        Self::AwaitingFinalQuantity,
        Self::AwaitingGateNumber,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AwaitingInn => "awaiting_inn",
            Self::SelectExistingOrg => "select_existing_org",
            Self::ConfirmInn => "confirm_inn",
            Self::AwaitingBankAccount => "awaiting_bank_account",
            Self::AwaitingBankCode => "awaiting_bank_code",
            Self::SelectWarehouse => "select_warehouse",
            Self::SelectDeliveryDate => "select_delivery_date",
            Self::SelectPickupDate => "select_pickup_date",
            Self::SelectCargoType => "select_cargo_type",
            Self::EnterCargoQuantity => "enter_cargo_quantity",
            Self::EnterPickupAddress => "enter_pickup_address",
            Self::EnterPhoneNumber => "enter_phone_number",
            Self::AwaitingOrderSubmit => "awaiting_order_submit",
            Self::Submitted => "submitted",
            Self::CalcWarehouse => "calc_warehouse",
            Self::CalcCargoType => "calc_cargo_type",
            Self::CalcQuantity => "calc_quantity",
            Self::AwaitingFinalQuantity => "awaiting_final_quantity",
            Self::AwaitingGateNumber => "awaiting_gate_number",
        }
    }

    /// Driver states that hold all other driver input until answered.
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::AwaitingFinalQuantity | Self::AwaitingGateNumber)
    }
}

impl FromStr for ConversationState {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|state| state.as_str() == value).ok_or_else(|| {
            DomainError::InvariantViolation(format!("unknown conversation state `{value}`"))
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub key: SessionKey,
    pub profile: ChatProfile,
    pub state: Option<ConversationState>,
    pub active_order: Option<OrderId>,
    pub active_calculation: Option<CalculationId>,
    pub active_deal: Option<DealId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(key: SessionKey, profile: ChatProfile, now: DateTime<Utc>) -> Self {
        Self {
            key,
            profile,
            state: None,
            active_order: None,
            active_calculation: None,
            active_deal: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.profile.username.as_deref()
    }

    pub fn matches(&self, guard: &StateGuard) -> bool {
        match guard {
            StateGuard::Any => true,
            StateGuard::Is(expected) => self.state == *expected,
        }
    }

    pub fn apply(&mut self, patch: &SessionPatch, now: DateTime<Utc>) {
        patch.state.apply_to(&mut self.state);
        patch.active_order.apply_to(&mut self.active_order);
        patch.active_calculation.apply_to(&mut self.active_calculation);
        patch.active_deal.apply_to(&mut self.active_deal);
        self.updated_at = now;
    }
}

/// A single field change within a session update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T: Clone> Patch<T> {
    pub fn apply_to(&self, target: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Set(value) => *target = Some(value.clone()),
            Self::Clear => *target = None,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    pub fn map<U>(&self, f: impl FnOnce(&T) -> U) -> Patch<U> {
        match self {
            Self::Keep => Patch::Keep,
            Self::Set(value) => Patch::Set(f(value)),
            Self::Clear => Patch::Clear,
        }
    }
}

/// Set of session field changes persisted as one atomic update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub state: Patch<ConversationState>,
    pub active_order: Patch<OrderId>,
    pub active_calculation: Patch<CalculationId>,
    pub active_deal: Patch<DealId>,
}

impl SessionPatch {
    pub fn to_state(state: ConversationState) -> Self {
        Self { state: Patch::Set(state), ..Self::default() }
    }

    /// Clears the state and every active pointer.
    pub fn reset() -> Self {
        Self {
            state: Patch::Clear,
            active_order: Patch::Clear,
            active_calculation: Patch::Clear,
            active_deal: Patch::Clear,
        }
    }

    pub fn with_state(mut self, state: ConversationState) -> Self {
        self.state = Patch::Set(state);
        self
    }

    pub fn with_active_order(mut self, order_id: OrderId) -> Self {
        self.active_order = Patch::Set(order_id);
        self
    }

    pub fn without_active_order(mut self) -> Self {
        self.active_order = Patch::Clear;
        self
    }

    pub fn with_active_calculation(mut self, calculation_id: CalculationId) -> Self {
        self.active_calculation = Patch::Set(calculation_id);
        self
    }

    pub fn without_active_calculation(mut self) -> Self {
        self.active_calculation = Patch::Clear;
        self
    }

    pub fn with_active_deal(mut self, deal_id: DealId) -> Self {
        self.active_deal = Patch::Set(deal_id);
        self
    }

    pub fn without_active_deal(mut self) -> Self {
        self.active_deal = Patch::Clear;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_keep()
            && self.active_order.is_keep()
            && self.active_calculation.is_keep()
            && self.active_deal.is_keep()
    }
}

/// Precondition on the stored state for a conditional session update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateGuard {
    Any,
    Is(Option<ConversationState>),
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{
        BotRole, ChatProfile, ChatSession, ConversationState, SessionKey, SessionPatch, StateGuard,
    };
    use crate::domain::order::{DealId, DealType, OrderId};

    fn session() -> ChatSession {
        ChatSession::new(
            SessionKey::new(10, BotRole::ClientDelivery),
            ChatProfile::default(),
            Utc::now(),
        )
    }

    #[test]
    fn state_names_round_trip() {
        for state in ConversationState::ALL {
            assert_eq!(state.as_str().parse::<ConversationState>().expect("parse"), state);
        }
    }

    #[test]
    fn roles_map_to_deal_types() {
        assert_eq!(BotRole::ClientDelivery.deal_type(), Some(DealType::Delivery));
        assert_eq!(BotRole::Driver.deal_type(), None);
        assert_eq!(BotRole::for_deal_type(DealType::Fulfilment), BotRole::ClientFulfilment);
        assert_eq!("driver".parse::<BotRole>().expect("parse"), BotRole::Driver);
    }

    #[test]
    fn patch_sets_and_clears_fields_together() {
        let mut session = session();
        let order_id = OrderId::generate();
        session.apply(
            &SessionPatch::to_state(ConversationState::AwaitingInn)
                .with_active_order(order_id.clone()),
            Utc::now(),
        );
        assert_eq!(session.state, Some(ConversationState::AwaitingInn));
        assert_eq!(session.active_order, Some(order_id));

        session.apply(&SessionPatch::reset(), Utc::now());
        assert_eq!(session.state, None);
        assert_eq!(session.active_order, None);
    }

    #[test]
    fn empty_patch_keeps_everything() {
        let mut session = session();
        session.active_deal = Some(DealId("9".to_owned()));
        let patch = SessionPatch::default();
        assert!(patch.is_empty());
        session.apply(&patch, Utc::now());
        assert_eq!(session.active_deal, Some(DealId("9".to_owned())));
    }

    #[test]
    fn guard_matches_exact_state_only() {
        let mut session = session();
        assert!(session.matches(&StateGuard::Is(None)));
        session.state = Some(ConversationState::ConfirmInn);
        assert!(session.matches(&StateGuard::Is(Some(ConversationState::ConfirmInn))));
        assert!(!session.matches(&StateGuard::Is(None)));
        assert!(session.matches(&StateGuard::Any));
    }

    #[test]
    fn only_driver_wait_states_block() {
        assert!(ConversationState::AwaitingGateNumber.is_blocking());
        assert!(ConversationState::AwaitingFinalQuantity.is_blocking());
        assert!(!ConversationState::AwaitingInn.is_blocking());
    }
}
