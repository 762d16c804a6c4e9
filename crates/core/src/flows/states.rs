use serde::{Deserialize, Serialize};

use crate::domain::order::OrderStatus;

/// Things that happen to a submitted order outside the intake conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Submitted,
    DriverAssigned,
    DriverReleased,
    QuantityConfirmed,
    PackingStarted,
    TransitStarted,
    GateRecorded,
    PaymentRequested,
    PaymentConfirmed,
}

/// CRM pipeline stages the lifecycle pushes deals into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrmStage {
    New,
    PrepaymentInvoice,
    Executing,
    FinalInvoice,
    Handover,
    Won,
}

impl CrmStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::PrepaymentInvoice => "C2:PREPAYMENT_INVOICE",
            Self::Executing => "C2:EXECUTING",
            Self::FinalInvoice => "C2:FINAL_INVOICE",
            Self::Handover => "C2:UC_1E3Z8W",
            Self::Won => "C2:WON",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleAction {
    NotifyDriver,
    NotifyClient,
    AdvanceCrmStage(CrmStage),
    RequestPayment,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub event: LifecycleEvent,
    pub actions: Vec<LifecycleAction>,
}

impl TransitionOutcome {
    pub fn crm_stage(&self) -> Option<CrmStage> {
        self.actions.iter().find_map(|action| match action {
            LifecycleAction::AdvanceCrmStage(stage) => Some(*stage),
            _ => None,
        })
    }
}
