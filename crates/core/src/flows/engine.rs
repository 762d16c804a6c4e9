use thiserror::Error;

use crate::domain::order::OrderStatus;
use crate::flows::states::{CrmStage, LifecycleAction, LifecycleEvent, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: OrderStatus, event: LifecycleEvent },
}

/// Transition table for an order after it leaves the intake conversation.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderLifecycle;

impl OrderLifecycle {
    pub fn initial_state(&self) -> OrderStatus {
        OrderStatus::InProgress
    }

    pub fn apply(
        &self,
        current: OrderStatus,
        event: LifecycleEvent,
    ) -> Result<TransitionOutcome, LifecycleTransitionError> {
        transition_order(current, event)
    }

    pub fn can_apply(&self, current: OrderStatus, event: LifecycleEvent) -> bool {
        transition_order(current, event).is_ok()
    }
}

fn transition_order(
    current: OrderStatus,
    event: LifecycleEvent,
) -> Result<TransitionOutcome, LifecycleTransitionError> {
    use LifecycleAction::{AdvanceCrmStage, NotifyClient, NotifyDriver, RequestPayment};
    use LifecycleEvent::{
        DriverAssigned, DriverReleased, GateRecorded, PackingStarted, PaymentConfirmed,
        PaymentRequested, QuantityConfirmed, Submitted, TransitStarted,
    };
    use OrderStatus as S;

    let (to, actions) = match (current, event) {
        (S::InProgress, Submitted) => (S::Submitted, vec![AdvanceCrmStage(CrmStage::New)]),
        (S::Submitted | S::DriverAssigned, DriverAssigned) => {
            (S::DriverAssigned, vec![NotifyDriver, NotifyClient])
        }
        (S::DriverAssigned | S::DriverConfirmed | S::Packing | S::InTransit, DriverReleased) => {
            (S::Submitted, vec![NotifyDriver])
        }
        (S::DriverAssigned, QuantityConfirmed) => (
            S::DriverConfirmed,
            vec![AdvanceCrmStage(CrmStage::PrepaymentInvoice), NotifyClient, NotifyDriver],
        ),
        (S::DriverConfirmed, PackingStarted) => {
            (S::Packing, vec![AdvanceCrmStage(CrmStage::Executing), NotifyClient])
        }
        (S::Packing, TransitStarted) => {
            (S::InTransit, vec![AdvanceCrmStage(CrmStage::FinalInvoice), NotifyClient])
        }
        (S::InTransit, GateRecorded) => (
            S::Delivered,
            vec![AdvanceCrmStage(CrmStage::Handover), NotifyClient, NotifyDriver],
        ),
        (S::Delivered, PaymentRequested) => (S::AwaitingPayment, vec![RequestPayment]),
        (S::InProgress | S::Paid, PaymentConfirmed) => {
            return Err(LifecycleTransitionError::InvalidTransition { state: current, event });
        }
        (_, PaymentConfirmed) => (S::Paid, vec![AdvanceCrmStage(CrmStage::Won), NotifyClient]),
        _ => {
            return Err(LifecycleTransitionError::InvalidTransition { state: current, event });
        }
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}

#[cfg(test)]
mod tests {
    use crate::domain::order::OrderStatus;
    use crate::flows::engine::{LifecycleTransitionError, OrderLifecycle};
    use crate::flows::states::{CrmStage, LifecycleAction, LifecycleEvent};

    #[test]
    fn happy_path_reaches_paid() {
        let lifecycle = OrderLifecycle;
        let events = [
            LifecycleEvent::Submitted,
            LifecycleEvent::DriverAssigned,
            LifecycleEvent::QuantityConfirmed,
            LifecycleEvent::PackingStarted,
            LifecycleEvent::TransitStarted,
            LifecycleEvent::GateRecorded,
            LifecycleEvent::PaymentRequested,
            LifecycleEvent::PaymentConfirmed,
        ];

        let mut state = lifecycle.initial_state();
        let mut stages = Vec::new();
        for event in events {
            let outcome = lifecycle.apply(state, event).expect("happy path transition");
            stages.extend(outcome.crm_stage());
            state = outcome.to;
        }

        assert_eq!(state, OrderStatus::Paid);
        assert_eq!(
            stages,
            vec![
                CrmStage::New,
                CrmStage::PrepaymentInvoice,
                CrmStage::Executing,
                CrmStage::FinalInvoice,
                CrmStage::Handover,
                CrmStage::Won,
            ]
        );
    }

    #[test]
    fn paid_order_never_leaves_paid() {
        let lifecycle = OrderLifecycle;
        for event in [
            LifecycleEvent::Submitted,
            LifecycleEvent::DriverAssigned,
            LifecycleEvent::DriverReleased,
            LifecycleEvent::PaymentConfirmed,
        ] {
            let error = lifecycle.apply(OrderStatus::Paid, event).expect_err("paid is terminal");
            assert_eq!(
                error,
                LifecycleTransitionError::InvalidTransition { state: OrderStatus::Paid, event }
            );
        }
    }

    #[test]
    fn payment_can_arrive_before_delivery_completes() {
        let outcome = OrderLifecycle
            .apply(OrderStatus::InTransit, LifecycleEvent::PaymentConfirmed)
            .expect("early payment accepted");
        assert_eq!(outcome.to, OrderStatus::Paid);
        assert!(outcome.actions.contains(&LifecycleAction::AdvanceCrmStage(CrmStage::Won)));
    }

    #[test]
    fn drafts_cannot_be_paid() {
        assert!(
            !OrderLifecycle.can_apply(OrderStatus::InProgress, LifecycleEvent::PaymentConfirmed)
        );
    }

    #[test]
    fn driver_release_returns_order_to_pool() {
        let outcome = OrderLifecycle
            .apply(OrderStatus::Packing, LifecycleEvent::DriverReleased)
            .expect("release");
        assert_eq!(outcome.to, OrderStatus::Submitted);
        assert_eq!(outcome.crm_stage(), None);
    }

    #[test]
    fn skipping_steps_is_rejected() {
        assert!(OrderLifecycle
            .apply(OrderStatus::DriverAssigned, LifecycleEvent::TransitStarted)
            .is_err());
        assert!(OrderLifecycle
            .apply(OrderStatus::Submitted, LifecycleEvent::GateRecorded)
            .is_err());
    }
}
