use rust_decimal::Decimal;
use thiserror::Error;

use cargolink_core::domain::order::DealId;
use cargolink_core::domain::payment::PaymentNoticeError;
use cargolink_core::errors::{ApplicationError, DomainError, ExternalServiceError};
use cargolink_db::RepositoryError;

/// Why a payment confirmation was refused before touching any state.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PaymentRejection {
    #[error(transparent)]
    Notice(#[from] PaymentNoticeError),
    #[error("Sum mismatch: paid {paid}, expected {expected}")]
    SumMismatch { paid: Decimal, expected: u64 },
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    External(#[from] ExternalServiceError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("payment rejected: {0}")]
    PaymentRejected(#[from] PaymentRejection),
    #[error("Order not found for deal {0}")]
    OrderNotFound(DealId),
    #[error("unsupported CRM hook stage `{0}`")]
    UnknownHookStage(String),
}

impl From<WorkflowError> for ApplicationError {
    fn from(error: WorkflowError) -> Self {
        match error {
            WorkflowError::Repository(error) => Self::Persistence(error.to_string()),
            WorkflowError::External(error) => Self::Integration(error),
            WorkflowError::Domain(error) => Self::Domain(error),
            WorkflowError::PaymentRejected(rejection) => Self::Rejected(rejection.to_string()),
            WorkflowError::OrderNotFound(deal) => {
                Self::NotFound(format!("Order not found for deal {deal}"))
            }
            WorkflowError::UnknownHookStage(stage) => {
                Self::Rejected(format!("unsupported stage `{stage}`"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use cargolink_core::domain::order::DealId;
    use cargolink_core::domain::payment::PaymentNoticeError;
    use cargolink_core::errors::{ApplicationError, ExternalServiceError};

    use super::{PaymentRejection, WorkflowError};

    #[test]
    fn payment_failures_map_to_application_errors() {
        let mismatch = WorkflowError::from(PaymentRejection::SumMismatch {
            paid: Decimal::new(1_000, 0),
            expected: 1_100,
        });
        assert!(matches!(
            ApplicationError::from(mismatch),
            ApplicationError::Rejected(message) if message.starts_with("Sum mismatch")
        ));

        let signature = WorkflowError::from(PaymentRejection::from(PaymentNoticeError::Signature));
        assert!(matches!(ApplicationError::from(signature), ApplicationError::Rejected(_)));

        let missing = WorkflowError::OrderNotFound(DealId("5".to_owned()));
        assert!(matches!(ApplicationError::from(missing), ApplicationError::NotFound(_)));
    }

    #[test]
    fn crm_failure_stays_an_integration_error() {
        let failure = ExternalServiceError::new("bitrix", "crm.deal.update", "503");
        let error = WorkflowError::from(failure);
        assert!(matches!(ApplicationError::from(error), ApplicationError::Integration(_)));
    }
}
