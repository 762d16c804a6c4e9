pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod ports;
pub mod pricing;
pub mod schedule;

pub use domain::calculation::{Calculation, CalculationId};
pub use domain::order::{
    CargoType, DealId, DealType, Order, OrderId, OrderStatus, OrgIdentity, PaymentMethod,
};
pub use domain::session::{
    BotRole, ChatProfile, ChatSession, ConversationState, SessionKey, SessionPatch, StateGuard,
};
pub use domain::warehouse::Warehouse;
pub use domain::{ChatId, MessageId};
pub use errors::{ApplicationError, DomainError, ExternalServiceError, InterfaceError};
pub use flows::{CrmStage, LifecycleEvent, OrderLifecycle};
