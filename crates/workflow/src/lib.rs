//! Conversation and order workflow for the cargolink bots.
//!
//! - **Dispatcher** (`dispatcher`) - one chat event in, one handler run, keyed by session state
//! - **Routes** (`routes`) - static `(bot role, command | state | button) → route` tables
//! - **Handlers** (`handlers`) - order intake, the price calculator and driver input
//! - **Lifecycle** (`lifecycle`) - everything after submission: CRM hooks, driver taps, payment
//! - **Reminders** (`reminders`) - the daily payment-link resend
//!
//! # Architecture
//!
//! ```text
//! ChatEvent ──► ConversationDispatcher ──► intake / calc / driver handlers
//!                                                  │
//! CRM hook ─────► LifecycleCoordinator ◄───────────┘
//! Payment notice ─┘        │
//!                          ├─► OrderRepository / SessionRepository
//!                          └─► CrmGateway, PaymentGateway, ChatNotifier
//! ```

pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod messages;
pub mod reminders;
pub mod routes;
pub mod services;

pub use dispatcher::{ConversationDispatcher, DispatchOutcome, EventContext};
pub use error::{PaymentRejection, WorkflowError};
pub use lifecycle::{CrmHook, CrmHookAction, HookAck, LifecycleCoordinator, PaymentAck};
pub use reminders::{next_run_after, PaymentReminderJob, ReminderReport};
pub use routes::{DriverAction, Route, RouteTable};
pub use services::{Services, WorkflowSettings};
