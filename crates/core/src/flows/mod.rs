pub mod engine;
pub mod states;

pub use engine::{LifecycleTransitionError, OrderLifecycle};
pub use states::{CrmStage, LifecycleAction, LifecycleEvent, TransitionOutcome};
