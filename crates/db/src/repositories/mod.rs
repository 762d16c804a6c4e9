use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use cargolink_core::domain::calculation::{Calculation, CalculationId};
use cargolink_core::domain::order::{DealId, DealType, Order, OrderId};
use cargolink_core::domain::session::{
    BotRole, ChatProfile, ChatSession, SessionKey, SessionPatch, StateGuard,
};
use cargolink_core::domain::ChatId;

pub mod calculation;
pub mod memory;
pub mod order;
pub mod session;

pub use calculation::SqlCalculationRepository;
pub use memory::{InMemoryCalculationRepository, InMemoryOrderRepository, InMemorySessionRepository};
pub use order::SqlOrderRepository;
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Per-chat conversation state, keyed by `(chat_id, bot_role)`.
///
/// Every mutation is one atomic statement; callers never read-then-write the state.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find(&self, key: &SessionKey) -> Result<Option<ChatSession>, RepositoryError>;

    /// Creates the session on first contact, or refreshes the stored profile.
    /// Profile fields that are `None` keep their stored values.
    async fn register(
        &self,
        key: &SessionKey,
        profile: &ChatProfile,
        now: DateTime<Utc>,
    ) -> Result<ChatSession, RepositoryError>;

    /// Applies `patch` if the stored state satisfies `guard`; returns whether a row changed.
    async fn update(
        &self,
        key: &SessionKey,
        guard: StateGuard,
        patch: &SessionPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Case-insensitive lookup of a registered chat by Telegram username.
    async fn find_by_username(
        &self,
        role: BotRole,
        username: &str,
    ) -> Result<Option<ChatSession>, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts or replaces the order. A stored `paid` order is never downgraded.
    async fn save(&self, order: &Order) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn find_by_deal_id(&self, deal_id: &DealId) -> Result<Option<Order>, RepositoryError>;

    /// Every order the chat has drafted, newest first.
    async fn list_for_chat(&self, chat_id: ChatId) -> Result<Vec<Order>, RepositoryError>;

    /// Most recent order of the chat whose legal identity is complete and named `org_name`.
    async fn latest_complete_org(
        &self,
        chat_id: ChatId,
        org_name: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Most recent order awaiting payment that has no invoice link yet.
    async fn latest_unbilled(
        &self,
        chat_id: ChatId,
        deal_type: DealType,
    ) -> Result<Option<Order>, RepositoryError>;

    async fn list_awaiting_payment_with_invoice(&self) -> Result<Vec<Order>, RepositoryError>;

    /// Conditionally flips a submitted order to `paid`; `false` when it was already paid
    /// or no submitted order carries the deal id.
    async fn mark_paid(
        &self,
        deal_id: &DealId,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Drafts still `in_progress` that were created before `created_before`.
    async fn list_stale_drafts(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError>;
}

#[async_trait]
pub trait CalculationRepository: Send + Sync {
    async fn find_by_id(&self, id: &CalculationId)
        -> Result<Option<Calculation>, RepositoryError>;
    async fn save(&self, calculation: &Calculation) -> Result<(), RepositoryError>;
}

/// Fixed-width UTC timestamp so stored values compare lexicographically.
pub(crate) fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("timestamp `{value}`: {error}")))
}
