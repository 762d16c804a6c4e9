pub mod calculation;
pub mod driver;
pub mod order;
pub mod payment;
pub mod session;
pub mod warehouse;

/// Telegram chat identifier.
pub type ChatId = i64;

/// Telegram message identifier, scoped to a chat.
pub type MessageId = i64;
