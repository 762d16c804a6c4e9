//! Telegram Bot API transport for the three cargolink bots.
//!
//! - **Updates** (`update`) - webhook payloads decoded into [`update::ChatEvent`]
//! - **Callbacks** (`callback`) - inline-button data as a tagged [`callback::CallbackIntent`]
//! - **Keyboards** (`keyboard`) - reply and inline markup builders
//! - **Notifier** (`notifier`) - the outbound [`notifier::ChatNotifier`] seam, one per bot role
//! - **Bot API** (`bot_api`) - the `reqwest` implementation of that seam
//!
//! ```text
//! Bot API webhook → ChatEvent → ConversationDispatcher → handlers
//!                                                      ↓
//!                           ChatNotifier (sendMessage, editMessage*, deleteMessage)
//! ```

pub mod bot_api;
pub mod callback;
pub mod keyboard;
pub mod notifier;
pub mod update;

pub use bot_api::BotApiClient;
pub use callback::{CallbackIntent, CallbackParseError};
pub use keyboard::{InlineButton, KeyboardButton, ReplyMarkup};
pub use notifier::{ChatNotifier, Notifiers, NotifyError, OutgoingMessage, ParseMode};
pub use update::{ChatEvent, EventKind, Update};
