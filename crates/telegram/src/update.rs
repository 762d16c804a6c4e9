use serde::Deserialize;

use cargolink_core::domain::session::{BotRole, ChatProfile, SessionKey};
use cargolink_core::domain::{ChatId, MessageId};

use crate::callback::CallbackIntent;

/// The subset of a Bot API `Update` the bots act on. Unknown fields are ignored.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub message_id: MessageId,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub contact: Option<Contact>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct User {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl From<User> for ChatProfile {
    fn from(user: User) -> Self {
        Self { username: user.username, first_name: user.first_name, last_name: user.last_name }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub phone_number: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Text(String),
    Contact { phone: String },
    Callback { query_id: String, message_id: Option<MessageId>, intent: CallbackIntent },
}

/// A normalized inbound event for one bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEvent {
    pub update_id: i64,
    pub bot_role: BotRole,
    pub chat_id: ChatId,
    pub sender: ChatProfile,
    pub kind: EventKind,
}

impl ChatEvent {
    /// Normalizes a raw update. Updates with nothing actionable yield `None`.
    pub fn from_update(bot_role: BotRole, update: Update) -> Option<Self> {
        let update_id = update.update_id;

        if let Some(query) = update.callback_query {
            let chat_id = query.message.as_ref().map(|message| message.chat.id)?;
            let message_id = query.message.as_ref().map(|message| message.message_id);
            let data = query.data.unwrap_or_default();
            let intent = match CallbackIntent::parse(&data) {
                Ok(intent) => intent,
                Err(error) => {
                    tracing::warn!(
                        event_name = "telegram.callback.unparsed",
                        bot_role = %bot_role,
                        chat_id,
                        error = %error,
                        "dropping callback with unrecognized data"
                    );
                    return None;
                }
            };
            return Some(Self {
                update_id,
                bot_role,
                chat_id,
                sender: query.from.into(),
                kind: EventKind::Callback { query_id: query.id, message_id, intent },
            });
        }

        let message = update.message?;
        let kind = if let Some(contact) = message.contact {
            EventKind::Contact { phone: contact.phone_number }
        } else {
            EventKind::Text(message.text?.trim().to_owned())
        };

        Some(Self {
            update_id,
            bot_role,
            chat_id: message.chat.id,
            sender: message.from.map(ChatProfile::from).unwrap_or_default(),
            kind,
        })
    }

    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(self.chat_id, self.bot_role)
    }

    pub fn correlation_id(&self) -> String {
        format!("tg-{}-{}-{}", self.bot_role, self.chat_id, self.update_id)
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn is_command(&self, command: &str) -> bool {
        self.text().is_some_and(|text| {
            text.split_whitespace()
                .next()
                .map(|head| head.split('@').next().unwrap_or(head))
                .is_some_and(|head| head == command)
        })
    }
}
