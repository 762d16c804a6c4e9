use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use cargolink_core::domain::order::DealType;
use cargolink_core::domain::session::BotRole;
use cargolink_core::domain::{ChatId, MessageId};

use crate::keyboard::ReplyMarkup;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParseMode {
    #[default]
    Markdown,
    Html,
    /// Sent without `parse_mode`.
    None,
}

impl ParseMode {
    pub fn as_api(self) -> Option<&'static str> {
        match self {
            Self::Markdown => Some("Markdown"),
            Self::Html => Some("HTML"),
            Self::None => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub markup: Option<ReplyMarkup>,
    pub parse_mode: ParseMode,
    pub disable_preview: bool,
}

impl OutgoingMessage {
    pub fn markdown(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self { text: text.into(), parse_mode: ParseMode::Html, ..Self::default() }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), parse_mode: ParseMode::None, ..Self::default() }
    }

    pub fn markup(mut self, markup: ReplyMarkup) -> Self {
        self.markup = Some(markup);
        self
    }

    pub fn without_preview(mut self) -> Self {
        self.disable_preview = true;
        self
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("telegram transport failure: {0}")]
    Transport(String),
    #[error("telegram rejected {method}: {description}")]
    Rejected { method: String, description: String },
    #[error("telegram response for {method} is malformed: {detail}")]
    Malformed { method: String, detail: String },
}

/// Outbound side of one bot. Failures are reported, never retried here.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn send(
        &self,
        chat_id: ChatId,
        message: &OutgoingMessage,
    ) -> Result<MessageId, NotifyError>;

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        message: &OutgoingMessage,
    ) -> Result<(), NotifyError>;

    async fn edit_markup(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        markup: &ReplyMarkup,
    ) -> Result<(), NotifyError>;

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), NotifyError>;

    async fn answer_callback(&self, query_id: &str) -> Result<(), NotifyError>;
}

/// One notifier per bot; messages must leave through the bot the chat talks to.
#[derive(Clone)]
pub struct Notifiers {
    pub delivery: Arc<dyn ChatNotifier>,
    pub fulfilment: Arc<dyn ChatNotifier>,
    pub driver: Arc<dyn ChatNotifier>,
}

impl Notifiers {
    pub fn for_role(&self, role: BotRole) -> &Arc<dyn ChatNotifier> {
        match role {
            BotRole::ClientDelivery => &self.delivery,
            BotRole::ClientFulfilment => &self.fulfilment,
            BotRole::Driver => &self.driver,
        }
    }

    /// The client-facing bot that created an order of this type.
    pub fn for_deal_type(&self, deal_type: DealType) -> &Arc<dyn ChatNotifier> {
        self.for_role(BotRole::for_deal_type(deal_type))
    }
}

pub mod recording {
    //! In-memory notifier that records every call, for tests and dry runs.

    use std::sync::atomic::{AtomicI64, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use cargolink_core::domain::{ChatId, MessageId};

    use super::{ChatNotifier, NotifyError, OutgoingMessage};
    use crate::keyboard::ReplyMarkup;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Recorded {
        Sent { chat_id: ChatId, message_id: MessageId, message: OutgoingMessage },
        EditedText { chat_id: ChatId, message_id: MessageId, message: OutgoingMessage },
        EditedMarkup { chat_id: ChatId, message_id: MessageId, markup: ReplyMarkup },
        Deleted { chat_id: ChatId, message_id: MessageId },
        Answered { query_id: String },
    }

    #[derive(Debug)]
    pub struct RecordingNotifier {
        next_id: AtomicI64,
        calls: Mutex<Vec<Recorded>>,
    }

    impl Default for RecordingNotifier {
        fn default() -> Self {
            Self { next_id: AtomicI64::new(100), calls: Mutex::new(Vec::new()) }
        }
    }

    impl RecordingNotifier {
        pub async fn calls(&self) -> Vec<Recorded> {
            self.calls.lock().await.clone()
        }

        /// Texts of sent messages, in order, for one chat.
        pub async fn sent_texts(&self, chat_id: ChatId) -> Vec<String> {
            self.calls
                .lock()
                .await
                .iter()
                .filter_map(|call| match call {
                    Recorded::Sent { chat_id: to, message, .. } if *to == chat_id => {
                        Some(message.text.clone())
                    }
                    _ => None,
                })
                .collect()
        }

        pub async fn last_sent(&self, chat_id: ChatId) -> Option<OutgoingMessage> {
            self.calls.lock().await.iter().rev().find_map(|call| match call {
                Recorded::Sent { chat_id: to, message, .. } if *to == chat_id => {
                    Some(message.clone())
                }
                _ => None,
            })
        }

        pub async fn clear(&self) {
            self.calls.lock().await.clear();
        }
    }

    #[async_trait]
    impl ChatNotifier for RecordingNotifier {
        async fn send(
            &self,
            chat_id: ChatId,
            message: &OutgoingMessage,
        ) -> Result<MessageId, NotifyError> {
            let message_id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.calls.lock().await.push(Recorded::Sent {
                chat_id,
                message_id,
                message: message.clone(),
            });
            Ok(message_id)
        }

        async fn edit_text(
            &self,
            chat_id: ChatId,
            message_id: MessageId,
            message: &OutgoingMessage,
        ) -> Result<(), NotifyError> {
            self.calls.lock().await.push(Recorded::EditedText {
                chat_id,
                message_id,
                message: message.clone(),
            });
            Ok(())
        }

        async fn edit_markup(
            &self,
            chat_id: ChatId,
            message_id: MessageId,
            markup: &ReplyMarkup,
        ) -> Result<(), NotifyError> {
            self.calls.lock().await.push(Recorded::EditedMarkup {
                chat_id,
                message_id,
                markup: markup.clone(),
            });
            Ok(())
        }

        async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), NotifyError> {
            self.calls.lock().await.push(Recorded::Deleted { chat_id, message_id });
            Ok(())
        }

        async fn answer_callback(&self, query_id: &str) -> Result<(), NotifyError> {
            self.calls.lock().await.push(Recorded::Answered { query_id: query_id.to_owned() });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cargolink_core::domain::order::DealType;
    use cargolink_core::domain::session::BotRole;

    use super::recording::{Recorded, RecordingNotifier};
    use super::{ChatNotifier, Notifiers, OutgoingMessage, ParseMode};

    #[tokio::test]
    async fn routes_by_role_and_deal_type() {
        let delivery = Arc::new(RecordingNotifier::default());
        let fulfilment = Arc::new(RecordingNotifier::default());
        let driver = Arc::new(RecordingNotifier::default());
        let notifiers = Notifiers {
            delivery: delivery.clone(),
            fulfilment: fulfilment.clone(),
            driver: driver.clone(),
        };

        notifiers
            .for_deal_type(DealType::Fulfilment)
            .send(7, &OutgoingMessage::markdown("счёт"))
            .await
            .expect("send");
        notifiers
            .for_role(BotRole::Driver)
            .send(8, &OutgoingMessage::html("<b>заявка</b>"))
            .await
            .expect("send");

        assert_eq!(fulfilment.sent_texts(7).await, vec!["счёт".to_owned()]);
        assert!(delivery.calls().await.is_empty());
        let last = driver.last_sent(8).await.expect("driver message");
        assert_eq!(last.parse_mode, ParseMode::Html);
    }

    #[tokio::test]
    async fn recording_notifier_assigns_increasing_ids() {
        let notifier = RecordingNotifier::default();
        let first = notifier.send(1, &OutgoingMessage::plain("a")).await.expect("send");
        let second = notifier.send(1, &OutgoingMessage::plain("b")).await.expect("send");
        assert!(second > first);

        notifier.delete(1, first).await.expect("delete");
        assert!(matches!(
            notifier.calls().await.last(),
            Some(Recorded::Deleted { chat_id: 1, message_id }) if *message_id == first
        ));
    }

    #[test]
    fn preview_flag_and_parse_modes() {
        let message = OutgoingMessage::markdown("⏰").without_preview();
        assert!(message.disable_preview);
        assert_eq!(ParseMode::Markdown.as_api(), Some("Markdown"));
        assert_eq!(ParseMode::None.as_api(), None);
    }
}
