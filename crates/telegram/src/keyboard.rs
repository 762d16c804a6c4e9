use serde::Serialize;

use crate::callback::CallbackIntent;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub request_contact: bool,
}

impl KeyboardButton {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), request_contact: false }
    }

    pub fn contact(text: impl Into<String>) -> Self {
        Self { text: text.into(), request_contact: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, intent: &CallbackIntent) -> Self {
        Self { text: text.into(), callback_data: intent.encode() }
    }

    /// Label-only button used to show status on a driver card.
    pub fn status(text: impl Into<String>) -> Self {
        Self::new(text, &CallbackIntent::Inert)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboard {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemoveKeyboard {
    pub remove_keyboard: bool,
}

/// Any `reply_markup` the bots attach; serializes to the Bot API shape directly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Reply(ReplyKeyboard),
    Inline(InlineKeyboard),
    Remove(RemoveKeyboard),
}

impl ReplyMarkup {
    pub fn reply<F>(build: F) -> Self
    where
        F: FnOnce(&mut ReplyKeyboardBuilder),
    {
        let mut builder = ReplyKeyboardBuilder::default();
        build(&mut builder);
        Self::Reply(ReplyKeyboard { keyboard: builder.rows, resize_keyboard: true })
    }

    /// Reply keyboard from plain labels, one inner slice per row.
    pub fn rows<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::reply(|keyboard| {
            for row in rows {
                keyboard.row(row);
            }
        })
    }

    pub fn inline<F>(build: F) -> Self
    where
        F: FnOnce(&mut InlineKeyboardBuilder),
    {
        let mut builder = InlineKeyboardBuilder::default();
        build(&mut builder);
        Self::Inline(InlineKeyboard { inline_keyboard: builder.rows })
    }

    /// A single inline button, the shape every driver card uses.
    pub fn single_inline(button: InlineButton) -> Self {
        Self::Inline(InlineKeyboard { inline_keyboard: vec![vec![button]] })
    }

    pub fn remove() -> Self {
        Self::Remove(RemoveKeyboard { remove_keyboard: true })
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }

    /// Every label on the keyboard, row by row.
    pub fn labels(&self) -> Vec<&str> {
        match self {
            Self::Reply(reply) => {
                reply.keyboard.iter().flatten().map(|button| button.text.as_str()).collect()
            }
            Self::Inline(inline) => {
                inline.inline_keyboard.iter().flatten().map(|button| button.text.as_str()).collect()
            }
            Self::Remove(_) => Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct ReplyKeyboardBuilder {
    rows: Vec<Vec<KeyboardButton>>,
}

impl ReplyKeyboardBuilder {
    pub fn row<I, S>(&mut self, labels: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let row: Vec<KeyboardButton> = labels.into_iter().map(KeyboardButton::new).collect();
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    pub fn buttons(&mut self, row: Vec<KeyboardButton>) -> &mut Self {
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    /// Lays labels out two per row; an odd tail gets its own row.
    pub fn pairs<I, S>(&mut self, labels: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        for pair in labels.chunks(2) {
            self.row(pair.iter().cloned());
        }
        self
    }

    /// One label per row.
    pub fn column<I, S>(&mut self, labels: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for label in labels {
            self.row([label]);
        }
        self
    }
}

#[derive(Default)]
pub struct InlineKeyboardBuilder {
    rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboardBuilder {
    pub fn row(&mut self, buttons: Vec<InlineButton>) -> &mut Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    pub fn button(&mut self, button: InlineButton) -> &mut Self {
        self.rows.push(vec![button]);
        self
    }
}

#[cfg(test)]
mod tests {
    use cargolink_core::domain::order::DealId;
    use serde_json::json;

    use super::{InlineButton, KeyboardButton, ReplyMarkup};
    use crate::callback::CallbackIntent;

    #[test]
    fn reply_keyboard_serializes_to_bot_api_shape() {
        let markup = ReplyMarkup::reply(|keyboard| {
            keyboard.buttons(vec![KeyboardButton::contact("📲 Отправить контакт")]);
            keyboard.row(["🔄 Начать заново"]);
        });

        let value = serde_json::to_value(&markup).expect("serialize");
        assert_eq!(
            value,
            json!({
                "keyboard": [
                    [{ "text": "📲 Отправить контакт", "request_contact": true }],
                    [{ "text": "🔄 Начать заново" }]
                ],
                "resize_keyboard": true
            })
        );
    }

    #[test]
    fn pairs_puts_odd_label_on_its_own_row() {
        let markup = ReplyMarkup::reply(|keyboard| {
            keyboard.pairs(["Коледино", "Тула", "Казань"]).row(["🔄 Начать заново"]);
        });
        let ReplyMarkup::Reply(reply) = &markup else {
            panic!("expected reply keyboard");
        };
        let widths: Vec<usize> = reply.keyboard.iter().map(Vec::len).collect();
        assert_eq!(widths, vec![2, 1, 1]);
        assert_eq!(markup.labels(), vec!["Коледино", "Тула", "Казань", "🔄 Начать заново"]);
    }

    #[test]
    fn inline_buttons_carry_encoded_intent() {
        let markup = ReplyMarkup::single_inline(InlineButton::new(
            "Забрал",
            &CallbackIntent::PickedUp(DealId("77".to_owned())),
        ));
        let value = serde_json::to_value(&markup).expect("serialize");
        assert_eq!(
            value,
            json!({ "inline_keyboard": [[{ "text": "Забрал", "callback_data": "got#77" }]] })
        );
        assert!(markup.is_inline());

        let status = InlineButton::status("Завершено");
        assert_eq!(status.callback_data, "null");
    }

    #[test]
    fn remove_keyboard_flag_is_set() {
        let value = serde_json::to_value(ReplyMarkup::remove()).expect("serialize");
        assert_eq!(value, json!({ "remove_keyboard": true }));
    }
}
