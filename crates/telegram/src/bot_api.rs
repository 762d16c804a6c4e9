use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use cargolink_core::domain::session::BotRole;
use cargolink_core::domain::{ChatId, MessageId};

use crate::keyboard::ReplyMarkup;
use crate::notifier::{ChatNotifier, NotifyError, OutgoingMessage};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
}

/// `reqwest` client for one bot token.
#[derive(Clone)]
pub struct BotApiClient {
    role: BotRole,
    client: Client,
    api_base_url: String,
    token: SecretString,
}

impl BotApiClient {
    pub fn new(role: BotRole, api_base_url: impl Into<String>, token: SecretString) -> Self {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build().unwrap_or_default();
        Self::with_client(role, client, api_base_url, token)
    }

    pub fn with_client(
        role: BotRole,
        client: Client,
        api_base_url: impl Into<String>,
        token: SecretString,
    ) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_owned();
        Self { role, client, api_base_url, token }
    }

    pub fn role(&self) -> BotRole {
        self.role
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.token.expose_secret())
    }

    async fn call(&self, method: &str, body: Value) -> Result<Option<Value>, NotifyError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|error| NotifyError::Transport(error.without_url().to_string()))?;

        let status = response.status();
        let payload: ApiResponse = response.json().await.map_err(|error| NotifyError::Malformed {
            method: method.to_owned(),
            detail: error.without_url().to_string(),
        })?;

        if payload.ok {
            return Ok(payload.result);
        }

        let description = payload.description.unwrap_or_else(|| status.to_string());
        if description.contains("message is not modified") {
            tracing::debug!(
                event_name = "telegram.api.not_modified",
                bot_role = %self.role,
                method,
                "edit was a no-op"
            );
            return Ok(None);
        }

        tracing::warn!(
            event_name = "telegram.api.rejected",
            bot_role = %self.role,
            method,
            status = %status,
            description = %description,
            "bot api call rejected"
        );
        Err(NotifyError::Rejected { method: method.to_owned(), description })
    }
}

fn message_body(
    chat_id: ChatId,
    message: &OutgoingMessage,
) -> Result<Map<String, Value>, NotifyError> {
    let mut body = Map::new();
    body.insert("chat_id".to_owned(), json!(chat_id));
    body.insert("text".to_owned(), json!(message.text));
    if let Some(mode) = message.parse_mode.as_api() {
        body.insert("parse_mode".to_owned(), json!(mode));
    }
    if message.disable_preview {
        body.insert("disable_web_page_preview".to_owned(), json!(true));
    }
    if let Some(markup) = &message.markup {
        body.insert("reply_markup".to_owned(), markup_value(markup)?);
    }
    Ok(body)
}

fn markup_value(markup: &ReplyMarkup) -> Result<Value, NotifyError> {
    serde_json::to_value(markup).map_err(|error| NotifyError::Malformed {
        method: "reply_markup".to_owned(),
        detail: error.to_string(),
    })
}

#[async_trait]
impl ChatNotifier for BotApiClient {
    async fn send(
        &self,
        chat_id: ChatId,
        message: &OutgoingMessage,
    ) -> Result<MessageId, NotifyError> {
        let body = message_body(chat_id, message)?;
        let result = self.call("sendMessage", Value::Object(body)).await?;
        result
            .as_ref()
            .and_then(|value| value.get("message_id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| NotifyError::Malformed {
                method: "sendMessage".to_owned(),
                detail: "result.message_id missing".to_owned(),
            })
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        message: &OutgoingMessage,
    ) -> Result<(), NotifyError> {
        let mut body = message_body(chat_id, message)?;
        body.insert("message_id".to_owned(), json!(message_id));
        self.call("editMessageText", Value::Object(body)).await.map(|_| ())
    }

    async fn edit_markup(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        markup: &ReplyMarkup,
    ) -> Result<(), NotifyError> {
        let body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "reply_markup": markup_value(markup)?,
        });
        self.call("editMessageReplyMarkup", body).await.map(|_| ())
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), NotifyError> {
        let body = json!({ "chat_id": chat_id, "message_id": message_id });
        self.call("deleteMessage", body).await.map(|_| ())
    }

    async fn answer_callback(&self, query_id: &str) -> Result<(), NotifyError> {
        self.call("answerCallbackQuery", json!({ "callback_query_id": query_id })).await.map(|_| ())
    }
}
