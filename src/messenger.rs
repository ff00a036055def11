// Outbound chat delivery (LINE Messaging API).

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

const LINE_API_BASE: &str = "https://api.line.me/v2/bot/message";

/// One message in a reply or push, serialized in the LINE wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Text {
        text: String,
    },
    Flex {
        #[serde(rename = "altText")]
        alt_text: String,
        contents: Value,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        OutboundMessage::Text { text: text.into() }
    }
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Sends replies to inbound events and unsolicited pushes to groups.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn reply(&self, reply_token: &str, messages: &[OutboundMessage]) -> Result<(), DeliveryError>;

    async fn push(&self, to: &str, messages: &[OutboundMessage]) -> Result<(), DeliveryError>;
}

/// Messaging API client authenticated with a channel access token.
pub struct LineMessenger {
    client: reqwest::Client,
    access_token: String,
}

impl LineMessenger {
    pub fn new(access_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
        }
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(format!("{LINE_API_BASE}/{endpoint}"))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MessageSender for LineMessenger {
    async fn reply(&self, reply_token: &str, messages: &[OutboundMessage]) -> Result<(), DeliveryError> {
        self.post("reply", json!({ "replyToken": reply_token, "messages": messages }))
            .await
    }

    async fn push(&self, to: &str, messages: &[OutboundMessage]) -> Result<(), DeliveryError> {
        self.post("push", json!({ "to": to, "messages": messages })).await
    }
}

/// Logs outgoing messages instead of sending them. Used when no access token
/// is configured.
pub struct LogMessenger;

#[async_trait]
impl MessageSender for LogMessenger {
    async fn reply(&self, reply_token: &str, messages: &[OutboundMessage]) -> Result<(), DeliveryError> {
        tracing::info!(reply_token, count = messages.len(), "reply (not sent): {messages:?}");
        Ok(())
    }

    async fn push(&self, to: &str, messages: &[OutboundMessage]) -> Result<(), DeliveryError> {
        tracing::info!(to, count = messages.len(), "push (not sent): {messages:?}");
        Ok(())
    }
}
