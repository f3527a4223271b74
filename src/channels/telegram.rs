use crate::channels::traits::{ChannelAdapter, ChannelInboundMessage, ChannelOutboundMessage};
use crate::config::TelegramConfig;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Telegram channel adapter using Bot API long polling.
pub struct TelegramAdapter {
    bot_token: String,
    api_base: String,
    poll_timeout_secs: u64,
    allowed_chat_ids: Vec<String>,
    client: reqwest::Client,
    /// Next `getUpdates` offset; survives adapter restarts.
    offset: AtomicI64,
}

impl TelegramAdapter {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            bot_token: config.bot_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            poll_timeout_secs: config.poll_timeout_secs,
            allowed_chat_ids: config.allowed_chat_ids.clone(),
            client: reqwest::Client::new(),
            offset: AtomicI64::new(0),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    fn is_chat_allowed(&self, chat_id: &str) -> bool {
        self.allowed_chat_ids.is_empty()
            || self
                .allowed_chat_ids
                .iter()
                .any(|c| c == "*" || c.as_str() == chat_id)
    }

    /// Extract inbound text messages from a `getUpdates` response.
    ///
    /// Returns the messages plus the highest `update_id` seen.
    fn parse_updates(
        &self,
        payload: &serde_json::Value,
    ) -> (Vec<ChannelInboundMessage>, Option<i64>) {
        let mut messages = Vec::new();
        let mut last_update_id = None;

        let updates = payload
            .get("result")
            .and_then(serde_json::Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for update in updates {
            if let Some(id) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                last_update_id = Some(last_update_id.map_or(id, |prev: i64| prev.max(id)));
            }

            let Some(message) = update.get("message") else {
                continue;
            };
            let chat_id = match message.get("chat").and_then(|c| c.get("id")) {
                Some(serde_json::Value::Number(n)) => n.to_string(),
                Some(serde_json::Value::String(s)) => s.clone(),
                _ => continue,
            };
            if !self.is_chat_allowed(&chat_id) {
                tracing::debug!(chat_id = %chat_id, "ignoring message from chat outside allowlist");
                continue;
            }

            let text = message
                .get("text")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .trim();
            if text.is_empty() {
                continue;
            }

            messages.push(ChannelInboundMessage {
                channel: self.id().to_owned(),
                chat_id,
                text: text.to_owned(),
            });
        }

        (messages, last_update_id)
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn id(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()> {
        let body = json!({
            "chat_id": message.chat_id,
            "text": message.text,
        });
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("telegram send failed ({status}): {body}");
        }
        Ok(())
    }

    async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("telegram bot token is empty");
        }

        // Leave headroom over the server-side long-poll timeout.
        let request_timeout = Duration::from_secs(self.poll_timeout_secs.saturating_add(10));

        loop {
            let offset = self.offset.load(Ordering::SeqCst);
            let body = json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message"],
            });
            let response = self
                .client
                .post(self.method_url("getUpdates"))
                .timeout(request_timeout)
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("telegram getUpdates failed ({status}): {body}");
            }

            let payload: serde_json::Value = response.json().await?;
            if payload.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
                anyhow::bail!("telegram getUpdates returned an error: {payload}");
            }

            let (messages, last_update_id) = self.parse_updates(&payload);
            if let Some(last) = last_update_id {
                self.offset.store(last.saturating_add(1), Ordering::SeqCst);
            }
            for inbound in messages {
                if inbound_tx.send(inbound).await.is_err() {
                    anyhow::bail!("telegram inbound channel closed");
                }
            }
        }
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        if self.bot_token.trim().is_empty() {
            return Ok(false);
        }
        let response = self.client.get(self.method_url("getMe")).send().await?;
        Ok(response.status().is_success())
    }
}
