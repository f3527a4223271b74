//! Chat transport and the liveness endpoint.
//!
//! Channel-specific adapters are pluggable through [`ChannelAdapter`]. The
//! runtime owns the adapter restart loop, command dispatch, and replies;
//! reminder notifications reach chats through [`ChannelSink`].

pub mod health;
pub mod telegram;
pub mod traits;

use crate::channels::health::run_health_server;
use crate::channels::traits::{ChannelAdapter, ChannelInboundMessage, ChannelOutboundMessage};
use crate::commands::CommandHandler;
use crate::config::NudgeConfig;
use crate::reminder::{DeliverySink, Owner};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Inbound queue depth between adapters and the command dispatcher.
const INBOUND_QUEUE_SIZE: usize = 64;

/// Upper bound on the adapter restart backoff.
const MAX_BACKOFF_SECS: u64 = 60;

/// Delivers reminder notifications as chat messages.
pub struct ChannelSink {
    adapter: Arc<dyn ChannelAdapter>,
}

impl ChannelSink {
    pub fn new(adapter: Arc<dyn ChannelAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl DeliverySink for ChannelSink {
    async fn deliver(&self, owner: &Owner, text: &str) -> crate::Result<()> {
        self.adapter
            .send(ChannelOutboundMessage {
                chat_id: owner.as_str().to_owned(),
                text: text.to_owned(),
            })
            .await
            .map_err(|e| crate::NudgeError::Delivery(format!("{}: {e}", self.adapter.id())))
    }
}

/// Configuration validation issue for channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelValidationSeverity {
    Warning,
    Error,
}

/// Validation issue surfaced at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelValidationIssue {
    pub id: String,
    pub severity: ChannelValidationSeverity,
    pub summary: String,
}

/// Validate channel configuration without network calls.
#[must_use]
pub fn validate_config(config: &NudgeConfig) -> Vec<ChannelValidationIssue> {
    let mut issues = Vec::new();
    let telegram = &config.telegram;

    if telegram.bot_token.trim().is_empty() {
        issues.push(ChannelValidationIssue {
            id: "telegram-missing-token".to_owned(),
            severity: ChannelValidationSeverity::Error,
            summary: "Telegram bot token is empty; set telegram.bot_token or NUDGE_TELEGRAM_TOKEN."
                .to_owned(),
        });
    }
    if telegram.allowed_chat_ids.is_empty() {
        issues.push(ChannelValidationIssue {
            id: "telegram-open-allowlist".to_owned(),
            severity: ChannelValidationSeverity::Warning,
            summary: "No chat allowlist configured; any Telegram chat can create reminders."
                .to_owned(),
        });
    }
    if telegram.poll_timeout_secs == 0 {
        issues.push(ChannelValidationIssue {
            id: "telegram-short-polling".to_owned(),
            severity: ChannelValidationSeverity::Warning,
            summary: "poll_timeout_secs is 0; the bot will short-poll Telegram continuously."
                .to_owned(),
        });
    }

    issues
}

/// Run the chat runtime until the adapter's inbound stream ends for good.
///
/// The adapter is restarted with exponential backoff when it fails. Every
/// inbound command is answered on the chat it came from.
pub async fn run_runtime(
    config: NudgeConfig,
    adapter: Arc<dyn ChannelAdapter>,
    handler: CommandHandler,
) -> anyhow::Result<()> {
    let validation = validate_config(&config);
    let has_error = validation
        .iter()
        .any(|issue| issue.severity == ChannelValidationSeverity::Error);
    for issue in validation {
        match issue.severity {
            ChannelValidationSeverity::Warning => tracing::warn!("{}: {}", issue.id, issue.summary),
            ChannelValidationSeverity::Error => tracing::error!("{}: {}", issue.id, issue.summary),
        }
    }
    if has_error {
        anyhow::bail!("channel configuration has blocking errors");
    }

    let (inbound_tx, mut inbound_rx) =
        tokio::sync::mpsc::channel::<ChannelInboundMessage>(INBOUND_QUEUE_SIZE);
    let mut workers = JoinSet::new();

    {
        let adapter = Arc::clone(&adapter);
        workers.spawn(async move {
            let mut backoff_secs = 2u64;
            loop {
                match adapter.run(inbound_tx.clone()).await {
                    Ok(()) => tracing::warn!("channel {} stopped; restarting", adapter.id()),
                    Err(err) => tracing::warn!(
                        "channel {} failed: {err}; retrying in {backoff_secs}s",
                        adapter.id()
                    ),
                }
                if inbound_tx.is_closed() {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                backoff_secs = backoff_secs.saturating_mul(2).min(MAX_BACKOFF_SECS);
            }
        });
    }

    if config.health.enabled {
        let health_cfg = config.health.clone();
        workers.spawn(async move {
            if let Err(err) = run_health_server(health_cfg).await {
                tracing::error!("health endpoint stopped: {err}");
            }
        });
    }

    tracing::info!("channel runtime started on {}", adapter.id());

    while let Some(message) = inbound_rx.recv().await {
        let owner = Owner::new(message.chat_id.clone());
        let Some(reply) = handler.handle(&owner, &message.text) else {
            continue;
        };
        tracing::debug!(
            channel = %message.channel,
            chat_id = %message.chat_id,
            "replying to command"
        );

        let send_result = adapter
            .send(ChannelOutboundMessage {
                chat_id: message.chat_id,
                text: reply,
            })
            .await;
        if let Err(err) = send_result {
            tracing::warn!("failed to send {} reply: {err}", adapter.id());
        }
    }

    workers.abort_all();
    while workers.join_next().await.is_some() {}
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::AnchoredClock;
    use crate::config::{HealthConfig, TelegramConfig};
    use crate::reminder::ReminderEngine;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Adapter that replays scripted inbound text once, then ends.
    struct ScriptedAdapter {
        script: Mutex<Vec<String>>,
        sent: Mutex<Vec<ChannelOutboundMessage>>,
        fail_sends: bool,
    }

    impl ScriptedAdapter {
        fn new(script: &[&str]) -> Self {
            Self {
                script: Mutex::new(script.iter().map(|s| (*s).to_owned()).collect()),
                sent: Mutex::new(Vec::new()),
                fail_sends: false,
            }
        }

        fn sent(&self) -> Vec<ChannelOutboundMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChannelAdapter for ScriptedAdapter {
        fn id(&self) -> &'static str {
            "scripted"
        }

        async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()> {
            if self.fail_sends {
                anyhow::bail!("send disabled");
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()> {
            let script = std::mem::take(&mut *self.script.lock().unwrap());
            for text in script {
                inbound_tx
                    .send(ChannelInboundMessage {
                        channel: "scripted".to_owned(),
                        chat_id: "500".to_owned(),
                        text,
                    })
                    .await?;
            }
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn health_check(&self) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    fn config() -> NudgeConfig {
        NudgeConfig {
            telegram: TelegramConfig {
                bot_token: "token".to_owned(),
                allowed_chat_ids: vec!["500".to_owned()],
                ..Default::default()
            },
            health: HealthConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn validation_flags_missing_token() {
        let issues = validate_config(&NudgeConfig::default());
        assert!(issues.iter().any(|i| {
            i.id == "telegram-missing-token" && i.severity == ChannelValidationSeverity::Error
        }));
        assert!(issues.iter().any(|i| i.id == "telegram-open-allowlist"));
    }

    #[test]
    fn validation_passes_complete_config() {
        assert!(validate_config(&config()).is_empty());
    }

    #[tokio::test]
    async fn runtime_refuses_blocking_errors() {
        let adapter: Arc<dyn ChannelAdapter> = Arc::new(ScriptedAdapter::new(&[]));
        let engine = ReminderEngine::new(Arc::new(ChannelSink::new(Arc::clone(&adapter))));
        let result =
            run_runtime(NudgeConfig::default(), adapter, CommandHandler::new(engine)).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn runtime_answers_commands_and_delivers_reminders() {
        let adapter = Arc::new(ScriptedAdapter::new(&[
            "/remind 01-01-2031 12:01 stand up",
            "good morning",
            "/list",
        ]));
        let anchor = NaiveDate::from_ymd_opt(2031, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let engine = ReminderEngine::new(Arc::new(ChannelSink::new(adapter.clone())))
            .with_clock(Arc::new(AnchoredClock::new(anchor)));

        let runtime = tokio::spawn(run_runtime(
            config(),
            adapter.clone(),
            CommandHandler::new(engine.clone()),
        ));

        tokio::time::sleep(Duration::from_secs(120)).await;

        let sent = adapter.sent();
        let texts: Vec<&str> = sent.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts.len(), 3, "{texts:?}");
        assert_eq!(texts[0], "Reminder set for 01-01-2031 12:01!");
        assert!(texts[1].contains("1. 01-01-2031 12:01: stand up"));
        assert_eq!(texts[2], "Reminder: stand up");
        assert!(sent.iter().all(|m| m.chat_id == "500"));
        assert_eq!(engine.list(&Owner::new("500")).expired.len(), 1);

        runtime.abort();
    }

    #[tokio::test]
    async fn channel_sink_maps_send_failures_to_delivery_errors() {
        let adapter = ScriptedAdapter {
            fail_sends: true,
            ..ScriptedAdapter::new(&[])
        };
        let sink = ChannelSink::new(Arc::new(adapter));
        let err = sink.deliver(&Owner::new("1"), "hi").await.unwrap_err();
        assert!(matches!(err, crate::NudgeError::Delivery(_)));
    }
}
