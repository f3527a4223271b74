use async_trait::async_trait;
use tokio::sync::mpsc;

/// Inbound message received from a chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInboundMessage {
    pub channel: String,
    /// Chat the message came from; reminders are owned per chat.
    pub chat_id: String,
    pub text: String,
}

/// Outbound message sent to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutboundMessage {
    pub chat_id: String,
    pub text: String,
}

/// Chat channel adapter contract. New transports only need to implement this trait.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Stable channel identifier (e.g. `telegram`).
    fn id(&self) -> &'static str;

    /// Send a message to a chat.
    async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()>;

    /// Receive inbound messages and forward them until the transport fails.
    async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()>;

    /// Best-effort health probe.
    async fn health_check(&self) -> anyhow::Result<bool>;
}
