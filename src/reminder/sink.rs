use crate::reminder::model::Owner;
use async_trait::async_trait;

/// Delivers a notification to a reminder's owner.
///
/// The engine only cares whether delivery succeeded; how the text reaches
/// the owner is up to the implementation.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, owner: &Owner, text: &str) -> crate::Result<()>;
}
