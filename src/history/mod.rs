mod memory;
mod redis;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;

use crate::cli::Args;
use crate::error::ChatError;
use crate::models::chat::{ Conversation, ConversationSummary };

pub use memory::MemoryHistoryStore;

/// Durable keyed storage for conversations. The store is deliberately dumb:
/// it upserts whole documents and never interprets the message sequence.
/// Ownership stays here — callers re-fetch after any mutation.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn find_by_id(&self, conversation_id: &str) -> Result<Option<Conversation>, ChatError>;

    async fn save(&self, conversation: &Conversation) -> Result<(), ChatError>;

    /// Returns false when no conversation had that id.
    async fn delete(&self, conversation_id: &str) -> Result<bool, ChatError>;

    async fn list_summaries(&self) -> Result<Vec<ConversationSummary>, ChatError>;
}

pub fn create_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "redis" => {
            let store = redis::RedisHistoryStore::new(args.clone())?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryHistoryStore::new())),
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub fn initialize_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    info!("Chat history will be stored in: {} at {}", args.history_type, args.history_host);
    create_history_store(args)
}

/// Sidebar ordering: most recently active conversation first.
pub(crate) fn sort_summaries(mut summaries: Vec<ConversationSummary>) -> Vec<ConversationSummary> {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    summaries
}
