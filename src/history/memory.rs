use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::ChatError;
use crate::history::{ sort_summaries, HistoryStore };
use crate::models::chat::{ Conversation, ConversationSummary };

/// Keeps everything in a process-local map. Used for local runs without a
/// Redis instance, and as the engine-test fake.
#[derive(Default)]
pub struct MemoryHistoryStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn find_by_id(&self, conversation_id: &str) -> Result<Option<Conversation>, ChatError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(conversation_id).cloned())
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), ChatError> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<bool, ChatError> {
        let mut conversations = self.conversations.write().await;
        Ok(conversations.remove(conversation_id).is_some())
    }

    async fn list_summaries(&self) -> Result<Vec<ConversationSummary>, ChatError> {
        let conversations = self.conversations.read().await;
        let summaries = conversations
            .values()
            .map(|c| c.summary())
            .collect();
        Ok(sort_summaries(summaries))
    }
}
