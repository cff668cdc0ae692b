use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

use log::{ info, warn };

use crate::cli::Args;
use crate::error::ChatError;
use crate::history::{ initialize_history_store, HistoryStore };
use crate::llm::{ LlmConfig, LlmType };
use crate::llm::chat::{ new_client as new_chat_client, ChatClient };
use crate::models::chat::{ ChatMessage, Conversation, ConversationSummary, Role };

/// Orchestrates the conversation history: every mutation flows through here,
/// pairing user input with completions and enforcing the edit rules.
pub struct ChatAgent {
    chat_client: Arc<dyn ChatClient>,
    history_store: Arc<dyn HistoryStore>,
    // Mutations on one conversation are serialized; the completion call is a
    // long suspension point and interleaving would corrupt the
    // truncate-then-append sequence. Different ids proceed in parallel.
    conversation_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChatAgent {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_llm_type = LlmType::from_str(&args.chat_llm_type)?;
        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: chat_llm_type,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={:?}, BaseURL={:?}",
            args.chat_llm_type,
            chat_config.completion_model.as_deref().unwrap_or("adapter default"),
            chat_config.base_url.as_deref().unwrap_or("adapter default")
        );

        let history_store = initialize_history_store(args)?;

        Ok(Self::with_parts(chat_client, history_store))
    }

    pub fn with_parts(
        chat_client: Arc<dyn ChatClient>,
        history_store: Arc<dyn HistoryStore>
    ) -> Self {
        Self {
            chat_client,
            history_store,
            conversation_locks: Mutex::new(HashMap::new()),
        }
    }

    // Only known ids get an entry, so the map stays bounded by live
    // conversations; delete removes the entry again. Callers re-read the
    // conversation under the lock, which catches a delete landing between
    // this check and the acquisition.
    async fn conversation_lock(&self, conversation_id: &str) -> Result<Arc<Mutex<()>>, ChatError> {
        if self.history_store.find_by_id(conversation_id).await?.is_none() {
            return Err(ChatError::NotFound(conversation_id.to_string()));
        }
        let mut locks = self.conversation_locks.lock().await;
        Ok(
            locks
                .entry(conversation_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        )
    }

    async fn fetch(&self, conversation_id: &str) -> Result<Conversation, ChatError> {
        self.history_store
            .find_by_id(conversation_id).await?
            .ok_or_else(|| ChatError::NotFound(conversation_id.to_string()))
    }

    /// Starts a conversation from its first user message. The completion is
    /// fetched before anything is persisted, so a provider failure leaves no
    /// trace: either both messages exist or neither does.
    pub async fn create_conversation(&self, message: &str) -> Result<Conversation, ChatError> {
        if message.is_empty() {
            return Err(ChatError::validation("Message is required"));
        }

        let reply = self.chat_client.complete(message).await?;
        let conversation = Conversation::new(message, &reply.response);
        self.history_store.save(&conversation).await?;
        info!("Created conversation {} ({})", conversation.id, conversation.title);
        Ok(conversation)
    }

    /// Appends a user message and its completion. The user message is
    /// persisted before the provider is called: if the completion fails the
    /// turn stays half-finished rather than losing the user's input, and the
    /// error surfaces to the caller.
    pub async fn append_turn(
        &self,
        conversation_id: &str,
        message: &str
    ) -> Result<Conversation, ChatError> {
        let lock = self.conversation_lock(conversation_id).await?;
        let _guard = lock.lock().await;

        let mut conversation = self.fetch(conversation_id).await?;
        if message.is_empty() {
            return Err(ChatError::validation("Message is required"));
        }

        conversation.append(Role::User, message)?;
        self.history_store.save(&conversation).await?;

        let reply = match self.chat_client.complete(message).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Completion failed for {}; user message kept: {}", conversation_id, e);
                return Err(e);
            }
        };

        conversation.append(Role::Assistant, &reply.response)?;
        self.history_store.save(&conversation).await?;
        Ok(conversation)
    }

    /// Rewrites a past user message. Everything after the edited message is
    /// discarded and, when a stale reply was thrown away, the completion is
    /// regenerated from the new content. A regeneration failure does not
    /// roll back the truncation: the conversation may legitimately end on a
    /// user message with no reply, and a later append or edit recovers it.
    pub async fn edit_user_message(
        &self,
        conversation_id: &str,
        index: usize,
        content: &str
    ) -> Result<Conversation, ChatError> {
        let lock = self.conversation_lock(conversation_id).await?;
        let _guard = lock.lock().await;

        let mut conversation = self.fetch(conversation_id).await?;
        let message = conversation.get(index)?;
        if message.role != Role::User {
            return Err(ChatError::Forbidden);
        }
        if content.is_empty() {
            return Err(ChatError::validation("Message content is required"));
        }

        let last_index = conversation.messages.len() - 1;
        if index == last_index && message.content == content {
            // Nothing would change; skip the write so updatedAt stays put.
            return Ok(conversation);
        }

        let had_tail = index < last_index;
        conversation.replace_from(index, vec![ChatMessage::new(Role::User, content)])?;
        self.history_store.save(&conversation).await?;

        if had_tail {
            let reply = match self.chat_client.complete(content).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(
                        "Regeneration failed for {}; edit kept without a reply: {}",
                        conversation_id,
                        e
                    );
                    return Err(e);
                }
            };
            conversation.append(Role::Assistant, &reply.response)?;
            self.history_store.save(&conversation).await?;
        }

        Ok(conversation)
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, ChatError> {
        self.fetch(conversation_id).await
    }

    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ChatError> {
        self.history_store.list_summaries().await
    }

    /// Deletes a conversation. Takes the same per-conversation lock as the
    /// mutating operations: a delete racing an in-flight turn would
    /// otherwise land mid-completion and be undone by the turn's final save.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ChatError> {
        let lock = self.conversation_lock(conversation_id).await?;
        let _guard = lock.lock().await;

        let removed = self.history_store.delete(conversation_id).await?;
        if !removed {
            return Err(ChatError::NotFound(conversation_id.to_string()));
        }
        let mut locks = self.conversation_locks.lock().await;
        locks.remove(conversation_id);
        Ok(())
    }
}
