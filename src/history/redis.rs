use async_trait::async_trait;
use log::error;
use redis::{ AsyncCommands, Client };

use crate::cli::Args;
use crate::error::ChatError;
use crate::history::{ sort_summaries, HistoryStore };
use crate::models::chat::{ Conversation, ConversationSummary };

/// One conversation per key, stored as a JSON document under
/// `{prefix}{conversation_id}`. Listing enumerates keys with SCAN.
pub struct RedisHistoryStore {
    client: Client,
    key_prefix: String,
    scan_count: usize,
}

impl RedisHistoryStore {
    pub fn new(args: Args) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self {
            client: Client::open(args.history_host.as_str())?,
            key_prefix: args.history_redis_prefix,
            scan_count: args.history_redis_scan_count,
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn key(&self, conversation_id: &str) -> String {
        format!("{}{}", self.key_prefix, conversation_id)
    }

    async fn scan_keys(
        &self,
        conn: &mut redis::aio::MultiplexedConnection
    ) -> Result<Vec<String>, ChatError> {
        let pattern = format!("{}*", self.key_prefix);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis
                ::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(conn).await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn find_by_id(&self, conversation_id: &str) -> Result<Option<Conversation>, ChatError> {
        let mut conn = self.get_connection().await?;
        let raw: Option<String> = conn.get(self.key(conversation_id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), ChatError> {
        let mut conn = self.get_connection().await?;
        let json = serde_json::to_string(conversation)?;
        let _: () = conn.set(self.key(&conversation.id), json).await?;
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<bool, ChatError> {
        let mut conn = self.get_connection().await?;
        let removed: i64 = conn.del(self.key(conversation_id)).await?;
        Ok(removed > 0)
    }

    async fn list_summaries(&self) -> Result<Vec<ConversationSummary>, ChatError> {
        let mut conn = self.get_connection().await?;
        let keys = self.scan_keys(&mut conn).await?;

        let mut summaries = Vec::with_capacity(keys.len());
        for key in &keys {
            let raw: Option<String> = conn.get(key).await?;
            let Some(json) = raw else {
                // Key expired or deleted between SCAN and GET.
                continue;
            };
            match serde_json::from_str::<Conversation>(&json) {
                Ok(conversation) => summaries.push(conversation.summary()),
                Err(e) => {
                    error!("Error parsing conversation at {}: {}", key, e);
                }
            }
        }

        Ok(sort_summaries(summaries))
    }
}
