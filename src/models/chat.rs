use chrono::Utc;
use serde::{ Serialize, Deserialize };
use uuid::Uuid;

use crate::error::ChatError;

/// Titles are cut from the first user message at this many characters.
pub const TITLE_MAX_CHARS: usize = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Listing projection: everything the sidebar needs, without the messages.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

pub fn derive_title(message: &str) -> String {
    let mut title: String = message.chars().take(TITLE_MAX_CHARS).collect();
    if message.chars().count() > TITLE_MAX_CHARS {
        title.push('…');
    }
    title
}

impl Conversation {
    /// A conversation is born with its first full turn already in place.
    pub fn new(first_message: &str, reply: &str) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            title: derive_title(first_message),
            messages: vec![
                ChatMessage::new(Role::User, first_message),
                ChatMessage::new(Role::Assistant, reply)
            ],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn get(&self, index: usize) -> Result<&ChatMessage, ChatError> {
        self.messages.get(index).ok_or(ChatError::Index {
            index,
            len: self.messages.len(),
        })
    }

    pub fn append(&mut self, role: Role, content: &str) -> Result<(), ChatError> {
        if content.is_empty() {
            return Err(ChatError::validation("Message content is required"));
        }
        self.messages.push(ChatMessage::new(role, content));
        self.touch();
        Ok(())
    }

    /// Drops every message from `index` onward and appends `new_tail` in its
    /// place. Used by the edit flow to rewrite a turn and discard stale
    /// replies below it.
    pub fn replace_from(
        &mut self,
        index: usize,
        new_tail: Vec<ChatMessage>
    ) -> Result<(), ChatError> {
        if index >= self.messages.len() {
            return Err(ChatError::Index {
                index,
                len: self.messages.len(),
            });
        }
        self.messages.truncate(index);
        self.messages.extend(new_tail);
        self.touch();
        Ok(())
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now().timestamp_millis();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_passes_short_messages_through() {
        assert_eq!(derive_title("hello"), "hello");
    }

    #[test]
    fn title_keeps_exactly_thirty_chars_unmarked() {
        let message = "a".repeat(30);
        assert_eq!(derive_title(&message), message);
    }

    #[test]
    fn title_truncates_long_messages_with_ellipsis() {
        let message = "a".repeat(45);
        let title = derive_title(&message);
        assert_eq!(title.chars().count(), 31);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn title_truncates_on_char_boundaries() {
        let message = "é".repeat(40);
        let title = derive_title(&message);
        assert_eq!(title.chars().count(), 31);
    }

    #[test]
    fn new_conversation_holds_one_full_turn() {
        let conversation = Conversation::new("hi", "hello");
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].role, Role::User);
        assert_eq!(conversation.messages[1].role, Role::Assistant);
        assert_eq!(conversation.title, "hi");
        assert_eq!(conversation.created_at, conversation.updated_at);
    }

    #[test]
    fn append_rejects_empty_content() {
        let mut conversation = Conversation::new("hi", "hello");
        let err = conversation.append(Role::User, "").unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
        assert_eq!(conversation.messages.len(), 2);
    }

    #[test]
    fn replace_from_rewrites_the_tail() {
        let mut conversation = Conversation::new("a", "b");
        conversation.append(Role::User, "c").unwrap();
        conversation.append(Role::Assistant, "d").unwrap();

        conversation
            .replace_from(2, vec![ChatMessage::new(Role::User, "c2")])
            .unwrap();

        assert_eq!(conversation.messages.len(), 3);
        assert_eq!(conversation.messages[0].content, "a");
        assert_eq!(conversation.messages[1].content, "b");
        assert_eq!(conversation.messages[2].content, "c2");
    }

    #[test]
    fn replace_from_rejects_out_of_range_index() {
        let mut conversation = Conversation::new("a", "b");
        let err = conversation.replace_from(2, vec![]).unwrap_err();
        assert!(matches!(err, ChatError::Index { index: 2, len: 2 }));
    }

    #[test]
    fn get_rejects_out_of_range_index() {
        let conversation = Conversation::new("a", "b");
        assert!(conversation.get(1).is_ok());
        assert!(matches!(conversation.get(2), Err(ChatError::Index { .. })));
    }
}
