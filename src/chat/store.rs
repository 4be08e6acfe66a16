// src/chat/store.rs
//! Users, chat sessions and messages. The relational schema lives outside
//! this service; `InMemoryChatStore` backs the default deployment and tests.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    /// Speaker label used in LLM conversation context.
    pub fn label(self) -> &'static str {
        match self {
            Sender::User => "사용자",
            Sender::Bot => "챗봇",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: u64,
    pub anonymous_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: u64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    #[serde(skip)]
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_users: usize,
    pub total_chats: usize,
    pub total_messages: usize,
}

pub trait ChatStore: Send + Sync {
    fn find_user(&self, anonymous_id: &str) -> Result<Option<UserRecord>>;
    /// Returns the user and whether it was created by this call.
    fn get_or_create_user(&self, anonymous_id: &str) -> Result<(UserRecord, bool)>;
    fn find_chat(&self, chat_id: &str) -> Result<Option<ChatSession>>;
    /// Creates the chat with `title` unless it already exists.
    fn get_or_create_chat(&self, chat_id: &str, user_id: u64, title: &str) -> Result<ChatSession>;
    fn set_title(&self, chat_id: &str, title: &str) -> Result<()>;
    fn append_message(&self, chat_id: &str, sender: Sender, text: &str) -> Result<()>;
    /// `false` when no such chat existed.
    fn delete_chat(&self, chat_id: &str) -> Result<bool>;
    /// Newest first.
    fn chats_for_user(&self, user_id: u64) -> Result<Vec<ChatSession>>;
    fn stats(&self) -> Result<StoreStats>;
}

#[derive(Default)]
struct Inner {
    next_user_id: u64,
    next_seq: u64,
    users: HashMap<String, UserRecord>,
    chats: HashMap<String, ChatSession>,
}

#[derive(Default)]
pub struct InMemoryChatStore {
    inner: Mutex<Inner>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("chat store lock poisoned"))
    }
}

impl ChatStore for InMemoryChatStore {
    fn find_user(&self, anonymous_id: &str) -> Result<Option<UserRecord>> {
        Ok(self.lock()?.users.get(anonymous_id).cloned())
    }

    fn get_or_create_user(&self, anonymous_id: &str) -> Result<(UserRecord, bool)> {
        let mut inner = self.lock()?;
        if let Some(u) = inner.users.get(anonymous_id) {
            return Ok((u.clone(), false));
        }
        inner.next_user_id += 1;
        let user = UserRecord {
            id: inner.next_user_id,
            anonymous_id: anonymous_id.to_string(),
            created_at: Utc::now(),
        };
        inner.users.insert(anonymous_id.to_string(), user.clone());
        Ok((user, true))
    }

    fn find_chat(&self, chat_id: &str) -> Result<Option<ChatSession>> {
        Ok(self.lock()?.chats.get(chat_id).cloned())
    }

    fn get_or_create_chat(&self, chat_id: &str, user_id: u64, title: &str) -> Result<ChatSession> {
        let mut inner = self.lock()?;
        if let Some(c) = inner.chats.get(chat_id) {
            return Ok(c.clone());
        }
        inner.next_seq += 1;
        let chat = ChatSession {
            id: chat_id.to_string(),
            user_id,
            title: title.to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
            seq: inner.next_seq,
        };
        inner.chats.insert(chat_id.to_string(), chat.clone());
        Ok(chat)
    }

    fn set_title(&self, chat_id: &str, title: &str) -> Result<()> {
        let mut inner = self.lock()?;
        let chat = inner
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| anyhow!("unknown chat {chat_id}"))?;
        chat.title = title.to_string();
        Ok(())
    }

    fn append_message(&self, chat_id: &str, sender: Sender, text: &str) -> Result<()> {
        let mut inner = self.lock()?;
        let chat = inner
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| anyhow!("unknown chat {chat_id}"))?;
        chat.messages.push(ChatMessage {
            sender,
            text: text.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn delete_chat(&self, chat_id: &str) -> Result<bool> {
        Ok(self.lock()?.chats.remove(chat_id).is_some())
    }

    fn chats_for_user(&self, user_id: u64) -> Result<Vec<ChatSession>> {
        let inner = self.lock()?;
        let mut chats: Vec<ChatSession> = inner
            .chats
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.seq.cmp(&a.seq)));
        Ok(chats)
    }

    fn stats(&self) -> Result<StoreStats> {
        let inner = self.lock()?;
        Ok(StoreStats {
            total_users: inner.users.len(),
            total_chats: inner.chats.len(),
            total_messages: inner.chats.values().map(|c| c.messages.len()).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_are_created_once() {
        let store = InMemoryChatStore::new();
        let (a, created) = store.get_or_create_user("anon-1").unwrap();
        assert!(created);
        let (b, created) = store.get_or_create_user("anon-1").unwrap();
        assert!(!created);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn chats_are_listed_newest_first() {
        let store = InMemoryChatStore::new();
        let (u, _) = store.get_or_create_user("anon").unwrap();
        store.get_or_create_chat("c1", u.id, "first").unwrap();
        store.get_or_create_chat("c2", u.id, "second").unwrap();
        let ids: Vec<String> = store
            .chats_for_user(u.id)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["c2", "c1"]);
    }

    #[test]
    fn delete_reports_missing_chat() {
        let store = InMemoryChatStore::new();
        let (u, _) = store.get_or_create_user("anon").unwrap();
        store.get_or_create_chat("c1", u.id, "t").unwrap();
        store.append_message("c1", Sender::User, "hi").unwrap();
        assert_eq!(store.stats().unwrap().total_messages, 1);
        assert!(store.delete_chat("c1").unwrap());
        assert!(!store.delete_chat("c1").unwrap());
        assert!(store.append_message("c1", Sender::Bot, "x").is_err());
    }
}
