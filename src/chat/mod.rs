// src/chat/mod.rs
pub mod llm;
pub mod rules;
pub mod store;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use rand::seq::IndexedRandom;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::chat::llm::{system_prompt, DynLlmClient};
use crate::chat::rules::Command;
use crate::chat::store::{ChatMessage, ChatStore, Sender, StoreStats, UserRecord};
use crate::dataset::types::{Program, Record, Space};
use crate::dataset::Dataset;

/// Reply when the LLM fallback fails for any reason.
pub const LLM_APOLOGY: &str =
    "죄송합니다, 답변 생성 중 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";

/// Title of a chat opened with a button press, until a typed message names it.
pub const UNTITLED_CHAT: &str = "새 채팅";

/// How many programs the keyword digest shows.
const DIGEST_LIMIT: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("chat not found: {0}")]
    ChatNotFound(String),
    #[error("chat storage failed: {0:#}")]
    Storage(#[from] anyhow::Error),
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("chat_messages_total", "Chat messages accepted.");
        describe_counter!(
            "chat_llm_fallbacks_total",
            "Messages no rule matched, answered by the LLM fallback."
        );
    });
}

/// Short, stable, non-reversible tag for logging user ids.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// One chat in a user's history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
}

pub struct ChatService {
    spaces: Arc<Dataset<Space>>,
    programs: Arc<Dataset<Program>>,
    store: Arc<dyn ChatStore>,
    llm: DynLlmClient,
}

impl ChatService {
    pub fn new(
        spaces: Arc<Dataset<Space>>,
        programs: Arc<Dataset<Program>>,
        store: Arc<dyn ChatStore>,
        llm: DynLlmClient,
    ) -> Self {
        ensure_metrics_described();
        Self {
            spaces,
            programs,
            store,
            llm,
        }
    }

    pub fn llm_provider(&self) -> &'static str {
        self.llm.provider_name()
    }

    /// Validate, record the user message, answer it and record the answer.
    pub async fn process(
        &self,
        message: &str,
        anonymous_id: &str,
        chat_id: &str,
    ) -> Result<String, ChatError> {
        require("message", message)?;
        require("anonymousId", anonymous_id)?;
        require("chatId", chat_id)?;
        counter!("chat_messages_total").increment(1);

        let (user, created) = self.store.get_or_create_user(anonymous_id)?;
        if created {
            tracing::info!(target: "chat", user = %anon_hash(anonymous_id), "new user");
        }
        let button = rules::is_button(&rules::classify(message));
        let first_title = if button { UNTITLED_CHAT } else { message };
        let chat = self.store.get_or_create_chat(chat_id, user.id, first_title)?;
        let untitled = chat.messages.is_empty() || chat.title == UNTITLED_CHAT;
        if !button && untitled && chat.title != message {
            self.store.set_title(chat_id, message)?;
        }
        let context = conversation_context(&chat.messages);

        self.store.append_message(chat_id, Sender::User, message)?;
        let reply = self.respond(message, &context).await;
        self.store.append_message(chat_id, Sender::Bot, &reply)?;
        Ok(reply)
    }

    /// Route one message through the rule table. Never fails: every branch
    /// degrades to a user-facing message.
    pub async fn respond(&self, text: &str, context: &str) -> String {
        let mut start = 0;
        loop {
            let (idx, cmd) = rules::classify_from(text, start);
            tracing::debug!(target: "chat", rule = idx, command = ?cmd, "rule matched");
            match cmd {
                Command::SpaceOverview => return self.spaces.overview_reply().await,
                Command::RandomSpace => return self.random_space().await,
                Command::ConditionSearch(conditions) => {
                    return self.spaces.condition_reply(&conditions).await
                }
                Command::RegionPrograms(region) => return self.programs.region_reply(&region).await,
                Command::RegionSpaces(region) => return self.spaces.region_reply(&region).await,
                Command::SpaceTag(tag) => return self.spaces.tag_reply(tag).await,
                Command::ProgramDigest => match self.programs.digest_reply(DIGEST_LIMIT).await {
                    Some(reply) => return reply,
                    // no programs right now; let the later rules try
                    None => start = idx + 1,
                },
                Command::SpaceSearch(query) => return self.spaces.keyword_reply(&query).await,
                Command::Fallback => return self.fallback(text, context).await,
            }
        }
    }

    async fn random_space(&self) -> String {
        let Some(all) = self.spaces.list_all().await.found() else {
            return "추천할 청년공간 정보를 불러올 수 없습니다.".to_string();
        };
        match all.choose(&mut rand::rng()) {
            Some(space) => format!(
                "🎲 **랜덤으로 추천해드릴게요!**\n\n{}\n💡 다른 공간이 궁금하시면 다시 랜덤 추천을 눌러보세요!",
                space.render()
            ),
            None => "추천할 청년공간 정보를 불러올 수 없습니다.".to_string(),
        }
    }

    async fn fallback(&self, text: &str, context: &str) -> String {
        counter!("chat_llm_fallbacks_total").increment(1);
        let system = system_prompt(context);
        match self.llm.complete(&system, text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(target: "chat", provider = self.llm.provider_name(), error = ?e, "LLM fallback failed");
                LLM_APOLOGY.to_string()
            }
        }
    }

    // ----- users and chats -----

    pub fn delete_chat(&self, chat_id: &str) -> Result<(), ChatError> {
        if self.store.delete_chat(chat_id)? {
            tracing::info!(target: "chat", chat_id, "chat deleted");
            Ok(())
        } else {
            Err(ChatError::ChatNotFound(chat_id.to_string()))
        }
    }

    /// Chats of a user keyed by chat id; unknown users have no history.
    pub fn history(&self, anonymous_id: &str) -> Result<BTreeMap<String, HistoryEntry>, ChatError> {
        let Some(user) = self.store.find_user(anonymous_id)? else {
            return Ok(BTreeMap::new());
        };
        Ok(self
            .store
            .chats_for_user(user.id)?
            .into_iter()
            .map(|c| {
                (
                    c.id.clone(),
                    HistoryEntry {
                        id: c.id,
                        title: c.title,
                        messages: c.messages,
                    },
                )
            })
            .collect())
    }

    pub fn user_info(&self, anonymous_id: &str) -> Result<Option<UserRecord>, ChatError> {
        Ok(self.store.find_user(anonymous_id)?)
    }

    /// Returns the user and whether it was newly created.
    pub fn create_user(&self, anonymous_id: &str) -> Result<(UserRecord, bool), ChatError> {
        require("anonymous_id", anonymous_id)?;
        Ok(self.store.get_or_create_user(anonymous_id)?)
    }

    pub fn stats(&self) -> Result<StoreStats, ChatError> {
        Ok(self.store.stats()?)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ChatError> {
    if value.trim().is_empty() {
        Err(ChatError::MissingField(field))
    } else {
        Ok(())
    }
}

/// "사용자: ..." / "챗봇: ..." lines, oldest first.
fn conversation_context(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.sender.label(), m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("user-123");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("user-123"));
        assert_ne!(a, anon_hash("user-124"));
    }

    #[test]
    fn context_labels_speakers() {
        let now = chrono::Utc::now();
        let msgs = vec![
            ChatMessage {
                sender: Sender::User,
                text: "안녕".into(),
                created_at: now,
            },
            ChatMessage {
                sender: Sender::Bot,
                text: "반가워요".into(),
                created_at: now,
            },
        ];
        assert_eq!(conversation_context(&msgs), "사용자: 안녕\n챗봇: 반가워요");
    }
}
