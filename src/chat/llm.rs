// src/chat/llm.rs
//! Text-generation fallback used when no chat rule matches.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::AiConfig;

pub const ENV_LLM_TEST_MODE: &str = "LLM_TEST_MODE";

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub trait LlmClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
    fn provider_name(&self) -> &'static str;
}

pub type DynLlmClient = Arc<dyn LlmClient>;

/// * `LLM_TEST_MODE=mock` → deterministic mock.
/// * disabled config or missing key → `DisabledClient`.
/// * otherwise the OpenAI chat completions client.
pub fn build_llm_client(config: &AiConfig) -> DynLlmClient {
    if std::env::var(ENV_LLM_TEST_MODE)
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockClient::default());
    }
    if !config.enabled {
        return Arc::new(DisabledClient);
    }
    match config.provider.as_str() {
        "openai" if !config.api_key.trim().is_empty() => {
            match OpenAiClient::new(&config.api_key, &config.model) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    tracing::warn!(target: "chat", error = ?e, "could not build OpenAI client; LLM fallback disabled");
                    Arc::new(DisabledClient)
                }
            }
        }
        other => {
            tracing::warn!(target: "chat", provider = other, "LLM provider unusable; fallback disabled");
            Arc::new(DisabledClient)
        }
    }
}

/// Persona prompt for the fallback, with the chat so far as context.
pub fn system_prompt(conversation: &str) -> String {
    let context = if conversation.trim().is_empty() {
        "아직 대화 기록이 없습니다."
    } else {
        conversation
    };
    format!(
        r#"# 페르소나
너는 부산시 청년을 돕는 청년 공간 안내 챗봇 'B-BOT'이다. 청년 공간과 청년 프로그램에 대한 질문에 명확하고 정확하며 도움이 되는 답을 준다.

# 지침
1. 정보 우선순위
   - 1순위: 부산 청년 공간 관련 정보 (부산청년센터, 청년두드림카페, 소담스퀘어 등)
   - 2순위: 아래 [이전 대화 맥락]
   - 3순위: 일반 지식 (위 정보로 답할 수 없는 일반적인 대화에만 사용)
2. 주어진 정보에 없는 내용은 추측하지 말고, 모르면 솔직히 말한 뒤 대안을 제시한다.
3. 친절하고 따뜻한 말투로 청년을 응원한다.

# 출력 형식
- 마크다운으로 구조화한다.
- 핵심 정보는 **굵게** 표시한다.
- 항목은 글머리 기호로 나열한다.
- 링크는 전체 URL을 보여준다.

# 참고 자료
---
[이전 대화 맥락]
{context}
---
"#
    )
}

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("busan-youth-bot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building OpenAI http client")?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

impl LlmClient for OpenAiClient {
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                #[serde(default)]
                content: Option<String>,
            }

            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: system,
                    },
                    Msg {
                        role: "user",
                        content: user,
                    },
                ],
            };

            let resp = self
                .http
                .post(OPENAI_CHAT_URL)
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .context("calling chat completions")?;
            let status = resp.status();
            if !status.is_success() {
                bail!("chat completions returned HTTP {status}");
            }
            let body: Resp = resp.json().await.context("decoding chat completions")?;
            body.choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| anyhow!("chat completions returned no content"))
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Always fails; the chat layer turns that into the apology reply.
pub struct DisabledClient;

impl LlmClient for DisabledClient {
    fn complete<'a>(
        &'a self,
        _system: &'a str,
        _user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async { Err(anyhow!("LLM fallback is disabled")) })
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Echoes the user message; counts calls.
#[derive(Default)]
pub struct MockClient {
    calls: AtomicUsize,
}

impl MockClient {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for MockClient {
    fn complete<'a>(
        &'a self,
        _system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = format!("[mock] {user}");
        Box::pin(async move { Ok(reply) })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_context_or_placeholder() {
        assert!(system_prompt("").contains("아직 대화 기록이 없습니다."));
        let p = system_prompt("사용자: 안녕\n챗봇: 반가워요");
        assert!(p.contains("B-BOT"));
        assert!(p.contains("사용자: 안녕"));
    }

    #[test]
    fn disabled_config_builds_disabled_client() {
        let client = build_llm_client(&AiConfig::default());
        // LLM_TEST_MODE may be set by the environment running the tests
        assert!(matches!(client.provider_name(), "disabled" | "mock"));
    }

    #[tokio::test]
    async fn mock_echoes() {
        let m = MockClient::default();
        assert_eq!(m.complete("s", "hi").await.unwrap(), "[mock] hi");
        assert_eq!(m.calls(), 1);
    }
}
