//! ConversationEngine implementation

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::fallback::{fallback_nudge, fallback_reply, fallback_support};
use crate::config::LlmConfig;
use crate::domain::{Phase, Turn};
use crate::llm::{CompletionRequest, LlmClient, Message};

/// Prior turns sent along with a request
pub const HISTORY_TURNS: usize = 10;

/// Generated text plus whether it came from a fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    pub fallback: bool,
}

impl Generated {
    fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fallback: true,
        }
    }
}

/// Wraps the optional LLM client with limits and fallbacks
#[derive(Clone)]
pub struct ConversationEngine {
    llm: Option<Arc<dyn LlmClient>>,
    max_tokens: u32,
    temperature: f32,
    deadline: Duration,
}

impl ConversationEngine {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, config: &LlmConfig) -> Self {
        debug!(has_llm = llm.is_some(), "ConversationEngine::new: called");
        Self {
            llm,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            // Client retries happen inside this window
            deadline: config.timeout() * 2,
        }
    }

    /// Engine that always answers with fallbacks
    pub fn offline() -> Self {
        Self::new(None, &LlmConfig::default())
    }

    pub fn is_online(&self) -> bool {
        self.llm.is_some()
    }

    /// One completion with `history` before `user`; `fallback` on any failure
    pub async fn generate(&self, system: &str, history: &[Turn], user: &str, fallback: &str) -> Generated {
        debug!(history = history.len(), user_len = user.len(), "generate: called");
        let Some(llm) = &self.llm else {
            debug!("generate: no LLM configured, using fallback");
            return Generated::fallback(fallback);
        };

        let skip = history.len().saturating_sub(HISTORY_TURNS);
        let mut messages: Vec<Message> = history[skip..].iter().map(Message::from).collect();
        messages.push(Message::user(user));

        let request = CompletionRequest {
            system_prompt: system.to_string(),
            messages,
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        };

        match tokio::time::timeout(self.deadline, llm.complete(request)).await {
            Ok(Ok(response)) => match response.content.map(|c| c.trim().to_string()) {
                Some(text) if !text.is_empty() => Generated { text, fallback: false },
                _ => {
                    warn!("generate: empty LLM response, using fallback");
                    Generated::fallback(fallback)
                }
            },
            Ok(Err(e)) => {
                warn!(error = %e, "generate: LLM call failed, using fallback");
                Generated::fallback(fallback)
            }
            Err(_) => {
                warn!(deadline = ?self.deadline, "generate: LLM call timed out, using fallback");
                Generated::fallback(fallback)
            }
        }
    }

    /// Proactive message for a phase
    pub async fn nudge(&self, phase: Phase, system: &str, kickoff: &str) -> Generated {
        debug!(%phase, "nudge: called");
        self.generate(system, &[], kickoff, fallback_nudge(phase)).await
    }

    /// Reply to ordinary chat in the current phase
    pub async fn reply(&self, system: &str, history: &[Turn], message: &str) -> Generated {
        self.generate(system, history, message, fallback_reply()).await
    }

    /// Reply to an urgent message
    pub async fn support(&self, system: &str, history: &[Turn], message: &str) -> Generated {
        self.generate(system, history, message, fallback_support()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{CompletionResponse, LlmError};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn engine(mock: Arc<MockLlmClient>) -> ConversationEngine {
        ConversationEngine::new(Some(mock), &LlmConfig::default())
    }

    #[tokio::test]
    async fn test_offline_engine_uses_fallback() {
        let engine = ConversationEngine::offline();
        let generated = engine.nudge(Phase::MiddayCheckin, "sys", "go").await;
        assert!(generated.fallback);
        assert_eq!(generated.text, fallback_nudge(Phase::MiddayCheckin));
    }

    #[tokio::test]
    async fn test_generated_text_is_trimmed() {
        let mock = Arc::new(MockLlmClient::replying(&["  Hello Alex!  \n"]));
        let generated = engine(mock.clone()).nudge(Phase::MorningCheckin, "sys", "go").await;
        assert_eq!(
            generated,
            Generated {
                text: "Hello Alex!".to_string(),
                fallback: false
            }
        );
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_llm_error_and_empty_response_fall_back() {
        let mock = Arc::new(MockLlmClient::new(vec![CompletionResponse {
            content: Some("   ".to_string()),
            ..CompletionResponse::text("")
        }]));
        let engine = engine(mock);
        assert!(engine.support("sys", &[], "help").await.fallback);
        // Mock is exhausted now and returns an error
        let generated = engine.support("sys", &[], "help").await;
        assert_eq!(generated.text, fallback_support());
    }

    #[tokio::test]
    async fn test_history_is_truncated_and_ordered() {
        let mock = Arc::new(MockLlmClient::replying(&["ok"]));
        let at = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let history: Vec<Turn> = (0..15).map(|i| Turn::user(format!("m{}", i), at)).collect();

        engine(mock.clone()).reply("sys", &history, "latest").await;

        let request = &mock.requests()[0];
        assert_eq!(request.messages.len(), HISTORY_TURNS + 1);
        assert_eq!(request.messages[0].content, "m5");
        assert_eq!(request.messages.last().unwrap().content, "latest");
        assert_eq!(request.system_prompt, "sys");
    }

    struct SlowClient;

    #[async_trait]
    impl LlmClient for SlowClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(CompletionResponse::text("too late"))
        }
    }

    #[tokio::test]
    async fn test_slow_llm_times_out_to_fallback() {
        let config = LlmConfig {
            timeout_ms: 10,
            ..Default::default()
        };
        let engine = ConversationEngine::new(Some(Arc::new(SlowClient)), &config);
        let generated = engine.reply("sys", &[], "hi").await;
        assert!(generated.fallback);
    }
}
