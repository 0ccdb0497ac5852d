//! TelegramTransport - Bot API delivery and long polling

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::transport::{ChatTransport, DeliveryError};
use crate::config::TelegramConfig;
use crate::store::{Document, JsonStore};

/// Telegram's per-message text limit
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Pause after a failed poll
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Chat adopted through `/start`, saved in the user directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramChat {
    pub chat_id: i64,
}

impl Document for TelegramChat {
    const FILE: &'static str = "telegram.json";
}

/// Talks to one user through a Telegram bot.
///
/// With no configured chat id the first chat that sends `/start` is adopted,
/// and remembered across restarts when a store is attached.
pub struct TelegramTransport {
    http: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: RwLock<Option<i64>>,
    poll_timeout_secs: u64,
    store: Option<JsonStore>,
}

impl TelegramTransport {
    pub fn from_config(config: &TelegramConfig) -> Result<Self, DeliveryError> {
        debug!(chat_id = ?config.chat_id, "TelegramTransport::from_config: called");
        let token = config
            .token()
            .map_err(|e| DeliveryError::NotConfigured(e.to_string()))?;
        Ok(Self::new(token, config))
    }

    pub fn new(token: impl Into<String>, config: &TelegramConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: RwLock::new(config.chat_id),
            poll_timeout_secs: config.poll_timeout_secs,
            store: None,
        }
    }

    /// Remember adopted chats in `store`, picking up one saved earlier when
    /// no chat id is configured
    pub fn with_store(mut self, store: JsonStore) -> Self {
        if self.chat_id().is_none() {
            match store.load::<TelegramChat>() {
                Ok(Some(saved)) => {
                    info!(chat_id = saved.chat_id, "Restored Telegram chat");
                    self.chat_id = RwLock::new(Some(saved.chat_id));
                }
                Ok(None) => debug!("with_store: no saved chat"),
                Err(e) => warn!(error = %e, "Saved Telegram chat unreadable, waiting for /start"),
            }
        }
        self.store = Some(store);
        self
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.chat_id.read().ok().and_then(|id| *id)
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<T, DeliveryError> {
        let response = self
            .http
            .post(self.url(method))
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let parsed: ApiResponse<T> = response.json().await?;

        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(DeliveryError::Rejected {
                status,
                message: parsed.description.unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    /// Fetch updates after `offset`, waiting up to the poll timeout
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, DeliveryError> {
        let body = json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });
        let timeout = Duration::from_secs(self.poll_timeout_secs + 10);
        self.call("getUpdates", body, timeout).await
    }

    /// Text of an update if it comes from the user's chat.
    ///
    /// Adopts the sender's chat when none is known and the text is `/start`.
    pub fn accept(&self, update: &Update) -> Option<String> {
        let message = update.message.as_ref()?;
        let text = message.text.as_ref()?.trim().to_string();
        if text.is_empty() {
            return None;
        }

        match self.chat_id() {
            Some(id) if id == message.chat.id => Some(text),
            Some(id) => {
                warn!(expected = id, got = message.chat.id, "Ignoring message from unknown chat");
                None
            }
            None if text.starts_with("/start") => {
                if let Ok(mut slot) = self.chat_id.write() {
                    *slot = Some(message.chat.id);
                }
                info!(chat_id = message.chat.id, "Registered Telegram chat");
                if let Some(store) = &self.store
                    && let Err(e) = store.save(&TelegramChat {
                        chat_id: message.chat.id,
                    })
                {
                    warn!(error = %e, "Failed to save Telegram chat");
                }
                Some(text)
            }
            None => {
                debug!(chat_id = message.chat.id, "accept: no chat registered, waiting for /start");
                None
            }
        }
    }

    /// Long-poll for messages and forward accepted text to `tx`
    pub async fn poll(&self, tx: mpsc::Sender<String>, mut shutdown: watch::Receiver<bool>) {
        info!("Telegram polling started");
        let mut offset = 0;
        loop {
            let updates = tokio::select! {
                updates = self.get_updates(offset) => updates,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "Telegram poll failed");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in &updates {
                if update.update_id >= offset {
                    offset = update.update_id + 1;
                }
                if let Some(text) = self.accept(update)
                    && tx.send(text).await.is_err()
                {
                    debug!("poll: receiver dropped");
                    return;
                }
            }
        }
        info!("Telegram polling stopped");
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let chat_id = self.chat_id().ok_or(DeliveryError::NoRecipient)?;
        debug!(chat_id, len = text.len(), "TelegramTransport::send: called");
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            let body = json!({ "chat_id": chat_id, "text": chunk });
            let _: serde_json::Value = self.call("sendMessage", body, Duration::from_secs(30)).await?;
        }
        Ok(())
    }
}

/// Split on line breaks so each piece fits in `limit` characters
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if current.chars().count() + line.chars().count() > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if line.chars().count() > limit {
            // A single overlong line is cut at character boundaries
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(chat_id: Option<i64>) -> TelegramTransport {
        let config = TelegramConfig {
            chat_id,
            ..Default::default()
        };
        TelegramTransport::new("token", &config)
    }

    fn update(chat: i64, text: &str) -> Update {
        Update {
            update_id: 1,
            message: Some(IncomingMessage {
                chat: Chat { id: chat },
                text: Some(text.to_string()),
            }),
        }
    }

    #[test]
    fn test_accepts_configured_chat_only() {
        let t = transport(Some(42));
        assert_eq!(t.accept(&update(42, "hello")), Some("hello".to_string()));
        assert_eq!(t.accept(&update(7, "hello")), None);
    }

    #[test]
    fn test_start_registers_chat() {
        let t = transport(None);
        assert_eq!(t.accept(&update(9, "hi")), None);
        assert_eq!(t.accept(&update(9, "/start")), Some("/start".to_string()));
        assert_eq!(t.chat_id(), Some(9));
        assert_eq!(t.accept(&update(10, "/start")), None);
    }

    #[test]
    fn test_adopted_chat_survives_restart() {
        let temp = tempfile::tempdir().unwrap();
        let store = JsonStore::open(temp.path(), "u1").unwrap();

        let first = transport(None).with_store(store.clone());
        assert_eq!(first.chat_id(), None);
        first.accept(&update(9, "/start"));
        assert_eq!(store.load::<TelegramChat>().unwrap(), Some(TelegramChat { chat_id: 9 }));

        let second = transport(None).with_store(store);
        assert_eq!(second.chat_id(), Some(9));
        assert_eq!(second.accept(&update(9, "hello")), Some("hello".to_string()));
        assert_eq!(second.accept(&update(10, "/start")), None);
    }

    #[test]
    fn test_configured_chat_wins_over_saved() {
        let temp = tempfile::tempdir().unwrap();
        let store = JsonStore::open(temp.path(), "u1").unwrap();
        store.save(&TelegramChat { chat_id: 9 }).unwrap();

        let t = transport(Some(42)).with_store(store);
        assert_eq!(t.chat_id(), Some(42));
    }

    #[test]
    fn test_url_uses_token() {
        let t = transport(None);
        assert_eq!(t.url("getUpdates"), "https://api.telegram.org/bottoken/getUpdates");
    }

    #[test]
    fn test_parse_updates_payload() {
        let raw = r#"{"ok":true,"result":[{"update_id":5,"message":{"message_id":1,"chat":{"id":42,"type":"private"},"text":"hey"}}]}"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        let updates = parsed.result.unwrap();
        assert_eq!(updates[0].update_id, 5);
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("hey"));
    }

    #[test]
    fn test_split_message() {
        assert_eq!(split_message("short", 10), vec!["short".to_string()]);
        assert_eq!(
            split_message("line one\nline two\n", 10),
            vec!["line one\n".to_string(), "line two\n".to_string()]
        );
        let long = "a".repeat(25);
        let chunks = split_message(&long, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "aaaaa");
    }

    #[tokio::test]
    async fn test_send_without_chat_fails() {
        let t = transport(None);
        assert!(matches!(t.send("hi").await, Err(DeliveryError::NoRecipient)));
    }
}
