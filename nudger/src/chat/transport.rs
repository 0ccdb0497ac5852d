//! ChatTransport trait and delivery errors

use async_trait::async_trait;
use thiserror::Error;

/// Errors from sending a message
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Transport rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("No chat registered yet; send /start to the bot first")]
    NoRecipient,

    #[error("Transport not configured: {0}")]
    NotConfigured(String),

    #[error("Transport closed")]
    Closed,
}

/// Outbound side of the chat interface
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Deliver one message to the user
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Transport that records messages and can be told to fail
    #[derive(Default)]
    pub struct MockTransport {
        sent: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            let transport = Self::default();
            transport.set_failing(true);
            transport
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for MockTransport {
        fn name(&self) -> &str {
            "mock"
        }

        async fn send(&self, text: &str) -> Result<(), DeliveryError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DeliveryError::Rejected {
                    status: 503,
                    message: "mock failure".to_string(),
                });
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }
}
