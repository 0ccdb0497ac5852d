//! Chat interface
//!
//! Transports deliver messages to the user; the front end turns inbound
//! text into commands, support replies or ordinary conversation.

mod command;
mod console;
mod router;
mod telegram;
mod transport;

pub use command::{Command, CommandError, help_text};
pub use console::{ChatSession, ConsoleTransport};
pub use router::FrontEnd;
pub use telegram::{TelegramChat, TelegramTransport, split_message};
pub use transport::{ChatTransport, DeliveryError};

#[cfg(test)]
pub use transport::mock;
