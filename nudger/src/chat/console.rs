//! Terminal chat: console transport and the interactive session

use async_trait::async_trait;
use chrono::Local;
use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use super::router::FrontEnd;
use super::transport::{ChatTransport, DeliveryError};

/// Prints companion messages to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleTransport;

#[async_trait]
impl ChatTransport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        print_companion(text);
        Ok(())
    }
}

fn print_companion(text: &str) {
    println!();
    for line in text.lines() {
        println!("{} {}", "│".bright_cyan(), line);
    }
    println!();
}

/// Interactive chat in the terminal
pub struct ChatSession {
    front: FrontEnd,
}

impl ChatSession {
    pub fn new(front: FrontEnd) -> Self {
        Self { front }
    }

    /// Run the read loop until `/quit` or Ctrl+D
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));
            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    if matches!(input, "/quit" | "/exit" | "/q") {
                        break;
                    }

                    debug!(len = input.len(), "ChatSession::run: input");
                    let reply = self.front.handle(input, Local::now().naive_local()).await;
                    if !reply.is_empty() {
                        print_companion(&reply);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Take care!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Nudger".bright_cyan().bold());
        println!("Type {} for commands, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }
}
