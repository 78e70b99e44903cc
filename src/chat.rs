// Terminal chat client for a running server.
// Mirrors the web widget: same endpoint, same greeting and apology text.

use anyhow::{Context, Result};
use reqwest::Client;
use std::io::{BufRead, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use crate::web_server::{ChatRequest, ChatResponse, GREETING};

/// Shown when the server cannot be reached or answers with an error.
pub const CLIENT_APOLOGY: &str =
    "I'm sorry, I'm having trouble connecting to WebMD's database right now. Please try again later.";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub text: String,
    pub is_user: bool,
}

pub struct ChatSession {
    client: Client,
    endpoint: String,
    conversation_id: String,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(server: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self {
            client: Client::new(),
            endpoint: format!("{}/api/chat", server.trim_end_matches('/')),
            conversation_id: millis.to_string(),
            messages: vec![ChatMessage {
                text: GREETING.to_string(),
                is_user: false,
            }],
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Send one question and record both sides of the exchange. Failures are
    /// recorded as the apology message rather than returned.
    pub async fn send(&mut self, text: &str) -> ChatMessage {
        self.messages.push(ChatMessage {
            text: text.to_string(),
            is_user: true,
        });

        let reply = match self.request(text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Chat request failed: {:#}", e);
                CLIENT_APOLOGY.to_string()
            }
        };

        let reply = ChatMessage {
            text: reply,
            is_user: false,
        };
        self.messages.push(reply.clone());
        reply
    }

    async fn request(&self, text: &str) -> Result<String> {
        let body = ChatRequest {
            message: Some(text.to_string()),
            conversation_id: Some(self.conversation_id.clone()),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context(format!("Failed to reach {}", self.endpoint))?
            .error_for_status()?;

        let chat_response = response
            .json::<ChatResponse>()
            .await
            .context("Failed to parse chat response")?;
        Ok(chat_response.response)
    }
}

/// Interactive loop over stdin until EOF or `exit`.
pub async fn run_chat(server: &str) -> Result<()> {
    let mut session = ChatSession::new(server);
    info!(conversation_id = session.conversation_id(), "Starting chat session");

    println!("{}\n", GREETING);
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        let reply = session.send(question).await;
        println!("\n{}\n", reply.text);
    }

    info!(messages = session.messages().len(), "Chat session finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_starts_with_greeting() {
        let session = ChatSession::new("http://127.0.0.1:3000/");
        assert_eq!(session.endpoint, "http://127.0.0.1:3000/api/chat");
        assert_eq!(session.messages().len(), 1);
        assert!(!session.messages()[0].is_user);
        assert!(session.conversation_id().parse::<u128>().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_server_records_apology() {
        // Port 9 (discard) is not expected to run an HTTP server.
        let mut session = ChatSession::new("http://127.0.0.1:9");
        let reply = session.send("Is ibuprofen safe?").await;

        assert_eq!(reply.text, CLIENT_APOLOGY);
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.messages().last(), Some(&reply));
        assert_eq!(
            session.messages()[1],
            ChatMessage {
                text: "Is ibuprofen safe?".to_string(),
                is_user: true
            }
        );
    }
}
