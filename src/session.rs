use std::io::{BufRead, Write};

use thiserror::Error;

use crate::llm::backend::{ChatBackend, ProviderError};
use crate::llm::message::{ChatMessage, Conversation};
use crate::llm::request::{ChatRequest, InferenceOptions};

pub const EXIT_SENTINEL: &str = "exit chat";

const SUPPORT_SYSTEM_PROMPT: &str = "You are an AI customer support staff. Be polite, helpful, and concise. Address the customer's issue and provide clear next steps or solutions. Maintain context across the conversation.";

const WELCOME: &str =
    "\nWelcome to AI Customer Support! Type 'Exit Chat' to end the conversation.\n";

const FAREWELL: &str = "\nThank you for chatting with AI Customer Support. Goodbye!\n";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("console I/O failed")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Builds the support request for the whole conversation so far.
pub fn support_request(conversation: &Conversation, inference: InferenceOptions) -> ChatRequest {
    ChatRequest::new(conversation.messages().to_vec())
        .with_system(SUPPORT_SYSTEM_PROMPT)
        .with_inference(inference)
}

pub fn is_exit_sentinel(line: &str) -> bool {
    line.eq_ignore_ascii_case(EXIT_SENTINEL)
}

/// Interactive customer-support chat owning its conversation history.
pub struct SupportSession<'a> {
    backend: &'a dyn ChatBackend,
    inference: InferenceOptions,
    conversation: Conversation,
}

impl<'a> SupportSession<'a> {
    pub fn new(backend: &'a dyn ChatBackend, inference: InferenceOptions) -> Self {
        Self {
            backend,
            inference,
            conversation: Conversation::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Sends one user turn and records the assistant reply.
    pub async fn send(&mut self, text: &str) -> Result<String, ProviderError> {
        self.conversation.push(ChatMessage::user(text));
        let request = support_request(&self.conversation, self.inference);
        let response = self.backend.invoke(&request).await?;

        let reply = response.text();
        self.conversation.push(ChatMessage::assistant(reply.clone()));
        tracing::debug!(turns = self.conversation.len(), "support reply recorded");
        Ok(reply)
    }

    /// Runs until the exit sentinel or end of input.
    pub async fn run<R, W>(&mut self, mut input: R, mut output: W) -> Result<(), SessionError>
    where
        R: BufRead,
        W: Write,
    {
        writeln!(output, "{WELCOME}")?;

        loop {
            write!(output, "You: ")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                tracing::debug!("console input closed");
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']);

            if is_exit_sentinel(line) {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let reply = self.send(line).await?;
            writeln!(output, "AI: {reply}\n")?;
        }

        writeln!(output, "{FAREWELL}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::backend::{Provider, WirePayload};
    use crate::llm::message::{ContentBlock, Role};
    use crate::llm::response::{ChatResponse, StopReason};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::Value;
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Replies "reply N" and records every request it receives.
    #[derive(Default)]
    struct ScriptedBackend {
        seen: Mutex<Vec<Vec<ChatMessage>>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn provider(&self) -> Provider {
            Provider::Bedrock
        }

        fn model(&self) -> &str {
            "scripted"
        }

        fn prepare(&self, _request: &ChatRequest) -> Result<WirePayload, ProviderError> {
            Ok(WirePayload {
                url: "scripted://".to_string(),
                body: Value::Null,
            })
        }

        async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            if self.fail {
                return Err(ProviderError::Api {
                    provider: Provider::Bedrock,
                    status: StatusCode::TOO_MANY_REQUESTS,
                    body: "throttled".to_string(),
                });
            }
            let mut seen = self.seen.lock().expect("lock");
            seen.push(request.messages.clone());
            Ok(ChatResponse {
                content: vec![
                    ContentBlock::text("reply "),
                    ContentBlock::text(seen.len().to_string()),
                ],
                stop_reason: StopReason::EndTurn,
                usage: None,
            })
        }
    }

    async fn run_session(backend: &ScriptedBackend, input: &str) -> (String, usize) {
        let mut session = SupportSession::new(backend, InferenceOptions::default());
        let mut output = Vec::new();
        session
            .run(Cursor::new(input.to_string()), &mut output)
            .await
            .expect("session succeeds");
        (
            String::from_utf8(output).expect("utf-8"),
            session.conversation().len(),
        )
    }

    #[test]
    fn sentinel_matches_case_insensitively() {
        assert!(is_exit_sentinel("Exit Chat"));
        assert!(is_exit_sentinel("EXIT CHAT"));
        assert!(!is_exit_sentinel("exit chat please"));
        assert!(!is_exit_sentinel(" exit chat"));
    }

    #[test]
    fn support_request_carries_system_prompt_and_history() {
        let mut conversation = Conversation::new();
        conversation.push(ChatMessage::user("my order is late"));
        let request = support_request(&conversation, InferenceOptions::default());

        assert!(
            request
                .system
                .as_deref()
                .is_some_and(|system| system.starts_with("You are an AI customer support staff"))
        );
        assert_eq!(request.messages, conversation.messages());
        assert!(request.tool_config.is_none());
    }

    #[tokio::test]
    async fn sentinel_ends_loop_without_sending() {
        let backend = ScriptedBackend::default();
        let (output, turns) = run_session(&backend, "Exit Chat\nignored\n").await;

        assert_eq!(turns, 0);
        assert!(backend.seen.lock().expect("lock").is_empty());
        assert!(output.contains("Goodbye!"));
    }

    #[tokio::test]
    async fn every_turn_sends_the_full_history() {
        let backend = ScriptedBackend::default();
        let (output, turns) =
            run_session(&backend, "where is my parcel?\nthanks\nEXIT CHAT\n").await;

        assert_eq!(turns, 4);
        assert!(output.contains("AI: reply 1\n"));
        assert!(output.contains("AI: reply 2\n"));

        let seen = backend.seen.lock().expect("lock");
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].len(), 1);
        assert_eq!(seen[1].len(), 3);
        assert_eq!(seen[1][1].role(), Role::Assistant);
        assert_eq!(seen[1][1].text(), "reply 1");
        assert_eq!(seen[1][2].text(), "thanks");
        assert!(
            seen.iter()
                .flatten()
                .all(|message| !is_exit_sentinel(&message.text()))
        );
    }

    #[tokio::test]
    async fn end_of_input_ends_loop() {
        let backend = ScriptedBackend::default();
        let (output, turns) = run_session(&backend, "hello").await;

        assert_eq!(turns, 2);
        assert!(output.contains("Goodbye!"));
    }

    #[tokio::test]
    async fn blank_lines_are_not_sent() {
        let backend = ScriptedBackend::default();
        let (_, turns) = run_session(&backend, "\n   \r\nhi\r\nexit chat\r\n").await;

        assert_eq!(turns, 2);
        assert_eq!(backend.seen.lock().expect("lock")[0][0].text(), "hi");
    }

    #[tokio::test]
    async fn provider_error_ends_session() {
        let backend = ScriptedBackend {
            fail: true,
            ..ScriptedBackend::default()
        };
        let mut session = SupportSession::new(&backend, InferenceOptions::default());
        let err = session
            .run(Cursor::new("hello\n".to_string()), Vec::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Provider(ProviderError::Api { .. })));
        assert_eq!(session.conversation().len(), 1);
    }
}
