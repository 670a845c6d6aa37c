//! Chat session: visible transcript plus provider-side history.

use crate::config::ChatConfig;
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider returned no text{}", finish_suffix(.0))]
    EmptyReply(Option<String>),
    #[error("missing API key")]
    MissingApiKey,
    #[error("empty message")]
    EmptyTurn,
}

fn finish_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(" (finish reason: {r})"),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// A remote model that answers one turn given the prior history.
pub trait ChatProvider {
    fn generate(
        &self,
        config: &ChatConfig,
        history: &[Turn],
        turn: &str,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;
}

/// One conversation with a fixed system instruction.
///
/// `transcript` is what the user sees, including turns whose request failed;
/// `history` is what the model sees and only grows on success, so a failed
/// turn can simply be retried.
pub struct ChatSession<P> {
    provider: P,
    config: ChatConfig,
    history: Vec<Turn>,
    transcript: Vec<Turn>,
}

impl<P: ChatProvider> ChatSession<P> {
    pub fn new(provider: P, config: ChatConfig) -> Self {
        Self {
            provider,
            config,
            history: Vec::new(),
            transcript: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub async fn send(&mut self, turn: &str) -> Result<String, ProviderError> {
        let turn = turn.trim();
        if turn.is_empty() {
            return Err(ProviderError::EmptyTurn);
        }
        self.transcript.push(Turn::user(turn));

        match self.provider.generate(&self.config, &self.history, turn).await {
            Ok(reply) => {
                self.history.push(Turn::user(turn));
                self.history.push(Turn::model(reply.clone()));
                self.transcript.push(Turn::model(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!(error = %e, history = self.history.len(), "chat turn failed");
                Err(e)
            }
        }
    }
}
