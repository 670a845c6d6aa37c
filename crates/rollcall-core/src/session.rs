//! Capture session context: lifecycle state plus cancellation.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    Stopped,
}

#[derive(Error, Debug)]
#[error("invalid session transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// One enrollment or recognition run.
///
/// `Idle -> Capturing -> Stopped`. A stopped session cannot be restarted;
/// create a new one. Cancellation is signalled through the token, which may
/// be cloned to another thread (e.g. a Ctrl-C handler) and is checked by the
/// flows at every frame boundary.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    cancel: CancellationToken,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            state: SessionState::Idle,
            cancel,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// A token that stops this session when cancelled.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn begin(&mut self) -> Result<(), InvalidTransition> {
        if self.state != SessionState::Idle {
            return Err(InvalidTransition {
                from: self.state,
                to: SessionState::Capturing,
            });
        }
        self.state = SessionState::Capturing;
        tracing::debug!("session capturing");
        Ok(())
    }

    /// Cancel and stop, from any state.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.state = SessionState::Stopped;
    }

    /// Mark a capturing session as finished on its own.
    pub fn finish(&mut self) {
        if self.state == SessionState::Capturing {
            self.state = SessionState::Stopped;
            tracing::debug!(cancelled = self.is_cancelled(), "session stopped");
        }
    }
}
