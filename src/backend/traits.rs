//! Backend trait implemented by every conversational backend

use async_trait::async_trait;

use crate::backend::types::{BackendKind, ChatMessage, SendOptions};
use crate::error::Result;

/// Callback receiving each partial response, in order, before the call settles
pub type ProgressFn<'a> = &'a (dyn Fn(&ChatMessage) + Send + Sync);

/// A configured connection to one conversational backend
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Which backend this client talks to
    fn kind(&self) -> BackendKind;

    /// Send one user message and wait for the complete reply.
    ///
    /// `on_progress` fires zero or more times with the reply so far; each call
    /// supersedes the previous one.
    async fn send_message(
        &self,
        text: &str,
        options: SendOptions,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<ChatMessage>;
}
