//! Cancellable chat replies.
//!
//! A reply is a stream of text fragments. [`ChatSubscription`] wraps that
//! stream so the consumer (or any other task holding a [`ChatCancelHandle`])
//! can stop delivery at any point. Fragments already delivered stay delivered,
//! so a cancelled reply leaves a partial model message behind, never a
//! rolled-back one.

use crate::adapter::{ExtractionAdapter, ReplyStream};
use crate::catalog::{Catalog, ChatMessage};
use crate::error::SourceError;
use futures::stream::{self, AbortHandle, Abortable};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Prefix of the model message that replaces a failed reply.
pub const CHAT_ERROR_PREFIX: &str = "Sorry, I ran into an error: ";

/// Text shown in place of a reply that failed with `error`.
pub fn chat_error_text(error: impl std::fmt::Display) -> String {
    format!("{CHAT_ERROR_PREFIX}{error}")
}

/// Cancels a [`ChatSubscription`]. Cheap to clone and usable from any task.
#[derive(Debug, Clone)]
pub struct ChatCancelHandle(AbortHandle);

impl ChatCancelHandle {
    pub fn cancel(&self) {
        self.0.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_aborted()
    }
}

/// A chat reply being delivered fragment by fragment.
pub struct ChatSubscription {
    inner: Abortable<ReplyStream>,
    handle: ChatCancelHandle,
}

impl ChatSubscription {
    pub fn new(reply: ReplyStream) -> Self {
        let (handle, registration) = AbortHandle::new_pair();
        Self {
            inner: Abortable::new(reply, registration),
            handle: ChatCancelHandle(handle),
        }
    }

    /// A subscription that yields `error` once and ends.
    pub fn failed(error: SourceError) -> Self {
        Self::new(Box::pin(stream::once(async move { Err(error) })))
    }

    pub fn cancel_handle(&self) -> ChatCancelHandle {
        self.handle.clone()
    }

    /// Stop delivery. The next poll returns `None`.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }
}

impl Stream for ChatSubscription {
    type Item = Result<String, SourceError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Ask `adapter` about `catalog` and subscribe to the reply.
///
/// `history` is the conversation before `message`. An adapter error is not
/// returned directly; it arrives as the subscription's only item, so every
/// caller handles failures in one place.
pub async fn start_chat(
    adapter: &dyn ExtractionAdapter,
    catalog: &Catalog,
    history: &[ChatMessage],
    message: &str,
) -> ChatSubscription {
    debug!("Chat: {} prior turns", history.len());
    match adapter.chat(catalog, history, message).await {
        Ok(reply) => ChatSubscription::new(reply),
        Err(e) => {
            warn!("Chat request failed: {}", e);
            ChatSubscription::failed(e)
        }
    }
}
