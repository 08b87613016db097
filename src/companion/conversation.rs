// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory chat session with delayed companion replies.
//!
//! Each reply is a spawned task that sleeps for a random delay and then
//! appends the classifier's answer. Replies race the conversation's
//! [`CancellationToken`]; once the conversation is closed or dropped no
//! pending reply is ever delivered.
//!
//! Messages are never persisted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::classifier::{Classifier, Reply, ReplyCategory};
use crate::security::locks::{resilient_read, resilient_write};
use crate::types::Message;

/// Opening line shown when a conversation starts empty.
pub const GREETING: &str =
    "Hello. I'm MindGuard. I'm here to listen without judgment. How are things going today?";

/// Timing of companion messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyDelays {
    /// Delay before the opening greeting.
    pub greeting: Duration,
    /// Lower bound (inclusive) of the reply delay.
    pub min: Duration,
    /// Upper bound (exclusive) of the reply delay.
    pub max: Duration,
}

impl Default for ReplyDelays {
    fn default() -> Self {
        Self {
            greeting: Duration::from_millis(700),
            min: Duration::from_millis(1000),
            max: Duration::from_millis(2000),
        }
    }
}

impl ReplyDelays {
    /// No waiting at all.
    pub fn immediate() -> Self {
        Self {
            greeting: Duration::ZERO,
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Draw a reply delay from `[min, max)`; `min` when the range is empty.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..self.max)
    }
}

/// A delivered companion message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub message: Message,
    pub category: Option<ReplyCategory>,
}

/// Decrements the pending count however the reply task ends.
struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn new(pending: &Arc<AtomicUsize>) -> Self {
        pending.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(pending))
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One chat session.
pub struct Conversation {
    classifier: Arc<Classifier>,
    delays: ReplyDelays,
    messages: Arc<RwLock<Vec<Message>>>,
    pending: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl Conversation {
    pub fn new(classifier: Arc<Classifier>, delays: ReplyDelays) -> Self {
        Self {
            classifier,
            delays,
            messages: Arc::new(RwLock::new(Vec::new())),
            pending: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
        }
    }

    /// Schedule the opening greeting. `None` if the conversation already has
    /// messages or is closed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn greet(&self) -> Option<JoinHandle<Option<Delivered>>> {
        if self.is_closed() || !resilient_read(&self.messages).is_empty() {
            return None;
        }

        Some(self.schedule(self.delays.greeting, |transcript| {
            // The student may have typed first.
            if !transcript.is_empty() {
                return None;
            }
            Some((GREETING.to_string(), None))
        }))
    }

    /// Append the student's message and schedule a reply.
    ///
    /// Blank input is ignored and returns `None`. Must be called from within
    /// a Tokio runtime.
    pub fn send(&self, text: &str) -> Option<JoinHandle<Option<Delivered>>> {
        let text = text.trim();
        if text.is_empty() || self.is_closed() {
            return None;
        }

        resilient_write(&self.messages).push(Message::user(text));
        tracing::debug!("CHAT_SENT | chars={}", text.chars().count());

        let delay = self.delays.sample(&mut rand::thread_rng());
        let classifier = Arc::clone(&self.classifier);
        let text = text.to_string();
        Some(self.schedule(delay, move |_| {
            let Reply { category, text } = classifier.respond(&text);
            Some((text, Some(category)))
        }))
    }

    /// Spawn a reply. `compose` runs under the transcript write lock, after
    /// the last cancellation check, so nothing lands once `close` returns.
    fn schedule<F>(&self, delay: Duration, compose: F) -> JoinHandle<Option<Delivered>>
    where
        F: FnOnce(&[Message]) -> Option<(String, Option<ReplyCategory>)> + Send + 'static,
    {
        let guard = PendingGuard::new(&self.pending);
        let cancel = self.cancel.clone();
        let messages = Arc::clone(&self.messages);

        tokio::spawn(async move {
            let _guard = guard;

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("CHAT_REPLY_CANCELLED");
                    return None;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let mut transcript = resilient_write(&messages);
            if cancel.is_cancelled() {
                return None;
            }

            let (text, category) = compose(&transcript)?;
            let message = Message::ai(text);
            transcript.push(message.clone());
            Some(Delivered { message, category })
        })
    }

    /// Snapshot of the transcript.
    pub fn messages(&self) -> Vec<Message> {
        resilient_read(&self.messages).clone()
    }

    /// True while any reply is pending.
    pub fn is_composing(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    /// Drop the transcript. Pending replies still land.
    pub fn clear(&self) {
        resilient_write(&self.messages).clear();
    }

    /// Cancel every pending reply. Further sends are ignored.
    pub fn close(&self) {
        // Held while cancelling so an in-flight reply either lands first or not at all.
        let transcript = resilient_write(&self.messages);
        if !self.cancel.is_cancelled() {
            tracing::debug!("CHAT_CLOSED | messages={}", transcript.len());
        }
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Conversation {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sender;

    fn conversation() -> Conversation {
        Conversation::new(Arc::new(Classifier::new()), ReplyDelays::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_after_delay() {
        let convo = conversation();
        let handle = convo.greet().unwrap();

        tokio::time::sleep(Duration::from_millis(699)).await;
        assert!(convo.messages().is_empty());
        assert!(convo.is_composing());

        let delivered = handle.await.unwrap().unwrap();
        assert_eq!(delivered.message.text, GREETING);
        assert_eq!(delivered.message.sender, Sender::Ai);
        assert!(!convo.is_composing());
        assert!(convo.greet().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_arrives_within_window() {
        let convo = conversation();
        let start = tokio::time::Instant::now();
        let handle = convo.send("I'm so worried about finals").unwrap();

        assert_eq!(convo.messages().len(), 1);
        assert!(convo.is_composing());

        let delivered = handle.await.unwrap().unwrap();
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(1000));
        assert!(waited < Duration::from_millis(2000));
        assert_eq!(delivered.category, Some(ReplyCategory::Anxiety));

        let messages = convo.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[1].sender, Sender::Ai);
        assert!(!convo.is_composing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_input_is_ignored() {
        let convo = conversation();
        assert!(convo.send("   ").is_none());
        assert!(convo.send("").is_none());
        assert!(convo.messages().is_empty());
        assert!(!convo.is_composing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_reply() {
        let convo = conversation();
        let handle = convo.send("hello").unwrap();
        convo.close();

        assert!(handle.await.unwrap().is_none());
        assert_eq!(convo.messages().len(), 1);
        assert!(!convo.is_composing());
        assert!(convo.send("anyone there?").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_reply() {
        let convo = conversation();
        let handle = convo.send("hello").unwrap();
        drop(convo);
        assert!(handle.await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_sends_all_reply() {
        let convo = conversation();
        let first = convo.send("one").unwrap();
        let second = convo.send("two").unwrap();

        assert!(first.await.unwrap().is_some());
        assert!(second.await.unwrap().is_some());
        assert_eq!(convo.messages().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_skipped_when_student_types_first() {
        let convo = conversation();
        let greeting = convo.greet().unwrap();
        let reply = convo.send("hi").unwrap();

        assert!(greeting.await.unwrap().is_none());
        assert!(reply.await.unwrap().is_some());
        assert!(convo.messages().iter().all(|m| m.text != GREETING));
    }

    #[test]
    fn test_sample_degenerate_range() {
        let delays = ReplyDelays::immediate();
        assert_eq!(delays.sample(&mut rand::thread_rng()), Duration::ZERO);
    }
}
