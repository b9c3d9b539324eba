//! Steering and follow-up message queues.
//!
//! Callers push at any time, including while a run is in flight. The turn
//! runner drains at fixed injection points; a drain takes the whole queue or
//! only its head, depending on [`QueueMode`].

use std::collections::VecDeque;

use parking_lot::Mutex;
use strand_core::messages::AgentMessage;
use strand_settings::QueueMode;

#[derive(Debug, Default)]
struct Inner {
    mode: QueueMode,
    items: VecDeque<AgentMessage>,
}

/// A FIFO of messages waiting to be injected into the conversation.
#[derive(Debug, Default)]
pub struct MessageQueue {
    inner: Mutex<Inner>,
}

impl MessageQueue {
    /// Empty queue draining in `mode`.
    pub fn new(mode: QueueMode) -> Self {
        Self {
            inner: Mutex::new(Inner {
                mode,
                items: VecDeque::new(),
            }),
        }
    }

    /// Append a message.
    pub fn push(&self, message: AgentMessage) {
        self.inner.lock().items.push_back(message);
    }

    /// Remove and return the messages due at this injection point.
    pub fn drain(&self) -> Vec<AgentMessage> {
        let mut inner = self.inner.lock();
        match inner.mode {
            QueueMode::All => inner.items.drain(..).collect(),
            QueueMode::OneAtATime => inner.items.pop_front().into_iter().collect(),
        }
    }

    /// Drop everything queued.
    pub fn clear(&self) {
        self.inner.lock().items.clear();
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Change the drain mode. Queued messages are kept.
    pub fn set_mode(&self, mode: QueueMode) {
        self.inner.lock().mode = mode;
    }

    /// Current drain mode.
    pub fn mode(&self) -> QueueMode {
        self.inner.lock().mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(messages: &[AgentMessage]) -> Vec<String> {
        messages
            .iter()
            .map(|m| match m {
                AgentMessage::User(u) => strand_core::content::extract_text(&u.content),
                other => other.role().to_string(),
            })
            .collect()
    }

    fn filled(mode: QueueMode) -> MessageQueue {
        let q = MessageQueue::new(mode);
        q.push(AgentMessage::user_text("a"));
        q.push(AgentMessage::user_text("b"));
        q.push(AgentMessage::user_text("c"));
        q
    }

    #[test]
    fn one_at_a_time_takes_head() {
        let q = filled(QueueMode::OneAtATime);
        assert_eq!(texts(&q.drain()), ["a"]);
        assert_eq!(texts(&q.drain()), ["b"]);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn all_takes_everything_in_order() {
        let q = filled(QueueMode::All);
        assert_eq!(texts(&q.drain()), ["a", "b", "c"]);
        assert!(q.is_empty());
        assert!(q.drain().is_empty());
    }

    #[test]
    fn mode_change_keeps_items() {
        let q = filled(QueueMode::OneAtATime);
        q.set_mode(QueueMode::All);
        assert_eq!(q.mode(), QueueMode::All);
        assert_eq!(q.drain().len(), 3);
    }

    #[test]
    fn clear_empties() {
        let q = filled(QueueMode::All);
        q.clear();
        assert!(q.is_empty());
    }
}
