//! Playback acknowledgment queue.
//!
//! Every audio segment sent to the caller is followed by a named mark. The
//! provider echoes the mark back once everything before it has played, so a
//! non-empty queue means the caller is still hearing AI audio.

use std::collections::VecDeque;

use tracing::debug;

/// Prefix of the mark names sent to the telephony provider.
pub const MARK_PREFIX: &str = "responsePart";

#[derive(Debug, Default)]
pub struct MarkQueue {
    pending: VecDeque<String>,
    next_seq: u64,
}

impl MarkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next mark name without queueing it.
    pub fn next_name(&mut self) -> String {
        self.next_seq += 1;
        format!("{MARK_PREFIX}-{}", self.next_seq)
    }

    pub fn push(&mut self, name: String) {
        self.pending.push_back(name);
    }

    /// Remove the oldest outstanding mark. A no-op on an empty queue.
    pub fn pop(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    /// Handle an acknowledgment from the provider.
    ///
    /// Acknowledgments arrive in send order; a name that does not match the
    /// oldest mark still consumes it.
    pub fn acknowledge(&mut self, name: &str) -> Option<String> {
        let popped = self.pop();
        match popped.as_deref() {
            Some(expected) if expected != name => {
                debug!(expected, received = name, "Mark acknowledged out of order");
            }
            None => debug!(received = name, "Mark acknowledged with empty queue"),
            _ => {}
        }
        popped
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
