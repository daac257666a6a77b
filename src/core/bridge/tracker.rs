//! Caller-side media clock and the offset at which the current AI response
//! started playing.

/// Timestamp bookkeeping for one call.
///
/// The clock is whatever the telephony provider last reported; it is not
/// required to be monotonic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampTracker {
    latest_media_timestamp: u64,
    response_start_timestamp: Option<u64>,
}

impl TimestampTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the timestamp of an inbound media frame. Last write wins.
    pub fn on_media(&mut self, timestamp: u64) {
        self.latest_media_timestamp = timestamp;
    }

    /// Mark the start of an AI response on the first audio delta.
    ///
    /// Later deltas of the same response leave the start untouched.
    pub fn on_response_audio_first_delta(&mut self) {
        if self.response_start_timestamp.is_none() {
            self.response_start_timestamp = Some(self.latest_media_timestamp);
        }
    }

    pub fn reset(&mut self) {
        self.response_start_timestamp = None;
    }

    pub fn reset_clock(&mut self) {
        self.latest_media_timestamp = 0;
    }

    /// Milliseconds of the current response the caller has heard.
    pub fn elapsed(&self) -> Option<u64> {
        self.response_start_timestamp
            .map(|start| self.latest_media_timestamp.saturating_sub(start))
    }

    pub fn latest_media_timestamp(&self) -> u64 {
        self.latest_media_timestamp
    }

    pub fn response_start_timestamp(&self) -> Option<u64> {
        self.response_start_timestamp
    }
}
