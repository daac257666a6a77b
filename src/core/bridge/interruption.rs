//! Barge-in handling.
//!
//! When the caller starts talking over AI audio, the AI item is truncated at
//! the point the caller actually heard and the provider's playback buffer is
//! cleared.

use tracing::debug;

use super::marks::MarkQueue;
use super::tracker::TimestampTracker;

/// Where to cut the interrupted assistant item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatePoint {
    pub item_id: String,
    pub audio_end_ms: u64,
}

/// Outcome of an interruption. The playback buffer is always cleared; the
/// truncate is only possible when the interrupted item is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interruption {
    pub truncate: Option<TruncatePoint>,
}

/// React to caller speech onset.
///
/// Returns `None` and leaves all state untouched unless AI audio is still
/// awaiting playback and a response start is recorded. Otherwise clears the
/// mark queue, the current item and the response start.
pub fn on_speech_started(
    tracker: &mut TimestampTracker,
    marks: &mut MarkQueue,
    current_item: &mut Option<String>,
) -> Option<Interruption> {
    if marks.is_empty() {
        return None;
    }
    let elapsed = tracker.elapsed()?;

    debug!(
        latest_media_timestamp = tracker.latest_media_timestamp(),
        response_start_timestamp = ?tracker.response_start_timestamp(),
        elapsed_ms = elapsed,
        "Computing truncation point"
    );

    let truncate = current_item.take().map(|item_id| {
        debug!(%item_id, audio_end_ms = elapsed, "Truncating assistant item");
        TruncatePoint {
            item_id,
            audio_end_ms: elapsed,
        }
    });

    marks.clear();
    tracker.reset();

    Some(Interruption { truncate })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(item: Option<&str>) -> (TimestampTracker, MarkQueue, Option<String>) {
        let mut tracker = TimestampTracker::new();
        tracker.on_media(100);
        tracker.on_response_audio_first_delta();
        tracker.on_media(250);
        let mut marks = MarkQueue::new();
        let name = marks.next_name();
        marks.push(name);
        (tracker, marks, item.map(str::to_string))
    }

    #[test]
    fn test_truncates_at_heard_offset() {
        let (mut tracker, mut marks, mut item) = playing(Some("it1"));
        let interruption = on_speech_started(&mut tracker, &mut marks, &mut item).unwrap();
        assert_eq!(
            interruption.truncate,
            Some(TruncatePoint {
                item_id: "it1".to_string(),
                audio_end_ms: 150,
            })
        );
        assert!(marks.is_empty());
        assert_eq!(tracker.response_start_timestamp(), None);
        assert_eq!(item, None);
    }

    #[test]
    fn test_clears_without_known_item() {
        let (mut tracker, mut marks, mut item) = playing(None);
        let interruption = on_speech_started(&mut tracker, &mut marks, &mut item).unwrap();
        assert_eq!(interruption.truncate, None);
        assert!(marks.is_empty());
    }

    #[test]
    fn test_noop_when_nothing_pending() {
        let (mut tracker, _, mut item) = playing(Some("it1"));
        let mut marks = MarkQueue::new();
        assert_eq!(on_speech_started(&mut tracker, &mut marks, &mut item), None);
        assert_eq!(tracker.response_start_timestamp(), Some(100));
        assert_eq!(item.as_deref(), Some("it1"));
    }

    #[test]
    fn test_noop_without_response_start() {
        let (_, mut marks, mut item) = playing(Some("it1"));
        let mut tracker = TimestampTracker::new();
        assert_eq!(on_speech_started(&mut tracker, &mut marks, &mut item), None);
        assert_eq!(marks.len(), 1);
        assert_eq!(item.as_deref(), Some("it1"));
    }
}
