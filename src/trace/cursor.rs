use chrono::{DateTime, Utc};

use crate::pipeline::LogEvent;

/// Forward-only marker of the earliest log timestamp not yet shown for one
/// followed action.
///
/// Events sharing a millisecond are all shown only when they come back from
/// the same query; the log API offers nothing finer to resume from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogCursor {
    start_millis: Option<i64>,
}

impl LogCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next query start in epoch milliseconds, if the cursor has been seeded.
    pub fn start(&self) -> Option<i64> {
        self.start_millis
    }

    /// Seeds the cursor from the moment the action started. Logs written
    /// before that belong to earlier builds. Has no effect once seeded.
    pub fn seed(&mut self, action_started: DateTime<Utc>) -> i64 {
        *self
            .start_millis
            .get_or_insert_with(|| action_started.timestamp_millis())
    }

    /// Moves the cursor just past `event`. Never moves backwards.
    pub fn advance(&mut self, event: &LogEvent) {
        let next = event.timestamp.saturating_add(1);
        self.start_millis = Some(self.start_millis.map_or(next, |start| start.max(next)));
    }
}
