//! Ordered in-memory event buffer.

use std::collections::VecDeque;

use crate::model::Event;

/// Insertion-ordered queue of enriched events.
///
/// Flushes take a prefix; failed batches go back to the front so a retry
/// always precedes anything queued after it.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove and return up to `max` events from the head.
    pub fn take_prefix(&mut self, max: usize) -> Vec<Event> {
        let n = max.min(self.events.len());
        self.events.drain(..n).collect()
    }

    /// Put a batch back at the head, keeping its internal order.
    pub fn requeue_front(&mut self, batch: Vec<Event>) {
        for event in batch.into_iter().rev() {
            self.events.push_front(event);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventData, SessionId};
    use chrono::Utc;

    fn event(name: &str) -> Event {
        Event {
            event_type: name.to_string(),
            event_data: EventData::default(),
            session_id: SessionId("s".to_string()),
            client_timestamp: Utc::now(),
        }
    }

    fn names(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.event_type.as_str()).collect()
    }

    #[test]
    fn take_prefix_is_bounded_and_ordered() {
        let mut queue = EventQueue::new();
        for i in 0..5 {
            queue.push(event(&format!("e{i}")));
        }

        let batch = queue.take_prefix(3);
        assert_eq!(names(&batch), ["e0", "e1", "e2"]);
        assert_eq!(queue.len(), 2);

        let rest = queue.take_prefix(10);
        assert_eq!(names(&rest), ["e3", "e4"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn requeue_front_goes_ahead_of_newer_events() {
        let mut queue = EventQueue::new();
        queue.push(event("a"));
        queue.push(event("b"));
        let batch = queue.take_prefix(2);

        queue.push(event("c"));
        queue.requeue_front(batch);

        let all: Vec<&str> = queue.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(all, ["a", "b", "c"]);
    }
}
