use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

/// A note that has to be released at `due_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DeferredNoteOff {
    pub due_time: Instant,
    pub note: u8,
}

/// Pending note-offs ordered by due time, earliest first.
#[derive(Debug, Default)]
pub struct NoteOffQueue {
    heap: BinaryHeap<Reverse<DeferredNoteOff>>,
}

impl NoteOffQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, note: u8, due_time: Instant) {
        self.heap.push(Reverse(DeferredNoteOff { due_time, note }));
    }

    /// Pops every entry due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: Instant) -> Vec<DeferredNoteOff> {
        let mut due = Vec::new();
        while let Some(Reverse(next)) = self.heap.peek() {
            if next.due_time > now {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry);
            }
        }
        due
    }

    /// Pops everything regardless of due time, earliest first.
    pub fn flush_all(&mut self) -> Vec<DeferredNoteOff> {
        let mut all: Vec<_> = self.heap.drain().map(|Reverse(e)| e).collect();
        all.sort();
        all
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(e)| e.due_time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_drain_due_in_time_order() {
        let base = Instant::now();
        let mut queue = NoteOffQueue::new();
        queue.schedule(38, base + Duration::from_millis(30));
        queue.schedule(36, base + Duration::from_millis(10));
        queue.schedule(42, base + Duration::from_millis(50));

        let due = queue.drain_due(base + Duration::from_millis(30));
        let notes: Vec<u8> = due.iter().map(|e| e.note).collect();
        assert_eq!(notes, vec![36, 38]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_due(), Some(base + Duration::from_millis(50)));
    }

    #[test]
    fn test_nothing_due_leaves_queue_alone() {
        let base = Instant::now();
        let mut queue = NoteOffQueue::new();
        queue.schedule(36, base + Duration::from_millis(10));
        assert!(queue.drain_due(base).is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_same_note_can_be_pending_twice() {
        let base = Instant::now();
        let mut queue = NoteOffQueue::new();
        queue.schedule(36, base + Duration::from_millis(10));
        queue.schedule(36, base + Duration::from_millis(20));
        assert_eq!(queue.flush_all().len(), 2);
        assert!(queue.is_empty());
    }
}
