//! Speech request queue.

use crate::SpeechRequest;
use std::collections::VecDeque;

/// Pending speech requests.
///
/// Urgent requests go ahead of everything that is not urgent, behind any
/// urgent requests already queued. All other priorities append at the tail.
#[derive(Debug, Default)]
pub struct SpeechQueue {
    items: VecDeque<SpeechRequest>,
}

impl SpeechQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a request according to its priority.
    pub fn push(&mut self, request: SpeechRequest) {
        if request.is_urgent() {
            let at = self
                .items
                .iter()
                .position(|r| !r.is_urgent())
                .unwrap_or(self.items.len());
            self.items.insert(at, request);
        } else {
            self.items.push_back(request);
        }
    }

    /// Removes and returns the next request.
    pub fn pop(&mut self) -> Option<SpeechRequest> {
        self.items.pop_front()
    }

    /// Drops every pending request and returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpeechRequest> {
        self.items.iter()
    }
}

#[cfg(test)]
mod queue_tests {
    use super::*;
    use crate::{Priority, VoiceContext};

    fn req(text: &str, priority: Priority) -> SpeechRequest {
        SpeechRequest::new(text, priority, VoiceContext::General)
    }

    fn texts(q: &SpeechQueue) -> Vec<&str> {
        q.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_urgent_goes_first() {
        let mut q = SpeechQueue::new();
        q.push(req("n1", Priority::Normal));
        q.push(req("n2", Priority::Normal));
        q.push(req("u1", Priority::Urgent));
        assert_eq!(texts(&q), vec!["u1", "n1", "n2"]);
    }

    #[test]
    fn test_urgent_fifo_among_urgent() {
        let mut q = SpeechQueue::new();
        q.push(req("n1", Priority::Normal));
        q.push(req("u1", Priority::Urgent));
        q.push(req("u2", Priority::Urgent));
        assert_eq!(texts(&q), vec!["u1", "u2", "n1"]);
    }

    #[test]
    fn test_non_urgent_priorities_append() {
        let mut q = SpeechQueue::new();
        q.push(req("low", Priority::Low));
        q.push(req("high", Priority::High));
        q.push(req("normal", Priority::Normal));
        assert_eq!(texts(&q), vec!["low", "high", "normal"]);
    }

    #[test]
    fn test_clear() {
        let mut q = SpeechQueue::new();
        q.push(req("a", Priority::Normal));
        q.push(req("b", Priority::Urgent));
        assert_eq!(q.clear(), 2);
        assert!(q.is_empty());
        assert!(q.pop().is_none());
    }
}
