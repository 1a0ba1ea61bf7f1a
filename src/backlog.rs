use std::collections::VecDeque;

/// Bounded FIFO of encoded lines awaiting delivery. When full, the oldest
/// line is discarded to make room.
#[derive(Debug, Default)]
pub(crate) struct Backlog {
    lines: VecDeque<Vec<u8>>,
    capacity: usize,
}

impl Backlog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Queue a line at the back. Returns how many lines were discarded,
    /// counting `line` itself when the backlog is disabled.
    pub(crate) fn push(&mut self, line: Vec<u8>) -> usize {
        if self.capacity == 0 {
            return 1;
        }
        let mut dropped = 0;
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
            dropped += 1;
        }
        self.lines.push_back(line);
        dropped
    }

    /// Put a line that failed mid-replay back at the front, keeping order.
    pub(crate) fn requeue(&mut self, line: Vec<u8>) {
        if self.capacity > 0 && self.lines.len() < self.capacity {
            self.lines.push_front(line);
        }
    }

    pub(crate) fn pop(&mut self) -> Option<Vec<u8>> {
        self.lines.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: u8) -> Vec<u8> {
        vec![n, b'\n']
    }

    #[test]
    fn disabled_backlog_drops_everything() {
        let mut backlog = Backlog::new(0);
        assert_eq!(backlog.push(line(1)), 1);
        assert_eq!(backlog.len(), 0);
        backlog.requeue(line(2));
        assert!(backlog.pop().is_none());
    }

    #[test]
    fn drops_oldest_when_full() {
        let mut backlog = Backlog::new(2);
        assert_eq!(backlog.push(line(1)), 0);
        assert_eq!(backlog.push(line(2)), 0);
        assert_eq!(backlog.push(line(3)), 1);
        assert_eq!(backlog.pop(), Some(line(2)));
        assert_eq!(backlog.pop(), Some(line(3)));
        assert_eq!(backlog.pop(), None);
    }

    #[test]
    fn requeue_restores_front() {
        let mut backlog = Backlog::new(3);
        backlog.push(line(1));
        backlog.push(line(2));
        let first = backlog.pop().unwrap();
        backlog.requeue(first);
        assert_eq!(backlog.pop(), Some(line(1)));
        assert_eq!(backlog.pop(), Some(line(2)));
    }
}
