// Worklist
// FIFO queue of discovered entities with a single current slot

use std::collections::VecDeque;

use super::state::Startup;

/// Every entity lives in exactly one of `queue`, `current` or `processed`.
#[derive(Debug, Clone, Default)]
pub struct Worklist {
    queue: VecDeque<Startup>,
    current: Option<Startup>,
    processed: Vec<Startup>,
}

impl Worklist {
    pub fn new(entities: Vec<Startup>) -> Self {
        Self {
            queue: entities.into(),
            current: None,
            processed: Vec::new(),
        }
    }

    /// Retires the current entity and promotes the queue head.
    ///
    /// Returns `false` once nothing is left to process.
    pub fn advance(&mut self) -> bool {
        self.retire_current();
        self.current = self.queue.pop_front();
        self.current.is_some()
    }

    /// Moves the current entity (if any) to `processed`.
    pub fn retire_current(&mut self) {
        if let Some(previous) = self.current.take() {
            self.processed.push(previous);
        }
    }

    pub fn current(&self) -> Option<&Startup> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut Startup> {
        self.current.as_mut()
    }

    /// 1-based place of the current entity in discovery order.
    pub fn position(&self) -> Option<usize> {
        self.current.as_ref().map(|_| self.processed.len() + 1)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn processed(&self) -> &[Startup] {
        &self.processed
    }

    pub fn into_processed(self) -> Vec<Startup> {
        self.processed
    }

    pub fn total(&self) -> usize {
        self.queue.len() + usize::from(self.current.is_some()) + self.processed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[Startup]) -> Vec<&str> {
        items.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn advance_is_fifo_and_exactly_once() {
        for n in 0..6 {
            let entities: Vec<_> = (0..n).map(|i| Startup::named(format!("s{}", i))).collect();
            let mut worklist = Worklist::new(entities);
            let mut promoted = Vec::new();

            while worklist.advance() {
                promoted.push(worklist.current().unwrap().name.clone());
                assert_eq!(worklist.total(), n);
            }

            let expected: Vec<String> = (0..n).map(|i| format!("s{}", i)).collect();
            assert_eq!(promoted, expected);
            assert_eq!(names(worklist.processed()), expected.iter().map(String::as_str).collect::<Vec<_>>());
            assert!(worklist.current().is_none());
            assert_eq!(worklist.remaining(), 0);
        }
    }

    #[test]
    fn position_follows_discovery_order() {
        let mut worklist = Worklist::new(vec![Startup::named("Acme"), Startup::named("Acme")]);
        assert_eq!(worklist.position(), None);

        worklist.advance();
        assert_eq!(worklist.position(), Some(1));
        worklist.advance();
        assert_eq!(worklist.position(), Some(2));
        worklist.advance();
        assert_eq!(worklist.position(), None);
    }

    #[test]
    fn advance_after_exhaustion_is_a_no_op() {
        let mut worklist = Worklist::new(vec![Startup::named("Acme")]);
        assert!(worklist.advance());
        assert!(!worklist.advance());
        assert!(!worklist.advance());
        assert_eq!(names(worklist.processed()), vec!["Acme"]);
    }

    #[test]
    fn retire_current_moves_the_last_entity() {
        let mut worklist = Worklist::new(vec![Startup::named("Acme")]);
        worklist.advance();
        worklist.retire_current();
        worklist.retire_current();

        assert!(worklist.current().is_none());
        assert_eq!(names(worklist.processed()), vec!["Acme"]);
    }
}
