//! Working memory — the bounded short-term window of recent turns.
//!
//! A FIFO over the last W committed turns, created at session start and never
//! persisted. Distinct from the durable fact ledger: the window carries raw
//! player/narrative text for prompt assembly, not scored facts.

use std::collections::VecDeque;

use crate::memory::types::TurnEntry;

/// Bounded FIFO of the most recent committed turns.
#[derive(Debug)]
pub struct WorkingMemory {
    entries: VecDeque<TurnEntry>,
    capacity: usize,
}

impl WorkingMemory {
    /// Create an empty window holding at most `capacity` turns.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a committed turn, evicting the oldest entry when full.
    pub fn push(&mut self, entry: TurnEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Oldest-to-newest snapshot of the window.
    pub fn snapshot(&self) -> Vec<TurnEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(turn: u64) -> TurnEntry {
        TurnEntry {
            turn,
            player_input: format!("input {turn}"),
            narrative: format!("narrative {turn}"),
        }
    }

    #[test]
    fn fifo_eviction_beyond_capacity() {
        let mut window = WorkingMemory::new(5);
        for turn in 1..=8 {
            window.push(entry(turn));
        }
        assert_eq!(window.len(), 5);
        let turns: Vec<u64> = window.snapshot().iter().map(|e| e.turn).collect();
        assert_eq!(turns, vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut window = WorkingMemory::new(3);
        for turn in 1..=100 {
            window.push(entry(turn));
            assert!(window.len() <= 3);
        }
    }

    #[test]
    fn snapshot_is_oldest_first() {
        let mut window = WorkingMemory::new(4);
        window.push(entry(10));
        window.push(entry(11));
        let snap = window.snapshot();
        assert_eq!(snap[0].turn, 10);
        assert_eq!(snap[1].turn, 11);
    }
}
