/// Deterministic timing primitives - tick scheduling and delayed actions
///
/// Both types take the current time as an argument instead of reading the
/// clock themselves, so the playback engine drives them with real instants
/// and tests drive them with synthetic ones.
use std::time::{Duration, Instant};

/// Periodic tick schedule. The first tick comes due one full period after
/// arming, and each subsequent due time is anchored at the previous one so
/// the schedule never drifts.
#[derive(Debug)]
pub struct TickClock {
    next_due: Option<Instant>,
}

impl TickClock {
    pub fn new() -> Self {
        Self { next_due: None }
    }

    /// Start (or restart) the schedule. Re-arming replaces any pending tick,
    /// which is how a tempo change swaps the period without a duplicate or
    /// missed tick at the boundary.
    pub fn arm(&mut self, now: Instant, period: Duration) {
        self.next_due = Some(now + period);
    }

    /// Cancel the schedule. No tick is reported after this returns.
    pub fn disarm(&mut self) {
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    /// Reports whether a tick is due, at most one per call.
    pub fn poll(&mut self, now: Instant, period: Duration) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(due + period);
                true
            }
            _ => false,
        }
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Time-ordered queue of deferred actions (note-offs, feedback clears).
/// Entries scheduled with equal or earlier due times drain in insertion
/// order.
#[derive(Debug)]
pub struct DelayQueue<T> {
    entries: Vec<(Instant, T)>,
}

impl<T> DelayQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn schedule(&mut self, due: Instant, item: T) {
        self.entries.push((due, item));
    }

    /// Remove and return everything due at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].0 <= now {
                due.push(self.entries.remove(i).1);
            } else {
                i += 1;
            }
        }
        due
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.entries.iter().map(|(due, _)| *due).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
