//! Deadline scheduler advanced by the simulation tick
//!
//! Replaces per-object countdowns and delayed invocations. Every timer has an
//! id so its owner can cancel it on teardown; a cancelled timer never fires.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<E> {
    id: TimerId,
    deadline: Duration,
    event: E,
}

/// Simulation-clock timer list
///
/// Time only moves when `advance` is called, which keeps expiry deterministic
/// and lets tests step through respawn windows exactly.
#[derive(Debug)]
pub struct Scheduler<E> {
    now: Duration,
    next_id: u64,
    entries: Vec<Entry<E>>,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn schedule(&mut self, delay: Duration, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            deadline: self.now + delay,
            event,
        });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Cancels every pending timer whose event matches the predicate
    pub fn cancel_where<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&E) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|entry| !predicate(&entry.event));
        before - self.entries.len()
    }

    /// Moves the clock forward and returns every event that came due
    ///
    /// Due events are ordered by deadline; timers sharing a deadline keep the
    /// order in which they were scheduled.
    pub fn advance(&mut self, dt: Duration) -> Vec<E> {
        self.now += dt;
        let now = self.now;

        let (mut due, pending): (Vec<Entry<E>>, Vec<Entry<E>>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| entry.deadline <= now);
        self.entries = pending;

        due.sort_by_key(|entry| (entry.deadline, entry.id));
        due.into_iter().map(|entry| entry.event).collect()
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}
