//! One-shot delayed events driven by the scene clock.

use std::time::Duration;

/// Cancellation token for a scheduled event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct PendingTimer<E> {
    handle: TimerHandle,
    remaining: Duration,
    event: E,
}

/// Queue of delayed events. Time only moves when [`Timers::tick`] is called, so a
/// paused or headless scene controls exactly when callbacks fire.
#[derive(Debug)]
pub struct Timers<E> {
    next_id: u64,
    pending: Vec<PendingTimer<E>>,
}

impl<E> Timers<E> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            pending: Vec::new(),
        }
    }

    /// Schedule `event` to fire once after `delay`.
    pub fn delayed_call(&mut self, delay: Duration, event: E) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.pending.push(PendingTimer {
            handle,
            remaining: delay,
            event,
        });
        handle
    }

    /// Cancel a scheduled event. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.handle != handle);
        self.pending.len() != before
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|t| t.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending event without firing it.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Advance the clock by `dt` and return every event that became due, earliest first.
    /// Events due at the same instant fire in scheduling order.
    pub fn tick(&mut self, dt: Duration) -> Vec<(TimerHandle, E)> {
        let mut due = Vec::new();
        let mut still_pending = Vec::with_capacity(self.pending.len());
        for mut timer in self.pending.drain(..) {
            if timer.remaining <= dt {
                due.push(timer);
            } else {
                timer.remaining -= dt;
                still_pending.push(timer);
            }
        }
        self.pending = still_pending;

        due.sort_by_key(|t| (t.remaining, t.handle));
        due.into_iter().map(|t| (t.handle, t.event)).collect()
    }
}

impl<E> Default for Timers<E> {
    fn default() -> Self {
        Self::new()
    }
}
