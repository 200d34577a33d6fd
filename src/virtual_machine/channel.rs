//! Channel pair joining two machines.
//!
//! Each side owns an unbounded FIFO inbox. `send` never blocks. `receive`
//! waits until a value arrives or until waiting can no longer end, and then
//! fails with [`Blocked`].
//!
//! Deadlock is decided under one lock that guards both queues and both
//! sides' `blocked`/`finished` flags, so no timeout is involved:
//!
//! - a side sets its `blocked` flag the moment it finds its inbox empty;
//! - a `send` into a blocked side's inbox clears that flag and wakes it;
//! - a side that finds its inbox empty while the peer is either finished, or
//!   blocked on an empty inbox of its own, fails immediately and marks the
//!   pair deadlocked so the peer fails too.
//!
//! Because a send clears the receiver's flag under the same lock, a side
//! that has a wakeup in flight is never counted as blocked.

use regvm_derive::Error;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

/// One of the two machines attached to a [`ChannelPair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    /// Slot for per-side arrays; `A` is 0, `B` is 1.
    pub const fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }

    pub const fn peer(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Returned by [`ChannelPair::receive`] when no value can ever arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("receive can never complete")]
pub struct Blocked;

#[derive(Debug, Default)]
struct Shared {
    /// Inbox of each side.
    queues: [VecDeque<i64>; 2],
    blocked: [bool; 2],
    finished: [bool; 2],
    deadlocked: bool,
}

/// Two directional queues plus the bookkeeping for deadlock detection.
#[derive(Debug, Default)]
pub struct ChannelPair {
    shared: Mutex<Shared>,
    wake: [Notify; 2],
}

impl ChannelPair {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueues `value` for the peer of `from`, waking it if it is waiting.
    pub fn send(&self, from: Side, value: i64) {
        let to = from.peer();
        let mut shared = self.lock();
        shared.queues[to.index()].push_back(value);
        if shared.blocked[to.index()] {
            shared.blocked[to.index()] = false;
            self.wake[to.index()].notify_one();
        }
    }

    /// Pops the next value for `side` without waiting.
    pub fn try_receive(&self, side: Side) -> Option<i64> {
        self.lock().queues[side.index()].pop_front()
    }

    /// Waits for the next value for `side`.
    ///
    /// Fails with [`Blocked`] once the pair is deadlocked or the peer has
    /// finished and this side's inbox is empty.
    pub async fn receive(&self, side: Side) -> Result<i64, Blocked> {
        let (me, peer) = (side.index(), side.peer().index());
        loop {
            {
                let mut shared = self.lock();
                if let Some(value) = shared.queues[me].pop_front() {
                    shared.blocked[me] = false;
                    return Ok(value);
                }
                shared.blocked[me] = true;
                if shared.deadlocked {
                    return Err(Blocked);
                }
                if shared.finished[peer] {
                    return Err(Blocked);
                }
                if shared.blocked[peer] && shared.queues[peer].is_empty() {
                    shared.deadlocked = true;
                    self.wake[peer].notify_one();
                    return Err(Blocked);
                }
            }
            // A notify_one issued before this point leaves a permit, so the
            // wakeup is not lost between unlocking and awaiting.
            self.wake[me].notified().await;
        }
    }

    /// Marks `side` as done; it will never send again.
    pub fn finish(&self, side: Side) {
        let (me, peer) = (side.index(), side.peer().index());
        let mut shared = self.lock();
        shared.finished[me] = true;
        shared.blocked[me] = false;
        if shared.blocked[peer] {
            self.wake[peer].notify_one();
        }
    }

    /// Values queued for `side` and not yet received.
    pub fn pending(&self, side: Side) -> usize {
        self.lock().queues[side.index()].len()
    }

    /// True once both sides were found waiting on empty inboxes.
    pub fn is_deadlocked(&self) -> bool {
        self.lock().deadlocked
    }
}
