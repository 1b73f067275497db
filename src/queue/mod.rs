//! Serialization of integration attempts.
//!
//! Attempts on one integration branch must not overlap: each one holds a
//! [`QueuePermit`] from preparing the branch until its result is published
//! or discarded. Waiters are served strictly in arrival order.
//!
//! The queue is an explicit value shared between coordinators, so tests and
//! separate hosts can use independent queues.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, info};

#[derive(Debug, Default)]
struct Tickets {
    /// Next ticket handed to an arriving attempt.
    next: u64,
    /// Ticket currently allowed to proceed.
    serving: u64,
}

/// A FIFO gate admitting one integration attempt at a time.
#[derive(Debug, Default)]
pub struct BuildQueue {
    tickets: Mutex<Tickets>,
    turn: Condvar,
}

impl BuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tickets> {
        // Ticket counters stay consistent even if a holder panicked
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until every earlier arrival has released its permit.
    pub fn acquire(&self) -> QueuePermit<'_> {
        let started = Instant::now();
        let mut tickets = self.lock();
        let ticket = tickets.next;
        tickets.next += 1;

        if tickets.serving != ticket {
            info!(
                ticket,
                ahead = ticket - tickets.serving,
                "Waiting for earlier integrations"
            );
        }
        while tickets.serving != ticket {
            tickets = self
                .turn
                .wait(tickets)
                .unwrap_or_else(PoisonError::into_inner);
        }

        debug!(
            ticket,
            waited_ms = started.elapsed().as_millis() as u64,
            "Acquired build queue"
        );
        QueuePermit {
            queue: self,
            ticket,
        }
    }

    /// Whether an [`acquire`](Self::acquire) right now would not block.
    pub fn try_available(&self) -> bool {
        let tickets = self.lock();
        tickets.serving == tickets.next
    }

    fn release(&self, ticket: u64) {
        let mut tickets = self.lock();
        tickets.serving += 1;
        debug!(ticket, "Released build queue");
        drop(tickets);
        self.turn.notify_all();
    }
}

/// Exclusive right to prepare and publish one integration. Released on drop.
#[derive(Debug)]
#[must_use = "the queue is released as soon as the permit is dropped"]
pub struct QueuePermit<'q> {
    queue: &'q BuildQueue,
    ticket: u64,
}

impl QueuePermit<'_> {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }
}

impl Drop for QueuePermit<'_> {
    fn drop(&mut self) {
        self.queue.release(self.ticket);
    }
}
