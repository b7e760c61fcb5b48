//! Expiry Scheduler
//!
//! At most one timer is outstanding. Arming replaces the previous timer
//! instead of stacking a second one. A fire is delivered to the worker as
//! `Input::Expired` carrying the ticket it was armed with, and only the
//! currently armed ticket is honoured; anything else was cancelled or
//! replaced while in flight.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::worker::Input;

pub(crate) struct ExpiryScheduler {
    inputs: mpsc::UnboundedSender<Input>,
    next_ticket: u64,
    armed: Option<u64>,
    pending: Option<JoinHandle<()>>,
}

impl ExpiryScheduler {
    pub(crate) fn new(inputs: mpsc::UnboundedSender<Input>) -> Self {
        Self {
            inputs,
            next_ticket: 0,
            armed: None,
            pending: None,
        }
    }

    /// Cancel any pending timer and schedule a fire after `after`
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn arm(&mut self, after: Duration) -> u64 {
        self.cancel();

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let deadline = Instant::now() + after;
        let inputs = self.inputs.clone();

        self.pending = Some(tokio::spawn(async move {
            time::sleep_until(deadline).await;
            let _ = inputs.send(Input::Expired { ticket });
        }));
        self.armed = Some(ticket);

        tracing::trace!("Expiry armed: ticket {} in {:?}", ticket, after);
        ticket
    }

    /// Clear the pending timer, if any
    pub(crate) fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        if let Some(ticket) = self.armed.take() {
            tracing::trace!("Expiry cancelled: ticket {}", ticket);
        }
    }

    /// Accept a fire for `ticket`, returning whether it is the armed one
    ///
    /// An accepted fire moves the scheduler back to idle.
    pub(crate) fn fire(&mut self, ticket: u64) -> bool {
        if self.armed != Some(ticket) {
            return false;
        }
        self.armed = None;
        self.pending = None;
        true
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Let spawned timer tasks run without moving the paused clock
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn expired(rx: &mut mpsc::UnboundedReceiver<Input>) -> Vec<u64> {
        let mut tickets = Vec::new();
        while let Ok(input) = rx.try_recv() {
            if let Input::Expired { ticket } = input {
                tickets.push(ticket);
            }
        }
        tickets
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut expiry = ExpiryScheduler::new(tx);

        let ticket = expiry.arm(Duration::from_millis(30_000));
        assert!(expiry.is_armed());

        time::advance(Duration::from_millis(29_999)).await;
        settle().await;
        assert!(expired(&mut rx).is_empty());

        time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(expired(&mut rx), vec![ticket]);

        assert!(expiry.fire(ticket));
        assert!(!expiry.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut expiry = ExpiryScheduler::new(tx);

        let first = expiry.arm(Duration::from_secs(30));
        time::advance(Duration::from_secs(1)).await;
        let second = expiry.arm(Duration::from_secs(30));
        assert_ne!(first, second);

        time::advance(Duration::from_secs(29)).await;
        settle().await;
        assert!(expired(&mut rx).is_empty());

        time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(expired(&mut rx), vec![second]);

        // The replaced ticket is never honoured
        assert!(!expiry.fire(first));
        assert!(expiry.fire(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut expiry = ExpiryScheduler::new(tx);

        // Idle cancel is harmless
        expiry.cancel();

        let ticket = expiry.arm(Duration::from_secs(30));
        expiry.cancel();
        assert!(!expiry.is_armed());

        time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert!(expired(&mut rx).is_empty());
        assert!(!expiry.fire(ticket));
    }
}
