//! Latest-selection-wins guard for concurrent fetches.
//!
//! Every time the user picks a run, test or session, a fetch starts. Fetches
//! may finish out of order; only the result for the most recent selection
//! should be shown. [`SelectionGuard`] hands out a [`Ticket`] per selection and
//! refuses to commit results whose ticket has been superseded.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one selection made through a [`SelectionGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Generation counter shared by every fetch for one view.
#[derive(Debug, Clone, Default)]
pub struct SelectionGuard {
    generation: Arc<AtomicU64>,
}

impl SelectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new selection, superseding every earlier ticket.
    pub fn select(&self) -> Ticket {
        Ticket(self.generation.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generation.load(Ordering::Acquire) == ticket.0
    }

    /// Returns `value` if `ticket` is still the latest selection, `None` otherwise.
    pub fn commit<T>(&self, ticket: Ticket, value: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            tracing::debug!(
                ticket = ticket.0,
                current = self.generation.load(Ordering::Acquire),
                "Discarding result of superseded selection"
            );
            None
        }
    }

    /// Makes a new selection, awaits `fetch`, and commits its output.
    pub async fn latest<F>(&self, fetch: F) -> Option<F::Output>
    where
        F: Future,
    {
        let ticket = self.select();
        let value = fetch.await;
        self.commit(ticket, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[test]
    fn test_newest_ticket_is_current() {
        let guard = SelectionGuard::new();
        let first = guard.select();
        assert!(guard.is_current(first));

        let second = guard.select();
        assert!(!guard.is_current(first));
        assert!(guard.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn test_commit_discards_stale_results() {
        let guard = SelectionGuard::new();
        let run_a = guard.select();
        let run_b = guard.select();

        assert_eq!(guard.commit(run_a, "run A"), None);
        assert_eq!(guard.commit(run_b, "run B"), Some("run B"));
    }

    #[test]
    fn test_clones_share_generation() {
        let guard = SelectionGuard::new();
        let ticket = guard.select();
        let other = guard.clone();
        other.select();

        assert!(!guard.is_current(ticket));
    }

    #[tokio::test]
    async fn test_latest_out_of_order_completion() {
        let guard = SelectionGuard::new();
        let (slow_tx, slow_rx) = oneshot::channel::<&str>();

        let slow_guard = guard.clone();
        let slow = tokio::spawn(async move {
            slow_guard
                .latest(async move { slow_rx.await.unwrap_or_default() })
                .await
        });
        tokio::task::yield_now().await;
        // The slow fetch must have taken its ticket before the fast one starts.
        while guard.generation.load(Ordering::Acquire) == 0 {
            tokio::task::yield_now().await;
        }

        let fast = guard.latest(async { "session 2" }).await;
        slow_tx.send("session 1").unwrap();

        assert_eq!(fast, Some("session 2"));
        assert_eq!(slow.await.unwrap(), None);
    }
}
