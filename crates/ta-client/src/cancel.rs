//! Cooperative cancellation.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared cancellation signal, checked at every suspension point.
///
/// Cancellation is cooperative: setting the flag does not preempt anything,
/// it only makes the next check abort.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Signals cancellation to every clone of this token.
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }

    /// Whether cancellation was signalled.
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// A receiver that resolves when cancellation is signalled, for use in
    /// `select!` arms.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
