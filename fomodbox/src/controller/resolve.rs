//! Single-assignment launch resolution.

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// A value that can be set at most once, by whichever observer gets there
/// first. Later attempts are ignored.
pub(crate) struct ResolveOnce<T> {
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> ResolveOnce<T> {
    pub(crate) fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Set the value. Returns `false` if it was already set.
    pub(crate) fn resolve(&self, value: T) -> bool {
        match self.tx.lock().take() {
            // a dropped receiver still counts as resolved
            Some(tx) => {
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn is_resolved(&self) -> bool {
        self.tx.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_resolution_wins() {
        let (once, rx) = ResolveOnce::new();
        assert!(!once.is_resolved());
        assert!(once.resolve(1));
        assert!(!once.resolve(2));
        assert!(once.is_resolved());
        assert_eq!(rx.await.unwrap(), 1);
    }

    #[test]
    fn test_resolve_after_receiver_dropped() {
        let (once, rx) = ResolveOnce::new();
        drop(rx);
        assert!(once.resolve("late"));
        assert!(!once.resolve("later"));
    }
}
