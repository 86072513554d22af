//! Cooperative cancellation for one fill batch
//!
//! The flag is only consulted at checkpoints (row and field boundaries, and
//! every wait on the host), so a write that has started always completes.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// Why a batch stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The host raised a blocking dialog; carries its message
    HostSignal(String),
    /// The caller requested a stop
    Stopped,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostSignal(message) => write!(f, "aborted by host signal: {}", message),
            Self::Stopped => write!(f, "stopped by user"),
        }
    }
}

/// Shared abort flag; clones observe the same state
///
/// Once set the flag never clears. The first reason recorded wins.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<AbortReason>>>,
    notify: Arc<Notify>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a host-originated blocking condition
    pub fn trigger(&self, message: impl Into<String>) {
        self.set(AbortReason::HostSignal(message.into()));
    }

    /// External stop request
    pub fn stop(&self) {
        self.set(AbortReason::Stopped);
    }

    fn set(&self, reason: AbortReason) {
        let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            log::debug!("Abort requested: {}", reason);
            *slot = Some(reason);
        }
        self.flag.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Resolves once the flag is set; immediately if it already is
    pub async fn aborted(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    pub fn reason(&self) -> Option<AbortReason> {
        self.reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_clear() {
        let handle = AbortHandle::new();
        assert!(!handle.is_aborted());
        assert_eq!(handle.reason(), None);
    }

    #[test]
    fn test_clones_share_state() {
        let handle = AbortHandle::new();
        let observer = handle.clone();
        handle.trigger("Stock is insufficient");
        assert!(observer.is_aborted());
        assert_eq!(
            observer.reason(),
            Some(AbortReason::HostSignal("Stock is insufficient".to_string()))
        );
    }

    #[test]
    fn test_first_reason_wins() {
        let handle = AbortHandle::new();
        handle.stop();
        handle.trigger("late dialog");
        assert_eq!(handle.reason(), Some(AbortReason::Stopped));
        assert!(handle.is_aborted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_wakes_waiter() {
        let handle = AbortHandle::new();
        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.aborted().await }
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        handle.trigger("Price list changed");
        waiter.await.unwrap();

        // Already set: resolves without waiting
        handle.aborted().await;
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            AbortReason::HostSignal("Session expired".to_string()).to_string(),
            "aborted by host signal: Session expired"
        );
    }
}
