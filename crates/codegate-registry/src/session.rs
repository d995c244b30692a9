//! Inactivity protection
//!
//! One re-armable countdown guards the session. Every qualifying user
//! interaction re-arms it; if it fires, the session token is cleared while
//! the remembered code is kept, so the user re-validates with the code
//! prefilled.

use crate::storage::GateStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

/// What the countdown found when it expired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExpiry {
    /// A code was remembered; the front-end should start over with the
    /// code prefilled
    CodeRetained,
    /// Nothing was remembered; nothing to do
    NoCode,
}

/// Handle used to report user activity to a running monitor
#[derive(Clone)]
pub struct ActivityHandle {
    notify: Arc<Notify>,
}

impl ActivityHandle {
    /// Re-arm the countdown
    pub fn record_activity(&self) {
        self.notify.notify_one();
    }
}

/// The single re-armable inactivity countdown.
///
/// [`run`](Self::run) resolves when the timeout elapses with no activity,
/// after clearing the session token. Only the token is cleared; the
/// remembered code and the device registrations stay.
pub struct InactivityMonitor {
    timeout: Duration,
    notify: Arc<Notify>,
}

impl InactivityMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            notify: Arc::new(Notify::new()),
        }
    }

    /// A handle for reporting activity; cheap to clone
    pub fn handle(&self) -> ActivityHandle {
        ActivityHandle {
            notify: self.notify.clone(),
        }
    }

    /// Run the countdown until it expires.
    ///
    /// Each recorded activity cancels the pending countdown and starts a
    /// fresh one. On expiry the session token is cleared and the outcome
    /// reports whether a code was remembered.
    pub async fn run(&self, storage: Arc<GateStorage>) -> SessionExpiry {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.timeout) => {
                    let had_code = storage.current_code().await.is_some();
                    storage.clear_session_token().await;
                    info!("Session expired after inactivity");
                    return if had_code {
                        SessionExpiry::CodeRetained
                    } else {
                        SessionExpiry::NoCode
                    };
                }
                _ = self.notify.notified() => {
                    // Activity: re-arm
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_clears_token_keeps_code() {
        let storage = Arc::new(GateStorage::in_memory());
        storage.set_current_code("Q9R1".into()).await.unwrap();
        storage.set_session_token("tok".into()).await;

        let monitor = InactivityMonitor::new(Duration::from_secs(600));
        let expiry = monitor.run(storage.clone()).await;

        assert_eq!(expiry, SessionExpiry::CodeRetained);
        assert_eq!(storage.session_token().await, None);
        assert_eq!(storage.current_code().await.as_deref(), Some("Q9R1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_without_code() {
        let storage = Arc::new(GateStorage::in_memory());
        storage.set_session_token("tok".into()).await;

        let monitor = InactivityMonitor::new(Duration::from_secs(600));
        assert_eq!(monitor.run(storage.clone()).await, SessionExpiry::NoCode);
        assert_eq!(storage.session_token().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_rearms_countdown() {
        let storage = Arc::new(GateStorage::in_memory());
        storage.set_session_token("tok".into()).await;

        let monitor = InactivityMonitor::new(Duration::from_secs(600));
        let handle = monitor.handle();

        let run = tokio::spawn({
            let storage = storage.clone();
            async move { monitor.run(storage).await }
        });

        // Activity at the nine-minute mark pushes expiry out
        tokio::time::sleep(Duration::from_secs(540)).await;
        handle.record_activity();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!run.is_finished());
        assert!(storage.session_token().await.is_some());

        // Silence from here: the countdown runs out
        tokio::time::sleep(Duration::from_secs(600)).await;
        run.await.unwrap();
        assert_eq!(storage.session_token().await, None);
    }
}
