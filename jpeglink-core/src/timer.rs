use std::time::Duration;

use tokio::task::JoinHandle;

use crate::transfer::TimeoutToken;

struct ArmedTimeout {
    token: TimeoutToken,
    handle: JoinHandle<()>,
}

/// Single-slot inactivity timer.
///
/// Arming aborts whatever is already armed before storing the new sleep
/// task, so at most one timer is outstanding. The callback receives the
/// token it was armed with; the owner must check it with [`fired`] before
/// acting on it.
///
/// [`fired`]: TimeoutSlot::fired
#[derive(Default)]
pub struct TimeoutSlot {
    armed: Option<ArmedTimeout>,
}

impl TimeoutSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a sleep task that calls `on_fire(token)` after `after`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&mut self, token: TimeoutToken, after: Duration, on_fire: F)
    where
        F: FnOnce(TimeoutToken) + Send + 'static,
    {
        self.cancel();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            on_fire(token);
        });
        self.armed = Some(ArmedTimeout { token, handle });
    }

    /// Returns `true` if a timer was armed.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                armed.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn token(&self) -> Option<TimeoutToken> {
        self.armed.as_ref().map(|a| a.token)
    }

    /// Clear the slot for a firing. Returns `false` for a superseded or
    /// cancelled token, which the caller must then ignore.
    pub fn fired(&mut self, token: TimeoutToken) -> bool {
        if self.token() == Some(token) {
            self.armed = None;
            true
        } else {
            false
        }
    }
}

impl Drop for TimeoutSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimeoutSlot::new();
        let token = TimeoutToken::from_id(1);

        slot.arm(token, Duration::from_millis(350), move |t| {
            let _ = tx.send(t);
        });
        tokio::time::sleep(Duration::from_millis(349)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.recv().await, Some(token));
        assert!(slot.fired(token));
        assert!(!slot.fired(token));
        assert_eq!(slot.token(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_cancels_previous() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimeoutSlot::new();

        let first = TimeoutToken::from_id(1);
        let second = TimeoutToken::from_id(2);
        let tx2 = tx.clone();
        slot.arm(first, Duration::from_millis(350), move |t| {
            let _ = tx.send(t);
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        slot.arm(second, Duration::from_millis(350), move |t| {
            let _ = tx2.send(t);
        });

        assert_eq!(rx.recv().await, Some(second));
        assert!(!slot.fired(first));
        assert!(slot.fired(second));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TimeoutToken>();
        let mut slot = TimeoutSlot::new();
        slot.arm(TimeoutToken::from_id(7), Duration::from_millis(10), move |t| {
            let _ = tx.send(t);
        });

        assert!(slot.cancel());
        assert!(!slot.cancel());
        assert!(rx.recv().await.is_none());
    }
}
