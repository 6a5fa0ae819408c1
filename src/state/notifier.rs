use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use tokio::sync::Notify;

/// Parking spot of one player blocked in matchmaking.
#[derive(Default)]
pub struct Waiter {
    wake: Notify,
    left: AtomicBool,
}

impl Waiter {
    /// Resolves on the next wake-up, or immediately if one arrived while nobody waited.
    pub async fn notified(&self) {
        self.wake.notified().await;
    }

    /// Whether the player asked to leave the queue.
    pub fn has_left(&self) -> bool {
        self.left.load(Ordering::Acquire)
    }
}

/// Wakes players blocked in matchmaking when another request pairs them or they leave.
///
/// Only covers waiters on this node; the shared-store pointer poll catches pairings made
/// elsewhere.
#[derive(Default)]
pub struct PairingNotifier {
    waiters: DashMap<String, Arc<Waiter>>,
}

impl PairingNotifier {
    /// Notifier without waiters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle the waiting request parks on; created on first use.
    pub fn register(&self, player: &str) -> Arc<Waiter> {
        let waiter = self
            .waiters
            .entry(player.to_owned())
            .or_default()
            .clone();
        waiter.left.store(false, Ordering::Release);
        waiter
    }

    /// Wake `player` if it is waiting here.
    pub fn notify(&self, player: &str) -> bool {
        match self.waiters.get(player) {
            Some(waiter) => {
                waiter.wake.notify_one();
                true
            }
            None => false,
        }
    }

    /// Flag `player` as gone and wake it.
    pub fn leave(&self, player: &str) -> bool {
        match self.waiters.get(player) {
            Some(waiter) => {
                waiter.left.store(true, Ordering::Release);
                waiter.wake.notify_one();
                true
            }
            None => false,
        }
    }

    /// Forget the waiter of `player`.
    pub fn release(&self, player: &str) {
        self.waiters.remove(player);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn early_notification_is_not_lost() {
        let notifier = PairingNotifier::new();
        let waiter = notifier.register("alice");
        assert!(notifier.notify("alice"));

        tokio::time::timeout(Duration::from_millis(50), waiter.notified())
            .await
            .expect("stored permit wakes the waiter");

        notifier.release("alice");
        assert!(!notifier.notify("alice"));
    }

    #[tokio::test]
    async fn leave_flags_and_wakes() {
        let notifier = PairingNotifier::new();
        let waiter = notifier.register("bob");
        assert!(!waiter.has_left());

        assert!(notifier.leave("bob"));
        tokio::time::timeout(Duration::from_millis(50), waiter.notified())
            .await
            .expect("leave wakes the waiter");
        assert!(waiter.has_left());

        assert!(!notifier.register("bob").has_left());
    }
}
