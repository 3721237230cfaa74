use std::sync::Arc;

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use futures::executor::block_on;

type LatchedSignal = Signal<CriticalSectionRawMutex, ()>;

/// Binary, latching signal. A notification sent while nobody waits is kept until the next
/// wait, and several notifications before a wait collapse into one.
pub struct Notification {
    notif: Arc<LatchedSignal>,
}

/// Sending half of a [Notification]. Safe to use from interrupt context.
#[derive(Clone)]
pub struct Notifier {
    notif: Arc<LatchedSignal>,
}

impl Notification {
    pub fn new() -> Self {
        Self {
            notif: Arc::new(Signal::new()),
        }
    }

    pub async fn wait(&self) {
        self.notif.wait().await;
    }

    pub fn blocking_wait(&self) {
        block_on(self.notif.wait());
    }

    /// Whether a notification is waiting to be consumed.
    pub fn is_pending(&self) -> bool {
        self.notif.signaled()
    }

    pub fn notifier(&self) -> Notifier {
        Notifier::from(self)
    }
}

impl Default for Notification {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&Notification> for Notifier {
    fn from(value: &Notification) -> Self {
        Self {
            notif: value.notif.clone(),
        }
    }
}

impl Notifier {
    pub fn notify(&self) {
        self.notif.signal(());
    }
}

#[cfg(test)]
mod test {
    use std::{thread, time::Duration};

    use super::*;

    #[test]
    fn test0_notification_sent_before_waiting_is_kept() {
        let notification = Notification::new();
        notification.notifier().notify();
        assert!(notification.is_pending());
        notification.blocking_wait();
        assert!(!notification.is_pending());
    }

    #[test]
    fn test1_repeated_notifications_collapse_into_one() {
        let notification = Notification::new();
        let notifier = notification.notifier();
        notifier.notify();
        notifier.notify();
        notification.blocking_wait();
        assert!(!notification.is_pending());
    }

    #[test]
    fn test2_waiter_is_woken_from_another_thread() {
        let notification = Notification::new();
        let notifier = notification.notifier();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            notifier.notify();
        });
        notification.blocking_wait();
        handle.join().unwrap();
    }
}
