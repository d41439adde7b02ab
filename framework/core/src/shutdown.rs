use std::sync::Arc;

use tokio::sync::broadcast::{error::TryRecvError, Receiver, Sender};
use tokio::sync::Mutex;

/// Broadcasts a single "stop now" signal to every listener.
///
/// Both harnesses hold one of these: the stop test uses it to end a sweep between runs, the
/// scenario runner uses it to cancel the step in flight and skip the remaining scenarios.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<()>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
        }
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.sender.send(()) {
            // Fails when nobody is listening, which is fine.
            log::warn!("Failed to send shutdown signal: {e:?}");
        }
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Arc<Mutex<Receiver<()>>>,
    triggered: bool,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<()>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
            triggered: false,
        }
    }

    /// Point in time check if the shutdown signal has been received. Once this has returned true
    /// it keeps returning true.
    pub fn should_shutdown(&mut self) -> bool {
        if self.triggered {
            return true;
        }

        let triggered = match self.receiver.try_lock() {
            Ok(mut guard) => match guard.try_recv() {
                Ok(_) | Err(TryRecvError::Closed) => true,
                // Empty or lagged, keep going.
                Err(_) => false,
            },
            Err(_) => false,
        };
        self.triggered = triggered;
        triggered
    }

    /// Wait for the shutdown signal. It is safe to race this with another future so that the
    /// shutdown signal can cancel work in progress.
    pub async fn wait_for_shutdown(&mut self) {
        if self.triggered {
            return;
        }

        // A closed channel means the handle is gone, which is treated as a shutdown.
        let _ = self.receiver.lock().await.recv().await;
        self.triggered = true;
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_sees_shutdown_and_stays_triggered() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        assert!(!listener.should_shutdown());
        handle.shutdown();
        assert!(listener.should_shutdown());
        assert!(listener.should_shutdown());
    }

    #[test]
    fn dropped_handle_counts_as_shutdown() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();
        drop(handle);

        assert!(listener.should_shutdown());
    }

    #[tokio::test]
    async fn wait_for_shutdown_completes_after_signal() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        let waiter = tokio::spawn(async move {
            listener.wait_for_shutdown().await;
            listener.should_shutdown()
        });
        tokio::task::yield_now().await;
        handle.shutdown();

        assert!(waiter.await.unwrap());
    }

    #[test]
    fn shutdown_signal_error_message() {
        assert_eq!(
            ShutdownSignalError::default().to_string(),
            "Execution cancelled by shutdown signal"
        );
    }
}
