use std::sync::Arc;

use tokio::sync::watch;

/// A handle that can signal shutdown to any number of listeners.
///
/// The signal is level triggered: a listener created after [ShutdownHandle::shutdown] was called
/// still observes the shutdown. The runner keeps one handle for the whole run and one handle per
/// VU, so the scheduler can stop individual VUs while a run-level cancellation stops everything.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn shutdown(&self) {
        if !self.sender.send_replace(true) {
            log::trace!("Shutdown signalled");
        }
    }

    /// Point in time check of whether [ShutdownHandle::shutdown] has been called.
    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: watch::Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Point in time check if the shutdown signal has been received. If this returns true then work
    /// should be stopped so that the scenario can shut down.
    pub fn should_shutdown(&self) -> bool {
        *self.receiver.borrow() || self.receiver.has_changed().is_err()
    }

    /// Wait for the shutdown signal to be received. It is safe to race this with another future so
    /// that the shutdown signal can be used to cancel other work in progress.
    ///
    /// Returns immediately if the signal was already sent, or if the handle has been dropped.
    pub async fn wait_for_shutdown(&mut self) {
        // An error means every handle is gone, which nothing can recover from, so treat it as a
        // shutdown too.
        let _ = self.receiver.wait_for(|shutdown| *shutdown).await;
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
