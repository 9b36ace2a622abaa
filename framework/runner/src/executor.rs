use std::future::Future;
use std::time::Duration;

use gale_core::prelude::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};

#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// Note that the future will be cancelled if the run is cancelled. You do not need to do anything
    /// special to handle this, but you should be aware that submitting a future which does not support
    /// cancelling may prevent the runner from shutting down.
    ///
    /// In VU behaviours prefer [crate::context::VuContext::execute], which also responds to the
    /// scheduler stopping the VU and lets in-flight requests drain.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Run async code in place, blocking until it completes, and let it drain on shutdown.
    ///
    /// If `shutdown_listener` has already fired the future is not started. If it fires while the
    /// future is running, the future gets up to `grace` to complete before it is dropped. Either
    /// way a [ShutdownSignalError] is returned in place of the result.
    pub fn execute_draining<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
        mut shutdown_listener: DelegatedShutdownListener,
        grace: Duration,
    ) -> anyhow::Result<T> {
        if shutdown_listener.should_shutdown() {
            return Err(anyhow::anyhow!(ShutdownSignalError::default()));
        }

        self.runtime.block_on(async move {
            tokio::pin!(fut);
            tokio::select! {
                result = &mut fut => return result,
                _ = shutdown_listener.wait_for_shutdown() => {},
            }

            match tokio::time::timeout(grace, fut).await {
                Ok(result) => result,
                Err(_) => {
                    log::warn!(
                        "Abandoned an in-flight request after the {}ms graceful stop period",
                        grace.as_millis()
                    );
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                }
            }
        })
    }

    /// Sleep for `duration`, waking early if `shutdown_listener` fires.
    ///
    /// Returns `true` if the full duration elapsed.
    pub fn sleep_or_shutdown(
        &self,
        duration: Duration,
        shutdown_listener: &mut DelegatedShutdownListener,
    ) -> bool {
        self.runtime.block_on(async {
            tokio::select! {
                _ = tokio::time::sleep(duration) => true,
                _ = shutdown_listener.wait_for_shutdown() => false,
            }
        })
    }

    /// Submit async code to be run in the background.
    ///
    /// Note that the future will not be cancelled if the run is cancelled. It is also not guaranteed
    /// that the runner will wait for the future to complete before shutting down.
    ///
    /// In VU behaviours, you should use [crate::context::VuContext::execute] instead of
    /// [Executor::spawn] to ensure that your future completes before the iteration completes and
    /// the next one is started.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }

    pub fn handle(&self) -> &tokio::runtime::Handle {
        self.runtime.handle()
    }
}
