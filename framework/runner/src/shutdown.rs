use gale_core::prelude::ShutdownHandle;
use tokio::signal;

/// Cancel the run when the user presses Ctrl-C.
pub(crate) fn start_shutdown_listener(runtime: &tokio::runtime::Runtime) -> ShutdownHandle {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C, the run can only end on schedule: {e:?}");
            return;
        }
        listener_handle.shutdown();
        println!("Received shutdown signal, shutting down...");
    });

    handle
}
