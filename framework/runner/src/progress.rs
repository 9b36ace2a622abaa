use std::cmp::min;
use std::fmt::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use gale_core::prelude::DelegatedShutdownListener;
use gale_instruments::Reporter;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};

/// Displays a progress bar while the run is in progress, showing how long is left along with the
/// live VU count and request totals.
///
/// The totals are read from the live aggregates and have no effect on the outcome of the run.
pub(crate) fn start_progress(
    planned_runtime: Duration,
    active_vus: Arc<AtomicUsize>,
    reporter: Arc<Reporter>,
    shutdown_listener: DelegatedShutdownListener,
) -> anyhow::Result<()> {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}] {msg}",
    )
    .context("Failed to set progress style")?
    .with_key("planned_runtime", {
        let hours = planned_runtime.as_secs() / 3600;
        let minutes = (planned_runtime.as_secs() % 3600) / 60;
        let seconds = planned_runtime.as_secs() % 60;
        move |_state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds);
        }
    })
    .progress_chars("#>-");

    std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let pb = ProgressBar::new(planned_runtime.as_secs());
            pb.set_style(style);

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                let totals = reporter.recorder().totals();
                pb.set_message(format!(
                    "vus: {}, requests: {}, failed: {}",
                    active_vus.load(Ordering::Relaxed),
                    totals.attempts,
                    totals.failures
                ));
                pb.set_position(min(
                    start_time.elapsed().as_secs(),
                    planned_runtime.as_secs(),
                ));
                std::thread::sleep(Duration::from_millis(500));
            }
        })
        .context("Failed to start progress thread")?;

    Ok(())
}
