use crate::outcome::RequestOutcome;
use crate::report::ReportCollector;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// How long [OutcomeFileReportCollector::finalize] waits for buffered outcomes to hit the disk.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

enum FileCommand {
    Write(Box<RequestOutcome>),
    Close,
}

/// Append every request outcome to a JSON lines file named `<scenario>-<run id>.jsonl`.
///
/// Writing happens on a background task so that VUs only pay for a channel send.
pub struct OutcomeFileReportCollector {
    path: PathBuf,
    join_handle: JoinHandle<()>,
    writer: UnboundedSender<FileCommand>,
    flush_complete: Arc<AtomicBool>,
}

impl OutcomeFileReportCollector {
    pub fn new(
        runtime: &tokio::runtime::Handle,
        dir: PathBuf,
        scenario_name: &str,
        run_id: &str,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create outcome directory {}", dir.display()))?;
        let path = dir.join(format!("{scenario_name}-{run_id}.jsonl"));
        let file = std::fs::File::options()
            .create_new(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to create outcome file {}", path.display()))?;

        let flush_complete = Arc::new(AtomicBool::new(false));
        let (writer, receiver) = tokio::sync::mpsc::unbounded_channel();
        let join_handle = runtime.spawn(write_outcomes(
            File::from_std(file),
            receiver,
            flush_complete.clone(),
        ));

        Ok(Self {
            path,
            join_handle,
            writer,
            flush_complete,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportCollector for OutcomeFileReportCollector {
    fn add_outcome(&mut self, outcome: &RequestOutcome) {
        if self
            .writer
            .send(FileCommand::Write(Box::new(outcome.clone())))
            .is_err()
        {
            log::warn!(
                "Dropped outcome because the writer for {} has stopped",
                self.path.display()
            );
        }
    }

    fn finalize(&self) {
        if self.writer.send(FileCommand::Close).is_err() {
            log::debug!("Outcome writer already closed");
        }

        let wait_started = Instant::now();
        while !self.flush_complete.load(Ordering::Acquire) {
            // If the write task has exited then there's no point trying to wait for it any longer.
            if self.join_handle.is_finished() {
                break;
            }

            if wait_started.elapsed() > FLUSH_TIMEOUT {
                log::warn!(
                    "Gave up waiting for outcomes to flush to {} after {}s",
                    self.path.display(),
                    FLUSH_TIMEOUT.as_secs()
                );
                break;
            }

            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

async fn write_outcomes(
    file: File,
    mut receiver: UnboundedReceiver<FileCommand>,
    flush_complete: Arc<AtomicBool>,
) {
    let mut file = BufWriter::new(file);
    let mut written = 0usize;

    while let Some(command) = receiver.recv().await {
        match command {
            FileCommand::Write(outcome) => {
                if let Err(e) = write_outcome(&mut file, &outcome).await {
                    log::error!("Failed to write outcome, stopping outcome writer: {e:?}");
                    break;
                }
                written += 1;
            }
            FileCommand::Close => break,
        }
    }

    if let Err(e) = file.flush().await {
        log::error!("Failed to flush outcomes: {e:?}");
    }

    log::debug!("Outcome writer finished after {written} outcomes");
    flush_complete.store(true, Ordering::Release);
}

#[inline]
async fn write_outcome(
    writer: &mut BufWriter<File>,
    outcome: &RequestOutcome,
) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(outcome)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    Ok(())
}
