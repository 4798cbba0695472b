//! Single-writer insert queue.
//!
//! All inserts for one activation go through one task, so row IDs follow the
//! order in which samples were submitted. Submitting never blocks; storage
//! failures are logged and the sample is dropped.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use tracklog_types::SpeedSample;

use crate::sample_store::SampleStore;

/// Handle for enqueueing samples to the writer task.
#[derive(Debug, Clone)]
pub struct SampleWriter {
    tx: mpsc::UnboundedSender<SpeedSample>,
}

impl SampleWriter {
    /// Spawn the writer task on `tracker`.
    ///
    /// The task exits when `token` is cancelled or every handle has been
    /// dropped. Samples still queued at cancellation are discarded; an insert
    /// already in progress completes.
    pub fn spawn(store: SampleStore, tracker: &TaskTracker, token: CancellationToken) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<SpeedSample>();

        tracker.spawn(async move {
            loop {
                let sample = tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Sample writer cancelled");
                        break;
                    }
                    next = rx.recv() => match next {
                        Some(sample) => sample,
                        None => {
                            debug!("Sample writer queue closed");
                            break;
                        }
                    },
                };

                // Outside the select so cancellation cannot abort a started insert
                match store.insert(sample).await {
                    Ok(stored) => debug!("Stored sample {} ({} m/s)", stored.id, stored.speed),
                    Err(e) => warn!("Failed to store sample at {}: {}", sample.timestamp, e),
                }
            }

            let discarded = rx.len();
            if discarded > 0 {
                debug!("Discarded {} queued samples", discarded);
            }
        });

        Self { tx }
    }

    /// Enqueue a sample. Returns `false` if the writer has shut down.
    pub fn submit(&self, sample: SpeedSample) -> bool {
        self.tx.send(sample).is_ok()
    }

    /// Whether the writer task is still accepting samples.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}
