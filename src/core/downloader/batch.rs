use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use super::client::Downloader;
use super::speed::{SpeedEstimator, SPEED_TICK, SPEED_WINDOW};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::events::InstallEvent;

/// One download-ready artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    pub url: String,
    pub destination_folder: PathBuf,
    pub destination_path: PathBuf,
    pub file_name: String,
    /// Advisory only, used for progress totals.
    pub expected_size: u64,
}

/// Descriptors fetched together under a shared byte total and concurrency limit.
#[derive(Debug, Clone)]
pub struct DownloadBatch {
    pub descriptors: Vec<ArtifactDescriptor>,
    pub total_size: u64,
    pub concurrency: usize,
    /// Label attached to the batch's progress events.
    pub label: String,
}

impl DownloadBatch {
    /// Batch whose total is the sum of the descriptors' expected sizes.
    pub fn new(descriptors: Vec<ArtifactDescriptor>, concurrency: usize, label: &str) -> Self {
        let total_size = descriptors.iter().map(|d| d.expected_size).sum();
        Self {
            descriptors,
            total_size,
            concurrency,
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub skipped: usize,
    pub bytes: u64,
}

/// State shared by the worker slots of one batch.
struct BatchState<'a> {
    queue: Mutex<VecDeque<ArtifactDescriptor>>,
    downloaded: AtomicU64,
    report: Mutex<BatchReport>,
    failed: Mutex<Vec<String>>,
    total: u64,
    label: &'a str,
}

impl BatchState<'_> {
    fn next(&self) -> Option<ArtifactDescriptor> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

impl Downloader {
    // ── Batch downloads ─────────────────────────────────

    /// Fetch every descriptor with at most `batch.concurrency` transfers in
    /// flight. Each worker slot pulls the next queued descriptor as soon as its
    /// current one finishes; all slots are polled on the calling task.
    ///
    /// A failed member is reported through an `error` event and does not stop
    /// its siblings. Once every member has settled the batch fails with
    /// [`InstallerError::BatchIncomplete`] if any of them failed.
    pub async fn fetch_batch(&self, batch: DownloadBatch) -> InstallerResult<BatchReport> {
        let count = batch.descriptors.len();
        if count == 0 {
            return Ok(BatchReport::default());
        }

        let slots = batch.concurrency.clamp(1, count);
        info!(
            "Starting batch download: {} files, {} bytes, concurrency={}",
            count, batch.total_size, slots
        );

        let state = BatchState {
            queue: Mutex::new(batch.descriptors.into()),
            downloaded: AtomicU64::new(0),
            report: Mutex::new(BatchReport::default()),
            failed: Mutex::new(Vec::new()),
            total: batch.total_size,
            label: &batch.label,
        };

        {
            let workers = join_all((0..slots).map(|_| self.batch_worker(&state)));
            tokio::pin!(workers);

            let mut estimator = SpeedEstimator::new(SPEED_WINDOW);
            let mut ticker = interval_at(Instant::now() + SPEED_TICK, SPEED_TICK);
            let mut last_tick = Instant::now();

            loop {
                tokio::select! {
                    _ = &mut workers => break,
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let sample = estimator.tick(
                            state.downloaded.load(Ordering::Relaxed),
                            now - last_tick,
                            state.total,
                        );
                        last_tick = now;
                        self.events().emit(InstallEvent::Speed(sample.speed));
                        self.events().emit(InstallEvent::Estimated(sample.remaining));
                    }
                }
            }
        }

        let failed = state
            .failed
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if !failed.is_empty() {
            return Err(InstallerError::BatchIncomplete { failed });
        }

        let report = state
            .report
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        info!(
            "Batch complete: {} fetched, {} already present",
            report.fetched, report.skipped
        );
        Ok(report)
    }

    async fn batch_worker(&self, state: &BatchState<'_>) {
        while let Some(descriptor) = state.next() {
            if tokio::fs::try_exists(&descriptor.destination_path)
                .await
                .unwrap_or(false)
            {
                debug!("Already present: {:?}", descriptor.destination_path);
                state
                    .report
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .skipped += 1;
                continue;
            }

            let result = async {
                let response = self.open(&descriptor.url).await?;
                self.write_stream(response, &descriptor.destination_path, |chunk| {
                    let now = state.downloaded.fetch_add(chunk, Ordering::Relaxed) + chunk;
                    self.events().progress(now, state.total, state.label);
                })
                .await
            }
            .await;

            match result {
                Ok(bytes) => {
                    debug!("Downloaded: {} -> {:?}", descriptor.url, descriptor.destination_path);
                    let mut report = state.report.lock().unwrap_or_else(PoisonError::into_inner);
                    report.fetched += 1;
                    report.bytes += bytes;
                }
                Err(e) => {
                    warn!("Download failed for {}: {}", descriptor.file_name, e);
                    self.events()
                        .error(format!("{}: {}", descriptor.file_name, e));
                    state
                        .failed
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(descriptor.file_name.clone());
                }
            }
        }
    }
}
