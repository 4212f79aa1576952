use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use md5::Md5;
use reqwest::{Client, Response};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::core::error::{InstallerError, InstallerResult};
use crate::core::events::EventSink;
use crate::core::http::header_content_length;

const DEFAULT_CONCURRENCY: usize = 5;
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Digest algorithms accepted for integrity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

/// First mirror that answered a metadata probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorHit {
    pub url: String,
    pub size: u64,
}

/// Mirror-aware streaming downloader.
pub struct Downloader {
    client: Client,
    /// Default batch concurrency.
    concurrency: usize,
    probe_timeout: Duration,
    events: EventSink,
}

impl Downloader {
    pub fn new(client: Client, events: EventSink) -> Self {
        Self {
            client,
            concurrency: DEFAULT_CONCURRENCY,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            events,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    // ── Single file download ────────────────────────────

    /// Stream `url` into `dest_folder/file_name`, emitting cumulative progress
    /// against the response's declared size (0 when the server sent none).
    ///
    /// Returns the number of bytes written.
    pub async fn fetch_one(
        &self,
        url: &str,
        dest_folder: &Path,
        file_name: &str,
    ) -> InstallerResult<u64> {
        let dest = dest_folder.join(file_name);
        let response = self.open(url).await?;
        let total = header_content_length(response.headers()).unwrap_or(0);

        let mut downloaded = 0u64;
        let written = self
            .write_stream(response, &dest, |chunk| {
                downloaded += chunk;
                self.events.progress(downloaded, total, file_name);
            })
            .await?;

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(written)
    }

    /// Send a GET and fail on any non-success status.
    pub(super) async fn open(&self, url: &str) -> InstallerResult<Response> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InstallerError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Write a response body chunk by chunk. A partial file left by a transport
    /// or disk error is removed so the next resolution pass sees it as missing.
    pub(super) async fn write_stream(
        &self,
        response: Response,
        dest: &Path,
        on_chunk: impl FnMut(u64),
    ) -> InstallerResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| InstallerError::io(parent, e))?;
        }

        let file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| InstallerError::io(dest, e))?;
        write_body(response.bytes_stream(), file, dest, on_chunk).await
    }

    // ── Mirror probing ──────────────────────────────────

    /// Metadata-only probe: `Some(size)` when the server answers with a
    /// success status and a `Content-Length`.
    pub async fn probe_url(&self, url: &str) -> Option<u64> {
        let response = match self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!("Probe failed for {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!("Probe {} answered {}", url, response.status());
            return None;
        }
        header_content_length(response.headers())
    }

    /// Probe each mirror in priority order and stop at the first hit.
    pub async fn probe_mirrors(&self, suffix: &str, mirrors: &[String]) -> Option<MirrorHit> {
        let suffix = suffix.trim_start_matches('/');
        for mirror in mirrors {
            let url = format!("{}/{}", mirror.trim_end_matches('/'), suffix);
            if let Some(size) = self.probe_url(&url).await {
                return Some(MirrorHit { url, size });
            }
        }
        None
    }

    // ── Integrity ───────────────────────────────────────

    /// Hex digest of a file on disk.
    pub async fn file_digest(path: &Path, algorithm: HashAlgorithm) -> InstallerResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| InstallerError::io(path, e))?;
        Ok(match algorithm {
            HashAlgorithm::Md5 => hex::encode(Md5::digest(&bytes)),
            HashAlgorithm::Sha1 => hex::encode(Sha1::digest(&bytes)),
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(&bytes)),
        })
    }

    /// Compare a file against an expected digest; on mismatch the file is deleted.
    pub async fn verify_file(
        path: &Path,
        expected: &str,
        algorithm: HashAlgorithm,
    ) -> InstallerResult<()> {
        let actual = Self::file_digest(path, algorithm).await?;
        if actual.eq_ignore_ascii_case(expected.trim()) {
            return Ok(());
        }

        info!("Hash mismatch for {:?}, removing it", path);
        let _ = tokio::fs::remove_file(path).await;
        Err(InstallerError::HashMismatch {
            path: PathBuf::from(path),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Drain `body` into `writer`. On any error the writer is closed and `dest`
/// removed.
async fn write_body<S, B, E, W>(
    mut body: S,
    mut writer: W,
    dest: &Path,
    mut on_chunk: impl FnMut(u64),
) -> InstallerResult<u64>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<InstallerError>,
    W: AsyncWrite + Unpin,
{
    let result: InstallerResult<u64> = async {
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Into::<InstallerError>::into)?;
            let chunk = chunk.as_ref();
            writer
                .write_all(chunk)
                .await
                .map_err(|e| InstallerError::io(dest, e))?;
            written += chunk.len() as u64;
            on_chunk(chunk.len() as u64);
        }
        writer.flush().await.map_err(|e| InstallerError::io(dest, e))?;
        Ok(written)
    }
    .await;

    if result.is_err() {
        drop(writer);
        let _ = tokio::fs::remove_file(dest).await;
    }
    result
}
