mod batch;
mod client;
mod speed;

pub use batch::{ArtifactDescriptor, BatchReport, DownloadBatch};
pub use client::{Downloader, HashAlgorithm, MirrorHit};
pub use speed::{SpeedEstimator, SpeedSample, SPEED_TICK, SPEED_WINDOW};
