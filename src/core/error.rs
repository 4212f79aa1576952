use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the installer core.
/// Every module returns `Result<T, InstallerError>`.
#[derive(Debug, Error)]
pub enum InstallerError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("No mirror or fallback URL available for {}", .0.join(", "))]
    NoSourceAvailable(Vec<String>),

    #[error(
        "Libraries incomplete, failed: {}; no source: {}",
        failed.join(", "),
        unavailable.join(", ")
    )]
    LibrariesIncomplete {
        failed: Vec<String>,
        unavailable: Vec<String>,
    },

    #[error("Batch download incomplete, failed: {}", failed.join(", "))]
    BatchIncomplete { failed: Vec<String> },

    // ── Integrity ───────────────────────────────────────
    #[error("Hash mismatch for {path:?}: expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Maven ───────────────────────────────────────────
    #[error("Malformed coordinate: {0}")]
    MalformedCoordinate(String),

    // ── Processors ──────────────────────────────────────
    #[error("Missing processor jar: {0:?}")]
    MissingProcessorJar(PathBuf),

    #[error("Main-Class missing in processor jar {0:?}")]
    NoMainClass(PathBuf),

    #[error("Processor {step} ({jar}) exited with code {code:?}")]
    ProcessorExecution {
        step: String,
        jar: String,
        code: Option<i32>,
    },

    #[error("Impossible to find {what} at {path:?}")]
    MissingExternalDependency { what: &'static str, path: PathBuf },

    #[error("Java {found} at {path:?} is too old, Java {required} is required")]
    IncompatibleJava {
        path: PathBuf,
        found: u32,
        required: u32,
    },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Loader ──────────────────────────────────────────
    #[error("Loader error: {0}")]
    Loader(String),

    #[error("Loader API unreachable: {0}")]
    LoaderApi(String),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type InstallerResult<T> = Result<T, InstallerError>;

impl InstallerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallerError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for InstallerError {
    fn from(source: std::io::Error) -> Self {
        InstallerError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// Front-ends forward failures as `{ "error": "<message>" }`.
impl serde::Serialize for InstallerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
