pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::config::{BuildSelector, InstallOptions, LoaderKind};
pub use crate::core::error::{InstallerError, InstallerResult};
pub use crate::core::events::{channel, EventSink, InstallEvent};
pub use crate::core::loaders::{install, install_with};

/// Install a `fmt` subscriber filtered by `RUST_LOG`, defaulting to
/// `info,loader_installer=debug`. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,loader_installer=debug")),
        )
        .try_init();
}
