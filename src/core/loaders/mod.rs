pub mod context;
pub mod fabric;
pub mod forge;
pub mod installer;
pub mod quilt;

pub use context::InstallContext;
pub use installer::{Installer, LoaderInstaller};

use tracing::{info, warn};

use crate::core::archive::{ArchiveExtractor, ZipExtractor};
use crate::core::config::InstallOptions;
use crate::core::downloader::Downloader;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::events::{EventSink, InstallEvent};
use crate::core::http::{build_http_client, check_network};
use crate::core::processor::{ProcessToolRunner, ToolRunner};
use crate::core::version::VersionJson;

/// Install the configured loader with the production runner and extractor.
///
/// On success the final version manifest is also emitted as a `json` event;
/// on failure the error is emitted as an `error` event before being returned.
pub async fn install(options: &InstallOptions, events: EventSink) -> InstallerResult<VersionJson> {
    let client = build_http_client()?;
    if !check_network(&client, options.timeout()).await {
        events.error("Network error");
        return Err(InstallerError::LoaderApi("Network error".into()));
    }

    let downloader = Downloader::new(client, events.clone())
        .with_concurrency(options.download_concurrency)
        .with_probe_timeout(options.timeout());
    install_with(options, &downloader, &ProcessToolRunner, &ZipExtractor).await
}

/// [`install`] with caller-chosen collaborators and no reachability probe.
pub async fn install_with(
    options: &InstallOptions,
    downloader: &Downloader,
    runner: &dyn ToolRunner,
    extractor: &dyn ArchiveExtractor,
) -> InstallerResult<VersionJson> {
    let ctx = InstallContext::new(options, downloader, runner, extractor);
    let installer = Installer::new(options.loader.kind);
    info!(
        "Installing {} for Minecraft {} into {:?}",
        installer.kind(),
        options.loader.version,
        options.path
    );

    match installer.install(&ctx).await {
        Ok(version) => {
            ctx.events().emit(InstallEvent::Json(serde_json::to_value(&version)?));
            Ok(version)
        }
        Err(e) => {
            warn!("Install failed: {}", e);
            ctx.events().error(e.to_string());
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{LoaderEndpoints, LoaderKind};
    use crate::core::events;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn failures_are_reported_on_the_channel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let mut options = InstallOptions::new(temp.path(), LoaderKind::Quilt, "1.20.1");
        options.endpoints = Some(LoaderEndpoints {
            meta_data: format!("{}/v3/versions", server.uri()),
            ..LoaderEndpoints::defaults_for(LoaderKind::Quilt)
        });

        let (sink, mut rx) = events::channel();
        let dl = Downloader::new(build_http_client().unwrap(), sink);
        let err = install_with(&options, &dl, &ProcessToolRunner, &ZipExtractor)
            .await
            .unwrap_err();

        assert!(matches!(err, InstallerError::LoaderApi(_)));
        assert!(matches!(rx.try_recv(), Ok(InstallEvent::Error(_))));
    }
}
