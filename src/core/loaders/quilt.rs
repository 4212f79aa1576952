use async_trait::async_trait;

use super::context::InstallContext;
use super::fabric::{install_from_meta, MetaLoader};
use super::installer::LoaderInstaller;
use crate::core::error::InstallerResult;
use crate::core::maven::QUILT_MAVEN;
use crate::core::version::VersionJson;

/// Quilt's meta API mirrors Fabric's, so the flow is shared.
pub struct QuiltInstaller;

const QUILT: MetaLoader = MetaLoader {
    name: "QuiltMC",
    default_repo: QUILT_MAVEN,
};

#[async_trait]
impl LoaderInstaller for QuiltInstaller {
    async fn install(&self, ctx: &InstallContext<'_>) -> InstallerResult<VersionJson> {
        install_from_meta(ctx, &QUILT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::archive::ZipExtractor;
    use crate::core::config::{BuildSelector, InstallOptions, LoaderEndpoints, LoaderKind};
    use crate::core::downloader::Downloader;
    use crate::core::error::InstallerError;
    use crate::core::events::EventSink;
    use crate::core::http::build_http_client;
    use crate::core::processor::ProcessToolRunner;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn missing_build_lists_available_ones() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "game": [{"version": "1.20.1", "stable": true}],
                "loader": [{"version": "0.22.0-beta.1"}, {"version": "0.21.2"}]
            })))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let mut options = InstallOptions::new(temp.path(), LoaderKind::Quilt, "1.20.1");
        options.loader.build = BuildSelector::Explicit("0.1.0".into());
        options.endpoints = Some(LoaderEndpoints {
            meta_data: format!("{}/v3/versions", server.uri()),
            ..LoaderEndpoints::defaults_for(LoaderKind::Quilt)
        });

        let dl = Downloader::new(build_http_client().unwrap(), EventSink::disabled());
        let ctx = InstallContext::new(&options, &dl, &ProcessToolRunner, &ZipExtractor);
        let err = QuiltInstaller.install(&ctx).await.unwrap_err();
        match err {
            InstallerError::Loader(message) => {
                assert!(message.contains("0.1.0"));
                assert!(message.contains("0.22.0-beta.1, 0.21.2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
