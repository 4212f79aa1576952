// ─── Tool Provisioning ───
// Java binary, vanilla client jar and its version json, either supplied by
// the caller or fetched on demand.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::core::config::{InstallLayout, ToolPaths};
use crate::core::downloader::{Downloader, HashAlgorithm};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::version::{VersionJson, VersionManifest, VERSION_MANIFEST_URL};

use super::runtime::{
    find_java, install_runtime, runtime_platform, JavaRequirement, JAVA_RUNTIME_INDEX_URL,
};

/// Everything an external processor invocation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub java: PathBuf,
    pub minecraft_jar: PathBuf,
    pub minecraft_json: PathBuf,
    /// Installer archive, when one was downloaded.
    pub installer: Option<PathBuf>,
}

impl ToolConfig {
    /// Every referenced file must exist.
    pub fn validate(&self) -> InstallerResult<()> {
        for (what, path) in [
            ("java", &self.java),
            ("minecraft", &self.minecraft_jar),
            ("minecraft json", &self.minecraft_json),
        ] {
            if !path.exists() {
                return Err(InstallerError::MissingExternalDependency {
                    what,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}

impl From<ToolPaths> for ToolConfig {
    fn from(paths: ToolPaths) -> Self {
        Self {
            java: paths.java_path,
            minecraft_jar: paths.minecraft_jar,
            minecraft_json: paths.minecraft_json,
            installer: None,
        }
    }
}

/// Endpoints consulted by automatic provisioning.
#[derive(Debug, Clone)]
pub struct ProvisionSources {
    pub version_manifest: String,
    pub java_runtimes: String,
    /// Runtime index key; `None` goes straight to a system Java.
    pub platform: Option<String>,
}

impl Default for ProvisionSources {
    fn default() -> Self {
        Self {
            version_manifest: VERSION_MANIFEST_URL.to_string(),
            java_runtimes: JAVA_RUNTIME_INDEX_URL.to_string(),
            platform: runtime_platform().map(str::to_string),
        }
    }
}

/// Where the pipeline's tools come from.
#[derive(Debug, Clone)]
pub enum ToolProvisioning {
    /// Caller-owned paths, never cleaned up.
    Provided(ToolConfig),
    /// Fetch the vanilla client into `versions/<mc>/` and the Java runtime it
    /// asks for into `runtime/`.
    Auto,
}

impl ToolProvisioning {
    pub fn from_options(config: Option<ToolPaths>) -> Self {
        match config {
            Some(paths) => ToolProvisioning::Provided(paths.into()),
            None => ToolProvisioning::Auto,
        }
    }

    /// Only automatically provisioned files are ever removed by auto-clean.
    pub fn is_auto(&self) -> bool {
        matches!(self, ToolProvisioning::Auto)
    }

    pub async fn provision(
        &self,
        downloader: &Downloader,
        layout: &InstallLayout,
        minecraft_version: &str,
    ) -> InstallerResult<ToolConfig> {
        self.provision_from(
            downloader,
            layout,
            minecraft_version,
            &ProvisionSources::default(),
        )
        .await
    }

    pub async fn provision_from(
        &self,
        downloader: &Downloader,
        layout: &InstallLayout,
        minecraft_version: &str,
        sources: &ProvisionSources,
    ) -> InstallerResult<ToolConfig> {
        match self {
            ToolProvisioning::Provided(config) => {
                config.validate()?;
                Ok(config.clone())
            }
            ToolProvisioning::Auto => {
                let (minecraft_jar, minecraft_json, version) = fetch_client(
                    downloader,
                    layout,
                    minecraft_version,
                    &sources.version_manifest,
                )
                .await?;
                let java = provision_java(downloader, layout, &version, sources).await?;
                Ok(ToolConfig {
                    java,
                    minecraft_jar,
                    minecraft_json,
                    installer: None,
                })
            }
        }
    }
}

/// Mojang runtime for the version's `javaVersion`, else a system Java of at
/// least that major version.
async fn provision_java(
    downloader: &Downloader,
    layout: &InstallLayout,
    version: &VersionJson,
    sources: &ProvisionSources,
) -> InstallerResult<PathBuf> {
    let requirement = JavaRequirement::for_version(version);
    if let Some(platform) = &sources.platform {
        if let Some(java) = install_runtime(
            downloader,
            &layout.runtime,
            &requirement,
            &sources.java_runtimes,
            platform,
        )
        .await?
        {
            return Ok(java);
        }
    }
    warn!(
        "No {} runtime for this platform, looking for a system Java {}",
        requirement.component, requirement.major
    );
    find_java(requirement.major).await
}

/// Download `versions/<mc>/<mc>.json` and `versions/<mc>/<mc>.jar` unless present.
async fn fetch_client(
    downloader: &Downloader,
    layout: &InstallLayout,
    minecraft_version: &str,
    manifest_url: &str,
) -> InstallerResult<(PathBuf, PathBuf, VersionJson)> {
    let folder = layout.version_dir(minecraft_version);
    let json_path = folder.join(format!("{}.json", minecraft_version));
    let jar_name = format!("{}.jar", minecraft_version);
    let jar_path = folder.join(&jar_name);

    if json_path.exists() && jar_path.exists() {
        let raw = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| InstallerError::io(&json_path, e))?;
        let version: VersionJson = serde_json::from_str(&raw)?;
        return Ok((jar_path, json_path, version));
    }

    let manifest = VersionManifest::fetch(downloader.client(), manifest_url).await?;
    let entry = manifest.entry_for(minecraft_version)?;

    let mut version = VersionJson::fetch(downloader.client(), &entry.url).await?;
    let client = version
        .downloads
        .as_ref()
        .and_then(|d| d.client.as_ref())
        .ok_or_else(|| {
            InstallerError::Loader(format!("Minecraft {} has no client download", minecraft_version))
        })?;

    if !jar_path.exists() {
        info!("Downloading Minecraft {} client jar", minecraft_version);
        downloader.fetch_one(&client.url, &folder, &jar_name).await?;
        if let Some(sha1) = &client.sha1 {
            Downloader::verify_file(&jar_path, sha1, HashAlgorithm::Sha1).await?;
        }
    }

    // The stored id must match the folder it is written under.
    version.id = minecraft_version.to_string();
    let json_path = version.save_to(&layout.versions).await?;

    Ok((jar_path, json_path, version))
}

/// Remove what auto-provisioning created: `versions/<mc>` and `runtime`.
pub async fn clean_provisioned(layout: &InstallLayout, minecraft_version: &str) -> InstallerResult<()> {
    for dir in [layout.runtime.clone(), layout.version_dir(minecraft_version)] {
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            info!("Cleaning {:?}", dir);
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| InstallerError::io(&dir, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::EventSink;
    use crate::core::http::build_http_client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn provided_paths_must_exist() {
        let temp = tempfile::tempdir().unwrap();
        let java = temp.path().join("java");
        std::fs::write(&java, b"").unwrap();

        let config = ToolConfig {
            java,
            minecraft_jar: temp.path().join("missing.jar"),
            minecraft_json: temp.path().join("missing.json"),
            installer: None,
        };
        match config.validate().unwrap_err() {
            InstallerError::MissingExternalDependency { what, path } => {
                assert_eq!(what, "minecraft");
                assert_eq!(path, temp.path().join("missing.jar"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn client_is_fetched_into_versions_dir() {
        let server = MockServer::start().await;
        let version_url = format!("{}/v1/1.20.1.json", server.uri());
        let jar_url = format!("{}/client.jar", server.uri());

        Mock::given(method("GET"))
            .and(path("/manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "versions": [{"id": "1.20.1", "type": "release", "url": version_url}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/1.20.1.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "1.20.1",
                "mainClass": "net.minecraft.client.main.Main",
                "downloads": {"client": {"url": jar_url, "size": 5}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/client.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar!!".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(temp.path());
        let dl = Downloader::new(build_http_client().unwrap(), EventSink::disabled());

        let (jar, json, version) = fetch_client(
            &dl,
            &layout,
            "1.20.1",
            &format!("{}/manifest.json", server.uri()),
        )
        .await
        .unwrap();

        assert_eq!(jar, layout.versions.join("1.20.1").join("1.20.1.jar"));
        assert_eq!(std::fs::read(&jar).unwrap(), b"jar!!");
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(saved["mainClass"], "net.minecraft.client.main.Main");
        assert_eq!(version.id, "1.20.1");

        clean_provisioned(&layout, "1.20.1").await.unwrap();
        assert!(!layout.versions.join("1.20.1").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn auto_provisioning_installs_the_requested_runtime() {
        use sha1::{Digest, Sha1};

        let server = MockServer::start().await;
        let java_body = b"#!/bin/sh\n".to_vec();

        Mock::given(method("GET"))
            .and(path("/manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "versions": [{"id": "1.20.1", "url": format!("{}/1.20.1.json", server.uri())}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1.20.1.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "1.20.1",
                "javaVersion": {"component": "java-runtime-gamma", "majorVersion": 17},
                "downloads": {"client": {"url": format!("{}/client.jar", server.uri())}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/client.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/runtimes.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "linux": {"java-runtime-gamma": [{
                    "manifest": {"url": format!("{}/gamma.json", server.uri())}
                }]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gamma.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": {"bin/java": {
                    "type": "file",
                    "executable": true,
                    "downloads": {"raw": {
                        "url": format!("{}/raw/java", server.uri()),
                        "sha1": hex::encode(Sha1::digest(&java_body)),
                        "size": java_body.len()
                    }}
                }}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw/java"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(java_body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(temp.path());
        let dl = Downloader::new(build_http_client().unwrap(), EventSink::disabled());
        let sources = ProvisionSources {
            version_manifest: format!("{}/manifest.json", server.uri()),
            java_runtimes: format!("{}/runtimes.json", server.uri()),
            platform: Some("linux".into()),
        };

        let tools = ToolProvisioning::Auto
            .provision_from(&dl, &layout, "1.20.1", &sources)
            .await
            .unwrap();
        let expected_java = layout
            .runtime
            .join("java-runtime-gamma")
            .join("bin")
            .join("java");
        assert_eq!(tools.java, expected_java);
        tools.validate().unwrap();

        // A second run reuses the saved version json and the installed runtime.
        let again = ToolProvisioning::Auto
            .provision_from(&dl, &layout, "1.20.1", &sources)
            .await
            .unwrap();
        assert_eq!(again, tools);
    }
}
