// ─── Version Manifest ───
// Mojang's index of game versions, read only to locate a vanilla version json
// when processor tools have to be provisioned.

use serde::Deserialize;
use tracing::debug;

use crate::core::error::{InstallerError, InstallerResult};

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    pub versions: Vec<VersionEntry>,
}

/// Pointer to one version json.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    pub async fn fetch(client: &reqwest::Client, url: &str) -> InstallerResult<Self> {
        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(InstallerError::DownloadFailed {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let manifest: VersionManifest = response.json().await?;
        debug!("Version manifest lists {} versions", manifest.versions.len());
        Ok(manifest)
    }

    /// Entry for `id`, or a loader error naming the missing version.
    pub fn entry_for(&self, id: &str) -> InstallerResult<&VersionEntry> {
        self.versions
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| InstallerError::Loader(format!("Minecraft {} not found in manifest", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn locates_a_listed_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "latest": {"release": "1.20.1"},
                "versions": [
                    {"id": "1.20.1", "type": "release", "url": "https://example.com/1.20.1.json"},
                    {"id": "23w31a", "type": "snapshot", "url": "https://example.com/23w31a.json"}
                ]
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let manifest = VersionManifest::fetch(&client, &format!("{}/manifest.json", server.uri()))
            .await
            .unwrap();

        assert_eq!(
            manifest.entry_for("1.20.1").unwrap().url,
            "https://example.com/1.20.1.json"
        );
        assert!(matches!(
            manifest.entry_for("1.7.10"),
            Err(InstallerError::Loader(_))
        ));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = VersionManifest::fetch(&reqwest::Client::new(), &server.uri())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallerError::DownloadFailed { status: 502, .. }));
    }
}
