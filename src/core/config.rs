// ─── Install Options ───
// Caller-facing configuration plus the on-disk layout derived from it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::maven;

/// Top-level options for one install.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOptions {
    /// Install root.
    #[serde(default = "default_root")]
    pub path: PathBuf,
    pub loader: LoaderOptions,
    #[serde(default = "default_concurrency")]
    pub download_concurrency: usize,
    /// Remove the auto-provisioned game jar and runtime after patching.
    #[serde(default)]
    pub auto_clean: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Library mirrors in priority order.
    #[serde(default = "maven::default_mirrors")]
    pub mirrors: Vec<String>,
    #[serde(default)]
    pub endpoints: Option<LoaderEndpoints>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderOptions {
    #[serde(rename = "type")]
    pub kind: LoaderKind,
    /// Game version the loader targets.
    pub version: String,
    #[serde(default)]
    pub build: BuildSelector,
    /// Caller-supplied tools; when absent they are provisioned automatically.
    #[serde(default)]
    pub config: Option<ToolPaths>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    Forge,
    Fabric,
    Quilt,
}

impl LoaderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LoaderKind::Forge => "forge",
            LoaderKind::Fabric => "fabric",
            LoaderKind::Quilt => "quilt",
        }
    }
}

impl std::fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which loader build to install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BuildSelector {
    #[default]
    Latest,
    Recommended,
    Explicit(String),
}

impl From<&str> for BuildSelector {
    fn from(raw: &str) -> Self {
        match raw {
            "latest" => BuildSelector::Latest,
            "recommended" => BuildSelector::Recommended,
            other => BuildSelector::Explicit(other.to_string()),
        }
    }
}

impl std::fmt::Display for BuildSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildSelector::Latest => f.write_str("latest"),
            BuildSelector::Recommended => f.write_str("recommended"),
            BuildSelector::Explicit(build) => f.write_str(build),
        }
    }
}

impl Serialize for BuildSelector {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BuildSelector {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(BuildSelector::from(raw.as_str()))
    }
}

/// Paths to an existing Java binary and game client, as given by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPaths {
    pub java_path: PathBuf,
    pub minecraft_jar: PathBuf,
    pub minecraft_json: PathBuf,
}

/// URL templates with `${version}` and `${build}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderEndpoints {
    pub meta_data: String,
    /// Profile json (fabric/quilt).
    #[serde(default)]
    pub json: Option<String>,
    /// Per-build metadata carrying installer hashes (forge).
    #[serde(default)]
    pub meta: Option<String>,
    #[serde(default)]
    pub promotions: Option<String>,
    /// Installer archive (forge).
    #[serde(default)]
    pub install: Option<String>,
}

impl LoaderEndpoints {
    pub fn defaults_for(kind: LoaderKind) -> Self {
        match kind {
            LoaderKind::Forge => Self {
                meta_data: "https://files.minecraftforge.net/net/minecraftforge/forge/maven-metadata.json".into(),
                json: None,
                meta: Some("https://files.minecraftforge.net/net/minecraftforge/forge/${build}/meta.json".into()),
                promotions: Some("https://files.minecraftforge.net/net/minecraftforge/forge/promotions_slim.json".into()),
                install: Some("https://maven.minecraftforge.net/net/minecraftforge/forge/${version}/forge-${version}-installer.jar".into()),
            },
            LoaderKind::Fabric => Self {
                meta_data: "https://meta.fabricmc.net/v2/versions".into(),
                json: Some("https://meta.fabricmc.net/v2/versions/loader/${version}/${build}/profile/json".into()),
                meta: None,
                promotions: None,
                install: None,
            },
            LoaderKind::Quilt => Self {
                meta_data: "https://meta.quiltmc.org/v3/versions".into(),
                json: Some("https://meta.quiltmc.org/v3/versions/loader/${version}/${build}/profile/json".into()),
                meta: None,
                promotions: None,
                install: None,
            },
        }
    }
}

/// Replace every `${version}` and `${build}` in `template`.
pub fn fill_template(template: &str, version: &str, build: &str) -> String {
    template
        .replace("${version}", version)
        .replace("${build}", build)
}

fn default_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("loader-installer")
}

fn default_concurrency() -> usize {
    5
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl InstallOptions {
    pub fn new(path: impl Into<PathBuf>, kind: LoaderKind, version: &str) -> Self {
        Self {
            path: path.into(),
            loader: LoaderOptions {
                kind,
                version: version.to_string(),
                build: BuildSelector::default(),
                config: None,
            },
            download_concurrency: default_concurrency(),
            auto_clean: false,
            timeout_ms: default_timeout_ms(),
            mirrors: maven::default_mirrors(),
            endpoints: None,
        }
    }

    pub fn layout(&self) -> InstallLayout {
        InstallLayout::new(&self.path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Caller overrides, else the defaults for the configured loader.
    pub fn endpoints(&self) -> LoaderEndpoints {
        self.endpoints
            .clone()
            .unwrap_or_else(|| LoaderEndpoints::defaults_for(self.loader.kind))
    }
}

/// Directories an install writes to, all under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub root: PathBuf,
    pub libraries: PathBuf,
    pub versions: PathBuf,
    pub temp: PathBuf,
    pub runtime: PathBuf,
    /// Installer archive cache.
    pub forge: PathBuf,
}

impl InstallLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            libraries: root.join("libraries"),
            versions: root.join("versions"),
            temp: root.join("temp"),
            runtime: root.join("runtime"),
            forge: root.join("forge"),
        }
    }

    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.versions.join(id)
    }
}
