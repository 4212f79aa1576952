use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::context::InstallContext;
use super::installer::{fetch_json, LoaderInstaller};
use crate::core::config::{fill_template, BuildSelector};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::library::LibraryResolver;
use crate::core::maven::FABRIC_MAVEN;
use crate::core::version::{LibraryEntry, VersionJson};

/// `GET <meta>/versions`: supported game versions and loader builds, newest first.
#[derive(Debug, Deserialize)]
pub struct LoaderVersions {
    #[serde(default)]
    pub game: Vec<GameVersion>,
    #[serde(default)]
    pub loader: Vec<LoaderBuild>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameVersion {
    pub version: String,
    #[serde(default)]
    pub stable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoaderBuild {
    pub version: String,
    /// Quilt does not publish this; its betas are marked in the version string.
    #[serde(default)]
    pub stable: Option<bool>,
}

impl LoaderBuild {
    pub fn is_stable(&self) -> bool {
        self.stable
            .unwrap_or_else(|| !self.version.contains("beta"))
    }
}

/// `latest` is the newest build, `recommended` the newest stable one.
pub fn select_build<'a>(builds: &'a [LoaderBuild], selector: &BuildSelector) -> Option<&'a LoaderBuild> {
    match selector {
        BuildSelector::Latest => builds.first(),
        BuildSelector::Recommended => builds.iter().find(|b| b.is_stable()),
        BuildSelector::Explicit(version) => builds.iter().find(|b| &b.version == version),
    }
}

/// Name and default repository of a meta-API loader.
pub(super) struct MetaLoader {
    pub name: &'static str,
    pub default_repo: &'static str,
}

/// Shared fabric/quilt flow: pick a build, write its profile as the version
/// json, then fetch its libraries from their own repositories.
pub(super) async fn install_from_meta(
    ctx: &InstallContext<'_>,
    loader: &MetaLoader,
) -> InstallerResult<VersionJson> {
    let endpoints = ctx.options.endpoints();
    let minecraft = ctx.minecraft_version();
    let selector = &ctx.options.loader.build;
    info!("Installing {} {} for Minecraft {}", loader.name, selector, minecraft);

    let versions: LoaderVersions = fetch_json(ctx.http(), &endpoints.meta_data).await?;
    if !versions.game.iter().any(|g| g.version == minecraft) {
        return Err(InstallerError::Loader(format!(
            "{} doesn't support Minecraft {}",
            loader.name, minecraft
        )));
    }

    let build = select_build(&versions.loader, selector).ok_or_else(|| {
        let available: Vec<_> = versions.loader.iter().map(|b| b.version.as_str()).collect();
        InstallerError::Loader(format!(
            "{} loader {} not found, Available builds: {}",
            loader.name,
            selector,
            available.join(", ")
        ))
    })?;

    let template = endpoints.json.as_deref().ok_or_else(|| {
        InstallerError::Loader(format!("No profile endpoint configured for {}", loader.name))
    })?;
    let url = fill_template(template, minecraft, &build.version);
    let version: VersionJson = fetch_json(ctx.http(), &url).await?;
    version.save_to(&ctx.layout.versions).await?;

    let libraries: Vec<LibraryEntry> = version
        .libraries
        .iter()
        .cloned()
        .map(|mut lib| {
            if lib.url.is_none() {
                lib.url = Some(loader.default_repo.to_string());
            }
            lib
        })
        .collect();

    LibraryResolver::new(ctx.downloader, &ctx.layout.libraries, &ctx.options.mirrors)
        .install(&libraries, None, &[])
        .await?;

    info!("{} {} installed as {}", loader.name, build.version, version.id);
    Ok(version)
}

const FABRIC: MetaLoader = MetaLoader {
    name: "Fabric",
    default_repo: FABRIC_MAVEN,
};

pub struct FabricInstaller;

#[async_trait]
impl LoaderInstaller for FabricInstaller {
    async fn install(&self, ctx: &InstallContext<'_>) -> InstallerResult<VersionJson> {
        install_from_meta(ctx, &FABRIC).await
    }
}
