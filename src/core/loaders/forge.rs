use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::context::InstallContext;
use super::installer::{fetch_json, LoaderInstaller};
use crate::core::archive::ScratchDir;
use crate::core::config::{fill_template, BuildSelector};
use crate::core::downloader::{Downloader, HashAlgorithm};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::library::LibraryResolver;
use crate::core::maven;
use crate::core::processor::{
    clean_provisioned, PipelineOutcome, ProcessorPipeline, ToolProvisioning,
};
use crate::core::profile::{InstallProfile, LoaderProfile};
use crate::core::version::VersionJson;

/// Coordinates the installer archive ships itself.
const BUNDLED_FORGE: [&str; 2] = [
    "net.minecraftforge:forge:",
    "net.minecraftforge:minecraftforge:",
];

const INSTALL_PROFILE_MEMBER: &str = "install_profile.json";
const CLIENT_PATCH_MEMBER: &str = "data/client.lzma";

/// Installs Forge from its installer archive: profile, universal jar,
/// libraries, then the processor pipeline.
pub struct ForgeInstaller;

#[derive(Debug, Deserialize)]
struct Promotions {
    #[serde(default)]
    promos: HashMap<String, String>,
}

/// `meta.json` of one build; only the installer hash is read.
#[derive(Debug, Default, Deserialize)]
struct BuildMeta {
    #[serde(default)]
    classifiers: HashMap<String, HashMap<String, String>>,
}

impl BuildMeta {
    fn installer_md5(&self) -> Option<&str> {
        self.classifiers
            .get("installer")
            .and_then(|c| c.get("jar"))
            .map(String::as_str)
    }
}

/// Map a selector onto one of the published builds for `minecraft`.
fn select_build(
    builds: &[String],
    selector: &BuildSelector,
    promotions: Option<&Promotions>,
    minecraft: &str,
) -> Option<String> {
    let promoted = |suffix: &str| {
        promotions.and_then(|p| p.promos.get(&format!("{}-{}", minecraft, suffix)))
    };
    let wanted = match selector {
        BuildSelector::Latest => {
            let promo = promoted("latest")?;
            builds.iter().find(|b| b.contains(promo.as_str()))?.clone()
        }
        BuildSelector::Recommended => {
            let promo = promoted("recommended").or_else(|| promoted("latest"))?;
            builds.iter().find(|b| b.contains(promo.as_str()))?.clone()
        }
        BuildSelector::Explicit(build) => build.clone(),
    };
    builds.iter().find(|b| **b == wanted).cloned()
}

impl ForgeInstaller {
    /// Pick a build, download its installer into `<root>/forge` and verify it.
    async fn download_installer(
        &self,
        ctx: &InstallContext<'_>,
    ) -> InstallerResult<(PathBuf, String)> {
        let endpoints = ctx.options.endpoints();
        let minecraft = ctx.minecraft_version();
        let selector = &ctx.options.loader.build;

        let mut metadata: HashMap<String, Vec<String>> =
            fetch_json(ctx.http(), &endpoints.meta_data).await?;
        let builds = metadata.remove(minecraft).ok_or_else(|| {
            InstallerError::Loader(format!("Forge {} not supported", minecraft))
        })?;

        let promotions = match (selector, endpoints.promotions.as_deref()) {
            (BuildSelector::Explicit(_), _) | (_, None) => None,
            (_, Some(url)) => Some(fetch_json::<Promotions>(ctx.http(), url).await?),
        };

        let build = select_build(&builds, selector, promotions.as_ref(), minecraft).ok_or_else(|| {
            InstallerError::Loader(format!(
                "Build {} not found, Available builds: {}",
                selector,
                builds.join(", ")
            ))
        })?;

        let install_template = endpoints
            .install
            .as_deref()
            .ok_or_else(|| InstallerError::Loader("No installer endpoint configured".into()))?;
        let meta_template = endpoints
            .meta
            .as_deref()
            .ok_or_else(|| InstallerError::Loader("No build meta endpoint configured".into()))?;

        let meta_url = fill_template(meta_template, &build, &build);
        let meta: BuildMeta = fetch_json(ctx.http(), &meta_url).await?;
        let expected = meta.installer_md5().ok_or_else(|| {
            InstallerError::Loader(format!("No installer hash published for {}", build))
        })?;

        let file_name = format!("forge-{}-installer.jar", build);
        let installer = ctx.layout.forge.join(&file_name);
        if !installer.exists() {
            let url = fill_template(install_template, &build, &build);
            ctx.downloader
                .fetch_one(&url, &ctx.layout.forge, &file_name)
                .await?;
        }

        Downloader::verify_file(&installer, expected, HashAlgorithm::Md5).await?;
        info!("Forge installer {} verified", file_name);
        Ok((installer, build))
    }

    /// Read the install profile and version manifest out of the installer.
    /// Legacy installers nest both in one file; modern ones name a separate
    /// json member.
    fn extract_profile(
        &self,
        ctx: &InstallContext<'_>,
        installer: &Path,
    ) -> InstallerResult<LoaderProfile> {
        let raw = ctx
            .extractor
            .read_member(installer, INSTALL_PROFILE_MEMBER)?
            .ok_or_else(|| InstallerError::Loader("Invalid forge installer".into()))?;
        let mut value: serde_json::Value = serde_json::from_slice(&raw)?;

        if let Some(install) = value.get_mut("install").map(serde_json::Value::take) {
            let version = value
                .get_mut("versionInfo")
                .map(serde_json::Value::take)
                .ok_or_else(|| InstallerError::Loader("Legacy profile without versionInfo".into()))?;
            return Ok(LoaderProfile {
                install: serde_json::from_value(install)?,
                version: serde_json::from_value(version)?,
            });
        }

        let install: InstallProfile = serde_json::from_value(value)?;
        let member = install
            .json
            .as_deref()
            .map(|json| json.trim_start_matches('/'))
            .ok_or_else(|| InstallerError::Loader("Install profile names no version json".into()))?;
        let version = ctx
            .extractor
            .read_member(installer, member)?
            .ok_or_else(|| InstallerError::Loader(format!("Installer has no {}", member)))?;

        Ok(LoaderProfile {
            install,
            version: serde_json::from_slice(&version)?,
        })
    }

    /// Copy the loader's own artifacts out of the installer into the library
    /// tree. Returns whether the bundled forge coordinates are now present.
    async fn extract_universal(
        &self,
        ctx: &InstallContext<'_>,
        profile: &InstallProfile,
        installer: &Path,
    ) -> InstallerResult<bool> {
        let scratch = ScratchDir::new_in(&ctx.layout.temp, "forge-")?;
        ctx.extractor.extract(installer, scratch.path(), None)?;
        let libraries = &ctx.layout.libraries;

        let bundled = match (profile.file_path.as_deref(), profile.path.as_deref()) {
            (Some(file_path), Some(coordinate)) => {
                let target = maven::resolve(coordinate, None, None)?;
                ctx.events().extract(format!("Extracting {}...", target.file_name));
                copy_file(
                    &scratch.path().join(file_path.trim_start_matches('/')),
                    &libraries.join(target.local_path()),
                )
                .await?;
                true
            }
            (None, Some(coordinate)) => {
                let target = maven::resolve(coordinate, None, None)?;
                let relative = target.local_path();
                let dir = relative.parent().unwrap_or(Path::new(""));
                let source = scratch.path().join("maven").join(dir);

                let mut entries = tokio::fs::read_dir(&source)
                    .await
                    .map_err(|e| InstallerError::io(&source, e))?;
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| InstallerError::io(&source, e))?
                {
                    let name = entry.file_name();
                    ctx.events()
                        .extract(format!("Extracting {}...", name.to_string_lossy()));
                    copy_file(&entry.path(), &libraries.join(dir).join(&name)).await?;
                }
                true
            }
            _ => false,
        };

        if profile.has_processors() {
            let coordinate = profile.universal_coordinate().ok_or_else(|| {
                InstallerError::Loader("Install profile names no loader artifact".into())
            })?;
            let target = maven::resolve(coordinate, Some("-clientdata"), Some("lzma"))?;
            copy_file(
                &scratch.path().join(CLIENT_PATCH_MEMBER),
                &libraries.join(target.local_path()),
            )
            .await?;
            ctx.events().extract(format!("Extracting {}...", target.file_name));
        }

        Ok(bundled)
    }

    async fn patch(
        &self,
        ctx: &InstallContext<'_>,
        profile: &InstallProfile,
        installer: &Path,
    ) -> InstallerResult<()> {
        if !profile.has_processors() {
            return Ok(());
        }

        let minecraft = ctx.minecraft_version();
        let provisioning = ToolProvisioning::from_options(ctx.options.loader.config.clone());
        let pipeline = ProcessorPipeline::new(
            &ctx.layout,
            ctx.runner,
            ctx.extractor,
            ctx.events().clone(),
        );

        let provisioning_ref = &provisioning;
        let outcome = pipeline
            .apply(profile, move || async move {
                let mut tools = provisioning_ref
                    .provision(ctx.downloader, &ctx.layout, minecraft)
                    .await?;
                tools.installer = Some(installer.to_path_buf());
                Ok::<_, InstallerError>(tools)
            })
            .await?;
        debug!("Forge pipeline outcome: {:?}", outcome);

        if ctx.options.auto_clean && provisioning.is_auto() {
            clean_provisioned(&ctx.layout, minecraft).await?;
        }
        if outcome == PipelineOutcome::Skipped {
            info!("Forge already patched");
        }
        Ok(())
    }
}

async fn copy_file(from: &Path, to: &Path) -> InstallerResult<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| InstallerError::io(parent, e))?;
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| InstallerError::io(from, e))?;
    Ok(())
}

#[async_trait]
impl LoaderInstaller for ForgeInstaller {
    async fn install(&self, ctx: &InstallContext<'_>) -> InstallerResult<VersionJson> {
        info!(
            "Installing Forge {} for MC {}",
            ctx.options.loader.build,
            ctx.minecraft_version()
        );

        let (installer, build) = self.download_installer(ctx).await?;
        let profile = self.extract_profile(ctx, &installer)?;
        profile.version.save_to(&ctx.layout.versions).await?;

        let bundled = self.extract_universal(ctx, &profile.install, &installer).await?;
        let skip: &[&str] = if bundled { &BUNDLED_FORGE } else { &[] };

        LibraryResolver::new(ctx.downloader, &ctx.layout.libraries, &ctx.options.mirrors)
            .install(
                &profile.version.libraries,
                Some(profile.install.libraries.as_slice()),
                skip,
            )
            .await?;

        self.patch(ctx, &profile.install, &installer).await?;

        info!("Forge {} installed as {}", build, profile.version.id);
        Ok(profile.version)
    }
}
