use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::core::config::LoaderKind;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::version::VersionJson;

use super::{context::InstallContext, fabric::FabricInstaller, forge::ForgeInstaller, quilt::QuiltInstaller};

#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    /// Install the configured loader build and return its version manifest.
    async fn install(&self, ctx: &InstallContext<'_>) -> InstallerResult<VersionJson>;
}

/// Dispatcher keyed by loader kind; every kind maps to its own installer.
pub enum Installer {
    Forge(ForgeInstaller),
    Fabric(FabricInstaller),
    Quilt(QuiltInstaller),
}

impl Installer {
    pub fn new(kind: LoaderKind) -> Self {
        match kind {
            LoaderKind::Forge => Self::Forge(ForgeInstaller),
            LoaderKind::Fabric => Self::Fabric(FabricInstaller),
            LoaderKind::Quilt => Self::Quilt(QuiltInstaller),
        }
    }

    pub fn kind(&self) -> LoaderKind {
        match self {
            Installer::Forge(_) => LoaderKind::Forge,
            Installer::Fabric(_) => LoaderKind::Fabric,
            Installer::Quilt(_) => LoaderKind::Quilt,
        }
    }

    pub async fn install(&self, ctx: &InstallContext<'_>) -> InstallerResult<VersionJson> {
        match self {
            Installer::Forge(i) => i.install(ctx).await,
            Installer::Fabric(i) => i.install(ctx).await,
            Installer::Quilt(i) => i.install(ctx).await,
        }
    }
}

/// GET a loader metadata endpoint and decode it.
pub(super) async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> InstallerResult<T> {
    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(InstallerError::LoaderApi(format!(
            "{} returned {}",
            url,
            resp.status()
        )));
    }
    Ok(resp.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_gets_its_own_installer() {
        for kind in [LoaderKind::Forge, LoaderKind::Fabric, LoaderKind::Quilt] {
            assert_eq!(Installer::new(kind).kind(), kind);
        }
    }
}
