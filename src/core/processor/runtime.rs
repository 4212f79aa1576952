// ─── Java Runtime ───
// Mojang-published Java runtimes under `<root>/runtime/<component>`, with a
// version-checked system Java as fallback for platforms Mojang does not serve.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::downloader::{ArtifactDescriptor, DownloadBatch, Downloader, HashAlgorithm};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::version::VersionJson;

pub const JAVA_RUNTIME_INDEX_URL: &str = "https://launchermeta.mojang.com/v1/products/java-runtime/2ec0cc96c44e5a76b9c8b7c39df7210883d12871/all.json";

/// Label carried by the runtime batch's progress events.
const RUNTIME_CATEGORY: &str = "java";

/// Runtime a game version asks for through `javaVersion`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaRequirement {
    pub component: String,
    pub major: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JavaVersionField {
    component: String,
    major_version: u32,
}

impl JavaRequirement {
    /// Read `javaVersion`; versions that predate it fall back to a guess from
    /// the version id.
    pub fn for_version(version: &VersionJson) -> Self {
        version
            .extra
            .get("javaVersion")
            .cloned()
            .and_then(|value| serde_json::from_value::<JavaVersionField>(value).ok())
            .map(|field| Self {
                component: field.component,
                major: field.major_version,
            })
            .unwrap_or_else(|| {
                let major = required_java_for_minecraft_version(&version.id);
                Self {
                    component: component_for_major(major).to_string(),
                    major,
                }
            })
    }
}

pub fn required_java_for_minecraft_version(minecraft_version: &str) -> u32 {
    let lower = minecraft_version.to_ascii_lowercase();
    if let Some(week_pos) = lower.find('w') {
        if let Ok(year) = lower[..week_pos].parse::<u32>() {
            return if year >= 24 { 21 } else { 17 };
        }
    }

    let mut parts = minecraft_version
        .split('.')
        .map(|p| p.split('-').next().unwrap_or(p).parse::<u32>().ok());
    let major = parts.next().flatten().unwrap_or(1);
    let minor = parts.next().flatten().unwrap_or(20);
    let patch = parts.next().flatten().unwrap_or(0);

    if major > 1 || minor >= 21 || (minor == 20 && patch >= 5) {
        21
    } else if minor >= 17 {
        17
    } else {
        8
    }
}

fn component_for_major(major: u32) -> &'static str {
    match major {
        0..=8 => "jre-legacy",
        9..=16 => "java-runtime-alpha",
        17..=20 => "java-runtime-gamma",
        _ => "java-runtime-delta",
    }
}

/// Key of the current platform in the runtime index.
pub fn runtime_platform() -> Option<&'static str> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("windows", "x86_64") => Some("windows-x64"),
        ("windows", "x86") => Some("windows-x86"),
        ("windows", "aarch64") => Some("windows-arm64"),
        ("macos", "x86_64") => Some("mac-os"),
        ("macos", "aarch64") => Some("mac-os-arm64"),
        ("linux", "x86_64") => Some("linux"),
        ("linux", "x86") => Some("linux-i386"),
        _ => None,
    }
}

// ── Index and manifest ──────────────────────────────────

#[derive(Debug, Deserialize)]
struct RuntimeRelease {
    manifest: ManifestRef,
    #[serde(default)]
    version: Option<ReleaseVersion>,
}

#[derive(Debug, Deserialize)]
struct ManifestRef {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseVersion {
    name: String,
}

/// platform → component → releases, newest first.
type RuntimeIndex = HashMap<String, HashMap<String, Vec<RuntimeRelease>>>;

#[derive(Debug, Deserialize)]
struct RuntimeManifest {
    files: BTreeMap<String, RuntimeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RuntimeEntry {
    Directory,
    File {
        #[serde(default)]
        executable: bool,
        downloads: RuntimeDownloads,
    },
    Link {
        target: String,
    },
}

#[derive(Debug, Deserialize)]
struct RuntimeDownloads {
    raw: RawDownload,
}

#[derive(Debug, Deserialize)]
struct RawDownload {
    url: String,
    sha1: String,
    #[serde(default)]
    size: u64,
}

async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> InstallerResult<T> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(InstallerError::DownloadFailed {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    Ok(response.json().await?)
}

// ── Installation ────────────────────────────────────────

/// Install the Mojang runtime for `requirement` under `runtime_dir`.
///
/// Returns `None` when the index publishes nothing for this platform and
/// component.
pub async fn install_runtime(
    downloader: &Downloader,
    runtime_dir: &Path,
    requirement: &JavaRequirement,
    index_url: &str,
    platform: &str,
) -> InstallerResult<Option<PathBuf>> {
    let mut index: RuntimeIndex = get_json(downloader.client(), index_url).await?;
    let Some(release) = index
        .get_mut(platform)
        .and_then(|components| components.remove(&requirement.component))
        .and_then(|releases| releases.into_iter().next())
    else {
        debug!(
            "No {} runtime published for {}",
            requirement.component, platform
        );
        return Ok(None);
    };

    let manifest: RuntimeManifest = get_json(downloader.client(), &release.manifest.url).await?;
    let root = runtime_dir.join(&requirement.component);
    info!(
        "Installing Java runtime {} ({}) into {:?}",
        requirement.component,
        release.version.as_ref().map_or("unknown", |v| v.name.as_str()),
        root
    );

    let mut descriptors = Vec::new();
    let mut hashes = Vec::new();
    let mut executables = Vec::new();
    let mut links = Vec::new();

    for (relative, entry) in &manifest.files {
        let path = root.join(relative);
        match entry {
            RuntimeEntry::Directory => {
                tokio::fs::create_dir_all(&path)
                    .await
                    .map_err(|e| InstallerError::io(&path, e))?;
            }
            RuntimeEntry::File {
                executable,
                downloads,
            } => {
                if *executable {
                    executables.push(path.clone());
                }
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    continue;
                }
                hashes.push((path.clone(), downloads.raw.sha1.clone()));
                descriptors.push(ArtifactDescriptor {
                    url: downloads.raw.url.clone(),
                    destination_folder: path.parent().unwrap_or(&root).to_path_buf(),
                    destination_path: path,
                    file_name: relative.clone(),
                    expected_size: downloads.raw.size,
                });
            }
            RuntimeEntry::Link { target } => links.push((path, target.clone())),
        }
    }

    downloader
        .fetch_batch(DownloadBatch::new(
            descriptors,
            downloader.concurrency(),
            RUNTIME_CATEGORY,
        ))
        .await?;
    for (path, sha1) in &hashes {
        Downloader::verify_file(path, sha1, HashAlgorithm::Sha1).await?;
    }

    for path in &executables {
        mark_executable(path)?;
    }
    for (path, target) in &links {
        create_link(path, target)?;
    }

    Ok(Some(locate_java_binary(&root)))
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> InstallerResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| InstallerError::io(path, e))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> InstallerResult<()> {
    Ok(())
}

#[cfg(unix)]
fn create_link(path: &Path, target: &str) -> InstallerResult<()> {
    if path.symlink_metadata().is_ok() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| InstallerError::io(parent, e))?;
    }
    std::os::unix::fs::symlink(target, path).map_err(|e| InstallerError::io(path, e))
}

// Windows runtimes publish no links.
#[cfg(not(unix))]
fn create_link(_path: &Path, _target: &str) -> InstallerResult<()> {
    Ok(())
}

fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

fn locate_java_binary(runtime_root: &Path) -> PathBuf {
    let primary = runtime_root.join("bin").join(java_exe());
    if primary.exists() {
        return primary;
    }
    let mac_layout = runtime_root
        .join("jre.bundle")
        .join("Contents")
        .join("Home")
        .join("bin")
        .join(java_exe());
    if mac_layout.exists() {
        return mac_layout;
    }
    primary
}

// ── System fallback ─────────────────────────────────────

/// `JAVA_HOME/bin/java`, else the first `java` on `PATH`, whichever reports
/// at least `required_major`.
pub async fn find_java(required_major: u32) -> InstallerResult<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = std::env::var_os("JAVA_HOME") {
        candidates.push(PathBuf::from(home).join("bin").join(java_exe()));
    }
    if let Some(paths) = std::env::var_os("PATH") {
        candidates.extend(std::env::split_paths(&paths).map(|dir| dir.join(java_exe())));
    }
    pick_java(&candidates, required_major).await
}

async fn pick_java(candidates: &[PathBuf], required_major: u32) -> InstallerResult<PathBuf> {
    let mut too_old: Option<(PathBuf, u32)> = None;
    for candidate in candidates.iter().filter(|c| c.is_file()) {
        match java_major(candidate).await {
            Some(major) if major >= required_major => {
                debug!("Using system Java {} at {:?}", major, candidate);
                return Ok(candidate.clone());
            }
            Some(major) => {
                warn!(
                    "Java {} at {:?} is older than the required {}",
                    major, candidate, required_major
                );
                too_old.get_or_insert((candidate.clone(), major));
            }
            None => warn!("Could not read a Java version from {:?}", candidate),
        }
    }

    Err(match too_old {
        Some((path, found)) => InstallerError::IncompatibleJava {
            path,
            found,
            required: required_major,
        },
        None => InstallerError::MissingExternalDependency {
            what: "java",
            path: PathBuf::from(java_exe()),
        },
    })
}

/// Major version reported by `java -version`.
async fn java_major(path: &Path) -> Option<u32> {
    let output = tokio::process::Command::new(path)
        .arg("-version")
        .output()
        .await
        .ok()?;
    let text = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );
    parse_version_string(&text).map(|v| parse_major_version(&v))
}

/// First quoted token, e.g. `openjdk version "17.0.8" 2023-07-18`.
fn parse_version_string(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let start = line.find('"')?;
        let end = line[start + 1..].find('"')?;
        Some(line[start + 1..start + 1 + end].to_string())
    })
}

/// `1.8.0_382` is Java 8, `17.0.8` is Java 17.
fn parse_major_version(version: &str) -> u32 {
    let mut parts = version.split(['.', '_', '-', '+']);
    let first: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    if first == 1 {
        parts.next().and_then(|p| p.parse().ok()).unwrap_or(first)
    } else {
        first
    }
}
