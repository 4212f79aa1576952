// ─── Version File ───
// Loader/vanilla version JSON: libraries with OS rules, kept round-trippable
// so it can be written back to `versions/<id>/<id>.json` unchanged.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::error::{InstallerError, InstallerResult};

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// A version manifest. Only the fields the installer reads are typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    pub id: String,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<VersionDownloads>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<DownloadArtifact>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

// ─── Library Entry with Rules ───

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    /// Repository base the library is published under (fabric/quilt style).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<LibraryRule>>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibDownloadArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

// ─── OS Rule Evaluation ───

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

impl LibraryEntry {
    /// Library with only a coordinate, as install profiles often declare them.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: None,
            downloads: None,
            rules: None,
            extra: JsonMap::new(),
        }
    }

    /// Evaluate whether this library should be included for the current OS.
    ///
    /// Rules logic (Mojang launcher semantics):
    /// - If no rules → allowed.
    /// - Process rules top-to-bottom. Start with "disallowed".
    /// - Each rule either sets "allow" or "disallow" if the OS name and arch match
    ///   (an absent field matches anything).
    /// - Final state determines inclusion.
    pub fn is_allowed_for_current_os(&self) -> bool {
        match &self.rules {
            Some(rules) => rules_allow(rules, current_os_name(), current_arch_name()),
            None => true,
        }
    }

    /// Manifest-declared download, if any.
    pub fn artifact_download(&self) -> Option<&LibDownloadArtifact> {
        self.downloads.as_ref()?.artifact.as_ref()
    }
}

fn rules_allow(rules: &[LibraryRule], os_name: &str, arch: &str) -> bool {
    let mut allowed = false;
    for rule in rules {
        let os_matches = rule.os.as_ref().map_or(true, |os| {
            os.name.as_deref().map_or(true, |name| name == os_name)
                && os.arch.as_deref().map_or(true, |a| a == arch)
        });
        if os_matches {
            allowed = rule.action == RuleAction::Allow;
        }
    }
    allowed
}

/// Get the Mojang OS name for the current platform.
pub fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

/// Architecture name as rules spell it (`x86`, `x64`, `arm64`).
pub fn current_arch_name() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        other => other,
    }
}

impl VersionJson {
    /// Fetch and parse a version JSON from the given URL using a shared client.
    pub async fn fetch(client: &reqwest::Client, url: &str) -> InstallerResult<Self> {
        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(InstallerError::DownloadFailed {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let raw = response.text().await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write to `<versions_dir>/<id>/<id>.json`, pretty-printed.
    pub async fn save_to(&self, versions_dir: &Path) -> InstallerResult<std::path::PathBuf> {
        let folder = versions_dir.join(&self.id);
        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(|e| InstallerError::io(&folder, e))?;

        let path = folder.join(format!("{}.json", self.id));
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| InstallerError::io(&path, e))?;

        info!("Wrote version manifest {:?}", path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(action: RuleAction, os: Option<&str>) -> LibraryRule {
        LibraryRule {
            action,
            os: os.map(|name| OsRule {
                name: Some(name.to_string()),
                arch: None,
            }),
        }
    }

    #[test]
    fn no_rules_means_allowed() {
        assert!(LibraryEntry::named("test:lib:1.0").is_allowed_for_current_os());
    }

    #[test]
    fn allow_only_current_os() {
        let mut lib = LibraryEntry::named("test:lib:1.0");
        lib.rules = Some(vec![rule(RuleAction::Allow, Some(current_os_name()))]);
        assert!(lib.is_allowed_for_current_os());
    }

    #[test]
    fn disallow_current_os() {
        let mut lib = LibraryEntry::named("test:lib:1.0");
        lib.rules = Some(vec![
            rule(RuleAction::Allow, None),
            rule(RuleAction::Disallow, Some(current_os_name())),
        ]);
        assert!(!lib.is_allowed_for_current_os());
    }

    #[test]
    fn allow_other_os_only_excludes_this_one() {
        let rules = vec![rule(RuleAction::Allow, Some("osx"))];
        assert!(!rules_allow(&rules, "linux", "x64"));
        assert!(rules_allow(&rules, "osx", "x64"));
    }

    #[test]
    fn arch_restricts_a_matching_os() {
        let rules = vec![
            rule(RuleAction::Allow, None),
            LibraryRule {
                action: RuleAction::Disallow,
                os: Some(OsRule {
                    name: Some("windows".into()),
                    arch: Some("x86".into()),
                }),
            },
        ];
        assert!(!rules_allow(&rules, "windows", "x86"));
        assert!(rules_allow(&rules, "windows", "x64"));
        assert!(rules_allow(&rules, "linux", "x86"));

        let arch_only = vec![LibraryRule {
            action: RuleAction::Allow,
            os: Some(OsRule {
                name: None,
                arch: Some(current_arch_name().to_string()),
            }),
        }];
        let mut lib = LibraryEntry::named("test:lib:1.0");
        lib.rules = Some(arch_only);
        assert!(lib.is_allowed_for_current_os());
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = serde_json::json!({
            "id": "1.20.1-forge-47.2.0",
            "inheritsFrom": "1.20.1",
            "mainClass": "cpw.mods.bootstraplauncher.BootstrapLauncher",
            "libraries": [{
                "name": "cpw.mods:securejarhandler:2.1.10",
                "downloads": {"artifact": {
                    "path": "cpw/mods/securejarhandler/2.1.10/securejarhandler-2.1.10.jar",
                    "url": "https://maven.minecraftforge.net/cpw/mods/securejarhandler/2.1.10/securejarhandler-2.1.10.jar",
                    "sha1": "abc",
                    "size": 88749
                }},
                "natives": {"linux": "natives-linux"}
            }]
        });

        let parsed: VersionJson = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(parsed.libraries[0].artifact_download().unwrap().size, 88749);
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }
}
