// ─── Loader Profile ───
// Installer profile (libraries, processors, data table) plus the version manifest.

use std::collections::HashMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::core::version::{LibraryEntry, VersionJson};

/// Side every processor is evaluated against.
pub const CLIENT_SIDE: &str = "client";

/// Key in the data table that resolves to the extracted client patch archive.
pub const BINPATCH_KEY: &str = "BINPATCH";

/// Coordinates shipped inside the installer itself.
pub const FORGE_UNIVERSAL_PREFIX: &str = "net.minecraftforge:forge";

/// Fetched metadata plus version manifest, as handed to the core by a front-end.
#[derive(Debug, Clone)]
pub struct LoaderProfile {
    pub install: InstallProfile,
    pub version: VersionJson,
}

/// Subset of an installer's `install_profile.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallProfile {
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    /// Ordered steps; `None` when no post-processing is required.
    #[serde(default, deserialize_with = "deserialize_processors")]
    pub processors: Option<Vec<ProcessorStep>>,
    #[serde(default)]
    pub data: HashMap<String, DataEntry>,
    /// Coordinate of the loader's own artifact.
    #[serde(default)]
    pub path: Option<String>,
    /// Legacy installers: archive member holding the universal jar.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Archive member holding the version manifest.
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default)]
    pub minecraft: Option<String>,
}

/// One data-table value. Only `client` is ever read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataEntry {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub server: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorStep {
    /// Position or key the step was declared under.
    #[serde(skip)]
    pub name: String,
    pub jar: String,
    #[serde(default)]
    pub classpath: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub sides: Option<Vec<String>>,
    #[serde(default)]
    pub outputs: Option<HashMap<String, String>>,
}

impl ProcessorStep {
    /// A step without `sides` runs everywhere.
    pub fn applies_to(&self, side: &str) -> bool {
        match &self.sides {
            Some(sides) => sides.iter().any(|s| s == side),
            None => true,
        }
    }
}

impl InstallProfile {
    pub fn has_processors(&self) -> bool {
        self.processors.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Steps applicable to `side`, in declaration order.
    pub fn steps_for<'a>(&'a self, side: &'a str) -> impl Iterator<Item = &'a ProcessorStep> + 'a {
        self.processors
            .iter()
            .flatten()
            .filter(move |step| step.applies_to(side))
    }

    /// The loader's own coordinate: explicit `path`, else the universal library.
    pub fn universal_coordinate(&self) -> Option<&str> {
        self.path.as_deref().or_else(|| {
            self.libraries
                .iter()
                .find(|lib| lib.name.starts_with(FORGE_UNIVERSAL_PREFIX))
                .map(|lib| lib.name.as_str())
        })
    }
}

/// Accepts both the array form and the keyed-object form, keeping order.
fn deserialize_processors<'de, D>(deserializer: D) -> Result<Option<Vec<ProcessorStep>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let entries: Vec<(String, serde_json::Value)> = match raw {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        Some(serde_json::Value::Object(map)) => map.into_iter().collect(),
        Some(other) => {
            return Err(D::Error::custom(format!(
                "processors must be an array or object, got {}",
                other
            )))
        }
    };

    entries
        .into_iter()
        .map(|(name, value)| {
            let mut step: ProcessorStep = serde_json::from_value(value).map_err(D::Error::custom)?;
            step.name = name;
            Ok(step)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_processors_are_named_by_position() {
        let profile: InstallProfile = serde_json::from_value(serde_json::json!({
            "processors": [
                {"jar": "a:b:1", "args": ["--x"]},
                {"jar": "c:d:2", "sides": ["server"]}
            ]
        }))
        .unwrap();

        let steps = profile.processors.as_ref().unwrap();
        assert_eq!(steps[0].name, "0");
        assert_eq!(steps[1].name, "1");
        assert_eq!(profile.steps_for(CLIENT_SIDE).count(), 1);
    }

    #[test]
    fn keyed_processors_keep_declaration_order() {
        let profile: InstallProfile = serde_json::from_str(
            r#"{"processors": {"zeta": {"jar": "a:b:1"}, "alpha": {"jar": "c:d:2"}}}"#,
        )
        .unwrap();

        let names: Vec<_> = profile
            .steps_for(CLIENT_SIDE)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn missing_processors_means_no_pipeline() {
        let profile: InstallProfile = serde_json::from_str("{}").unwrap();
        assert!(profile.processors.is_none());
        assert!(!profile.has_processors());
    }

    #[test]
    fn universal_coordinate_prefers_explicit_path() {
        let mut profile: InstallProfile = serde_json::from_value(serde_json::json!({
            "libraries": [{"name": "net.minecraftforge:forge:1.20.1-47.2.0:universal"}]
        }))
        .unwrap();
        assert_eq!(
            profile.universal_coordinate(),
            Some("net.minecraftforge:forge:1.20.1-47.2.0:universal")
        );

        profile.path = Some("net.minecraftforge:forge:1.20.1-47.2.0".into());
        assert_eq!(
            profile.universal_coordinate(),
            Some("net.minecraftforge:forge:1.20.1-47.2.0")
        );
    }
}
