use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::core::error::{InstallerError, InstallerResult};

/// Default archive extension applied when a coordinate carries no `@ext`.
pub const DEFAULT_EXTENSION: &str = "jar";

/// Represents a fully parsed Maven coordinate.
///
/// Supported formats:
///   `groupId:artifactId:version`
///   `groupId:artifactId:version:classifier`
///   `groupId:artifactId:version:classifier@extension`
///   `groupId:artifactId:version@extension`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    /// Explicit `@extension` override, if the coordinate carried one.
    pub extension: Option<String>,
}

/// Location of an artifact inside a maven-layout tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactPath {
    /// `group/path/artifact/version`, always `/`-separated.
    pub relative_dir: String,
    pub file_name: String,
}

impl MavenArtifact {
    /// Parse a Maven coordinate string.
    ///
    /// Fails with [`InstallerError::MalformedCoordinate`] when fewer than three
    /// non-empty `:`-separated segments are present. Segments past the
    /// classifier are ignored.
    ///
    /// # Examples
    /// ```
    /// use loader_installer::core::maven::MavenArtifact;
    ///
    /// let a = MavenArtifact::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
    /// assert_eq!(a.group_id, "net.sf.jopt-simple");
    /// ```
    pub fn parse(coord: &str) -> InstallerResult<Self> {
        let coord = coord.trim();

        // Split off @extension first
        let (coord_part, extension) = match coord.rfind('@') {
            Some(idx) => (&coord[..idx], Some(&coord[idx + 1..])),
            None => (coord, None),
        };

        let parts: Vec<&str> = coord_part.split(':').collect();
        if parts.len() < 3 || parts[..3].iter().any(|p| p.is_empty()) {
            return Err(InstallerError::MalformedCoordinate(coord.to_string()));
        }

        Ok(Self {
            group_id: parts[0].to_string(),
            artifact_id: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: parts
                .get(3)
                .filter(|c| !c.is_empty())
                .map(|c| c.to_string()),
            extension: extension.filter(|e| !e.is_empty()).map(str::to_string),
        })
    }

    /// Construct the group path portion (`net/sf/jopt-simple`).
    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    /// `artifactId-version[-classifier]`, without any extension.
    fn base_name(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{}-{}", self.artifact_id, self.version, c),
            None => format!("{}-{}", self.artifact_id, self.version),
        }
    }

    /// Default layout path: `artifactId-version[-classifier].ext`.
    pub fn path(&self) -> ArtifactPath {
        self.path_with(None, None)
    }

    /// Layout path with an optional native suffix (e.g. `-clientdata`) and
    /// extension override (e.g. `lzma`).
    ///
    /// An `@ext` carried by the coordinate wins over both: the file name is then
    /// `artifactId-version[-classifier].ext` with no suffix applied.
    pub fn path_with(&self, native_suffix: Option<&str>, extension: Option<&str>) -> ArtifactPath {
        let file_name = match &self.extension {
            Some(ext) => format!("{}.{}", self.base_name(), ext),
            None => format!(
                "{}{}.{}",
                self.base_name(),
                native_suffix.unwrap_or(""),
                extension
                    .map(|e| e.trim_start_matches('.'))
                    .unwrap_or(DEFAULT_EXTENSION)
            ),
        };

        ArtifactPath {
            relative_dir: format!(
                "{}/{}/{}",
                self.group_path(),
                self.artifact_id,
                self.version
            ),
            file_name,
        }
    }

    /// Build the artifact filename.
    pub fn filename(&self) -> String {
        self.path().file_name
    }

    /// Construct the full URL for this artifact under the given repository base.
    ///
    /// Template:
    /// `<repo>/<group_path>/<artifact_id>/<version>/<filename>`
    pub fn url(&self, repo_base: &str) -> String {
        self.path().url(repo_base)
    }

    /// Local path relative to the libraries directory.
    pub fn local_path(&self) -> PathBuf {
        self.path().local_path()
    }
}

impl ArtifactPath {
    /// `relative_dir/file_name` as a native relative path.
    pub fn local_path(&self) -> PathBuf {
        self.relative_dir
            .split('/')
            .fold(PathBuf::new(), |acc, part| acc.join(part))
            .join(&self.file_name)
    }

    /// Suffix appended to a mirror base URL.
    pub fn url_suffix(&self) -> String {
        format!("{}/{}", self.relative_dir, self.file_name)
    }

    pub fn url(&self, repo_base: &str) -> String {
        format!("{}/{}", repo_base.trim_end_matches('/'), self.url_suffix())
    }
}

/// Resolve a coordinate string straight to its layout path.
pub fn resolve(
    coordinate: &str,
    native_suffix: Option<&str>,
    extension: Option<&str>,
) -> InstallerResult<ArtifactPath> {
    Ok(MavenArtifact::parse(coordinate)?.path_with(native_suffix, extension))
}

impl fmt::Display for MavenArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(c) = &self.classifier {
            write!(f, ":{}", c)?;
        }
        if let Some(ext) = &self.extension {
            write!(f, "@{}", ext)?;
        }
        Ok(())
    }
}
