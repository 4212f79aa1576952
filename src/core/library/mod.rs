// ─── Library Resolver ───
// Turns a profile's library lists into download-ready descriptors for the
// entries missing from `<root>/libraries`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::downloader::{ArtifactDescriptor, BatchReport, DownloadBatch, Downloader};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven;
use crate::core::version::{current_os_name, LibraryEntry};

/// Category name carried by `check` events.
pub const LIBRARIES_CATEGORY: &str = "libraries";

/// Result of one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct LibraryResolution {
    /// Missing libraries with a usable source.
    pub descriptors: Vec<ArtifactDescriptor>,
    /// Sum of the descriptors' expected sizes.
    pub total_size: u64,
    /// Missing libraries no mirror or manifest URL could serve.
    pub unavailable: Vec<String>,
    /// Entries accounted for, excluded ones included.
    pub checked: usize,
}

impl LibraryResolution {
    pub fn is_complete(&self) -> bool {
        self.descriptors.is_empty() && self.unavailable.is_empty()
    }

    pub fn into_batch(self, concurrency: usize) -> (DownloadBatch, Vec<String>) {
        (
            DownloadBatch::new(self.descriptors, concurrency, LIBRARIES_CATEGORY),
            self.unavailable,
        )
    }
}

/// Merge two library lists, keeping the first entry seen for each name.
pub fn dedup_libraries<'a>(
    libraries: &'a [LibraryEntry],
    extra: Option<&'a [LibraryEntry]>,
) -> Vec<&'a LibraryEntry> {
    let mut seen = HashSet::new();
    libraries
        .iter()
        .chain(extra.unwrap_or_default())
        .filter(|lib| seen.insert(lib.name.as_str()))
        .collect()
}

pub struct LibraryResolver<'a> {
    downloader: &'a Downloader,
    libs_dir: PathBuf,
    mirrors: &'a [String],
}

impl<'a> LibraryResolver<'a> {
    pub fn new(downloader: &'a Downloader, libs_dir: &Path, mirrors: &'a [String]) -> Self {
        Self {
            downloader,
            libs_dir: libs_dir.to_path_buf(),
            mirrors,
        }
    }

    /// Resolve the merged, deduplicated library set.
    ///
    /// Entries whose name contains one of `skip` (libraries the installer ships
    /// itself) and entries excluded by OS rules are counted but never fetched.
    /// A malformed coordinate aborts the pass.
    pub async fn resolve(
        &self,
        libraries: &[LibraryEntry],
        extra: Option<&[LibraryEntry]>,
        skip: &[&str],
    ) -> InstallerResult<LibraryResolution> {
        let merged = dedup_libraries(libraries, extra);
        let total = merged.len();
        let events = self.downloader.events();

        let mut resolution = LibraryResolution::default();
        let mut destinations = HashSet::new();

        for (index, lib) in merged.into_iter().enumerate() {
            events.check(index, total, LIBRARIES_CATEGORY);
            resolution.checked += 1;

            if skip.iter().any(|s| lib.name.contains(s)) {
                debug!("Skipping bundled library {}", lib.name);
                continue;
            }
            if !lib.is_allowed_for_current_os() {
                debug!("Skipping {} (rules exclude {})", lib.name, current_os_name());
                continue;
            }

            let artifact = maven::resolve(&lib.name, None, None)?;
            let destination_folder = self.libs_dir.join(
                artifact
                    .relative_dir
                    .split('/')
                    .fold(PathBuf::new(), |acc, part| acc.join(part)),
            );
            let destination_path = destination_folder.join(&artifact.file_name);

            if tokio::fs::try_exists(&destination_path).await.unwrap_or(false) {
                continue;
            }
            if !destinations.insert(destination_path.clone()) {
                continue;
            }

            match self.locate(lib, &artifact).await {
                Some((url, expected_size)) => {
                    resolution.total_size += expected_size;
                    resolution.descriptors.push(ArtifactDescriptor {
                        url,
                        destination_folder,
                        destination_path,
                        file_name: artifact.file_name,
                        expected_size,
                    });
                }
                None => {
                    warn!("No source available for {}", lib.name);
                    resolution.unavailable.push(lib.name.clone());
                }
            }
        }

        info!(
            "Resolved {} libraries: {} to download ({} bytes), {} unavailable",
            resolution.checked,
            resolution.descriptors.len(),
            resolution.total_size,
            resolution.unavailable.len()
        );
        Ok(resolution)
    }

    /// Pick a URL and expected size for one missing library.
    async fn locate(
        &self,
        lib: &LibraryEntry,
        artifact: &maven::ArtifactPath,
    ) -> Option<(String, u64)> {
        // Libraries published to their own repository are looked up there only.
        if let Some(repo) = lib.url.as_deref().filter(|u| !u.is_empty()) {
            let url = artifact.url(repo);
            return match self.downloader.probe_url(&url).await {
                Some(size) => Some((url, size)),
                None => {
                    let size = lib.artifact_download().map(|a| a.size).unwrap_or(0);
                    Some((url, size))
                }
            };
        }

        if let Some(hit) = self
            .downloader
            .probe_mirrors(&artifact.url_suffix(), self.mirrors)
            .await
        {
            return Some((hit.url, hit.size));
        }

        lib.artifact_download()
            .filter(|a| !a.url.is_empty())
            .map(|a| (a.url.clone(), a.size))
    }

    /// Resolve and download what is missing. Every library without a source
    /// gets its own `error` event; the rest of the batch is still fetched.
    pub async fn install(
        &self,
        libraries: &[LibraryEntry],
        extra: Option<&[LibraryEntry]>,
        skip: &[&str],
    ) -> InstallerResult<BatchReport> {
        let resolution = self.resolve(libraries, extra, skip).await?;
        let (batch, unavailable) = resolution.into_batch(self.downloader.concurrency());
        for name in &unavailable {
            self.downloader.events().error(name.clone());
        }

        match (self.downloader.fetch_batch(batch).await, unavailable.is_empty()) {
            (Ok(report), true) => Ok(report),
            (Ok(_), false) => Err(InstallerError::NoSourceAvailable(unavailable)),
            (Err(InstallerError::BatchIncomplete { failed }), false) => {
                Err(InstallerError::LibrariesIncomplete {
                    failed,
                    unavailable,
                })
            }
            (Err(e), _) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{self, EventSink, InstallEvent};
    use crate::core::http::build_http_client;
    use crate::core::version::{LibraryRule, OsRule, RuleAction};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PRESENT: &str = "org.ow2.asm:asm:9.5";
    const ABSENT: &str = "net.sf.jopt-simple:jopt-simple:5.0.4";
    const ABSENT_PATH: &str = "/net/sf/jopt-simple/jopt-simple/5.0.4/jopt-simple-5.0.4.jar";

    fn downloader() -> Downloader {
        Downloader::new(build_http_client().unwrap(), EventSink::disabled())
    }

    fn place(libs: &Path, coordinate: &str) {
        let file = libs.join(maven::resolve(coordinate, None, None).unwrap().local_path());
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(file, b"jar").unwrap();
    }

    #[tokio::test]
    async fn second_mirror_hit_yields_one_descriptor_then_none() {
        let mirror1 = MockServer::start().await;
        let mirror2 = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mirror1)
            .await;
        Mock::given(method("HEAD"))
            .and(path(ABSENT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 1234])
                    .insert_header("content-length", "1234"),
            )
            .mount(&mirror2)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let libs = temp.path().join("libraries");
        place(&libs, PRESENT);

        let libraries = vec![LibraryEntry::named(PRESENT), LibraryEntry::named(ABSENT)];
        let mirrors = vec![mirror1.uri(), mirror2.uri()];
        let dl = downloader();
        let resolver = LibraryResolver::new(&dl, &libs, &mirrors);

        let first = resolver.resolve(&libraries, None, &[]).await.unwrap();
        assert_eq!(first.descriptors.len(), 1);
        let d = &first.descriptors[0];
        assert_eq!(d.url, format!("{}{}", mirror2.uri(), ABSENT_PATH));
        assert_eq!(d.expected_size, 1234);
        assert_eq!(d.file_name, "jopt-simple-5.0.4.jar");
        assert_eq!(first.checked, 2);

        place(&libs, ABSENT);
        let second = resolver.resolve(&libraries, None, &[]).await.unwrap();
        assert!(second.descriptors.is_empty());
        assert!(second.is_complete());
    }

    #[tokio::test]
    async fn all_present_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        place(temp.path(), PRESENT);
        place(temp.path(), ABSENT);

        let mirrors = vec![server.uri()];
        let dl = downloader();
        let resolution = LibraryResolver::new(&dl, temp.path(), &mirrors)
            .resolve(
                &[LibraryEntry::named(PRESENT)],
                Some([LibraryEntry::named(ABSENT)].as_slice()),
                &[],
            )
            .await
            .unwrap();
        assert!(resolution.is_complete());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut first = LibraryEntry::named(PRESENT);
        first.url = Some("https://first".into());
        let mut dup = LibraryEntry::named(PRESENT);
        dup.url = Some("https://second".into());
        let extra = vec![dup, LibraryEntry::named(ABSENT)];

        let merged = dedup_libraries(std::slice::from_ref(&first), Some(extra.as_slice()));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].url.as_deref(), Some("https://first"));
    }

    #[tokio::test]
    async fn excluded_entries_are_counted_not_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 3])
                    .insert_header("content-length", "3"),
            )
            .expect(0)
            .mount(&server)
            .await;

        let mut foreign = LibraryEntry::named("org.lwjgl:lwjgl:3.3.1:natives-other");
        foreign.rules = Some(vec![LibraryRule {
            action: RuleAction::Allow,
            os: Some(OsRule {
                name: Some("plan9".into()),
                arch: None,
            }),
        }]);
        let bundled = LibraryEntry::named("net.minecraftforge:forge:1.20.1-47.2.0:universal");

        let temp = tempfile::tempdir().unwrap();
        let mirrors = vec![server.uri()];
        let (sink, mut rx) = events::channel();
        let dl = Downloader::new(build_http_client().unwrap(), sink);

        let resolution = LibraryResolver::new(&dl, temp.path(), &mirrors)
            .resolve(&[foreign, bundled], None, &["net.minecraftforge:forge:"])
            .await
            .unwrap();

        assert!(resolution.descriptors.is_empty());
        assert_eq!(resolution.checked, 2);

        let mut checks = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let InstallEvent::Check { index, total, .. } = event {
                checks.push((index, total));
            }
        }
        assert_eq!(checks, vec![(0, 2), (1, 2)]);
    }

    #[tokio::test]
    async fn manifest_artifact_is_the_fallback_with_its_own_size() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let lib: LibraryEntry = serde_json::from_value(serde_json::json!({
            "name": ABSENT,
            "downloads": {"artifact": {"url": "https://cdn.example/jopt.jar", "size": 78146}}
        }))
        .unwrap();

        let temp = tempfile::tempdir().unwrap();
        let mirrors = vec![server.uri()];
        let dl = downloader();
        let resolution = LibraryResolver::new(&dl, temp.path(), &mirrors)
            .resolve(&[lib], None, &[])
            .await
            .unwrap();

        assert_eq!(resolution.descriptors[0].url, "https://cdn.example/jopt.jar");
        assert_eq!(resolution.descriptors[0].expected_size, 78146);
        assert_eq!(resolution.total_size, 78146);
    }

    #[tokio::test]
    async fn own_repository_miss_still_uses_that_repository() {
        let repo = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&repo)
            .await;

        let mut lib = LibraryEntry::named("org.quiltmc:quilt-loader:0.21.0");
        lib.url = Some(format!("{}/", repo.uri()));

        let temp = tempfile::tempdir().unwrap();
        let dl = downloader();
        let resolution = LibraryResolver::new(&dl, temp.path(), &[])
            .resolve(&[lib], None, &[])
            .await
            .unwrap();

        let d = &resolution.descriptors[0];
        assert_eq!(
            d.url,
            format!(
                "{}/org/quiltmc/quilt-loader/0.21.0/quilt-loader-0.21.0.jar",
                repo.uri()
            )
        );
        assert_eq!(d.expected_size, 0);
    }

    fn error_events(rx: &mut tokio::sync::mpsc::UnboundedReceiver<InstallEvent>) -> Vec<String> {
        let mut errors = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let InstallEvent::Error(detail) = event {
                errors.push(detail);
            }
        }
        errors
    }

    #[tokio::test]
    async fn unavailable_library_is_surfaced_after_the_batch() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path(ABSENT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 4])
                    .insert_header("content-length", "4"),
            )
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ABSENT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abcd".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let mirrors = vec![server.uri()];
        let dl = downloader();
        let err = LibraryResolver::new(&dl, temp.path(), &mirrors)
            .install(
                &[LibraryEntry::named("com.example:ghost:1.0"), LibraryEntry::named(ABSENT)],
                None,
                &[],
            )
            .await
            .unwrap_err();

        match err {
            InstallerError::NoSourceAvailable(names) => {
                assert_eq!(names, vec!["com.example:ghost:1.0"])
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(temp
            .path()
            .join(maven::resolve(ABSENT, None, None).unwrap().local_path())
            .exists());
    }

    #[tokio::test]
    async fn every_unavailable_library_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let mirrors = vec![server.uri()];
        let (sink, mut rx) = events::channel();
        let dl = Downloader::new(build_http_client().unwrap(), sink);
        let err = LibraryResolver::new(&dl, temp.path(), &mirrors)
            .install(
                &[
                    LibraryEntry::named("com.example:ghost1:1.0"),
                    LibraryEntry::named("com.example:ghost2:1.0"),
                ],
                None,
                &[],
            )
            .await
            .unwrap_err();

        let expected = vec!["com.example:ghost1:1.0", "com.example:ghost2:1.0"];
        match err {
            InstallerError::NoSourceAvailable(names) => assert_eq!(names, expected),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(error_events(&mut rx), expected);
    }

    #[tokio::test]
    async fn batch_failure_does_not_hide_unavailable_libraries() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path(ABSENT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 4])
                    .insert_header("content-length", "4"),
            )
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ABSENT_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let mirrors = vec![server.uri()];
        let (sink, mut rx) = events::channel();
        let dl = Downloader::new(build_http_client().unwrap(), sink);
        let err = LibraryResolver::new(&dl, temp.path(), &mirrors)
            .install(
                &[LibraryEntry::named("com.example:ghost:1.0"), LibraryEntry::named(ABSENT)],
                None,
                &[],
            )
            .await
            .unwrap_err();

        match err {
            InstallerError::LibrariesIncomplete {
                failed,
                unavailable,
            } => {
                assert_eq!(failed, vec!["jopt-simple-5.0.4.jar"]);
                assert_eq!(unavailable, vec!["com.example:ghost:1.0"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let errors = error_events(&mut rx);
        assert!(errors.iter().any(|e| e == "com.example:ghost:1.0"));
        assert!(errors.iter().any(|e| e.starts_with("jopt-simple-5.0.4.jar")));
    }

    #[tokio::test]
    async fn malformed_coordinate_aborts_resolution() {
        let temp = tempfile::tempdir().unwrap();
        let dl = downloader();
        let err = LibraryResolver::new(&dl, temp.path(), &[])
            .resolve(&[LibraryEntry::named("just-a-name")], None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, InstallerError::MalformedCoordinate(_)));
    }
}
