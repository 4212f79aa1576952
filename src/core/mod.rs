// ─── Loader Installer Core ───
// Artifact acquisition and processor execution for mod-loader installs.
//
// Architecture:
//   core/
//     maven/     : Coordinate parsing + repository layout paths
//     archive/   : Zip extraction + scoped scratch directories
//     downloader/: Single, batch and mirror-probed downloads, speed estimation
//     version/   : Version manifests, library entries, OS rules
//     library/   : Library set → missing-artifact descriptors
//     processor/ : Install-profile processor pipeline + tool provisioning
//     loaders/   : Forge, Fabric, Quilt front-ends + dispatcher

pub mod archive;
pub mod config;
pub mod downloader;
pub mod error;
pub mod events;
pub mod http;
pub mod library;
pub mod loaders;
pub mod maven;
pub mod processor;
pub mod profile;
pub mod version;
