mod artifact;

pub use artifact::{resolve, ArtifactPath, MavenArtifact, DEFAULT_EXTENSION};

/// Well-known Maven repositories used by the loader ecosystem.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";
pub const CREEPERHOST_MAVEN: &str = "https://maven.creeperhost.net";
pub const FABRIC_MAVEN: &str = "https://maven.fabricmc.net";
pub const QUILT_MAVEN: &str = "https://maven.quiltmc.org/repository/release";

/// Ranked mirror list consulted before manifest-declared URLs.
pub fn default_mirrors() -> Vec<String> {
    [FORGE_MAVEN, CREEPERHOST_MAVEN, MOJANG_LIBRARIES]
        .iter()
        .map(|m| m.to_string())
        .collect()
}
