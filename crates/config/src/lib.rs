//! Layered configuration for koma.
//!
//! Values resolve in order: built-in defaults, then an optional config
//! file (TOML, YAML, or JSON by extension; defaults to the platform config
//! directory), then `KOMA_*` environment variables (`KOMA_LIBRARY__WORKERS`
//! style nesting). The result is validated before anything touches the
//! filesystem or the database.

pub mod error;

use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use koma_archive::{Grouping, SortKey};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::error::{ErrorKind, Result};

const ENV_PREFIX: &str = "KOMA_";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub library: LibraryConfig,
    pub database: DatabaseConfig,
    /// Optional media server to poke after archives are published.
    #[serde(default)]
    pub media_server: Option<MediaServerConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    /// Root directory the download client writes gallery folders into.
    pub download_root: PathBuf,
    /// Where published archives go. Archiving is disabled when unset.
    #[serde(default)]
    pub archive_root: Option<PathBuf>,
    /// Images with a smaller dimension above this are re-encoded down to it.
    #[serde(default = "default_max_image_dimension")]
    pub max_image_dimension: u32,
    #[serde(default)]
    pub grouping: Grouping,
    #[serde(default)]
    pub sort: SortKey,
    /// Upper bound on galleries processed concurrently in one pass.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite database file; created on first run.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaServerConfig {
    pub kind: MediaServerKind,
    pub base_url: String,
    pub library_id: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum MediaServerKind {
    #[serde(rename = "komga")]
    Komga,
}

fn default_max_image_dimension() -> u32 {
    // The download client hands out images up to roughly this size anyway;
    // anything larger is usually an original-resolution re-download.
    768
}

fn default_workers() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: LibraryConfig {
                download_root: PathBuf::from("download"),
                archive_root: None,
                max_image_dimension: default_max_image_dimension(),
                grouping: Grouping::default(),
                sort: SortKey::default(),
                workers: default_workers(),
            },
            database: DatabaseConfig { path: PathBuf::from("koma.db") },
            media_server: None,
        }
    }
}

impl Config {
    /// Load and validate configuration, optionally from an explicit file.
    ///
    /// Without an explicit path, the platform config directory is consulted
    /// (`config.toml` under the `koma` project directory) and silently
    /// skipped when absent.
    #[instrument(skip(path))]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_file(),
        };
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "merging config file");
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(&file)),
                Some("json") => figment.merge(Json::file(&file)),
                _ => figment.merge(Toml::file(&file)),
            };
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would misbehave at runtime rather than fail fast.
    pub fn validate(&self) -> Result<()> {
        if self.library.workers == 0 {
            exn::bail!(ErrorKind::Invalid("library.workers"));
        }
        if self.library.max_image_dimension == 0 {
            exn::bail!(ErrorKind::Invalid("library.max_image_dimension"));
        }
        if let Some(archive_root) = &self.library.archive_root
            && archive_root == &self.library.download_root
        {
            // Archiving into the folder being scanned would make every
            // published archive show up as a gallery candidate.
            exn::bail!(ErrorKind::Invalid("library.archive_root"));
        }
        if let Some(media_server) = &self.media_server
            && (media_server.base_url.is_empty() || media_server.library_id.is_empty())
        {
            exn::bail!(ErrorKind::Invalid("media_server.base_url"));
        }
        Ok(())
    }
}

fn default_config_file() -> Option<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "koma")?;
    let path = dirs.config_dir().join("config.toml");
    path.exists().then_some(path)
}
