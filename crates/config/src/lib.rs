//! Layered configuration for speccy.
//!
//! Loading precedence (highest wins):
//! 1. Environment variables prefixed with `SPECCY_`, nested keys split on
//!    `__` (e.g. `SPECCY_STORAGE__BUCKET`).
//! 2. An explicit config file (TOML, YAML or JSON, chosen by extension).
//! 3. `config.toml` in the per-user config directory, if it exists.
//! 4. Built-in defaults.
//!
//! ```yaml
//! storage:
//!   bucket: test
//!   external_address: https://test.ninja
//!   backend:
//!     type: local
//!     root: /srv/specs
//!     poll_interval_ms: 2000
//! cache:
//!   type: moka
//!   capacity_bytes: 67108864
//! ```

pub mod error;
mod validate;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "SPECCY_";
pub const DEFAULT_ASSETS_FOLDER: &str = "assets";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding one directory of artifacts per identifier.
    pub bucket: String,
    /// Public base address that asset links in documentation are rewritten to.
    pub external_address: String,
    /// Folder name, relative to each identifier, that assets live in.
    #[serde(default = "default_assets_folder")]
    pub assets_folder: String,
    pub backend: BackendConfig,
}

fn default_assets_folder() -> String {
    DEFAULT_ASSETS_FOLDER.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Local {
        root: PathBuf,
        /// How often to rescan the bucket for changes.
        #[serde(default)]
        poll_interval_ms: Option<u64>,
    },
    S3 {
        #[serde(default)]
        prefix: Option<String>,
        region: String,
        /// Custom endpoint for S3-compatible services.
        #[serde(default)]
        endpoint: Option<String>,
        key_id: String,
        key_secret: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheConfig {
    #[default]
    Memory,
    Moka {
        capacity_bytes: u64,
        #[serde(default)]
        ttl_secs: Option<u64>,
    },
    /// `path` may be `:memory:` for a private, non-persistent database.
    Sqlite {
        path: PathBuf,
        #[serde(default)]
        ttl_secs: Option<u64>,
    },
}

impl BackendConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        match self {
            Self::Local { poll_interval_ms: Some(ms), .. } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::Moka { ttl_secs: Some(secs), .. } | Self::Sqlite { ttl_secs: Some(secs), .. } => {
                Some(Duration::from_secs(*secs))
            },
            _ => None,
        }
    }
}

impl Config {
    /// Load configuration from every source, then validate it.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let user = Self::user_config_path();
        Self::load_from(explicit, user.as_deref(), ENV_PREFIX)
    }

    /// `config.toml` in the platform's per-user config directory.
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "speccy").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn load_from(explicit: Option<&Path>, user: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::default("storage.assets_folder", DEFAULT_ASSETS_FOLDER))
            .merge(Serialized::default("cache.type", "memory"));
        if let Some(user) = user.filter(|path| path.is_file()) {
            tracing::debug!(path = %user.display(), "Loading user configuration");
            figment = figment.merge(Toml::file(user));
        }
        if let Some(path) = explicit {
            figment = figment.merge(Self::file_provider(path)?);
        }
        figment = figment.merge(Env::prefixed(env_prefix).map(|key| key.as_str().to_lowercase().into()).split("__"));

        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn file_provider(path: &Path) -> Result<Figment> {
        if !path.is_file() {
            exn::bail!(ErrorKind::Invalid { field: "config file", reason: "file does not exist" });
        }
        tracing::debug!(path = %path.display(), "Loading configuration file");
        let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => Figment::from(Toml::file(path)),
            Some("yaml" | "yml") => Figment::from(Yaml::file(path)),
            Some("json") => Figment::from(Json::file(path)),
            _ => exn::bail!(ErrorKind::Invalid { field: "config file", reason: "expected a .toml, .yaml or .json file" }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    // Nothing in the environment uses this prefix, so env never interferes.
    const NO_ENV: &str = "SPECCY_TEST_UNSET_";

    const YAML: &str = "
storage:
  bucket: test
  external_address: https://test.ninja
  backend:
    type: local
    root: /srv/specs
";

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_fill_the_gaps() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "speccy.yaml", YAML);
        let config = Config::load_from(Some(&path), None, NO_ENV).unwrap();
        assert_eq!(config.storage.bucket, "test");
        assert_eq!(config.storage.assets_folder, "assets");
        assert_eq!(
            config.storage.backend,
            BackendConfig::Local { root: PathBuf::from("/srv/specs"), poll_interval_ms: None }
        );
        assert_eq!(config.cache, CacheConfig::Memory);
    }

    #[test]
    fn test_toml_and_json() {
        let dir = TempDir::new().unwrap();
        let toml = write(
            &dir,
            "speccy.toml",
            r#"
[storage]
bucket = "test"
external_address = "https://test.ninja"
assets_folder = "static"
[storage.backend]
type = "s3"
region = "eu-west-1"
key_id = "id"
key_secret = "secret"
[cache]
type = "moka"
capacity_bytes = 1024
ttl_secs = 60
"#,
        );
        let config = Config::load_from(Some(&toml), None, NO_ENV).unwrap();
        assert_eq!(config.storage.assets_folder, "static");
        assert!(matches!(config.storage.backend, BackendConfig::S3 { ref prefix, .. } if prefix.is_none()));
        assert_eq!(config.cache.ttl(), Some(Duration::from_secs(60)));

        let json = write(
            &dir,
            "speccy.json",
            r#"{"storage":{"bucket":"b","external_address":"http://x","backend":{"type":"local","root":"/tmp","poll_interval_ms":250}},
                "cache":{"type":"sqlite","path":"cache.sqlite"}}"#,
        );
        let config = Config::load_from(Some(&json), None, NO_ENV).unwrap();
        assert_eq!(config.cache, CacheConfig::Sqlite { path: PathBuf::from("cache.sqlite"), ttl_secs: None });
        assert_eq!(config.storage.backend.poll_interval(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_explicit_file_overrides_user_file() {
        let dir = TempDir::new().unwrap();
        let user = write(
            &dir,
            "user.toml",
            "[storage]\nbucket = \"from-user\"\nassets_folder = \"media\"\n",
        );
        let explicit = write(&dir, "speccy.yaml", YAML);
        let config = Config::load_from(Some(&explicit), Some(&user), NO_ENV).unwrap();
        assert_eq!(config.storage.bucket, "test");
        assert_eq!(config.storage.assets_folder, "media");
    }

    #[rstest]
    #[case("speccy.ini")]
    #[case("speccy")]
    fn test_unknown_extension(#[case] name: &str) {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, name, YAML);
        let err = Config::load_from(Some(&path), None, NO_ENV).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { field: "config file", .. }));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load_from(Some(Path::new("/definitely/not/here.toml")), None, NO_ENV).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { field: "config file", .. }));
    }

    #[test]
    fn test_missing_required_field() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "speccy.toml", "[storage]\nbucket = \"test\"\n");
        let err = Config::load_from(Some(&path), None, NO_ENV).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load));
    }
}
