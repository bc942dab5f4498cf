use crate::error::{ErrorKind, Result};
use crate::{BackendConfig, CacheConfig, Config};

impl Config {
    /// Check values that deserialized fine but can't work.
    pub fn validate(&self) -> Result<()> {
        let storage = &self.storage;
        if storage.bucket.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid { field: "storage.bucket", reason: "must not be empty" });
        }
        if !(storage.external_address.starts_with("http://") || storage.external_address.starts_with("https://")) {
            exn::bail!(ErrorKind::Invalid {
                field: "storage.external_address",
                reason: "must be an http:// or https:// URL"
            });
        }
        if storage.assets_folder.is_empty() || storage.assets_folder.contains('/') {
            exn::bail!(ErrorKind::Invalid {
                field: "storage.assets_folder",
                reason: "must be a single, non-empty path segment"
            });
        }
        match &storage.backend {
            BackendConfig::Local { root, .. } if !root.is_absolute() => {
                exn::bail!(ErrorKind::Invalid { field: "storage.backend.root", reason: "must be an absolute path" });
            },
            BackendConfig::Local { poll_interval_ms: Some(0), .. } => {
                exn::bail!(ErrorKind::Invalid {
                    field: "storage.backend.poll_interval_ms",
                    reason: "must be greater than 0"
                });
            },
            BackendConfig::S3 { region, .. } if region.is_empty() => {
                exn::bail!(ErrorKind::Invalid { field: "storage.backend.region", reason: "must not be empty" });
            },
            _ => {},
        }
        match &self.cache {
            CacheConfig::Moka { capacity_bytes: 0, .. } => {
                exn::bail!(ErrorKind::Invalid { field: "cache.capacity_bytes", reason: "must be greater than 0" });
            },
            CacheConfig::Moka { ttl_secs: Some(0), .. } | CacheConfig::Sqlite { ttl_secs: Some(0), .. } => {
                exn::bail!(ErrorKind::Invalid { field: "cache.ttl_secs", reason: "must be greater than 0" });
            },
            _ => {},
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::{BackendConfig, CacheConfig, Config, StorageConfig};
    use rstest::rstest;
    use std::path::PathBuf;

    fn valid() -> Config {
        Config {
            storage: StorageConfig {
                bucket: "test".to_string(),
                external_address: "https://test.ninja".to_string(),
                assets_folder: "assets".to_string(),
                backend: BackendConfig::Local { root: PathBuf::from("/srv/specs"), poll_interval_ms: None },
            },
            cache: CacheConfig::Memory,
        }
    }

    #[test]
    fn test_valid() {
        assert!(valid().validate().is_ok());
    }

    #[rstest]
    #[case::empty_bucket(|c: &mut Config| c.storage.bucket = " ".to_string(), "storage.bucket")]
    #[case::not_a_url(|c: &mut Config| c.storage.external_address = "test.ninja".to_string(), "storage.external_address")]
    #[case::nested_assets(|c: &mut Config| c.storage.assets_folder = "a/b".to_string(), "storage.assets_folder")]
    #[case::empty_assets(|c: &mut Config| c.storage.assets_folder = String::new(), "storage.assets_folder")]
    #[case::relative_root(
        |c: &mut Config| c.storage.backend = BackendConfig::Local { root: PathBuf::from("specs"), poll_interval_ms: None },
        "storage.backend.root"
    )]
    #[case::zero_poll_interval(
        |c: &mut Config| {
            c.storage.backend = BackendConfig::Local { root: PathBuf::from("/srv/specs"), poll_interval_ms: Some(0) }
        },
        "storage.backend.poll_interval_ms"
    )]
    #[case::zero_capacity(
        |c: &mut Config| c.cache = CacheConfig::Moka { capacity_bytes: 0, ttl_secs: None },
        "cache.capacity_bytes"
    )]
    #[case::zero_ttl(
        |c: &mut Config| c.cache = CacheConfig::Moka { capacity_bytes: 1, ttl_secs: Some(0) },
        "cache.ttl_secs"
    )]
    #[case::zero_sqlite_ttl(
        |c: &mut Config| c.cache = CacheConfig::Sqlite { path: PathBuf::from("cache.sqlite"), ttl_secs: Some(0) },
        "cache.ttl_secs"
    )]
    fn test_invalid(#[case] break_it: fn(&mut Config), #[case] expected: &str) {
        let mut config = valid();
        break_it(&mut config);
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { field, .. } if *field == expected));
    }
}
