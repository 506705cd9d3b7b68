//! Layered runtime settings.
//!
//! Settings are merged from, in increasing priority:
//!
//! 1. built-in defaults,
//! 2. an optional TOML file,
//! 3. `COFFER_*` environment variables (`COFFER_QUEUE_CAPACITY=64`).
//!
//! ```no_run
//! let settings = coffer_config::Settings::load(Some("/etc/coffer.toml".as_ref()))?;
//! println!("cache lives in {}", settings.cache_dir.display());
//! # Ok::<(), coffer_config::error::Error>(())
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "COFFER_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the local object cache (`<cache_dir>/vfs/...`).
    pub cache_dir: PathBuf,
    /// Capacity of the queue between an importer and the snapshot builder.
    /// Tuning only; never affects results.
    pub queue_capacity: usize,
    /// Upper bound on concurrent metadata lookups inside an importer.
    pub max_concurrency: usize,
    /// Client identifier recorded in snapshot headers.
    pub client: String,
    /// Host name importers record as the origin of a source.
    pub origin: String,
}

impl Default for Settings {
    fn default() -> Self {
        let cache_dir = ProjectDirs::from("", "", "coffer")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("coffer"));
        Self {
            cache_dir,
            queue_capacity: 1024,
            max_concurrency: 8,
            client: format!("coffer/{}", env!("CARGO_PKG_VERSION")),
            origin: default_origin(),
        }
    }
}

/// `/etc/hostname` where present, `localhost` otherwise.
fn default_origin() -> String {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

impl Settings {
    /// Figment with every provider merged, before extraction.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load and validate settings.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(file))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let settings: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        settings.validate()?;
        tracing::debug!(cache_dir = %settings.cache_dir.display(), "Loaded settings");
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            exn::bail!(ErrorKind::Invalid("queue_capacity must be at least 1".to_string()));
        }
        if self.max_concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("max_concurrency must be at least 1".to_string()));
        }
        if self.client.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("client must not be empty".to_string()));
        }
        if self.origin.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("origin must not be empty".to_string()));
        }
        Ok(())
    }

    /// Settings rooted in a specific cache directory, everything else default.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self { cache_dir: cache_dir.into(), ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert!(settings.client.starts_with("coffer/"));
    }

    #[test]
    fn file_then_environment() {
        Jail::expect_with(|jail| {
            jail.create_file("coffer.toml", "queue_capacity = 16\nclient = \"from-file\"\ncache_dir = \"/var/cache/c\"")?;
            jail.set_env("COFFER_CLIENT", "from-env");
            let settings = Settings::load(Some(Path::new("coffer.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(settings.queue_capacity, 16);
            assert_eq!(settings.client, "from-env");
            assert_eq!(settings.cache_dir, PathBuf::from("/var/cache/c"));
            assert_eq!(settings.max_concurrency, Settings::default().max_concurrency);
            assert_eq!(settings.origin, Settings::default().origin);
            Ok(())
        });
    }

    #[test]
    fn origin_is_configurable() {
        assert!(!Settings::default().origin.is_empty());
        Jail::expect_with(|jail| {
            jail.create_file("coffer.toml", "origin = \"nas-01\"\nmax_concurrency = 2")?;
            let settings = Settings::load(Some(Path::new("coffer.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(settings.origin, "nas-01");
            assert_eq!(settings.max_concurrency, 2);
            jail.set_env("COFFER_ORIGIN", "laptop");
            let settings = Settings::load(Some(Path::new("coffer.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(settings.origin, "laptop");
            Ok(())
        });
    }

    #[test]
    fn missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let settings = Settings::load(Some(Path::new("absent.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }

    #[rstest]
    #[case("COFFER_QUEUE_CAPACITY", "0")]
    #[case("COFFER_MAX_CONCURRENCY", "0")]
    #[case("COFFER_CLIENT", " ")]
    #[case("COFFER_ORIGIN", "")]
    fn out_of_range_values_are_rejected(#[case] name: &str, #[case] value: &str) {
        Jail::expect_with(|jail| {
            jail.set_env(name, value);
            let err = Settings::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn malformed_file_is_a_load_error() {
        Jail::expect_with(|jail| {
            jail.create_file("coffer.toml", "queue_capacity = \"many\"")?;
            let err = Settings::load(Some(Path::new("coffer.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }
}
