use rusoto_core::{region::ParseRegionError, Region};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display, Formatter},
    path::PathBuf,
    str::FromStr,
};

/// The full configuration surface for an `ach-sql` instance: where the
/// embedded engine lives, how field masking is applied, which storage
/// backends to enumerate, and what relaxations to pass to the ACH reader.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    pub engine: EngineConfig,

    #[serde(default)]
    pub background_prepare: bool,

    #[serde(default)]
    pub ach_masking: crate::mask::MaskingOptions,

    #[serde(default)]
    pub storage: Vec<StorageBackendConfig>,

    #[serde(default)]
    pub ach_validate_opts: crate::ach::ValidateOpts,
}

/// How the embedded SQL engine's backing file is located and pooled.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Exact path to the SQLite database file. Mutually exclusive with
    /// `directory` in spirit (if both are set, `sqlite_filepath` wins); most
    /// deployments set one or the other.
    #[serde(default)]
    pub sqlite_filepath: Option<PathBuf>,

    /// Directory in which to create a default-named database file, used when
    /// `sqlite_filepath` is not set.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    #[serde(default = "default_max_open_conns")]
    pub max_open_conns: u32,

    #[serde(default = "default_max_idle_conns")]
    pub max_idle_conns: u32,
}

fn default_busy_timeout_ms() -> u32 {
    5_000
}

fn default_max_open_conns() -> u32 {
    8
}

fn default_max_idle_conns() -> u32 {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sqlite_filepath: None,
            directory: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            max_open_conns: default_max_open_conns(),
            max_idle_conns: default_max_idle_conns(),
        }
    }
}

impl EngineConfig {
    /// Resolves the configured location to a concrete file path, defaulting
    /// to an `ach.db` file inside `directory` when no explicit file path was
    /// given.
    pub fn resolved_path(&self) -> Result<PathBuf, String> {
        if let Some(path) = &self.sqlite_filepath {
            return Ok(path.clone());
        }
        if let Some(dir) = &self.directory {
            return Ok(dir.join("ach.db"));
        }
        Err("config: one of engine.sqlite_filepath or engine.directory must be set".to_string())
    }
}

/// One configured file-source backend. A deployment lists these in the order
/// it wants them enumerated; `storage::Repository` fans a listing request out
/// across all of them and concatenates the results.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageBackendConfig {
    Filesystem { directories: Vec<PathBuf> },
    S3 { path: S3Path, source_id: String },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct S3Path {
    pub region: Region,
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum S3PathParseError {
    #[error("not an S3 path")]
    NoPath,
    #[error(
        "S3 path must be in the format `s3://{{region}}/{{bucket name}}/{{optional key prefix}}`"
    )]
    InvalidFormat,
    #[error(transparent)]
    InvalidRegion(#[from] ParseRegionError),
}

impl S3Path {
    /// Returns `self`, possibly adding '/' at the end of the key to ensure it
    /// can be combined with another path as a directory prefix.
    pub fn ensure_directory_prefix(mut self) -> Self {
        if !self.key.is_empty() && !self.key.ends_with('/') {
            self.key.push('/');
        }
        self
    }
}

impl Display for S3Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}/{}", self.region.name(), self.bucket, self.key)
    }
}

impl FromStr for S3Path {
    type Err = S3PathParseError;

    fn from_str(s: &str) -> Result<Self, S3PathParseError> {
        let region_and_bucket = s.strip_prefix("s3://").ok_or(S3PathParseError::NoPath)?;

        let mut components = region_and_bucket
            .splitn(3, '/')
            .take_while(|s| !s.is_empty());
        let region = Region::from_str(components.next().ok_or(S3PathParseError::InvalidFormat)?)?;
        let bucket = components
            .next()
            .ok_or(S3PathParseError::InvalidFormat)?
            .to_owned();
        let key = components.next().map(|s| s.to_owned()).unwrap_or_default();
        assert!(components.next().is_none());

        Ok(S3Path { region, bucket, key })
    }
}

impl Serialize for S3Path {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for S3Path {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_s3path() {
        let p = S3Path::from_str("s3://us-west-2/my-bucket/path/to/object").unwrap();
        assert_eq!(p.region, Region::UsWest2);
        assert_eq!(p.bucket, "my-bucket");
        assert_eq!(p.key, "path/to/object");
    }

    #[test]
    fn parse_s3path_no_key() {
        let p1 = S3Path::from_str("s3://us-west-2/my-bucket").unwrap();
        let p2 = S3Path::from_str("s3://us-west-2/my-bucket/").unwrap();
        assert_eq!(p1.key, "");
        assert_eq!(p1, p2);
    }

    #[test]
    fn parse_s3_invalid_paths() {
        let e = S3Path::from_str("s3://").unwrap_err();
        assert_matches!(e, S3PathParseError::InvalidFormat);
        let e = S3Path::from_str("s3://us-west-2").unwrap_err();
        assert_matches!(e, S3PathParseError::InvalidFormat);
        let e = S3Path::from_str("http://localhost").unwrap_err();
        assert_matches!(e, S3PathParseError::NoPath);
    }

    #[test]
    fn s3path_ensure_prefix() {
        let p = S3Path::from_str("s3://us-west-2/my-bucket/key_prefix").unwrap();
        let p = p.ensure_directory_prefix();
        assert_eq!(p.key, "key_prefix/");
    }

    #[test]
    fn engine_config_resolves_sqlite_filepath_over_directory() {
        let cfg = EngineConfig {
            sqlite_filepath: Some(PathBuf::from("/var/lib/ach.db")),
            directory: Some(PathBuf::from("/var/lib/ach")),
            ..Default::default()
        };
        assert_eq!(cfg.resolved_path().unwrap(), PathBuf::from("/var/lib/ach.db"));
    }

    #[test]
    fn engine_config_falls_back_to_directory() {
        let cfg = EngineConfig {
            sqlite_filepath: None,
            directory: Some(PathBuf::from("/var/lib/ach")),
            ..Default::default()
        };
        assert_eq!(cfg.resolved_path().unwrap(), PathBuf::from("/var/lib/ach/ach.db"));
    }

    #[test]
    fn engine_config_requires_a_location() {
        let cfg = EngineConfig {
            sqlite_filepath: None,
            directory: None,
            ..Default::default()
        };
        assert!(cfg.resolved_path().is_err());
    }
}
