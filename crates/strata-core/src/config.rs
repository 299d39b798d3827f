//! Config - 環境変数からの設定読み込み
//!
//! 起動時に一度だけ読み込み、以降はイミュータブル。
//! `from_lookup` は任意のキー参照関数を受け取るので、
//! テストでプロセスの環境変数を書き換える必要はありません。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ModernFormat, ResizeProfile};
use crate::observability::{LogConfig, LogFormat};

pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=3600";
pub const DEFAULT_EXPIRE_HOURS: u32 = 2;
pub const DEFAULT_PUBLISH_GRACE_SECONDS: u64 = 60;
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be defined")]
    Missing(String),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Connection settings for one remote tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3TierConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub region: String,
    /// Path prefix inside the bucket; lets both tiers share one bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendConfig {
    Local {
        incoming: PathBuf,
        active: PathBuf,
    },
    S3 {
        incoming: S3TierConfig,
        active: S3TierConfig,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub temp_folder: PathBuf,
    pub backend: BackendConfig,
    pub profiles: Vec<ResizeProfile>,
    pub generate_webp: bool,
    pub generate_avif: bool,
    pub auto_orient: bool,
    pub cache_control: String,
    pub expire_hours: u32,
    pub publish_grace_seconds: u64,
    pub log: LogConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(&lookup);

        let backend = match env.required("STORAGE_BACKEND")?.as_str() {
            "local" => BackendConfig::Local {
                incoming: env.required("INCOMING_FOLDER")?.into(),
                active: env.required("ACTIVE_FOLDER")?.into(),
            },
            "s3" => BackendConfig::S3 {
                incoming: env.s3_tier("INCOMING")?,
                active: env.s3_tier("ACTIVE")?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND".to_string(),
                    value: other.to_string(),
                    reason: "expected local or s3".to_string(),
                });
            }
        };

        let profiles = match env.get("RESIZING_CONFIG") {
            Some(json) => serde_json::from_str(&json).map_err(|e| ConfigError::Invalid {
                name: "RESIZING_CONFIG".to_string(),
                value: json.clone(),
                reason: e.to_string(),
            })?,
            None => ResizeProfile::defaults(),
        };

        let log = LogConfig {
            level: env.get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format: match env.get("LOG_FORMAT") {
                Some(value) => value.parse().map_err(|e: crate::observability::TracingError| {
                    ConfigError::Invalid {
                        name: "LOG_FORMAT".to_string(),
                        value,
                        reason: e.to_string(),
                    }
                })?,
                None => LogFormat::default(),
            },
        };

        Ok(Self {
            temp_folder: env.required("TEMP_FOLDER")?.into(),
            backend,
            profiles,
            generate_webp: env.flag("GENERATE_WEBP"),
            generate_avif: env.flag("GENERATE_AVIF"),
            auto_orient: env.flag("AUTO_ORIENT_ORIGINAL"),
            cache_control: env
                .get("CACHE_CONTROL")
                .unwrap_or_else(|| DEFAULT_CACHE_CONTROL.to_string()),
            expire_hours: env.parsed("S3_EXPIRE_HOURS", DEFAULT_EXPIRE_HOURS)?,
            publish_grace_seconds: env
                .parsed("PUBLISH_GRACE_SECONDS", DEFAULT_PUBLISH_GRACE_SECONDS)?,
            log,
        })
    }

    /// Modern formats turned on by configuration, before capability filtering.
    pub fn enabled_modern_formats(&self) -> Vec<ModernFormat> {
        let mut formats = Vec::new();
        if self.generate_avif {
            formats.push(ModernFormat::Avif);
        }
        if self.generate_webp {
            formats.push(ModernFormat::Webp);
        }
        formats
    }

    pub fn publish_grace(&self) -> Duration {
        Duration::from_secs(self.publish_grace_seconds)
    }
}

struct Lookup<'a, F>(&'a F);

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Empty values count as unset.
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::Missing(name.to_string()))
    }

    /// Only `1` enables a flag.
    fn flag(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| v == "1")
    }

    fn parsed<T>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name: name.to_string(),
                reason: e.to_string(),
                value,
            }),
            None => Ok(default),
        }
    }

    /// `<TIER>_BUCKET` (optionally `<TIER>_ROOT`) plus credentials under the
    /// prefix named by `<TIER>_PREFIX`.
    fn s3_tier(&self, tier: &str) -> Result<S3TierConfig, ConfigError> {
        let bucket = self.required(&format!("{tier}_BUCKET"))?;
        let prefix = self.required(&format!("{tier}_PREFIX"))?;
        Ok(S3TierConfig {
            endpoint: self.required(&format!("{prefix}_ENDPOINT"))?,
            bucket,
            access_key_id: self.required(&format!("{prefix}_ACCESS_KEY_ID"))?,
            secret_key: self.required(&format!("{prefix}_SECRET_KEY"))?,
            region: self
                .get(&format!("{prefix}_DEFAULT_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            root: self.get(&format!("{tier}_ROOT")),
        })
    }
}
