//! Test configuration: which pages, which sections, which deployments.
//!
//! The on-disk shape uses PascalCase keys, so existing `pageList.json`
//! files load unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file extension could not be determined
    #[error("could not determine config format from path: {0}")]
    UnknownExtension(String),

    /// The file format is not supported
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A parsing error occurred
    #[error("parse error: {0}")]
    Parse(String),

    /// The configuration parsed but cannot drive a run
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Browser engine to drive. Webkit stands in for Safari.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Chromium,
    Firefox,
    Webkit,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chromium => write!(f, "chromium"),
            Self::Firefox => write!(f, "firefox"),
            Self::Webkit => write!(f, "webkit"),
        }
    }
}

/// Base URLs of the two deployments under comparison.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UrlPair {
    pub old: String,
    pub new: String,
}

/// Static test configuration, read once at startup.
///
/// BTreeMaps give the stable iteration order the capture paths and the
/// report layout rely on.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestConfig {
    /// Page id → opaque request key (report labeling only)
    pub page_ids: BTreeMap<String, String>,
    /// Section label → DOM query expected to resolve on every page
    pub section_selectors: BTreeMap<String, String>,
    pub urls: UrlPair,
    /// Engines to run; each gets its own output subfolder and report
    #[serde(default = "default_engines")]
    pub engines: Vec<EngineKind>,
}

fn default_engines() -> Vec<EngineKind> {
    vec![EngineKind::Chromium]
}

impl TestConfig {
    /// Load a configuration file, dispatching on its extension
    /// (`.json`, `.yaml`, `.yml`).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnknownExtension(path.display().to_string()))?;

        let raw = std::fs::read_to_string(path)?;
        let config: Self = match ext.to_ascii_lowercase().as_str() {
            "json" => {
                serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            "yaml" | "yml" => {
                serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.page_ids.is_empty() {
            return Err(ConfigError::Invalid("PageIds must not be empty".into()));
        }
        if self.section_selectors.is_empty() {
            return Err(ConfigError::Invalid(
                "SectionSelectors must not be empty".into(),
            ));
        }
        if self.urls.old.is_empty() || self.urls.new.is_empty() {
            return Err(ConfigError::Invalid(
                "Urls.Old and Urls.New must both be set".into(),
            ));
        }
        if self.engines.is_empty() {
            return Err(ConfigError::Invalid("Engines must not be empty".into()));
        }
        Ok(())
    }
}

/// Everything one invocation needs, built once at the orchestration
/// boundary and threaded as a parameter from there.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub config: TestConfig,
    /// Root under which runs accumulate, e.g. `testOutput`
    pub output_root: PathBuf,
    /// Timestamp-derived folder name shared by every engine of this run
    pub run_label: String,
}

impl RunConfig {
    pub fn new(config: TestConfig, output_root: impl Into<PathBuf>, started: DateTime<Local>) -> Self {
        Self {
            config,
            output_root: output_root.into(),
            run_label: run_label(started),
        }
    }

    /// `{output_root}/{run_label}`
    pub fn run_dir(&self) -> PathBuf {
        self.output_root.join(&self.run_label)
    }

    /// `{output_root}/{run_label}/{engine}`
    pub fn engine_dir(&self, engine: EngineKind) -> PathBuf {
        self.run_dir().join(engine.to_string())
    }
}

/// Folder name for one run: local time at second granularity. Zero-padded
/// so run folders sort lexicographically.
pub fn run_label(at: DateTime<Local>) -> String {
    at.format("%Y.%m.%d.%H.%M.%S").to_string()
}
