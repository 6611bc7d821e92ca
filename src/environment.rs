//! Ambient host environment.
//!
//! The pipeline never reads process or UI globals directly. Everything the
//! enricher and the session need (user agent, screen and viewport sizes,
//! current path, timings) comes from an [`Environment`] the host provides.

use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::PerformanceTiming;

/// Point-in-time view of the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub user_agent: String,
    pub screen_size: String,
    pub language: String,
    #[serde(default)]
    pub referrer: String,
    pub platform: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub title: String,
    pub viewport_size: String,
    #[serde(default)]
    pub performance: PerformanceTiming,
}

fn default_path() -> String {
    "/".to_string()
}

/// Source of ambient context. Must be cheap: it is read on every tracking call.
pub trait Environment: Send + Sync {
    fn snapshot(&self) -> EnvironmentSnapshot;
}

/// Mutable environment owned by the host application.
///
/// The host updates location, title and viewport as it navigates; the
/// pipeline only reads.
#[derive(Debug)]
pub struct HostEnvironment {
    inner: RwLock<EnvironmentSnapshot>,
}

impl HostEnvironment {
    pub fn new(snapshot: EnvironmentSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    /// Describe the current process: crate name/version as user agent,
    /// OS as platform, `LANG` as language.
    pub fn from_process() -> Self {
        let language = std::env::var("LANG")
            .ok()
            .and_then(|lang| lang.split('.').next().map(|l| l.replace('_', "-")))
            .filter(|l| !l.is_empty() && l != "C" && l != "POSIX")
            .unwrap_or_else(|| "en-US".to_string());

        Self::new(EnvironmentSnapshot {
            user_agent: format!(
                "{}/{} ({}; {})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
            screen_size: "unknown".to_string(),
            language,
            referrer: String::new(),
            platform: std::env::consts::OS.to_string(),
            path: default_path(),
            title: String::new(),
            viewport_size: "unknown".to_string(),
            performance: PerformanceTiming::default(),
        })
    }

    /// Load a snapshot from a TOML descriptor.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: EnvironmentSnapshot = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("bad environment file {}: {e}", path.display()))
        })?;
        Ok(Self::new(snapshot))
    }

    pub fn set_path(&self, path: impl Into<String>) {
        self.write(|s| s.path = path.into());
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.write(|s| s.title = title.into());
    }

    pub fn set_viewport(&self, width: u32, height: u32) {
        self.write(|s| s.viewport_size = format!("{width}x{height}"));
    }

    pub fn set_performance(&self, performance: PerformanceTiming) {
        self.write(|s| s.performance = performance);
    }

    fn write(&self, f: impl FnOnce(&mut EnvironmentSnapshot)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

impl Environment for HostEnvironment {
    fn snapshot(&self) -> EnvironmentSnapshot {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
