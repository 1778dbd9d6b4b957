//! Configuration of sessions and backend selection.
//!
//! Searches config directories for `clwise/config.json`,
//! then applies `CLWISE_*` environment variables.
//! If file is not found or fails to parse, defaults are used.

use crate::backend::{BackendKind, OpenCLConfig};
use nanoserde::DeJson;

/// Options of one device session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Keep compiled operations for the lifetime of the session.
    /// If disabled, operations are compiled for every dispatch.
    /// default = true
    pub caching_enabled: bool,
    /// Options passed to device compiler
    /// default = ""
    pub build_options: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig { caching_enabled: true, build_options: String::new() }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_caching(mut self, caching_enabled: bool) -> Self {
        self.caching_enabled = caching_enabled;
        self
    }

    #[must_use]
    pub fn with_build_options(mut self, build_options: impl Into<String>) -> Self {
        self.build_options = build_options.into();
        self
    }
}

/// Complete configuration
#[derive(Debug, Default, Clone)]
pub struct Config {
    pub session: SessionConfig,
    /// Which backend [`crate::initialize_backend`] creates
    pub backend: BackendKind,
    /// `OpenCL` configuration
    pub opencl: OpenCLConfig,
}

// Layout of config.json, all keys are optional
#[derive(Debug, Default, DeJson)]
struct ConfigFile {
    caching_enabled: Option<bool>,
    build_options: Option<String>,
    backend: Option<String>,
    opencl: Option<OpenCLConfig>,
}

impl BackendKind {
    fn from_name(name: &str) -> Option<BackendKind> {
        match name.trim().to_ascii_lowercase().as_str() {
            "opencl" => Some(BackendKind::OpenCL),
            "dummy" => Some(BackendKind::Dummy),
            _ => None,
        }
    }
}

impl Config {
    /// Load config file from config directories and apply environment overrides
    #[must_use]
    pub fn load() -> Config {
        let mut config = xdg::BaseDirectories::new()
            .map_err(|e| log::warn!("Failed to find config directories for config.json, {e}"))
            .ok()
            .map(|bd| {
                let mut dirs = vec![bd.get_config_home()];
                dirs.extend(bd.get_config_dirs());
                dirs
            })
            .and_then(|paths| {
                paths.into_iter().find_map(|mut path| {
                    path.push("clwise/config.json");
                    let file = std::fs::read_to_string(&path).ok()?;
                    log::debug!("Reading config from {}", path.display());
                    Some(file)
                })
            })
            .map_or_else(
                || {
                    log::debug!("No config.json found, using defaults.");
                    Config::default()
                },
                |file| Config::from_json(&file),
            );
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    /// Parse config from json, falling back to defaults for missing
    /// or invalid keys
    #[must_use]
    pub fn from_json(json: &str) -> Config {
        let file = match ConfigFile::deserialize_json(json) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Failed to parse config.json, {e}, using defaults.");
                return Config::default();
            }
        };
        let mut config = Config::default();
        if let Some(caching_enabled) = file.caching_enabled {
            config.session.caching_enabled = caching_enabled;
        }
        if let Some(build_options) = file.build_options {
            config.session.build_options = build_options;
        }
        if let Some(name) = file.backend {
            match BackendKind::from_name(&name) {
                Some(kind) => config.backend = kind,
                None => log::warn!(
                    "Unknown backend {name:?} in config.json, using {:?}.",
                    config.backend
                ),
            }
        }
        if let Some(opencl) = file.opencl {
            config.opencl = opencl;
        }
        config
    }

    /// Apply `CLWISE_CACHING`, `CLWISE_BACKEND` and `CLWISE_BUILD_OPTIONS`,
    /// reading variables through `var`
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(x) = var("CLWISE_CACHING") {
            match x.trim() {
                "1" | "true" => self.session.caching_enabled = true,
                "0" | "false" => self.session.caching_enabled = false,
                _ => log::warn!("Ignoring CLWISE_CACHING={x:?}, expected 0 or 1"),
            }
        }
        if let Some(x) = var("CLWISE_BACKEND") {
            match BackendKind::from_name(&x) {
                Some(kind) => self.backend = kind,
                None => log::warn!("Ignoring CLWISE_BACKEND={x:?}, expected opencl or dummy"),
            }
        }
        if let Some(x) = var("CLWISE_BUILD_OPTIONS") {
            self.session.build_options = x;
        }
    }
}
