use serde::{Deserialize, Serialize};
use std::fs;

use crate::paths;

/// Root configuration structure for fnship.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FnshipConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via fnship.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_templates")]
    pub templates: TemplatesConfig,

    #[serde(default = "default_build")]
    pub build: BuildConfig,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            templates: default_templates(),
            build: default_build(),
        }
    }
}

/// Configuration for template provisioning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default = "default_repository")]
    pub repository: String,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_archive_name")]
    pub archive_name: String,
}

/// Configuration for the external container tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_tool")]
    pub tool: String,

    #[serde(default = "default_parallel")]
    pub parallel: usize,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_templates() -> TemplatesConfig {
    TemplatesConfig {
        repository: default_repository(),
        fetch_timeout_secs: default_fetch_timeout_secs(),
        archive_name: default_archive_name(),
    }
}

fn default_repository() -> String {
    "https://github.com/openfaas/faas-cli".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    120
}

fn default_archive_name() -> String {
    "master.zip".to_string()
}

fn default_build() -> BuildConfig {
    BuildConfig {
        tool: default_tool(),
        parallel: default_parallel(),
    }
}

fn default_tool() -> String {
    "docker".to_string()
}

fn default_parallel() -> usize {
    1
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load defaults, merging file config with built-in defaults.
/// If fnship.json is missing or invalid, silently returns built-in defaults.
pub fn load_defaults() -> Defaults {
    load_config().defaults
}

/// Load the full fnship.json config, falling back to defaults on any error.
pub fn load_config() -> FnshipConfig {
    load_config_from_file().unwrap_or_default()
}

fn load_config_from_file() -> crate::Result<FnshipConfig> {
    let path = paths::fnship_json()?;

    if !path.exists() {
        return Err(crate::Error::other("fnship.json not found"));
    }

    let content = fs::read_to_string(&path).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    parse_config(&content)
}

fn parse_config(content: &str) -> crate::Result<FnshipConfig> {
    serde_json::from_str(content).map_err(|e| {
        crate::Error::internal_json(e.to_string(), Some("parse fnship.json".to_string()))
    })
}

/// Get built-in defaults (ignoring any file config)
pub fn builtin_defaults() -> Defaults {
    Defaults::default()
}
