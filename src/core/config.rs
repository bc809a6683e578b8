//! Run configuration passed explicitly into every pipeline entry point.
//!
//! Nothing in the library reads process-wide flags; the CLI resolves
//! `fnship.json` defaults and flag overrides into one [`PipelineConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::defaults::{self, Defaults};
use crate::error::{Error, Result};
use crate::paths;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base directory holding `template/`, `build/` and the downloaded archive.
    pub workdir: PathBuf,
    /// External container tool, e.g. `docker`.
    pub tool: String,
    pub template_repository: String,
    pub fetch_timeout: Duration,
    pub archive_name: String,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    /// Worker count used when a command does not pass `--parallel`.
    pub parallel: usize,
}

impl PipelineConfig {
    /// Build a config from built-in/file defaults, capturing proxy settings
    /// from the environment once.
    pub fn from_defaults(workdir: impl Into<PathBuf>, defaults: &Defaults) -> Self {
        Self {
            workdir: workdir.into(),
            tool: defaults.build.tool.clone(),
            template_repository: defaults.templates.repository.clone(),
            fetch_timeout: Duration::from_secs(defaults.templates.fetch_timeout_secs),
            archive_name: defaults.templates.archive_name.clone(),
            http_proxy: proxy_from_env("http_proxy"),
            https_proxy: proxy_from_env("https_proxy"),
            parallel: defaults.build.parallel.max(1),
        }
    }

    /// Load `fnship.json` defaults and expand `~` in the workdir.
    pub fn load(workdir: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(workdir).to_string();
        if expanded.trim().is_empty() {
            return Err(Error::validation_invalid_argument(
                "workdir",
                "Working directory cannot be empty",
                None,
                None,
            ));
        }
        Ok(Self::from_defaults(expanded, &defaults::load_defaults()))
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn template_dir(&self) -> PathBuf {
        paths::templates(&self.workdir)
    }

    pub fn language_dir(&self, language: &str) -> PathBuf {
        paths::template(&self.workdir, language)
    }

    pub fn archive_path(&self) -> PathBuf {
        paths::archive(&self.workdir, &self.archive_name)
    }
}

fn proxy_from_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
