//! Language template provisioning.
//!
//! Templates live under `<workdir>/template/<language>/`. They are fetched as
//! a source-export zip of a repository and only the repository's `template/`
//! directory is expanded. Languages already present on disk are kept unless
//! the caller asks to overwrite them.

mod expand;
mod fetch;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::manifest::DOCKERFILE_LANGUAGE;
use crate::utils::io;

pub use expand::{expand_archive, Expansion, LanguagePlan};
pub use fetch::archive_url;

const GITHUB_REPOSITORY: &str = r"^https://github.com/([a-z0-9-]+)/([a-z0-9-]+)/?$";
const LOOPBACK_REPOSITORY: &str = r"^http://127.0.0.1:\d+/([a-z0-9-]+)/([a-z0-9-]+)$";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    pub command: String,
    pub repository: String,
    /// Languages that already existed and were not overwritten.
    pub pre_existing: Vec<String>,
    /// Languages written by this pass.
    pub fetched: Vec<String>,
}

/// `template.yml` shipped inside each language template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageTemplate {
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fprocess: Option<String>,
}

/// Fetch templates from `repository` (or the configured default) and expand
/// them into the workdir.
///
/// Network failures, non-200 responses and unreadable archives abort before
/// anything is written under `template/`. A filesystem error while writing an
/// entry aborts the remainder of the pass; files already written stay. The
/// downloaded archive is removed on every path once it exists.
pub fn fetch_and_expand(
    config: &PipelineConfig,
    repository: Option<&str>,
    overwrite: bool,
) -> Result<ProvisionReport> {
    let repository = match repository.map(str::trim) {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => config.template_repository.clone(),
    };

    let url = fetch::archive_url(&repository, &config.archive_name)?;
    let archive = config.archive_path();

    fetch::download(&url, &archive, config.fetch_timeout)?;

    log_status!("template", "Attempting to expand templates from {}", archive.display());
    let expansion = match expand::expand_archive(&archive, config.workdir(), overwrite) {
        Ok(expansion) => expansion,
        Err(err) => {
            let _ = fetch::remove_archive(&archive);
            return Err(err);
        }
    };

    if !expansion.pre_existing.is_empty() {
        log_status!(
            "template",
            "Cannot overwrite the following {} directories: {:?}",
            expansion.pre_existing.len(),
            expansion.pre_existing
        );
    }
    log_status!(
        "template",
        "Fetched {} template(s) : {:?} from {}",
        expansion.fetched.len(),
        expansion.fetched,
        repository
    );

    fetch::remove_archive(&archive)?;

    Ok(ProvisionReport {
        command: "template.pull".to_string(),
        repository,
        pre_existing: expansion.pre_existing,
        fetched: expansion.fetched,
    })
}

/// Provision templates only when `<workdir>/template` is missing.
pub fn ensure_templates(
    config: &PipelineConfig,
    repository: Option<&str>,
) -> Result<Option<ProvisionReport>> {
    if config.template_dir().exists() {
        return Ok(None);
    }

    log_status!("template", "No templates found in {}", config.workdir().display());
    fetch_and_expand(config, repository, false)
        .map(Some)
        .map_err(|e| e.with_hint("Unable to download templates; check the repository URL or network"))
}

/// A language is usable if it is the Dockerfile sentinel or its template
/// directory carries a parseable `template.yml`.
pub fn is_valid_template(config: &PipelineConfig, language: &str) -> bool {
    if language.eq_ignore_ascii_case(DOCKERFILE_LANGUAGE) {
        return true;
    }
    if language.trim().is_empty() {
        return false;
    }
    load_language_template(config, language).is_ok()
}

pub fn load_language_template(config: &PipelineConfig, language: &str) -> Result<LanguageTemplate> {
    let path = config.language_dir(language).join("template.yml");
    let content = io::read_file(&path, &format!("read {}", path.display()))?;
    serde_yml::from_str(&content).map_err(|e| {
        Error::config_invalid_value("template.yml", Some(path.display().to_string()), e.to_string())
    })
}

/// Accept `https://github.com/<owner>/<repo>` or a loopback test server.
pub fn validate_repository_url(url: &str) -> Result<()> {
    let pattern = format!("{}|{}", GITHUB_REPOSITORY, LOOPBACK_REPOSITORY);
    let re = Regex::new(&pattern).map_err(|e| Error::internal_unexpected(e.to_string()))?;
    if re.is_match(url) {
        Ok(())
    } else {
        Err(Error::validation_invalid_argument(
            "repository",
            "The repository URL must be in the format https://github.com/<owner>/<repository>",
            Some(url.to_string()),
            None,
        ))
    }
}
