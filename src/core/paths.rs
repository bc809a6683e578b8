use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Base fnship config directory (universal ~/.config/fnship/ on all platforms)
pub fn fnship() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("fnship"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("fnship"))
    }
}

/// Global fnship.json config file path
pub fn fnship_json() -> Result<PathBuf> {
    Ok(fnship()?.join("fnship.json"))
}

// Workdir layout. Everything below is relative to the run's working directory.

/// Provisioned templates: `<workdir>/template`
pub fn templates(workdir: &Path) -> PathBuf {
    workdir.join("template")
}

/// One language's template tree: `<workdir>/template/<language>`
pub fn template(workdir: &Path, language: &str) -> PathBuf {
    templates(workdir).join(language)
}

/// Assembled build contexts: `<workdir>/build`
pub fn builds(workdir: &Path) -> PathBuf {
    workdir.join("build")
}

/// Build context for one function: `<workdir>/build/<function>`
pub fn build_context(workdir: &Path, function: &str) -> PathBuf {
    builds(workdir).join(function)
}

/// Overlaid handler inside a build context: `<workdir>/build/<function>/function`
pub fn build_function(workdir: &Path, function: &str) -> PathBuf {
    build_context(workdir, function).join("function")
}

/// Downloaded template archive: `<workdir>/<archive_name>`
pub fn archive(workdir: &Path, archive_name: &str) -> PathBuf {
    workdir.join(archive_name)
}
