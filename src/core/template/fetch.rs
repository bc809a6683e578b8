use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::{StatusCode, Url};

use crate::error::{Error, Result};
use crate::utils::io;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve `<repository>/archive/<archive_name>`, tolerating a trailing slash
/// on the repository URL.
pub fn archive_url(repository: &str, archive_name: &str) -> Result<Url> {
    let mut url = Url::parse(repository).map_err(|e| {
        Error::validation_invalid_argument(
            "repository",
            format!("Invalid repository URL: {}", e),
            Some(repository.to_string()),
            None,
        )
    })?;

    let base = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{}/archive/{}", base, archive_name));
    Ok(url)
}

/// Download the archive at `url` into `destination`.
///
/// The response body is fully read before anything touches the filesystem,
/// so a failed request never leaves a partial archive behind and never
/// creates the workdir. A stale archive
/// from an earlier run is removed first.
pub fn download(url: &Url, destination: &Path, timeout: Duration) -> Result<u64> {
    if destination.exists() {
        fs::remove_file(destination).map_err(|e| {
            Error::internal_io(
                e.to_string(),
                Some(format!("remove stale archive {}", destination.display())),
            )
        })?;
    }

    let client = reqwest::blocking::Client::builder()
        .user_agent(format!("fnship/{}", VERSION))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))?;

    log_status!("template", "HTTP GET {}", url);
    let response = client
        .get(url.clone())
        .send()
        .map_err(|e| Error::template_fetch_failed(url.as_str(), None, e.to_string()))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(Error::template_fetch_failed(
            url.as_str(),
            Some(status.as_u16()),
            status.canonical_reason().unwrap_or("unexpected status"),
        ));
    }

    let bytes = response
        .bytes()
        .map_err(|e| Error::template_fetch_failed(url.as_str(), None, e.to_string()))?;

    log_status!(
        "template",
        "Writing {}Kb to {}",
        bytes.len() / 1024,
        destination.display()
    );
    if let Some(parent) = destination.parent() {
        io::create_dir_all(parent, &format!("create workdir {}", parent.display()))?;
    }
    fs::write(destination, &bytes).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("write {}", destination.display())))
    })?;

    Ok(bytes.len() as u64)
}

/// Remove a downloaded archive if present.
pub fn remove_archive(archive: &Path) -> Result<()> {
    log_status!("template", "Cleaning up zip file...");
    if archive.exists() {
        fs::remove_file(archive).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("remove {}", archive.display())))
        })?;
    }
    Ok(())
}
