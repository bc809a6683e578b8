//! Selective extraction of the `template/` subtree from a source archive.
//!
//! Extraction runs in two passes over the archive's central directory. The
//! first pass classifies every entry and fixes one write decision per
//! language before anything is written; the second pass applies those
//! decisions. A language is therefore either written in full or not at all,
//! regardless of what the second pass itself creates on disk.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek};
use std::path::{Component, Path};

use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::paths;

const TEMPLATE_PREFIX: &str = "template/";

/// Write decision for one language, computed once per provisioning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePlan {
    pub name: String,
    pub writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryKind {
    /// `template/<language>/` itself.
    LanguageRoot,
    /// Anything below a language root.
    Content,
}

#[derive(Debug, Clone)]
struct PlannedEntry {
    index: usize,
    relative_path: String,
    is_dir: bool,
    kind: EntryKind,
    /// Index into `ExpansionPlan::languages`.
    language: usize,
}

#[derive(Debug, Default)]
struct ExpansionPlan {
    languages: Vec<LanguagePlan>,
    entries: Vec<PlannedEntry>,
}

impl ExpansionPlan {
    fn language_index(&mut self, name: &str, workdir: &Path, overwrite: bool) -> usize {
        if let Some(idx) = self.languages.iter().position(|l| l.name == name) {
            return idx;
        }
        let writable = overwrite || !paths::template(workdir, name).exists();
        self.languages.push(LanguagePlan {
            name: name.to_string(),
            writable,
        });
        self.languages.len() - 1
    }
}

/// Languages skipped because they already exist, and languages written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    pub pre_existing: Vec<String>,
    pub fetched: Vec<String>,
}

/// Expand the `template/` subtree of the archive at `archive_path` into `workdir`.
pub fn expand_archive(archive_path: &Path, workdir: &Path, overwrite: bool) -> Result<Expansion> {
    let file = File::open(archive_path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("open {}", archive_path.display())))
    })?;
    let mut archive = ZipArchive::new(file).map_err(|e| {
        Error::template_archive_invalid(archive_path.display().to_string(), e.to_string())
    })?;

    let plan = plan_entries(&mut archive, archive_path, workdir, overwrite)?;
    apply_plan(&mut archive, &plan, workdir)
}

fn plan_entries<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    archive_path: &Path,
    workdir: &Path,
    overwrite: bool,
) -> Result<ExpansionPlan> {
    let mut plan = ExpansionPlan::default();

    for index in 0..archive.len() {
        let entry = archive.by_index(index).map_err(|e| {
            Error::template_archive_invalid(archive_path.display().to_string(), e.to_string())
        })?;
        let name = entry.name().to_string();
        let is_dir = entry.is_dir();
        drop(entry);

        let relative_path = strip_archive_root(&name);
        if !relative_path.starts_with(TEMPLATE_PREFIX) {
            continue;
        }
        if !is_enclosed(relative_path) {
            return Err(Error::template_archive_invalid(
                archive_path.display().to_string(),
                format!("entry escapes the template directory: {}", name),
            ));
        }

        // The bare `template/` entry and loose files directly inside it
        // belong to no language and are never written.
        let segments: Vec<&str> = relative_path.trim_end_matches('/').split('/').collect();
        let (kind, language) = match segments.as_slice() {
            [_, language] if is_dir => (EntryKind::LanguageRoot, *language),
            [_, language, _, ..] => (EntryKind::Content, *language),
            _ => continue,
        };
        let language = plan.language_index(language, workdir, overwrite);

        plan.entries.push(PlannedEntry {
            index,
            relative_path: relative_path.to_string(),
            is_dir,
            kind,
            language,
        });
    }

    Ok(plan)
}

fn apply_plan<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    plan: &ExpansionPlan,
    workdir: &Path,
) -> Result<Expansion> {
    let mut expansion = Expansion::default();

    for planned in &plan.entries {
        let language = &plan.languages[planned.language];

        if planned.kind == EntryKind::LanguageRoot {
            if language.writable {
                expansion.fetched.push(language.name.clone());
            } else {
                expansion.pre_existing.push(language.name.clone());
            }
        }

        if !language.writable {
            continue;
        }

        let target = workdir.join(&planned.relative_path);
        if planned.is_dir {
            create_dir(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }

        let mut entry = archive.by_index(planned.index).map_err(|e| {
            Error::template_archive_invalid(planned.relative_path.clone(), e.to_string())
        })?;
        let size = entry.size();
        let mode = entry.unix_mode();
        write_entry(&mut entry, size, mode, &target)?;
    }

    Ok(expansion)
}

/// Drop the synthetic top-level folder source-export archives wrap around
/// the repository (`faas-cli-master/template/...` -> `template/...`).
fn strip_archive_root(name: &str) -> &str {
    match name.find('/') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

fn is_enclosed(relative_path: &str) -> bool {
    Path::new(relative_path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

fn create_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("create directory {}", dir.display())))
    })
}

fn write_entry<R: Read>(reader: &mut R, size: u64, mode: Option<u32>, target: &Path) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode.map(|m| m & 0o777).unwrap_or(0o644));
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut out = options.open(target).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("create {}", target.display())))
    })?;

    io::copy(&mut reader.take(size), &mut out).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("write {}", target.display())))
    })?;

    Ok(())
}
