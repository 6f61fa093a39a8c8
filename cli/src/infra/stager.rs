//! Filesystem implementation of the `TemplateStager` port.
//!
//! Copies a Terraform template into a fresh temporary directory so parallel
//! runs never share `.terraform/` or state files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::application::ports::{StagedTemplate, TemplateStager, WorkdirGuard};
use crate::domain::error::StagingError;

/// Hidden entries that still belong in a working copy.
const KEPT_HIDDEN: &[&str] = &[".terraform-version", ".terraform.lock.hcl", ".tool-versions"];

/// Local state and auto-loaded variable files that must not leak into a run.
const SKIPPED_FILES: &[&str] = &[
    "terraform.tfstate",
    "terraform.tfstate.backup",
    "terraform.tfvars",
    "terraform.tfvars.json",
];

impl WorkdirGuard for TempDir {
    fn persist(self: Box<Self>) -> PathBuf {
        (*self).keep()
    }
}

/// Production stager backed by `tempfile`.
pub struct FsTemplateStager;

impl TemplateStager for FsTemplateStager {
    async fn stage(
        &self,
        source: &Path,
        working_dir_hint: Option<&Path>,
        aux_files: &[PathBuf],
    ) -> Result<StagedTemplate> {
        let source = source.to_path_buf();
        let hint = working_dir_hint.map(Path::to_path_buf);
        let aux_files = aux_files.to_vec();
        tokio::task::spawn_blocking(move || stage_blocking(&source, hint.as_deref(), &aux_files))
            .await
            .context("spawn_blocking for template staging")?
    }
}

fn stage_blocking(
    source: &Path,
    working_dir_hint: Option<&Path>,
    aux_files: &[PathBuf],
) -> Result<StagedTemplate> {
    let source = source
        .canonicalize()
        .map_err(|e| StagingError::SourceUnreadable {
            path: source.display().to_string(),
            reason: e.to_string(),
        })?;
    if !source.is_dir() {
        return Err(StagingError::SourceUnreadable {
            path: source.display().to_string(),
            reason: "not a directory".to_string(),
        }
        .into());
    }

    let mut builder = tempfile::Builder::new();
    builder.prefix("tfprobe-");
    let workdir = match working_dir_hint {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(|e| StagingError::WorkdirCreate {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
            builder.tempdir_in(parent)
        }
        None => builder.tempdir(),
    }
    .map_err(|e| StagingError::WorkdirCreate {
        path: working_dir_hint.map_or_else(
            || std::env::temp_dir().display().to_string(),
            |p| p.display().to_string(),
        ),
        reason: e.to_string(),
    })?;

    let dest = workdir
        .path()
        .canonicalize()
        .unwrap_or_else(|_| workdir.path().to_path_buf());
    copy_tree(&source, &dest, &dest)?;

    let mut aux_copied = Vec::new();
    for aux in aux_files {
        let Some(name) = aux.file_name() else {
            warn!(file = %aux.display(), "auxiliary path has no file name; skipped");
            continue;
        };
        if !aux.is_file() {
            warn!(file = %aux.display(), "auxiliary file not found; skipped");
            continue;
        }
        let target = dest.join(name);
        fs::copy(aux, &target).map_err(|e| copy_error(aux, &target, &e))?;
        debug!(from = %aux.display(), to = %target.display(), "auxiliary file copied");
        aux_copied.push(target);
    }

    Ok(StagedTemplate::new(dest, aux_copied, Box::new(workdir)))
}

/// Recursively copy `from` into `to`, skipping hidden entries, local state,
/// and the staging root itself when it sits inside the source tree.
fn copy_tree(from: &Path, to: &Path, staging_root: &Path) -> Result<()> {
    fs::create_dir_all(to).map_err(|e| copy_error(from, to, &e))?;
    let entries = fs::read_dir(from).map_err(|e| StagingError::SourceUnreadable {
        path: from.display().to_string(),
        reason: e.to_string(),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| StagingError::SourceUnreadable {
            path: from.display().to_string(),
            reason: e.to_string(),
        })?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if !should_copy(&name) || path == staging_root {
            debug!(path = %path.display(), "skipped while staging");
            continue;
        }

        let target = to.join(entry.file_name());
        let meta = fs::metadata(&path).map_err(|e| StagingError::SourceUnreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        if meta.is_dir() {
            if entry.file_type().is_ok_and(|t| t.is_symlink()) {
                debug!(path = %path.display(), "symlinked directory skipped");
                continue;
            }
            copy_tree(&path, &target, staging_root)?;
        } else {
            fs::copy(&path, &target).map_err(|e| copy_error(&path, &target, &e))?;
        }
    }
    Ok(())
}

/// `true` when an entry named `name` belongs in the working copy.
#[must_use]
pub fn should_copy(name: &str) -> bool {
    if KEPT_HIDDEN.contains(&name) {
        return true;
    }
    !name.starts_with('.') && !SKIPPED_FILES.contains(&name)
}

fn copy_error(from: &Path, to: &Path, e: &std::io::Error) -> StagingError {
    StagingError::Copy {
        from: from.display().to_string(),
        to: to.display().to_string(),
        reason: e.to_string(),
    }
}
