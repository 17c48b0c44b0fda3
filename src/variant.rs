// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Variant study generation.
//!
//! A variant is a base study plus an ordered command log. Generating it
//! copies the base study directory into a fresh target directory and replays
//! the commands against the copy, strictly in order. A failing command is
//! recorded and skipped; generation carries on with the next one.
//!
//! Generation can be cancelled through a flag that is checked between
//! commands. The command in flight always finishes, and the report then
//! stops at the last command applied.

use crate::{
    command::{Command, CommandKind, CommandOutput},
    study::{FileStudy, StudyError},
    tree::TreeContext,
};

use serde::Serialize;
use serde_json::{Map, Value};
use std::{
    fs::copy,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};
use tracing::{debug, info, instrument, warn};

/// Outcome of one replayed command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandReport {
    /// Position of the command in the log.
    pub index: usize,
    pub kind: CommandKind,
    pub signature: String,
    pub output: CommandOutput,

    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Generated variant study with the report of its command log.
#[derive(Debug)]
pub struct Generation {
    pub study: FileStudy,
    pub report: Vec<CommandReport>,

    /// Set if generation stopped before the end of the log.
    pub cancelled: bool,
}

impl Generation {
    /// Check if every replayed command succeeded.
    pub fn succeeded(&self) -> bool {
        self.report.iter().all(|entry| entry.output.status)
    }
}

/// Generate variant study at target from base study and command log.
///
/// # Errors
///
/// - Return [`VariantError::BaseMissing`] if base is not a directory.
/// - Return [`VariantError::TargetExists`] if target already exists.
/// - Return [`VariantError::Io`] if the base study cannot be copied.
/// - Return [`VariantError::Study`] if the copy cannot be opened.
pub fn generate(
    base: impl AsRef<Path>,
    target: impl AsRef<Path>,
    commands: &[Command],
    context: TreeContext,
) -> Result<Generation> {
    generate_with(base, target, commands, context, &AtomicBool::new(false), |_| {})
}

/// Generate variant study, reporting progress and honoring cancellation.
///
/// The observer sees every report entry as soon as its command finished.
///
/// # Errors
///
/// - Return any error of [`generate`].
#[instrument(skip(base, target, commands, context, cancel, observer), level = "debug")]
pub fn generate_with<F>(
    base: impl AsRef<Path>,
    target: impl AsRef<Path>,
    commands: &[Command],
    context: TreeContext,
    cancel: &AtomicBool,
    observer: F,
) -> Result<Generation>
where
    F: FnMut(&CommandReport),
{
    let (base, target) = (base.as_ref(), target.as_ref());
    if !base.is_dir() {
        return Err(VariantError::BaseMissing(base.to_path_buf()));
    }
    if target.exists() {
        return Err(VariantError::TargetExists(target.to_path_buf()));
    }

    let copied = copy_study(base, target)?;
    info!(
        "copied {copied} files from {:?} into {:?}",
        base.display(),
        target.display()
    );

    let mut study = FileStudy::open(target, context)?;
    let report = apply_all(&mut study, commands, cancel, observer);
    let cancelled = report.len() < commands.len();
    if cancelled {
        warn!("generation cancelled after {} of {} commands", report.len(), commands.len());
    }

    Ok(Generation {
        study,
        report,
        cancelled,
    })
}

/// Apply commands to study in order, collecting a report entry for each.
///
/// Stops early only when `cancel` is raised.
pub fn apply_all<F>(
    study: &mut FileStudy,
    commands: &[Command],
    cancel: &AtomicBool,
    mut observer: F,
) -> Vec<CommandReport>
where
    F: FnMut(&CommandReport),
{
    let mut report = Vec::with_capacity(commands.len());
    for (index, command) in commands.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let (output, extra) = command.apply(study);
        let entry = CommandReport {
            index,
            kind: command.kind(),
            signature: command.match_signature(),
            output,
            extra,
        };
        observer(&entry);
        report.push(entry);
    }

    report
}

/// Copy every file of base study into target, returning file count.
fn copy_study(base: &Path, target: &Path) -> Result<usize> {
    mkdirp::mkdirp(target).map_err(|source| VariantError::io(source, target))?;

    let pattern = format!("{}/**/*", glob::Pattern::escape(&base.to_string_lossy()));
    let entries = glob::glob(&pattern).map_err(|source| VariantError::Pattern { source, pattern })?;

    let mut copied = 0;
    for entry in entries {
        let path = entry?;
        let Ok(relative) = path.strip_prefix(base) else {
            continue;
        };
        let destination = target.join(relative);

        if path.is_dir() {
            mkdirp::mkdirp(&destination).map_err(|source| VariantError::io(source, &destination))?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            mkdirp::mkdirp(parent).map_err(|source| VariantError::io(source, parent))?;
        }
        copy(&path, &destination).map_err(|source| VariantError::io(source, &path))?;
        debug!("copy {:?}", relative.display());
        copied += 1;
    }

    Ok(copied)
}

/// Variant generation error types.
#[derive(Debug, thiserror::Error)]
pub enum VariantError {
    /// Base study directory does not exist.
    #[error("base study {0:?} is not a directory")]
    BaseMissing(PathBuf),

    /// Variant target already exists.
    #[error("variant target {0:?} already exists")]
    TargetExists(PathBuf),

    /// Copy pattern cannot be built from base path.
    #[error("invalid copy pattern {pattern:?}")]
    Pattern {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },

    /// Base study entry cannot be listed.
    #[error(transparent)]
    Walk(#[from] glob::GlobError),

    /// Study copy failed.
    #[error("failed to copy study at {path:?}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Copied study cannot be opened.
    #[error(transparent)]
    Study(#[from] StudyError),
}

impl VariantError {
    fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = VariantError> = std::result::Result<T, E>;
