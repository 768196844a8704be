//! Marker-gated patch application.
//!
//! The only states are {unpatched, patched} and the transition is
//! one-directional: once the sentinel exists this tool never touches the
//! target again. Idempotence comes from the marker check, not from the
//! substitution itself.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{BuildEnv, PatchSpec, ValidationError};
use crate::marker;
use crate::replace::{self, ReplaceError};

/// Result of running (or checking) the patch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome should be checked for applied/drifted state"]
pub enum PatchOutcome {
    /// Target was rewritten and the sentinel created
    Applied { file: PathBuf, occurrences: usize },
    /// Sentinel already present; target left untouched
    MarkerPresent { marker: PathBuf },
    /// No sentinel, but the content already carries the replacement text
    AlreadyPatched { file: PathBuf },
    /// Neither search nor replacement text found: the target has drifted
    /// (different library version or a prior manual edit)
    TargetDrifted { file: PathBuf },
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOutcome::Applied { file, occurrences } => {
                write!(
                    f,
                    "patched {} ({} occurrence{})",
                    file.display(),
                    occurrences,
                    if *occurrences == 1 { "" } else { "s" }
                )
            }
            PatchOutcome::MarkerPresent { marker } => {
                write!(f, "already patched (marker {} exists)", marker.display())
            }
            PatchOutcome::AlreadyPatched { file } => {
                write!(
                    f,
                    "{} already contains the replacement text",
                    file.display()
                )
            }
            PatchOutcome::TargetDrifted { file } => {
                write!(
                    f,
                    "search text not found in {} (patch target has drifted)",
                    file.display()
                )
            }
        }
    }
}

/// Errors during patch application. All fatal: no retries, the invoking
/// build observes the non-zero exit and halts.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("target file not found: {0}")]
    TargetMissing(PathBuf),

    #[error("invalid patch spec: {0}")]
    Spec(#[from] ValidationError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Replace(#[from] ReplaceError),
}

/// Apply the patch once, gated by the sentinel.
///
/// * Marker present: no-op, target not even read.
/// * Search text present: every occurrence replaced (atomic rewrite),
///   sentinel created.
/// * Search text absent: target left byte-identical; the sentinel is
///   still created so the outcome is stable across builds, but the
///   caller gets a distinct [`PatchOutcome::TargetDrifted`] (or
///   [`PatchOutcome::AlreadyPatched`] when the replacement text is
///   already there) to surface as a warning.
pub fn apply(env: &BuildEnv, spec: &PatchSpec) -> Result<PatchOutcome, PatchError> {
    spec.validate()?;

    let marker_path = env.marker_path(spec);
    if marker::is_done(&marker_path) {
        return Ok(PatchOutcome::MarkerPresent {
            marker: marker_path,
        });
    }

    let target = env.target_path(spec);
    let outcome = match classify(&target, spec)? {
        Classification::NeedsPatch => {
            let occurrences = replace::rewrite_file(&target, &spec.search, &spec.replace)?;
            PatchOutcome::Applied {
                file: target,
                occurrences,
            }
        }
        Classification::ReplacementPresent => PatchOutcome::AlreadyPatched { file: target },
        Classification::Drifted => PatchOutcome::TargetDrifted { file: target },
    };

    marker::write_done(&marker_path).map_err(|source| PatchError::Io {
        path: marker_path,
        source,
    })?;

    Ok(outcome)
}

/// Check patch status without mutating anything.
///
/// Mirrors [`apply`] outcome semantics (`Applied` means "would apply");
/// neither the target nor the sentinel is written.
pub fn check(env: &BuildEnv, spec: &PatchSpec) -> Result<PatchOutcome, PatchError> {
    spec.validate()?;

    let marker_path = env.marker_path(spec);
    if marker::is_done(&marker_path) {
        return Ok(PatchOutcome::MarkerPresent {
            marker: marker_path,
        });
    }

    let target = env.target_path(spec);
    let content = read_target(&target)?;
    let occurrences = content.matches(spec.search.as_str()).count();

    Ok(match classify_content(&content, spec) {
        Classification::NeedsPatch => PatchOutcome::Applied {
            file: target,
            occurrences,
        },
        Classification::ReplacementPresent => PatchOutcome::AlreadyPatched { file: target },
        Classification::Drifted => PatchOutcome::TargetDrifted { file: target },
    })
}

enum Classification {
    NeedsPatch,
    ReplacementPresent,
    Drifted,
}

fn classify(target: &Path, spec: &PatchSpec) -> Result<Classification, PatchError> {
    let content = read_target(target)?;
    Ok(classify_content(&content, spec))
}

fn classify_content(content: &str, spec: &PatchSpec) -> Classification {
    if content.contains(&spec.search) {
        Classification::NeedsPatch
    } else if content.contains(&spec.replace) {
        Classification::ReplacementPresent
    } else {
        Classification::Drifted
    }
}

fn read_target(target: &Path) -> Result<String, PatchError> {
    match fs::read_to_string(target) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PatchError::TargetMissing(target.to_path_buf()))
        }
        Err(source) => Err(PatchError::Io {
            path: target.to_path_buf(),
            source,
        }),
    }
}
