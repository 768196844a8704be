//! Build-environment configuration and the patch definition.
//!
//! The build system hands us two values: the libdeps root that the
//! dependency fetch step populates, and the environment name it is
//! building. They travel through an explicit [`BuildEnv`] struct rather
//! than ambient process globals; only the CLI layer reads the process
//! environment, via [`BuildEnv::resolve`].

use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::marker::MARKER_FILE_NAME;

/// Environment variable PlatformIO injects with the libdeps root.
pub const LIBDEPS_DIR_VAR: &str = "PROJECT_LIBDEPS_DIR";

/// Environment variable PlatformIO injects with the build environment name.
pub const PIOENV_VAR: &str = "PIOENV";

/// Build-system provided configuration: where the vendored dependencies
/// live and which environment is being built.
#[derive(Debug, Clone)]
pub struct BuildEnv {
    /// Root of the dependency tree (PlatformIO's `.pio/libdeps`)
    pub libdeps_dir: PathBuf,
    /// Build environment name (e.g. `ESP32-S3-DevKitC`)
    pub environment: String,
}

impl BuildEnv {
    pub fn new(libdeps_dir: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            libdeps_dir: libdeps_dir.into(),
            environment: environment.into(),
        }
    }

    /// Resolve the build environment for the CLI.
    ///
    /// Priority order:
    /// 1. Explicit `--libdeps-dir` / `--env` flags
    /// 2. `PROJECT_LIBDEPS_DIR` / `PIOENV` process environment variables
    pub fn resolve(
        libdeps_flag: Option<PathBuf>,
        env_flag: Option<String>,
    ) -> Result<Self, ConfigError> {
        let libdeps_dir = match libdeps_flag {
            Some(path) => path,
            None => env::var_os(LIBDEPS_DIR_VAR)
                .map(PathBuf::from)
                .ok_or(ConfigError::MissingLibdepsDir)?,
        };

        let environment = match env_flag {
            Some(name) => name,
            None => env::var(PIOENV_VAR).map_err(|_| ConfigError::MissingEnvironment)?,
        };

        Ok(Self::new(libdeps_dir, environment))
    }

    /// Directory holding the vendored files for this environment.
    pub fn env_dir(&self) -> PathBuf {
        self.libdeps_dir.join(&self.environment)
    }

    /// Absolute path of the file the patch rewrites.
    pub fn target_path(&self, spec: &PatchSpec) -> PathBuf {
        self.env_dir().join(&spec.file)
    }

    /// Absolute path of the sentinel, co-located with the target.
    pub fn marker_path(&self, spec: &PatchSpec) -> PathBuf {
        let target = self.target_path(spec);
        match target.parent() {
            Some(dir) => dir.join(&spec.marker),
            None => PathBuf::from(&spec.marker),
        }
    }
}

/// A single literal substitution against one vendored file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PatchSpec {
    /// Target file, relative to `<libdeps_dir>/<environment>`
    pub file: String,
    /// Exact text to search for (literal, single line, no regex semantics)
    pub search: String,
    /// Replacement text
    pub replace: String,
    /// Sentinel file name written next to the target
    #[serde(default = "default_marker")]
    pub marker: String,
}

fn default_marker() -> String {
    MARKER_FILE_NAME.to_string()
}

impl PatchSpec {
    /// The built-in patch: the Forty Seven Effects MIDI Library only
    /// bends pitch upward because it drops the sign handling on line 343
    /// of `MIDI.hpp`. The corrected line takes the magnitude explicitly.
    pub fn midi_pitch_bend() -> Self {
        Self {
            file: "MIDI Library/src/MIDI.hpp".to_string(),
            search: "const int value = int(inPitchValue * double(scale));".to_string(),
            replace: "const int value = int(fabs(inPitchValue) * double(scale));".to_string(),
            marker: default_marker(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.file.trim().is_empty() {
            issues.push(ValidationIssue::MissingField { field: "file" });
        }
        if self.search.is_empty() {
            issues.push(ValidationIssue::MissingField { field: "search" });
        }
        if self.replace.is_empty() {
            issues.push(ValidationIssue::MissingField { field: "replace" });
        }
        if self.search.contains('\n') {
            issues.push(ValidationIssue::InvalidField {
                field: "search",
                message: "search text must be a single line".to_string(),
            });
        }
        if self.marker.is_empty() {
            issues.push(ValidationIssue::MissingField { field: "marker" });
        } else if self.marker.contains('/') || self.marker.contains('\\') {
            issues.push(ValidationIssue::InvalidField {
                field: "marker",
                message: "marker must be a bare file name, not a path".to_string(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// TOML shape of an on-disk patch spec:
///
/// ```toml
/// [patch]
/// file = "MIDI Library/src/MIDI.hpp"
/// search = "const int value = int(inPitchValue * double(scale));"
/// replace = "const int value = int(fabs(inPitchValue) * double(scale));"
/// ```
#[derive(Debug, Deserialize)]
struct PatchFile {
    patch: PatchSpec,
}

pub fn load_from_str(input: &str) -> Result<PatchSpec, ConfigError> {
    let parsed: PatchFile = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    parsed
        .patch
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(parsed.patch)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchSpec, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

#[derive(Debug)]
pub enum ConfigError {
    MissingLibdepsDir,
    MissingEnvironment,
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingLibdepsDir => {
                write!(
                    f,
                    "libdeps directory not given: pass --libdeps-dir or set {}",
                    LIBDEPS_DIR_VAR
                )
            }
            ConfigError::MissingEnvironment => {
                write!(
                    f,
                    "build environment not given: pass --env or set {}",
                    PIOENV_VAR
                )
            }
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read patch spec from {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse patch spec TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse patch spec TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid patch spec ({}): {}", path.display(), source),
                None => write!(f, "invalid patch spec: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    MissingField {
        field: &'static str,
    },
    InvalidField {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "patch spec missing required field '{field}'")
            }
            ValidationIssue::InvalidField { field, message } => {
                write!(f, "patch spec field '{field}' is invalid: {message}")
            }
        }
    }
}
