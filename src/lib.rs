//! Pio Patcher: build-time source patching for PlatformIO library dependencies
//!
//! Rewrites a known buggy line in a vendored library file and records
//! completion with a zero-byte sentinel so the patch never runs twice.
//! The built-in patch fixes the Forty Seven Effects MIDI Library pitch
//! bend bug (bend only worked upward) in `MIDI.hpp`.
//!
//! # Architecture
//!
//! One operation: locate the target under the libdeps tree, replace every
//! literal occurrence of the search text, create the `.patching-done`
//! marker. The marker existence check is the idempotence gate; the
//! substitution itself is never re-examined once the marker exists.
//!
//! # Safety
//!
//! - Atomic file writes (tempfile + fsync + rename)
//! - No-op when the marker exists, even if the target changed underneath
//! - Drifted targets (search text gone) are reported, not silently eaten
//!
//! # Example
//!
//! ```no_run
//! use pio_patcher::{apply, BuildEnv, PatchSpec};
//!
//! let env = BuildEnv::new("/project/.pio/libdeps", "ESP32-S3-DevKitC");
//! let spec = PatchSpec::midi_pitch_bend();
//!
//! match apply(&env, &spec) {
//!     Ok(outcome) => println!("{outcome}"),
//!     Err(e) => eprintln!("patch failed: {e}"),
//! }
//! ```

pub mod config;
pub mod marker;
pub mod patcher;
pub mod replace;

// Re-exports
pub use config::{load_from_path, load_from_str, BuildEnv, ConfigError, PatchSpec};
pub use marker::MARKER_FILE_NAME;
pub use patcher::{apply, check, PatchError, PatchOutcome};
pub use replace::{replace_literal, rewrite_file, ReplaceError};
