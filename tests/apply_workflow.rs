//! End-to-end workflow test against the library API
//!
//! Tests the complete workflow:
//! 1. Lay out a mock libdeps tree
//! 2. Apply the built-in patch
//! 3. Check status
//! 4. Re-apply (idempotency)

use pio_patcher::{apply, check, BuildEnv, PatchError, PatchOutcome, PatchSpec};
use std::fs;
use tempfile::TempDir;

const BUGGY_LINE: &str = "const int value = int(inPitchValue * double(scale));";
const FIXED_LINE: &str = "const int value = int(fabs(inPitchValue) * double(scale));";

/// Create a minimal mock libdeps tree the way PlatformIO lays it out.
fn setup_libdeps(midi_hpp: &str) -> (TempDir, BuildEnv) {
    let dir = TempDir::new().unwrap();
    let env = BuildEnv::new(dir.path(), "ESP32-S3-DevKitC");

    let src_dir = dir.path().join("ESP32-S3-DevKitC/MIDI Library/src");
    fs::create_dir_all(&src_dir).unwrap();
    fs::write(src_dir.join("MIDI.hpp"), midi_hpp).unwrap();

    (dir, env)
}

#[test]
fn test_full_patch_lifecycle() {
    let midi_hpp = format!(
        "inline void MidiInterface::sendPitchBend(double inPitchValue, Channel inChannel)\n\
         {{\n    const int scale = inPitchValue > 0.0 ? MIDI_PITCHBEND_MAX : MIDI_PITCHBEND_MIN;\n    \
         {BUGGY_LINE}\n    sendPitchBend(value, inChannel);\n}}\n"
    );
    let (_dir, env) = setup_libdeps(&midi_hpp);
    let spec = PatchSpec::midi_pitch_bend();

    // Step 1: status before anything ran
    let status = check(&env, &spec).unwrap();
    assert!(matches!(
        status,
        PatchOutcome::Applied { occurrences: 1, .. }
    ));

    // Step 2: apply
    let outcome = apply(&env, &spec).unwrap();
    assert!(matches!(
        outcome,
        PatchOutcome::Applied { occurrences: 1, .. }
    ));

    let patched = fs::read_to_string(env.target_path(&spec)).unwrap();
    assert_eq!(patched.matches(BUGGY_LINE).count(), 0);
    assert_eq!(patched.matches(FIXED_LINE).count(), 1);
    // Surrounding lines survive byte-for-byte.
    assert!(patched.contains("sendPitchBend(value, inChannel);"));

    let marker = env.marker_path(&spec);
    assert!(marker.exists());
    assert_eq!(fs::metadata(&marker).unwrap().len(), 0);

    // Step 3: status now reports the marker
    let status = check(&env, &spec).unwrap();
    assert!(matches!(status, PatchOutcome::MarkerPresent { .. }));

    // Step 4: re-apply is a marker-gated no-op
    let before = fs::read(env.target_path(&spec)).unwrap();
    let again = apply(&env, &spec).unwrap();
    assert!(matches!(again, PatchOutcome::MarkerPresent { .. }));
    assert_eq!(fs::read(env.target_path(&spec)).unwrap(), before);
}

#[test]
fn test_single_line_file_end_to_end() {
    // Minimal scenario: the buggy line is the whole file.
    let (_dir, env) = setup_libdeps(&format!("{BUGGY_LINE}\n"));
    let spec = PatchSpec::midi_pitch_bend();

    let outcome = apply(&env, &spec).unwrap();
    assert!(matches!(outcome, PatchOutcome::Applied { .. }));

    assert_eq!(
        fs::read_to_string(env.target_path(&spec)).unwrap(),
        format!("{FIXED_LINE}\n")
    );
    assert!(env.marker_path(&spec).exists());
}

#[test]
fn test_two_occurrences_both_replaced() {
    let (_dir, env) = setup_libdeps(&format!("{BUGGY_LINE}\nother code\n{BUGGY_LINE}\n"));
    let spec = PatchSpec::midi_pitch_bend();

    let outcome = apply(&env, &spec).unwrap();
    assert!(matches!(
        outcome,
        PatchOutcome::Applied { occurrences: 2, .. }
    ));

    let patched = fs::read_to_string(env.target_path(&spec)).unwrap();
    assert_eq!(patched.matches(FIXED_LINE).count(), 2);
    assert!(!patched.contains(BUGGY_LINE));
}

#[test]
fn test_drifted_library_version_warns_but_marks() {
    let content = "// MIDI Library v6: pitch bend was rewritten upstream\n";
    let (_dir, env) = setup_libdeps(content);
    let spec = PatchSpec::midi_pitch_bend();

    let outcome = apply(&env, &spec).unwrap();
    assert!(matches!(outcome, PatchOutcome::TargetDrifted { .. }));

    // Target byte-identical, marker still written.
    assert_eq!(fs::read_to_string(env.target_path(&spec)).unwrap(), content);
    assert!(env.marker_path(&spec).exists());
}

#[test]
fn test_missing_libdeps_tree_aborts() {
    let dir = TempDir::new().unwrap();
    let env = BuildEnv::new(dir.path(), "ESP32-S3-DevKitC");
    let spec = PatchSpec::midi_pitch_bend();

    let err = apply(&env, &spec).unwrap_err();
    assert!(matches!(err, PatchError::TargetMissing(_)));

    // Failure leaves no marker behind, so the next build retries.
    assert!(!env.marker_path(&spec).exists());
}
