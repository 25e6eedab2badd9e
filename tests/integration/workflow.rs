use super::{live, read, run, workspace};
use pretty_assertions::assert_eq;
use std::fs;
use vibe_patcher::settings::load_from_str;
use vibe_patcher::{
    preview_in_scratch, ApplyError, ApplyOptions, ApplyOutcome, DocumentError, SafetyError,
};

const ADD_HELPER: &str = "VibeSpec: 1.6
patch_type: add_function
file: app/main.py
code: |
  def helper():
      return 42
";

fn failed_with(err: DocumentError) -> ApplyError {
    match err {
        DocumentError::Batch(e) => e.source,
        DocumentError::Parse(e) => panic!("unexpected parse error: {e}"),
    }
}

#[test]
fn live_run_backs_up_existing_target() {
    let dir = workspace(&[("app/main.py", "class App:\n    pass\n")]);
    let report = run(ADD_HELPER, dir.path(), &ApplyOptions::default()).unwrap();

    let ApplyOutcome::Written {
        backup: Some(backup),
        created: false,
        changed: true,
        ..
    } = &report.outcomes[0].outcome
    else {
        panic!("expected a backed-up write: {:?}", report.outcomes[0]);
    };
    assert_eq!(backup.parent().unwrap(), dir.path().join("app/VibeBackups").canonicalize().unwrap());
    assert_eq!(fs::read_to_string(backup).unwrap(), "class App:\n    pass\n");
    assert_eq!(
        read(&dir, "app/main.py"),
        "def helper():\n    return 42\n\nclass App:\n    pass\n"
    );
}

#[test]
fn unchanged_content_skips_write_and_backup() {
    let dir = workspace(&[("app/main.py", "def helper():\n    return 42\n")]);
    let report = run(ADD_HELPER, dir.path(), &ApplyOptions::default()).unwrap();
    assert!(matches!(
        report.outcomes[0].outcome,
        ApplyOutcome::Written {
            changed: false,
            backup: None,
            ..
        }
    ));
    assert!(!dir.path().join("app/VibeBackups").exists());
}

#[test]
fn dry_run_touches_nothing() {
    let dir = workspace(&[("app/main.py", "x = 1\n")]);
    let report = run(ADD_HELPER, dir.path(), &ApplyOptions::dry_run()).unwrap();

    assert_eq!(read(&dir, "app/main.py"), "x = 1\n");
    assert!(!dir.path().join("app/VibeBackups").exists());
    let ApplyOutcome::Preview { text, .. } = &report.outcomes[0].outcome else {
        panic!("expected preview");
    };
    assert!(text.contains("def helper"));
}

#[test]
fn removal_from_missing_file_fails() {
    let dir = workspace(&[]);
    let doc = "VibeSpec: 1.6
patch_type: remove_class
file: gone.py
name: A
--- code
";
    let err = failed_with(run(doc, dir.path(), &live()).unwrap_err());
    assert!(matches!(err, ApplyError::TargetNotFound(_)));
    assert!(!dir.path().join("gone.py").exists());
}

#[test]
fn targets_outside_workspace_are_rejected() {
    let dir = workspace(&[]);
    let doc = "VibeSpec: 1.6
patch_type: add_block
file: ../escape.py
position: end
code: |
  x = 1
";
    let err = failed_with(run(doc, dir.path(), &live()).unwrap_err());
    assert!(matches!(
        err,
        ApplyError::Unsafe(SafetyError::OutsideWorkspace { .. })
    ));
}

#[test]
fn strict_settings_turn_fallbacks_into_errors() {
    let dir = workspace(&[("m.py", "def greet():\n    pass\n")]);
    let doc = "VibeSpec: 1.6
patch_type: replace_function
file: m.py
name: greeet
code: |
  def greeet():
      return 1
";
    let settings = load_from_str("[engine]\nstrict = true\n[backup]\nenabled = false\n").unwrap();
    let err = failed_with(run(doc, dir.path(), &settings.apply_options(false)).unwrap_err());
    match &err {
        ApplyError::ConstructNotFound { suggestion, .. } => {
            assert_eq!(suggestion.as_deref(), Some("greet"))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("did you mean `greet`"));
    assert_eq!(read(&dir, "m.py"), "def greet():\n    pass\n");

    // Lenient mode inserts the function instead.
    run(doc, dir.path(), &live()).unwrap();
    assert!(read(&dir, "m.py").contains("def greeet"));
}

#[test]
fn unparseable_source_still_patches() {
    let source = "def ok():\n    return 1\n\n\ndef broken(:\n    pass\n";
    let dir = workspace(&[("m.py", source)]);
    let doc = "VibeSpec: 1.6
patch_type: replace_function
file: m.py
name: ok
code: |
  def ok():
      return 2
";
    run(doc, dir.path(), &live()).unwrap();
    assert_eq!(
        read(&dir, "m.py"),
        "def ok():\n    return 2\n\n\ndef broken(:\n    pass\n"
    );
}

#[test]
fn scratch_preview_matches_live_result() {
    let dir = workspace(&[("app/main.py", "class App:\n    pass\n")]);
    let records = vibe_patcher::parse(ADD_HELPER).unwrap();
    let previews = preview_in_scratch(&records, dir.path(), &ApplyOptions::default()).unwrap();
    assert_eq!(read(&dir, "app/main.py"), "class App:\n    pass\n");

    run(ADD_HELPER, dir.path(), &live()).unwrap();
    assert_eq!(previews[0].after.as_deref(), Some(read(&dir, "app/main.py").as_str()));
}
