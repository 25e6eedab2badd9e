use super::{read, workspace};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const ADD_GREET: &str = "VibeSpec: 1.6
patch_type: add_function
file: hello.py
code: |
  def greet():
      return 'hi'
";

fn vibe(args: &[&str], root: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vibe"))
        .args(args)
        .arg("--root")
        .arg(root)
        .env("NO_COLOR", "1")
        .env_remove("VIBE_ROOT")
        .env_remove("VIBE_LOG")
        .output()
        .expect("failed to run vibe")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn lint_reports_valid_and_invalid_records() {
    let dir = workspace(&[("good.vibe", ADD_GREET)]);
    let output = Command::new(env!("CARGO_BIN_EXE_vibe"))
        .args(["lint"])
        .arg(dir.path().join("good.vibe"))
        .env("NO_COLOR", "1")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("add_function function `greet` in hello.py"));

    fs::write(
        dir.path().join("bad.vibe"),
        "VibeSpec: 1.6\npatch_type: add_method\nfile: a.py\ncode: |\n  def m(self):\n      pass\n",
    )
    .unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_vibe"))
        .args(["lint"])
        .arg(dir.path().join("bad.vibe"))
        .env("NO_COLOR", "1")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("class"));
}

#[test]
fn apply_writes_and_reports() {
    let dir = workspace(&[("hello.py", "import os\n"), ("patches/greet.vibe", ADD_GREET)]);
    let patch = dir.path().join("patches/greet.vibe");
    let output = vibe(&["apply", patch.to_str().unwrap()], dir.path());

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("Patched hello.py"));
    assert!(read(&dir, "hello.py").contains("def greet"));
    assert!(dir.path().join("VibeBackups").is_dir());
}

#[test]
fn apply_dry_run_with_diff_leaves_files() {
    let dir = workspace(&[("hello.py", "import os\n"), ("greet.vibe", ADD_GREET)]);
    let patch = dir.path().join("greet.vibe");
    let output = vibe(&["apply", "--dry-run", "--diff", patch.to_str().unwrap()], dir.path());

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Would patch hello.py"), "{out}");
    assert!(out.contains("+def greet():"), "{out}");
    assert_eq!(read(&dir, "hello.py"), "import os\n");
}

#[test]
fn apply_directory_in_sorted_order_as_json() {
    let dir = workspace(&[
        ("hello.py", "x = 1\n"),
        ("patches/01-add.vibe", ADD_GREET),
        (
            "patches/02-remove.vibe",
            "VibeSpec: 1.6\npatch_type: remove_function\nfile: hello.py\nname: greet\n--- code\n",
        ),
        ("patches/notes.txt", "not a patch"),
    ]);
    let patches = dir.path().join("patches");
    let output = vibe(&["apply", "--json", patches.to_str().unwrap()], dir.path());

    assert!(output.status.success());
    let reports: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(
        reports[0]["report"]["outcomes"][0]["kind"],
        serde_json::json!("add_function")
    );
    assert_eq!(
        reports[1]["report"]["outcomes"][0]["outcome"]["status"],
        serde_json::json!("written")
    );
    assert_eq!(read(&dir, "hello.py"), "x = 1\n");
}

#[test]
fn failing_record_sets_exit_code() {
    let dir = workspace(&[(
        "rm.vibe",
        "VibeSpec: 1.6\npatch_type: remove_function\nfile: missing.py\nname: f\n--- code\n",
    )]);
    let patch = dir.path().join("rm.vibe");
    let output = vibe(&["apply", patch.to_str().unwrap()], dir.path());

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("target file not found"));
}

#[test]
fn preview_shows_diff_without_writing() {
    let dir = workspace(&[("hello.py", "import os\n"), ("greet.vibe", ADD_GREET)]);
    let patch = dir.path().join("greet.vibe");
    let output = vibe(&["preview", patch.to_str().unwrap()], dir.path());

    assert!(output.status.success());
    assert!(stdout(&output).contains("+    return 'hi'"));
    assert_eq!(read(&dir, "hello.py"), "import os\n");
}

#[test]
fn config_file_disables_backups() {
    let dir = workspace(&[
        ("hello.py", "import os\n"),
        ("greet.vibe", ADD_GREET),
        ("vibe.toml", "[backup]\nenabled = false\n"),
    ]);
    let patch = dir.path().join("greet.vibe");
    let output = vibe(&["apply", patch.to_str().unwrap()], dir.path());

    assert!(output.status.success());
    assert!(!dir.path().join("VibeBackups").exists());

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[engine]\nmode = 1\n").unwrap();
    let output = vibe(
        &["--config", bad.to_str().unwrap(), "apply", patch.to_str().unwrap()],
        dir.path(),
    );
    assert!(!output.status.success());
}
