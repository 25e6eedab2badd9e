use super::{live, preview, read, run, workspace};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::fs;
use vibe_patcher::{
    ApplyOptions, ApplyOutcome, ConstructTarget, DocumentError, ExtentFinder, ExtentStrategy,
    IndentFinder, Locator, TreeFinder,
};

fn decorated_function(decorators: usize, body: usize) -> String {
    let mut source = String::from("import os\n\n\n");
    for i in 0..decorators {
        source.push_str(&format!("@decorator_{i}\n"));
    }
    source.push_str("def target(a, b):\n");
    for i in 0..body {
        if i % 3 == 2 {
            source.push('\n');
        }
        source.push_str(&format!("    value_{i} = a + {i}\n"));
    }
    source.push_str("\n\ndef after():\n    pass\n");
    source
}

proptest! {
    #[test]
    fn extent_spans_decorators_header_and_body(decorators in 0usize..4, body in 1usize..8) {
        let source = decorated_function(decorators, body);
        let blank_lines_in_body = (0..body).filter(|i| i % 3 == 2).count();
        let expected = decorators + 1 + body + blank_lines_in_body;
        let target = ConstructTarget::function("target");

        for finder in [
            Locator::new(ExtentStrategy::Auto),
            Locator::new(ExtentStrategy::Indent),
        ] {
            let extent = finder.locate(&source, &target).unwrap().unwrap();
            prop_assert_eq!(extent.start_line, 3);
            prop_assert_eq!(extent.line_count(), expected);
        }
        prop_assert_eq!(
            TreeFinder.locate(&source, &target).unwrap(),
            IndentFinder.locate(&source, &target).unwrap()
        );
    }
}

#[test]
fn remove_block_takes_only_first_window() {
    let doc = "VibeSpec: 1.6
patch_type: remove_block
file: t.py
anchor_start: '^# begin'
anchor_end: '^# end'
--- code
";
    let source = "a = 1\n# begin\nb = 2\n# end\nc = 3\n# begin\nd = 4\n# end\n";
    assert_eq!(
        preview(doc, source),
        "a = 1\nc = 3\n# begin\nd = 4\n# end\n"
    );
}

#[test]
fn add_method_on_existing_method_replaces_in_place() {
    let source = "\
class Greeter:
    def a(self):
        return 1

    def b(self):
        return 2

    def c(self):
        return 3
";
    let doc = "VibeSpec: 1.6
patch_type: add_method
file: t.py
class: Greeter
code: |
  def b(self):
      return 20
";
    assert_eq!(
        preview(doc, source),
        "\
class Greeter:
    def a(self):
        return 1

    def b(self):
        return 20

    def c(self):
        return 3
"
    );
}

#[test]
fn replace_function_is_idempotent() {
    let dir = workspace(&[("m.py", "def f():\n    return 1\n\n\nclass A:\n    pass\n")]);
    let doc = "VibeSpec: 1.6
patch_type: replace_function
file: m.py
name: f
code: |
  def f():
      return 2
";
    run(doc, dir.path(), &live()).unwrap();
    let first = read(&dir, "m.py");

    let report = run(doc, dir.path(), &live()).unwrap();
    assert_eq!(read(&dir, "m.py"), first);
    assert!(matches!(
        report.outcomes[0].outcome,
        ApplyOutcome::Written { changed: false, .. }
    ));
}

#[test]
fn record_order_decides_outcome() {
    let add = "patch_type: add_function
file: m.py
code: |
  def foo():
      return 1
";
    let remove = "patch_type: remove_function
file: m.py
name: foo
--- code
";
    let base = "x = 1\n";

    let removed_last = format!("VibeSpec: 1.6\n{add}{remove}");
    let dir = workspace(&[("m.py", base)]);
    let report = run(&removed_last, dir.path(), &ApplyOptions::dry_run()).unwrap();
    assert!(!report.files.values().any(|text| text.contains("foo")));

    let added_last = format!("VibeSpec: 1.6\n{remove}{add}");
    let report = run(&added_last, dir.path(), &ApplyOptions::dry_run()).unwrap();
    assert!(report.files.values().any(|text| text.contains("def foo")));
}

#[test]
fn invalid_record_performs_no_io() {
    let dir = workspace(&[("keep.py", "x = 1\n")]);
    let doc = "VibeSpec: 1.6
patch_type: add_block
file: keep.py
position: end
code: |
  y = 2
patch_type: add_method
file: new.py
code: |
  def m(self):
      pass
";
    let err = run(doc, dir.path(), &ApplyOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        DocumentError::Batch(ref e) if e.index == 1 && e.applied.is_empty()
    ));

    assert!(!dir.path().join("new.py").exists());
    assert_eq!(read(&dir, "keep.py"), "x = 1\n");
    assert!(!dir.path().join("VibeBackups").exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}
