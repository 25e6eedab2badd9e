use super::{live, preview, read, run, workspace};
use pretty_assertions::assert_eq;

#[test]
fn replace_function_body() {
    let doc = "VibeSpec: 1.6
patch_type: replace_function
file: t.py
name: greet
code: |
  def greet():
      print('hello')
";
    assert_eq!(
        preview(doc, "def greet():\n    print('hi')\n"),
        "def greet():\n    print('hello')\n"
    );
}

#[test]
fn add_class_creates_new_file() {
    let dir = workspace(&[]);
    let doc = "VibeSpec: 1.6
patch_type: add_class
file: models/foo.py
code: |
  class Foo:
      pass
";
    run(doc, dir.path(), &live()).unwrap();
    assert_eq!(read(&dir, "models/foo.py"), "class Foo:\n    pass\n");
}

#[test]
fn remove_middle_method() {
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
patch_type: remove_method
file: t.py
class: Greeter
name: b
--- code
";
    assert_eq!(
        preview(doc, source),
        "\
class Greeter:
    def a(self):
        return 1

    def c(self):
        return 3
"
    );
}

#[test]
fn add_import_after_anchor() {
    let doc = "VibeSpec: 1.6
patch_type: add_block
file: t.py
position: after
anchor: '^import os'
code: |
  import sys
";
    assert_eq!(
        preview(doc, "import os\n\ndef f(): pass\n"),
        "import os\nimport sys\n\ndef f(): pass\n"
    );
}

#[test]
fn decorated_method_replaced_with_its_decorators() {
    let source = "\
class Api:
    @property
    @cached
    def name(self):
        return 'old'

    def other(self):
        pass
";
    let doc = "VibeSpec: 1.6
patch_type: replace_method
file: t.py
class: Api
name: name
code: |
  @property
  def name(self):
      return 'new'
";
    assert_eq!(
        preview(doc, source),
        "\
class Api:
    @property
    def name(self):
        return 'new'

    def other(self):
        pass
"
    );
}

#[test]
fn legacy_document_applies() {
    let dir = workspace(&[("hello.py", "import os\n")]);
    let doc = "\
# VibeSpec: 1.0
# patch_type: add_function
# file: hello.py
--- code
def greet():
    return 'hi'
";
    run(doc, dir.path(), &live()).unwrap();
    assert_eq!(
        read(&dir, "hello.py"),
        "import os\n\ndef greet():\n    return 'hi'\n"
    );
}

#[test]
fn legacy_anchor_values_need_no_quoting() {
    let dir = workspace(&[(
        "app.py",
        "@app.route(\"/\")\ndef index():\n    return 'ok'\n\n\nclass Foo:\n    pass\n",
    )]);
    let doc = "\
# VibeSpec: 1.0
# patch_type: add_block
# file: app.py
# position: before
# anchor: ^class Foo:
--- code
LIMIT = 10
";
    run(doc, dir.path(), &live()).unwrap();

    let doc = doc
        .replace("before", "after")
        .replace("^class Foo:", "@app.route")
        .replace("LIMIT = 10", "DEBUG = False");
    run(&doc, dir.path(), &live()).unwrap();

    assert_eq!(
        read(&dir, "app.py"),
        "@app.route(\"/\")\ndef index():\n    return 'ok'\n\nDEBUG = False\n\n\nLIMIT = 10\n\nclass Foo:\n    pass\n"
    );
}

#[test]
fn add_after_multiline_signature_lands_after_body() {
    let doc = "VibeSpec: 1.6
patch_type: add_block
file: t.py
position: after
anchor: '^def f'
code: |
  X = 1
";
    let source = "def f(\n    a: int,\n) -> int:\n    return a\n\n\ny = 2\n";
    assert_eq!(
        preview(doc, source),
        "def f(\n    a: int,\n) -> int:\n    return a\n\nX = 1\n\n\ny = 2\n"
    );
}
