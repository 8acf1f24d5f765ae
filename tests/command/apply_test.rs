//! End-to-end tests for the apply command: text and binary application,
//! rejects, reverse application, index modes, and the stat outputs.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use clap::Parser;
use serial_test::serial;
use tempfile::tempdir;

use mend::command::apply::{self, ApplyArgs};
use mend::internal::index::{Index, IndexEntry};
use mend::utils::test::{setup_with_new_mend_in, ChangeDirGuard};
use mend::utils::{object, path};

fn run_apply(args: &[&str]) -> Result<bool, mend::internal::patch::PatchError> {
    let mut full = vec!["apply"];
    full.extend_from_slice(args);
    apply::execute(ApplyArgs::try_parse_from(full).unwrap())
}

#[test]
#[serial]
fn test_plain_text_apply() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write("f.txt", "a\nb\nc\n").unwrap();
    fs::write(
        "fix.patch",
        "--- f.txt\n+++ f.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n",
    )
    .unwrap();

    // traditional one-word names: -p0 is guessed from the slash-free paths
    let errs = run_apply(&["fix.patch"]).unwrap();
    assert!(!errs);
    assert_eq!(fs::read("f.txt").unwrap(), b"a\nB\nc\n");
}

#[test]
#[serial]
fn test_apply_locates_drifted_hunk() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write("f.txt", "h1\nh2\na\nb\nc\nt\n").unwrap();
    fs::write(
        "drift.patch",
        "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n",
    )
    .unwrap();

    let errs = run_apply(&["drift.patch"]).unwrap();
    assert!(!errs);
    assert_eq!(fs::read("f.txt").unwrap(), b"h1\nh2\na\nB\nc\nt\n");
}

#[test]
#[serial]
fn test_whitespace_fix_normalizes_context_and_added_lines() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    // the target's context line carries trailing whitespace the patch lacks
    fs::write("w.txt", "foo  \nbar\n").unwrap();
    fs::write(
        "ws.patch",
        "--- a/w.txt\n+++ b/w.txt\n@@ -1,2 +1,3 @@\n foo\n+added \n bar\n",
    )
    .unwrap();

    let errs = run_apply(&["--whitespace=fix", "ws.patch"]).unwrap();
    assert!(!errs);
    assert_eq!(fs::read("w.txt").unwrap(), b"foo\nadded\nbar\n");
}

#[test]
#[serial]
fn test_creation_and_deletion() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write(
        "create.patch",
        "--- /dev/null\n+++ b/sub/created.txt\n@@ -0,0 +1,2 @@\n+one\n+two\n",
    )
    .unwrap();
    let errs = run_apply(&["create.patch"]).unwrap();
    assert!(!errs);
    assert_eq!(fs::read("sub/created.txt").unwrap(), b"one\ntwo\n");

    fs::write(
        "delete.patch",
        "--- a/sub/created.txt\n+++ /dev/null\n@@ -1,2 +0,0 @@\n-one\n-two\n",
    )
    .unwrap();
    let errs = run_apply(&["delete.patch"]).unwrap();
    assert!(!errs);
    assert!(!Path::new("sub/created.txt").exists());
    // the emptied directory is cleaned up as well
    assert!(!Path::new("sub").exists());
}

#[test]
#[serial]
fn test_rename_chain_second_patch_sees_first_result() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write("A", "1\n2\n3\n").unwrap();
    fs::write(
        "chain.patch",
        "diff --git a/A b/B\nrename from A\nrename to B\n--- a/A\n+++ b/B\n@@ -1,3 +1,3 @@\n 1\n-2\n+two\n 3\n\
diff --git a/B b/B\n--- a/B\n+++ b/B\n@@ -1,3 +1,3 @@\n 1\n two\n-3\n+three\n",
    )
    .unwrap();

    let errs = run_apply(&["chain.patch"]).unwrap();
    assert!(!errs);
    assert!(!Path::new("A").exists());
    assert_eq!(fs::read("B").unwrap(), b"1\ntwo\nthree\n");
}

#[test]
#[serial]
fn test_reject_writes_rej_and_applies_the_rest() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write("r.txt", "a\nb\nc\nd\ne\nf\n").unwrap();
    let hunk2 = "@@ -10,2 +10,2 @@\n nope\n-gone\n+GONE\n";
    fs::write(
        "r.patch",
        format!(
            "--- a/r.txt\n+++ b/r.txt\n@@ -1,2 +1,2 @@\n a\n-b\n+B\n{hunk2}@@ -5,2 +5,2 @@\n e\n-f\n+F\n"
        ),
    )
    .unwrap();

    // without --reject the patch fails and writes nothing
    let errs = run_apply(&["r.patch"]).unwrap();
    assert!(errs);
    assert_eq!(fs::read("r.txt").unwrap(), b"a\nb\nc\nd\ne\nf\n");

    // with --reject the good hunks land and the bad one goes to r.txt.rej
    let errs = run_apply(&["--reject", "r.patch"]).unwrap();
    assert!(errs);
    assert_eq!(fs::read("r.txt").unwrap(), b"a\nB\nc\nd\ne\nF\n");
    let rej = fs::read_to_string("r.txt.rej").unwrap();
    assert_eq!(rej, format!("diff a/r.txt b/r.txt\t(rejected hunks)\n{hunk2}"));
}

#[test]
#[serial]
fn test_reverse_application_round_trips() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    let original = "a\nb\nc\n";
    fs::write("f.txt", original).unwrap();
    fs::write(
        "f.patch",
        "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n",
    )
    .unwrap();

    assert!(!run_apply(&["f.patch"]).unwrap());
    assert_eq!(fs::read("f.txt").unwrap(), b"a\nB\nc\n");
    assert!(!run_apply(&["--reverse", "f.patch"]).unwrap());
    assert_eq!(fs::read("f.txt").unwrap(), original.as_bytes());
}

#[test]
#[serial]
fn test_check_reports_without_writing() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write("f.txt", "x\n").unwrap();
    fs::write(
        "good.patch",
        "--- a/f.txt\n+++ b/f.txt\n@@ -1 +1 @@\n-x\n+y\n",
    )
    .unwrap();
    fs::write(
        "bad.patch",
        "--- a/f.txt\n+++ b/f.txt\n@@ -1 +1 @@\n-zzz\n+y\n",
    )
    .unwrap();

    assert!(!run_apply(&["--check", "good.patch"]).unwrap());
    assert!(run_apply(&["--check", "bad.patch"]).unwrap());
    assert_eq!(fs::read("f.txt").unwrap(), b"x\n");
}

#[test]
#[serial]
fn test_unidiff_zero_allows_contextless_hunks() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write("z.txt", "1\n2\n3\n").unwrap();
    // insert between lines 1 and 2 with zero context
    fs::write(
        "z.patch",
        "--- a/z.txt\n+++ b/z.txt\n@@ -1,0 +2 @@\n+1.5\n",
    )
    .unwrap();

    let errs = run_apply(&["--unidiff-zero", "z.patch"]).unwrap();
    assert!(!errs);
    assert_eq!(fs::read("z.txt").unwrap(), b"1\n1.5\n2\n3\n");
}

#[test]
#[serial]
fn test_directory_prepends_root() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write(
        "rooted.patch",
        "--- /dev/null\n+++ b/file.txt\n@@ -0,0 +1 @@\n+content\n",
    )
    .unwrap();
    let errs = run_apply(&["--directory=deep/down", "rooted.patch"]).unwrap();
    assert!(!errs);
    assert_eq!(fs::read("deep/down/file.txt").unwrap(), b"content\n");
}

#[test]
#[serial]
fn test_strip_components_with_p() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write("f.txt", "x\n").unwrap();
    fs::write(
        "deep.patch",
        "--- project/version1/f.txt\n+++ project/version2/f.txt\n@@ -1 +1 @@\n-x\n+y\n",
    )
    .unwrap();
    let errs = run_apply(&["-p", "2", "deep.patch"]).unwrap();
    assert!(!errs);
    assert_eq!(fs::read("f.txt").unwrap(), b"y\n");
}

#[test]
#[serial]
fn test_exclude_skips_matching_paths() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write("keep.txt", "a\n").unwrap();
    fs::write("skip.txt", "a\n").unwrap();
    fs::write(
        "both.patch",
        "--- a/keep.txt\n+++ b/keep.txt\n@@ -1 +1 @@\n-a\n+b\n\
--- a/skip.txt\n+++ b/skip.txt\n@@ -1 +1 @@\n-a\n+b\n",
    )
    .unwrap();

    let errs = run_apply(&["--exclude=skip.*", "both.patch"]).unwrap();
    assert!(!errs);
    assert_eq!(fs::read("keep.txt").unwrap(), b"b\n");
    assert_eq!(fs::read("skip.txt").unwrap(), b"a\n");
}

#[test]
#[serial]
fn test_index_mode_stages_result() {
    let temp = tempdir().unwrap();
    setup_with_new_mend_in(temp.path());
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write("f.txt", "a\nb\nc\n").unwrap();
    let hash = object::write_blob(b"a\nb\nc\n").unwrap();
    let mut index = Index::load(path::index()).unwrap();
    index.add(IndexEntry {
        name: "f.txt".to_string(),
        mode: 0o100644,
        hash,
    });
    index.save(path::index()).unwrap();

    fs::write(
        "f.patch",
        "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n",
    )
    .unwrap();
    let errs = run_apply(&["--index", "f.patch"]).unwrap();
    assert!(!errs);

    // both the working tree and the index carry the postimage
    assert_eq!(fs::read("f.txt").unwrap(), b"a\nB\nc\n");
    let index = Index::load(path::index()).unwrap();
    assert_eq!(
        index.get("f.txt").unwrap().hash,
        object::hash_blob(b"a\nB\nc\n")
    );
}

#[test]
#[serial]
fn test_index_mode_refuses_unstaged_target() {
    let temp = tempdir().unwrap();
    setup_with_new_mend_in(temp.path());
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write("f.txt", "a\n").unwrap();
    fs::write(
        "f.patch",
        "--- a/f.txt\n+++ b/f.txt\n@@ -1 +1 @@\n-a\n+b\n",
    )
    .unwrap();
    let errs = run_apply(&["--index", "f.patch"]).unwrap();
    assert!(errs);
    assert_eq!(fs::read("f.txt").unwrap(), b"a\n");
}

#[test]
#[serial]
fn test_cached_leaves_worktree_alone() {
    let temp = tempdir().unwrap();
    setup_with_new_mend_in(temp.path());
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write("f.txt", "a\nb\nc\n").unwrap();
    let hash = object::write_blob(b"a\nb\nc\n").unwrap();
    let mut index = Index::load(path::index()).unwrap();
    index.add(IndexEntry {
        name: "f.txt".to_string(),
        mode: 0o100644,
        hash,
    });
    index.save(path::index()).unwrap();

    fs::write(
        "f.patch",
        "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n",
    )
    .unwrap();
    let errs = run_apply(&["--cached", "f.patch"]).unwrap();
    assert!(!errs);

    assert_eq!(fs::read("f.txt").unwrap(), b"a\nb\nc\n");
    let index = Index::load(path::index()).unwrap();
    assert_eq!(
        index.get("f.txt").unwrap().hash,
        object::hash_blob(b"a\nB\nc\n")
    );
}

#[test]
#[serial]
fn test_whitespace_error_policy_fails_session() {
    let temp = tempdir().unwrap();
    let _guard = ChangeDirGuard::new(temp.path());

    fs::write("f.txt", "a\n").unwrap();
    fs::write(
        "ws.patch",
        "--- a/f.txt\n+++ b/f.txt\n@@ -1 +1,2 @@\n a\n+trailing \n",
    )
    .unwrap();

    let result = run_apply(&["--whitespace=error", "ws.patch"]);
    assert!(result.is_err());
    // nothing was applied
    assert_eq!(fs::read("f.txt").unwrap(), b"a\n");
}

#[test]
#[serial]
fn test_stat_and_numstat_output() {
    let temp = tempdir().unwrap();
    let patch = "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,4 @@\n a\n-b\n+B\n+B2\n c\n";
    fs::write(temp.path().join("f.txt"), "a\nb\nc\n").unwrap();
    fs::write(temp.path().join("s.patch"), patch).unwrap();

    Command::cargo_bin("mend")
        .unwrap()
        .current_dir(temp.path())
        .args(["apply", "--numstat", "s.patch"])
        .assert()
        .success()
        .stdout("2\t1\tf.txt\n");

    Command::cargo_bin("mend")
        .unwrap()
        .current_dir(temp.path())
        .args(["apply", "--stat", "s.patch"])
        .assert()
        .success()
        .stdout(predicates::str::contains(
            " 1 files changed, 2 insertions(+), 1 deletions(-)",
        ));

    // stat/numstat do not touch the file
    assert_eq!(fs::read(temp.path().join("f.txt")).unwrap(), b"a\nb\nc\n");
}

#[test]
#[serial]
fn test_summary_reports_creations_and_renames() {
    let temp = tempdir().unwrap();
    let patch = "diff --git a/old.txt b/new.txt\nsimilarity index 90%\nrename from old.txt\nrename to new.txt\n\
diff --git a/made.txt b/made.txt\nnew file mode 100644\n--- /dev/null\n+++ b/made.txt\n@@ -0,0 +1 @@\n+x\n";
    fs::write(temp.path().join("s.patch"), patch).unwrap();

    Command::cargo_bin("mend")
        .unwrap()
        .current_dir(temp.path())
        .args(["apply", "--summary", "s.patch"])
        .assert()
        .success()
        .stdout(predicates::str::contains("rename old.txt => new.txt (90%)"))
        .stdout(predicates::str::contains("create mode 100644 made.txt"));
}

#[test]
#[serial]
fn test_exit_code_one_on_failed_patch() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("f.txt"), "unrelated\n").unwrap();
    fs::write(
        temp.path().join("f.patch"),
        "--- a/f.txt\n+++ b/f.txt\n@@ -1 +1 @@\n-x\n+y\n",
    )
    .unwrap();

    Command::cargo_bin("mend")
        .unwrap()
        .current_dir(temp.path())
        .args(["apply", "f.patch"])
        .assert()
        .code(1);
}

#[test]
#[serial]
fn test_corrupt_patch_is_fatal() {
    let temp = tempdir().unwrap();
    fs::write(
        temp.path().join("bad.patch"),
        "--- a/f.txt\n+++ b/f.txt\n@@ -1,5 +1,5 @@\n a\n",
    )
    .unwrap();

    Command::cargo_bin("mend")
        .unwrap()
        .current_dir(temp.path())
        .args(["apply", "bad.patch"])
        .assert()
        .code(128)
        .stderr(predicates::str::contains("corrupt patch"));
}

#[test]
#[serial]
fn test_patch_from_stdin() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("f.txt"), "x\n").unwrap();

    Command::cargo_bin("mend")
        .unwrap()
        .current_dir(temp.path())
        .args(["apply"])
        .write_stdin("--- a/f.txt\n+++ b/f.txt\n@@ -1 +1 @@\n-x\n+y\n")
        .assert()
        .success();
    assert_eq!(fs::read(temp.path().join("f.txt")).unwrap(), b"y\n");
}

#[test]
#[serial]
fn test_no_changes_input_fails() {
    let temp = tempdir().unwrap();

    Command::cargo_bin("mend")
        .unwrap()
        .current_dir(temp.path())
        .args(["apply"])
        .write_stdin("not a patch at all\n")
        .assert()
        .code(1)
        .stderr(predicates::str::contains("No changes"));
}
