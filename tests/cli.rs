//! End-to-end tests for the report binary.
//!
//! A small shell script stands in for addr2line: it reads addresses from
//! stdin and answers `fn_<addr>` and `src/<addr>.c:1` for each of them.

#![cfg(unix)]

use pretty_assertions::assert_eq;
use std::fmt::Write as _;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const FAKE_ADDR2LINE: &str = r#"#!/bin/sh
exec awk '{ print "fn_" $1; print "src/" $1 ".c:1 (discriminator 2)" }'
"#;

// Only answers for the first address.
const SHORT_ADDR2LINE: &str = r#"#!/bin/sh
read a
echo "fn_$a"
echo "src/$a.c:1"
"#;

const SCENARIO: &str = "0x100 5 t1\n0x100 3 t2\n0x200 10 t1\n0x300 abc t1\n";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(input: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join("callcounter.raw"), input).expect("write input");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, body).expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
        path
    }

    fn run(&self, resolver: &Path, extra: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_callcount-report"))
            .arg("--binary")
            .arg(self.path("app"))
            .arg("--input")
            .arg(self.path("callcounter.raw"))
            .arg("--output")
            .arg(self.path("report.txt"))
            .arg("--resolver")
            .arg(resolver)
            .args(["--color", "never"])
            .args(extra)
            .output()
            .expect("run callcount-report")
    }

    fn report(&self) -> String {
        fs::read_to_string(self.path("report.txt")).expect("read report")
    }
}

fn assert_success(out: &Output) {
    assert!(
        out.status.success(),
        "exit={:?}\nstdout:\n{}\nstderr:\n{}",
        out.status.code(),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr),
    );
}

#[test]
fn sum_mode_report() {
    let fx = Fixture::new(SCENARIO);
    let resolver = fx.script("addr2line", FAKE_ADDR2LINE);

    let out = fx.run(&resolver, &["--sum"]);
    assert_success(&out);

    let expected = "\
=== Thread ALL_THREADS ===
Function  File:Line      Call Count
fn_0x200  src/0x200.c:1  10
fn_0x100  src/0x100.c:1  8

";
    assert_eq!(fx.report(), expected);

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with(expected));
    assert!(stdout.contains(&format!("Report saved to {}", fx.path("report.txt").display())));
}

#[test]
fn threaded_mode_report() {
    let fx = Fixture::new(SCENARIO);
    let resolver = fx.script("addr2line", FAKE_ADDR2LINE);

    let out = fx.run(&resolver, &["--threaded"]);
    assert_success(&out);

    let expected = "\
=== Thread t1 ===
Function  File:Line      Call Count
fn_0x200  src/0x200.c:1  10
fn_0x100  src/0x100.c:1  5

=== Thread t2 ===
Function  File:Line      Call Count
fn_0x100  src/0x100.c:1  3

";
    assert_eq!(fx.report(), expected);
}

#[test]
fn mode_flags_are_exclusive() {
    let fx = Fixture::new(SCENARIO);
    let resolver = fx.script("addr2line", FAKE_ADDR2LINE);

    for flags in [&["--sum", "--threaded"][..], &[][..]] {
        let out = fx.run(&resolver, flags);
        assert!(!out.status.success());
        assert!(String::from_utf8_lossy(&out.stderr).contains("choose exactly one mode"));
        assert!(!fx.path("report.txt").exists());
    }
}

#[test]
fn empty_input_emits_only_the_header() {
    let fx = Fixture::new("");
    let resolver = fx.script("addr2line", FAKE_ADDR2LINE);

    let out = fx.run(&resolver, &["--sum"]);
    assert_success(&out);
    assert_eq!(fx.report(), "=== Thread ALL_THREADS ===\n");
}

#[test]
fn missing_resolver_degrades_to_unknown() {
    let fx = Fixture::new("0x10 2 t\n0x20 1 t\n");

    let out = fx.run(Path::new("/nonexistent/addr2line"), &["--sum"]);
    assert_success(&out);

    let expected = "\
=== Thread ALL_THREADS ===
Function   File:Line  Call Count
<unknown>  <unknown>  2
<unknown>  <unknown>  1

";
    assert_eq!(fx.report(), expected);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("symbol resolution failed"));
    assert!(!stderr.contains('\u{1b}'), "escape codes in piped log output: {stderr:?}");
}

#[test]
fn piped_logs_are_plain_without_a_color_flag() {
    let fx = Fixture::new("0x10 2 t\n");

    let out = Command::new(env!("CARGO_BIN_EXE_callcount-report"))
        .arg("--binary")
        .arg(fx.path("app"))
        .arg("--input")
        .arg(fx.path("callcounter.raw"))
        .arg("--output")
        .arg(fx.path("report.txt"))
        .args(["--resolver", "/nonexistent/addr2line", "--sum"])
        .output()
        .expect("run callcount-report");
    assert_success(&out);

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("symbol resolution failed"));
    assert!(!stderr.contains('\u{1b}'), "escape codes in piped log output: {stderr:?}");
}

#[test]
fn short_resolver_output_fills_unknowns() {
    let fx = Fixture::new("0x10 2 t\n0x20 1 t\n");
    let resolver = fx.script("addr2line", SHORT_ADDR2LINE);

    let out = fx.run(&resolver, &["--sum"]);
    assert_success(&out);

    let report = fx.report();
    assert!(report.contains("fn_0x10    src/0x10.c:1  2\n"));
    assert!(report.contains("<unknown>  <unknown>     1\n"));
}

#[test]
fn json_report_is_written() {
    let fx = Fixture::new(SCENARIO);
    let resolver = fx.script("addr2line", FAKE_ADDR2LINE);
    let json = fx.path("report.json");

    let out = fx.run(&resolver, &["--threaded", "--json", json.to_str().unwrap()]);
    assert_success(&out);

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(value["mode"], "threaded");
    assert_eq!(value["partitions"][0]["label"], "t1");
    assert_eq!(value["partitions"][0]["rows"][0]["function"], "fn_0x200");
    assert_eq!(value["partitions"][0]["rows"][0]["location"], "src/0x200.c:1");
    assert_eq!(value["partitions"][1]["rows"][0]["count"], 3);
}

#[test]
fn large_address_sets_resolve_in_one_batch() {
    let unique = 200_000;
    let mut input = String::new();
    for i in 1..=unique {
        writeln!(input, "0x{i:x} 1 t").unwrap();
    }
    let fx = Fixture::new(&input);
    let resolver = fx.script("addr2line", FAKE_ADDR2LINE);

    let out = fx.run(&resolver, &["--sum"]);
    assert_success(&out);

    let report = fx.report();
    assert!(!report.contains("<unknown>"));
    assert_eq!(report.lines().filter(|l| l.starts_with("fn_0x")).count(), unique);
    assert!(report.contains("fn_0x30d40  src/0x30d40.c:1  1\n"));
}

#[test]
fn unreadable_input_is_fatal() {
    let fx = Fixture::new("");
    fs::remove_file(fx.path("callcounter.raw")).unwrap();
    let resolver = fx.script("addr2line", FAKE_ADDR2LINE);

    let out = fx.run(&resolver, &["--sum"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("open count file"));
}
