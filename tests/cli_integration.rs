#![cfg(unix)]

use assert_cmd::Command;
use regex::Regex;
use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Copies each source to `<out>/<package>/<Stem>.class`; fails on `COMPILE_ERROR`.
const FAKE_JAVAC: &str = r#"#!/bin/sh
out=""
files=""
while [ $# -gt 0 ]; do
  case "$1" in
    -d) out="$2"; shift 2 ;;
    -cp) shift 2 ;;
    *) files="$files $1"; shift ;;
  esac
done
for f in $files; do
  if grep -q COMPILE_ERROR "$f"; then
    echo "$f: error: cannot compile" >&2
    exit 1
  fi
  pkg=$(sed -n 's/^package \(.*\);/\1/p' "$f" | tr . /)
  stem=$(basename "$f" .java)
  mkdir -p "$out/$pkg"
  cp "$f" "$out/$pkg/$stem.class"
done
"#;

/// Every test passes unless the first target's binary contains `BUG`; each
/// test covers the target lines that mention `x`.
const FAKE_WORKER: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    -b) bin="$2"; shift 2 ;;
    -c) shift 2 ;;
    -s) targets="$2"; shift 2 ;;
    -t) tests="$2"; shift 2 ;;
    *) shift ;;
  esac
done
target=${targets%%,*}
class="$bin/$(echo "$target" | tr . /).class"
if grep -q BUG "$class"; then passed=false; else passed=true; fi
lines=$(grep -n x "$class" | cut -d: -f1 | paste -sd, -)
out="$bin/../test-results.json"
printf '{"tests":[' > "$out"
sep=""
for t in $(echo "$tests" | tr , ' '); do
  printf '%s{"id":"%s.check","passed":%s,"coverage":{"%s":[%s]}}' "$sep" "$t" "$passed" "$target" "$lines" >> "$out"
  sep=","
done
printf ']}' >> "$out"
"#;

const FAULTY: &str = "package a;\nclass A {\n  int f(int x) {\n    x = BUG(x);\n    return x;\n  }\n}\n";
const CLEAN: &str = "package a;\nclass A {\n  int f(int x) {\n    return x;\n  }\n}\n";
const TEST: &str = "package a;\nclass ATest {\n}\n";

struct Fixture {
    _tools: TempDir,
    project: TempDir,
    path: OsString,
    worker: PathBuf,
}

fn write_executable(path: &Path, text: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::write(path, text).expect("write fake tool");
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn prepend_path(dir: &Path) -> OsString {
    let old = std::env::var_os("PATH").unwrap_or_default();

    std::env::join_paths(std::iter::once(dir.to_path_buf()).chain(std::env::split_paths(&old)))
        .expect("join PATH")
}

fn fixture(product: &str) -> Fixture {
    let tools = TempDir::new().expect("TempDir should create");
    write_executable(&tools.path().join("javac"), FAKE_JAVAC);
    let worker = tools.path().join("worker.sh");
    fs::write(&worker, FAKE_WORKER).unwrap();

    let project = TempDir::new().expect("TempDir should create");
    write(project.path(), "src/main/java/a/A.java", product);
    write(project.path(), "src/test/java/a/ATest.java", TEST);

    Fixture {
        path: prepend_path(tools.path()),
        worker,
        _tools: tools,
        project,
    }
}

struct Output {
    code: i32,
    stdout: String,
    stderr: String,
}

fn run_genrepair(fixture: &Fixture, args: &[&str]) -> Output {
    let out_dir = fixture.project.path().join("out");
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("genrepair"));
    cmd.args(args)
        .arg("--project")
        .arg(fixture.project.path())
        .arg("--test-worker")
        .arg(format!("sh {}", fixture.worker.display()))
        .arg("--out-dir")
        .arg(&out_dir)
        .arg("--workers")
        .arg("2")
        .env("PATH", &fixture.path)
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "off")
        .env("RUST_BACKTRACE", "0");

    let output = cmd.output().expect("command should run");
    Output {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

fn normalize_output(text: &str) -> String {
    let re_tmp = Regex::new(r#"/[^\s"]*/\.tmp[^\s"]*"#).unwrap();
    re_tmp.replace_all(text, "<TMP>").to_string()
}

#[test]
fn scan_prints_the_overview() {
    let fixture = fixture(FAULTY);
    let out = run_genrepair(&fixture, &["scan"]);
    assert_eq!(out.code, 0, "stderr: {}", out.stderr);

    let overview = out
        .stdout
        .split_once("--- project overview ---\n")
        .map(|(_, rest)| rest.to_string())
        .unwrap();
    insta::assert_snapshot!(normalize_output(&overview), @r"
    project root:            <TMP>
    product files:           1
    test files:              1
    product lines:           7
    test lines:              3
    statements:              3
    eligible statements:     2
    ");
}

#[test]
fn localize_json_ranks_the_faulty_statement_first() {
    let fixture = fixture(FAULTY);
    let out = run_genrepair(&fixture, &["localize", "--json"]);
    assert_eq!(out.code, 0, "stderr: {}", out.stderr);

    let report: Value = serde_json::from_str(&out.stdout).expect("stdout is JSON");
    assert_eq!(report["tool"], "genrepair");
    assert_eq!(report["formula"], "ochiai");
    assert_eq!(report["initial"]["build_success"], true);
    assert_eq!(report["initial"]["failed_tests"][0], "a.ATest.check");

    let top = &report["suspicious"][0];
    assert_eq!(top["location"]["text"], "x = BUG(x);");
    assert_eq!(top["value"], 1.0);
}

#[test]
fn run_repairs_and_writes_history_and_patches() {
    let fixture = fixture(FAULTY);
    let out = run_genrepair(
        &fixture,
        &[
            "run",
            "--seed",
            "3",
            "--mutations",
            "30",
            "--crossovers",
            "2",
            "--max-generations",
            "3",
        ],
    );
    assert_eq!(out.code, 0, "stdout: {}\nstderr: {}", out.stdout, out.stderr);
    assert!(out.stdout.contains("--- repair run summary ---"));
    assert!(out.stdout.contains("stop reason:  SolutionsFound"));

    let out_dir = fixture.project.path().join("out");
    let history: Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("history.json")).unwrap()).unwrap();
    let solution = &history["solutions"][0];
    assert!(solution["ancestors"].as_array().unwrap().contains(&Value::from(0)));

    let patches: Vec<_> = fs::read_dir(out_dir.join("patches"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert!(!patches.is_empty());
    let diff = fs::read_to_string(&patches[0]).unwrap();
    assert!(diff.contains("--- a/src/main/java/a/A.java"));
    assert!(diff.contains("-    x = BUG(x);"));

    let log = fs::read_to_string(out_dir.join("log")).unwrap();
    assert!(log.starts_with("tool: genrepair\n"));
    assert!(log.contains("seed: 3\n"));
}

#[test]
fn run_without_a_repair_exits_with_code_2() {
    let fixture = fixture(FAULTY);
    let out = run_genrepair(&fixture, &["run", "--max-generations", "0", "--json"]);
    assert_eq!(out.code, 2, "stderr: {}", out.stderr);

    let report: Value = serde_json::from_str(&out.stdout).expect("stdout is JSON");
    assert_eq!(report["stop"], "max_generations");
    assert_eq!(report["solutions"].as_array().unwrap().len(), 0);
    assert_eq!(report["initial"]["passed"], 0);
    assert_eq!(report["initial"]["total"], 1);
}

#[test]
fn passing_original_is_its_own_solution() {
    let fixture = fixture(CLEAN);
    let out = run_genrepair(&fixture, &["run", "--json"]);
    assert_eq!(out.code, 0, "stderr: {}", out.stderr);

    let report: Value = serde_json::from_str(&out.stdout).expect("stdout is JSON");
    assert_eq!(report["stop"], "initial_passes");
    assert_eq!(report["solutions"][0]["id"], 0);
    assert_eq!(report["solutions"][0]["diff"], "");
}

#[test]
fn configuration_errors_exit_with_code_1() {
    let fixture = fixture(FAULTY);
    let out = run_genrepair(&fixture, &["run", "--headcount", "0", "--json"]);
    assert_eq!(out.code, 1);

    let report: Value = serde_json::from_str(&out.stdout).expect("stdout is JSON");
    assert!(
        report["error"]
            .as_str()
            .unwrap()
            .contains("invalid option `headcount`")
    );

    let config = fixture.project.path().join("repair.toml");
    fs::write(&config, "sede = 1\n").unwrap();
    let out = run_genrepair(&fixture, &["scan", "--config", config.to_str().unwrap()]);
    assert_eq!(out.code, 1);
    assert!(out.stderr.contains("failed to load config file"));
}

#[test]
fn config_file_values_are_overridden_by_flags() {
    let fixture = fixture(FAULTY);
    let config = fixture.project.path().join("repair.toml");
    fs::write(&config, "seed = 99\nmax_generations = 0\n").unwrap();

    let out = run_genrepair(
        &fixture,
        &["run", "--config", config.to_str().unwrap(), "--seed", "5", "--json"],
    );
    assert_eq!(out.code, 2, "stderr: {}", out.stderr);
    let report: Value = serde_json::from_str(&out.stdout).expect("stdout is JSON");
    assert_eq!(report["seed"], 5);
    assert_eq!(report["generations"].as_array().unwrap().len(), 0);
}
