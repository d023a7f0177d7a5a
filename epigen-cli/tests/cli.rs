use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
    fs::write(path, text).expect("write source");
}

fn epigen() -> Command {
    Command::cargo_bin("epigen-cli").expect("binary exists")
}

#[test]
fn generates_all_artifacts() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("src");
    let output = dir.path().join("out");
    let build = dir.path().join("build");
    write(&input.join("core/A.epi"), "class A { epiS32 Value = 1; };");

    epigen()
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--dir-output-build")
        .arg(&build)
        .assert()
        .success();

    assert!(output.join("core/A.h").exists());
    assert!(output.join("core/A.cpp").exists());
    assert!(build.join("core/A.hxx").exists());
    assert!(build.join("core/A.cxx").exists());
    assert!(build.join("epigen-cache.bin").exists());
}

#[test]
fn uses_manifest_modules() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("src");
    write(&input.join("engine/math/Vec.epi"), "class Vec { epiFloat X; };");
    let manifest = dir.path().join("manifest.json");
    fs::write(&manifest, r#"{ "modules": ["engine", "engine/math"] }"#).expect("write manifest");

    epigen()
        .arg("-i")
        .arg(&input)
        .arg("-m")
        .arg(&manifest)
        .assert()
        .success();

    let header = fs::read_to_string(input.join("engine/math/Vec.h")).expect("header");
    assert!(header.contains("#include \"math/Vec.hxx\""));
}

#[test]
fn prints_dependencies_and_outputs() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("src");
    write(&input.join("A.epi"), "class A {};");
    write(&input.join("skip/B.epi"), "class B {};");

    epigen()
        .arg("-i")
        .arg(&input)
        .arg("--ignore-list")
        .arg("skip/*")
        .arg("--print-dependencies")
        .assert()
        .success()
        .stdout(predicate::str::contains("/src/A.epi").and(predicate::str::contains("B.epi").not()));

    epigen()
        .arg("-i")
        .arg(&input)
        .arg("--print-outputs")
        .assert()
        .success()
        .stdout(predicate::str::contains("/src/A.h;").and(predicate::str::contains("/src/skip/B.cxx")));

    assert!(!input.join("A.h").exists());
}

#[test]
fn reports_diagnostics_and_fails() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("src");
    write(&input.join("A.epi"), "class A : Missing {};");

    epigen()
        .arg("-i")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Linker error").and(predicate::str::contains("Missing")));
}

#[test]
fn reports_invalid_manifest() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("src");
    write(&input.join("A.epi"), "class A {};");
    let manifest = dir.path().join("manifest.json");
    fs::write(&manifest, "{ not json").expect("write manifest");

    epigen()
        .arg("-i")
        .arg(&input)
        .arg("--manifest")
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load manifest"));
}
