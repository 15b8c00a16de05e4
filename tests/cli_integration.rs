//! CLI integration tests for Berth.
//!
//! Most tests point CC/CXX/AR at paths that do not exist: the scenarios
//! they cover fail or finish before anything is compiled. Tests that need
//! a real C++ compiler are ignored by default.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the berth binary command, isolated from the user's environment.
fn berth(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("berth").unwrap();
    cmd.env("HOME", home)
        .env("CC", "/nonexistent/gcc")
        .env("CXX", "/nonexistent/g++")
        .env("AR", "/nonexistent/ar")
        .env_remove("BERTH_LIBROOT_PATH")
        .env_remove("BERTH_INSTALL_INCLUDE_DIR")
        .env_remove("BERTH_INSTALL_LIB_DIR")
        .env_remove("BERTH_INSTALL_LIBROOT_DIR")
        .env_remove("BERTH_BUILD_DIR");
    cmd
}

/// Berth command that uses whatever compiler the machine has.
fn berth_with_compiler(home: &Path) -> Command {
    let mut cmd = berth(home);
    cmd.env_remove("CC").env_remove("CXX").env_remove("AR");
    cmd
}

fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn write_script(path: &Path, body: &str) -> PathBuf {
    fs::write(path, body).unwrap();
    path.to_path_buf()
}

fn write_manifest(dir: &Path, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("Berth.toml"), content).unwrap();
}

// ============================================================================
// manifest discovery
// ============================================================================

#[test]
fn test_build_without_manifest_fails() {
    let tmp = temp_dir();

    berth(tmp.path())
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not find `Berth.toml`"));
}

#[test]
fn test_invalid_manifest_reports_parse_error() {
    let tmp = temp_dir();
    write_manifest(tmp.path(), "[package\nname = ");

    berth(tmp.path())
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

// ============================================================================
// berth build
// ============================================================================

#[test]
fn test_nested_failure_exit_code_is_reported() {
    let tmp = temp_dir();
    let project = tmp.path().join("outer");
    fs::create_dir_all(project.join("src")).unwrap();
    fs::write(project.join("src/outer.cpp"), "int outer() { return 0; }\n").unwrap();
    let script = write_script(
        &tmp.path().join("fail.sh"),
        "#!/bin/sh\necho 'inner failed' >&2\nexit 2\n",
    );

    write_manifest(
        &project,
        &format!(
            r#"[package]
name = "outer"
version = "0.1.0"

[library]
sources = ["src/*.cpp"]

[nested]
path = "."
name = "inner"
version = "1.0.0"
program = "sh"
args = ['{}']
"#,
            script.display()
        ),
    );

    berth(tmp.path())
        .arg("build")
        .current_dir(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("exit code 2"))
        .stderr(predicate::str::contains("inner failed"));

    // The composite library was never compiled.
    assert!(!project.join(".berth/target/debug/libouter.a").exists());
}

#[test]
fn test_nested_without_version_fails_before_spawning() {
    let tmp = temp_dir();
    let project = tmp.path().join("outer");
    let marker = tmp.path().join("spawned");
    let script = write_script(
        &tmp.path().join("touch.sh"),
        &format!("#!/bin/sh\ntouch '{}'\n", marker.display()),
    );

    write_manifest(
        &project,
        &format!(
            r#"[package]
name = "outer"
version = "0.1.0"

[nested]
path = "."
name = "inner"
program = "sh"
args = ['{}']
"#,
            script.display()
        ),
    );

    berth(tmp.path())
        .arg("build")
        .current_dir(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no version configured for inner"));

    assert!(!marker.exists());
}

// ============================================================================
// berth install
// ============================================================================

#[test]
fn test_install_without_version_fails() {
    let tmp = temp_dir();
    let project = tmp.path().join("unversioned");
    write_manifest(&project, "[package]\nname = \"unversioned\"\n");

    berth(tmp.path())
        .arg("install")
        .current_dir(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no version configured for unversioned"));

    assert!(!tmp.path().join(".berth/libroot").exists());
}

#[test]
fn test_install_header_only_library() {
    let tmp = temp_dir();
    let project = tmp.path().join("headers");
    fs::create_dir_all(project.join("include/headers")).unwrap();
    fs::write(project.join("include/headers/headers.hpp"), "#pragma once\n").unwrap();
    write_manifest(
        &project,
        "[package]\nname = \"headers\"\nversion = \"2.0.0\"\n\n[library]\ninclude = \"include\"\n",
    );
    let prefix = tmp.path().join("prefix");

    berth(tmp.path())
        .arg("install")
        .current_dir(&project)
        .env("BERTH_INSTALL_INCLUDE_DIR", prefix.join("include"))
        .env("BERTH_INSTALL_LIB_DIR", prefix.join("lib"))
        .env("BERTH_INSTALL_LIBROOT_DIR", prefix.join("libroot"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Installing headers v2.0.0"));

    assert!(prefix.join("libroot/headers/2.0.0.toml").is_file());
    assert!(prefix.join("include/headers/headers.hpp").is_file());
}

#[test]
fn test_install_builds_in_parent_scratch_dir() {
    let tmp = temp_dir();
    let project = tmp.path().join("headers");
    fs::create_dir_all(project.join("include/headers")).unwrap();
    fs::write(project.join("include/headers/headers.hpp"), "#pragma once\n").unwrap();
    write_manifest(
        &project,
        "[package]\nname = \"headers\"\nversion = \"2.0.0\"\n\n[library]\ninclude = \"include\"\n",
    );
    let parent = tmp.path().join("parent/nested/headers");

    berth(tmp.path())
        .arg("install")
        .current_dir(&project)
        .env("BERTH_INSTALL_INCLUDE_DIR", parent.join("install/include"))
        .env("BERTH_INSTALL_LIB_DIR", parent.join("install/lib"))
        .env("BERTH_INSTALL_LIBROOT_DIR", tmp.path().join("parent/libroot"))
        .env("BERTH_BUILD_DIR", parent.join("build"))
        .assert()
        .success();

    assert!(parent.join("build/debug").is_dir());
    assert!(!project.join(".berth").exists());
    assert!(tmp.path().join("parent/libroot/headers/2.0.0.toml").is_file());
}

// ============================================================================
// berth clean
// ============================================================================

#[test]
fn test_clean_removes_target_dir() {
    let tmp = temp_dir();
    write_manifest(tmp.path(), "[package]\nname = \"p\"\n");
    let output = tmp.path().join(".berth/target/debug");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("libp.a"), "!<arch>\n").unwrap();

    berth(tmp.path())
        .arg("clean")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed"));

    assert!(!tmp.path().join(".berth/target").exists());
}

// ============================================================================
// real compiler
// ============================================================================

fn write_compiled_project(root: &Path, test_exit: i32) {
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("include/calc")).unwrap();
    fs::create_dir_all(root.join("test")).unwrap();
    fs::write(
        root.join("include/calc/calc.hpp"),
        "#pragma once\nCALC_API int add(int a, int b);\n",
    )
    .unwrap();
    fs::write(
        root.join("src/calc.cpp"),
        "#include <calc/calc.hpp>\nint add(int a, int b) { return a + b; }\n",
    )
    .unwrap();
    fs::write(
        root.join("test/calc_test.cpp"),
        format!(
            "#include <calc/calc.hpp>\nint main() {{ return add(1, 2) == 3 ? {} : 1; }}\n",
            test_exit
        ),
    )
    .unwrap();
    write_manifest(
        root,
        r#"[package]
name = "calc"
version = "1.0.0"

[library]
sources = ["src/*.cpp"]
include = "include"
api-def = "CALC_API"

[test]
sources = ["test/*.cpp"]
"#,
    );
}

#[test]
#[ignore = "requires a C++ compiler"]
fn test_build_and_test_with_real_compiler() {
    let tmp = temp_dir();
    write_compiled_project(tmp.path(), 0);

    berth_with_compiler(tmp.path())
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Finished"));

    berth_with_compiler(tmp.path())
        .arg("test")
        .current_dir(tmp.path())
        .assert()
        .success();
}

#[test]
#[ignore = "requires a C++ compiler"]
fn test_failing_test_exit_code_is_propagated() {
    let tmp = temp_dir();
    write_compiled_project(tmp.path(), 4);

    berth_with_compiler(tmp.path())
        .arg("test")
        .current_dir(tmp.path())
        .assert()
        .code(4);
}

#[test]
#[ignore = "requires a C++ compiler"]
fn test_nested_berth_install_links_into_parent() {
    let tmp = temp_dir();
    let outer = tmp.path().join("outer");
    write_compiled_project(&outer.join("deps/calc"), 0);

    fs::create_dir_all(outer.join("src")).unwrap();
    fs::write(
        outer.join("src/outer.cpp"),
        "#include <calc/calc.hpp>\nint twice(int a) { return add(a, a); }\n",
    )
    .unwrap();
    write_manifest(
        &outer,
        r#"[package]
name = "outer"
version = "0.1.0"

[library]
sources = ["src/*.cpp"]

[nested]
path = "deps/calc"
name = "calc"
version = "1.0.0"
"#,
    );

    berth_with_compiler(tmp.path())
        .arg("build")
        .current_dir(&outer)
        .assert()
        .success();

    let nested = outer.join(".berth/target/debug");
    assert!(nested.join("libroot/calc/1.0.0.toml").is_file());
    assert!(nested.join("nested/calc/install/lib/libcalc.a").is_file());
    assert!(nested.join("nested/calc/build/debug/libcalc.a").is_file());
    assert!(!outer.join("deps/calc/.berth").exists());
}
