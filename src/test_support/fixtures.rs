//! Test fixtures for common test scenarios.
//!
//! Nested builds are simulated with small `sh` scripts that honour the
//! `BERTH_INSTALL_*` contract the way a real nested `berth install` would.

use std::path::{Path, PathBuf};

/// Script that installs a placeholder library `name` at `version` into the
/// directories named by the `BERTH_INSTALL_*` variables, then exits 0.
pub fn installing_nested_script(dir: &Path, name: &str, version: &str) -> PathBuf {
    let script = dir.join(format!("install-{}.sh", name));
    let body = format!(
        r##"#!/bin/sh
set -e
: "${{BERTH_INSTALL_INCLUDE_DIR:?}}" "${{BERTH_INSTALL_LIB_DIR:?}}" "${{BERTH_INSTALL_LIBROOT_DIR:?}}" "${{BERTH_BUILD_DIR:?}}"
mkdir -p "$BERTH_INSTALL_INCLUDE_DIR/{name}" "$BERTH_INSTALL_LIB_DIR" "$BERTH_INSTALL_LIBROOT_DIR/{name}" "$BERTH_BUILD_DIR"
echo "#pragma once" > "$BERTH_INSTALL_INCLUDE_DIR/{name}/{name}.hpp"
printf '!<arch>\n' > "$BERTH_INSTALL_LIB_DIR/lib{name}.a"
cat > "$BERTH_INSTALL_LIBROOT_DIR/{name}/{version}.toml" <<EOF
name = '{name}'
version = '{version}'
include-dir = '$BERTH_INSTALL_INCLUDE_DIR'
library = '$BERTH_INSTALL_LIB_DIR/lib{name}.a'
EOF
"##
    );
    write_script(&script, &body);
    script
}

/// Script that writes to stderr and exits with `code` without installing.
pub fn failing_nested_script(dir: &Path, code: i32) -> PathBuf {
    let script = dir.join(format!("exit-{}.sh", code));
    let body = format!("#!/bin/sh\necho \"nested build exiting with {code}\" >&2\nexit {code}\n");
    write_script(&script, &body);
    script
}

/// Manifest for a composite library whose nested dependency runs `script`.
pub fn composite_manifest(name: &str, version: Option<&str>, nested: &str, script: &Path) -> String {
    let version = version
        .map(|v| format!("version = \"{}\"\n", v))
        .unwrap_or_default();
    format!(
        r#"[package]
name = "{name}"
{version}
[library]
sources = ["src/*.cpp"]
include = "include"
api-def = "{api}"

[nested]
path = "."
name = "{nested}"
version = "1.0.0"
program = "sh"
args = ['{script}']

[test]
sources = ["test/*.cpp"]
"#,
        api = format!("{}_API", name.to_uppercase().replace(['.', '-'], "_")),
        script = script.display(),
    )
}

/// Write a project with `manifest`, one source, one header and one test.
pub fn write_project(root: &Path, name: &str, manifest: &str) -> PathBuf {
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::create_dir_all(root.join("include").join(name)).unwrap();
    std::fs::create_dir_all(root.join("test")).unwrap();
    std::fs::write(root.join("src").join(format!("{}.cpp", name)), "int value() { return 1; }\n").unwrap();
    std::fs::write(
        root.join("include").join(name).join(format!("{}.hpp", name)),
        "#pragma once\nint value();\n",
    )
    .unwrap();
    std::fs::write(
        root.join("test").join(format!("{}_test.cpp", name)),
        "int main() { return 0; }\n",
    )
    .unwrap();

    let path = root.join(crate::core::manifest::MANIFEST_NAME);
    std::fs::write(&path, manifest).unwrap();
    path
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
