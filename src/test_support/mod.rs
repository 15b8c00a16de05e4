//! Test utilities and mocks for Berth unit tests.
//!
//! [`RecordingToolchain`] stands in for a real compiler: it records every
//! call, writes placeholder outputs where a real toolchain would, and
//! resolves required libraries from a fixed table.

pub mod fixtures;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::builder::errors::BuildError;
use crate::builder::toolchain::{
    ExecutableDescriptor, LibraryDescriptor, Toolchain, ToolchainPlatform,
};
use crate::core::artifact::{ArtifactHandle, LinkKind};

pub use fixtures::*;

/// One call made to a [`RecordingToolchain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Library { name: String, links: Vec<PathBuf> },
    Executable { name: String, links: Vec<PathBuf> },
}

/// Toolchain mock that records calls instead of compiling.
#[derive(Debug, Default)]
pub struct RecordingToolchain {
    calls: Mutex<Vec<Invocation>>,
    required: HashMap<(String, String), PathBuf>,
    test_exit_code: i32,
}

impl RecordingToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `require(name, version)` resolve to a library at `location`.
    pub fn with_required(mut self, name: &str, version: &str, location: impl Into<PathBuf>) -> Self {
        self.required
            .insert((name.to_string(), version.to_string()), location.into());
        self
    }

    /// Exit code of the executables this toolchain "links".
    pub fn with_test_exit_code(mut self, code: i32) -> Self {
        self.test_exit_code = code;
        self
    }

    /// Calls made so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Invocation) {
        self.calls.lock().unwrap().push(call);
    }
}

fn locations(links: &[Arc<ArtifactHandle>]) -> Vec<PathBuf> {
    links.iter().map(|l| l.location.clone()).collect()
}

fn write_placeholder(path: &Path, contents: &str) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| BuildError::io(path, e))
}

impl Toolchain for RecordingToolchain {
    fn platform(&self) -> ToolchainPlatform {
        ToolchainPlatform::Gcc
    }

    fn compiler_path(&self) -> &Path {
        Path::new("recording-c++")
    }

    fn compile_library(&self, desc: &LibraryDescriptor) -> Result<ArtifactHandle, BuildError> {
        self.record(Invocation::Library {
            name: desc.name.clone(),
            links: locations(&desc.links),
        });

        let location = if desc.sources.is_empty() {
            desc.include_dirs
                .first()
                .cloned()
                .unwrap_or_else(|| desc.output_dir.clone())
        } else {
            let archive = desc.output_dir.join(format!("lib{}.a", desc.name));
            write_placeholder(&archive, "!<arch>\n")?;
            archive
        };

        let mut handle = ArtifactHandle::library(&desc.name, location);
        for dir in &desc.include_dirs {
            handle = handle.with_include_dir(dir);
        }
        for define in desc.defines() {
            handle = handle.with_define(define);
        }
        for link in &desc.links {
            handle = handle.with_requirement(Arc::clone(link));
        }
        Ok(handle)
    }

    fn compile_executable(
        &self,
        desc: &ExecutableDescriptor,
    ) -> Result<ArtifactHandle, BuildError> {
        self.record(Invocation::Executable {
            name: desc.name.clone(),
            links: locations(&desc.links),
        });

        let exe = desc.output_dir.join(&desc.name);
        write_placeholder(&exe, &format!("#!/bin/sh\nexit {}\n", self.test_exit_code))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755))
                .map_err(|e| BuildError::io(&exe, e))?;
        }

        let mut handle = ArtifactHandle::executable(&desc.name, exe);
        for link in &desc.links {
            handle = handle.with_requirement(Arc::clone(link));
        }
        Ok(handle)
    }

    fn require(&self, name: &str, version: &str, link: LinkKind) -> Result<ArtifactHandle, BuildError> {
        match self.required.get(&(name.to_string(), version.to_string())) {
            Some(location) => Ok(ArtifactHandle::library(name, location).with_link(link)),
            None => Err(BuildError::ArtifactNotFound {
                name: name.to_string(),
                version: version.to_string(),
                searched: "(recording toolchain)".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_recording_toolchain_records_calls() {
        let tmp = TempDir::new().unwrap();
        let tc = RecordingToolchain::new();

        let lib = tc
            .compile_library(
                &LibraryDescriptor::new("lib", "1.0.0", tmp.path()).source("a.cpp"),
            )
            .unwrap();
        assert!(lib.location().is_file());

        let exe = tc
            .compile_executable(
                &ExecutableDescriptor::new("app", tmp.path()).link(Arc::new(lib)),
            )
            .unwrap();
        assert!(exe.location().is_file());

        assert_eq!(tc.invocations().len(), 2);
    }

    #[test]
    #[cfg(unix)]
    fn test_installing_script_writes_header_and_libroot() {
        use crate::core::libroot::Libroot;
        use crate::util::process::ProcessBuilder;

        let tmp = TempDir::new().unwrap();
        let script = installing_nested_script(tmp.path(), "inner", "1.0.0");
        let prefix = tmp.path().join("prefix");

        let status = ProcessBuilder::new("sh")
            .arg(&script)
            .env("BERTH_INSTALL_INCLUDE_DIR", prefix.join("include"))
            .env("BERTH_INSTALL_LIB_DIR", prefix.join("lib"))
            .env("BERTH_INSTALL_LIBROOT_DIR", prefix.join("libroot"))
            .env("BERTH_BUILD_DIR", prefix.join("build"))
            .status()
            .unwrap();
        assert!(status.success());

        let header = std::fs::read_to_string(prefix.join("include/inner/inner.hpp")).unwrap();
        assert_eq!(header.trim(), "#pragma once");

        let libroot = Libroot::load(&prefix.join("libroot/inner/1.0.0.toml")).unwrap();
        assert_eq!(libroot.include_dir, prefix.join("include"));
        assert_eq!(libroot.library, Some(prefix.join("lib/libinner.a")));
    }
}
