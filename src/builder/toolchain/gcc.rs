//! GCC/Clang toolchain implementation.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::builder::errors::BuildError;
use crate::core::artifact::{ArtifactHandle, LinkKind};
use crate::util::process::ProcessBuilder;

use super::{ExecutableDescriptor, LibraryDescriptor, Toolchain, ToolchainPlatform};

/// GCC/Clang toolchain (Unix-like systems).
#[derive(Debug, Clone)]
pub struct GccToolchain {
    /// Path to the C compiler
    pub cc: PathBuf,
    /// Path to the C++ compiler
    pub cxx: PathBuf,
    /// Path to the archiver
    pub ar: PathBuf,
    /// Compiler family (gcc, clang, apple-clang)
    pub family: ToolchainPlatform,
    /// C++ standard, e.g. `c++20`
    pub cpp_std: Option<String>,
    /// Extra compile flags (profile and user flags)
    pub cflags: Vec<String>,
    /// Extra link flags
    pub ldflags: Vec<String>,
}

impl GccToolchain {
    /// Create a new GCC-style toolchain.
    pub fn new(cc: PathBuf, cxx: PathBuf, ar: PathBuf, family: ToolchainPlatform) -> Self {
        GccToolchain {
            cc,
            cxx,
            ar,
            family,
            cpp_std: None,
            cflags: Vec::new(),
            ldflags: Vec::new(),
        }
    }

    pub fn with_cpp_std(mut self, std: Option<String>) -> Self {
        self.cpp_std = std;
        self
    }

    pub fn with_cflags(mut self, flags: impl IntoIterator<Item = String>) -> Self {
        self.cflags.extend(flags);
        self
    }

    pub fn with_ldflags(mut self, flags: impl IntoIterator<Item = String>) -> Self {
        self.ldflags.extend(flags);
        self
    }

    /// Infer C++ compiler path from C compiler path.
    ///
    /// - gcc, x86_64-linux-gnu-gcc -> g++, x86_64-linux-gnu-g++
    /// - clang -> clang++
    /// - cc, /usr/bin/cc -> c++, /usr/bin/c++
    pub fn infer_cxx(cc: &Path) -> PathBuf {
        let cc_str = cc.to_string_lossy();

        if cc_str.ends_with("gcc") {
            return PathBuf::from(format!("{}++", &cc_str[..cc_str.len() - 2]));
        }

        if cc_str.ends_with("clang") {
            return PathBuf::from(format!("{}++", cc_str));
        }

        // Only a complete "cc" basename, not "mycc"
        let is_standalone_cc = cc_str == "cc" || cc_str.ends_with("/cc") || cc_str.ends_with("-cc");
        if is_standalone_cc {
            return PathBuf::from(format!("{}++", &cc_str[..cc_str.len() - 1]));
        }

        PathBuf::from(format!("{}++", cc_str))
    }

    /// Command compiling one source file to an object file.
    pub fn compile_command(
        &self,
        source: &Path,
        output: &Path,
        include_dirs: &[PathBuf],
        defines: &[String],
    ) -> ProcessBuilder {
        let is_c = source.extension().and_then(|e| e.to_str()) == Some("c");
        let compiler = if is_c { &self.cc } else { &self.cxx };

        let mut cmd = ProcessBuilder::new(compiler).arg("-c");

        if !is_c {
            if let Some(ref std) = self.cpp_std {
                cmd = cmd.arg(format!("-std={}", std));
            }
        }

        for dir in include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        for define in defines {
            cmd = cmd.arg(format!("-D{}", define));
        }

        cmd.args(&self.cflags).arg(source).arg("-o").arg(output)
    }

    /// Command creating a static archive.
    pub fn archive_command(&self, objects: &[PathBuf], output: &Path) -> ProcessBuilder {
        ProcessBuilder::new(&self.ar)
            .arg("rcs")
            .arg(output)
            .args(objects)
    }

    /// Command linking an executable.
    pub fn link_command(
        &self,
        objects: &[PathBuf],
        output: &Path,
        libraries: &[std::sync::Arc<ArtifactHandle>],
    ) -> ProcessBuilder {
        let mut cmd = ProcessBuilder::new(&self.cxx)
            .arg("-o")
            .arg(output)
            .args(objects);

        for lib in libraries.iter().filter(|l| l.is_linkable()) {
            cmd = cmd.arg(&lib.location);
            if lib.link == LinkKind::Dynamic {
                if let Some(dir) = lib.location.parent() {
                    cmd = cmd.arg(format!("-Wl,-rpath,{}", dir.display()));
                }
            }
        }

        cmd.args(&self.ldflags)
    }

    fn compile_objects(
        &self,
        target: &str,
        sources: &[PathBuf],
        obj_dir: &Path,
        include_dirs: &[PathBuf],
        defines: &[String],
    ) -> Result<Vec<PathBuf>, BuildError> {
        std::fs::create_dir_all(obj_dir).map_err(|e| BuildError::io(obj_dir, e))?;

        sources
            .par_iter()
            .enumerate()
            .map(|(i, source)| {
                let stem = source
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "source".to_string());
                let object = obj_dir.join(format!("{}-{}.o", stem, i));

                let cmd = self.compile_command(source, &object, include_dirs, defines);
                tracing::debug!("Compiling {}", source.display());
                run_checked(target, &cmd)?;
                Ok(object)
            })
            .collect()
    }
}

impl Toolchain for GccToolchain {
    fn platform(&self) -> ToolchainPlatform {
        self.family
    }

    fn compiler_path(&self) -> &Path {
        &self.cxx
    }

    fn compile_library(&self, desc: &LibraryDescriptor) -> Result<ArtifactHandle, BuildError> {
        let defines = desc.defines();

        let mut include_dirs = desc.include_dirs.clone();
        let mut all_defines = defines.clone();
        for link in &desc.links {
            for dir in link.all_include_dirs() {
                if !include_dirs.contains(&dir) {
                    include_dirs.push(dir);
                }
            }
            for define in link.all_defines() {
                if !all_defines.contains(&define) {
                    all_defines.push(define);
                }
            }
        }

        let location = if desc.sources.is_empty() {
            desc.include_dirs
                .first()
                .cloned()
                .unwrap_or_else(|| desc.output_dir.clone())
        } else {
            let obj_dir = desc.output_dir.join("obj").join(&desc.name);
            let objects =
                self.compile_objects(&desc.name, &desc.sources, &obj_dir, &include_dirs, &all_defines)?;

            let archive = desc.output_dir.join(format!("lib{}.a", desc.name));
            tracing::debug!("Creating static library {}", archive.display());
            run_checked(&desc.name, &self.archive_command(&objects, &archive))?;
            archive
        };

        let mut handle = ArtifactHandle::library(&desc.name, location);
        for dir in &desc.include_dirs {
            handle = handle.with_include_dir(dir);
        }
        for define in defines {
            handle = handle.with_define(define);
        }
        for link in &desc.links {
            handle = handle.with_requirement(link.clone());
        }
        Ok(handle)
    }

    fn compile_executable(
        &self,
        desc: &ExecutableDescriptor,
    ) -> Result<ArtifactHandle, BuildError> {
        let mut handle = ArtifactHandle::executable(&desc.name, desc.output_dir.join(&desc.name));
        for link in &desc.links {
            handle = handle.with_requirement(link.clone());
        }

        let mut include_dirs = desc.include_dirs.clone();
        for dir in handle.all_include_dirs() {
            if !include_dirs.contains(&dir) {
                include_dirs.push(dir);
            }
        }
        let defines = handle.all_defines();

        let obj_dir = desc.output_dir.join("obj").join(&desc.name);
        let objects =
            self.compile_objects(&desc.name, &desc.sources, &obj_dir, &include_dirs, &defines)?;

        let libraries = handle.transitive_requirements();
        tracing::debug!("Linking {}", handle.location.display());
        run_checked(
            &desc.name,
            &self.link_command(&objects, &handle.location, &libraries),
        )?;

        Ok(handle)
    }
}

fn run_checked(target: &str, cmd: &ProcessBuilder) -> Result<(), BuildError> {
    let output = cmd.exec().map_err(|e| BuildError::Toolchain {
        target: target.to_string(),
        message: format!("{:#}", e),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BuildError::Toolchain {
            target: target.to_string(),
            message: format!("`{}` failed\n{}", cmd.display_command(), stderr),
        });
    }
    Ok(())
}
