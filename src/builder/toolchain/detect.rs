//! Toolchain detection functions.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use which::which;

use crate::util::config::ToolchainSettings;

use super::{GccToolchain, ToolchainPlatform};

/// Detect the available toolchain.
///
/// Tries to find a C compiler and related tools with the following priority:
/// 1. Toolchain config (`.berth/toolchain.toml` or `~/.berth/toolchain.toml`)
/// 2. Environment variables (CC, CXX, AR)
/// 3. Common compiler names on PATH (cc/gcc/clang, plus ar/llvm-ar)
pub fn detect_toolchain(settings: &ToolchainSettings) -> Result<GccToolchain> {
    let toolchain = match try_detect_from_config(settings)? {
        Some(toolchain) => toolchain,
        None => match try_detect_gcc()? {
            Some(toolchain) => toolchain,
            None => bail!(
                "no C compiler found\n\
                 \n\
                 Berth requires a C/C++ compiler (gcc or clang).\n\
                 Set the CC and CXX environment variables, add them to \
                 `.berth/toolchain.toml`, or install a compiler."
            ),
        },
    };

    Ok(toolchain
        .with_cflags(settings.cflags.iter().cloned())
        .with_cflags(settings.cxxflags.iter().cloned())
        .with_ldflags(settings.ldflags.iter().cloned()))
}

/// Try to create a toolchain from config file settings.
fn try_detect_from_config(settings: &ToolchainSettings) -> Result<Option<GccToolchain>> {
    let cc = match &settings.cc {
        Some(cc) if cc.exists() => cc.clone(),
        Some(cc) => {
            tracing::warn!("Configured C compiler not found: {}", cc.display());
            return Ok(None);
        }
        None => return Ok(None),
    };

    let cxx = settings
        .cxx
        .clone()
        .filter(|p| p.exists())
        .or_else(|| std::env::var_os("CXX").map(PathBuf::from))
        .unwrap_or_else(|| GccToolchain::infer_cxx(&cc));

    let ar = settings
        .ar
        .clone()
        .filter(|p| p.exists())
        .or_else(|| std::env::var_os("AR").map(PathBuf::from))
        .or_else(|| which("ar").ok())
        .or_else(|| which("llvm-ar").ok());

    let Some(ar) = ar else {
        tracing::warn!("Archiver (ar) not found");
        return Ok(None);
    };

    let family = detect_compiler_family(&cc)?;

    tracing::info!(
        "Using toolchain from config: cc={}, ar={}",
        cc.display(),
        ar.display()
    );

    Ok(Some(GccToolchain::new(cc, cxx, ar, family)))
}

/// Try to detect a GCC/Clang toolchain from the environment and PATH.
fn try_detect_gcc() -> Result<Option<GccToolchain>> {
    let cc = match std::env::var_os("CC") {
        Some(cc) => PathBuf::from(cc),
        None => match which("cc").or_else(|_| which("gcc")).or_else(|_| which("clang")) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        },
    };

    let cxx = match std::env::var_os("CXX") {
        Some(cxx) => PathBuf::from(cxx),
        None => which("c++")
            .or_else(|_| which("g++"))
            .or_else(|_| which("clang++"))
            .unwrap_or_else(|_| GccToolchain::infer_cxx(&cc)),
    };

    let ar = match std::env::var_os("AR") {
        Some(ar) => PathBuf::from(ar),
        None => match which("ar").or_else(|_| which("llvm-ar")) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        },
    };

    let family = detect_compiler_family(&cc)?;
    tracing::debug!("Detected {} toolchain at {}", family.as_str(), cxx.display());

    Ok(Some(GccToolchain::new(cc, cxx, ar, family)))
}

/// Detect whether the compiler is GCC, Clang, or Apple Clang.
pub fn detect_compiler_family(cc: &Path) -> Result<ToolchainPlatform> {
    let name = cc
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    if name.contains("clang") {
        return Ok(detect_clang_variant(cc));
    } else if name.contains("gcc") || name.contains("g++") {
        return Ok(ToolchainPlatform::Gcc);
    }

    // cc/c++ are usually symlinks; ask the driver
    if let Ok(output) = std::process::Command::new(cc).arg("--version").output() {
        let stdout = String::from_utf8_lossy(&output.stdout).to_lowercase();
        if stdout.contains("clang") {
            return Ok(detect_clang_variant(cc));
        }
    }

    Ok(ToolchainPlatform::Gcc)
}

fn detect_clang_variant(cc: &Path) -> ToolchainPlatform {
    match std::process::Command::new(cc).arg("--version").output() {
        Ok(output) if String::from_utf8_lossy(&output.stdout).to_lowercase().contains("apple") => {
            ToolchainPlatform::AppleClang
        }
        _ => ToolchainPlatform::Clang,
    }
}
