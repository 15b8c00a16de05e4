//! `berth install` command

use anyhow::Result;

use super::Session;
use crate::cli::BuildArgs;
use berth::ops::berth_build::{install, resolve_install_dirs};

pub fn execute(args: BuildArgs) -> Result<()> {
    let session = Session::load(&args)?;
    let dirs = resolve_install_dirs(&session.ws, &session.config)?;

    eprintln!("   Compiling {}", session.package());
    let installed = install(&session.ws, &session.ctx, &dirs)?;

    eprintln!(
        "  Installing {} v{} to {}",
        installed.libroot.name,
        installed.libroot.version,
        installed.root.location().display()
    );
    eprintln!("    Finished `{}` profile target(s)", session.ws.profile());

    Ok(())
}
