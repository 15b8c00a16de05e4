//! `berth build` command

use anyhow::Result;

use super::Session;
use crate::cli::BuildArgs;
use berth::ops::berth_build::build;

pub fn execute(args: BuildArgs) -> Result<()> {
    let session = Session::load(&args)?;

    eprintln!("   Compiling {}", session.package());
    let result = build(&session.ws, &session.ctx)?;

    eprintln!(
        "    Finished `{}` profile target(s)",
        session.ws.profile()
    );
    eprintln!("    Library: {}", result.library.location().display());
    if let Some(exe) = &result.test_executable {
        eprintln!("       Test: {}", exe.location().display());
    }

    Ok(())
}
