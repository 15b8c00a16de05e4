//! `berth clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use berth::core::Workspace;
use berth::ops::berth_clean::clean;
use berth::util::fs::remove_dir_all_if_exists;
use berth::util::GlobalContext;

pub fn execute(args: CleanArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let ws = Workspace::new(&ctx.find_manifest()?)?;

    if args.all {
        let berth_dir = ws.berth_dir();
        remove_dir_all_if_exists(&berth_dir)?;
        eprintln!("     Removed {}", berth_dir.display());
    } else if clean(&ws)? {
        eprintln!("     Removed {}", ws.target_dir().display());
    }

    Ok(())
}
