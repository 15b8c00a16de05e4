//! Command implementations

pub mod build;
pub mod clean;
pub mod install;

use anyhow::Result;

use crate::cli::BuildArgs;
use berth::builder::BuildContext;
use berth::core::Workspace;
use berth::ops::{inherited_build_dir, BuildOptions};
use berth::util::{Config, GlobalContext};

/// Everything a building command needs, loaded from the current directory.
pub struct Session {
    pub ws: Workspace,
    pub config: Config,
    pub ctx: BuildContext,
}

impl Session {
    pub fn load(args: &BuildArgs) -> Result<Self> {
        let gctx = GlobalContext::new()?;

        let manifest_path = gctx.find_manifest()?;
        let root = manifest_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| gctx.cwd().to_path_buf());

        let config = gctx.config(&root);
        let opts = BuildOptions {
            release: args.release || config.build.release,
            jobs: args.jobs.or(config.build.jobs),
        };

        let ws = Workspace::new(&manifest_path)?
            .with_build_dir(inherited_build_dir())
            .with_profile(opts.profile());
        let ctx = BuildContext::new(&ws, &config, &gctx.toolchain_config(&root))?.jobs(opts.jobs);

        Ok(Session { ws, config, ctx })
    }

    pub fn package(&self) -> String {
        let manifest = self.ws.manifest();
        format!(
            "{} v{} ({})",
            manifest.name(),
            manifest.version_or_default(),
            self.ws.root().display()
        )
    }
}
