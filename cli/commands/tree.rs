use crate::cli_args::TreeArgs;
use crate::load_config_for_command;
use crate::output::write_to_stdout;
use anyhow::{Context, Result};
use std::env;
use xcombine_core::{ProjectRoot, RunRequest, render_tree};

pub fn handle_tree_command(args: &TreeArgs) -> Result<()> {
    let invocation_dir = env::current_dir().context("Failed to determine current directory")?;
    let project_root = ProjectRoot::resolve(args.project_config.directory.as_deref())
        .context("Failed to determine project root")?;
    let (config, _) =
        load_config_for_command(&project_root.path, &args.project_config, &args.filters, None)
            .context("Failed to load configuration for tree command")?;

    let request = RunRequest {
        root: project_root.path,
        invocation_dir,
        config,
    };
    write_to_stdout(&render_tree(&request))
}
