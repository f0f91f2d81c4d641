use crate::cli_args::CombineArgs;
use crate::output::{print_preview, print_run_summary};
use crate::{DebugLog, load_config_for_command};
use anyhow::{Context, Result};
use colored::*;
use log;
use std::env;
use std::time::Instant;
use xcombine_core::{ProjectRoot, RunRequest, run};

pub fn handle_combine_command(args: &CombineArgs, debug_log: &DebugLog, quiet: bool) -> Result<()> {
    let start = Instant::now();
    let outcome = combine(args, debug_log, quiet);
    if let Err(e) = &outcome {
        log::error!("An error occurred: {:#}", e);
    }
    log::info!(
        "Program completed in {:.2} seconds.",
        start.elapsed().as_secs_f64()
    );
    outcome
}

fn combine(args: &CombineArgs, debug_log: &DebugLog, quiet: bool) -> Result<()> {
    let invocation_dir = env::current_dir().context("Failed to determine current directory")?;
    let project_root = ProjectRoot::resolve(args.project_config.directory.as_deref())
        .context("Failed to determine project root")?;

    let (config, _) = load_config_for_command(
        &project_root.path,
        &args.project_config,
        &args.filters,
        Some(&args.output),
    )
    .context("Failed to load configuration for combine command")?;

    let outputs = config.output_paths(&invocation_dir);
    if let Err(e) = debug_log.attach(&outputs.debug_log) {
        log::warn!("Continuing without diagnostic log: {:#}", e);
    }
    log::debug!("Effective config: {:?}", config);

    let preview_lines = config.output.preview_lines;
    let request = RunRequest {
        root: project_root.path,
        invocation_dir,
        config,
    };
    let summary = run(&request).context("Aggregation failed")?;

    log::info!(
        "Combined {} files ({} with read errors) into {}",
        summary.report.files,
        summary.read_errors,
        summary.outputs.combined.display()
    );

    if !quiet {
        if !args.no_preview && preview_lines > 0 {
            print_preview(&summary, preview_lines)?;
        }
        print_run_summary(&summary);
        println!(
            "{} Combined output saved to: {}",
            "✅".green(),
            summary.outputs.combined.display().to_string().blue()
        );
    }
    Ok(())
}
