use crate::cli_args::DebugArgs;
use crate::load_config_for_command;
use crate::output::write_to_stdout;
use anyhow::{Context, Result};
use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use log;
use serde::Serialize;
use std::env;
use xcombine_core::{
    CandidateFile, Config, ConfigSource, IgnoreRule, OutputPaths, Polarity, ProjectRoot,
    RuleSourceInfo, RunRequest, plan,
};

#[derive(Debug, Serialize)]
struct DebugInfo<'a> {
    project_root: &'a ProjectRoot,
    config_source: ConfigSource,
    effective_config: &'a Config,
    outputs: OutputPaths,
    rule_sources: &'a [RuleSourceInfo],
    rules: Vec<&'a IgnoreRule>,
    include_overrides: Vec<String>,
    files_to_combine: Vec<String>,
    traversal_errors: usize,
}

pub fn handle_debug_command(args: &DebugArgs) -> Result<()> {
    let invocation_dir = env::current_dir().context("Failed to determine current directory")?;
    let project_root = ProjectRoot::resolve(args.project_config.directory.as_deref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.path.display());

    let (config, config_source) = load_config_for_command(
        &project_root.path,
        &args.project_config,
        &args.filters,
        Some(&args.output),
    )
    .context("Failed to load configuration for debug command")?;
    let outputs = config.output_paths(&invocation_dir);

    let request = RunRequest {
        root: project_root.path.clone(),
        invocation_dir,
        config,
    };
    log::debug!("Debug: Planning candidate files...");
    let (filter, candidates, traversal_errors) = plan(&request);

    let mut include_overrides: Vec<String> = filter
        .overrides()
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    include_overrides.sort();

    let debug_data = DebugInfo {
        project_root: &project_root,
        config_source,
        effective_config: &request.config,
        outputs,
        rule_sources: filter.sources(),
        rules: filter.matcher().rules().collect(),
        include_overrides,
        files_to_combine: relative_paths(&candidates),
        traversal_errors,
    };

    if args.json {
        let content = serde_json::to_string_pretty(&debug_data)
            .context("Failed to serialize debug info to JSON")?;
        write_to_stdout(&content)
    } else {
        print_debug_info_pretty(&debug_data)
    }
}

fn relative_paths(candidates: &[CandidateFile]) -> Vec<String> {
    candidates.iter().map(|c| c.relative_path.clone()).collect()
}

fn print_debug_info_pretty(debug_info: &DebugInfo) -> Result<()> {
    println!("{}", "\n--- Resolution ---".green().bold().underline());
    println!(
        "{:<12} {} {}",
        "root".bold(),
        debug_info.project_root.path.display(),
        format!("(from {:?})", debug_info.project_root.origin).dimmed()
    );
    let config_line = match &debug_info.config_source {
        ConfigSource::Disabled => "disabled (--no-config)".dimmed(),
        ConfigSource::NotFound => "none found, using defaults".dimmed(),
        ConfigSource::Default(p) => format!("{} (default location)", p.display()).normal(),
        ConfigSource::Named(p) => format!("{} (named)", p.display()).normal(),
        ConfigSource::Explicit(p) => format!("{} (explicit path)", p.display()).normal(),
    };
    println!("{:<12} {}", "config".bold(), config_line);

    println!(
        "{}",
        "\n--- Effective Configuration ---"
            .green()
            .bold()
            .underline()
    );
    let config_toml = toml::to_string_pretty(debug_info.effective_config)
        .context("Failed to serialize effective config to TOML")?;
    println!("{}", config_toml);

    println!("{}", "\n--- Output Files ---".green().bold().underline());
    println!("{:<12} {}", "combined".bold(), debug_info.outputs.combined.display());
    println!("{:<12} {}", "tree".bold(), debug_info.outputs.tree.display());
    println!("{:<12} {}", "debug log".bold(), debug_info.outputs.debug_log.display());

    display_rule_sources(debug_info.rule_sources);
    display_rules_table(&debug_info.rules);

    print_path_list("Include Overrides", &debug_info.include_overrides);
    print_path_list("Files To Combine", &debug_info.files_to_combine);
    if debug_info.traversal_errors > 0 {
        println!(
            "{}",
            format!(
                "({} directories could not be read)",
                debug_info.traversal_errors
            )
            .yellow()
        );
    }

    println!("{}", "\n--- End Debug Info ---".green().bold());
    Ok(())
}

fn display_rule_sources(sources: &[RuleSourceInfo]) {
    println!("{}", "\n--- Rule Sources ---".green().bold().underline());
    if sources.is_empty() {
        println!("{}", "(No rule sources loaded)".dimmed());
        return;
    }
    println!(
        "{:<10} {:<8} {}",
        "Source".bold(),
        "Rules".bold(),
        "Path".bold()
    );
    println!("{:-<65}", "");
    for source in sources {
        let path = source
            .path
            .as_ref()
            .map_or_else(|| "(built-in)".to_string(), |p| p.display().to_string());
        println!(
            "{:<10} {:<8} {}",
            source.label.blue(),
            source.rule_count,
            path.dimmed()
        );
    }
}

fn display_rules_table(rules: &[&IgnoreRule]) {
    println!("{}", "\n--- Effective Rules (last match wins) ---".green().bold().underline());
    if rules.is_empty() {
        println!("{}", "(No rules)".dimmed());
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::Green),
        Cell::new("Rule").fg(Color::Green),
        Cell::new("Effect").fg(Color::Green),
        Cell::new("Dir Only").fg(Color::Green),
        Cell::new("Anchored").fg(Color::Green),
        Cell::new("Origin").fg(Color::Green),
    ]);
    for (index, rule) in rules.iter().enumerate() {
        let effect = match rule.polarity {
            Polarity::Exclude => Cell::new("exclude").fg(Color::Red),
            Polarity::Include => Cell::new("include").fg(Color::Cyan),
        };
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(rule.to_string()),
            effect,
            Cell::new(if rule.dir_only { "yes" } else { "" }),
            Cell::new(if rule.anchored { "yes" } else { "" }),
            Cell::new(&rule.origin),
        ]);
    }
    println!("{table}");
}

fn print_path_list(title: &str, paths: &[String]) {
    println!(
        "{}",
        format!("\n--- {} ---", title).green().bold().underline()
    );
    if paths.is_empty() {
        println!("{}", "(None)".dimmed());
    } else {
        paths.iter().for_each(|p| println!("- {}", p.cyan()));
    }
}
