mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use log::{self, LevelFilter, Log, Metadata, Record};
use std::fs::{self, File};
use std::io::{LineWriter, Write};
use std::path::Path;
use std::process;
use std::sync::{Arc, Mutex};

use cli_args::{Cli, Commands, FilterOpts, OutputOpts, ProjectConfigOpts};
use xcombine_core::{AppError, Config, ConfigSource};

fn main() {
    let cli_args = Cli::parse();

    let quiet = cli_args.quiet;
    let verbose = cli_args.verbose;
    let debug_log = setup_logging(quiet, verbose);

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, &debug_log, quiet) {
        Ok(_) => {
            log::debug!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);

            if !quiet || exit_code == 1 || exit_code == 5 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }

            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    log::logger().flush();
    process::exit(exit_code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AppError>() {
        Some(core_err) if core_err.is_fatal_output() => 2,
        Some(AppError::Config(_)) => 1,
        Some(AppError::TomlParse(_)) => 1,
        Some(AppError::TomlSerialize(_)) => 1,
        Some(AppError::Io(_)) => 2,
        Some(AppError::FileRead { .. }) => 2,
        Some(AppError::InvalidArgument(_)) => 5,
        Some(_) => 1,
        None => 1,
    }
}

/// Diagnostic log file shared with the logger; stays detached until a command
/// knows where it should live.
#[derive(Clone, Default)]
pub struct DebugLog {
    sink: Arc<Mutex<Option<LineWriter<File>>>>,
}

impl DebugLog {
    /// Truncates `path` and starts recording debug events into it.
    pub fn attach(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create debug log {}", path.display()))?;
        let mut guard = self
            .sink
            .lock()
            .map_err(|_| anyhow::anyhow!("Debug log lock poisoned"))?;
        *guard = Some(LineWriter::new(file));
        Ok(())
    }

    fn write(&self, record: &Record) {
        if let Ok(mut guard) = self.sink.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = writeln!(
                    file,
                    "{} {} {}",
                    chrono::Local::now().to_rfc3339(),
                    record.level(),
                    record.args()
                );
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut guard) = self.sink.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

struct CompositeLogger {
    console: env_logger::Logger,
    debug_log: DebugLog,
}

impl Log for CompositeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata) || metadata.level() <= LevelFilter::Debug
    }

    fn log(&self, record: &Record) {
        if self.console.matches(record) {
            self.console.log(record);
        }
        if record.level() <= LevelFilter::Debug && record.target().starts_with("xcombine") {
            self.debug_log.write(record);
        }
    }

    fn flush(&self) {
        self.console.flush();
        self.debug_log.flush();
    }
}

fn setup_logging(quiet: bool, verbose: u8) -> DebugLog {
    let console_level = if quiet {
        LevelFilter::Off
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    let console = env_logger::Builder::new()
        .filter_level(console_level)
        .format_timestamp(None)
        .build();

    let debug_log = DebugLog::default();
    let logger = CompositeLogger {
        console,
        debug_log: debug_log.clone(),
    };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(console_level.max(LevelFilter::Debug));
    }
    log::trace!("Logger initialized with console level: {:?}", console_level);
    debug_log
}

fn run_app(cli: Cli, debug_log: &DebugLog, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            log::debug!("Executing default 'combine' command...");
            commands::combine::handle_combine_command(&cli.combine, debug_log, quiet)?;
        }
        Some(command) => match command {
            Commands::Combine(args) => {
                log::debug!("Executing 'combine' command...");
                commands::combine::handle_combine_command(&args, debug_log, quiet)?;
            }
            Commands::Tree(args) => {
                log::debug!("Executing 'tree' command...");
                commands::tree::handle_tree_command(&args)?;
            }
            Commands::Debug(args) => {
                log::debug!("Executing 'debug' command...");
                commands::debug::handle_debug_command(&args)?;
            }
            Commands::Completion(args) => {
                log::debug!("Executing 'completion' command...");
                commands::completion::handle_completion_command(&args, quiet)?;
            }
        },
    }
    Ok(())
}

fn merge_config_with_cli_overrides(
    mut config: Config,
    filters: &FilterOpts,
    output: Option<&OutputOpts>,
) -> Config {
    log::trace!("Applying CLI overrides to config...");

    if !filters.include_files.is_empty() {
        config.include.files.extend(filters.include_files.iter().cloned());
    }
    if let Some(kb) = filters.max_file_size_kb {
        config.limits.max_file_size_kb = kb;
    }
    if let Some(workers) = filters.max_workers {
        config.limits.max_workers = Some(workers);
    }
    if let Some(global) = &filters.global_ignore {
        config.general.global_ignore = global.clone();
    }
    if filters.no_builtin_ignore {
        config.general.enable_builtin_ignore = false;
    }

    if let Some(output) = output {
        if let Some(path) = &output.output {
            config.output.combined = path.clone();
        }
        if let Some(path) = &output.tree {
            config.output.tree = path.clone();
        }
        if let Some(path) = &output.debug_log {
            config.output.debug_log = path.clone();
        }
    }

    log::trace!("Config after CLI overrides: {:?}", config);
    config
}

/// Loads the TOML config (if any) for `project_root` and layers CLI flags on top.
pub fn load_config_for_command(
    project_root: &Path,
    project_opts: &ProjectConfigOpts,
    filters: &FilterOpts,
    output: Option<&OutputOpts>,
) -> Result<(Config, ConfigSource)> {
    let source = ConfigSource::locate(
        project_root,
        project_opts.config_file.as_deref(),
        project_opts.no_config,
    )
    .context("Failed to resolve configuration path")?;

    let config = Config::load(&source).with_context(|| match source.path() {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to build default config".to_string(),
    })?;

    let config = merge_config_with_cli_overrides(config, filters, output);
    config
        .validate()
        .context("Invalid settings after applying command-line flags")?;
    Ok((config, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cli_flags_override_config_values() {
        let filters = FilterOpts {
            include_files: vec![PathBuf::from("Cargo.lock")],
            max_file_size_kb: Some(5),
            max_workers: Some(2),
            global_ignore: Some("/etc/xcombine/ignore".to_string()),
            no_builtin_ignore: true,
        };
        let output = OutputOpts {
            output: Some(PathBuf::from("all.txt")),
            tree: None,
            debug_log: None,
        };
        let mut base = Config::default();
        base.include.files.push(PathBuf::from("README.md"));

        let merged = merge_config_with_cli_overrides(base, &filters, Some(&output));
        assert_eq!(
            merged.include.files,
            vec![PathBuf::from("README.md"), PathBuf::from("Cargo.lock")]
        );
        assert_eq!(merged.limits.max_file_size_kb, 5);
        assert_eq!(merged.limits.max_workers, Some(2));
        assert_eq!(merged.general.global_ignore, "/etc/xcombine/ignore");
        assert!(!merged.general.enable_builtin_ignore);
        assert_eq!(merged.output.combined, PathBuf::from("all.txt"));
        assert_eq!(merged.output.tree, PathBuf::from("debug/tree.txt"));
    }

    #[test]
    fn zero_workers_from_flags_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let filters = FilterOpts {
            max_workers: Some(0),
            ..FilterOpts::default()
        };
        let opts = ProjectConfigOpts {
            no_config: true,
            ..ProjectConfigOpts::default()
        };
        let err = load_config_for_command(tmp.path(), &opts, &filters, None).unwrap_err();
        assert_eq!(exit_code_for(&err), 5);
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn output_failures_exit_with_io_code() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let err = xcombine_core::assemble::write_artifact(&blocker.join("combined.txt"), "data")
            .unwrap_err();
        assert!(err.is_fatal_output());
        let wrapped = anyhow::Error::new(err).context("Aggregation failed");
        assert_eq!(exit_code_for(&wrapped), 2);

        let config_err = anyhow::Error::new(AppError::Config("bad".into()));
        assert_eq!(exit_code_for(&config_err), 1);
        assert_eq!(exit_code_for(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn disabled_config_reports_its_source() {
        let tmp = tempfile::tempdir().unwrap();
        let opts = ProjectConfigOpts {
            no_config: true,
            ..ProjectConfigOpts::default()
        };
        let (config, source) =
            load_config_for_command(tmp.path(), &opts, &FilterOpts::default(), None).unwrap();
        assert_eq!(source, ConfigSource::Disabled);
        assert_eq!(config, Config::default());
    }
}
