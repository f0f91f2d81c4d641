use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        short = 'd',
        long = "directory",
        help = "Directory to aggregate (default: $PROJECT_ROOT or current dir).",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub directory: Option<PathBuf>,

    #[arg(
        long = "config",
        help = "Specify path/filename of the TOML config file (default: .xtools/xcombine/xcombine.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help_heading = "Project Setup"
    )]
    pub config_file: Option<String>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "config_file",
        help_heading = "Project Setup"
    )]
    pub no_config: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterOpts {
    #[arg(
        long,
        num_args = 1..,
        value_name = "FILE",
        help = "Files always included, bypassing ignore rules and the size limit (relative to the directory).",
        help_heading = "Filtering"
    )]
    pub include_files: Vec<PathBuf>,

    #[arg(
        long = "max-file-size",
        value_name = "KB",
        help = "Skip files larger than this many kilobytes [default: 10240].",
        help_heading = "Filtering"
    )]
    pub max_file_size_kb: Option<u64>,

    #[arg(
        long,
        value_name = "N",
        help = "Number of concurrent reader threads [default: available cores].",
        help_heading = "Filtering"
    )]
    pub max_workers: Option<usize>,

    #[arg(
        long,
        value_name = "NAME_OR_PATH",
        help = "Global ignore file: a bare name is searched upward from the current dir, a path is used directly.",
        help_heading = "Filtering"
    )]
    pub global_ignore: Option<String>,

    #[arg(
        long,
        help = "Do not apply the built-in ignore rules (.git/).",
        help_heading = "Filtering"
    )]
    pub no_builtin_ignore: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputOpts {
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help = "Combined output file [default: debug/combined.txt].",
        help_heading = "Output"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        short = 't',
        long = "tree",
        value_name = "FILE",
        help = "Tree output file [default: debug/tree.txt].",
        help_heading = "Output"
    )]
    pub tree: Option<PathBuf>,

    #[arg(
        long = "debug",
        value_name = "FILE",
        help = "Diagnostic log file [default: debug/debug.log].",
        help_heading = "Output"
    )]
    pub debug_log: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(
    name = "xcombine",
    author,
    version,
    about = "Combine a directory's files into one text artifact with a tree overview.",
    long_about = "xcombine walks a directory, honours .combineignore rules (global and local), \nreads the surviving files concurrently and writes them, preceded by an ASCII tree, \ninto a single combined text file.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  xcombine -d ./my-project\n  xcombine -d . -o out/all.txt --include-files Cargo.lock\n  xcombine tree -d ./my-project\n  xcombine debug --json",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[clap(flatten)]
    pub combine: CombineArgs,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "c",
        about = "Aggregate the directory into the combined and tree files [default]."
    )]
    Combine(CombineArgs),

    #[command(
        visible_alias = "t",
        about = "Print the filtered directory tree without writing files."
    )]
    Tree(TreeArgs),

    #[command(
        visible_alias = "d",
        about = "Show effective configuration, rule sources and planned files."
    )]
    Debug(DebugArgs),

    #[command(about = "Generate or save shell completion scripts.")]
    Completion(CompletionArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct CombineArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,
    #[clap(flatten)]
    pub output: OutputOpts,
    #[arg(
        long,
        help = "Do not print the combined/tree preview after writing.",
        help_heading = "Output"
    )]
    pub no_preview: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,
}

#[derive(Args, Debug, Clone)]
pub struct DebugArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,
    #[clap(flatten)]
    pub output: OutputOpts,
    #[arg(long, help = "Emit the debug report as pretty-printed JSON.")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    #[arg(
        long,
        value_enum,
        value_name = "SHELL",
        default_value_t = Shell::Fish,
        help = "Shell to generate completions for."
    )]
    pub shell: Shell,
    #[arg(
        long,
        help = "Save completion script to default location (prompts overwrite)."
    )]
    pub save: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_runs_combine_with_flags() {
        let cli = Cli::try_parse_from([
            "xcombine",
            "-d",
            "proj",
            "-o",
            "out.txt",
            "--include-files",
            "a.rs",
            "b.rs",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.combine.project_config.directory, Some(PathBuf::from("proj")));
        assert_eq!(cli.combine.output.output, Some(PathBuf::from("out.txt")));
        assert_eq!(cli.combine.filters.include_files.len(), 2);
    }

    #[test]
    fn subcommand_parses_its_own_flags() {
        let cli = Cli::try_parse_from(["xcombine", "debug", "--json", "-vv"]).unwrap();
        match cli.command {
            Some(Commands::Debug(args)) => assert!(args.json),
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn config_flags_conflict() {
        assert!(Cli::try_parse_from(["xcombine", "--config", "x", "--no-config"]).is_err());
    }
}
