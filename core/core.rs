pub mod assemble;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod pipeline;
pub mod reader;
pub mod rules;
pub mod tree;
pub mod walk;

pub use assemble::{Assembler, AssemblyReport, combine, human_size};
pub use cache::DecisionCache;
pub use config::{Config, ConfigSource, OutputPaths, ProjectRoot, RootOrigin};
pub use error::{AppError, Result};
pub use filter::{ExclusionFilter, IncludeOverrideSet, RuleSourceInfo};
pub use matcher::{EntryKind, PatternMatcher};
pub use pipeline::{RunRequest, RunSummary, build_filter, plan, render_tree, run};
pub use reader::{ConcurrentReader, FileResult};
pub use rules::{IgnoreRule, Polarity};
pub use tree::TreeRenderer;
pub use walk::{CandidateFile, TreeWalker};
