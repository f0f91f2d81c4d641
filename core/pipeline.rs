use crate::assemble::{Assembler, AssemblyReport};
use crate::config::{Config, OutputPaths};
use crate::error::Result;
use crate::filter::{ExclusionFilter, IncludeOverrideSet};
use crate::reader::ConcurrentReader;
use crate::rules;
use crate::tree::TreeRenderer;
use crate::walk::{CandidateFile, TreeWalker};
use log;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub root: PathBuf,
    /// Where the global rule search starts and relative outputs are anchored.
    pub invocation_dir: PathBuf,
    pub config: Config,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub root: PathBuf,
    pub outputs: OutputPaths,
    pub candidates: usize,
    pub traversal_errors: usize,
    pub read_errors: usize,
    pub tree_text: String,
    pub report: AssemblyReport,
}

/// Loads rule sources in precedence order: built-in, global, target-local.
pub fn build_filter(request: &RunRequest) -> ExclusionFilter {
    let config = &request.config;
    let root = &request.root;

    let mut include_entries = config.include.files.clone();
    include_entries.sort();
    include_entries.dedup();
    let overrides = IncludeOverrideSet::resolve(root, &include_entries);
    if !overrides.is_empty() {
        log::debug!("Include overrides: {:?}", overrides.iter().collect::<Vec<_>>());
    }

    let outputs = config.output_paths(&request.invocation_dir);
    let mut filter = ExclusionFilter::new(root, config.limits.max_file_size_kb)
        .with_overrides(overrides)
        .with_artifacts(outputs.all());

    if config.general.enable_builtin_ignore {
        filter.load_rules("builtin", None, rules::builtin_rules());
    }

    let target_path = root.join(&config.general.ignore_filename);
    let global_path =
        rules::locate_global_rule_file(&request.invocation_dir, &config.general.global_ignore);
    if let Some(global) = &global_path {
        if config.general.use_target_ignore && same_file(global, &target_path) {
            log::debug!(
                "Global ignore file {} is the target ignore file; loading it once",
                global.display()
            );
        } else {
            filter.load_rule_file("global", global);
        }
    }
    if config.general.use_target_ignore {
        filter.load_rule_file("target", &target_path);
    }
    filter
}

pub fn plan(request: &RunRequest) -> (ExclusionFilter, Vec<CandidateFile>, usize) {
    let mut filter = build_filter(request);
    let mut walker = TreeWalker::new(&mut filter);
    let candidates = walker.collect();
    let errors = walker.errors();
    (filter, candidates, errors)
}

pub fn render_tree(request: &RunRequest) -> String {
    let mut filter = build_filter(request);
    TreeRenderer::new(&mut filter).render()
}

/// Full aggregation. Only output failures and an unusable worker pool
/// surface as errors; everything else is logged and counted.
pub fn run(request: &RunRequest) -> Result<RunSummary> {
    let outputs = request.config.output_paths(&request.invocation_dir);
    let assembler = Assembler::new(&outputs.combined, &outputs.tree);
    assembler.clear_stale()?;

    log::info!(
        "Starting program. Processing directory: {}",
        request.root.display()
    );

    let (mut filter, candidates, walk_errors) = plan(request);

    let mut renderer = TreeRenderer::new(&mut filter);
    let tree_text = renderer.render();
    let render_errors = renderer.errors();
    let (hits, misses) = filter.cache().stats();
    log::debug!("Decision cache: {} hits, {} misses", hits, misses);

    let reader = ConcurrentReader::new(request.config.effective_workers());
    let results = reader.read_all(&candidates)?;
    let read_errors = results.iter().filter(|r| r.is_error()).count();

    let report = assembler.assemble(results, &tree_text)?;

    Ok(RunSummary {
        root: request.root.clone(),
        outputs,
        candidates: candidates.len(),
        traversal_errors: walk_errors + render_errors,
        read_errors,
        tree_text,
        report,
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
