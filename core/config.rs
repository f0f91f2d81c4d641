use crate::error::{AppError, Result};
use crate::reader::default_workers;
use crate::rules::DEFAULT_IGNORE_FILENAME;
use log;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_DIR: &str = ".xtools/xcombine";
pub const DEFAULT_CONFIG_FILENAME: &str = "xcombine.toml";
pub const DEFAULT_MAX_FILE_SIZE_KB: u64 = 10240;
pub const DEFAULT_COMBINED_OUTPUT: &str = "debug/combined.txt";
pub const DEFAULT_TREE_OUTPUT: &str = "debug/tree.txt";
pub const DEFAULT_DEBUG_LOG: &str = "debug/debug.log";
pub const DEFAULT_PREVIEW_LINES: usize = 20;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub include: IncludeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default = "default_ignore_filename")]
    pub ignore_filename: String,
    #[serde(default = "default_ignore_filename")]
    pub global_ignore: String,
    #[serde(default = "default_true")]
    pub use_target_ignore: bool,
    #[serde(default = "default_true")]
    pub enable_builtin_ignore: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    #[serde(default = "default_max_file_size_kb")]
    pub max_file_size_kb: u64,
    #[serde(default)]
    pub max_workers: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct IncludeConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_combined_output")]
    pub combined: PathBuf,
    #[serde(default = "default_tree_output")]
    pub tree: PathBuf,
    #[serde(default = "default_debug_log")]
    pub debug_log: PathBuf,
    #[serde(default = "default_preview_lines")]
    pub preview_lines: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub combined: PathBuf,
    pub tree: PathBuf,
    pub debug_log: PathBuf,
}

impl OutputPaths {
    pub fn all(&self) -> [PathBuf; 3] {
        [
            self.combined.clone(),
            self.tree.clone(),
            self.debug_log.clone(),
        ]
    }
}

fn default_true() -> bool {
    true
}
fn default_ignore_filename() -> String {
    DEFAULT_IGNORE_FILENAME.to_string()
}
fn default_max_file_size_kb() -> u64 {
    DEFAULT_MAX_FILE_SIZE_KB
}
fn default_combined_output() -> PathBuf {
    PathBuf::from(DEFAULT_COMBINED_OUTPUT)
}
fn default_tree_output() -> PathBuf {
    PathBuf::from(DEFAULT_TREE_OUTPUT)
}
fn default_debug_log() -> PathBuf {
    PathBuf::from(DEFAULT_DEBUG_LOG)
}
fn default_preview_lines() -> usize {
    DEFAULT_PREVIEW_LINES
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            ignore_filename: default_ignore_filename(),
            global_ignore: default_ignore_filename(),
            use_target_ignore: default_true(),
            enable_builtin_ignore: default_true(),
        }
    }
}
impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_kb: default_max_file_size_kb(),
            max_workers: None,
        }
    }
}
impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            combined: default_combined_output(),
            tree: default_tree_output(),
            debug_log: default_debug_log(),
            preview_lines: default_preview_lines(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootOrigin {
    Flag,
    Environment,
    WorkingDirectory,
}

/// The canonical directory being combined and where that choice came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRoot {
    pub path: PathBuf,
    pub origin: RootOrigin,
}

impl ProjectRoot {
    /// `--directory` wins, then a non-empty `$PROJECT_ROOT`, then the working directory.
    pub fn resolve(flag: Option<&Path>) -> Result<Self> {
        let (candidate, origin) = match flag {
            Some(dir) => (expand_tilde(&dir.to_string_lossy()), RootOrigin::Flag),
            None => match env::var("PROJECT_ROOT") {
                Ok(value) if !value.is_empty() => (expand_tilde(&value), RootOrigin::Environment),
                _ => (env::current_dir()?, RootOrigin::WorkingDirectory),
            },
        };
        let path = candidate.canonicalize().map_err(|e| {
            AppError::Config(format!(
                "Cannot combine '{}' ({:?}): {}",
                candidate.display(),
                origin,
                e
            ))
        })?;
        log::debug!("Root {} resolved from {:?}", path.display(), origin);
        Ok(Self { path, origin })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ConfigSource {
    Disabled,
    NotFound,
    Default(PathBuf),
    Named(PathBuf),
    Explicit(PathBuf),
}

impl ConfigSource {
    /// Where the settings come from. A bare `requested` name is looked up in
    /// `<root>/.xtools/xcombine/` with `.toml` appended; anything path-like is
    /// used as given, trying a `.toml` extension when the file is missing.
    pub fn locate(root: &Path, requested: Option<&str>, disabled: bool) -> Result<Self> {
        if disabled {
            return Ok(ConfigSource::Disabled);
        }
        let config_dir = root.join(DEFAULT_CONFIG_DIR);
        let Some(requested) = requested else {
            let default_path = config_dir.join(DEFAULT_CONFIG_FILENAME);
            return Ok(if default_path.is_file() {
                ConfigSource::Default(default_path)
            } else {
                ConfigSource::NotFound
            });
        };

        let expanded = expand_tilde(requested);
        if expanded.is_absolute() || requested.contains(['/', '\\']) {
            let path = if !expanded.exists() && expanded.extension().is_none() {
                expanded.with_extension("toml")
            } else {
                expanded
            };
            if !path.is_file() {
                return Err(AppError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Ok(ConfigSource::Explicit(path));
        }

        let filename = if requested.ends_with(".toml") {
            requested.to_string()
        } else {
            format!("{}.toml", requested)
        };
        let path = config_dir.join(filename);
        if !path.is_file() {
            return Err(AppError::Config(format!(
                "No config named '{}' in {}",
                requested,
                config_dir.display()
            )));
        }
        Ok(ConfigSource::Named(path))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Default(p) | ConfigSource::Named(p) | ConfigSource::Explicit(p) => Some(p),
            ConfigSource::Disabled | ConfigSource::NotFound => None,
        }
    }
}

fn expand_tilde(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

impl Config {
    pub fn load(source: &ConfigSource) -> Result<Self> {
        match source.path() {
            Some(path) => {
                log::debug!("Loading config from {}", path.display());
                Self::load_from_path(path)
            }
            None => {
                log::debug!("Using built-in defaults ({:?})", source);
                Ok(Self::default())
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&toml_content).map_err(|e| match e {
            AppError::TomlParse(msg) => AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                msg
            )),
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| AppError::TomlParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limits.max_workers == Some(0) {
            return Err(AppError::InvalidArgument(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.general.ignore_filename.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "ignore_filename cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn effective_workers(&self) -> usize {
        self.limits.max_workers.unwrap_or_else(default_workers)
    }

    pub fn output_paths(&self, base: &Path) -> OutputPaths {
        let absolute = |p: &PathBuf| {
            let expanded = expand_tilde(&p.to_string_lossy());
            if expanded.is_absolute() {
                expanded
            } else {
                base.join(expanded)
            }
        };
        OutputPaths {
            combined: absolute(&self.output.combined),
            tree: absolute(&self.output.tree),
            debug_log: absolute(&self.output.debug_log),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.limits.max_file_size_kb, 10240);
        assert_eq!(config.general.ignore_filename, ".combineignore");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            "[limits]\nmax_file_size_kb = 64\n[include]\nfiles = [\"Cargo.lock\"]\n",
        )
        .unwrap();
        assert_eq!(config.limits.max_file_size_kb, 64);
        assert_eq!(config.include.files, vec![PathBuf::from("Cargo.lock")]);
        assert_eq!(config.output.preview_lines, 20);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str("[general]\nbogus = 1\n").unwrap_err();
        assert!(matches!(err, AppError::TomlParse(_)));
    }

    #[test]
    fn zero_workers_is_invalid() {
        let err = Config::from_toml_str("[limits]\nmax_workers = 0\n").unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[test]
    fn relative_outputs_resolve_against_base() {
        let paths = Config::default().output_paths(Path::new("/work"));
        assert_eq!(paths.combined, PathBuf::from("/work/debug/combined.txt"));
        assert_eq!(paths.debug_log, PathBuf::from("/work/debug/debug.log"));
    }

    #[test]
    fn config_source_defaults_to_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let source = ConfigSource::locate(tmp.path(), None, false).unwrap();
        assert_eq!(source, ConfigSource::NotFound);
        assert_eq!(Config::load(&source).unwrap(), Config::default());
    }

    #[test]
    fn config_source_finds_default_and_named_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(DEFAULT_CONFIG_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(DEFAULT_CONFIG_FILENAME), "[limits]\nmax_file_size_kb = 7\n").unwrap();
        fs::write(dir.join("small.toml"), "[limits]\nmax_file_size_kb = 1\n").unwrap();

        let default = ConfigSource::locate(tmp.path(), None, false).unwrap();
        assert_eq!(default, ConfigSource::Default(dir.join(DEFAULT_CONFIG_FILENAME)));
        assert_eq!(Config::load(&default).unwrap().limits.max_file_size_kb, 7);

        let named = ConfigSource::locate(tmp.path(), Some("small"), false).unwrap();
        assert_eq!(named, ConfigSource::Named(dir.join("small.toml")));

        let disabled = ConfigSource::locate(tmp.path(), Some("small"), true).unwrap();
        assert_eq!(disabled.path(), None);
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("custom.toml");
        fs::write(&file, "").unwrap();
        let without_ext = tmp.path().join("custom");

        let found =
            ConfigSource::locate(tmp.path(), Some(&without_ext.to_string_lossy()), false).unwrap();
        assert_eq!(found, ConfigSource::Explicit(file));

        let missing = tmp.path().join("nope.toml");
        let err = ConfigSource::locate(tmp.path(), Some(&missing.to_string_lossy()), false)
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn root_from_flag_is_canonical() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a");
        fs::create_dir(&nested).unwrap();
        let root = ProjectRoot::resolve(Some(&nested.join("..").join("a"))).unwrap();
        assert_eq!(root.origin, RootOrigin::Flag);
        assert_eq!(root.path, nested.canonicalize().unwrap());

        let err = ProjectRoot::resolve(Some(&tmp.path().join("missing"))).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn round_trips_through_toml_text() {
        let text = Config::default().to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), Config::default());
    }
}
