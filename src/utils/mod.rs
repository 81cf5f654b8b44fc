pub mod table {
    fn sep(widths: &[usize]) -> String {
        let mut s = String::from("+");
        for w in widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    }

    fn line(cells: &[String], widths: &[usize]) -> String {
        let mut s = String::from("|");
        for (cell, w) in cells.iter().zip(widths) {
            s.push(' ');
            s.push_str(cell);
            let len = cell.chars().count();
            if len < *w {
                s.push_str(&" ".repeat(w - len));
            }
            s.push_str(" |");
        }
        s
    }

    /// Render an ASCII table. Short rows are padded with empty cells, extra cells are dropped.
    #[must_use]
    pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
        let cols = headers.len();
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (c, w) in widths.iter_mut().enumerate() {
                *w = (*w).max(row.get(c).map_or(0, |s| s.chars().count()));
            }
        }

        let rule = sep(&widths);
        let header_cells: Vec<String> = headers.iter().map(|s| (*s).to_string()).collect();
        let mut out = vec![rule.clone(), line(&header_cells, &widths), rule.clone()];
        for row in rows {
            let cells: Vec<String> = (0..cols).map(|i| row.get(i).cloned().unwrap_or_default()).collect();
            out.push(line(&cells, &widths));
        }
        out.push(rule);
        out.join("\n")
    }
}

pub mod config {
    use crate::errors::ConfigError;
    use serde::Deserialize;
    use std::fs;
    use std::path::{Path, PathBuf};

    pub const CONFIG_FILE_NAME: &str = "archmodel-tosca.toml";

    /// `[metadata]`: envelope overrides.
    #[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
    pub struct MetadataConfig {
        pub author: Option<String>,
        pub version: Option<String>,
        pub description: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
    pub struct OutputConfig {
        pub format: Option<String>, // "yaml" | "json"
    }

    #[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
    pub struct Config {
        pub metadata: Option<MetadataConfig>,
        pub output: Option<OutputConfig>,
    }

    fn default_config_path(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE_NAME)
    }

    /// Parse the TOML file at `path`.
    ///
    /// # Errors
    /// `ConfigError` when the file cannot be read or is not valid config TOML.
    pub fn load_config_at(path: &Path) -> Result<Config, ConfigError> {
        let data = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { file: path.to_path_buf(), source })?;
        toml::from_str::<Config>(&data).map_err(|source| ConfigError::Toml { file: path.to_path_buf(), source })
    }

    /// Look for `archmodel-tosca.toml` in `dir`. The file is optional, so an
    /// unreadable or malformed one is skipped with a warning.
    #[must_use]
    pub fn load_config_near(dir: &Path) -> Option<Config> {
        let p = default_config_path(dir);
        if !p.exists() {
            return None;
        }
        match load_config_at(&p) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::warn!(path = %p.display(), error = %e, "ignoring malformed config");
                None
            }
        }
    }
}

pub mod model_walker {
    use std::ffi::OsStr;
    use std::path::{Path, PathBuf};

    const MODEL_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

    /// Exported documents (`*.tosca.yaml`, `*.tosca.json`) are never models.
    fn is_model_file(path: &Path) -> bool {
        let ext_ok = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|e| MODEL_EXTENSIONS.iter().any(|m| e.eq_ignore_ascii_case(m)));
        let exported = path
            .file_stem()
            .and_then(OsStr::to_str)
            .is_some_and(|s| s.ends_with(".tosca"));
        ext_ok && !exported
    }

    /// Discover model files under `root`, sorted. `.gitignore`/`.ignore` are
    /// honoured (with parent traversal) unless `no_ignore` is set; global git
    /// excludes are always off.
    #[must_use]
    pub fn model_files(root: &Path, no_ignore: bool) -> Vec<PathBuf> {
        let mut walker = ignore::WalkBuilder::new(root);
        walker
            .follow_links(false)
            .hidden(true)
            .git_ignore(!no_ignore)
            .git_global(false)
            .git_exclude(false)
            .ignore(!no_ignore)
            .parents(!no_ignore)
            .require_git(false);
        let mut out: Vec<PathBuf> = walker
            .build()
            .flatten()
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(ignore::DirEntry::into_path)
            .filter(|p| is_model_file(p))
            .collect();
        out.sort();
        out
    }
}

pub mod logging {
    use tracing_subscriber::{fmt, EnvFilter};

    /// Pick the log filter: `--quiet` wins, then `-v` counts, then `RUST_LOG`, then `warn`.
    #[must_use]
    pub fn filter_for(verbose: u8, quiet: bool) -> EnvFilter {
        if quiet {
            return EnvFilter::new("error");
        }
        match verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    }

    /// Install the stderr fmt subscriber. A second call is a no-op.
    pub fn init(verbose: u8, quiet: bool) {
        let _ = fmt()
            .with_env_filter(filter_for(verbose, quiet))
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
