use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::tosca::DocumentFormat;

#[derive(Debug, Parser)]
#[command(
    name = "archmodel-tosca",
    version,
    about = "Export architecture models as TOSCA service templates",
    long_about = "Load architecture models (components, infrastructure, data, links, deployment mappings, request traces) from JSON or YAML and export each as a tosca_simple_yaml_1_3 service template. Directory discovery respects .gitignore and .ignore with parent traversal; global git excludes are disabled for determinism. Use --no-ignore to bypass ignore rules."
)]
pub struct Cli {
    /// Only print errors
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Yaml,
    Json,
}

impl From<FormatArg> for DocumentFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Yaml => DocumentFormat::Yaml,
            FormatArg::Json => DocumentFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Export one or more model files as TOSCA service templates
    Export {
        /// Model files (.json, .yaml, .yml)
        #[arg(value_name = "INPUT")]
        inputs: Vec<PathBuf>,
        /// Discover model files under this directory
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Bypass ignore rules (.gitignore/.ignore) when discovering files
        #[arg(long, default_value_t = false, help = "Include files even if matched by .gitignore/.ignore. Global git excludes are always disabled for determinism.")]
        no_ignore: bool,
        /// Output file for a single input (stdout when omitted)
        #[arg(short, long, conflicts_with = "out_dir")]
        output: Option<PathBuf>,
        /// Output directory; files are named <input stem>.tosca.<ext>
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Document format (default: config [output] format, else yaml)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Template author (overrides config)
        #[arg(long)]
        author: Option<String>,
        /// Template version (overrides config)
        #[arg(long)]
        template_version: Option<String>,
    },
    /// Validate a model and dry-run the export
    Check {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Export a model and list the issued node and relationship keys
    Inspect {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
