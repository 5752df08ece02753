use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use lazy_static::lazy_static;
use log::LevelFilter;
use thiserror::Error;
use tokio::sync::Semaphore;
use crate::cli::Arguments;
use crate::config::params::ParamSet;

// External software
pub const SHELL_TAG: &str = "bash";
pub const FASTQC_TAG: &str = "fastqc";
pub const MULTIQC_TAG: &str = "multiqc";
pub const CUTADAPT_TAG: &str = "cutadapt";
pub const QIIME_TAG: &str = "qiime";
pub const RSCRIPT_TAG: &str = "Rscript";
pub const PYTHON_TAG: &str = "python3";


lazy_static! {
    /// Arguments that make each tool print its version on the first line of output.
    pub static ref TOOL_VERSION_ARGS: HashMap<&'static str, Vec<&'static str>> = {
        let mut m = HashMap::new();
        m.insert(SHELL_TAG, vec!["--version"]);
        m.insert(FASTQC_TAG, vec!["--version"]);
        m.insert(MULTIQC_TAG, vec!["--version"]);
        m.insert(CUTADAPT_TAG, vec!["--version"]);
        m.insert(QIIME_TAG, vec!["--version"]);
        m.insert(RSCRIPT_TAG, vec!["--version"]);
        m.insert(PYTHON_TAG, vec!["--version"]);

        m
    };
}


// Static Parameters

pub const EXCLUDE_TAXA_NONE: &str = "none";
pub const DEFAULT_EXCLUDE_TAXA: &str = "mitochondria,chloroplast";
pub const DEFAULT_REFERENCE_DATABASE: &str = "https://www.arb-silva.de/fileadmin/silva_databases/qiime/Silva_132_release.zip";
pub const DEFAULT_TRUNC_QMIN: u32 = 25;
pub const DEFAULT_MIN_FREQUENCY: u32 = 1;
pub const DEFAULT_MIN_SAMPLES: u32 = 1;
pub const STDERR_TAIL_LINES: usize = 20;

// Static Filenames
pub const PIPELINE_INFO_DIR: &str = "pipeline_info";
pub const RUN_SUMMARY_JSON: &str = "run_summary.json";
pub const STAGE_SCRIPT: &str = ".command.sh";
pub const STAGE_LOG: &str = ".command.log";
pub const STAGE_ERR: &str = ".command.err";


#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Stage '{stage}' consumes channel '{channel}' but no enabled stage produces it")]
    UnsatisfiedChannel { stage: String, channel: String },

    #[error("Channel '{channel}' has two enabled producers: '{first}' and '{second}'")]
    DuplicateProducer { channel: String, first: String, second: String },

    #[error("Stage graph contains a cycle through: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    #[error("{tool} failed in stage '{stage}' ({status}):\n{stderr}")]
    ExternalTool { tool: String, stage: String, status: String, stderr: String },

    #[error("Required tool '{tool}' is unavailable: {error}")]
    ToolUnavailable { tool: String, error: String },

    #[error("I/O error: {0}")]
    IOError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}


pub struct RunConfig {
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub run_name: String,
    pub args: Arguments,
    pub params: ParamSet,
    pub stage_semaphore: Arc<Semaphore>,
    pub max_parallel: usize,
    pub cpus_per_stage: usize,
    pub stub: bool,
    pub log_level: LevelFilter,
}
