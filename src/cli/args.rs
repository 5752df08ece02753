use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, ValueEnum, Default, PartialEq)]
pub enum Module {
    #[default]
    Plan,
    Run,
    Flags,
}

#[derive(Debug, Clone, ValueEnum, Default, PartialEq)]
pub enum Profile {
    #[default]
    Standard,
    Stub,
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "amplicon-router", version, about = "Plans and runs the amplicon sequencing workflow")]
pub struct Arguments {

    #[arg(short, long, default_value = "plan", value_enum)]
    pub module: Module,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(long, help = "JSON file of parameters; explicit command-line values take precedence")]
    pub params_file: Option<String>,

    #[arg(short = 'o', long = "outdir", default_value = "results")]
    pub outdir: String,

    #[arg(long, help = "Name recorded in the run summary. Defaults to 'amplicon_<timestamp>'")]
    pub run_name: Option<String>,

    #[arg(long = "profile", default_value = "standard", value_enum)]
    pub profile: Profile,

    #[arg(long, default_value_t = false)]
    pub skip_tool_check: bool,

    // Inputs
    #[arg(short = 'i', long)]
    pub reads: Option<String>,

    #[arg(long)]
    pub metadata: Option<String>,

    #[arg(long = "qiime-archive", help = "Pre-imported QIIME2 demultiplexed artifact (.qza); bypasses read processing")]
    pub qiime_archive: Option<String>,

    #[arg(long, help = "Pre-trained QIIME2 classifier (.qza); bypasses classifier training")]
    pub classifier: Option<String>,

    #[arg(long)]
    pub reference_database: Option<String>,

    // Primers and trimming
    #[arg(long = "fw-primer")]
    pub forward_primer: Option<String>,

    #[arg(long = "rv-primer")]
    pub reverse_primer: Option<String>,

    #[arg(long)]
    pub retain_untrimmed: bool,

    // Denoising
    #[arg(long)]
    pub trunclenf: Option<u32>,

    #[arg(long)]
    pub trunclenr: Option<u32>,

    #[arg(long)]
    pub trunc_qmin: Option<u32>,

    // Filtering
    #[arg(long)]
    pub exclude_taxa: Option<String>,

    #[arg(long)]
    pub min_frequency: Option<u32>,

    #[arg(long)]
    pub min_samples: Option<u32>,

    #[arg(long)]
    pub metadata_category: Option<String>,

    // Stop points
    #[arg(long)]
    pub until_q2_import: bool,

    #[arg(long)]
    pub only_denoising: bool,

    // Skip flags
    #[arg(long)]
    pub skip_fastqc: bool,

    #[arg(long)]
    pub skip_multiqc: bool,

    #[arg(long)]
    pub skip_taxonomy: bool,

    #[arg(long)]
    pub skip_barplot: bool,

    #[arg(long)]
    pub skip_abundance_tables: bool,

    #[arg(long)]
    pub skip_diversity_indices: bool,

    #[arg(long)]
    pub skip_alpha_rarefaction: bool,

    #[arg(long)]
    pub skip_ancom: bool,

    // Resources
    #[arg(long, default_value_t = 64)]
    pub threads: usize,

    #[arg(long, help = "Maximum stages running at once. Defaults to detected physical cores, capped by --threads")]
    pub max_parallel: Option<usize>,
}
