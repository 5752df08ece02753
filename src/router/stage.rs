// src/router/stage.rs: Typed stage graph vocabulary

use std::fmt;
use serde::Serialize;
use crate::router::flags::Flags;


/// Named conduit between stages. Each value is a path under the run's output
/// directory, except for the seeded inputs which point at user files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelName {
    Reads,
    Metadata,
    SoftwareVersions,
    FastqcResults,
    TrimmedReads,
    CutadaptLog,
    MultiqcReport,
    Demux,
    DemuxQuality,
    TruncLengths,
    RawTable,
    RawRepseqs,
    DenoiseStats,
    Classifier,
    Taxonomy,
    Table,
    Repseqs,
    ExportedTable,
    ExportedRepseqs,
    FilterStats,
    AbundanceTables,
    Barplot,
    RootedTree,
    Rarefaction,
    CoreMetrics,
    MetadataCategories,
    MetadataPairwise,
    AlphaDiversity,
    BetaDiversity,
    BetaOrdination,
    Ancom,
}

impl ChannelName {
    pub const ALL: [ChannelName; 31] = [
        ChannelName::Reads,
        ChannelName::Metadata,
        ChannelName::SoftwareVersions,
        ChannelName::FastqcResults,
        ChannelName::TrimmedReads,
        ChannelName::CutadaptLog,
        ChannelName::MultiqcReport,
        ChannelName::Demux,
        ChannelName::DemuxQuality,
        ChannelName::TruncLengths,
        ChannelName::RawTable,
        ChannelName::RawRepseqs,
        ChannelName::DenoiseStats,
        ChannelName::Classifier,
        ChannelName::Taxonomy,
        ChannelName::Table,
        ChannelName::Repseqs,
        ChannelName::ExportedTable,
        ChannelName::ExportedRepseqs,
        ChannelName::FilterStats,
        ChannelName::AbundanceTables,
        ChannelName::Barplot,
        ChannelName::RootedTree,
        ChannelName::Rarefaction,
        ChannelName::CoreMetrics,
        ChannelName::MetadataCategories,
        ChannelName::MetadataPairwise,
        ChannelName::AlphaDiversity,
        ChannelName::BetaDiversity,
        ChannelName::BetaOrdination,
        ChannelName::Ancom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelName::Reads => "reads",
            ChannelName::Metadata => "metadata",
            ChannelName::SoftwareVersions => "software_versions",
            ChannelName::FastqcResults => "fastqc_results",
            ChannelName::TrimmedReads => "trimmed_reads",
            ChannelName::CutadaptLog => "cutadapt_log",
            ChannelName::MultiqcReport => "multiqc_report",
            ChannelName::Demux => "demux",
            ChannelName::DemuxQuality => "demux_quality",
            ChannelName::TruncLengths => "trunc_lengths",
            ChannelName::RawTable => "raw_table",
            ChannelName::RawRepseqs => "raw_repseqs",
            ChannelName::DenoiseStats => "denoise_stats",
            ChannelName::Classifier => "classifier",
            ChannelName::Taxonomy => "taxonomy",
            ChannelName::Table => "table",
            ChannelName::Repseqs => "repseqs",
            ChannelName::ExportedTable => "exported_table",
            ChannelName::ExportedRepseqs => "exported_repseqs",
            ChannelName::FilterStats => "filter_stats",
            ChannelName::AbundanceTables => "abundance_tables",
            ChannelName::Barplot => "barplot",
            ChannelName::RootedTree => "rooted_tree",
            ChannelName::Rarefaction => "rarefaction",
            ChannelName::CoreMetrics => "core_metrics",
            ChannelName::MetadataCategories => "metadata_categories",
            ChannelName::MetadataPairwise => "metadata_pairwise",
            ChannelName::AlphaDiversity => "alpha_diversity",
            ChannelName::BetaDiversity => "beta_diversity",
            ChannelName::BetaOrdination => "beta_ordination",
            ChannelName::Ancom => "ancom",
        }
    }

    pub fn from_name(name: &str) -> Option<ChannelName> {
        ChannelName::ALL.iter().copied().find(|c| c.as_str() == name)
    }

    /// File or directory name the producing stage writes for this channel.
    pub fn file_name(&self) -> String {
        match self {
            ChannelName::Reads
            | ChannelName::FastqcResults
            | ChannelName::TrimmedReads
            | ChannelName::DemuxQuality
            | ChannelName::ExportedTable
            | ChannelName::ExportedRepseqs
            | ChannelName::AbundanceTables
            | ChannelName::Barplot
            | ChannelName::Rarefaction
            | ChannelName::CoreMetrics
            | ChannelName::AlphaDiversity
            | ChannelName::BetaDiversity
            | ChannelName::BetaOrdination
            | ChannelName::Ancom => self.as_str().to_string(),
            ChannelName::Metadata | ChannelName::FilterStats => format!("{}.tsv", self.as_str()),
            ChannelName::SoftwareVersions | ChannelName::CutadaptLog => format!("{}.txt", self.as_str()),
            ChannelName::MultiqcReport => format!("{}.html", self.as_str()),
            ChannelName::TruncLengths
            | ChannelName::MetadataCategories
            | ChannelName::MetadataPairwise => format!("{}.txt", self.as_str()),
            ChannelName::Demux
            | ChannelName::RawTable
            | ChannelName::RawRepseqs
            | ChannelName::DenoiseStats
            | ChannelName::Classifier
            | ChannelName::Taxonomy
            | ChannelName::Table
            | ChannelName::Repseqs
            | ChannelName::RootedTree => format!("{}.qza", self.as_str()),
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    SoftwareVersions,
    FastQC,
    Trimming,
    MultiQC,
    ImportReads,
    LoadImportedArtifact,
    DemuxSummary,
    ComputeTruncLengths,
    FixedTruncLengths,
    Dada2Denoise,
    TrainClassifier,
    LoadClassifier,
    Classify,
    FilterTaxa,
    PassThroughTaxa,
    FilterAbundance,
    ExportTables,
    FilterStats,
    AbundanceTables,
    Barplot,
    PhylogeneticTree,
    AlphaRarefaction,
    DiversityCore,
    MetadataCategories,
    MetadataPairwise,
    AlphaDiversity,
    BetaDiversity,
    BetaOrdination,
    Ancom,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::SoftwareVersions => "software_versions",
            StageId::FastQC => "fastqc",
            StageId::Trimming => "trimming",
            StageId::MultiQC => "multiqc",
            StageId::ImportReads => "qiime_import",
            StageId::LoadImportedArtifact => "load_imported_artifact",
            StageId::DemuxSummary => "qiime_demux_visualize",
            StageId::ComputeTruncLengths => "dada_trunc_parameter",
            StageId::FixedTruncLengths => "fixed_trunc_parameter",
            StageId::Dada2Denoise => "dada_denoise",
            StageId::TrainClassifier => "train_classifier",
            StageId::LoadClassifier => "load_classifier",
            StageId::Classify => "classifier",
            StageId::FilterTaxa => "filter_taxa",
            StageId::PassThroughTaxa => "pass_through_taxa",
            StageId::FilterAbundance => "filter_abundance",
            StageId::ExportTables => "export_filtered_dada_output",
            StageId::FilterStats => "report_filter_stats",
            StageId::AbundanceTables => "relative_abundance",
            StageId::Barplot => "barplot",
            StageId::PhylogeneticTree => "tree",
            StageId::AlphaRarefaction => "alpha_rarefaction",
            StageId::DiversityCore => "diversity_core",
            StageId::MetadataCategories => "metadata_category_all",
            StageId::MetadataPairwise => "metadata_category_pairwise",
            StageId::AlphaDiversity => "alpha_diversity",
            StageId::BetaDiversity => "beta_diversity",
            StageId::BetaOrdination => "beta_diversity_ordination",
            StageId::Ancom => "ancom",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// Groups of stages that are alternatives for the same channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Input,
    Truncation,
    Classifier,
    TaxaFilter,
}

impl Branch {
    pub const ALL: [Branch; 4] = [Branch::Input, Branch::Truncation, Branch::Classifier, Branch::TaxaFilter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Input => "input",
            Branch::Truncation => "truncation",
            Branch::Classifier => "classifier",
            Branch::TaxaFilter => "taxa_filter",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


#[derive(Debug, Clone)]
pub struct Stage {
    pub id: StageId,
    pub inputs: Vec<ChannelName>,
    pub outputs: Vec<ChannelName>,
    pub enabled: fn(&Flags) -> bool,
    pub branch: Option<Branch>,
    pub tool: &'static str,
    pub template: String,
}

impl Stage {
    pub fn new(id: StageId, tool: &'static str) -> Self {
        Stage {
            id,
            inputs: Vec::new(),
            outputs: Vec::new(),
            enabled: |_| true,
            branch: None,
            tool,
            template: String::new(),
        }
    }

    pub fn consumes(mut self, channels: &[ChannelName]) -> Self {
        self.inputs = channels.to_vec();
        self
    }

    pub fn produces(mut self, channels: &[ChannelName]) -> Self {
        self.outputs = channels.to_vec();
        self
    }

    pub fn when(mut self, predicate: fn(&Flags) -> bool) -> Self {
        self.enabled = predicate;
        self
    }

    pub fn in_branch(mut self, branch: Branch) -> Self {
        self.branch = Some(branch);
        self
    }

    pub fn script(mut self, template: &str) -> Self {
        self.template = template.to_string();
        self
    }

    /// Directory under the output root holding this stage's work and outputs.
    pub fn dir_name(&self) -> &'static str {
        self.id.as_str()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_are_unique_and_parse_back() {
        for c in ChannelName::ALL {
            assert_eq!(ChannelName::from_name(c.as_str()), Some(c));
        }
        assert_eq!(ChannelName::from_name("nope"), None);
    }

    #[test]
    fn test_stage_builder() {
        let stage = Stage::new(StageId::Classify, "qiime")
            .consumes(&[ChannelName::RawRepseqs, ChannelName::Classifier])
            .produces(&[ChannelName::Taxonomy])
            .script("qiime feature-classifier classify-sklearn");
        assert_eq!(stage.inputs.len(), 2);
        assert_eq!(stage.outputs, vec![ChannelName::Taxonomy]);
        assert!(stage.branch.is_none());
        assert_eq!(stage.dir_name(), "classifier");
    }
}
