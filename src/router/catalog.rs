// src/router/catalog.rs: Fixed stage list of the amplicon workflow
//
// Catalog order is the tie-break for plan ordering.
//
// Templates are bash script bodies. Placeholders:
//   ${in:<channel>}   path of a consumed channel
//   ${out:<channel>}  path of a produced channel
//   ${param:<name>}   shell-quoted parameter value, '' when unset
//   ${task.cpus}      cpus granted to the stage

use crate::config::defs::{CUTADAPT_TAG, FASTQC_TAG, MULTIQC_TAG, PYTHON_TAG, QIIME_TAG, RSCRIPT_TAG, SHELL_TAG};
use crate::router::flags::Flag;
use crate::router::stage::{Branch, ChannelName as C, Stage, StageId};


pub fn catalog() -> Vec<Stage> {
    vec![
        Stage::new(StageId::SoftwareVersions, SHELL_TAG)
            .produces(&[C::SoftwareVersions])
            .script(SOFTWARE_VERSIONS),
        Stage::new(StageId::FastQC, FASTQC_TAG)
            .consumes(&[C::Reads])
            .produces(&[C::FastqcResults])
            .when(|f| f.raw_input && f.runs(Flag::SkipFastqc))
            .script(FASTQC),
        Stage::new(StageId::Trimming, CUTADAPT_TAG)
            .consumes(&[C::Reads])
            .produces(&[C::TrimmedReads, C::CutadaptLog])
            .when(|f| f.raw_input)
            .script(TRIMMING),
        Stage::new(StageId::MultiQC, MULTIQC_TAG)
            .consumes(&[C::FastqcResults, C::SoftwareVersions])
            .produces(&[C::MultiqcReport])
            .when(|f| f.runs(Flag::SkipMultiqc))
            .script(MULTIQC),
        Stage::new(StageId::ImportReads, QIIME_TAG)
            .consumes(&[C::TrimmedReads])
            .produces(&[C::Demux])
            .in_branch(Branch::Input)
            .script(QIIME_IMPORT),
        Stage::new(StageId::LoadImportedArtifact, SHELL_TAG)
            .produces(&[C::Demux])
            .in_branch(Branch::Input)
            .script(LOAD_IMPORTED_ARTIFACT),
        Stage::new(StageId::DemuxSummary, QIIME_TAG)
            .consumes(&[C::Demux])
            .produces(&[C::DemuxQuality])
            .script(DEMUX_SUMMARY),
        Stage::new(StageId::ComputeTruncLengths, PYTHON_TAG)
            .consumes(&[C::DemuxQuality])
            .produces(&[C::TruncLengths])
            .when(|f| f.runs(Flag::SkipDenoising))
            .in_branch(Branch::Truncation)
            .script(COMPUTE_TRUNC_LENGTHS),
        Stage::new(StageId::FixedTruncLengths, SHELL_TAG)
            .produces(&[C::TruncLengths])
            .when(|f| f.runs(Flag::SkipDenoising))
            .in_branch(Branch::Truncation)
            .script(FIXED_TRUNC_LENGTHS),
        Stage::new(StageId::Dada2Denoise, QIIME_TAG)
            .consumes(&[C::Demux, C::TruncLengths])
            .produces(&[C::RawTable, C::RawRepseqs, C::DenoiseStats])
            .when(|f| f.runs(Flag::SkipDenoising))
            .script(DADA2_DENOISE),
        Stage::new(StageId::TrainClassifier, QIIME_TAG)
            .produces(&[C::Classifier])
            .when(|f| f.runs(Flag::SkipTaxonomy))
            .in_branch(Branch::Classifier)
            .script(TRAIN_CLASSIFIER),
        Stage::new(StageId::LoadClassifier, SHELL_TAG)
            .produces(&[C::Classifier])
            .when(|f| f.runs(Flag::SkipTaxonomy))
            .in_branch(Branch::Classifier)
            .script(LOAD_CLASSIFIER),
        Stage::new(StageId::Classify, QIIME_TAG)
            .consumes(&[C::RawRepseqs, C::Classifier])
            .produces(&[C::Taxonomy])
            .when(|f| f.runs(Flag::SkipTaxonomy))
            .script(CLASSIFY),
        Stage::new(StageId::FilterTaxa, QIIME_TAG)
            .consumes(&[C::RawTable, C::RawRepseqs, C::Taxonomy])
            .produces(&[C::Table, C::Repseqs])
            .when(|f| f.runs(Flag::SkipDenoising))
            .in_branch(Branch::TaxaFilter)
            .script(FILTER_TAXA),
        Stage::new(StageId::PassThroughTaxa, SHELL_TAG)
            .consumes(&[C::RawTable, C::RawRepseqs])
            .produces(&[C::Table, C::Repseqs])
            .when(|f| f.runs(Flag::SkipDenoising))
            .in_branch(Branch::TaxaFilter)
            .script(PASS_THROUGH_TAXA),
        Stage::new(StageId::FilterAbundance, QIIME_TAG)
            .consumes(&[C::RawTable, C::RawRepseqs])
            .produces(&[C::Table, C::Repseqs])
            .when(|f| f.runs(Flag::SkipDenoising))
            .in_branch(Branch::TaxaFilter)
            .script(FILTER_ABUNDANCE),
        Stage::new(StageId::ExportTables, QIIME_TAG)
            .consumes(&[C::Table, C::Repseqs])
            .produces(&[C::ExportedTable, C::ExportedRepseqs])
            .when(|f| f.runs(Flag::SkipDenoising))
            .script(EXPORT_TABLES),
        Stage::new(StageId::FilterStats, PYTHON_TAG)
            .consumes(&[C::DenoiseStats, C::ExportedTable])
            .produces(&[C::FilterStats])
            .when(|f| f.runs(Flag::SkipDenoising))
            .script(FILTER_STATS),
        Stage::new(StageId::AbundanceTables, QIIME_TAG)
            .consumes(&[C::Table, C::Taxonomy])
            .produces(&[C::AbundanceTables])
            .when(|f| f.runs(Flag::SkipAbundanceTables))
            .script(ABUNDANCE_TABLES),
        Stage::new(StageId::Barplot, QIIME_TAG)
            .consumes(&[C::Table, C::Taxonomy, C::Metadata])
            .produces(&[C::Barplot])
            .when(|f| f.runs(Flag::SkipBarplot))
            .script(BARPLOT),
        Stage::new(StageId::PhylogeneticTree, QIIME_TAG)
            .consumes(&[C::Repseqs])
            .produces(&[C::RootedTree])
            .when(|f| f.runs(Flag::SkipDiversityIndices) || f.runs(Flag::SkipAlphaRarefaction))
            .script(PHYLOGENETIC_TREE),
        Stage::new(StageId::AlphaRarefaction, QIIME_TAG)
            .consumes(&[C::Table, C::RootedTree, C::Metadata, C::ExportedTable])
            .produces(&[C::Rarefaction])
            .when(|f| f.runs(Flag::SkipAlphaRarefaction))
            .script(ALPHA_RAREFACTION),
        Stage::new(StageId::DiversityCore, QIIME_TAG)
            .consumes(&[C::Table, C::RootedTree, C::Metadata, C::ExportedTable])
            .produces(&[C::CoreMetrics])
            .when(|f| f.runs(Flag::SkipDiversityIndices))
            .script(DIVERSITY_CORE),
        Stage::new(StageId::MetadataCategories, RSCRIPT_TAG)
            .consumes(&[C::Metadata])
            .produces(&[C::MetadataCategories])
            .when(|f| f.runs(Flag::SkipDiversityIndices) || f.runs(Flag::SkipAncom))
            .script(METADATA_CATEGORIES),
        Stage::new(StageId::MetadataPairwise, RSCRIPT_TAG)
            .consumes(&[C::Metadata])
            .produces(&[C::MetadataPairwise])
            .when(|f| f.runs(Flag::SkipDiversityIndices))
            .script(METADATA_PAIRWISE),
        Stage::new(StageId::AlphaDiversity, QIIME_TAG)
            .consumes(&[C::CoreMetrics, C::Metadata, C::MetadataCategories])
            .produces(&[C::AlphaDiversity])
            .when(|f| f.runs(Flag::SkipDiversityIndices))
            .script(ALPHA_DIVERSITY),
        Stage::new(StageId::BetaDiversity, QIIME_TAG)
            .consumes(&[C::CoreMetrics, C::Metadata, C::MetadataPairwise])
            .produces(&[C::BetaDiversity])
            .when(|f| f.runs(Flag::SkipDiversityIndices))
            .script(BETA_DIVERSITY),
        Stage::new(StageId::BetaOrdination, QIIME_TAG)
            .consumes(&[C::CoreMetrics, C::Metadata])
            .produces(&[C::BetaOrdination])
            .when(|f| f.runs(Flag::SkipDiversityIndices))
            .script(BETA_ORDINATION),
        Stage::new(StageId::Ancom, QIIME_TAG)
            .consumes(&[C::Table, C::Taxonomy, C::Metadata, C::MetadataCategories])
            .produces(&[C::Ancom])
            .when(|f| f.runs(Flag::SkipAncom))
            .script(ANCOM),
    ]
}

/// Catalog entry for one stage id.
pub fn catalog_stage(id: StageId) -> Option<Stage> {
    catalog().into_iter().find(|s| s.id == id)
}


const SOFTWARE_VERSIONS: &str = r##"
{
  echo "fastqc: $(fastqc --version 2>&1 | head -n1)"
  echo "multiqc: $(multiqc --version 2>&1 | head -n1)"
  echo "cutadapt: $(cutadapt --version 2>&1 | head -n1)"
  echo "qiime2: $(qiime --version 2>&1 | head -n1)"
  echo "R: $(Rscript --version 2>&1 | head -n1)"
} > ${out:software_versions}
"##;

const FASTQC: &str = r##"
mkdir -p ${out:fastqc_results}
fastqc --quiet --threads ${task.cpus} --outdir ${out:fastqc_results} ${in:reads}/*.fastq.gz
"##;

const TRIMMING: &str = r##"
mkdir -p ${out:trimmed_reads}
: > ${out:cutadapt_log}
untrimmed="--discard-untrimmed"
if [ ${param:retain_untrimmed} = "true" ]; then untrimmed=""; fi
for r1 in ${in:reads}/*_R1_*.fastq.gz; do
  r2="${r1/_R1_/_R2_}"
  cutadapt -g ${param:forward_primer} -G ${param:reverse_primer} --cores ${task.cpus} $untrimmed \
    -o ${out:trimmed_reads}/"$(basename "$r1")" -p ${out:trimmed_reads}/"$(basename "$r2")" \
    "$r1" "$r2" >> ${out:cutadapt_log}
done
"##;

const MULTIQC: &str = r##"
cp ${in:software_versions} .
multiqc --force --interactive --filename ${out:multiqc_report} ${in:fastqc_results} .
"##;

const QIIME_IMPORT: &str = r##"
qiime tools import \
  --type 'SampleData[PairedEndSequencesWithQuality]' \
  --input-path ${in:trimmed_reads} \
  --input-format CasavaOneEightSingleLanePerSampleDirFmt \
  --output-path ${out:demux}
"##;

const LOAD_IMPORTED_ARTIFACT: &str = r##"
cp ${param:qiime_archive} ${out:demux}
"##;

const DEMUX_SUMMARY: &str = r##"
qiime demux summarize --i-data ${in:demux} --o-visualization demux.qzv
qiime tools export --input-path demux.qzv --output-path ${out:demux_quality}
"##;

const COMPUTE_TRUNC_LENGTHS: &str = r##"
python3 - ${in:demux_quality} ${param:trunc_qmin} > ${out:trunc_lengths} <<'PY'
import sys

quality_dir, qmin = sys.argv[1], float(sys.argv[2])

def cut(name):
    with open(f"{quality_dir}/{name}") as fh:
        rows = [line.rstrip("\n").split("\t") for line in fh]
    medians = next(r for r in rows if r[0] == "50%")[1:]
    for pos, q in enumerate(medians):
        if float(q) < qmin:
            return pos
    return len(medians)

print(cut("forward-seven-number-summaries.tsv"), cut("reverse-seven-number-summaries.tsv"))
PY
"##;

const FIXED_TRUNC_LENGTHS: &str = r##"
echo ${param:trunclenf} ${param:trunclenr} > ${out:trunc_lengths}
"##;

const DADA2_DENOISE: &str = r##"
read -r trunclenf trunclenr < ${in:trunc_lengths}
qiime dada2 denoise-paired \
  --i-demultiplexed-seqs ${in:demux} \
  --p-trunc-len-f "$trunclenf" \
  --p-trunc-len-r "$trunclenr" \
  --p-n-threads ${task.cpus} \
  --o-table ${out:raw_table} \
  --o-representative-sequences ${out:raw_repseqs} \
  --o-denoising-stats ${out:denoise_stats}
"##;

const TRAIN_CLASSIFIER: &str = r##"
ref=${param:reference_database}
case "$ref" in
  http://*|https://*) wget -q -O refdb.zip "$ref"; ref=refdb.zip ;;
esac
unzip -qq -o "$ref" -d refdb
fasta=$(find refdb -name '*99_otus_16S.fasta' | head -n1)
taxonomy=$(find refdb -name '*majority_taxonomy_7_levels.txt' | head -n1)
qiime tools import --type 'FeatureData[Sequence]' --input-path "$fasta" --output-path ref-seq.qza
qiime tools import --type 'FeatureData[Taxonomy]' --input-format HeaderlessTSVTaxonomyFormat \
  --input-path "$taxonomy" --output-path ref-taxonomy.qza
qiime feature-classifier extract-reads --i-sequences ref-seq.qza \
  --p-f-primer ${param:forward_primer} --p-r-primer ${param:reverse_primer} \
  --o-reads ref-seq-trimmed.qza
qiime feature-classifier fit-classifier-naive-bayes \
  --i-reference-reads ref-seq-trimmed.qza \
  --i-reference-taxonomy ref-taxonomy.qza \
  --o-classifier ${out:classifier}
"##;

const LOAD_CLASSIFIER: &str = r##"
cp ${param:classifier} ${out:classifier}
"##;

const CLASSIFY: &str = r##"
qiime feature-classifier classify-sklearn \
  --i-classifier ${in:classifier} \
  --i-reads ${in:raw_repseqs} \
  --p-n-jobs ${task.cpus} \
  --o-classification ${out:taxonomy}
"##;

const FILTER_TAXA: &str = r##"
qiime taxa filter-table --i-table ${in:raw_table} --i-taxonomy ${in:taxonomy} \
  --p-exclude ${param:exclude_taxa} --p-mode contains --o-filtered-table taxa-filtered.qza
qiime feature-table filter-features --i-table taxa-filtered.qza \
  --p-min-frequency ${param:min_frequency} --p-min-samples ${param:min_samples} \
  --o-filtered-table ${out:table}
qiime feature-table filter-seqs --i-data ${in:raw_repseqs} --i-table ${out:table} \
  --o-filtered-data ${out:repseqs}
"##;

const PASS_THROUGH_TAXA: &str = r##"
cp ${in:raw_table} ${out:table}
cp ${in:raw_repseqs} ${out:repseqs}
"##;

const FILTER_ABUNDANCE: &str = r##"
qiime feature-table filter-features --i-table ${in:raw_table} \
  --p-min-frequency ${param:min_frequency} --p-min-samples ${param:min_samples} \
  --o-filtered-table ${out:table}
qiime feature-table filter-seqs --i-data ${in:raw_repseqs} --i-table ${out:table} \
  --o-filtered-data ${out:repseqs}
"##;

const EXPORT_TABLES: &str = r##"
qiime tools export --input-path ${in:table} --output-path ${out:exported_table}
biom convert -i ${out:exported_table}/feature-table.biom -o ${out:exported_table}/feature-table.tsv --to-tsv
qiime tools export --input-path ${in:repseqs} --output-path ${out:exported_repseqs}
"##;

const FILTER_STATS: &str = r##"
qiime tools export --input-path ${in:denoise_stats} --output-path denoise_stats
python3 - denoise_stats/stats.tsv ${in:exported_table}/feature-table.tsv > ${out:filter_stats} <<'PY'
import sys

stats_path, table_path = sys.argv[1], sys.argv[2]
denoised = {}
with open(stats_path) as fh:
    header = fh.readline().rstrip("\n").split("\t")
    col = header.index("non-chimeric")
    for line in fh:
        if line.startswith("#"):
            continue
        row = line.rstrip("\n").split("\t")
        denoised[row[0]] = (row[1], float(row[col]))

with open(table_path) as fh:
    fh.readline()
    samples = fh.readline().rstrip("\n").split("\t")[1:]
    totals = [0.0] * len(samples)
    for line in fh:
        for i, v in enumerate(line.rstrip("\n").split("\t")[1:]):
            totals[i] += float(v)

print("sample\tinput\tnon_chimeric\tfiltered\tretained_percent")
for sample, total in zip(samples, totals):
    raw, kept = denoised.get(sample, ("0", 0.0))
    pct = 100.0 * total / kept if kept else 0.0
    print(f"{sample}\t{raw}\t{kept:.0f}\t{total:.0f}\t{pct:.2f}")
PY
"##;

const ABUNDANCE_TABLES: &str = r##"
mkdir -p ${out:abundance_tables}
for level in 2 3 4 5 6 7; do
  qiime taxa collapse --i-table ${in:table} --i-taxonomy ${in:taxonomy} \
    --p-level "$level" --o-collapsed-table "collapsed-$level.qza"
  qiime feature-table relative-frequency --i-table "collapsed-$level.qza" \
    --o-relative-frequency-table "relative-$level.qza"
  qiime tools export --input-path "relative-$level.qza" --output-path "relative-$level"
  biom convert -i "relative-$level/feature-table.biom" \
    -o ${out:abundance_tables}/"rel-table-$level.tsv" --to-tsv
done
"##;

const BARPLOT: &str = r##"
qiime taxa barplot --i-table ${in:table} --i-taxonomy ${in:taxonomy} \
  --m-metadata-file ${in:metadata} --o-visualization taxa-bar-plots.qzv
qiime tools export --input-path taxa-bar-plots.qzv --output-path ${out:barplot}
"##;

const PHYLOGENETIC_TREE: &str = r##"
qiime alignment mafft --i-sequences ${in:repseqs} --p-n-threads ${task.cpus} --o-alignment aligned.qza
qiime alignment mask --i-alignment aligned.qza --o-masked-alignment masked.qza
qiime phylogeny fasttree --i-alignment masked.qza --p-n-threads ${task.cpus} --o-tree unrooted.qza
qiime phylogeny midpoint-root --i-tree unrooted.qza --o-rooted-tree ${out:rooted_tree}
"##;

const ALPHA_RAREFACTION: &str = r##"
maxdepth=$(awk -F'\t' 'NR > 2 { for (i = 2; i <= NF; i++) s[i] += $i }
  END { m = 0; for (i in s) if (s[i] > m) m = s[i]; printf "%d", m }' ${in:exported_table}/feature-table.tsv)
qiime diversity alpha-rarefaction --i-table ${in:table} --i-phylogeny ${in:rooted_tree} \
  --p-max-depth "$maxdepth" --m-metadata-file ${in:metadata} \
  --p-steps 50 --p-iterations 10 --o-visualization alpha-rarefaction.qzv
qiime tools export --input-path alpha-rarefaction.qzv --output-path ${out:rarefaction}
"##;

const DIVERSITY_CORE: &str = r##"
mindepth=$(awk -F'\t' 'NR > 2 { for (i = 2; i <= NF; i++) s[i] += $i }
  END { m = -1; for (i in s) if (m < 0 || s[i] < m) m = s[i]; printf "%d", m }' ${in:exported_table}/feature-table.tsv)
qiime diversity core-metrics-phylogenetic --m-metadata-file ${in:metadata} \
  --i-phylogeny ${in:rooted_tree} --i-table ${in:table} \
  --p-sampling-depth "$mindepth" --p-n-jobs-or-threads ${task.cpus} \
  --output-dir ${out:core_metrics}
"##;

const METADATA_CATEGORIES: &str = r##"
if [ -n ${param:metadata_category} ]; then
  printf '%s' ${param:metadata_category} > ${out:metadata_categories}
  exit 0
fi
cat > metadata_category.r <<'RS'
args <- commandArgs(trailingOnly = TRUE)
meta <- read.delim(args[1], comment.char = "#", check.names = FALSE)
cols <- names(meta)[-1]
keep <- cols[vapply(cols, function(col) {
  n <- length(unique(na.omit(meta[[col]])))
  n > 1 && n < nrow(meta)
}, logical(1))]
cat(paste(keep, collapse = ","))
RS
Rscript metadata_category.r ${in:metadata} > ${out:metadata_categories}
"##;

const METADATA_PAIRWISE: &str = r##"
cat > metadata_pairwise.r <<'RS'
args <- commandArgs(trailingOnly = TRUE)
meta <- read.delim(args[1], comment.char = "#", check.names = FALSE)
cols <- names(meta)[-1]
keep <- cols[vapply(cols, function(col) {
  counts <- table(na.omit(meta[[col]]))
  length(counts) > 1 && all(counts > 1)
}, logical(1))]
cat(paste(keep, collapse = ","))
RS
Rscript metadata_pairwise.r ${in:metadata} > ${out:metadata_pairwise}
"##;

const ALPHA_DIVERSITY: &str = r##"
mkdir -p ${out:alpha_diversity}
if [ ! -s ${in:metadata_categories} ]; then
  echo "No metadata category suitable for alpha diversity testing"
  exit 0
fi
for metric in faith_pd evenness observed_features shannon; do
  qiime diversity alpha-group-significance \
    --i-alpha-diversity ${in:core_metrics}/"$metric"_vector.qza \
    --m-metadata-file ${in:metadata} --o-visualization "$metric".qzv
  qiime tools export --input-path "$metric".qzv --output-path ${out:alpha_diversity}/"$metric"
done
"##;

const BETA_DIVERSITY: &str = r##"
mkdir -p ${out:beta_diversity}
IFS=',' read -r -a categories < ${in:metadata_pairwise} || true
for category in "${categories[@]}"; do
  for metric in unweighted_unifrac weighted_unifrac jaccard bray_curtis; do
    qiime diversity beta-group-significance \
      --i-distance-matrix ${in:core_metrics}/"$metric"_distance_matrix.qza \
      --m-metadata-file ${in:metadata} --m-metadata-column "$category" \
      --p-pairwise --o-visualization "$metric-$category".qzv
    qiime tools export --input-path "$metric-$category".qzv \
      --output-path ${out:beta_diversity}/"$metric-$category"
  done
done
"##;

const BETA_ORDINATION: &str = r##"
mkdir -p ${out:beta_ordination}
for metric in unweighted_unifrac weighted_unifrac jaccard bray_curtis; do
  qiime emperor plot --i-pcoa ${in:core_metrics}/"$metric"_pcoa_results.qza \
    --m-metadata-file ${in:metadata} --o-visualization "$metric"-pcoa.qzv
  qiime tools export --input-path "$metric"-pcoa.qzv --output-path ${out:beta_ordination}/"$metric"
done
"##;

const ANCOM: &str = r##"
mkdir -p ${out:ancom}
IFS=',' read -r -a categories < ${in:metadata_categories} || true
qiime feature-table filter-features --i-table ${in:table} --p-min-samples 2 --o-filtered-table ancom-table.qza
for level in 2 3 4 5 6; do
  qiime taxa collapse --i-table ancom-table.qza --i-taxonomy ${in:taxonomy} \
    --p-level "$level" --o-collapsed-table "lvl$level.qza"
  qiime composition add-pseudocount --i-table "lvl$level.qza" --o-composition-table "comp-lvl$level.qza"
  for category in "${categories[@]}"; do
    qiime composition ancom --i-table "comp-lvl$level.qza" \
      --m-metadata-file ${in:metadata} --m-metadata-column "$category" \
      --o-visualization "ancom-$category-lvl$level.qzv"
    qiime tools export --input-path "ancom-$category-lvl$level.qzv" \
      --output-path ${out:ancom}/"$category-level-$level"
  done
done
"##;


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_stage_ids_unique() {
        let stages = catalog();
        let ids: HashSet<StageId> = stages.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), stages.len());
    }

    #[test]
    fn test_branch_alternatives_share_outputs() {
        let stages = catalog();
        for branch in Branch::ALL {
            let members: Vec<&Stage> = stages.iter().filter(|s| s.branch == Some(branch)).collect();
            assert!(members.len() >= 2, "branch {} should have alternatives", branch);
            for member in &members[1..] {
                assert_eq!(members[0].outputs, member.outputs, "{} differs from {}", member.id, members[0].id);
            }
        }
    }

    #[test]
    fn test_templates_mention_every_output() {
        for stage in catalog() {
            for channel in &stage.outputs {
                let placeholder = format!("${{out:{}}}", channel);
                assert!(
                    stage.template.contains(&placeholder),
                    "{} never writes {}",
                    stage.id,
                    channel
                );
            }
            for channel in &stage.inputs {
                let placeholder = format!("${{in:{}}}", channel);
                assert!(stage.template.contains(&placeholder), "{} never reads {}", stage.id, channel);
            }
        }
    }
}
