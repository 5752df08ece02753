use std::path::PathBuf;

use anyhow::Result;
use amplicon_router::config::defs::PipelineError;
use amplicon_router::config::params::{ParamSet, ParamsFile};
use amplicon_router::router::{build_plan, derive_flags, select_branch, Branch, ChannelName, Flag, StageId};
use amplicon_router::Arguments;


const FW: &str = "GTGYCAGCMGCCGCGGTAA";
const RV: &str = "GGACTACNVGGGTWTCTAAT";

fn raw_params() -> ParamSet {
    ParamSet {
        reads: Some(PathBuf::from("/data/casava")),
        metadata: Some(PathBuf::from("/data/metadata.tsv")),
        forward_primer: Some(FW.to_string()),
        reverse_primer: Some(RV.to_string()),
        ..Default::default()
    }
}

fn artifact_params() -> ParamSet {
    ParamSet {
        qiime_archive: Some(PathBuf::from("/data/demux.qza")),
        metadata: Some(PathBuf::from("/data/metadata.tsv")),
        forward_primer: Some(FW.to_string()),
        reverse_primer: Some(RV.to_string()),
        ..Default::default()
    }
}

fn plan_variants() -> Vec<ParamSet> {
    vec![
        raw_params(),
        artifact_params(),
        ParamSet { metadata: None, ..artifact_params() },
        ParamSet { skip_taxonomy: true, ..raw_params() },
        ParamSet { skip_fastqc: true, ..raw_params() },
        ParamSet { exclude_taxa: "none".to_string(), ..raw_params() },
        ParamSet { exclude_taxa: "none".to_string(), min_frequency: 10, min_samples: 3, ..raw_params() },
        ParamSet { classifier: Some(PathBuf::from("/c.qza")), forward_primer: None, reverse_primer: None, ..artifact_params() },
        ParamSet { until_q2_import: true, ..raw_params() },
    ]
}


#[test]
fn test_full_raw_read_plan() -> Result<()> {
    let plan = build_plan(&raw_params())?;

    for id in [
        StageId::FastQC,
        StageId::Trimming,
        StageId::MultiQC,
        StageId::ImportReads,
        StageId::ComputeTruncLengths,
        StageId::Dada2Denoise,
        StageId::TrainClassifier,
        StageId::FilterTaxa,
        StageId::Barplot,
        StageId::DiversityCore,
        StageId::Ancom,
    ] {
        assert!(plan.contains(id), "{} missing from plan", id);
    }
    assert_eq!(plan.branches.get(&Branch::Input), Some(&StageId::ImportReads));
    assert!(plan.position(StageId::Trimming) < plan.position(StageId::ImportReads));
    assert!(plan.position(StageId::Dada2Denoise) < plan.position(StageId::Classify));
    assert!(plan.position(StageId::Classify) < plan.position(StageId::FilterTaxa));
    assert!(plan.position(StageId::MetadataCategories) < plan.position(StageId::Ancom));
    Ok(())
}


#[test]
fn test_pre_imported_artifact_skips_read_qc() -> Result<()> {
    let plan = build_plan(&artifact_params())?;

    assert!(plan.contains(StageId::LoadImportedArtifact));
    for id in [StageId::FastQC, StageId::MultiQC, StageId::Trimming, StageId::ImportReads] {
        assert!(!plan.contains(id), "{} should not run on a pre-imported artifact", id);
    }
    assert!(!plan.seeded.contains(&ChannelName::Reads));
    assert_eq!(plan.flags.forced_by(Flag::SkipFastqc), Some("pre_imported_artifact"));
    Ok(())
}


#[test]
fn test_artifact_without_metadata_drops_metadata_consumers() -> Result<()> {
    let params = ParamSet { metadata: None, ..artifact_params() };
    let plan = build_plan(&params)?;

    for id in [
        StageId::Barplot,
        StageId::AlphaRarefaction,
        StageId::DiversityCore,
        StageId::MetadataCategories,
        StageId::Ancom,
    ] {
        assert!(!plan.contains(id), "{} needs metadata", id);
    }
    assert!(plan.contains(StageId::AbundanceTables));
    assert!(plan.contains(StageId::FilterStats));
    Ok(())
}


#[test]
fn test_only_denoising_excludes_downstream() -> Result<()> {
    let params = ParamSet { only_denoising: true, ..raw_params() };
    let plan = build_plan(&params)?;

    assert!(plan.contains(StageId::Dada2Denoise));
    assert!(plan.contains(StageId::ExportTables));
    for id in [
        StageId::TrainClassifier,
        StageId::LoadClassifier,
        StageId::Classify,
        StageId::Barplot,
        StageId::AbundanceTables,
        StageId::DiversityCore,
        StageId::AlphaRarefaction,
        StageId::Ancom,
    ] {
        assert!(!plan.contains(id), "{} should be skipped with only_denoising", id);
    }
    assert_eq!(plan.branches.get(&Branch::TaxaFilter), Some(&StageId::PassThroughTaxa));
    assert!(!plan.branches.contains_key(&Branch::Classifier));
    Ok(())
}


#[test]
fn test_only_denoising_does_not_demand_classifier_primers_for_artifact() -> Result<()> {
    let params = ParamSet {
        only_denoising: true,
        forward_primer: None,
        reverse_primer: None,
        ..artifact_params()
    };
    let plan = build_plan(&params)?;
    assert!(plan.contains(StageId::Dada2Denoise));
    Ok(())
}


#[test]
fn test_until_q2_import_keeps_demux_summary() -> Result<()> {
    let params = ParamSet { until_q2_import: true, ..raw_params() };
    let plan = build_plan(&params)?;

    assert!(plan.contains(StageId::ImportReads));
    assert!(plan.contains(StageId::FastQC));
    assert!(plan.contains(StageId::DemuxSummary));
    assert!(plan.position(StageId::ImportReads) < plan.position(StageId::DemuxSummary));
    for id in [StageId::Dada2Denoise, StageId::Classify, StageId::ExportTables] {
        assert!(!plan.contains(id), "{} runs after import", id);
    }
    Ok(())
}


#[test]
fn test_classifier_trained_xor_loaded() -> Result<()> {
    let trained = build_plan(&raw_params())?;
    assert!(trained.contains(StageId::TrainClassifier));
    assert!(!trained.contains(StageId::LoadClassifier));

    let params = ParamSet {
        classifier: Some(PathBuf::from("/data/classifier.qza")),
        ..raw_params()
    };
    let loaded = build_plan(&params)?;
    assert!(loaded.contains(StageId::LoadClassifier));
    assert!(!loaded.contains(StageId::TrainClassifier));
    assert_eq!(select_branch(&params, Branch::Classifier)?.id, StageId::LoadClassifier);
    Ok(())
}


#[test]
fn test_exclude_none_passes_taxa_through() -> Result<()> {
    let params = ParamSet { exclude_taxa: "none".to_string(), ..raw_params() };
    let plan = build_plan(&params)?;

    assert!(plan.contains(StageId::PassThroughTaxa));
    assert!(!plan.contains(StageId::FilterTaxa));
    let stage = select_branch(&params, Branch::TaxaFilter)?;
    assert_eq!(stage.outputs, vec![ChannelName::Table, ChannelName::Repseqs]);
    assert!(plan.position(StageId::PassThroughTaxa) < plan.position(StageId::ExportTables));
    Ok(())
}


#[test]
fn test_abundance_filters_kept_without_taxa_filter() -> Result<()> {
    let params = ParamSet {
        exclude_taxa: "none".to_string(),
        min_frequency: 10,
        min_samples: 3,
        ..raw_params()
    };
    let plan = build_plan(&params)?;
    assert_eq!(plan.branches.get(&Branch::TaxaFilter), Some(&StageId::FilterAbundance));
    assert!(plan.contains(StageId::FilterAbundance));
    assert!(!plan.contains(StageId::PassThroughTaxa));
    assert!(!plan.contains(StageId::FilterTaxa));
    assert!(plan.position(StageId::FilterAbundance) < plan.position(StageId::ExportTables));

    let no_taxonomy = ParamSet {
        skip_taxonomy: true,
        exclude_taxa: "mitochondria".to_string(),
        min_frequency: 10,
        min_samples: 3,
        ..raw_params()
    };
    let plan = build_plan(&no_taxonomy)?;
    assert!(plan.contains(StageId::FilterAbundance));
    assert!(!plan.contains(StageId::PassThroughTaxa));
    assert!(!plan.contains(StageId::Classify));
    Ok(())
}


#[test]
fn test_fixed_truncation_skips_quality_derivation() -> Result<()> {
    let params = ParamSet { trunclenf: Some(230), trunclenr: Some(200), ..raw_params() };
    let plan = build_plan(&params)?;
    assert!(plan.contains(StageId::FixedTruncLengths));
    assert!(!plan.contains(StageId::ComputeTruncLengths));

    let half = ParamSet { trunclenf: Some(230), ..raw_params() };
    assert!(matches!(build_plan(&half), Err(PipelineError::Configuration(_))));
    Ok(())
}


#[test]
fn test_missing_primers_or_metadata_is_configuration_error() {
    let no_primers = ParamSet { forward_primer: None, ..raw_params() };
    match build_plan(&no_primers) {
        Err(PipelineError::Configuration(msg)) => assert!(msg.contains("--fw-primer")),
        other => panic!("expected configuration error, got {:?}", other.map(|p| p.stage_ids())),
    }

    let no_metadata = ParamSet { metadata: None, ..raw_params() };
    match build_plan(&no_metadata) {
        Err(PipelineError::Configuration(msg)) => assert!(msg.contains("--metadata")),
        other => panic!("expected configuration error, got {:?}", other.map(|p| p.stage_ids())),
    }

    assert!(matches!(
        select_branch(&ParamSet::default(), Branch::Input),
        Err(PipelineError::Configuration(_))
    ));
}


#[test]
fn test_plan_is_deterministic() -> Result<()> {
    for params in plan_variants() {
        let first = build_plan(&params)?;
        for _ in 0..5 {
            let again = build_plan(&params)?;
            assert_eq!(again.stage_ids(), first.stage_ids());
            assert_eq!(again.branches, first.branches);
        }
    }
    Ok(())
}


#[test]
fn test_every_consumed_channel_has_earlier_producer() -> Result<()> {
    for params in plan_variants() {
        let plan = build_plan(&params)?;
        let mut available: Vec<ChannelName> = plan.seeded.clone();
        for stage in &plan.stages {
            for input in &stage.inputs {
                assert!(available.contains(input), "{} reads {} before it exists", stage.id, input);
            }
            available.extend(stage.outputs.iter().copied());
        }
    }
    Ok(())
}


#[test]
fn test_skip_taxonomy_drops_taxonomy_consumers() -> Result<()> {
    let plan = build_plan(&ParamSet { skip_taxonomy: true, ..raw_params() })?;

    for flag in [Flag::SkipBarplot, Flag::SkipAbundanceTables, Flag::SkipAncom] {
        assert!(plan.flags.skips(flag));
        assert_eq!(plan.flags.forced_by(flag), Some("taxonomy_skipped"));
    }
    for id in [
        StageId::TrainClassifier,
        StageId::Classify,
        StageId::Barplot,
        StageId::AbundanceTables,
        StageId::Ancom,
    ] {
        assert!(!plan.contains(id), "{} needs taxonomy", id);
    }
    assert!(plan.contains(StageId::DiversityCore));
    assert!(plan.contains(StageId::AlphaRarefaction));
    assert_eq!(plan.branches.get(&Branch::TaxaFilter), Some(&StageId::PassThroughTaxa));
    Ok(())
}


#[test]
fn test_skip_fastqc_cascades_to_multiqc() {
    let flags = derive_flags(&ParamSet { skip_fastqc: true, ..raw_params() });
    assert!(flags.skips(Flag::SkipMultiqc));
    assert_eq!(flags.forced_by(Flag::SkipFastqc), None);
    assert!(flags.forced_by(Flag::SkipMultiqc).is_some());
}


#[test]
fn test_command_line_overrides_params_file() -> Result<()> {
    let file: ParamsFile = serde_json::from_str(
        r#"{"reads": "casava", "exclude_taxa": "none", "skip_ancom": true, "min_samples": 2}"#,
    )?;
    let args = Arguments {
        exclude_taxa: Some("mitochondria".to_string()),
        ..Default::default()
    };
    let params = ParamSet::merge(&args, file, std::path::Path::new("/work"))?;

    assert_eq!(params.reads, Some(PathBuf::from("/work/casava")));
    assert_eq!(params.exclude_taxa, "mitochondria");
    assert!(params.skip_ancom);
    assert_eq!(params.min_samples, 2);
    Ok(())
}
