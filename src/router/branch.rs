// src/router/branch.rs: Resolution of mutually exclusive upstream paths

use log::debug;
use crate::config::defs::{PipelineError, EXCLUDE_TAXA_NONE};
use crate::config::params::ParamSet;
use crate::router::catalog::catalog_stage;
use crate::router::flags::{derive_flags, Flag, Flags};
use crate::router::stage::{Branch, Stage, StageId};


/// Picks the stage that serves `branch` for this parameter set.
///
/// # Arguments
///
/// * `params` - Validated parameter set.
/// * `branch` - Which alternative to resolve.
///
/// # Returns
/// The selected catalog Stage, or a ConfigurationError when the selected path
/// is missing a companion parameter.
pub fn select_branch(params: &ParamSet, branch: Branch) -> Result<Stage, PipelineError> {
    let flags = derive_flags(params);
    let id = resolve_branch(params, &flags, branch)?;
    catalog_stage(id).ok_or_else(|| {
        PipelineError::Configuration(format!("Stage {} missing from catalog", id))
    })
}

/// Same as `select_branch` but against already derived flags, returning only the id.
pub fn resolve_branch(params: &ParamSet, flags: &Flags, branch: Branch) -> Result<StageId, PipelineError> {
    let choice = match branch {
        Branch::Input => {
            if params.qiime_archive.is_some() {
                StageId::LoadImportedArtifact
            } else {
                require_raw_read_params(params)?;
                StageId::ImportReads
            }
        }
        Branch::Truncation => match (params.trunclenf, params.trunclenr) {
            (Some(_), Some(_)) => StageId::FixedTruncLengths,
            (None, None) => StageId::ComputeTruncLengths,
            _ => {
                return Err(PipelineError::Configuration(
                    "trunclenf and trunclenr must be given together; omit both to derive them from trunc_qmin"
                        .to_string(),
                ));
            }
        },
        Branch::Classifier => {
            if params.classifier.is_some() {
                StageId::LoadClassifier
            } else {
                if params.forward_primer.is_none() || params.reverse_primer.is_none() {
                    return Err(PipelineError::Configuration(
                        "Training a classifier needs --fw-primer and --rv-primer; supply --classifier to skip training"
                            .to_string(),
                    ));
                }
                StageId::TrainClassifier
            }
        }
        Branch::TaxaFilter => {
            let taxa_filter_off = flags.skips(Flag::SkipTaxonomy) || params.exclude_taxa.trim() == EXCLUDE_TAXA_NONE;
            match (taxa_filter_off, params.filters_abundance()) {
                (false, _) => StageId::FilterTaxa,
                (true, true) => StageId::FilterAbundance,
                (true, false) => StageId::PassThroughTaxa,
            }
        }
    };
    debug!("Branch {} resolved to {}", branch, choice);
    Ok(choice)
}

/// Whether the branch has any effect under these flags. Inactive branches
/// are not resolved, so their companion parameters are not demanded.
pub fn branch_active(flags: &Flags, branch: Branch) -> bool {
    match branch {
        Branch::Input => true,
        Branch::Truncation | Branch::TaxaFilter => flags.runs(Flag::SkipDenoising),
        Branch::Classifier => flags.runs(Flag::SkipTaxonomy),
    }
}

fn require_raw_read_params(params: &ParamSet) -> Result<(), PipelineError> {
    let missing: Vec<&str> = [
        ("--reads", params.reads.is_none()),
        ("--fw-primer", params.forward_primer.is_none()),
        ("--rv-primer", params.reverse_primer.is_none()),
        ("--metadata", params.metadata.is_none()),
    ]
    .iter()
    .filter(|(_, absent)| *absent)
    .map(|(name, _)| *name)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Configuration(format!(
            "Processing raw reads requires {} (or supply --qiime-archive)",
            missing.join(", ")
        )))
    }
}
