// src/router/flags.rs: Cascade of skip flags derived from the parameter set

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use log::debug;
use serde::Serialize;
use crate::config::params::ParamSet;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    SkipFastqc,
    SkipMultiqc,
    SkipDenoising,
    SkipTaxonomy,
    SkipBarplot,
    SkipAbundanceTables,
    SkipDiversityIndices,
    SkipAlphaRarefaction,
    SkipAncom,
}

impl Flag {
    pub const ALL: [Flag; 9] = [
        Flag::SkipFastqc,
        Flag::SkipMultiqc,
        Flag::SkipDenoising,
        Flag::SkipTaxonomy,
        Flag::SkipBarplot,
        Flag::SkipAbundanceTables,
        Flag::SkipDiversityIndices,
        Flag::SkipAlphaRarefaction,
        Flag::SkipAncom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::SkipFastqc => "skip_fastqc",
            Flag::SkipMultiqc => "skip_multiqc",
            Flag::SkipDenoising => "skip_denoising",
            Flag::SkipTaxonomy => "skip_taxonomy",
            Flag::SkipBarplot => "skip_barplot",
            Flag::SkipAbundanceTables => "skip_abundance_tables",
            Flag::SkipDiversityIndices => "skip_diversity_indices",
            Flag::SkipAlphaRarefaction => "skip_alpha_rarefaction",
            Flag::SkipAncom => "skip_ancom",
        }
    }

    /// Value the user asked for, before any cascade.
    fn requested(&self, params: &ParamSet) -> bool {
        match self {
            Flag::SkipFastqc => params.skip_fastqc,
            Flag::SkipMultiqc => params.skip_multiqc,
            Flag::SkipDenoising => false,
            Flag::SkipTaxonomy => params.skip_taxonomy,
            Flag::SkipBarplot => params.skip_barplot,
            Flag::SkipAbundanceTables => params.skip_abundance_tables,
            Flag::SkipDiversityIndices => params.skip_diversity_indices,
            Flag::SkipAlphaRarefaction => params.skip_alpha_rarefaction,
            Flag::SkipAncom => params.skip_ancom,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// One row of the precedence table. A rule only ever forces skips, so the
/// outcome does not depend on how rules interleave. Rows whose condition reads
/// a flag come after every row that can force that flag.
pub struct CascadeRule {
    pub name: &'static str,
    pub applies: fn(&ParamSet, &BTreeSet<Flag>) -> bool,
    pub forces: &'static [Flag],
}

const DOWNSTREAM_OF_DENOISING: &[Flag] = &[
    Flag::SkipTaxonomy,
    Flag::SkipBarplot,
    Flag::SkipAbundanceTables,
    Flag::SkipDiversityIndices,
    Flag::SkipAlphaRarefaction,
    Flag::SkipAncom,
];

pub const CASCADE_RULES: &[CascadeRule] = &[
    CascadeRule {
        name: "pre_imported_artifact",
        applies: |p, _| p.qiime_archive.is_some(),
        forces: &[Flag::SkipFastqc, Flag::SkipMultiqc],
    },
    CascadeRule {
        name: "multiqc_needs_fastqc",
        applies: |_, skip| skip.contains(&Flag::SkipFastqc),
        forces: &[Flag::SkipMultiqc],
    },
    CascadeRule {
        name: "until_q2_import",
        applies: |p, _| p.until_q2_import,
        forces: &[
            Flag::SkipDenoising,
            Flag::SkipTaxonomy,
            Flag::SkipBarplot,
            Flag::SkipAbundanceTables,
            Flag::SkipDiversityIndices,
            Flag::SkipAlphaRarefaction,
            Flag::SkipAncom,
        ],
    },
    CascadeRule {
        name: "only_denoising",
        applies: |p, _| p.only_denoising,
        forces: DOWNSTREAM_OF_DENOISING,
    },
    CascadeRule {
        name: "taxonomy_skipped",
        applies: |_, skip| skip.contains(&Flag::SkipTaxonomy),
        forces: &[Flag::SkipBarplot, Flag::SkipAbundanceTables, Flag::SkipAncom],
    },
    CascadeRule {
        name: "artifact_without_metadata",
        applies: |p, _| p.qiime_archive.is_some() && p.metadata.is_none(),
        forces: &[
            Flag::SkipBarplot,
            Flag::SkipDiversityIndices,
            Flag::SkipAlphaRarefaction,
            Flag::SkipAncom,
        ],
    },
];


/// Effective flags for one run, plus the facts about the inputs that stage
/// predicates need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flags {
    pub raw_input: bool,
    pub has_metadata: bool,
    skipped: BTreeSet<Flag>,
    forced_by: BTreeMap<Flag, &'static str>,
}

impl Flags {
    pub fn skips(&self, flag: Flag) -> bool {
        self.skipped.contains(&flag)
    }

    pub fn runs(&self, flag: Flag) -> bool {
        !self.skips(flag)
    }

    /// Rule that forced the flag, if the user did not set it directly.
    pub fn forced_by(&self, flag: Flag) -> Option<&'static str> {
        self.forced_by.get(&flag).copied()
    }

    pub fn skipped(&self) -> impl Iterator<Item = Flag> + '_ {
        self.skipped.iter().copied()
    }

    /// (flag, value, origin) rows for reports.
    pub fn describe(&self) -> Vec<(Flag, bool, String)> {
        Flag::ALL
            .iter()
            .map(|f| {
                let origin = match (self.skips(*f), self.forced_by(*f)) {
                    (true, Some(rule)) => format!("forced by {}", rule),
                    (true, None) => "requested".to_string(),
                    (false, _) => "default".to_string(),
                };
                (*f, self.skips(*f), origin)
            })
            .collect()
    }
}


/// Applies the cascade table once over the requested skip flags.
///
/// # Arguments
///
/// * `params` - Validated parameter set.
///
/// # Returns
/// Flags
pub fn derive_flags(params: &ParamSet) -> Flags {
    let mut skipped: BTreeSet<Flag> = Flag::ALL
        .iter()
        .copied()
        .filter(|f| f.requested(params))
        .collect();
    let mut forced_by = BTreeMap::new();

    for rule in CASCADE_RULES {
        if !(rule.applies)(params, &skipped) {
            continue;
        }
        for flag in rule.forces {
            if skipped.insert(*flag) {
                debug!("{} forced by rule '{}'", flag, rule.name);
                forced_by.insert(*flag, rule.name);
            }
        }
    }

    Flags {
        raw_input: params.qiime_archive.is_none(),
        has_metadata: params.metadata.is_some(),
        skipped,
        forced_by,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn second_pass_is_noop(params: &ParamSet) -> bool {
        let flags = derive_flags(params);
        let skipped: BTreeSet<Flag> = flags.skipped().collect();
        CASCADE_RULES
            .iter()
            .filter(|r| (r.applies)(params, &skipped))
            .all(|r| r.forces.iter().all(|f| skipped.contains(f)))
    }

    #[test]
    fn test_defaults_skip_nothing() {
        let flags = derive_flags(&ParamSet::default());
        assert_eq!(flags.skipped().count(), 0);
        assert!(flags.raw_input);
    }

    #[test]
    fn test_artifact_disables_read_qc() {
        let params = ParamSet {
            qiime_archive: Some(PathBuf::from("demux.qza")),
            metadata: Some(PathBuf::from("meta.tsv")),
            ..Default::default()
        };
        let flags = derive_flags(&params);
        assert!(flags.skips(Flag::SkipFastqc));
        assert!(flags.skips(Flag::SkipMultiqc));
        assert_eq!(flags.forced_by(Flag::SkipFastqc), Some("pre_imported_artifact"));
        assert!(flags.runs(Flag::SkipDiversityIndices));
    }

    #[test]
    fn test_requested_flag_is_not_attributed_to_rule() {
        let params = ParamSet { skip_taxonomy: true, only_denoising: true, ..Default::default() };
        let flags = derive_flags(&params);
        assert!(flags.skips(Flag::SkipTaxonomy));
        assert_eq!(flags.forced_by(Flag::SkipTaxonomy), None);
        assert_eq!(flags.forced_by(Flag::SkipAncom), Some("only_denoising"));
    }

    #[test]
    fn test_skip_fastqc_cascades_to_multiqc() {
        let params = ParamSet { skip_fastqc: true, ..Default::default() };
        let flags = derive_flags(&params);
        assert!(flags.skips(Flag::SkipMultiqc));
        assert_eq!(flags.forced_by(Flag::SkipMultiqc), Some("multiqc_needs_fastqc"));
    }

    #[test]
    fn test_single_pass_reaches_fixed_point() {
        let cases = vec![
            ParamSet::default(),
            ParamSet { skip_taxonomy: true, ..Default::default() },
            ParamSet { only_denoising: true, ..Default::default() },
            ParamSet { until_q2_import: true, skip_fastqc: true, ..Default::default() },
            ParamSet { qiime_archive: Some(PathBuf::from("a.qza")), ..Default::default() },
        ];
        for params in &cases {
            assert!(second_pass_is_noop(params), "cascade not closed for {:?}", params);
        }
    }
}
