// src/config/params.rs: Typed parameter schema

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::cli::Arguments;
use crate::config::defs::{PipelineError, DEFAULT_EXCLUDE_TAXA, DEFAULT_REFERENCE_DATABASE, DEFAULT_MIN_FREQUENCY, DEFAULT_MIN_SAMPLES, DEFAULT_TRUNC_QMIN};
use crate::utils::file::resolve_path;


/// The validated configuration that drives branch selection and
/// template rendering. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSet {
    pub reads: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub qiime_archive: Option<PathBuf>,
    pub classifier: Option<PathBuf>,
    pub reference_database: String,

    pub forward_primer: Option<String>,
    pub reverse_primer: Option<String>,
    pub retain_untrimmed: bool,

    pub trunclenf: Option<u32>,
    pub trunclenr: Option<u32>,
    pub trunc_qmin: u32,

    pub exclude_taxa: String,
    pub min_frequency: u32,
    pub min_samples: u32,
    pub metadata_category: Option<String>,

    pub until_q2_import: bool,
    pub only_denoising: bool,

    pub skip_fastqc: bool,
    pub skip_multiqc: bool,
    pub skip_taxonomy: bool,
    pub skip_barplot: bool,
    pub skip_abundance_tables: bool,
    pub skip_diversity_indices: bool,
    pub skip_alpha_rarefaction: bool,
    pub skip_ancom: bool,
}

impl Default for ParamSet {
    fn default() -> Self {
        ParamSet {
            reads: None,
            metadata: None,
            qiime_archive: None,
            classifier: None,
            reference_database: DEFAULT_REFERENCE_DATABASE.to_string(),
            forward_primer: None,
            reverse_primer: None,
            retain_untrimmed: false,
            trunclenf: None,
            trunclenr: None,
            trunc_qmin: DEFAULT_TRUNC_QMIN,
            exclude_taxa: DEFAULT_EXCLUDE_TAXA.to_string(),
            min_frequency: DEFAULT_MIN_FREQUENCY,
            min_samples: DEFAULT_MIN_SAMPLES,
            metadata_category: None,
            until_q2_import: false,
            only_denoising: false,
            skip_fastqc: false,
            skip_multiqc: false,
            skip_taxonomy: false,
            skip_barplot: false,
            skip_abundance_tables: false,
            skip_diversity_indices: false,
            skip_alpha_rarefaction: false,
            skip_ancom: false,
        }
    }
}


/// Mirror of `ParamSet` as it appears in a JSON params file. Every field is
/// optional so the file only has to name what it overrides.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamsFile {
    pub reads: Option<String>,
    pub metadata: Option<String>,
    pub qiime_archive: Option<String>,
    pub classifier: Option<String>,
    pub reference_database: Option<String>,
    pub forward_primer: Option<String>,
    pub reverse_primer: Option<String>,
    pub retain_untrimmed: Option<bool>,
    pub trunclenf: Option<u32>,
    pub trunclenr: Option<u32>,
    pub trunc_qmin: Option<u32>,
    pub exclude_taxa: Option<String>,
    pub min_frequency: Option<u32>,
    pub min_samples: Option<u32>,
    pub metadata_category: Option<String>,
    pub until_q2_import: Option<bool>,
    pub only_denoising: Option<bool>,
    pub skip_fastqc: Option<bool>,
    pub skip_multiqc: Option<bool>,
    pub skip_taxonomy: Option<bool>,
    pub skip_barplot: Option<bool>,
    pub skip_abundance_tables: Option<bool>,
    pub skip_diversity_indices: Option<bool>,
    pub skip_alpha_rarefaction: Option<bool>,
    pub skip_ancom: Option<bool>,
}

impl ParamsFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read params file {}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| anyhow!("Invalid params file {}: {}", path.display(), e))
    }
}


impl ParamSet {
    /// Builds the parameter set from the command line, merged over an optional
    /// params file, and validates it.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command-line arguments.
    /// * `cwd` - Directory that relative paths are resolved against.
    ///
    /// # Returns
    /// Result<ParamSet, PipelineError>
    pub fn from_arguments(args: &Arguments, cwd: &Path) -> Result<Self, PipelineError> {
        let file = match &args.params_file {
            Some(path) => ParamsFile::load(&resolve_path(Path::new(path), cwd))?,
            None => ParamsFile::default(),
        };
        Self::merge(args, file, cwd)
    }

    /// Command-line values win. Flags only override the file when set.
    pub fn merge(args: &Arguments, file: ParamsFile, cwd: &Path) -> Result<Self, PipelineError> {
        let path = |cli: &Option<String>, file: Option<String>| -> Option<PathBuf> {
            cli.clone().or(file).map(|p| resolve_path(Path::new(&p), cwd))
        };
        let flag = |cli: bool, file: Option<bool>| cli || file.unwrap_or(false);

        let params = ParamSet {
            reads: path(&args.reads, file.reads),
            metadata: path(&args.metadata, file.metadata),
            qiime_archive: path(&args.qiime_archive, file.qiime_archive),
            classifier: path(&args.classifier, file.classifier),
            reference_database: match args.reference_database.clone().or(file.reference_database) {
                Some(r) if is_remote(&r) => r,
                Some(r) => resolve_path(Path::new(&r), cwd).to_string_lossy().into_owned(),
                None => DEFAULT_REFERENCE_DATABASE.to_string(),
            },
            forward_primer: args.forward_primer.clone().or(file.forward_primer),
            reverse_primer: args.reverse_primer.clone().or(file.reverse_primer),
            retain_untrimmed: flag(args.retain_untrimmed, file.retain_untrimmed),
            trunclenf: args.trunclenf.or(file.trunclenf),
            trunclenr: args.trunclenr.or(file.trunclenr),
            trunc_qmin: args.trunc_qmin.or(file.trunc_qmin).unwrap_or(DEFAULT_TRUNC_QMIN),
            exclude_taxa: args
                .exclude_taxa
                .clone()
                .or(file.exclude_taxa)
                .unwrap_or_else(|| DEFAULT_EXCLUDE_TAXA.to_string()),
            min_frequency: args.min_frequency.or(file.min_frequency).unwrap_or(DEFAULT_MIN_FREQUENCY),
            min_samples: args.min_samples.or(file.min_samples).unwrap_or(DEFAULT_MIN_SAMPLES),
            metadata_category: args.metadata_category.clone().or(file.metadata_category),
            until_q2_import: flag(args.until_q2_import, file.until_q2_import),
            only_denoising: flag(args.only_denoising, file.only_denoising),
            skip_fastqc: flag(args.skip_fastqc, file.skip_fastqc),
            skip_multiqc: flag(args.skip_multiqc, file.skip_multiqc),
            skip_taxonomy: flag(args.skip_taxonomy, file.skip_taxonomy),
            skip_barplot: flag(args.skip_barplot, file.skip_barplot),
            skip_abundance_tables: flag(args.skip_abundance_tables, file.skip_abundance_tables),
            skip_diversity_indices: flag(args.skip_diversity_indices, file.skip_diversity_indices),
            skip_alpha_rarefaction: flag(args.skip_alpha_rarefaction, file.skip_alpha_rarefaction),
            skip_ancom: flag(args.skip_ancom, file.skip_ancom),
        };
        params.validate()?;
        Ok(params)
    }

    /// Value-level checks that do not depend on which branches get selected.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.exclude_taxa.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "exclude_taxa must be 'none' or a comma-separated list of taxa".to_string(),
            ));
        }
        for (name, value) in [("trunclenf", self.trunclenf), ("trunclenr", self.trunclenr)] {
            if value == Some(0) {
                return Err(PipelineError::Configuration(format!("{} must be greater than zero", name)));
            }
        }
        if self.min_samples == 0 {
            return Err(PipelineError::Configuration("min_samples must be at least 1".to_string()));
        }
        for (name, primer) in [("forward_primer", &self.forward_primer), ("reverse_primer", &self.reverse_primer)] {
            if let Some(p) = primer {
                if p.is_empty() || !p.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(PipelineError::Configuration(format!(
                        "{} '{}' is not an IUPAC nucleotide sequence",
                        name, p
                    )));
                }
            }
        }
        if self.until_q2_import && self.qiime_archive.is_some() {
            return Err(PipelineError::Configuration(
                "until_q2_import has nothing to do when a pre-imported artifact is supplied".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether min_frequency or min_samples asks for more than the no-op threshold.
    pub fn filters_abundance(&self) -> bool {
        self.min_frequency > DEFAULT_MIN_FREQUENCY || self.min_samples > DEFAULT_MIN_SAMPLES
    }

    /// Checks that every supplied input path exists. Run before execution only,
    /// planning works on paths that are not present yet.
    pub fn check_input_paths(&self) -> Result<(), PipelineError> {
        let inputs = [
            ("reads", &self.reads),
            ("metadata", &self.metadata),
            ("qiime_archive", &self.qiime_archive),
            ("classifier", &self.classifier),
        ];
        for (name, path) in inputs {
            if let Some(p) = path {
                if !p.exists() {
                    return Err(PipelineError::Configuration(format!(
                        "{} path does not exist: {}",
                        name,
                        p.display()
                    )));
                }
            }
        }
        if !is_remote(&self.reference_database) && !Path::new(&self.reference_database).exists() {
            return Err(PipelineError::Configuration(format!(
                "reference_database path does not exist: {}",
                self.reference_database
            )));
        }
        Ok(())
    }

    /// Looks up a parameter by its schema name, rendered as a string.
    /// Unset optional values yield `None`, unknown names an error.
    pub fn lookup(&self, name: &str) -> Result<Option<String>, PipelineError> {
        let value = serde_json::to_value(self).map_err(|e| PipelineError::Other(e.into()))?;
        let field = value
            .get(name)
            .ok_or_else(|| PipelineError::Configuration(format!("Unknown parameter '{}'", name)))?;
        Ok(match field {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    }

    /// Parameters as ordered (name, value) pairs for the run summary.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => {
                let mut pairs: Vec<(String, String)> = map
                    .into_iter()
                    .map(|(k, v)| {
                        let rendered = match v {
                            Value::Null => "-".to_string(),
                            Value::String(s) => s,
                            other => other.to_string(),
                        };
                        (k, rendered)
                    })
                    .collect();
                pairs.sort();
                pairs
            }
            _ => Vec::new(),
        }
    }
}


fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_overrides_params_file() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, r#"{{"exclude_taxa": "none", "trunclenf": 200, "skip_ancom": true, "classifier": "file.qza"}}"#)?;
        tmp.flush()?;

        let args = Arguments {
            params_file: Some(tmp.path().to_string_lossy().into_owned()),
            exclude_taxa: Some("mitochondria".to_string()),
            ..Default::default()
        };
        let params = ParamSet::from_arguments(&args, Path::new("/data"))?;
        assert_eq!(params.exclude_taxa, "mitochondria");
        assert_eq!(params.trunclenf, Some(200));
        assert!(params.skip_ancom);
        assert_eq!(params.classifier, Some(PathBuf::from("/data/file.qza")));
        Ok(())
    }

    #[test]
    fn test_unknown_params_file_key_rejected() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, r#"{{"onlyDenoising": true}}"#)?;
        tmp.flush()?;
        assert!(ParamsFile::load(tmp.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let params = ParamSet { trunclenf: Some(0), ..Default::default() };
        assert!(matches!(params.validate(), Err(PipelineError::Configuration(_))));

        let params = ParamSet { forward_primer: Some("GTG-CCA".to_string()), ..Default::default() };
        assert!(matches!(params.validate(), Err(PipelineError::Configuration(_))));

        let params = ParamSet { exclude_taxa: "  ".to_string(), ..Default::default() };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_lookup_renders_values() -> anyhow::Result<()> {
        let params = ParamSet { trunclenf: Some(230), forward_primer: Some("GTGCCAGC".to_string()), ..Default::default() };
        assert_eq!(params.lookup("trunclenf")?, Some("230".to_string()));
        assert_eq!(params.lookup("forward_primer")?, Some("GTGCCAGC".to_string()));
        assert_eq!(params.lookup("retain_untrimmed")?, Some("false".to_string()));
        assert_eq!(params.lookup("trunclenr")?, None);
        assert!(params.lookup("no_such_param").is_err());
        Ok(())
    }
}
