// src/pipelines/summary.rs: Run summary record

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Local};
use serde::Serialize;
use crate::config::defs::{PipelineError, PIPELINE_INFO_DIR, RUN_SUMMARY_JSON};
use crate::config::params::ParamSet;
use crate::pipelines::executor::StageOutcome;
use crate::router::plan::Plan;
use crate::utils::file::ensure_dir;


#[derive(Debug, Clone, Serialize)]
pub struct FlagRecord {
    pub skipped: bool,
    pub origin: String,
}

/// Outcome of one invocation, written to `pipeline_info/run_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_name: String,
    pub start: DateTime<Local>,
    pub complete: Option<DateTime<Local>>,
    pub duration_secs: f64,
    pub success: bool,
    pub exit_status: i32,
    pub error_message: Option<String>,
    pub out_dir: PathBuf,
    pub branches: BTreeMap<String, String>,
    pub planned_stages: Vec<String>,
    pub completed_stages: Vec<String>,
    pub skipped_stages: Vec<String>,
    pub stage_seconds: BTreeMap<String, f64>,
    pub flags: BTreeMap<String, FlagRecord>,
    pub params: BTreeMap<String, String>,
}

impl RunSummary {
    pub fn new(run_name: &str, out_dir: &Path, params: &ParamSet) -> Self {
        RunSummary {
            run_name: run_name.to_string(),
            start: Local::now(),
            complete: None,
            duration_secs: 0.0,
            success: false,
            exit_status: 1,
            error_message: None,
            out_dir: out_dir.to_path_buf(),
            branches: BTreeMap::new(),
            planned_stages: Vec::new(),
            completed_stages: Vec::new(),
            skipped_stages: Vec::new(),
            stage_seconds: BTreeMap::new(),
            flags: BTreeMap::new(),
            params: params.to_pairs().into_iter().collect(),
        }
    }

    pub fn record_plan(&mut self, plan: &Plan) {
        self.branches = plan
            .branches
            .iter()
            .map(|(b, id)| (b.to_string(), id.to_string()))
            .collect();
        self.planned_stages = plan.stages.iter().map(|s| s.id.to_string()).collect();
        self.skipped_stages = plan.skipped.iter().map(|id| id.to_string()).collect();
        self.flags = plan
            .flags
            .describe()
            .into_iter()
            .map(|(flag, skipped, origin)| (flag.to_string(), FlagRecord { skipped, origin }))
            .collect();
    }

    /// Stamps completion time and outcome. Completed stages keep the order they finished in.
    pub fn finish(&mut self, completed: &[StageOutcome], error: Option<&PipelineError>) {
        let now = Local::now();
        self.completed_stages = completed.iter().map(|o| o.id.to_string()).collect();
        self.stage_seconds = completed
            .iter()
            .map(|o| (o.id.to_string(), o.elapsed.as_secs_f64()))
            .collect();
        self.duration_secs = (now - self.start).num_milliseconds() as f64 / 1000.0;
        self.complete = Some(now);
        self.success = error.is_none();
        self.exit_status = if self.success { 0 } else { 1 };
        self.error_message = error.map(|e| e.to_string());
    }

    /// Ordered (key, value) view for logging.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("runName".to_string(), self.run_name.clone()),
            ("start".to_string(), self.start.format("%Y-%m-%d %H:%M:%S").to_string()),
            (
                "complete".to_string(),
                self.complete
                    .map(|c| c.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            ("duration".to_string(), format!("{:.1}s", self.duration_secs)),
            ("success".to_string(), self.success.to_string()),
            ("exitStatus".to_string(), self.exit_status.to_string()),
            ("errorMessage".to_string(), self.error_message.clone().unwrap_or_else(|| "-".to_string())),
            ("outDir".to_string(), self.out_dir.display().to_string()),
            (
                "stages".to_string(),
                format!("{}/{} completed", self.completed_stages.len(), self.planned_stages.len()),
            ),
        ];
        for (branch, id) in &self.branches {
            pairs.push((format!("branch.{}", branch), id.clone()));
        }
        for (flag, record) in &self.flags {
            if record.skipped {
                pairs.push((format!("flag.{}", flag), record.origin.clone()));
            }
        }
        pairs
    }

    pub fn render_text(&self) -> String {
        let width = self.to_pairs().iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        let mut out = String::new();
        for (key, value) in self.to_pairs() {
            let _ = writeln!(out, "  {:<width$} : {}", key, value, width = width);
        }
        out
    }

    /// Writes the summary as pretty JSON under the run's pipeline_info directory.
    ///
    /// # Returns
    /// Path of the written file.
    pub fn write_json(&self) -> Result<PathBuf, PipelineError> {
        let dir = self.out_dir.join(PIPELINE_INFO_DIR);
        ensure_dir(&dir).map_err(|e| PipelineError::IOError(format!("{}: {}", dir.display(), e)))?;
        let path = dir.join(RUN_SUMMARY_JSON);
        let body = serde_json::to_string_pretty(self).map_err(|e| PipelineError::Other(e.into()))?;
        std::fs::write(&path, body).map_err(|e| PipelineError::IOError(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }
}
