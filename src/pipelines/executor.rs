// src/pipelines/executor.rs: Dataflow execution of a stage plan

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use log::{debug, error, info, warn};
use tokio::process::Command;
use tokio::task::JoinSet;
use crate::config::defs::{PipelineError, RunConfig, SHELL_TAG, STAGE_ERR, STAGE_LOG, STAGE_SCRIPT, STDERR_TAIL_LINES};
use crate::config::params::ParamSet;
use crate::router::plan::Plan;
use crate::router::stage::{ChannelName, Stage, StageId};
use crate::utils::command::{render_template, ProcessGroupGuard, TemplateContext};
use crate::utils::streams::{read_child_output_to_vec, spawn_output_collector, tail_lines, ChildStream};


/// A stage with its script rendered and its channel paths fixed.
#[derive(Debug, Clone)]
pub struct PreparedStage {
    pub stage: Stage,
    pub work_dir: PathBuf,
    pub script: String,
    pub outputs: HashMap<ChannelName, PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub id: StageId,
    pub elapsed: Duration,
    pub outputs: HashMap<ChannelName, PathBuf>,
}

/// What happened to a run: the stages that finished, and the first error if any.
#[derive(Debug)]
pub struct ExecutionReport {
    pub completed: Vec<StageOutcome>,
    pub error: Option<PipelineError>,
}

impl ExecutionReport {
    pub fn completed_ids(&self) -> Vec<StageId> {
        self.completed.iter().map(|o| o.id).collect()
    }

    pub fn into_result(self) -> Result<Vec<StageOutcome>, PipelineError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.completed),
        }
    }
}


/// Path of every channel in the plan: seeded channels point at user inputs,
/// produced channels at `<out_dir>/<stage_dir>/<file>`.
///
/// # Arguments
///
/// * `plan` - Ordered plan.
/// * `params` - Parameter set holding the seeded input paths.
/// * `out_dir` - Root of the run's outputs.
///
/// # Returns
/// HashMap<ChannelName, PathBuf>
pub fn channel_paths(plan: &Plan, params: &ParamSet, out_dir: &Path) -> Result<HashMap<ChannelName, PathBuf>, PipelineError> {
    let mut paths = HashMap::new();
    for channel in &plan.seeded {
        let path = match channel {
            ChannelName::Reads => params.reads.clone(),
            ChannelName::Metadata => params.metadata.clone(),
            _ => None,
        }
        .ok_or_else(|| PipelineError::Configuration(format!("No input path for seeded channel '{}'", channel)))?;
        paths.insert(*channel, path);
    }
    for stage in &plan.stages {
        for channel in &stage.outputs {
            paths.insert(*channel, out_dir.join(stage.dir_name()).join(channel.file_name()));
        }
    }
    Ok(paths)
}


/// Renders every stage script up front, so a template error stops the run
/// before any tool is invoked.
pub fn prepare_stages(config: &RunConfig, plan: &Plan) -> Result<Vec<PreparedStage>, PipelineError> {
    let paths = channel_paths(plan, &config.params, &config.out_dir)?;
    let lookup = |channels: &[ChannelName]| -> HashMap<ChannelName, PathBuf> {
        channels
            .iter()
            .filter_map(|c| paths.get(c).map(|p| (*c, p.clone())))
            .collect()
    };

    plan.stages
        .iter()
        .map(|stage| {
            let inputs = lookup(&stage.inputs);
            let outputs = lookup(&stage.outputs);
            let ctx = TemplateContext {
                stage: stage.id,
                inputs: &inputs,
                outputs: &outputs,
                params: &config.params,
                cpus: config.cpus_per_stage,
            };
            let script = render_template(&stage.template, &ctx)?;
            Ok(PreparedStage {
                stage: stage.clone(),
                work_dir: config.out_dir.join(stage.dir_name()),
                script,
                outputs,
            })
        })
        .collect()
}


/// Renders and runs a plan.
pub async fn execute_plan(config: Arc<RunConfig>, plan: &Plan) -> ExecutionReport {
    match prepare_stages(&config, plan) {
        Ok(prepared) => execute_prepared(config, prepared, &plan.seeded).await,
        Err(e) => ExecutionReport { completed: Vec::new(), error: Some(e) },
    }
}


/// Runs prepared stages as their inputs become available. At most
/// `config.max_parallel` stages hold a permit at once. The first failure
/// aborts everything still in flight.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
/// * `prepared` - Stages in plan order.
/// * `seeded` - Channels available before any stage runs.
///
/// # Returns
/// ExecutionReport
pub async fn execute_prepared(
    config: Arc<RunConfig>,
    prepared: Vec<PreparedStage>,
    seeded: &[ChannelName],
) -> ExecutionReport {
    let mut pending: Vec<Option<PreparedStage>> = prepared.into_iter().map(Some).collect();
    let mut resolved: HashSet<ChannelName> = seeded.iter().copied().collect();
    let mut completed = Vec::new();
    let mut failure: Option<PipelineError> = None;
    let mut tasks: JoinSet<Result<StageOutcome, PipelineError>> = JoinSet::new();

    loop {
        for slot in pending.iter_mut() {
            let ready = slot
                .as_ref()
                .is_some_and(|p| p.stage.inputs.iter().all(|c| resolved.contains(c)));
            if !ready {
                continue;
            }
            if let Some(stage) = slot.take() {
                let config = config.clone();
                tasks.spawn(async move {
                    let _permit = config
                        .stage_semaphore
                        .clone()
                        .acquire_owned()
                        .await
                        .map_err(|e| PipelineError::Other(e.into()))?;
                    run_stage(&config, stage).await
                });
            }
        }

        match tasks.join_next().await {
            None => break,
            Some(Ok(Ok(outcome))) => {
                resolved.extend(outcome.outputs.keys().copied());
                completed.push(outcome);
            }
            Some(Ok(Err(e))) => {
                failure = Some(e);
                break;
            }
            Some(Err(join_err)) => {
                failure = Some(PipelineError::Other(join_err.into()));
                break;
            }
        }
    }

    if failure.is_some() && !tasks.is_empty() {
        warn!("Aborting {} in-flight stage(s)", tasks.len());
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
    }

    if failure.is_none() {
        if let Some(stuck) = pending.iter().flatten().next() {
            let channel = stuck
                .stage
                .inputs
                .iter()
                .find(|c| !resolved.contains(c))
                .map(|c| c.to_string())
                .unwrap_or_default();
            failure = Some(PipelineError::UnsatisfiedChannel {
                stage: stuck.stage.id.to_string(),
                channel,
            });
        }
    }

    if let Some(e) = &failure {
        error!("Run stopped after {} completed stage(s): {}", completed.len(), e);
    }
    ExecutionReport { completed, error: failure }
}


async fn run_stage(config: &RunConfig, prepared: PreparedStage) -> Result<StageOutcome, PipelineError> {
    let start = Instant::now();
    let id = prepared.stage.id;
    info!("[{}] started", id);

    tokio::fs::create_dir_all(&prepared.work_dir)
        .await
        .map_err(|e| PipelineError::IOError(format!("{}: {}", prepared.work_dir.display(), e)))?;
    let script_path = prepared.work_dir.join(STAGE_SCRIPT);
    tokio::fs::write(&script_path, &prepared.script)
        .await
        .map_err(|e| PipelineError::IOError(format!("{}: {}", script_path.display(), e)))?;

    if config.stub {
        stub_outputs(&prepared.outputs).await?;
    } else {
        invoke_script(&prepared, &script_path).await?;
        let missing: Vec<String> = prepared
            .outputs
            .iter()
            .filter(|(_, p)| !p.exists())
            .map(|(c, _)| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::ExternalTool {
                tool: prepared.stage.tool.to_string(),
                stage: id.to_string(),
                status: "exit status: 0".to_string(),
                stderr: format!("declared output(s) not produced: {}", missing.join(", ")),
            });
        }
    }

    let elapsed = start.elapsed();
    info!("[{}] completed in {:.1}s", id, elapsed.as_secs_f64());
    Ok(StageOutcome { id, elapsed, outputs: prepared.outputs })
}


async fn invoke_script(prepared: &PreparedStage, script_path: &Path) -> Result<(), PipelineError> {
    let stage = &prepared.stage;
    let tool_error = |status: String, stderr: String| PipelineError::ExternalTool {
        tool: stage.tool.to_string(),
        stage: stage.id.to_string(),
        status,
        stderr,
    };

    let mut child = Command::new(SHELL_TAG)
        .args(["-e", "-o", "pipefail"])
        .arg(script_path)
        .current_dir(&prepared.work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| tool_error("spawn failed".to_string(), e.to_string()))?;
    let mut group = ProcessGroupGuard::new(&child);

    let err_task = spawn_output_collector(&mut child, ChildStream::Stderr)
        .map_err(PipelineError::Other)?;
    let stdout_lines = read_child_output_to_vec(&mut child, ChildStream::Stdout)
        .await
        .map_err(PipelineError::Other)?;
    let stderr_lines = err_task
        .await
        .map_err(|e| PipelineError::Other(e.into()))?
        .map_err(PipelineError::Other)?;
    let status = child
        .wait()
        .await
        .map_err(|e| PipelineError::IOError(e.to_string()))?;

    write_lines(&prepared.work_dir.join(STAGE_LOG), &stdout_lines).await?;
    write_lines(&prepared.work_dir.join(STAGE_ERR), &stderr_lines).await?;
    debug!("[{}] {} stdout line(s), {} stderr line(s)", stage.id, stdout_lines.len(), stderr_lines.len());

    if !status.success() {
        return Err(tool_error(status.to_string(), tail_lines(&stderr_lines, STDERR_TAIL_LINES)));
    }
    group.disarm();
    Ok(())
}


/// Placeholder outputs for rehearsal runs: directories for extension-less
/// channel files, empty files otherwise.
async fn stub_outputs(outputs: &HashMap<ChannelName, PathBuf>) -> Result<(), PipelineError> {
    for path in outputs.values() {
        let result = if path.extension().is_some() {
            tokio::fs::write(path, b"").await
        } else {
            tokio::fs::create_dir_all(path).await
        };
        result.map_err(|e| PipelineError::IOError(format!("{}: {}", path.display(), e)))?;
    }
    Ok(())
}

async fn write_lines(path: &Path, lines: &[String]) -> Result<(), PipelineError> {
    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    tokio::fs::write(path, body)
        .await
        .map_err(|e| PipelineError::IOError(format!("{}: {}", path.display(), e)))
}
