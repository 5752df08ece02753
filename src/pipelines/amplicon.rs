// src/pipelines/amplicon.rs: Amplicon workflow entry points

use std::sync::Arc;
use log::{error, info, warn};
use crate::config::defs::{PipelineError, RunConfig};
use crate::pipelines::executor::{execute_prepared, prepare_stages, ExecutionReport};
use crate::pipelines::summary::RunSummary;
use crate::router::flags::derive_flags;
use crate::router::plan::{build_plan, Plan};
use crate::utils::command::check_versions;


/// Builds and prints the ordered plan without running anything.
pub async fn plan(config: Arc<RunConfig>) -> Result<Plan, PipelineError> {
    let plan = build_plan(&config.params)?;
    println!("{}", plan.render());
    Ok(plan)
}


/// Prints each derived flag with the rule that set it.
pub async fn flags(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let flags = derive_flags(&config.params);
    for (flag, skipped, origin) in flags.describe() {
        println!("{:<20} {:<5} ({})", flag, skipped, origin);
    }
    Ok(())
}


/// Plans, checks tools, executes, and always writes the run summary.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// RunSummary on success, the first error otherwise.
pub async fn run(config: Arc<RunConfig>) -> Result<RunSummary, PipelineError> {
    let mut summary = RunSummary::new(&config.run_name, &config.out_dir, &config.params);

    let report = match prepare_run(config.clone(), &mut summary).await {
        Ok(report) => report,
        Err(e) => ExecutionReport { completed: Vec::new(), error: Some(e) },
    };
    summary.finish(&report.completed, report.error.as_ref());

    match summary.write_json() {
        Ok(path) => info!("Run summary written to {}", path.display()),
        Err(e) => warn!("Could not write run summary: {}", e),
    }
    info!("Run summary:\n{}", summary.render_text());

    match report.error {
        Some(e) => {
            error!("Run '{}' failed", config.run_name);
            Err(e)
        }
        None => Ok(summary),
    }
}


async fn prepare_run(config: Arc<RunConfig>, summary: &mut RunSummary) -> Result<ExecutionReport, PipelineError> {
    if !config.stub {
        config.params.check_input_paths()?;
    }

    let plan = build_plan(&config.params)?;
    summary.record_plan(&plan);
    let prepared = prepare_stages(&config, &plan)?;

    if config.stub {
        info!("Stub profile: writing placeholder outputs, no tools will be invoked");
    } else if config.args.skip_tool_check {
        warn!("Skipping external tool check");
    } else {
        let versions = check_versions(plan.tools()).await?;
        for (tool, version) in &versions {
            info!("{}: {}", tool, version);
        }
    }

    info!(
        "Executing {} stages with up to {} in parallel, {} cpus each",
        prepared.len(),
        config.max_parallel,
        config.cpus_per_stage
    );
    Ok(execute_prepared(config.clone(), prepared, &plan.seeded).await)
}
