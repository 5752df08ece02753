mod cli;
mod config;
mod pipelines;
mod router;
mod utils;

use std::env;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{debug, error, info, LevelFilter};
use tokio::sync::Semaphore;
use crate::cli::{parse, Arguments, Module, Profile};
use crate::config::defs::{PipelineError, RunConfig};
use crate::config::params::ParamSet;
use crate::utils::file::{ensure_dir, resolve_path};
use crate::utils::system::{compute_stage_parallelism, detect_cores_and_load};
use pipelines::amplicon;


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n Amplicon Router\n-------------\n");

    let dir = env::current_dir()?;
    info!("The current directory is {:?}\n", dir);

    let module = args.module.clone();
    let run_config = match build_run_config(args, &dir, log_level).await {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = match module {
        Module::Plan => amplicon::plan(run_config).await.map(|_| ()),
        Module::Flags => amplicon::flags(run_config).await,
        Module::Run => amplicon::run(run_config).await.map(|_| ()),
    } {
        error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
        std::process::exit(1);
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}


/// Resolves parameters, output directory and stage parallelism into the
/// shared RunConfig.
///
/// # Arguments
/// * `args` - The parsed command-line arguments.
/// * `cwd` - The current working directory.
/// * `log_level` - Level chosen from --verbose.
/// # Returns
/// RunConfig
async fn build_run_config(args: Arguments, cwd: &Path, log_level: LevelFilter) -> Result<RunConfig, PipelineError> {
    let params = ParamSet::from_arguments(&args, cwd)?;

    let (max_cores, cpu_load) = detect_cores_and_load(args.threads).await?;
    let (max_parallel, cpus_per_stage) = compute_stage_parallelism(max_cores, cpu_load, args.max_parallel);
    debug!(
        "Detected {} usable cores; CPU load {}%; {} parallel stages with {} cpus each",
        max_cores, cpu_load, max_parallel, cpus_per_stage
    );

    let out_dir = resolve_path(Path::new(&args.outdir), cwd);
    if args.module == Module::Run {
        ensure_dir(&out_dir).map_err(|e| PipelineError::IOError(format!("{}: {}", out_dir.display(), e)))?;
    }

    let run_name = args
        .run_name
        .clone()
        .unwrap_or_else(|| format!("amplicon_{}", chrono::Local::now().format("%Y%m%d_%H%M%S")));

    Ok(RunConfig {
        cwd: cwd.to_path_buf(),
        out_dir,
        run_name,
        stub: args.profile == Profile::Stub,
        params,
        args,
        stage_semaphore: Arc::new(Semaphore::new(max_parallel)),
        max_parallel,
        cpus_per_stage,
        log_level,
    })
}
