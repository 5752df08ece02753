// src/utils/system.rs: System functions

use std::time::Duration;

use anyhow::Result;
use sysinfo::{CpuRefreshKind, RefreshKind, System};
use tokio::time::sleep;


/// Determines number of cores that can be used for stage execution
///
/// # Arguments
///
/// * `args_threads` - Upper bound from the command line.
///
/// # Returns
///
/// Result<(usize, f32)> usable cores, current cpu usage
pub async fn detect_cores_and_load(args_threads: usize) -> Result<(usize, f32)> {
    let refresh_kind = RefreshKind::nothing().with_cpu(Default::default());
    let mut system = System::new_with_specifics(refresh_kind);
    system.refresh_cpu_all();
    let physical_cores = System::physical_core_count().unwrap_or(1);
    system.refresh_cpu_specifics(CpuRefreshKind::nothing().with_cpu_usage());
    sleep(Duration::from_millis(100)).await;
    let cpu_load = system.global_cpu_usage();
    let max_cores = physical_cores.min(args_threads).max(1);
    Ok((max_cores, cpu_load))
}


/// Computes how many stages may run at once and how many cpus each gets.
///
/// A busy machine (over 50% load) halves the stage fan-out. Every stage gets
/// an equal share of the cores, at least one.
///
/// # Arguments
///
/// * `max_cores` - Usable cores from detect_cores_and_load.
/// * `cpu_load` - Current load percentage.
/// * `requested` - Explicit --max-parallel, if any.
///
/// # Returns
///
/// (max_parallel, cpus_per_stage)
pub fn compute_stage_parallelism(max_cores: usize, cpu_load: f32, requested: Option<usize>) -> (usize, usize) {
    let max_cores = max_cores.max(1);
    let max_parallel = match requested {
        Some(n) => n.max(1),
        None if cpu_load > 50.0 => (max_cores / 2).max(1),
        None => max_cores,
    };
    let cpus_per_stage = (max_cores / max_parallel).max(1);
    (max_parallel, cpus_per_stage)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_stage_parallelism() {
        assert_eq!(compute_stage_parallelism(16, 10.0, None), (16, 1));
        assert_eq!(compute_stage_parallelism(16, 80.0, None), (8, 2));
        assert_eq!(compute_stage_parallelism(16, 10.0, Some(4)), (4, 4));
        assert_eq!(compute_stage_parallelism(0, 10.0, Some(0)), (1, 1));
        assert_eq!(compute_stage_parallelism(2, 90.0, Some(8)), (8, 1));
    }

    #[tokio::test]
    async fn test_detect_cores_respects_thread_cap() -> Result<()> {
        let (cores, _load) = detect_cores_and_load(1).await?;
        assert_eq!(cores, 1);
        Ok(())
    }
}
