// src/router/plan.rs: Enabled stage selection and deterministic ordering

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use log::{debug, info};
use crate::config::defs::PipelineError;
use crate::config::params::ParamSet;
use crate::router::branch::{branch_active, resolve_branch};
use crate::router::catalog::catalog;
use crate::router::flags::{derive_flags, Flags};
use crate::router::stage::{Branch, ChannelName, Stage, StageId};

/// Producer name reported for channels fed straight from parameters.
pub const PARAMS_PRODUCER: &str = "params";


#[derive(Debug, Clone)]
pub struct Plan {
    pub flags: Flags,
    pub branches: BTreeMap<Branch, StageId>,
    pub seeded: Vec<ChannelName>,
    pub stages: Vec<Stage>,
    pub skipped: Vec<StageId>,
}

impl Plan {
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.id).collect()
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.stages.iter().any(|s| s.id == id)
    }

    pub fn position(&self, id: StageId) -> Option<usize> {
        self.stages.iter().position(|s| s.id == id)
    }

    /// Distinct external tools, in first-use order.
    pub fn tools(&self) -> Vec<&'static str> {
        let mut seen = BTreeSet::new();
        self.stages
            .iter()
            .map(|s| s.tool)
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Human-readable table of the plan.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Branches:");
        for (branch, id) in &self.branches {
            let _ = writeln!(out, "  {:<12} -> {}", branch, id);
        }
        let _ = writeln!(out, "Stages:");
        for (i, stage) in self.stages.iter().enumerate() {
            let inputs: Vec<&str> = stage.inputs.iter().map(|c| c.as_str()).collect();
            let outputs: Vec<&str> = stage.outputs.iter().map(|c| c.as_str()).collect();
            let _ = writeln!(
                out,
                "  {:>2}. {:<28} [{}] -> [{}]",
                i + 1,
                stage.id,
                inputs.join(", "),
                outputs.join(", ")
            );
        }
        if !self.skipped.is_empty() {
            let skipped: Vec<&str> = self.skipped.iter().map(|s| s.as_str()).collect();
            let _ = writeln!(out, "Skipped: {}", skipped.join(", "));
        }
        out
    }
}


/// Channels whose values come from the parameter set rather than a stage.
pub fn seeded_channels(params: &ParamSet) -> Vec<ChannelName> {
    let mut seeded = Vec::new();
    if params.qiime_archive.is_none() && params.reads.is_some() {
        seeded.push(ChannelName::Reads);
    }
    if params.metadata.is_some() {
        seeded.push(ChannelName::Metadata);
    }
    seeded
}


/// Builds the ordered execution plan for a parameter set.
///
/// # Arguments
///
/// * `params` - Validated parameter set.
///
/// # Returns
/// Plan with stages topologically ordered, ties broken by catalog order.
pub fn build_plan(params: &ParamSet) -> Result<Plan, PipelineError> {
    let flags = derive_flags(params);

    let mut branches = BTreeMap::new();
    for branch in Branch::ALL {
        if branch_active(&flags, branch) {
            branches.insert(branch, resolve_branch(params, &flags, branch)?);
        }
    }

    let mut enabled = Vec::new();
    let mut skipped = Vec::new();
    for stage in catalog() {
        let selected = match stage.branch {
            Some(branch) => branches.get(&branch) == Some(&stage.id),
            None => true,
        };
        if selected && (stage.enabled)(&flags) {
            enabled.push(stage);
        } else {
            skipped.push(stage.id);
        }
    }

    let seeded = seeded_channels(params);
    let stages = order_stages(enabled, &seeded)?;
    info!(
        "Planned {} stages ({} skipped): {}",
        stages.len(),
        skipped.len(),
        stages.iter().map(|s| s.id.as_str()).collect::<Vec<_>>().join(" -> ")
    );

    Ok(Plan { flags, branches, seeded, stages, skipped })
}


/// Checks producer/consumer balance and orders stages with Kahn's algorithm.
/// Among ready stages the one listed first in `stages` goes first.
///
/// # Arguments
///
/// * `stages` - Enabled stages in catalog order.
/// * `seeded` - Channels already available before any stage runs.
///
/// # Returns
/// Result<Vec<Stage>, PipelineError>
pub fn order_stages(stages: Vec<Stage>, seeded: &[ChannelName]) -> Result<Vec<Stage>, PipelineError> {
    // None marks a seeded channel
    let mut producers: HashMap<ChannelName, Option<usize>> = seeded.iter().map(|c| (*c, None)).collect();
    for (idx, stage) in stages.iter().enumerate() {
        for channel in &stage.outputs {
            if let Some(existing) = producers.insert(*channel, Some(idx)) {
                let first = match existing {
                    Some(i) => stages[i].id.to_string(),
                    None => PARAMS_PRODUCER.to_string(),
                };
                return Err(PipelineError::DuplicateProducer {
                    channel: channel.to_string(),
                    first,
                    second: stage.id.to_string(),
                });
            }
        }
    }

    let mut in_degree = vec![0usize; stages.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); stages.len()];
    for (idx, stage) in stages.iter().enumerate() {
        let mut upstream = BTreeSet::new();
        for channel in &stage.inputs {
            match producers.get(channel) {
                Some(Some(producer)) => {
                    upstream.insert(*producer);
                }
                Some(None) => {}
                None => {
                    return Err(PipelineError::UnsatisfiedChannel {
                        stage: stage.id.to_string(),
                        channel: channel.to_string(),
                    });
                }
            }
        }
        in_degree[idx] = upstream.len();
        for producer in upstream {
            dependents[producer].push(idx);
        }
    }

    let mut ready: BTreeSet<usize> = (0..stages.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut order = Vec::with_capacity(stages.len());
    while let Some(idx) = ready.pop_first() {
        order.push(idx);
        for &dependent in &dependents[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != stages.len() {
        let placed: BTreeSet<usize> = order.iter().copied().collect();
        let cycle: Vec<String> = (0..stages.len())
            .filter(|i| !placed.contains(i))
            .map(|i| stages[i].id.to_string())
            .collect();
        return Err(PipelineError::CyclicDependency(cycle));
    }

    debug!("Topological order: {:?}", order);
    let mut slots: Vec<Option<Stage>> = stages.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
