/// Functions and structs for rendering stage scripts and probing external tools

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use anyhow::{anyhow, Result};
use futures::future::try_join_all;
use log::{debug, info};
use tokio::process::{Child, Command};
use crate::config::defs::{PipelineError, TOOL_VERSION_ARGS};
use crate::config::params::ParamSet;
use crate::router::stage::{ChannelName, StageId};
use crate::utils::streams::{read_child_output_to_vec, spawn_output_collector, ChildStream};


/// Everything a template may refer to for one stage.
pub struct TemplateContext<'a> {
    pub stage: StageId,
    pub inputs: &'a HashMap<ChannelName, PathBuf>,
    pub outputs: &'a HashMap<ChannelName, PathBuf>,
    pub params: &'a ParamSet,
    pub cpus: usize,
}


/// Substitutes `${in:..}`, `${out:..}`, `${param:..}` and `${task.cpus}`.
/// Paths and parameter values are inserted as single shell words.
/// Any other `${..}` is left alone for bash.
///
/// # Arguments
///
/// * `template` - Script body from the stage catalog.
/// * `ctx` - Channel paths and parameters for the stage.
///
/// # Returns
/// Rendered script, or a ConfigurationError naming the bad placeholder.
pub fn render_template(template: &str, ctx: &TemplateContext) -> Result<String, PipelineError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            rendered.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let key = &after[..end];
        match substitute(key, ctx)? {
            Some(value) => rendered.push_str(&value),
            None => {
                rendered.push_str("${");
                rendered.push_str(key);
                rendered.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

fn substitute(key: &str, ctx: &TemplateContext) -> Result<Option<String>, PipelineError> {
    let bad = |msg: String| PipelineError::Configuration(format!("Stage {}: {}", ctx.stage, msg));

    if let Some(name) = key.strip_prefix("in:") {
        let channel = ChannelName::from_name(name).ok_or_else(|| bad(format!("unknown channel '{}'", name)))?;
        let path = ctx
            .inputs
            .get(&channel)
            .ok_or_else(|| bad(format!("template reads '{}' which the stage does not consume", name)))?;
        return Ok(Some(shell_quote(&path.to_string_lossy())));
    }
    if let Some(name) = key.strip_prefix("out:") {
        let channel = ChannelName::from_name(name).ok_or_else(|| bad(format!("unknown channel '{}'", name)))?;
        let path = ctx
            .outputs
            .get(&channel)
            .ok_or_else(|| bad(format!("template writes '{}' which the stage does not produce", name)))?;
        return Ok(Some(shell_quote(&path.to_string_lossy())));
    }
    if let Some(name) = key.strip_prefix("param:") {
        let value = ctx.params.lookup(name).map_err(|e| bad(e.to_string()))?;
        return Ok(Some(shell_quote(&value.unwrap_or_default())));
    }
    if key == "task.cpus" {
        return Ok(Some(ctx.cpus.to_string()));
    }
    if key.starts_with("task.") {
        return Err(bad(format!("unknown task attribute '{}'", key)));
    }
    Ok(None)
}

/// Single-quotes a word for bash unless it is made only of safe characters.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-:,+=@%".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}


/// Sends SIGKILL to a child's whole process group when dropped, so tools a
/// stage script started die with it. The child must have been spawned with
/// `process_group(0)`.
pub struct ProcessGroupGuard {
    pgid: Option<i32>,
}

impl ProcessGroupGuard {
    pub fn new(child: &Child) -> Self {
        ProcessGroupGuard { pgid: child.id().and_then(|pid| i32::try_from(pid).ok()) }
    }

    /// Leaves the group alone on drop.
    pub fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            // SAFETY: killpg takes no pointers; ESRCH for an empty group is ignored.
            let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
            if rc == 0 {
                debug!("Killed process group {}", pgid);
            }
        }
    }
}


/// Runs `<tool> <version args>` and returns the first non-empty line of output.
pub async fn check_version(tool: &str) -> Result<String> {
    let args: Vec<&str> = TOOL_VERSION_ARGS
        .get(tool)
        .cloned()
        .unwrap_or_else(|| vec!["--version"]);

    let mut child = Command::new(tool)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| anyhow!("Failed to spawn {}: {}. Is {} installed?", tool, e, tool))?;

    let err_task = spawn_output_collector(&mut child, ChildStream::Stderr)?;
    let stdout_lines = read_child_output_to_vec(&mut child, ChildStream::Stdout).await?;
    let stderr_lines = err_task.await??;
    let status = child.wait().await?;
    if !status.success() {
        return Err(anyhow!("{} {} exited with {}", tool, args.join(" "), status));
    }

    // Some tools print their version on stderr
    let version = stdout_lines
        .iter()
        .chain(stderr_lines.iter())
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .ok_or_else(|| anyhow!("No output from {} {}", tool, args.join(" ")))?
        .to_string();
    Ok(version)
}


/// Probes every tool concurrently. Fails on the first missing tool.
pub async fn check_versions(tools: Vec<&str>) -> Result<Vec<(String, String)>, PipelineError> {
    let probes = tools.into_iter().map(|tool| async move {
        let version = check_version(tool).await.map_err(|e| PipelineError::ToolUnavailable {
            tool: tool.to_string(),
            error: e.to_string(),
        })?;
        debug!("{}: {}", tool, version);
        Ok::<_, PipelineError>((tool.to_string(), version))
    });
    let versions = try_join_all(probes).await?;
    info!("Verified {} external tools", versions.len());
    Ok(versions)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_maps() -> (HashMap<ChannelName, PathBuf>, HashMap<ChannelName, PathBuf>) {
        let inputs = HashMap::from([(ChannelName::RawTable, PathBuf::from("/out/dada_denoise/raw_table.qza"))]);
        let outputs = HashMap::from([(ChannelName::Table, PathBuf::from("/out/my dir/table.qza"))]);
        (inputs, outputs)
    }

    #[test]
    fn test_render_substitutes_known_placeholders() -> Result<()> {
        let (inputs, outputs) = ctx_maps();
        let params = ParamSet { min_samples: 3, ..Default::default() };
        let ctx = TemplateContext { stage: StageId::PassThroughTaxa, inputs: &inputs, outputs: &outputs, params: &params, cpus: 4 };
        let script = render_template(
            "cp ${in:raw_table} ${out:table} --n ${param:min_samples} -t ${task.cpus} ${param:metadata_category}|",
            &ctx,
        )?;
        assert_eq!(
            script,
            "cp /out/dada_denoise/raw_table.qza '/out/my dir/table.qza' --n 3 -t 4 ''|"
        );
        Ok(())
    }

    #[test]
    fn test_render_quotes_hostile_param_paths() -> Result<()> {
        let (inputs, outputs) = ctx_maps();
        let params = ParamSet {
            classifier: Some(PathBuf::from("/data/it's \"$(touch pwned)\" `id`.qza")),
            ..Default::default()
        };
        let ctx = TemplateContext { stage: StageId::LoadClassifier, inputs: &inputs, outputs: &outputs, params: &params, cpus: 1 };
        let script = render_template("cp ${param:classifier} dest", &ctx)?;
        assert_eq!(script, r#"cp '/data/it'\''s "$(touch pwned)" `id`.qza' dest"#);
        Ok(())
    }

    #[test]
    fn test_render_leaves_bash_expansions() -> Result<()> {
        let (inputs, outputs) = ctx_maps();
        let params = ParamSet::default();
        let ctx = TemplateContext { stage: StageId::PassThroughTaxa, inputs: &inputs, outputs: &outputs, params: &params, cpus: 1 };
        let script = render_template(r#"for c in "${categories[@]}"; do echo "${c/_R1_/_R2_}"; done ${unterminated"#, &ctx)?;
        assert_eq!(script, r#"for c in "${categories[@]}"; do echo "${c/_R1_/_R2_}"; done ${unterminated"#);
        Ok(())
    }

    #[test]
    fn test_render_rejects_bad_placeholders() {
        let (inputs, outputs) = ctx_maps();
        let params = ParamSet::default();
        let ctx = TemplateContext { stage: StageId::PassThroughTaxa, inputs: &inputs, outputs: &outputs, params: &params, cpus: 1 };
        for template in ["${in:taxonomy}", "${out:raw_table}", "${in:bogus}", "${param:bogus}", "${task.memory}"] {
            assert!(
                matches!(render_template(template, &ctx), Err(PipelineError::Configuration(_))),
                "{} should be rejected",
                template
            );
        }
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/plain/path.qza"), "/plain/path.qza");
        assert_eq!(shell_quote("it's here"), r"'it'\''s here'");
        assert_eq!(shell_quote(""), "''");
    }

    #[tokio::test]
    async fn test_check_version_missing_tool() {
        let result = check_versions(vec!["definitely-not-a-real-tool-xyz"]).await;
        assert!(matches!(result, Err(PipelineError::ToolUnavailable { .. })));
    }
}
