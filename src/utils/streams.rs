// src/utils/streams.rs: Child process output handling

use anyhow::{anyhow, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;


#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChildStream {
    Stdout,
    Stderr,
}


/// Drains one of a child's output pipes into lines.
///
/// # Arguments
///
/// * `child` - Spawned child with the requested stream piped.
/// * `stream` - Which pipe to read.
///
/// # Returns
/// Vec of lines without terminators.
pub async fn read_child_output_to_vec(child: &mut Child, stream: ChildStream) -> Result<Vec<String>> {
    match stream {
        ChildStream::Stdout => {
            let stdout = child.stdout.take().ok_or_else(|| anyhow!("Child stdout not captured"))?;
            collect_lines(stdout).await
        }
        ChildStream::Stderr => {
            let stderr = child.stderr.take().ok_or_else(|| anyhow!("Child stderr not captured"))?;
            collect_lines(stderr).await
        }
    }
}


/// Takes a child's pipe and drains it on its own task, so stdout and stderr
/// can be read concurrently without the child blocking on a full pipe.
pub fn spawn_output_collector(child: &mut Child, stream: ChildStream) -> Result<JoinHandle<Result<Vec<String>>>> {
    let handle = match stream {
        ChildStream::Stdout => {
            let stdout = child.stdout.take().ok_or_else(|| anyhow!("Child stdout not captured"))?;
            tokio::spawn(collect_lines(stdout))
        }
        ChildStream::Stderr => {
            let stderr = child.stderr.take().ok_or_else(|| anyhow!("Child stderr not captured"))?;
            tokio::spawn(collect_lines(stderr))
        }
    };
    Ok(handle)
}


pub async fn collect_lines<R>(reader: R) -> Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let mut lines = LinesStream::new(BufReader::new(reader).lines());
    let mut out = Vec::new();
    while let Some(line) = lines.next().await {
        out.push(line?);
    }
    Ok(out)
}


/// Last `n` lines joined with newlines.
pub fn tail_lines(lines: &[String], n: usize) -> String {
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    #[tokio::test]
    async fn test_collect_lines() -> Result<()> {
        let data: &[u8] = b"first\nsecond\nthird";
        let lines = collect_lines(data).await?;
        assert_eq!(lines, vec!["first", "second", "third"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_read_child_stdout_and_stderr() -> Result<()> {
        let mut child = Command::new("bash")
            .args(["-c", "echo out; echo err >&2"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let err_task = spawn_output_collector(&mut child, ChildStream::Stderr)?;
        let out = read_child_output_to_vec(&mut child, ChildStream::Stdout).await?;
        let err = err_task.await??;
        child.wait().await?;
        assert_eq!(out, vec!["out"]);
        assert_eq!(err, vec!["err"]);
        Ok(())
    }

    #[test]
    fn test_tail_lines() {
        let lines: Vec<String> = (1..=5).map(|i| i.to_string()).collect();
        assert_eq!(tail_lines(&lines, 2), "4\n5");
        assert_eq!(tail_lines(&lines, 10), "1\n2\n3\n4\n5");
    }
}
