use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

use crate::error::ProviderError;

/// Run `program args...` in `dir` and capture stdout.
///
/// Exit codes listed in `ok_codes` count as success; anything else is a
/// `ToolFailed` carrying the tail of stderr.
pub(crate) fn run(
    program: &str,
    args: &[&str],
    dir: &Path,
    ok_codes: &[i32],
) -> Result<String, ProviderError> {
    let started = Instant::now();
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ProviderError::ToolMissing(program.to_string()),
            _ => ProviderError::ToolFailed {
                tool: program.to_string(),
                status: -1,
                stderr: e.to_string(),
            },
        })?;

    let status = output.status.code().unwrap_or(-1);
    tracing::debug!(
        tool = program,
        ?args,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "tool finished"
    );

    if !ok_codes.contains(&status) {
        return Err(ProviderError::ToolFailed {
            tool: program.to_string(),
            status,
            stderr: stderr_tail(&String::from_utf8_lossy(&output.stderr)),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

const STDERR_TAIL_LINES: usize = 5;

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[skip..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary() {
        let err = run("tfgate-no-such-tool", &[], Path::new("."), &[0]).unwrap_err();
        assert_eq!(err, ProviderError::ToolMissing("tfgate-no-such-tool".into()));
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_stderr() {
        let out = run("sh", &["-c", "echo ok; exit 2"], Path::new("."), &[0, 2]).unwrap();
        assert_eq!(out.trim(), "ok");

        let err = run("sh", &["-c", "echo boom >&2; exit 1"], Path::new("."), &[0]).unwrap_err();
        match err {
            ProviderError::ToolFailed { status, stderr, .. } => {
                assert_eq!(status, 1);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tail_keeps_last_lines() {
        let text = (1..=8).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        assert_eq!(stderr_tail(&text), "line4 | line5 | line6 | line7 | line8");
    }
}
