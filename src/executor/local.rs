// Local process execution with streamed output

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::{LineCallback, ProcessOutput, ProcessRunner};
use crate::output::errors::BoltError;

/// Runs commands as child processes of this one, without a shell
#[derive(Debug, Clone, Default)]
pub struct LocalProcess;

impl LocalProcess {
    pub fn new() -> Self {
        LocalProcess
    }
}

/// Forward each line to `callback` and collect the full text.
///
/// Reads raw bytes so output in any encoding keeps flowing; invalid UTF-8
/// is replaced rather than ending the stream.
async fn pump_lines<R>(reader: R, callback: LineCallback) -> String
where
    R: AsyncRead + Unpin,
{
    let mut full = String::new();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                full.push_str(&line);
                callback(line.trim_end_matches(['\n', '\r']).to_string());
            }
            Err(_) => break,
        }
    }

    full
}

#[async_trait]
impl ProcessRunner for LocalProcess {
    async fn execute(
        &self,
        argv: &[String],
        env: &[(String, String)],
        on_stdout: LineCallback,
        on_stderr: LineCallback,
    ) -> Result<ProcessOutput, BoltError> {
        let (program, args) = argv.split_first().ok_or_else(|| BoltError::Io {
            message: "Cannot execute an empty command".to_string(),
            path: None,
        })?;

        let mut child = Command::new(program)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BoltError::Io {
                message: format!("Failed to launch '{}': {}", program, e),
                path: None,
            })?;

        let stdout_handle = child.stdout.take().ok_or_else(|| BoltError::Io {
            message: "Failed to capture stdout".to_string(),
            path: None,
        })?;

        let stderr_handle = child.stderr.take().ok_or_else(|| BoltError::Io {
            message: "Failed to capture stderr".to_string(),
            path: None,
        })?;

        let stdout_task = tokio::spawn(pump_lines(stdout_handle, on_stdout));
        let stderr_task = tokio::spawn(pump_lines(stderr_handle, on_stderr));

        let status = child.wait().await.map_err(|e| BoltError::Io {
            message: format!("Failed to wait for '{}': {}", program, e),
            path: None,
        })?;

        let stdout = stdout_task.await.map_err(|e| BoltError::Io {
            message: format!("Failed to read stdout: {}", e),
            path: None,
        })?;

        let stderr = stderr_task.await.map_err(|e| BoltError::Io {
            message: format!("Failed to read stderr: {}", e),
            path: None,
        })?;

        Ok(ProcessOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn collector() -> (Arc<Mutex<Vec<String>>>, LineCallback) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        (lines, Box::new(move |line| sink.lock().push(line)))
    }

    #[tokio::test]
    async fn test_streams_stdout_and_stderr() {
        let (out, on_stdout) = collector();
        let (err, on_stderr) = collector();

        let result = LocalProcess::new()
            .execute(
                &argv(&["sh", "-c", "echo one; echo two; echo oops >&2"]),
                &[],
                on_stdout,
                on_stderr,
            )
            .await
            .unwrap();

        assert!(result.success());
        assert_eq!(*out.lock(), vec!["one", "two"]);
        assert_eq!(*err.lock(), vec!["oops"]);
        assert_eq!(result.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_exit_code_and_env() {
        let (_, on_stdout) = collector();
        let (_, on_stderr) = collector();

        let result = LocalProcess::new()
            .execute(
                &argv(&["sh", "-c", "test \"$MARKER\" = set && exit 3"]),
                &[("MARKER".to_string(), "set".to_string())],
                on_stdout,
                on_stderr,
            )
            .await
            .unwrap();

        assert!(!result.success());
        assert_eq!(result.exit_code, 3);
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let (out, on_stdout) = collector();
        let (_, on_stderr) = collector();

        LocalProcess::new()
            .execute(&argv(&["echo", "'$HOME'; rm -rf /"]), &[], on_stdout, on_stderr)
            .await
            .unwrap();

        assert_eq!(*out.lock(), vec!["'$HOME'; rm -rf /"]);
    }

    #[tokio::test]
    async fn test_non_utf8_output_keeps_streaming() {
        let (out, on_stdout) = collector();
        let (_, on_stderr) = collector();

        let result = LocalProcess::new()
            .execute(
                &argv(&[
                    "sh",
                    "-c",
                    "printf 'caf\\351\\n'; i=0; while [ $i -lt 20000 ]; do echo line $i; i=$((i+1)); done",
                ]),
                &[],
                on_stdout,
                on_stderr,
            )
            .await
            .unwrap();

        assert_eq!(result.exit_code, 0);
        let lines = out.lock();
        assert_eq!(lines.len(), 20001);
        assert_eq!(lines[0], "caf\u{FFFD}");
        assert_eq!(lines[20000], "line 19999");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let (_, on_stdout) = collector();
        let (_, on_stderr) = collector();

        let err = LocalProcess::new()
            .execute(&argv(&["/nonexistent/bolt"]), &[], on_stdout, on_stderr)
            .await
            .unwrap_err();
        assert!(matches!(err, BoltError::Io { .. }));
    }

    #[tokio::test]
    async fn test_empty_command() {
        let (_, on_stdout) = collector();
        let (_, on_stderr) = collector();

        let err = LocalProcess::new()
            .execute(&[], &[], on_stdout, on_stderr)
            .await
            .unwrap_err();
        assert!(matches!(err, BoltError::Io { .. }));
    }
}
