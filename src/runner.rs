//! Blocking execution of the BRAT tool as a child process.
//!
//! stdout is inherited. stderr is forwarded unmodified as it arrives and a
//! bounded tail is kept for the failure report. Cancellation forwards
//! SIGTERM to the child and leaves the output directory as-is.
use crate::error::OrchestratorError;
use crate::signals;
use crate::util::tail_string;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Bytes of stderr retained for [`OrchestratorError::ToolInvocation`].
pub const MAX_STDERR_TAIL: usize = 64 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of a tool run that exited successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolOutcome {
    pub exit_code: i32,
    pub elapsed_ms: u128,
}

/// Resolve the program word on `PATH` (or as given when it has a slash).
pub fn locate_program(program: &str) -> Result<std::path::PathBuf, OrchestratorError> {
    which::which(program).map_err(|source| OrchestratorError::ToolNotFound {
        program: program.to_string(),
        source,
    })
}

/// Run `command` + `args` to completion, or until `cancel` is raised.
pub fn run_tool(
    command: &[String],
    args: &[String],
    output_dir: &Path,
    cancel: &AtomicBool,
) -> Result<ToolOutcome, OrchestratorError> {
    let (program, leading) = command
        .split_first()
        .ok_or_else(|| OrchestratorError::ToolInvocation {
            exit_code: None,
            stderr: "tool command is empty".to_string(),
        })?;
    let program_path = locate_program(program)?;
    if cancel.load(Ordering::SeqCst) {
        tracing::warn!("cancel requested before launch; tool not started");
        return Err(OrchestratorError::Cancelled {
            output_dir: output_dir.to_path_buf(),
        });
    }

    let start = Instant::now();
    let mut child = Command::new(&program_path)
        .args(leading)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| OrchestratorError::ToolLaunch {
            program: program_path.clone(),
            source,
        })?;
    tracing::info!(
        program = %program_path.display(),
        pid = child.id(),
        args = args.len(),
        "tool launched"
    );

    let stderr = child.stderr.take();
    let forwarder = thread::spawn(move || match stderr {
        Some(stream) => forward_stderr(stream),
        None => Vec::new(),
    });

    let status = wait_or_cancel(&mut child, cancel);
    let tail = forwarder.join().unwrap_or_default();
    let elapsed_ms = start.elapsed().as_millis();

    let status = match status {
        Ok(Some(status)) => status,
        Ok(None) => {
            tracing::warn!(
                elapsed_ms,
                output_dir = %output_dir.display(),
                "tool cancelled; partial output left in place"
            );
            return Err(OrchestratorError::Cancelled {
                output_dir: output_dir.to_path_buf(),
            });
        }
        Err(err) => {
            return Err(OrchestratorError::ToolInvocation {
                exit_code: None,
                stderr: format!("wait for tool: {err}"),
            })
        }
    };

    tracing::info!(elapsed_ms, exit_code = ?status.code(), "tool finished");
    match status.code() {
        Some(0) => Ok(ToolOutcome {
            exit_code: 0,
            elapsed_ms,
        }),
        code => Err(OrchestratorError::ToolInvocation {
            exit_code: code,
            stderr: tail_string(&tail, MAX_STDERR_TAIL),
        }),
    }
}

/// Poll the child; `Ok(None)` means it was cancelled and reaped.
fn wait_or_cancel(child: &mut Child, cancel: &AtomicBool) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if cancel.load(Ordering::SeqCst) {
            terminate(child);
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn terminate(child: &Child) {
    if let Err(err) = signals::terminate(child.id()) {
        tracing::warn!(pid = child.id(), error = %err, "failed to signal tool");
    }
}

fn forward_stderr(mut stream: impl Read) -> Vec<u8> {
    let mut captured = Vec::new();
    let mut buf = [0u8; 8192];
    let mut out = io::stderr();
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        let _ = out.write_all(&buf[..n]);
        captured.extend_from_slice(&buf[..n]);
        if captured.len() > MAX_STDERR_TAIL * 2 {
            captured.drain(..captured.len() - MAX_STDERR_TAIL);
        }
    }
    let _ = out.flush();
    captured
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::write_file;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        write_file(&path, &format!("#!/bin/sh\n{body}\n"));
        let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
        path.display().to_string()
    }

    #[test]
    fn passes_arguments_and_reports_success() {
        let dir = TempDir::new().expect("tempdir");
        let record = dir.path().join("argv.txt");
        let tool = script(
            dir.path(),
            "tool.sh",
            &format!("printf '%s\\n' \"$@\" > '{}'", record.display()),
        );
        let cancel = AtomicBool::new(false);
        let outcome = run_tool(
            &[tool],
            &["1710020407".to_string(), "a b".to_string()],
            dir.path(),
            &cancel,
        )
        .expect("run");
        assert_eq!(outcome.exit_code, 0);
        let recorded = std::fs::read_to_string(&record).expect("argv");
        assert_eq!(recorded, "1710020407\na b\n");
    }

    #[test]
    fn nonzero_exit_carries_code_and_stderr() {
        let dir = TempDir::new().expect("tempdir");
        let tool = script(dir.path(), "fail.sh", "echo 'layer missing' >&2\nexit 4");
        let cancel = AtomicBool::new(false);
        match run_tool(&[tool], &[], dir.path(), &cancel) {
            Err(OrchestratorError::ToolInvocation { exit_code, stderr }) => {
                assert_eq!(exit_code, Some(4));
                assert_eq!(stderr.trim(), "layer missing");
            }
            other => panic!("expected tool failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let cancel = AtomicBool::new(false);
        let missing = dir.path().join("no-such-brat").display().to_string();
        assert!(matches!(
            run_tool(&[missing], &[], dir.path(), &cancel),
            Err(OrchestratorError::ToolNotFound { .. })
        ));
    }

    #[test]
    fn cancellation_terminates_the_child_and_keeps_output() {
        let dir = TempDir::new().expect("tempdir");
        let partial = dir.path().join("partial.gpkg");
        let tool = script(
            dir.path(),
            "slow.sh",
            &format!("touch '{}'\nexec sleep 30", partial.display()),
        );
        let cancel = Arc::new(AtomicBool::new(false));
        let trigger = Arc::clone(&cancel);
        let partial_seen = partial.clone();
        let canceller = thread::spawn(move || {
            for _ in 0..100 {
                if partial_seen.exists() {
                    break;
                }
                thread::sleep(Duration::from_millis(50));
            }
            trigger.store(true, Ordering::SeqCst);
        });

        let start = Instant::now();
        let result = run_tool(&[tool], &[], dir.path(), &cancel);
        canceller.join().expect("canceller");
        assert!(matches!(result, Err(OrchestratorError::Cancelled { .. })));
        assert!(start.elapsed() < Duration::from_secs(20));
        assert!(partial.exists());
    }

    #[test]
    fn cancel_before_launch_never_starts_the_tool() {
        let dir = TempDir::new().expect("tempdir");
        let marker = dir.path().join("started");
        let tool = script(
            dir.path(),
            "brat.sh",
            &format!("touch '{}'", marker.display()),
        );
        let cancel = AtomicBool::new(true);
        assert!(matches!(
            run_tool(&[tool], &[], dir.path(), &cancel),
            Err(OrchestratorError::Cancelled { .. })
        ));
        assert!(!marker.exists());
    }

    #[test]
    fn unlaunchable_tool_reports_the_os_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("brat");
        write_file(&path, "#!/nonexistent/interpreter\n");
        let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
        let cancel = AtomicBool::new(false);
        match run_tool(&[path.display().to_string()], &[], dir.path(), &cancel) {
            Err(OrchestratorError::ToolLaunch { program, source }) => {
                assert_eq!(program, path);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected launch failure, got {other:?}"),
        }
    }
}
