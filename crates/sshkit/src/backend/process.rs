//! Transport backed by `std::process`.
//!
//! Tool discovery shells out to `which`. Captured runs drain stdout and
//! stderr on helper threads while the caller polls the child against the
//! deadline, so a chatty remote script can never fill a pipe and stall.
//! Collecting the output is bounded by the same deadline.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::types::{CommandOutput, Invocation};

use super::Transport;

/// How often a captured child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Output pipe drained on a helper thread.
///
/// Bytes are buffered as they arrive so whatever was read can be taken at
/// the deadline even if a grandchild still holds the pipe open.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(mut source: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        let sink = Arc::clone(&buf);
        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match source.read(&mut chunk) {
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                }
            }
            let _ = tx.send(());
        });
        Self { buf, done }
    }

    /// Wait for EOF (at most until `deadline`) and return what was read.
    fn finish(self, deadline: Option<Instant>) -> String {
        match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if self.done.recv_timeout(left).is_err() {
                    log::trace!("Pipe still open at deadline, keeping partial output");
                }
            }
            None => {
                let _ = self.done.recv();
            }
        }
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn finish(reader: Option<PipeReader>, deadline: Option<Instant>) -> String {
    reader.map(|r| r.finish(deadline)).unwrap_or_default()
}

/// Transport implementation that spawns real processes.
#[derive(Debug, Clone)]
pub struct ProcessTransport {
    poll_interval: Duration,
}

impl Default for ProcessTransport {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
        }
    }
}

impl ProcessTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        for (key, value) in &invocation.env {
            cmd.env(key, value.expose());
        }
        cmd
    }

    fn spawn_error(program: &str, err: io::Error) -> Error {
        if err.kind() == io::ErrorKind::NotFound {
            Error::ToolNotFound(program.to_string())
        } else {
            Error::Io(err)
        }
    }

    fn wait_until(&self, child: &mut Child, deadline: Option<Instant>) -> Result<Option<ExitStatus>> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => {}
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::Io(e));
                }
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
            }
            thread::sleep(self.poll_interval);
        }
    }
}

/// Exit code of a finished process. Signals map to `128 + signal` as shells do.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

impl Transport for ProcessTransport {
    fn tool_exists(&self, tool: &str) -> bool {
        Command::new("which")
            .arg(tool)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn run_interactive(&self, invocation: &Invocation) -> Result<i32> {
        log::debug!("Running (interactive): {invocation}");

        let status = Self::command(invocation)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| Self::spawn_error(&invocation.program, e))?;

        Ok(exit_code(status))
    }

    fn run_captured(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        log::debug!("Running (captured, timeout {timeout:?}): {invocation}");

        let mut child = Self::command(invocation)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(&invocation.program, e))?;

        let stdout = child.stdout.take().map(PipeReader::spawn);
        let stderr = child.stderr.take().map(PipeReader::spawn);

        let deadline = timeout.map(|t| Instant::now() + t);
        match self.wait_until(&mut child, deadline)? {
            Some(status) => Ok(CommandOutput {
                code: exit_code(status),
                stdout: finish(stdout, deadline),
                stderr: finish(stderr, deadline),
            }),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                // Readers are dropped unjoined: a grandchild may still hold the pipes open.
                log::trace!("Killed {} after {timeout:?}", invocation.program);
                Err(Error::Timeout {
                    program: invocation.program.clone(),
                    after: timeout.unwrap_or_default(),
                })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::types::Secret;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").args(["-c", script])
    }

    #[test]
    fn test_captured_output_and_exit_code() {
        let transport = ProcessTransport::new();
        let output = transport
            .run_captured(&sh("echo out; echo err >&2; exit 3"), None)
            .unwrap();
        assert_eq!(output.code, 3);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert!(!output.success());
    }

    #[test]
    fn test_captured_within_timeout() {
        let transport = ProcessTransport::new();
        let output = transport
            .run_captured(&sh("echo done"), Some(Duration::from_secs(10)))
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "done");
    }

    #[test]
    fn test_captured_timeout_kills_child() {
        let transport = ProcessTransport::new();
        let started = Instant::now();
        let err = transport
            .run_captured(&sh("sleep 5"), Some(Duration::from_millis(100)))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { ref program, .. } if program == "sh"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_background_grandchild_does_not_outlive_deadline() {
        let transport = ProcessTransport::new();
        let started = Instant::now();
        let output = transport
            .run_captured(&sh("echo done; sleep 5 &"), Some(Duration::from_millis(500)))
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "done\n");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_env_is_passed_to_child() {
        let transport = ProcessTransport::new();
        let invocation = sh("printf %s \"$SSHPASS\"").env("SSHPASS", Secret::new("p@ss w0rd"));
        let output = transport.run_captured(&invocation, None).unwrap();
        assert_eq!(output.stdout, "p@ss w0rd");
    }

    #[test]
    fn test_missing_program_is_tool_not_found() {
        let transport = ProcessTransport::new();
        let invocation = Invocation::new("rdeploy-definitely-missing-tool");

        let err = transport.run_captured(&invocation, None).unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(ref t) if t == "rdeploy-definitely-missing-tool"));

        let err = transport.run_interactive(&invocation).unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(_)));
    }

    #[test]
    fn test_tool_exists_missing() {
        let transport = ProcessTransport::new();
        assert!(!transport.tool_exists("rdeploy-definitely-missing-tool"));
    }

    #[test]
    fn test_interactive_exit_code() {
        let transport = ProcessTransport::new();
        assert_eq!(transport.run_interactive(&sh("exit 0")).unwrap(), 0);
        assert_eq!(transport.run_interactive(&sh("exit 7")).unwrap(), 7);
    }
}
