use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often a deadline-bound run checks whether the engine has exited.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug)]
pub(crate) enum RunError {
    Spawn(std::io::Error),
    Wait(std::io::Error),
    TimedOut(Duration),
}

/// Run `program` to completion and collect its output.
///
/// Without a timeout this is `Command::output`. With one, stdout/stderr are drained on helper
/// threads while the child is polled; past the deadline the child is killed.
pub(crate) fn run(
    program: &Path,
    args: &[OsString],
    timeout: Option<Duration>,
) -> Result<Output, RunError> {
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null());

    let Some(limit) = timeout else {
        return cmd.output().map_err(RunError::Spawn);
    };

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(RunError::Spawn)?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + limit;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::TimedOut(limit));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::Wait(err));
            }
        }
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<OsString> {
        vec!["-c".into(), script.into()]
    }

    #[test]
    fn collects_output_without_timeout() -> anyhow::Result<()> {
        let out = run(Path::new("sh"), &sh("printf out; printf err >&2"), None)
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        assert!(out.status.success());
        assert_eq!(out.stdout, b"out");
        assert_eq!(out.stderr, b"err");
        Ok(())
    }

    #[test]
    fn collects_output_within_timeout() -> anyhow::Result<()> {
        let out = run(
            Path::new("sh"),
            &sh("printf fast; exit 3"),
            Some(Duration::from_secs(10)),
        )
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.stdout, b"fast");
        Ok(())
    }

    #[test]
    fn kills_child_past_deadline() {
        let started = Instant::now();
        let res = run(
            Path::new("sh"),
            &sh("exec sleep 5"),
            Some(Duration::from_millis(100)),
        );
        assert!(matches!(res, Err(RunError::TimedOut(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let res = run(Path::new("/nonexistent/bin/tesseract"), &[], None);
        match res {
            Err(RunError::Spawn(err)) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected spawn error, got {other:?}"),
        }
    }
}
