use crate::executor::Outcome;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

const MAX_OUTPUT: usize = 10 * 1024;

/// Run `command` through `sh -c` in `cwd`. Exit status 0 passes.
pub(super) fn run(command: &str, cwd: &Path, timeout: Option<Duration>) -> Outcome {
    if command.trim().is_empty() {
        return Outcome::fail("shell command is empty");
    }
    let (success, output) = execute(command, cwd, timeout);
    if success {
        Outcome::pass(if output.is_empty() {
            format!("`{command}` exited 0")
        } else {
            output
        })
    } else {
        Outcome::fail(output)
    }
}

/// Returns (success, combined output). `None` timeout waits indefinitely.
///
/// stdout/stderr drain on their own threads so a chatty child cannot fill a
/// pipe and deadlock; the wait happens on a third thread so the timeout can
/// use `recv_timeout` instead of polling.
fn execute(command: &str, cwd: &Path, timeout: Option<Duration>) -> (bool, String) {
    let mut child = match Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => return (false, format!("failed to spawn: {e}")),
    };

    let child_pid = child.id();
    let stdout_thread = drain(child.stdout.take());
    let stderr_thread = drain(child.stderr.take());

    let wait_result = match timeout {
        None => child.wait(),
        Some(limit) => {
            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(child.wait());
            });
            match rx.recv_timeout(limit) {
                Ok(result) => result,
                Err(_) => {
                    kill_process(child_pid);
                    return (false, format!("timed out after {}ms", limit.as_millis()));
                }
            }
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    match wait_result {
        Ok(status) => (status.success(), combine(&stdout, &stderr)),
        Err(e) => (false, format!("wait failed: {e}")),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut r) = pipe {
            let _ = r.read_to_string(&mut buf);
        }
        buf
    })
}

/// Merge stdout and stderr, trimmed and capped to the last 10KB.
fn combine(stdout: &str, stderr: &str) -> String {
    let output = match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{stdout}\n{stderr}"),
    };
    let trimmed = output.trim();
    if trimmed.len() <= MAX_OUTPUT {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_OUTPUT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

/// SIGKILL by pid. Best-effort.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}
