//! Scoped external process execution
//!
//! Engines and the MP3 transcoder are external programs. Every spawned
//! child is owned by a [`ScopedChild`] that kills and reaps it on drop, so a
//! timeout, an early return or a panic never leaves a zombie behind.

use log::{debug, warn};
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval while waiting for a child to exit
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Owns a child process for the duration of one call
pub struct ScopedChild {
    child: Child,
    reaped: bool,
}

impl ScopedChild {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }
}

impl Drop for ScopedChild {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        debug!("Killing external process {}", self.child.id());
        if let Err(e) = self.child.kill() {
            debug!("Failed to kill process: {}", e);
        }
        let _ = self.child.wait(); // Clean up zombie
    }
}

/// Why a process run did not produce a successful exit
#[derive(Debug)]
pub enum ProcessFailure {
    /// The program could not be started at all
    Spawn(io::Error),
    /// The bounded wait elapsed; the child was killed
    TimedOut(Duration),
    /// The program exited unsuccessfully
    Failed { status: ExitStatus, stderr: String },
    /// Waiting on the child failed
    Wait(io::Error),
    /// The caller asked to stop; the child was killed
    Stopped,
}

impl ProcessFailure {
    /// True when the program itself is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProcessFailure::Spawn(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

impl std::fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessFailure::Spawn(e) => write!(f, "failed to start: {}", e),
            ProcessFailure::TimedOut(d) => write!(f, "timed out after {:.1}s", d.as_secs_f32()),
            ProcessFailure::Failed { status, stderr } => {
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    write!(f, "exited with {}", status)
                } else {
                    write!(f, "exited with {}: {}", status, stderr)
                }
            }
            ProcessFailure::Wait(e) => write!(f, "failed waiting for process: {}", e),
            ProcessFailure::Stopped => f.write_str("stopped"),
        }
    }
}

/// Run a command to completion with a bounded wait
///
/// `input` is written to the child's stdin and stdin is then closed. Stdout is
/// discarded; stderr is captured for error messages.
pub fn run_with_timeout(
    cmd: &mut Command,
    input: Option<&str>,
    timeout: Duration,
) -> std::result::Result<(), ProcessFailure> {
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::piped());

    debug!("Spawning {:?}", cmd);
    let child = cmd.spawn().map_err(ProcessFailure::Spawn)?;
    let mut scoped = ScopedChild::new(child);

    // Feed stdin and drain stderr on helper threads so a chatty or slow child
    // can never block us past the deadline.
    let writer = match (input, scoped.child.stdin.take()) {
        (Some(text), Some(mut stdin)) => {
            let text = text.to_string();
            Some(thread::spawn(move || {
                if let Err(e) = stdin.write_all(text.as_bytes()) {
                    debug!("Writing to child stdin failed: {}", e);
                }
                // stdin dropped here, closing the pipe
            }))
        }
        _ => None,
    };
    let reader = scoped.child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    });

    let started = Instant::now();
    let status = loop {
        match scoped.child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if started.elapsed() >= timeout {
                    warn!("External process exceeded {:?}, killing it", timeout);
                    drop(scoped);
                    // Helper threads finish once the pipes close; a
                    // grandchild may still hold them, so don't wait here.
                    drop(writer);
                    drop(reader);
                    return Err(ProcessFailure::TimedOut(timeout));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(ProcessFailure::Wait(e)),
        }
    };

    // Already reaped by try_wait
    scoped.reaped = true;
    join_quietly(writer);
    let stderr = reader
        .and_then(|r| r.join().ok())
        .unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        Err(ProcessFailure::Failed { status, stderr })
    }
}

/// Run a command until it exits or `stop` returns true
///
/// For long-running children such as an audio player, where the wait is
/// bounded by the user rather than a timeout.
pub fn run_until_stopped(
    cmd: &mut Command,
    stop: impl Fn() -> bool,
) -> std::result::Result<(), ProcessFailure> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::piped());

    debug!("Spawning {:?}", cmd);
    let child = cmd.spawn().map_err(ProcessFailure::Spawn)?;
    let mut scoped = ScopedChild::new(child);

    let reader = scoped.child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    });

    let status = loop {
        match scoped.child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if stop() {
                    debug!("Stopping external process {}", scoped.child.id());
                    drop(scoped);
                    drop(reader);
                    return Err(ProcessFailure::Stopped);
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(ProcessFailure::Wait(e)),
        }
    };

    scoped.reaped = true;
    let stderr = reader
        .and_then(|r| r.join().ok())
        .unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        Err(ProcessFailure::Failed { status, stderr })
    }
}

fn join_quietly(handle: Option<thread::JoinHandle<()>>) {
    if let Some(h) = handle {
        let _ = h.join();
    }
}
