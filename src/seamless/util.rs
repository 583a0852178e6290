use anyhow::{Context, Result};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Return the current Unix epoch in milliseconds.
pub fn now_epoch_millis() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64)
}

/// Keep at most `max_chars` characters of `input`.
pub fn take_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

/// Keep the last `count` characters of `input`.
pub fn last_chars(input: &str, count: usize) -> &str {
    let total = input.chars().count();
    if count >= total {
        return input;
    }
    match input.char_indices().nth(total - count) {
        Some((idx, _)) => &input[idx..],
        None => "",
    }
}

/// Write `contents` to `path` through a sibling temp file and a rename, so a
/// concurrent reader sees either the old file or the complete new one.
/// The file is owner read/write only.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;

    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    temp.write_all(contents)?;
    temp.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o600))?;
    }
    temp.persist(path)
        .map_err(|e| anyhow::anyhow!("failed persisting {} atomically: {}", path.display(), e.error))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.is_some_and(|s| s.success())
    }

    /// Exit code, or -1 when the process timed out or died from a signal.
    pub fn exit_code(&self) -> i32 {
        if self.timed_out {
            return -1;
        }
        self.status.and_then(|s| s.code()).unwrap_or(-1)
    }
}

fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        // SAFETY: killpg only sends a signal; the group id comes from a child
        // we spawned as its own group leader.
        let rc = unsafe { libc::killpg(child.id() as libc::pid_t, libc::SIGKILL) };
        if rc == 0 {
            return;
        }
    }
    let _ = child.kill();
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        buf
    })
}

/// Run `cmd` in its own process group, feeding `stdin` and capturing output.
///
/// On timeout the whole group is killed with SIGKILL. The group is also
/// swept after a normal exit: a straggler holding the output pipes would
/// otherwise keep the readers blocked.
pub fn run_command_with_timeout(
    cmd: &mut Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<CommandOutcome> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn()?;

    let writer = match (stdin, child.stdin.take()) {
        (Some(bytes), Some(mut pipe)) => {
            let bytes = bytes.to_vec();
            // The child may exit before draining stdin; a broken pipe is not our failure.
            Some(thread::spawn(move || {
                let _ = pipe.write_all(&bytes);
            }))
        }
        _ => None,
    };
    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let started = Instant::now();
    let mut timed_out = false;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            kill_process_group(&mut child);
            break Some(status);
        }
        if started.elapsed() >= timeout {
            timed_out = true;
            kill_process_group(&mut child);
            let _ = child.wait();
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };

    if let Some(writer) = writer {
        let _ = writer.join();
    }
    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    Ok(CommandOutcome {
        status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        timed_out,
    })
}
