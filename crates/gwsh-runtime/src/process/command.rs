//! Command builder for the shell process.

use gwsh_core::{Settings, SupervisorError};
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::{Child, ChildStdin, Command};
use tracing::debug;

/// A readable end of the shell's output.
pub(crate) type OutputPipe = Box<dyn AsyncRead + Unpin + Send>;

/// A freshly spawned shell with its standard streams split off.
pub(crate) struct ShellProcess {
    pub child: Child,
    pub stdin: ChildStdin,
    /// stdout, carrying stderr too when both share one pipe.
    pub output: OutputPipe,
    /// stderr when it is captured on a pipe of its own.
    pub stderr: Option<OutputPipe>,
}

/// Build the shell command with stdin piped.
///
/// The child is killed if its handle is dropped without a stop.
fn build_command(settings: &Settings) -> Command {
    let mut cmd = Command::new(&settings.executable);
    cmd.args(&settings.args)
        .stdin(Stdio::piped())
        .kill_on_drop(true);

    if let Some(ref dir) = settings.working_dir {
        cmd.current_dir(dir);
    }

    cmd
}

/// Point stdout and stderr at one pipe, so the shell's writes to either
/// arrive in the order it made them.
///
/// Returns the read end, or `None` when stderr is discarded and stdout is an
/// ordinary child pipe.
#[cfg(unix)]
fn attach_output(cmd: &mut Command, capture_stderr: bool) -> io::Result<Option<OutputPipe>> {
    use std::os::fd::OwnedFd;
    use tokio::net::unix::pipe;

    if !capture_stderr {
        cmd.stdout(Stdio::piped()).stderr(Stdio::null());
        return Ok(None);
    }
    let (reader, writer) = std::io::pipe()?;
    cmd.stdout(writer.try_clone()?).stderr(writer);
    let reader = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;
    Ok(Some(Box::new(reader)))
}

/// Two separate child pipes; the reader loop interleaves them.
#[cfg(not(unix))]
fn attach_output(cmd: &mut Command, capture_stderr: bool) -> io::Result<Option<OutputPipe>> {
    cmd.stdout(Stdio::piped()).stderr(if capture_stderr {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    Ok(None)
}

/// Spawn the shell process.
pub(crate) fn spawn_shell(settings: &Settings) -> Result<ShellProcess, SupervisorError> {
    debug!(
        executable = %settings.executable.display(),
        args = ?settings.args,
        "Spawning shell"
    );
    let mut cmd = build_command(settings);
    let merged = attach_output(&mut cmd, settings.capture_stderr).map_err(|e| {
        SupervisorError::SpawnFailed(format!("failed to create output pipe: {e}"))
    })?;
    let mut child = cmd
        .spawn()
        .map_err(|e| SupervisorError::SpawnFailed(describe_spawn_error(&settings.executable, &e)))?;
    // our copies of the pipe's write end must go, or the reader never sees EOF
    drop(cmd);

    let stdout = merged.or_else(|| {
        child
            .stdout
            .take()
            .map(|stdout| Box::new(stdout) as OutputPipe)
    });
    let (Some(stdin), Some(output)) = (child.stdin.take(), stdout) else {
        return Err(SupervisorError::SpawnFailed(
            "shell stdio pipes were not available".to_string(),
        ));
    };
    let stderr = child
        .stderr
        .take()
        .map(|stderr| Box::new(stderr) as OutputPipe);

    Ok(ShellProcess {
        child,
        stdin,
        output,
        stderr,
    })
}

fn describe_spawn_error(executable: &Path, err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => format!(
            "executable not found: {} (set GWSH_EXECUTABLE or pass --executable)",
            executable.display()
        ),
        io::ErrorKind::PermissionDenied => {
            format!("permission denied launching {}", executable.display())
        }
        _ => format!("failed to launch {}: {err}", executable.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_executable_is_spawn_failure() {
        let settings = Settings::for_executable("/nonexistent/path/gw_sh");
        let Err(err) = spawn_shell(&settings) else {
            panic!("spawn of a missing executable succeeded");
        };
        match err {
            SupervisorError::SpawnFailed(msg) => {
                assert!(msg.contains("executable not found"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_and_stderr_share_one_pipe() {
        use tokio::io::AsyncReadExt;

        let settings = Settings {
            args: vec![
                "-c".to_string(),
                "printf 'a\\n'; printf 'b\\n' >&2; printf 'c\\n'".to_string(),
            ],
            ..Settings::for_executable("/bin/sh")
        };
        let mut shell = spawn_shell(&settings).unwrap();
        assert!(shell.stderr.is_none());

        let mut text = String::new();
        shell.output.read_to_string(&mut text).await.unwrap();
        assert_eq!(text, "a\nb\nc\n");
        shell.child.wait().await.unwrap();
    }

    #[test]
    fn test_describe_permission_denied() {
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        let msg = describe_spawn_error(Path::new("/opt/gw_sh"), &err);
        assert_eq!(msg, "permission denied launching /opt/gw_sh");
    }
}
