//! Signal escalation for a shell that ignored its exit command.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

/// Terminate `child` and reap it.
///
/// On unix the child gets SIGTERM and `grace` to exit, then SIGKILL. Elsewhere
/// it is killed at once. A child that has already exited is only reaped.
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    #[cfg(unix)]
    {
        if terminate(child)? {
            if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                return status;
            }
            tracing::debug!(pid = ?child.id(), "SIGTERM grace elapsed; sending SIGKILL");
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    child.kill().await?;
    child.wait().await
}

/// Send SIGTERM. `Ok(false)` when there is no process left to signal.
#[cfg(unix)]
fn terminate(child: &Child) -> io::Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(false);
    };
    let pid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(io::Error::other(e)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::process::Command;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_sigterm_stops_cooperative_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();

        let started = Instant::now();
        let status = shutdown_child(&mut child, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_sigkill_after_grace_when_sigterm_ignored() {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; while :; do sleep 1; done")
            .spawn()
            .unwrap();
        // let the trap install
        sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        let status = shutdown_child(&mut child, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(status.code(), None);
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_exited_child_is_only_reaped() {
        let mut child = Command::new("sh").arg("-c").arg("exit 7").spawn().unwrap();
        sleep(Duration::from_millis(100)).await;

        let status = shutdown_child(&mut child, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(status.code(), Some(7));
    }
}
