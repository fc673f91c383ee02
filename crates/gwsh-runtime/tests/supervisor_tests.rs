//! End-to-end tests for `TclShellSupervisor` against a scripted fake shell.
//!
//! The fake shell is a small `/bin/sh` script that prints a `% ` prompt
//! after each line, with a few magic commands for the awkward cases. It
//! remembers every line it read, so `history` shows what reached its input.

#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gwsh_core::{CommandRequest, Settings, SupervisorError, SupervisorState};
use gwsh_runtime::TclShellSupervisor;
use tempfile::TempDir;

const FAKE_SHELL: &str = r#"
printf 'Gowin fake shell\n%% '
seen=''
while IFS= read -r line; do
  seen="$seen|$line"
  case "$line" in
    exit) exit 0 ;;
    history) printf 'seen: %s\n%% ' "$seen" ;;
    hang) printf 'working\n' ;;
    die) printf 'fatal error\n'; exit 3 ;;
    crash) printf 'bye\n%% '; sleep 0.2; exit 4 ;;
    slow) sleep 0.6; printf 'done\n%% ' ;;
    split) printf 'half%%'; sleep 0.1; printf ' ' ;;
    slowsplit) printf 'half%%'; sleep 0.4; printf ' ' ;;
    more) printf 'page 1\n--More--'; IFS= read -r _; printf 'page 2\n%% ' ;;
    slowmore) sleep 0.4; printf 'page 1\n--More--'; IFS= read -r _; printf 'page 2\n%% ' ;;
    err) printf 'oops\n' >&2; printf 'after\n%% ' ;;
    *) printf 'ran: %s\n%% ' "$line" ;;
  esac
done
"#;

const SILENT_SHELL: &str = r#"
while IFS= read -r line; do
  printf 'got %s\n' "$line"
done
"#;

const SLOW_BANNER_SHELL: &str = r#"
sleep 0.4
printf '%% '
while IFS= read -r line; do
  printf 'ran: %s\n%% ' "$line"
done
"#;

/// Prints its prompt, then never reads its input again.
const DEAF_SHELL: &str = r#"
printf '%% '
exec sleep 30
"#;

const STUBBORN_SHELL: &str = r#"
trap '' TERM
printf '%% '
while IFS= read -r line; do
  printf 'ignored %s\n%% ' "$line"
done
"#;

/// A shell script on disk plus settings pointing at it.
struct Fixture {
    _dir: TempDir,
    settings: Settings,
}

impl Fixture {
    fn new(script: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path: PathBuf = dir.path().join("fake_gw_sh.sh");
        std::fs::write(&path, script).unwrap();

        let settings = Settings {
            args: vec![path.to_string_lossy().into_owned()],
            command_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(20),
            startup_timeout: Duration::from_secs(2),
            startup_commands: Vec::new(),
            exit_grace: Duration::from_millis(500),
            terminate_grace: Duration::from_millis(500),
            ..Settings::for_executable("/bin/sh")
        };
        Self {
            _dir: dir,
            settings,
        }
    }

    fn supervisor(&self) -> TclShellSupervisor {
        TclShellSupervisor::new(self.settings.clone()).unwrap()
    }
}

#[tokio::test]
async fn test_start_reports_banner_and_status() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();

    let report = sup.start().await.unwrap();
    assert!(report.prompt_seen);
    assert!(report.pid.is_some());
    assert!(report.output.contains("Gowin fake shell"));

    let status = sup.status();
    assert_eq!(status.state, SupervisorState::Running);
    assert!(status.running);
    assert_eq!(status.pid, report.pid);
    assert!(status.started_at.is_some());
    assert!(!status.command_in_flight);

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_start_twice_is_already_running() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();

    let report = sup.start().await.unwrap();
    let err = sup.start().await.unwrap_err();
    assert_eq!(err, SupervisorError::AlreadyRunning { pid: report.pid });

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_submit_echo_completes_before_timeout() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let started = Instant::now();
    let result = sup
        .submit(CommandRequest::new("foo").with_timeout(Duration::from_secs(5)))
        .await
        .unwrap();

    assert!(result.success);
    assert!(!result.timed_out);
    assert_eq!(result.command, "foo");
    assert_eq!(result.output, "ran: foo\n% ");
    assert!(started.elapsed() < Duration::from_secs(2));

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_submit_times_out_without_prompt() {
    let mut fixture = Fixture::new(SILENT_SHELL);
    fixture.settings.startup_timeout = Duration::from_millis(300);
    let sup = fixture.supervisor();

    let report = sup.start().await.unwrap();
    assert!(!report.prompt_seen);

    let started = Instant::now();
    let result = sup
        .submit(CommandRequest::new("foo").with_timeout(Duration::from_secs(1)))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(result.timed_out);
    assert!(!result.success);
    assert!(result.output.contains("got foo"));
    assert!(elapsed >= Duration::from_millis(950), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "returned late: {elapsed:?}");

    // the process is left alone
    assert!(sup.status().running);
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_submit_is_rejected() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = Arc::new(fixture.supervisor());
    sup.start().await.unwrap();

    let background = {
        let sup = Arc::clone(&sup);
        tokio::spawn(async move { sup.submit(CommandRequest::new("slow")).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;

    let err = sup.submit(CommandRequest::new("puts hi")).await.unwrap_err();
    assert_eq!(
        err,
        SupervisorError::CommandInFlight {
            command: "slow".to_string()
        }
    );
    assert!(sup.status().command_in_flight);

    let first = background.await.unwrap().unwrap();
    assert!(first.success);
    assert_eq!(first.output, "done\n% ");
    assert!(!sup.status().command_in_flight);

    // the rejected text never reached the shell
    let history = sup.submit(CommandRequest::new("history")).await.unwrap();
    assert!(history.output.contains("|slow"), "{}", history.output);
    assert!(!history.output.contains("puts hi"), "{}", history.output);

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_timed_out_command_stays_pending_until_cleared() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let result = sup
        .submit(CommandRequest::new("hang").with_timeout(Duration::from_millis(200)))
        .await
        .unwrap();
    assert!(result.timed_out);
    assert_eq!(result.output, "working\n");

    let status = sup.status();
    assert!(status.command_in_flight);
    assert_eq!(status.pending_command.as_deref(), Some("hang"));

    let err = sup.submit(CommandRequest::new("next")).await.unwrap_err();
    assert_eq!(
        err,
        SupervisorError::CommandInFlight {
            command: "hang".to_string()
        }
    );

    sup.clear_pending().await.unwrap();
    assert!(sup.status().pending_command.is_none());
    assert_eq!(
        sup.clear_pending().await.unwrap_err(),
        SupervisorError::NoPendingCommand
    );

    let result = sup.submit(CommandRequest::new("next")).await.unwrap();
    assert!(result.success);
    assert_eq!(result.output, "ran: next\n% ");

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_await_pending_collects_late_prompt() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let result = sup
        .submit(CommandRequest::new("slow").with_timeout(Duration::from_millis(100)))
        .await
        .unwrap();
    assert!(result.timed_out);

    let late = sup
        .await_pending(Some(Duration::from_secs(3)))
        .await
        .unwrap();
    assert!(late.success);
    assert_eq!(late.command, "slow");
    assert_eq!(late.output, "done\n% ");
    assert!(sup.status().pending_command.is_none());

    assert_eq!(
        sup.await_pending(None).await.unwrap_err(),
        SupervisorError::NoPendingCommand
    );

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_await_pending_sees_prompt_split_by_timeout() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let result = sup
        .submit(CommandRequest::new("slowsplit").with_timeout(Duration::from_millis(150)))
        .await
        .unwrap();
    assert!(result.timed_out);
    assert_eq!(result.output, "half");

    let late = sup
        .await_pending(Some(Duration::from_secs(2)))
        .await
        .unwrap();
    assert!(late.success, "{late:?}");
    assert_eq!(late.output, "% ");
    assert!(sup.status().pending_command.is_none());

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_await_pending_keeps_custom_prompt() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let result = sup
        .submit(
            CommandRequest::new("slowmore")
                .with_prompt("--More--")
                .with_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap();
    assert!(result.timed_out);

    let page = sup
        .await_pending(Some(Duration::from_secs(2)))
        .await
        .unwrap();
    assert!(page.success, "{page:?}");
    assert_eq!(page.output, "page 1\n--More--");

    let rest = sup.submit(CommandRequest::new("")).await.unwrap();
    assert_eq!(rest.output, "page 2\n% ");

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_huge_timeout_does_not_overflow() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let result = sup
        .submit(CommandRequest::new("foo").with_timeout(Duration::from_secs_f64(1e19)))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.output, "ran: foo\n% ");
    assert!(sup.status().pending_command.is_none());

    let result = sup
        .submit(CommandRequest::new("bar").with_timeout(Duration::MAX))
        .await
        .unwrap();
    assert!(result.success);

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_submit_during_startup_is_rejected() {
    let mut fixture = Fixture::new(SLOW_BANNER_SHELL);
    fixture.settings.startup_commands = vec!["set tcl_interactive 1".to_string()];
    let sup = Arc::new(fixture.supervisor());

    let starting = {
        let sup = Arc::clone(&sup);
        tokio::spawn(async move { sup.start().await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;

    let err = sup.submit(CommandRequest::new("early")).await.unwrap_err();
    assert!(
        matches!(err, SupervisorError::CommandInFlight { .. }),
        "{err:?}"
    );
    assert!(sup.status().command_in_flight);

    let report = starting.await.unwrap().unwrap();
    assert!(report.prompt_seen);
    assert!(report.output.contains("ran: set tcl_interactive 1"));
    assert!(!report.output.contains("early"));
    assert!(!sup.status().command_in_flight);

    let result = sup.submit(CommandRequest::new("late")).await.unwrap();
    assert_eq!(result.output, "ran: late\n% ");

    sup.stop().await.unwrap();
}

fn oversized_command() -> String {
    format!("puts {}", "x".repeat(4 * 1024 * 1024))
}

#[tokio::test]
async fn test_blocked_input_times_out() {
    let fixture = Fixture::new(DEAF_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let started = Instant::now();
    let result = sup
        .submit(CommandRequest::new(oversized_command()).with_timeout(Duration::from_millis(500)))
        .await
        .unwrap();
    assert!(result.timed_out);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(sup.status().pending_command.is_some());

    let started = Instant::now();
    let report = sup.stop().await.unwrap();
    assert!(report.forced);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_stop_interrupts_blocked_write() {
    let fixture = Fixture::new(DEAF_SHELL);
    let sup = Arc::new(fixture.supervisor());
    sup.start().await.unwrap();

    let writing = {
        let sup = Arc::clone(&sup);
        tokio::spawn(async move {
            sup.submit(CommandRequest::new(oversized_command()).with_timeout(Duration::from_secs(30)))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    let report = sup.stop().await.unwrap();
    assert!(report.forced);
    assert!(started.elapsed() < Duration::from_secs(4));

    let err = writing.await.unwrap().unwrap_err();
    assert!(matches!(err, SupervisorError::ProcessDead { .. }), "{err:?}");
    assert_eq!(sup.status().state, SupervisorState::Stopped);
}

#[tokio::test]
async fn test_process_exit_during_command_is_process_dead() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let err = sup.submit(CommandRequest::new("die")).await.unwrap_err();
    match err {
        SupervisorError::ProcessDead { output } => assert!(output.contains("fatal error")),
        other => panic!("expected ProcessDead, got {other:?}"),
    }

    let status = sup.status();
    assert_eq!(status.state, SupervisorState::Stopped);
    assert!(!status.running);

    let err = sup.submit(CommandRequest::new("foo")).await.unwrap_err();
    assert_eq!(err, SupervisorError::NotRunning);
}

#[tokio::test]
async fn test_crash_between_commands_is_detected_lazily() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let result = sup.submit(CommandRequest::new("crash")).await.unwrap();
    assert!(result.success);
    tokio::time::sleep(Duration::from_millis(500)).await;

    let status = sup.status();
    assert!(!status.running);
    assert_eq!(status.state, SupervisorState::Running);
    assert!(status.is_crashed());

    let err = sup.submit(CommandRequest::new("foo")).await.unwrap_err();
    assert!(matches!(err, SupervisorError::ProcessDead { .. }));
    assert_eq!(sup.status().state, SupervisorState::Stopped);

    sup.start().await.unwrap();
    let result = sup.submit(CommandRequest::new("foo")).await.unwrap();
    assert!(result.success);

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_start_replaces_crashed_process() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    let first = sup.start().await.unwrap();

    sup.submit(CommandRequest::new("crash")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let second = sup.start().await.unwrap();
    assert_ne!(first.pid, second.pid);
    assert!(sup.status().running);

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_interrupts_waiting_submit() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = Arc::new(fixture.supervisor());
    sup.start().await.unwrap();

    let waiting = {
        let sup = Arc::clone(&sup);
        tokio::spawn(async move {
            sup.submit(CommandRequest::new("hang").with_timeout(Duration::from_secs(10)))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    let report = sup.stop().await.unwrap();
    assert!(report.was_running);

    let err = waiting.await.unwrap().unwrap_err();
    assert!(matches!(err, SupervisorError::ProcessDead { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(sup.status().state, SupervisorState::Stopped);
    assert!(!sup.status().command_in_flight);
}

#[tokio::test]
async fn test_prompt_split_across_reads() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let result = sup.submit(CommandRequest::new("split")).await.unwrap();
    assert!(result.success);
    assert_eq!(result.output, "half% ");

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_custom_prompt_and_empty_command() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let page = sup
        .submit(CommandRequest::new("more").with_prompt("--More--"))
        .await
        .unwrap();
    assert!(page.success);
    assert_eq!(page.output, "page 1\n--More--");

    let rest = sup.submit(CommandRequest::new("")).await.unwrap();
    assert!(rest.success);
    assert_eq!(rest.output, "page 2\n% ");

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_stderr_is_merged_into_output() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    // stderr written right before the prompt must not land after it
    for _ in 0..20 {
        let result = sup
            .submit(CommandRequest::new("err").with_timeout(Duration::from_secs(2)))
            .await
            .unwrap();
        assert!(result.success, "{result:?}");
        assert_eq!(result.output, "oops\nafter\n% ");
    }

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_stderr_can_be_discarded() {
    let mut fixture = Fixture::new(FAKE_SHELL);
    fixture.settings.capture_stderr = false;
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let result = sup.submit(CommandRequest::new("err")).await.unwrap();
    assert!(result.success);
    assert_eq!(result.output, "after\n% ");

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_startup_commands_run_after_banner() {
    let mut fixture = Fixture::new(FAKE_SHELL);
    fixture.settings.startup_commands = vec!["set tcl_interactive 1".to_string()];
    let sup = fixture.supervisor();

    let report = sup.start().await.unwrap();
    assert!(report.prompt_seen);
    assert!(report.output.contains("ran: set tcl_interactive 1"));
    assert!(!sup.status().command_in_flight);

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn test_graceful_stop_uses_exit_command() {
    let fixture = Fixture::new(FAKE_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let report = sup.stop().await.unwrap();
    assert!(report.was_running);
    assert!(!report.forced);
    assert_eq!(report.exit_code, Some(0));

    let again = sup.stop().await.unwrap();
    assert!(!again.was_running);
}

#[tokio::test]
async fn test_stop_escalates_when_exit_is_ignored() {
    let fixture = Fixture::new(STUBBORN_SHELL);
    let sup = fixture.supervisor();
    sup.start().await.unwrap();

    let started = Instant::now();
    let report = sup.stop().await.unwrap();
    assert!(report.was_running);
    assert!(report.forced);
    assert_eq!(report.exit_code, None);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!sup.status().running);
}
