//! Supervisor for one long-lived `gw_sh` process.
//!
//! Lifecycle: `Stopped → Starting → Running → Stopping → Stopped`. A crash is
//! observed lazily (the reader loop clears the alive flag, or `try_wait`
//! reports an exit) and only turned into `Stopped` by the next operation
//! that needs the process.
//!
//! # Locking
//!
//! - `inner` (a std mutex) guards the state, the process handle and the
//!   command slot. It is only held for short, non-async sections.
//! - `lifecycle` (an async mutex) serializes `start` against `stop`. `submit`
//!   never takes it, so `stop` can run while a command is waiting.
//! - The output buffer has its own lock, so the reader loop never waits
//!   behind a caller.
//!
//! The startup handshake owns the command slot until it finishes, so a
//! caller's command cannot slip in ahead of the startup commands.
//!
//! Every process lifetime gets a new `epoch`. Round-trips remember the epoch
//! they started in and treat a change as the process going away.

use std::io;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use gwsh_core::{
    CommandOutput, CommandRequest, ProcessStatus, Settings, SettingsError, StartReport,
    StopReport, SupervisorError, SupervisorState,
};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::buffer::{OutputBuffer, output_buffer};
use crate::process::{shutdown_child, spawn_output_reader, spawn_shell};
use crate::prompt::PromptDetector;

/// How long `stop` waits for the reader loop to finish before aborting it.
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Deadline used when a wait budget does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Slot owner reported while the startup handshake runs.
const STARTUP_SLOT: &str = "<startup>";

type SharedStdin = Arc<tokio::sync::Mutex<ChildStdin>>;

/// The spawned process and everything tied to its lifetime.
struct ProcessHandle {
    child: Child,
    stdin: SharedStdin,
    pid: Option<u32>,
    buffer: OutputBuffer,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

impl ProcessHandle {
    /// Exit status if the child has exited, without blocking.
    fn exit_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    fn is_alive(&mut self) -> bool {
        self.alive.load(Ordering::SeqCst) && self.exit_status().is_none()
    }
}

/// Which command, if any, owns the shell's input right now.
#[derive(Debug, Clone, Default)]
enum CommandSlot {
    #[default]
    Idle,
    /// A caller is waiting for the prompt.
    InFlight { command: String },
    /// The wait timed out; the command may still be running. `prompt` is
    /// the per-command token it was waiting for, if any.
    Pending {
        command: String,
        prompt: Option<String>,
    },
}

#[derive(Default)]
struct Inner {
    state: SupervisorState,
    process: Option<ProcessHandle>,
    command: CommandSlot,
    epoch: u64,
}

impl Inner {
    /// Drop the process handle and fall back to `Stopped`.
    ///
    /// The child is killed on drop if it is somehow still running.
    fn release(&mut self) -> Option<ProcessHandle> {
        self.state = SupervisorState::Stopped;
        self.command = CommandSlot::Idle;
        self.epoch += 1;
        self.process.take()
    }
}

/// What a round-trip needs after it has been accepted.
struct RoundTrip {
    stdin: SharedStdin,
    buffer: OutputBuffer,
    alive: Arc<AtomicBool>,
    epoch: u64,
}

enum Wait {
    Ready(String),
    TimedOut(String),
    Dead(String),
}

/// Clears the command slot when a round-trip ends.
///
/// Unless [`InFlightGuard::complete`] is called, the slot is left `Pending`,
/// so a round-trip that is dropped mid-wait still blocks the next command
/// until it is explicitly cleared.
struct InFlightGuard<'a> {
    supervisor: &'a TclShellSupervisor,
    epoch: u64,
    command: String,
    prompt: Option<String>,
    completed: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(
        supervisor: &'a TclShellSupervisor,
        epoch: u64,
        command: &str,
        prompt: Option<&str>,
    ) -> Self {
        Self {
            supervisor,
            epoch,
            command: command.to_string(),
            prompt: prompt.map(str::to_string),
            completed: false,
        }
    }

    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.supervisor.lock_inner();
        if inner.epoch != self.epoch {
            return;
        }
        inner.command = if self.completed {
            CommandSlot::Idle
        } else {
            CommandSlot::Pending {
                command: std::mem::take(&mut self.command),
                prompt: self.prompt.take(),
            }
        };
    }
}

/// Supervisor for a single interactive Tcl shell.
///
/// Dropping the supervisor kills a still-running shell.
pub struct TclShellSupervisor {
    settings: Settings,
    detector: PromptDetector,
    inner: Mutex<Inner>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl TclShellSupervisor {
    /// Create a stopped supervisor.
    pub fn new(settings: Settings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            detector: PromptDetector::new(settings.prompt_token.clone()),
            settings,
            inner: Mutex::new(Inner::default()),
            lifecycle: tokio::sync::Mutex::new(()),
        })
    }

    /// Settings this supervisor was built with.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the shell, launch the reader loop and run the startup handshake.
    pub async fn start(&self) -> Result<StartReport, SupervisorError> {
        let lifecycle = self.lifecycle.lock().await;

        {
            let mut inner = self.lock_inner();
            match inner.state {
                SupervisorState::Stopped => {}
                SupervisorState::Running => {
                    let pid = inner.process.as_ref().and_then(|p| p.pid);
                    let alive = inner.process.as_mut().is_some_and(ProcessHandle::is_alive);
                    if alive {
                        return Err(SupervisorError::AlreadyRunning { pid });
                    }
                    warn!(pid = ?pid, "Previous shell exited unexpectedly; restarting");
                    drop(inner.release());
                }
                SupervisorState::Starting | SupervisorState::Stopping => {
                    return Err(SupervisorError::AlreadyRunning { pid: None });
                }
            }
            inner.state = SupervisorState::Starting;
        }

        let shell = match spawn_shell(&self.settings) {
            Ok(shell) => shell,
            Err(e) => {
                self.lock_inner().state = SupervisorState::Stopped;
                return Err(e);
            }
        };
        let child = shell.child;
        let pid = child.id();

        let (sink, buffer) = output_buffer();
        let alive = Arc::new(AtomicBool::new(true));
        let reader = spawn_output_reader(shell.output, shell.stderr, sink, Arc::clone(&alive));

        {
            let mut inner = self.lock_inner();
            inner.process = Some(ProcessHandle {
                child,
                stdin: Arc::new(tokio::sync::Mutex::new(shell.stdin)),
                pid,
                buffer,
                alive,
                reader,
                started_at: Utc::now(),
            });
            inner.state = SupervisorState::Running;
            inner.command = CommandSlot::InFlight {
                command: STARTUP_SLOT.to_string(),
            };
            inner.epoch += 1;
        }
        info!(
            pid = ?pid,
            executable = %self.settings.executable.display(),
            "Gowin shell started"
        );

        // stop must be able to interrupt the handshake
        drop(lifecycle);

        let (prompt_seen, output) = self.handshake().await?;
        Ok(StartReport {
            pid,
            prompt_seen,
            output,
        })
    }

    /// Wait for the banner prompt, then run the configured startup commands.
    ///
    /// Runs while the slot is claimed under [`STARTUP_SLOT`]; a startup
    /// command that times out is discarded rather than left pending.
    async fn handshake(&self) -> Result<(bool, String), SupervisorError> {
        let trip = self.current_trip()?;
        let guard = InFlightGuard::new(self, trip.epoch, STARTUP_SLOT, None);
        let mut output = String::new();

        let deadline = deadline_after(self.settings.startup_timeout);
        let prompt_seen = match self.wait_for_prompt(&trip, &self.detector, deadline).await {
            Wait::Ready(text) => {
                output.push_str(&text);
                true
            }
            Wait::TimedOut(text) => {
                debug!("No initial prompt within the startup timeout");
                output.push_str(&text);
                output.push_str(&trip.buffer.drain());
                false
            }
            Wait::Dead(text) => {
                self.mark_dead(trip.epoch);
                return Err(SupervisorError::ProcessDead { output: text });
            }
        };

        for command in &self.settings.startup_commands {
            let deadline = deadline_after(self.settings.startup_timeout);
            if let Err(e) = write_line(&trip.stdin, command, deadline).await {
                if e.kind() == io::ErrorKind::BrokenPipe {
                    return Err(self.input_closed(&trip));
                }
                warn!(command = %command, error = %e, "Startup command failed");
                output.push_str(&format!("\n[startup command '{command}' failed: {e}]\n"));
                continue;
            }
            match self.wait_for_prompt(&trip, &self.detector, deadline).await {
                Wait::Ready(text) => output.push_str(&text),
                Wait::TimedOut(text) => {
                    warn!(command = %command, "Startup command timed out");
                    output.push_str(&text);
                    output.push_str(&trip.buffer.drain());
                    output.push_str(&format!("\n[startup command '{command}' timed out]\n"));
                }
                Wait::Dead(text) => {
                    self.mark_dead(trip.epoch);
                    return Err(SupervisorError::ProcessDead { output: text });
                }
            }
        }

        guard.complete();
        Ok((prompt_seen, output))
    }

    /// Shut the shell down: exit command, then SIGTERM, then SIGKILL.
    ///
    /// Succeeds trivially when nothing is running. A `submit` waiting
    /// concurrently observes `ProcessDead` on its next poll.
    pub async fn stop(&self) -> Result<StopReport, SupervisorError> {
        let _lifecycle = self.lifecycle.lock().await;

        let handle = {
            let mut inner = self.lock_inner();
            let handle = inner.release();
            if handle.is_some() {
                inner.state = SupervisorState::Stopping;
            }
            handle
        };

        let Some(handle) = handle else {
            debug!("Stop requested but no shell is running");
            return Ok(StopReport::already_stopped());
        };

        let report = self.terminate(handle).await;
        self.lock_inner().state = SupervisorState::Stopped;
        info!(
            forced = report.forced,
            exit_code = ?report.exit_code,
            "Gowin shell stopped"
        );
        Ok(report)
    }

    async fn terminate(&self, mut handle: ProcessHandle) -> StopReport {
        let pid = handle.pid;
        let mut forced = false;

        let graceful = match handle.exit_status() {
            Some(status) => Some(status),
            None => self.request_exit(&mut handle).await,
        };

        let status = match graceful {
            Some(status) => Some(status),
            None => {
                forced = true;
                warn!(pid = ?pid, "Shell ignored the exit command; terminating");
                match shutdown_child(&mut handle.child, self.settings.terminate_grace).await {
                    Ok(status) => Some(status),
                    Err(e) => {
                        warn!(pid = ?pid, error = %e, "Failed to terminate shell");
                        None
                    }
                }
            }
        };

        if timeout(READER_JOIN_TIMEOUT, &mut handle.reader)
            .await
            .is_err()
        {
            debug!(pid = ?pid, "Reader loop still running after stop; aborting it");
            handle.reader.abort();
        }

        StopReport {
            was_running: true,
            forced,
            exit_code: status.and_then(|s| s.code()),
        }
    }

    /// Send the exit command and give the shell `exit_grace` to leave.
    ///
    /// The command is skipped when a blocked write still holds the input.
    async fn request_exit(&self, handle: &mut ProcessHandle) -> Option<ExitStatus> {
        let pid = handle.pid;
        let stdin = Arc::clone(&handle.stdin);
        let exit_command = self.settings.exit_command.as_str();
        let child = &mut handle.child;

        let exited = timeout(self.settings.exit_grace, async move {
            match stdin.try_lock() {
                Ok(mut input) => {
                    if let Err(e) = send_line(&mut input, exit_command).await {
                        debug!(pid = ?pid, error = %e, "Could not send exit command");
                    }
                }
                Err(_) => debug!(pid = ?pid, "Shell input is busy; not sending exit command"),
            }
            child.wait().await
        })
        .await;

        match exited {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                warn!(pid = ?pid, error = %e, "Error waiting for shell exit");
                None
            }
            Err(_) => None,
        }
    }

    /// Current status. Never changes the lifecycle state.
    pub fn status(&self) -> ProcessStatus {
        let mut inner = self.lock_inner();
        let (command_in_flight, pending_command) = match &inner.command {
            CommandSlot::Idle => (false, None),
            CommandSlot::InFlight { .. } => (true, None),
            CommandSlot::Pending { command, .. } => (true, Some(command.clone())),
        };
        let state = inner.state;

        let Some(process) = inner.process.as_mut() else {
            return ProcessStatus {
                state,
                command_in_flight,
                pending_command,
                ..ProcessStatus::stopped()
            };
        };

        let exit = process.exit_status();
        ProcessStatus {
            state,
            running: exit.is_none() && process.alive.load(Ordering::SeqCst),
            pid: process.pid,
            command_in_flight,
            pending_command,
            buffered_length: process.buffer.len(),
            started_at: Some(process.started_at),
            exit_code: exit.and_then(|s| s.code()),
        }
    }

    /// Write one command line and wait for the prompt or the deadline.
    ///
    /// The deadline covers the write too: a shell that stops reading its
    /// input makes the command time out instead of blocking the caller.
    pub async fn submit(&self, request: CommandRequest) -> Result<CommandOutput, SupervisorError> {
        let wait_budget = request.timeout.unwrap_or(self.settings.command_timeout);
        let detector = request
            .prompt
            .as_deref()
            .map_or_else(|| self.detector.clone(), PromptDetector::new);

        let trip = self.begin(&request.text)?;
        let guard = InFlightGuard::new(self, trip.epoch, &request.text, request.prompt.as_deref());
        let started = Instant::now();
        let deadline = deadline_after(wait_budget);

        debug!(command = %request.text, timeout_ms = wait_budget.as_millis(), "Sending command");
        match write_line(&trip.stdin, &request.text, deadline).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                warn!(command = %request.text, "Shell input is closed; process is dead");
                return Err(self.input_closed(&trip));
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                // part of the line may have been written; leave it pending
                drop(guard);
                warn!(command = %request.text, "Shell is not reading its input; command left pending");
                let output = detector.take_unfinished(&trip.buffer);
                return Ok(CommandOutput::timed_out(&request.text, output, started.elapsed()));
            }
            Err(e) => {
                // the command never reached the shell
                guard.complete();
                return Err(SupervisorError::Io(e.to_string()));
            }
        }

        self.finish_round_trip(&request.text, trip, guard, &detector, started, deadline)
            .await
    }

    /// Keep waiting for a command that timed out earlier.
    ///
    /// Waits for the same prompt the command was submitted with. On success
    /// the pending marker is cleared; on another timeout it stays and the
    /// output received meanwhile is returned.
    pub async fn await_pending(
        &self,
        wait: Option<Duration>,
    ) -> Result<CommandOutput, SupervisorError> {
        let wait_budget = wait.unwrap_or(self.settings.command_timeout);
        let (command, prompt, trip) = self.resume()?;
        let guard = InFlightGuard::new(self, trip.epoch, &command, prompt.as_deref());
        let detector = prompt.map_or_else(|| self.detector.clone(), PromptDetector::new);
        let started = Instant::now();

        debug!(command = %command, prompt = %detector.token(), "Waiting on pending command");
        self.finish_round_trip(
            &command,
            trip,
            guard,
            &detector,
            started,
            deadline_after(wait_budget),
        )
        .await
    }

    /// Drop the pending marker and return the discarded output.
    pub async fn clear_pending(&self) -> Result<String, SupervisorError> {
        let mut inner = self.lock_inner();
        if inner.process.is_none() {
            return Err(SupervisorError::NotRunning);
        }
        let pending = match &inner.command {
            CommandSlot::Idle => return Err(SupervisorError::NoPendingCommand),
            CommandSlot::InFlight { command } => {
                return Err(SupervisorError::CommandInFlight {
                    command: command.clone(),
                });
            }
            CommandSlot::Pending { command, .. } => command.clone(),
        };
        debug!(command = %pending, "Clearing pending command");
        inner.command = CommandSlot::Idle;
        Ok(inner
            .process
            .as_ref()
            .map(|p| p.buffer.drain())
            .unwrap_or_default())
    }

    async fn finish_round_trip(
        &self,
        command: &str,
        trip: RoundTrip,
        guard: InFlightGuard<'_>,
        detector: &PromptDetector,
        started: Instant,
        deadline: Instant,
    ) -> Result<CommandOutput, SupervisorError> {
        match self.wait_for_prompt(&trip, detector, deadline).await {
            Wait::Ready(output) => {
                guard.complete();
                let elapsed = started.elapsed();
                debug!(command = %command, elapsed_ms = elapsed.as_millis(), "Command completed");
                Ok(CommandOutput::completed(command, output, elapsed))
            }
            Wait::TimedOut(output) => {
                // guard leaves the command pending
                drop(guard);
                let elapsed = started.elapsed();
                warn!(
                    command = %command,
                    elapsed_ms = elapsed.as_millis(),
                    "Timed out waiting for prompt; command left pending"
                );
                Ok(CommandOutput::timed_out(command, output, elapsed))
            }
            Wait::Dead(output) => {
                self.mark_dead(trip.epoch);
                drop(guard);
                warn!(command = %command, "Shell exited while a command was in flight");
                Err(SupervisorError::ProcessDead { output })
            }
        }
    }

    /// Accept a new round-trip: check state, claim the slot, clear the buffer.
    fn begin(&self, command: &str) -> Result<RoundTrip, SupervisorError> {
        let mut inner = self.lock_inner();
        Self::check_alive(&mut inner)?;

        match &inner.command {
            CommandSlot::Idle => {}
            CommandSlot::InFlight { command } | CommandSlot::Pending { command, .. } => {
                return Err(SupervisorError::CommandInFlight {
                    command: command.clone(),
                });
            }
        }
        inner.command = CommandSlot::InFlight {
            command: command.to_string(),
        };

        let trip = Self::trip_of(&inner)?;
        let stale = trip.buffer.drain();
        if !stale.is_empty() {
            debug!(bytes = stale.len(), "Discarding output received between commands");
        }
        Ok(trip)
    }

    /// Re-claim the slot of a pending command without clearing the buffer.
    ///
    /// Returns the command and the prompt it was submitted with.
    fn resume(&self) -> Result<(String, Option<String>, RoundTrip), SupervisorError> {
        let mut inner = self.lock_inner();
        Self::check_alive(&mut inner)?;

        let (command, prompt) = match &inner.command {
            CommandSlot::Idle => return Err(SupervisorError::NoPendingCommand),
            CommandSlot::InFlight { command } => {
                return Err(SupervisorError::CommandInFlight {
                    command: command.clone(),
                });
            }
            CommandSlot::Pending { command, prompt } => (command.clone(), prompt.clone()),
        };
        inner.command = CommandSlot::InFlight {
            command: command.clone(),
        };
        Ok((command, prompt, Self::trip_of(&inner)?))
    }

    /// `NotRunning` without a process; `ProcessDead` (and a transition to
    /// `Stopped`) when the process has exited.
    fn check_alive(inner: &mut Inner) -> Result<(), SupervisorError> {
        if inner.state != SupervisorState::Running {
            return Err(SupervisorError::NotRunning);
        }
        let Some(process) = inner.process.as_mut() else {
            return Err(SupervisorError::NotRunning);
        };
        if process.is_alive() {
            return Ok(());
        }

        let output = process.buffer.drain();
        let exit = process.exit_status();
        warn!(pid = ?process.pid, exit = ?exit, "Shell has exited; marking stopped");
        if let Some(handle) = inner.release() {
            handle.reader.abort();
        }
        Err(SupervisorError::ProcessDead { output })
    }

    fn current_trip(&self) -> Result<RoundTrip, SupervisorError> {
        let inner = self.lock_inner();
        if inner.state != SupervisorState::Running {
            return Err(SupervisorError::NotRunning);
        }
        Self::trip_of(&inner)
    }

    fn trip_of(inner: &Inner) -> Result<RoundTrip, SupervisorError> {
        let process = inner.process.as_ref().ok_or(SupervisorError::NotRunning)?;
        Ok(RoundTrip {
            stdin: Arc::clone(&process.stdin),
            buffer: process.buffer.clone(),
            alive: Arc::clone(&process.alive),
            epoch: inner.epoch,
        })
    }

    fn epoch(&self) -> u64 {
        self.lock_inner().epoch
    }

    /// Transition to `Stopped` after detecting a dead process, unless a
    /// lifecycle operation already replaced it.
    fn mark_dead(&self, epoch: u64) {
        let handle = {
            let mut inner = self.lock_inner();
            if inner.epoch != epoch || inner.state != SupervisorState::Running {
                return;
            }
            inner.release()
        };
        if let Some(mut handle) = handle {
            let exit = handle.exit_status();
            warn!(pid = ?handle.pid, exit = ?exit, "Shell process is dead");
            handle.reader.abort();
        }
    }

    /// Record that the shell's input is gone; the error carries what it
    /// printed last.
    fn input_closed(&self, trip: &RoundTrip) -> SupervisorError {
        self.mark_dead(trip.epoch);
        SupervisorError::ProcessDead {
            output: trip.buffer.drain(),
        }
    }

    /// Poll the buffer until the prompt appears, the process goes away, or
    /// the deadline passes.
    ///
    /// A timeout leaves a partial prompt at the tail of the buffer for the
    /// next wait.
    async fn wait_for_prompt(
        &self,
        trip: &RoundTrip,
        detector: &PromptDetector,
        deadline: Instant,
    ) -> Wait {
        loop {
            if detector.is_ready(&trip.buffer) {
                return Wait::Ready(trip.buffer.drain());
            }
            if !trip.alive.load(Ordering::SeqCst) || self.epoch() != trip.epoch {
                // the reader may have appended the prompt right before exiting
                if detector.is_ready(&trip.buffer) {
                    return Wait::Ready(trip.buffer.drain());
                }
                return Wait::Dead(trip.buffer.drain());
            }
            let now = Instant::now();
            if now >= deadline {
                return Wait::TimedOut(detector.take_unfinished(&trip.buffer));
            }
            sleep(self.settings.poll_interval.min(deadline - now)).await;
        }
    }
}

/// Budget measured from now. Saturates for budgets too large for an
/// `Instant`.
fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Write one line to the shell, giving up with `TimedOut` at `deadline`.
async fn write_line(
    stdin: &tokio::sync::Mutex<ChildStdin>,
    text: &str,
    deadline: Instant,
) -> io::Result<()> {
    let write = async {
        let mut input = stdin.lock().await;
        send_line(&mut input, text).await
    };
    timeout_at(deadline, write).await.map_err(|_| {
        io::Error::new(io::ErrorKind::TimedOut, "shell is not accepting input")
    })?
}

async fn send_line(stdin: &mut ChildStdin, text: &str) -> io::Result<()> {
    let mut line = String::with_capacity(text.len() + 1);
    line.push_str(text);
    line.push('\n');

    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}
