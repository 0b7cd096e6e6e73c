//! Discovery and termination of running instances of the managed application.
//!
//! Escalation policy lives in [`ProcessGuard`]. The platform-specific parts are
//! behind two capabilities:
//!
//! - [`ProcessLister`] - which processes currently match a [`ProcessMatcher`]
//! - [`ProcessTerminator`] - deliver a graceful or forceful stop signal
//!
//! The production implementations read `/proc` ([`ProcfsLister`]) and call
//! `kill(2)` ([`SignalTerminator`]).

use crate::constants::{FORCE_KILL_SETTLE, TERMINATION_POLL_INTERVAL};
use crate::core::AiupError;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Process id.
pub type Pid = u32;

/// Snapshot of one process as seen by a [`ProcessLister`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// Process id
    pub pid: Pid,
    /// Real user id of the owner
    pub uid: u32,
    /// Short process name (`comm`)
    pub name: String,
    /// Resolved executable, when readable
    pub exe: Option<PathBuf>,
    /// Command line arguments
    pub cmdline: Vec<String>,
}

/// Identity of the processes to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessMatcher {
    /// Executable, or one whole command-line argument, is this path.
    ByPath(PathBuf),
    /// Process name or executable file name equals this.
    ByName(String),
    /// Owned by this user id.
    ByOwner(u32),
    /// Every inner matcher matches.
    All(Vec<ProcessMatcher>),
}

impl ProcessMatcher {
    /// Instances of the binary at `binary_path` owned by the invoking user.
    ///
    /// Never matches another user's session.
    pub fn for_current_user(binary_path: &Path) -> Self {
        Self::All(vec![Self::ByOwner(current_uid()), Self::ByPath(binary_path.to_path_buf())])
    }

    /// Whether `process` matches.
    pub fn matches(&self, process: &ProcessInfo) -> bool {
        match self {
            Self::ByPath(path) => {
                if process.exe.as_deref() == Some(path.as_path()) {
                    return true;
                }
                process.cmdline.iter().any(|arg| Path::new(arg) == path.as_path())
            }
            Self::ByName(name) => {
                process.name == *name
                    || process
                        .exe
                        .as_deref()
                        .and_then(Path::file_name)
                        .is_some_and(|file_name| file_name == name.as_str())
            }
            Self::ByOwner(uid) => process.uid == *uid,
            Self::All(matchers) => matchers.iter().all(|m| m.matches(process)),
        }
    }
}

/// Termination strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Cooperative stop request (SIGTERM).
    Graceful,
    /// Unconditional kill (SIGKILL).
    Forceful,
}

/// Result of delivering a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The signal was delivered.
    Delivered,
    /// The process no longer exists.
    AlreadyExited,
}

/// Lists processes matching a [`ProcessMatcher`].
pub trait ProcessLister: Send + Sync {
    /// Ids of all currently running processes that match.
    fn list(&self, matcher: &ProcessMatcher) -> Result<Vec<Pid>>;
}

/// Delivers termination signals.
pub trait ProcessTerminator: Send + Sync {
    /// Send `signal` to `pid`.
    fn signal(&self, pid: Pid, signal: Signal) -> Result<SignalOutcome>;
}

/// What [`ProcessGuard::terminate_running_instances`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminationReport {
    /// Processes that matched initially
    pub matched: Vec<Pid>,
    /// Processes that needed a forceful kill
    pub force_killed: Vec<Pid>,
}

/// Stops running instances with escalating force.
///
/// 1. Graceful signal to every match
/// 2. Wait up to the grace interval for them to exit
/// 3. Forceful signal to each survivor
/// 4. Final check; any survivor is fatal
///
/// The installer's own process is never signalled.
pub struct ProcessGuard<L, T> {
    lister: L,
    terminator: T,
    matcher: ProcessMatcher,
    grace: Duration,
    settle: Duration,
}

impl<L: ProcessLister, T: ProcessTerminator> ProcessGuard<L, T> {
    /// Create a guard for processes matching `matcher`.
    pub fn new(lister: L, terminator: T, matcher: ProcessMatcher, grace: Duration) -> Self {
        Self {
            lister,
            terminator,
            matcher,
            grace,
            settle: FORCE_KILL_SETTLE,
        }
    }

    /// Override the wait after forceful kills before the final check.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// The matcher in use.
    pub fn matcher(&self) -> &ProcessMatcher {
        &self.matcher
    }

    fn running(&self) -> Result<Vec<Pid>> {
        let own_pid = std::process::id();
        let mut pids = self.lister.list(&self.matcher)?;
        pids.retain(|pid| *pid != own_pid);
        pids.sort_unstable();
        pids.dedup();
        Ok(pids)
    }

    /// Stop every matching process.
    ///
    /// No matching process is success.
    ///
    /// # Errors
    ///
    /// [`AiupError::ProcessTermination`] when a process is still running after
    /// forceful termination, or an error from the lister.
    pub async fn terminate_running_instances(&self) -> Result<TerminationReport> {
        let matched = self.running()?;
        if matched.is_empty() {
            debug!("No running instances found");
            return Ok(TerminationReport::default());
        }

        info!(count = matched.len(), "Requesting running instances to exit");
        for &pid in &matched {
            match self.terminator.signal(pid, Signal::Graceful) {
                Ok(outcome) => debug!(pid, ?outcome, "Sent graceful termination"),
                Err(e) => warn!("Graceful termination of pid {pid} failed: {e:#}"),
            }
        }

        let survivors = self.wait_for_exit().await?;
        if survivors.is_empty() {
            return Ok(TerminationReport {
                matched,
                force_killed: Vec::new(),
            });
        }

        warn!(count = survivors.len(), "Instances survived graceful termination, killing");
        for &pid in &survivors {
            match self.terminator.signal(pid, Signal::Forceful) {
                Ok(outcome) => debug!(pid, ?outcome, "Sent forceful termination"),
                Err(e) => warn!("Forceful termination of pid {pid} failed: {e:#}"),
            }
        }

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        let remaining = self.running()?;
        if !remaining.is_empty() {
            return Err(AiupError::ProcessTermination {
                survivors: remaining,
            }
            .into());
        }

        Ok(TerminationReport {
            matched,
            force_killed: survivors,
        })
    }

    /// Poll until no match remains or the grace interval elapses.
    async fn wait_for_exit(&self) -> Result<Vec<Pid>> {
        let deadline = Instant::now() + self.grace;
        loop {
            let survivors = self.running()?;
            let now = Instant::now();
            if survivors.is_empty() || now >= deadline {
                return Ok(survivors);
            }
            tokio::time::sleep(TERMINATION_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// User id of the invoking user.
#[cfg(unix)]
pub fn current_uid() -> u32 {
    // SAFETY: getuid has no preconditions and cannot fail.
    unsafe { libc::getuid() }
}

/// User id of the invoking user.
#[cfg(not(unix))]
pub fn current_uid() -> u32 {
    0
}

/// [`ProcessLister`] backed by `/proc`.
#[derive(Debug, Clone)]
pub struct ProcfsLister {
    root: PathBuf,
}

impl Default for ProcfsLister {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/proc"),
        }
    }
}

impl ProcfsLister {
    /// Lister reading from a different proc root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Read one process entry. `None` if it vanished or is unreadable.
    fn read_process(&self, pid: Pid) -> Option<ProcessInfo> {
        let dir = self.root.join(pid.to_string());

        let status = std::fs::read_to_string(dir.join("status")).ok()?;
        let mut name = String::new();
        let mut uid = None;
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("Name:") {
                name = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("Uid:") {
                uid = rest.split_whitespace().next().and_then(|v| v.parse().ok());
            }
        }

        let cmdline = std::fs::read(dir.join("cmdline"))
            .map(|raw| {
                raw.split(|b| *b == 0)
                    .filter(|arg| !arg.is_empty())
                    .map(|arg| String::from_utf8_lossy(arg).into_owned())
                    .collect()
            })
            .unwrap_or_default();

        Some(ProcessInfo {
            pid,
            uid: uid?,
            name,
            exe: std::fs::read_link(dir.join("exe")).ok(),
            cmdline,
        })
    }

    /// Snapshot of every readable process.
    pub fn snapshot(&self) -> Result<Vec<ProcessInfo>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("{} not available, cannot discover processes", self.root.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(|n| n.parse::<Pid>().ok()))
            .filter_map(|pid| self.read_process(pid))
            .collect())
    }
}

impl ProcessLister for ProcfsLister {
    fn list(&self, matcher: &ProcessMatcher) -> Result<Vec<Pid>> {
        Ok(self
            .snapshot()?
            .into_iter()
            .filter(|process| matcher.matches(process))
            .map(|process| process.pid)
            .collect())
    }
}

/// [`ProcessTerminator`] that delivers POSIX signals with `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalTerminator;

impl ProcessTerminator for SignalTerminator {
    #[cfg(unix)]
    fn signal(&self, pid: Pid, signal: Signal) -> Result<SignalOutcome> {
        // PID 0 and negative PIDs address process groups in kill()
        let pid_i32 = i32::try_from(pid)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| anyhow::anyhow!("Invalid pid {pid}"))?;
        let signo = match signal {
            Signal::Graceful => libc::SIGTERM,
            Signal::Forceful => libc::SIGKILL,
        };

        // SAFETY: kill has no memory safety preconditions; pid is a positive
        // process id so only that single process is addressed.
        let rc = unsafe { libc::kill(pid_i32, signo) };
        if rc == 0 {
            return Ok(SignalOutcome::Delivered);
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(SignalOutcome::AlreadyExited)
        } else {
            Err(anyhow::Error::new(err).context(format!("kill({pid}) failed")))
        }
    }

    #[cfg(not(unix))]
    fn signal(&self, pid: Pid, _signal: Signal) -> Result<SignalOutcome> {
        anyhow::bail!("Cannot signal pid {pid} on this platform")
    }
}
