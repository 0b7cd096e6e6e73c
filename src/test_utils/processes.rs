//! Scripted process table for [`ProcessGuard`](crate::update::guard::ProcessGuard) tests.

use crate::update::guard::{
    Pid, ProcessInfo, ProcessLister, ProcessMatcher, ProcessTerminator, Signal, SignalOutcome,
    current_uid,
};
use anyhow::Result;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// How a fake process reacts to signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeProcess {
    exits_on_graceful: bool,
    exits_on_forceful: bool,
}

impl FakeProcess {
    /// Exits on SIGTERM.
    pub fn cooperative() -> Self {
        Self {
            exits_on_graceful: true,
            exits_on_forceful: true,
        }
    }

    /// Only SIGKILL stops it.
    pub fn ignores_term() -> Self {
        Self {
            exits_on_graceful: false,
            exits_on_forceful: true,
        }
    }

    /// Survives everything, like a process stuck in uninterruptible sleep.
    pub fn unkillable() -> Self {
        Self {
            exits_on_graceful: false,
            exits_on_forceful: false,
        }
    }
}

#[derive(Debug)]
struct Entry {
    info: ProcessInfo,
    behavior: FakeProcess,
    alive: bool,
}

#[derive(Debug, Default)]
struct TableState {
    entries: Vec<Entry>,
    signals: Vec<(Pid, Signal)>,
}

/// Fake process table implementing both [`ProcessLister`] and [`ProcessTerminator`].
#[derive(Debug, Clone, Default)]
pub struct FakeProcessTable {
    state: Arc<Mutex<TableState>>,
}

impl FakeProcessTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a running process.
    pub fn with_process(self, info: ProcessInfo, behavior: FakeProcess) -> Self {
        self.state.lock().unwrap().entries.push(Entry {
            info,
            behavior,
            alive: true,
        });
        self
    }

    /// Every signal delivered, in order.
    pub fn signals(&self) -> Vec<(Pid, Signal)> {
        self.state.lock().unwrap().signals.clone()
    }

    /// Pids still alive.
    pub fn running_pids(&self) -> Vec<Pid> {
        self.state.lock().unwrap().entries.iter().filter(|e| e.alive).map(|e| e.info.pid).collect()
    }
}

impl ProcessLister for FakeProcessTable {
    fn list(&self, matcher: &ProcessMatcher) -> Result<Vec<Pid>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.alive && matcher.matches(&e.info))
            .map(|e| e.info.pid)
            .collect())
    }
}

impl ProcessTerminator for FakeProcessTable {
    fn signal(&self, pid: Pid, signal: Signal) -> Result<SignalOutcome> {
        let mut state = self.state.lock().unwrap();
        state.signals.push((pid, signal));

        let Some(entry) = state.entries.iter_mut().find(|e| e.info.pid == pid && e.alive) else {
            return Ok(SignalOutcome::AlreadyExited);
        };
        let exits = match signal {
            Signal::Graceful => entry.behavior.exits_on_graceful,
            Signal::Forceful => entry.behavior.exits_on_forceful,
        };
        if exits {
            entry.alive = false;
        }
        Ok(SignalOutcome::Delivered)
    }
}

/// A process of the current user running the binary at `binary_path`.
pub fn running_app(pid: Pid, binary_path: &Path) -> ProcessInfo {
    ProcessInfo {
        pid,
        uid: current_uid(),
        name: binary_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        exe: Some(binary_path.to_path_buf()),
        cmdline: vec![binary_path.display().to_string()],
    }
}
