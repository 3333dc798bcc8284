use parking_lot::Mutex;

/// Run state of a download/remux session.
///
/// `Opening → Running ⇄ QueueEmpty → {Ended | Stopping | Pausing}`, with
/// `Stopping → Stopped` and `Pausing → Paused` as sinks. `Ended` is
/// terminal success; `Stopped` terminal failure or cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Sources opened, streams inspectable, no worker yet.
    Opening,
    /// The interleaver loop is actively draining.
    Running,
    /// Transient: the currently required queue(s) are drained and the loop
    /// is waiting for data or a source status change.
    QueueEmpty,
    /// A pause was requested; the worker is parking.
    Pausing,
    /// The worker is parked, trailer unwritten, resumable.
    Paused,
    /// A stop was requested; the worker is tearing down.
    Stopping,
    /// Terminal: cancelled or failed.
    Stopped,
    /// Terminal: the input's natural end was reached.
    Ended,
}

impl RunState {
    /// Whether the run has finished for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Stopped | RunState::Ended)
    }

    /// Whether the session is paused or on its way there. Pause skips the
    /// trailer write so the run can resume later.
    pub fn is_pausing(&self) -> bool {
        matches!(self, RunState::Pausing | RunState::Paused)
    }

    /// Whether the interleaver loop is (or may be) actively draining.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::Opening | RunState::Running | RunState::QueueEmpty
        )
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Opening => "opening",
            RunState::Running => "running",
            RunState::QueueEmpty => "queue-empty",
            RunState::Pausing => "pausing",
            RunState::Paused => "paused",
            RunState::Stopping => "stopping",
            RunState::Stopped => "stopped",
            RunState::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct Inner {
    status: RunState,
    disposed: bool,
}

/// The session state shared between the caller and the worker.
///
/// One mutex guards both the run status and the configuration lifecycle
/// (open/dispose), so teardown can never interleave with a state
/// transition. The worker observes cancellation and pause requests by
/// reading the status once per loop iteration.
#[derive(Debug)]
pub struct SharedState {
    inner: Mutex<Inner>,
}

impl SharedState {
    /// Creates a state that is stopped and disposed until the first open.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: RunState::Stopped,
                disposed: true,
            }),
        }
    }

    /// Current run status.
    pub fn status(&self) -> RunState {
        self.inner.lock().status
    }

    /// Sets the status unconditionally.
    pub fn set(&self, status: RunState) {
        self.inner.lock().status = status;
    }

    /// Sets `to` only if the current status is `from`. Returns whether the
    /// transition happened.
    pub fn transition(&self, from: RunState, to: RunState) -> bool {
        let mut inner = self.inner.lock();
        if inner.status == from {
            inner.status = to;
            true
        } else {
            false
        }
    }

    /// Requests cancellation: escalates any non-terminal status to
    /// `Stopping`. Returns whether a change was made.
    pub fn request_stop(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.status.is_terminal() || inner.status == RunState::Stopping {
            false
        } else {
            inner.status = RunState::Stopping;
            true
        }
    }

    /// Requests a pause; honored only while the loop is actively draining.
    pub fn request_pause(&self) -> bool {
        let mut inner = self.inner.lock();
        if matches!(inner.status, RunState::Running | RunState::QueueEmpty) {
            inner.status = RunState::Pausing;
            true
        } else {
            false
        }
    }

    /// Marks the session as configured and entering `Opening`.
    pub fn mark_opened(&self) {
        let mut inner = self.inner.lock();
        inner.status = RunState::Opening;
        inner.disposed = false;
    }

    /// Marks the session torn down.
    pub fn mark_disposed(&self) {
        let mut inner = self.inner.lock();
        inner.status = RunState::Stopped;
        inner.disposed = true;
    }

    /// Whether the session has been torn down.
    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
