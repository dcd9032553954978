//! Per-panel generation state and request fencing.
//!
//! A panel may start a new request while an earlier one is still
//! streaming. [`RequestFence`] hands out increasing tickets and a
//! [`GenerationSession`] only lets the latest ticket write to the view.

use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::DevGuardError;
use crate::streaming::{SnapshotStream, StreamOutcome, StreamState};

/// Identifies one request issued by a [`RequestFence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    /// Returns the raw sequence number.
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Monotonic ticket dispenser.
#[derive(Debug, Default)]
pub struct RequestFence {
    latest: AtomicU64,
}

impl RequestFence {
    /// Creates a fence with no tickets issued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket that supersedes all earlier ones.
    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Returns true if `ticket` is the most recently issued one.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }
}

/// What a panel shows for its generation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    /// Latest snapshot.
    pub content: String,
    /// A request is in flight.
    pub is_loading: bool,
    /// A request completed successfully at least once.
    pub has_result: bool,
    /// User-facing failure message.
    pub error: Option<String>,
    /// Whether a retry action should be offered for `error`.
    pub retryable: bool,
    /// Terminal state of the last finished stream.
    pub last_state: Option<StreamState>,
}

/// Shared state of one generation panel.
///
/// Cloning yields another handle to the same panel.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    view: Arc<Mutex<SessionView>>,
    fence: Arc<RequestFence>,
    fenced: bool,
}

impl Default for GenerationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationSession {
    /// Creates a fenced session.
    pub fn new() -> Self {
        Self {
            view: Arc::new(Mutex::new(SessionView::default())),
            fence: Arc::new(RequestFence::new()),
            fenced: true,
        }
    }

    /// Creates a session where every request writes to the view, so
    /// overlapping streams interleave.
    pub fn unfenced() -> Self {
        Self {
            fenced: false,
            ..Self::new()
        }
    }

    /// Returns true if superseded requests are ignored.
    pub fn is_fenced(&self) -> bool {
        self.fenced
    }

    /// Starts a request: clears content and error and sets the loading flag.
    pub fn begin(&self) -> Ticket {
        let ticket = self.fence.issue();
        let mut view = self.lock();
        view.content.clear();
        view.error = None;
        view.retryable = false;
        view.is_loading = true;
        ticket
    }

    /// Returns a copy of the current view.
    pub fn view(&self) -> SessionView {
        self.lock().clone()
    }

    /// Returns true if writes for `ticket` reach the view.
    pub fn accepts(&self, ticket: Ticket) -> bool {
        !self.fenced || self.fence.is_current(ticket)
    }

    /// Publishes a snapshot. Returns false if the ticket was superseded.
    pub fn apply_snapshot(&self, ticket: Ticket, snapshot: &str) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        let mut view = self.lock();
        view.content.clear();
        view.content.push_str(snapshot);
        true
    }

    /// Records a failure that happened before streaming started.
    pub fn fail(&self, ticket: Ticket, error: &DevGuardError) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        let mut view = self.lock();
        view.is_loading = false;
        view.error = Some(error.user_message());
        view.retryable = error.is_retryable();
        true
    }

    /// Drives `stream` into the view.
    ///
    /// When the session is fenced and a newer request begins, the stream is
    /// aborted at its next snapshot and nothing more is written.
    pub async fn run(&self, ticket: Ticket, mut stream: SnapshotStream) -> StreamOutcome {
        let mut error = None;

        while let Some(item) = stream.next().await {
            if !self.accepts(ticket) {
                tracing::debug!(ticket = ticket.value(), "Request superseded, aborting stream");
                stream.abort();
                break;
            }
            match item {
                Ok(snapshot) => {
                    self.apply_snapshot(ticket, &snapshot);
                }
                Err(e) => error = Some(e),
            }
        }

        let outcome = StreamOutcome {
            content: stream.content().to_string(),
            state: stream.state(),
            error,
        };
        self.complete(ticket, &outcome);
        outcome
    }

    fn complete(&self, ticket: Ticket, outcome: &StreamOutcome) {
        if !self.accepts(ticket) {
            return;
        }
        let mut view = self.lock();
        view.is_loading = false;
        view.last_state = Some(outcome.state);
        match &outcome.error {
            Some(error) => {
                view.error = Some(error.user_message());
                view.retryable = error.is_retryable();
            }
            None if outcome.state.is_success() => view.has_result = true,
            None => {}
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
