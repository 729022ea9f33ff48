use super::call::{CallId, CallRequest};
use super::position::PositionUpdate;
use crate::errors::Error;
use std::fmt;
use std::time::Duration;

/// Terminal result of a [`CallRequest`]. Produced exactly once per request.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The lift controller reported the call as served.
    Served,
    /// No position update arrived within the soft window.
    AbandonedNoUpdate,
    /// The call was progressing but the outer deadline (or shutdown) ended the wait.
    CancelledDeadline,
    Failed(Error),
}

impl DispatchOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            DispatchOutcome::Served => OutcomeKind::Served,
            DispatchOutcome::AbandonedNoUpdate => OutcomeKind::AbandonedNoUpdate,
            DispatchOutcome::CancelledDeadline => OutcomeKind::CancelledDeadline,
            DispatchOutcome::Failed(_) => OutcomeKind::Failed,
        }
    }

    pub fn is_served(&self) -> bool {
        matches!(self, DispatchOutcome::Served)
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            DispatchOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Served,
    AbandonedNoUpdate,
    CancelledDeadline,
    Failed,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Served => "served",
            OutcomeKind::AbandonedNoUpdate => "abandoned_no_update",
            OutcomeKind::CancelledDeadline => "cancelled_deadline",
            OutcomeKind::Failed => "failed",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the position-wait protocol observed for one call.
#[derive(Debug)]
pub struct WaitReport {
    pub outcome: DispatchOutcome,
    pub elapsed: Duration,
    pub updates: Vec<PositionUpdate>,
}

/// Record forwarded to logs and report subscribers for every terminal outcome.
#[derive(Debug)]
pub struct CallReport {
    pub request: CallRequest,
    pub outcome: DispatchOutcome,
    pub elapsed: Duration,
    pub updates: Vec<PositionUpdate>,
}

impl CallReport {
    pub fn new(request: CallRequest, report: WaitReport) -> Self {
        Self {
            request,
            outcome: report.outcome,
            elapsed: report.elapsed,
            updates: report.updates,
        }
    }

    pub fn call_id(&self) -> CallId {
        self.request.call_id
    }

    pub fn kind(&self) -> OutcomeKind {
        self.outcome.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Same rider and destination were called within the dedup window.
    Duplicate,
    /// A landing call for the destination area is still executing.
    AreaInProgress,
    /// The dispatch queue refused the request.
    Rejected,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Duplicate => "duplicate",
            SkipReason::AreaInProgress => "area_in_progress",
            SkipReason::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleDecision {
    Submitted(CallId),
    Skipped(SkipReason),
}

impl HandleDecision {
    pub fn is_submitted(&self) -> bool {
        matches!(self, HandleDecision::Submitted(_))
    }

    pub fn call_id(&self) -> Option<CallId> {
        match self {
            HandleDecision::Submitted(id) => Some(*id),
            HandleDecision::Skipped(_) => None,
        }
    }
}
