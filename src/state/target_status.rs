/// Target status definitions for tracking crawl progress
///
/// A target moves `pending → in_progress → {success, error}` within a run.
/// The only reset allowed from outside a run is `error → pending` (manual retry).
use std::fmt;

/// Represents the fetch status of a target record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetStatus {
    /// Target has not been attempted yet (or was reset for retry)
    Pending,

    /// Target has been dispatched in the current (or a crashed) run
    InProgress,

    /// Target was fetched and its text persisted
    Success,

    /// Every URL variant failed; error kind and detail are recorded
    Error,
}

impl TargetStatus {
    /// Returns true if the target should be selected by the next run
    pub fn needs_fetch(&self) -> bool {
        !matches!(self, Self::Success)
    }

    /// Checks whether moving from `self` to `next` is a permitted transition
    ///
    /// `InProgress` may be skipped from `Pending` (marking it is best-effort).
    /// An errored target has to be picked up again (`InProgress`) before it
    /// can succeed. `Success` is final apart from rewriting it with fresh text.
    pub fn can_transition_to(&self, next: TargetStatus) -> bool {
        use TargetStatus::*;
        match (*self, next) {
            (Pending, InProgress) | (Pending, Success) | (Pending, Error) => true,
            (InProgress, Success) | (InProgress, Error) => true,
            (Error, Pending) | (Error, InProgress) | (Error, Error) => true,
            // row left behind by a crashed run
            (InProgress, InProgress) => true,
            (Success, Success) => true,
            _ => false,
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::InProgress, Self::Success, Self::Error]
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
