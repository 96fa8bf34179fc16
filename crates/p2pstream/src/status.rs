//! Driver status codes and their three-tier classification.
//!
//! The driver reports every call as a signed status:
//!
//! | code | meaning |
//! |------|---------|
//! | `< 0` | fatal - the stream is only safe after recreation |
//! | `0`   | success |
//! | `> 0` | warning - logged, the call still counts as done |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw status returned by a driver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const SUCCESS: StatusCode = StatusCode(0);

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn classify(self) -> DriverStatus {
        DriverStatus::classify(self)
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        StatusCode(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tagged interpretation of a [`StatusCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "code", rename_all = "snake_case")]
pub enum DriverStatus {
    Ok,
    Warning(StatusCode),
    Fatal(StatusCode),
}

impl DriverStatus {
    pub fn classify(status: StatusCode) -> Self {
        match status.0 {
            0 => DriverStatus::Ok,
            c if c < 0 => DriverStatus::Fatal(status),
            _ => DriverStatus::Warning(status),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverStatus::Fatal(_))
    }
}

/// How a successful operation completed.
///
/// Warnings never fail an operation, but they are kept so callers can tell a
/// clean completion from one the driver complained about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "completion", content = "code", rename_all = "snake_case")]
pub enum Completion {
    #[default]
    Clean,
    Warning(StatusCode),
}

impl Completion {
    pub fn is_clean(&self) -> bool {
        matches!(self, Completion::Clean)
    }

    pub fn warning(&self) -> Option<StatusCode> {
        match self {
            Completion::Clean => None,
            Completion::Warning(code) => Some(*code),
        }
    }

    /// Keep the first warning seen across a multi-call operation.
    pub(crate) fn and(self, other: Completion) -> Completion {
        match self {
            Completion::Clean => other,
            warning => warning,
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Clean => write!(f, "ok"),
            Completion::Warning(code) => write!(f, "warning({})", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_sign() {
        assert_eq!(DriverStatus::classify(StatusCode(0)), DriverStatus::Ok);
        assert_eq!(
            DriverStatus::classify(StatusCode(-52000)),
            DriverStatus::Fatal(StatusCode(-52000))
        );
        assert_eq!(
            DriverStatus::classify(StatusCode(7)),
            DriverStatus::Warning(StatusCode(7))
        );
    }

    #[test]
    fn negative_status_is_reachable() {
        // Status must stay signed or the fatal tier can never trigger.
        assert!(StatusCode(i32::MIN).classify().is_fatal());
        assert!(!StatusCode(i32::MAX).classify().is_fatal());
    }

    #[test]
    fn completion_keeps_first_warning() {
        let first = Completion::Warning(StatusCode(3));
        let second = Completion::Warning(StatusCode(9));
        assert_eq!(first.and(second), first);
        assert_eq!(Completion::Clean.and(second), second);
        assert_eq!(Completion::Clean.and(Completion::Clean), Completion::Clean);
    }

    #[test]
    fn completion_display() {
        assert_eq!(Completion::Clean.to_string(), "ok");
        assert_eq!(Completion::Warning(StatusCode(4)).to_string(), "warning(4)");
    }
}
