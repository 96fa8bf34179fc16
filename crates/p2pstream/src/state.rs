//! Stream lifecycle states and the table of legal moves between them.
//!
//! ```text
//! Uninitialized ──create_and_link──▶ Created ──link──▶ Linked ──enable──▶ Enabled
//!       │                                ◀──unlink──          ◀──disable──
//!       └──create_and_link(enable)──────────────────────────────────────▶ Enabled
//!
//! destroy: any live state ──▶ Uninitialized
//! ```
//!
//! Ordering makes `enabled ⇒ linked ⇒ created` hold by construction.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    #[default]
    Uninitialized,
    Created,
    Linked,
    Enabled,
}

impl StreamState {
    /// A native stream object exists.
    pub fn is_created(self) -> bool {
        self >= StreamState::Created
    }

    /// Both endpoints are connected through the stream.
    pub fn is_linked(self) -> bool {
        self >= StreamState::Linked
    }

    /// Data is actively transferring.
    pub fn is_enabled(self) -> bool {
        self == StreamState::Enabled
    }

    /// `(created, linked, enabled)` as a host sees them.
    pub fn flags(self) -> (bool, bool, bool) {
        (self.is_created(), self.is_linked(), self.is_enabled())
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Uninitialized => "uninitialized",
            StreamState::Created => "created",
            StreamState::Linked => "linked",
            StreamState::Enabled => "enabled",
        };
        f.write_str(name)
    }
}

/// Every operation a controller accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateAndLink,
    Destroy,
    Enable,
    Disable,
    FlushAndDisable,
    Link,
    Unlink,
    WaitForEvent,
    GetAttribute,
}

impl Operation {
    pub fn permitted_from(self, state: StreamState) -> bool {
        use StreamState::*;
        match self {
            Operation::CreateAndLink => state == Uninitialized,
            Operation::Destroy => state.is_created(),
            Operation::Enable => matches!(state, Created | Linked),
            Operation::Disable | Operation::FlushAndDisable => state == Enabled,
            Operation::Link => state == Created,
            Operation::Unlink => state.is_linked(),
            Operation::WaitForEvent | Operation::GetAttribute => state.is_created(),
        }
    }

    /// State after the operation completes successfully from `from`.
    ///
    /// `None` when the move is illegal or the operation only observes.
    /// `CreateAndLink` lands on `Created`; enabling on create is the caller's
    /// choice and is resolved by the controller.
    pub fn target(self, from: StreamState) -> Option<StreamState> {
        if !self.permitted_from(from) {
            return None;
        }
        match self {
            Operation::CreateAndLink => Some(StreamState::Created),
            Operation::Destroy => Some(StreamState::Uninitialized),
            Operation::Enable => Some(StreamState::Enabled),
            Operation::Disable | Operation::FlushAndDisable => Some(StreamState::Linked),
            Operation::Link => Some(StreamState::Linked),
            Operation::Unlink => Some(StreamState::Created),
            Operation::WaitForEvent | Operation::GetAttribute => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::CreateAndLink => "create_and_link",
            Operation::Destroy => "destroy",
            Operation::Enable => "enable",
            Operation::Disable => "disable",
            Operation::FlushAndDisable => "flush_and_disable",
            Operation::Link => "link",
            Operation::Unlink => "unlink",
            Operation::WaitForEvent => "wait_for_event",
            Operation::GetAttribute => "get_attribute",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StreamState::*;

    const STATES: [StreamState; 4] = [Uninitialized, Created, Linked, Enabled];

    #[test]
    fn flags_respect_implication_chain() {
        for state in STATES {
            let (created, linked, enabled) = state.flags();
            assert!(!enabled || linked, "{state}: enabled without linked");
            assert!(!linked || created, "{state}: linked without created");
        }
    }

    #[test]
    fn legal_moves() {
        assert_eq!(Operation::CreateAndLink.target(Uninitialized), Some(Created));
        assert_eq!(Operation::Link.target(Created), Some(Linked));
        assert_eq!(Operation::Enable.target(Created), Some(Enabled));
        assert_eq!(Operation::Enable.target(Linked), Some(Enabled));
        assert_eq!(Operation::Disable.target(Enabled), Some(Linked));
        assert_eq!(Operation::FlushAndDisable.target(Enabled), Some(Linked));
        assert_eq!(Operation::Unlink.target(Enabled), Some(Created));
        assert_eq!(Operation::Unlink.target(Linked), Some(Created));
        for state in [Created, Linked, Enabled] {
            assert_eq!(Operation::Destroy.target(state), Some(Uninitialized));
        }
    }

    #[test]
    fn illegal_moves() {
        assert!(!Operation::CreateAndLink.permitted_from(Created));
        assert!(!Operation::Destroy.permitted_from(Uninitialized));
        assert!(!Operation::Enable.permitted_from(Enabled));
        assert!(!Operation::Enable.permitted_from(Uninitialized));
        assert!(!Operation::Disable.permitted_from(Linked));
        assert!(!Operation::FlushAndDisable.permitted_from(Created));
        assert!(!Operation::Link.permitted_from(Linked));
        assert!(!Operation::Unlink.permitted_from(Created));
        assert!(!Operation::WaitForEvent.permitted_from(Uninitialized));
        assert!(!Operation::GetAttribute.permitted_from(Uninitialized));
    }

    #[test]
    fn observers_never_transition() {
        for state in STATES {
            assert_eq!(Operation::WaitForEvent.target(state), None);
            assert_eq!(Operation::GetAttribute.target(state), None);
        }
    }
}
