//! Attribute and event keys, and the integer tables hosts use to name them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Out-of-range or unknown key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("attribute key {0} out of range (expected 0-6)")]
    AttributeOutOfRange(i32),

    #[error("event key {0} out of range (expected 0-3)")]
    EventOutOfRange(i32),

    #[error("unknown key name: {0}")]
    UnknownName(String),
}

/// Stream attributes the driver can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeKey {
    StreamState,
    ReaderElementsAvailable,
    ReaderCapacity,
    ReaderUnderflow,
    WriterElementsAvailable,
    WriterCapacity,
    WriterOverflow,
}

impl AttributeKey {
    pub const ALL: [AttributeKey; 7] = [
        AttributeKey::StreamState,
        AttributeKey::ReaderElementsAvailable,
        AttributeKey::ReaderCapacity,
        AttributeKey::ReaderUnderflow,
        AttributeKey::WriterElementsAvailable,
        AttributeKey::WriterCapacity,
        AttributeKey::WriterOverflow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AttributeKey::StreamState => "stream-state",
            AttributeKey::ReaderElementsAvailable => "reader-elements-available",
            AttributeKey::ReaderCapacity => "reader-capacity",
            AttributeKey::ReaderUnderflow => "reader-underflow",
            AttributeKey::WriterElementsAvailable => "writer-elements-available",
            AttributeKey::WriterCapacity => "writer-capacity",
            AttributeKey::WriterOverflow => "writer-overflow",
        }
    }

    /// Native width of the value the driver writes for this key.
    pub fn width(self) -> ValueWidth {
        match self {
            AttributeKey::StreamState => ValueWidth::State,
            AttributeKey::ReaderUnderflow | AttributeKey::WriterOverflow => ValueWidth::Flag,
            _ => ValueWidth::Count,
        }
    }
}

impl TryFrom<i32> for AttributeKey {
    type Error = KeyError;

    fn try_from(key: i32) -> Result<Self, Self::Error> {
        usize::try_from(key)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(KeyError::AttributeOutOfRange(key))
    }
}

impl FromStr for AttributeKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| KeyError::UnknownName(s.to_string()))
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Events a caller can block on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamEvent {
    FifoOverflow,
    FifoUnderflow,
    StreamEnabled,
    StreamDisabled,
}

impl StreamEvent {
    pub const ALL: [StreamEvent; 4] = [
        StreamEvent::FifoOverflow,
        StreamEvent::FifoUnderflow,
        StreamEvent::StreamEnabled,
        StreamEvent::StreamDisabled,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StreamEvent::FifoOverflow => "fifo-overflow",
            StreamEvent::FifoUnderflow => "fifo-underflow",
            StreamEvent::StreamEnabled => "stream-enabled",
            StreamEvent::StreamDisabled => "stream-disabled",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<i32> for StreamEvent {
    type Error = KeyError;

    fn try_from(key: i32) -> Result<Self, Self::Error> {
        usize::try_from(key)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(KeyError::EventOutOfRange(key))
    }
}

impl FromStr for StreamEvent {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.name() == s)
            .ok_or_else(|| KeyError::UnknownName(s.to_string()))
    }
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueWidth {
    /// Small enumerated driver code.
    State,
    /// Unsigned 32-bit element count.
    Count,
    /// Single-byte boolean.
    Flag,
}

/// Driver-side stream state code. Its meaning belongs to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamStateCode(pub u32);

/// Attribute value at the key's native width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    State(StreamStateCode),
    Count(u32),
    Flag(bool),
}

impl AttributeValue {
    /// Zero value at the width `key` reports in.
    pub fn zero_for(key: AttributeKey) -> Self {
        match key.width() {
            ValueWidth::State => AttributeValue::State(StreamStateCode(0)),
            ValueWidth::Count => AttributeValue::Count(0),
            ValueWidth::Flag => AttributeValue::Flag(false),
        }
    }

    pub fn width(&self) -> ValueWidth {
        match self {
            AttributeValue::State(_) => ValueWidth::State,
            AttributeValue::Count(_) => ValueWidth::Count,
            AttributeValue::Flag(_) => ValueWidth::Flag,
        }
    }

    /// Widen to the integer hosts receive.
    pub fn as_i64(&self) -> i64 {
        match self {
            AttributeValue::State(code) => i64::from(code.0),
            AttributeValue::Count(n) => i64::from(*n),
            AttributeValue::Flag(b) => i64::from(*b),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::State(code) => write!(f, "state({})", code.0),
            AttributeValue::Count(n) => write!(f, "{}", n),
            AttributeValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_table_matches_host_numbering() {
        assert_eq!(AttributeKey::try_from(0), Ok(AttributeKey::StreamState));
        assert_eq!(AttributeKey::try_from(1), Ok(AttributeKey::ReaderElementsAvailable));
        assert_eq!(AttributeKey::try_from(2), Ok(AttributeKey::ReaderCapacity));
        assert_eq!(AttributeKey::try_from(3), Ok(AttributeKey::ReaderUnderflow));
        assert_eq!(AttributeKey::try_from(4), Ok(AttributeKey::WriterElementsAvailable));
        assert_eq!(AttributeKey::try_from(5), Ok(AttributeKey::WriterCapacity));
        assert_eq!(AttributeKey::try_from(6), Ok(AttributeKey::WriterOverflow));
    }

    #[test]
    fn attribute_out_of_range() {
        assert_eq!(AttributeKey::try_from(7), Err(KeyError::AttributeOutOfRange(7)));
        assert_eq!(AttributeKey::try_from(-1), Err(KeyError::AttributeOutOfRange(-1)));
    }

    #[test]
    fn event_table_matches_host_numbering() {
        assert_eq!(StreamEvent::try_from(0), Ok(StreamEvent::FifoOverflow));
        assert_eq!(StreamEvent::try_from(1), Ok(StreamEvent::FifoUnderflow));
        assert_eq!(StreamEvent::try_from(2), Ok(StreamEvent::StreamEnabled));
        assert_eq!(StreamEvent::try_from(3), Ok(StreamEvent::StreamDisabled));
        assert_eq!(StreamEvent::try_from(4), Err(KeyError::EventOutOfRange(4)));
    }

    #[test]
    fn names_round_trip() {
        for key in AttributeKey::ALL {
            assert_eq!(key.name().parse::<AttributeKey>(), Ok(key));
        }
        for event in StreamEvent::ALL {
            assert_eq!(event.name().parse::<StreamEvent>(), Ok(event));
        }
        assert!("fifo-sideways".parse::<StreamEvent>().is_err());
    }

    #[test]
    fn widths() {
        assert_eq!(AttributeKey::StreamState.width(), ValueWidth::State);
        assert_eq!(AttributeKey::ReaderCapacity.width(), ValueWidth::Count);
        assert_eq!(AttributeKey::WriterOverflow.width(), ValueWidth::Flag);
        assert_eq!(
            AttributeValue::zero_for(AttributeKey::ReaderUnderflow),
            AttributeValue::Flag(false)
        );
    }

    #[test]
    fn widening() {
        assert_eq!(AttributeValue::Count(u32::MAX).as_i64(), 4_294_967_295);
        assert_eq!(AttributeValue::Flag(true).as_i64(), 1);
        assert_eq!(AttributeValue::State(StreamStateCode(2)).as_i64(), 2);
    }
}
