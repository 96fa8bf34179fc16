//! The driver boundary.
//!
//! The vendor driver is a flat surface keyed by opaque handles. It is modelled
//! as a trait so the controller can run against real hardware bindings or the
//! in-process [`SimulatedDriver`](crate::sim::SimulatedDriver).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::keys::{AttributeKey, AttributeValue, StreamEvent};
use crate::status::StatusCode;

/// Hardware endpoint identifier, as the driver enumerates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointId(pub u32);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep{}", self.0)
    }
}

/// Opaque native stream handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamHandle(pub u64);

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Timeout passed through to blocking driver calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeout {
    Millis(u32),
    Infinite,
}

impl Timeout {
    /// Negative values mean "wait forever", as in the driver's own API.
    pub fn from_millis(ms: i32) -> Self {
        u32::try_from(ms).map_or(Timeout::Infinite, Timeout::Millis)
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Timeout::Millis(ms) => Some(Duration::from_millis(u64::from(*ms))),
            Timeout::Infinite => None,
        }
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Millis(ms) => write!(f, "{}ms", ms),
            Timeout::Infinite => write!(f, "infinite"),
        }
    }
}

/// Vendor peer-to-peer stream API.
///
/// Every call reports a raw [`StatusCode`]; interpreting it is the
/// controller's job. Implementations must tolerate `wait_for_event` running
/// on one thread while `get_attribute` runs on another.
pub trait StreamGateway: Send + Sync {
    /// Create the stream, link its endpoints and optionally enable it, as a
    /// single driver step.
    fn create_and_link(
        &self,
        writer: EndpointId,
        reader: EndpointId,
        enable: bool,
    ) -> (StatusCode, StreamHandle);

    fn destroy(&self, handle: StreamHandle) -> StatusCode;

    fn link(&self, handle: StreamHandle) -> StatusCode;

    fn unlink(&self, handle: StreamHandle) -> StatusCode;

    fn enable(&self, handle: StreamHandle) -> StatusCode;

    fn disable(&self, handle: StreamHandle) -> StatusCode;

    /// Wait for in-flight data to drain, then disable. The flag reports
    /// whether the drain timed out.
    fn flush_and_disable(&self, handle: StreamHandle, timeout: Timeout) -> (StatusCode, bool);

    /// Block until `event` occurs or `timeout` elapses.
    fn wait_for_event(&self, handle: StreamHandle, event: StreamEvent, timeout: Timeout)
        -> StatusCode;

    fn get_attribute(&self, handle: StreamHandle, key: AttributeKey) -> (StatusCode, AttributeValue);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_timeout_is_infinite() {
        assert_eq!(Timeout::from_millis(-1), Timeout::Infinite);
        assert_eq!(Timeout::from_millis(0), Timeout::Millis(0));
        assert_eq!(Timeout::from_millis(250), Timeout::Millis(250));
        assert_eq!(Timeout::Infinite.as_duration(), None);
        assert_eq!(
            Timeout::Millis(250).as_duration(),
            Some(Duration::from_millis(250))
        );
    }
}
