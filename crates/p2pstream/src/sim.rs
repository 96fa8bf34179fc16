//! In-process stand-in for the peer-to-peer driver.
//!
//! Models each stream as a writer FIFO feeding a reader FIFO of the same
//! depth. While the stream is enabled, data moves from writer to reader as
//! soon as there is room. Blocking waits sleep on a condition variable that
//! every state change signals.
//!
//! Statuses can be scripted per call kind with [`SimulatedDriver::queue_status`]:
//! a queued negative status fails the call without touching the stream, a
//! queued positive status lets the call run and reports the warning.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::gateway::{EndpointId, StreamGateway, StreamHandle, Timeout};
use crate::keys::{AttributeKey, AttributeValue, KeyError, StreamEvent, StreamStateCode};
use crate::status::StatusCode;

/// Driver entry points, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverCall {
    CreateAndLink,
    Destroy,
    Link,
    Unlink,
    Enable,
    Disable,
    FlushAndDisable,
    WaitForEvent,
    GetAttribute,
}

impl DriverCall {
    pub const ALL: [DriverCall; 9] = [
        DriverCall::CreateAndLink,
        DriverCall::Destroy,
        DriverCall::Link,
        DriverCall::Unlink,
        DriverCall::Enable,
        DriverCall::Disable,
        DriverCall::FlushAndDisable,
        DriverCall::WaitForEvent,
        DriverCall::GetAttribute,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DriverCall::CreateAndLink => "create_and_link",
            DriverCall::Destroy => "destroy",
            DriverCall::Link => "link",
            DriverCall::Unlink => "unlink",
            DriverCall::Enable => "enable",
            DriverCall::Disable => "disable",
            DriverCall::FlushAndDisable => "flush_and_disable",
            DriverCall::WaitForEvent => "wait_for_event",
            DriverCall::GetAttribute => "get_attribute",
        }
    }
}

impl FromStr for DriverCall {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| KeyError::UnknownName(s.to_string()))
    }
}

/// Stream state codes reported for [`AttributeKey::StreamState`].
pub mod state_codes {
    use crate::keys::StreamStateCode;

    pub const UNLINKED: StreamStateCode = StreamStateCode(0);
    pub const DISABLED: StreamStateCode = StreamStateCode(1);
    pub const ENABLED: StreamStateCode = StreamStateCode(2);
}

pub const DEFAULT_FIFO_DEPTH: u32 = 1024;

#[derive(Debug)]
struct SimStream {
    writer: EndpointId,
    reader: EndpointId,
    linked: bool,
    enabled: bool,
    writer_fill: u32,
    reader_fill: u32,
    writer_overflow: bool,
    reader_underflow: bool,
    events: [u64; 4],
}

impl SimStream {
    fn fire(&mut self, event: StreamEvent) {
        self.events[event.index()] += 1;
    }

    /// Move as much pending writer data to the reader as fits.
    fn pump(&mut self, depth: u32) {
        if !self.enabled {
            return;
        }
        let moved = self.writer_fill.min(depth - self.reader_fill);
        self.writer_fill -= moved;
        self.reader_fill += moved;
    }

    fn state_code(&self) -> StreamStateCode {
        match (self.linked, self.enabled) {
            (_, true) => state_codes::ENABLED,
            (true, false) => state_codes::DISABLED,
            (false, false) => state_codes::UNLINKED,
        }
    }
}

#[derive(Debug)]
struct DriverState {
    next_handle: u64,
    fifo_depth: u32,
    flush_stalls: bool,
    streams: HashMap<StreamHandle, SimStream>,
    queued: HashMap<DriverCall, VecDeque<i32>>,
    calls: Vec<DriverCall>,
}

impl DriverState {
    /// Log the call and pop any scripted status for it.
    fn enter(&mut self, call: DriverCall) -> Option<StatusCode> {
        self.calls.push(call);
        self.queued
            .get_mut(&call)
            .and_then(|q| q.pop_front())
            .map(StatusCode)
    }
}

/// Simulated driver with scripted faults and a call log.
#[derive(Debug)]
pub struct SimulatedDriver {
    state: Mutex<DriverState>,
    changed: Condvar,
}

impl SimulatedDriver {
    /// Returned for calls on a handle the driver doesn't know.
    pub const INVALID_HANDLE: StatusCode = StatusCode(-2);
    /// Returned by `enable` on an unlinked stream.
    pub const NOT_LINKED: StatusCode = StatusCode(-3);
    /// Returned by `wait_for_event` when the timeout elapses first.
    pub const WAIT_TIMED_OUT: StatusCode = StatusCode(1);

    pub fn new() -> Self {
        Self::with_fifo_depth(DEFAULT_FIFO_DEPTH)
    }

    pub fn with_fifo_depth(fifo_depth: u32) -> Self {
        Self {
            state: Mutex::new(DriverState {
                next_handle: 1,
                fifo_depth,
                flush_stalls: false,
                streams: HashMap::new(),
                queued: HashMap::new(),
                calls: Vec::new(),
            }),
            changed: Condvar::new(),
        }
    }

    /// Script the status of the next `call`.
    pub fn queue_status(&self, call: DriverCall, code: i32) {
        self.lock().queued.entry(call).or_default().push_back(code);
    }

    /// Make every flush report a timeout, as if the reader never drained.
    pub fn set_flush_stalls(&self, stalls: bool) {
        self.lock().flush_stalls = stalls;
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn live_streams(&self) -> usize {
        self.lock().streams.len()
    }

    /// Endpoints a live stream was created between.
    pub fn endpoints(&self, handle: StreamHandle) -> Option<(EndpointId, EndpointId)> {
        self.lock().streams.get(&handle).map(|s| (s.writer, s.reader))
    }

    /// Push `count` elements into the writer FIFO. Returns how many fit;
    /// anything beyond that raises the overflow flag.
    pub fn write_elements(&self, handle: StreamHandle, count: u32) -> Option<u32> {
        let mut st = self.lock();
        let depth = st.fifo_depth;
        let stream = st.streams.get_mut(&handle)?;

        let accepted = count.min(depth - stream.writer_fill);
        stream.writer_fill += accepted;
        if accepted < count {
            stream.writer_overflow = true;
            stream.fire(StreamEvent::FifoOverflow);
        }
        stream.pump(depth);
        drop(st);

        self.changed.notify_all();
        Some(accepted)
    }

    /// Pull up to `count` elements from the reader FIFO. Asking for more
    /// than is buffered raises the underflow flag.
    pub fn read_elements(&self, handle: StreamHandle, count: u32) -> Option<u32> {
        let mut st = self.lock();
        let depth = st.fifo_depth;
        let stream = st.streams.get_mut(&handle)?;

        let taken = count.min(stream.reader_fill);
        stream.reader_fill -= taken;
        if taken < count {
            stream.reader_underflow = true;
            stream.fire(StreamEvent::FifoUnderflow);
        }
        stream.pump(depth);
        drop(st);

        self.changed.notify_all();
        Some(taken)
    }

    fn lock(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Common shape of the simple verbs: log, honour scripted failures,
    /// apply `f` to the stream, wake waiters.
    fn apply(
        &self,
        call: DriverCall,
        handle: StreamHandle,
        f: impl FnOnce(&mut SimStream, u32) -> StatusCode,
    ) -> StatusCode {
        let mut st = self.lock();
        let scripted = st.enter(call);
        if let Some(code) = scripted.filter(|c| c.0 < 0) {
            return code;
        }

        let depth = st.fifo_depth;
        let Some(stream) = st.streams.get_mut(&handle) else {
            return Self::INVALID_HANDLE;
        };
        let status = f(stream, depth);
        drop(st);

        self.changed.notify_all();
        trace!("{:?} {} -> {}", call, handle, status);
        scripted.unwrap_or(status)
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamGateway for SimulatedDriver {
    fn create_and_link(
        &self,
        writer: EndpointId,
        reader: EndpointId,
        enable: bool,
    ) -> (StatusCode, StreamHandle) {
        let mut st = self.lock();
        let scripted = st.enter(DriverCall::CreateAndLink);
        if let Some(code) = scripted.filter(|c| c.0 < 0) {
            return (code, StreamHandle(0));
        }

        let handle = StreamHandle(st.next_handle);
        st.next_handle += 1;
        let mut stream = SimStream {
            writer,
            reader,
            linked: true,
            enabled: enable,
            writer_fill: 0,
            reader_fill: 0,
            writer_overflow: false,
            reader_underflow: false,
            events: [0; 4],
        };
        if enable {
            stream.fire(StreamEvent::StreamEnabled);
        }
        st.streams.insert(handle, stream);
        drop(st);

        self.changed.notify_all();
        (scripted.unwrap_or(StatusCode::SUCCESS), handle)
    }

    fn destroy(&self, handle: StreamHandle) -> StatusCode {
        let mut st = self.lock();
        let scripted = st.enter(DriverCall::Destroy);
        if let Some(code) = scripted.filter(|c| c.0 < 0) {
            return code;
        }
        let removed = st.streams.remove(&handle);
        drop(st);

        // Waiters on this handle wake up and find it gone.
        self.changed.notify_all();
        match removed {
            Some(_) => scripted.unwrap_or(StatusCode::SUCCESS),
            None => Self::INVALID_HANDLE,
        }
    }

    fn link(&self, handle: StreamHandle) -> StatusCode {
        self.apply(DriverCall::Link, handle, |s, _| {
            s.linked = true;
            StatusCode::SUCCESS
        })
    }

    fn unlink(&self, handle: StreamHandle) -> StatusCode {
        self.apply(DriverCall::Unlink, handle, |s, _| {
            if s.enabled {
                s.enabled = false;
                s.fire(StreamEvent::StreamDisabled);
            }
            s.linked = false;
            StatusCode::SUCCESS
        })
    }

    fn enable(&self, handle: StreamHandle) -> StatusCode {
        self.apply(DriverCall::Enable, handle, |s, depth| {
            if !s.linked {
                return Self::NOT_LINKED;
            }
            if !s.enabled {
                s.enabled = true;
                s.writer_overflow = false;
                s.reader_underflow = false;
                s.pump(depth);
                s.fire(StreamEvent::StreamEnabled);
            }
            StatusCode::SUCCESS
        })
    }

    fn disable(&self, handle: StreamHandle) -> StatusCode {
        self.apply(DriverCall::Disable, handle, |s, _| {
            if s.enabled {
                s.enabled = false;
                s.fire(StreamEvent::StreamDisabled);
            }
            StatusCode::SUCCESS
        })
    }

    fn flush_and_disable(&self, handle: StreamHandle, timeout: Timeout) -> (StatusCode, bool) {
        let stalls = self.lock().flush_stalls;
        let mut timed_out = false;
        let status = self.apply(DriverCall::FlushAndDisable, handle, |s, depth| {
            s.pump(depth);
            // Whatever is still in the writer FIFO can't reach a full reader.
            timed_out = stalls || s.writer_fill > 0;
            if s.enabled {
                s.enabled = false;
                s.fire(StreamEvent::StreamDisabled);
            }
            StatusCode::SUCCESS
        });
        trace!("flush {} within {}: timed out = {}", handle, timeout, timed_out);
        (status, timed_out)
    }

    fn wait_for_event(
        &self,
        handle: StreamHandle,
        event: StreamEvent,
        timeout: Timeout,
    ) -> StatusCode {
        let mut st = self.lock();
        if let Some(code) = st.enter(DriverCall::WaitForEvent) {
            return code;
        }
        let Some(seen) = st.streams.get(&handle).map(|s| s.events[event.index()]) else {
            return Self::INVALID_HANDLE;
        };
        let deadline = timeout.as_duration().map(|d| Instant::now() + d);

        loop {
            match st.streams.get(&handle) {
                None => return Self::INVALID_HANDLE,
                Some(s) if s.events[event.index()] > seen => return StatusCode::SUCCESS,
                Some(_) => {}
            }

            st = match deadline {
                None => self
                    .changed
                    .wait(st)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Self::WAIT_TIMED_OUT;
                    }
                    self.changed
                        .wait_timeout(st, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    fn get_attribute(&self, handle: StreamHandle, key: AttributeKey) -> (StatusCode, AttributeValue) {
        let mut st = self.lock();
        let scripted = st.enter(DriverCall::GetAttribute);
        if let Some(code) = scripted.filter(|c| c.0 < 0) {
            return (code, AttributeValue::zero_for(key));
        }

        let depth = st.fifo_depth;
        let Some(s) = st.streams.get(&handle) else {
            return (Self::INVALID_HANDLE, AttributeValue::zero_for(key));
        };
        let value = match key {
            AttributeKey::StreamState => AttributeValue::State(s.state_code()),
            AttributeKey::ReaderElementsAvailable => AttributeValue::Count(s.reader_fill),
            AttributeKey::ReaderCapacity => AttributeValue::Count(depth),
            AttributeKey::ReaderUnderflow => AttributeValue::Flag(s.reader_underflow),
            AttributeKey::WriterElementsAvailable => AttributeValue::Count(depth - s.writer_fill),
            AttributeKey::WriterCapacity => AttributeValue::Count(depth),
            AttributeKey::WriterOverflow => AttributeValue::Flag(s.writer_overflow),
        };
        (scripted.unwrap_or(StatusCode::SUCCESS), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(driver: &SimulatedDriver, enable: bool) -> StreamHandle {
        let (status, handle) = driver.create_and_link(EndpointId(1), EndpointId(2), enable);
        assert_eq!(status, StatusCode::SUCCESS);
        handle
    }

    fn count(driver: &SimulatedDriver, h: StreamHandle, key: AttributeKey) -> u32 {
        match driver.get_attribute(h, key).1 {
            AttributeValue::Count(n) => n,
            other => panic!("expected count, got {:?}", other),
        }
    }

    #[test]
    fn data_moves_only_while_enabled() {
        let driver = SimulatedDriver::with_fifo_depth(8);
        let h = open(&driver, false);

        assert_eq!(driver.write_elements(h, 5), Some(5));
        assert_eq!(count(&driver, h, AttributeKey::ReaderElementsAvailable), 0);
        assert_eq!(count(&driver, h, AttributeKey::WriterElementsAvailable), 3);

        assert_eq!(driver.enable(h), StatusCode::SUCCESS);
        assert_eq!(count(&driver, h, AttributeKey::ReaderElementsAvailable), 5);
        assert_eq!(count(&driver, h, AttributeKey::WriterElementsAvailable), 8);
    }

    #[test]
    fn overflow_sets_flag() {
        let driver = SimulatedDriver::with_fifo_depth(4);
        let h = open(&driver, false);
        assert_eq!(driver.write_elements(h, 6), Some(4));
        assert_eq!(
            driver.get_attribute(h, AttributeKey::WriterOverflow).1,
            AttributeValue::Flag(true)
        );
    }

    #[test]
    fn underflow_sets_flag() {
        let driver = SimulatedDriver::with_fifo_depth(4);
        let h = open(&driver, true);
        driver.write_elements(h, 2);
        assert_eq!(driver.read_elements(h, 3), Some(2));
        assert_eq!(
            driver.get_attribute(h, AttributeKey::ReaderUnderflow).1,
            AttributeValue::Flag(true)
        );
    }

    #[test]
    fn enable_requires_link() {
        let driver = SimulatedDriver::new();
        let h = open(&driver, false);
        driver.unlink(h);
        assert_eq!(driver.enable(h), SimulatedDriver::NOT_LINKED);
    }

    #[test]
    fn unknown_handle() {
        let driver = SimulatedDriver::new();
        assert_eq!(driver.link(StreamHandle(99)), SimulatedDriver::INVALID_HANDLE);
        assert_eq!(driver.destroy(StreamHandle(99)), SimulatedDriver::INVALID_HANDLE);
    }

    #[test]
    fn queued_failure_skips_action() {
        let driver = SimulatedDriver::new();
        let h = open(&driver, true);
        driver.queue_status(DriverCall::Disable, -9);
        assert_eq!(driver.disable(h), StatusCode(-9));
        assert_eq!(
            driver.get_attribute(h, AttributeKey::StreamState).1,
            AttributeValue::State(state_codes::ENABLED)
        );
        // Only the next call is affected.
        assert_eq!(driver.disable(h), StatusCode::SUCCESS);
    }

    #[test]
    fn queued_warning_still_acts() {
        let driver = SimulatedDriver::new();
        let h = open(&driver, true);
        driver.queue_status(DriverCall::Disable, 4);
        assert_eq!(driver.disable(h), StatusCode(4));
        assert_eq!(
            driver.get_attribute(h, AttributeKey::StreamState).1,
            AttributeValue::State(state_codes::DISABLED)
        );
    }

    #[test]
    fn flush_times_out_when_reader_is_full() {
        let driver = SimulatedDriver::with_fifo_depth(4);
        let h = open(&driver, true);
        driver.write_elements(h, 4);
        driver.write_elements(h, 2);
        let (status, timed_out) = driver.flush_and_disable(h, Timeout::Millis(10));
        assert_eq!(status, StatusCode::SUCCESS);
        assert!(timed_out);
    }

    #[test]
    fn wait_times_out_with_warning() {
        let driver = SimulatedDriver::new();
        let h = open(&driver, false);
        let status = driver.wait_for_event(h, StreamEvent::StreamEnabled, Timeout::Millis(10));
        assert_eq!(status, SimulatedDriver::WAIT_TIMED_OUT);
    }

    #[test]
    fn call_names_parse_back() {
        for call in DriverCall::ALL {
            assert_eq!(call.name().parse::<DriverCall>(), Ok(call));
        }
        assert!("reboot".parse::<DriverCall>().is_err());
    }

    #[test]
    fn call_log_is_ordered() {
        let driver = SimulatedDriver::new();
        let h = open(&driver, true);
        driver.disable(h);
        driver.unlink(h);
        driver.destroy(h);
        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::CreateAndLink,
                DriverCall::Disable,
                DriverCall::Unlink,
                DriverCall::Destroy,
            ]
        );
        assert_eq!(driver.live_streams(), 0);
    }
}
