//! Integer/boolean surface for host-language bindings.
//!
//! Hosts see one boolean per operation and plain integers for endpoints,
//! attribute keys and event keys. Everything richer (warnings, error kinds)
//! is only visible in the logs from here on.

use std::sync::Arc;

use tracing::debug;

use crate::controller::StreamController;
use crate::error::Result;
use crate::gateway::{EndpointId, StreamGateway, Timeout};
use crate::keys::{AttributeKey, StreamEvent};
use crate::state::StreamState;
use crate::status::Completion;

/// Host-facing wrapper around a [`StreamController`].
///
/// Dropping it tears the stream down.
pub struct HostStream<G: StreamGateway + ?Sized> {
    controller: StreamController<G>,
}

impl<G: StreamGateway + ?Sized> HostStream<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            controller: StreamController::new(gateway),
        }
    }

    /// Construct and create a disabled stream between two endpoints.
    pub fn with_endpoints(gateway: Arc<G>, writer: i32, reader: i32) -> Self {
        let host = Self::new(gateway);
        host.create_and_link_stream(writer, reader, false);
        host
    }

    pub fn controller(&self) -> &StreamController<G> {
        &self.controller
    }

    pub fn create_and_link_stream(&self, writer: i32, reader: i32, enable: bool) -> bool {
        let (Some(writer), Some(reader)) = (endpoint(writer), endpoint(reader)) else {
            debug!("rejecting negative endpoint ids {} / {}", writer, reader);
            return false;
        };
        succeeded("create_and_link", self.controller.create_and_link(writer, reader, enable))
    }

    pub fn destroy_stream(&self) -> bool {
        succeeded("destroy", self.controller.destroy())
    }

    pub fn enable_stream(&self) -> bool {
        succeeded("enable", self.controller.enable())
    }

    pub fn disable_stream(&self) -> bool {
        succeeded("disable", self.controller.disable())
    }

    pub fn flush_and_disable_stream(&self, timeout_ms: i32) -> bool {
        succeeded(
            "flush_and_disable",
            self.controller
                .flush_and_disable(Timeout::from_millis(timeout_ms)),
        )
    }

    /// Event keys: 0 FIFO overflow, 1 FIFO underflow, 2 enabled, 3 disabled.
    /// Anything else fails without reaching the driver.
    pub fn wait_for_stream_event(&self, event: i32, timeout_ms: i32) -> bool {
        let Ok(event) = StreamEvent::try_from(event) else {
            debug!("ignoring wait on unknown event key {}", event);
            return false;
        };
        succeeded(
            "wait_for_event",
            self.controller
                .wait_for_event(event, Timeout::from_millis(timeout_ms)),
        )
    }

    pub fn link_stream(&self) -> bool {
        succeeded("link", self.controller.link())
    }

    pub fn unlink_stream(&self) -> bool {
        succeeded("unlink", self.controller.unlink())
    }

    /// Attribute keys 0-6 in [`AttributeKey::ALL`] order. Returns 0 for
    /// unknown keys and failed reads.
    pub fn get_attribute(&self, key: i32) -> i64 {
        let Ok(key) = AttributeKey::try_from(key) else {
            debug!("unknown attribute key {}", key);
            return 0;
        };
        match self.controller.attribute(key) {
            Ok(reading) => reading.value.as_i64(),
            Err(e) => {
                debug!("get_attribute {} failed: {}", key, e);
                0
            }
        }
    }

    /// `(created, linked, enabled)`.
    pub fn flags(&self) -> (bool, bool, bool) {
        self.state().flags()
    }

    pub fn state(&self) -> StreamState {
        self.controller.state()
    }
}

fn endpoint(id: i32) -> Option<EndpointId> {
    u32::try_from(id).ok().map(EndpointId)
}

fn succeeded(op: &str, result: Result<Completion>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            debug!("{} reported to host as failure: {}", op, e);
            false
        }
    }
}
