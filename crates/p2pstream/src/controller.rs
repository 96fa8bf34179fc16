//! Stream lifecycle controller.
//!
//! [`StreamController`] owns one native stream handle and only lets the
//! driver see legal sequences of calls. Every driver status goes through the
//! same normalization before any state changes:
//!
//! - **fatal** (negative): logged, the whole stream is torn down, the caller
//!   gets [`StreamError::Fatal`]
//! - **warning** (positive): logged, the call counts as a success and the
//!   caller gets [`Completion::Warning`]
//! - **ok** (zero)
//!
//! Mutating operations hold the lifecycle lock for their whole transition, so
//! they serialize against each other. `wait_for_event` releases it while
//! blocked in the driver, which lets attribute reads proceed on other threads.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{Result, StreamError};
use crate::gateway::{EndpointId, StreamGateway, StreamHandle, Timeout};
use crate::keys::{AttributeKey, AttributeValue, StreamEvent};
use crate::state::{Operation, StreamState};
use crate::status::{Completion, DriverStatus, StatusCode};

/// Controller behaviour knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Tear the stream down when the driver reports a fatal status.
    /// With this off, the stream is left where the failing call found it.
    pub teardown_on_fatal: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            teardown_on_fatal: true,
        }
    }
}

/// Value read from the driver for one attribute key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeReading {
    pub key: AttributeKey,
    pub value: AttributeValue,
    pub completion: Completion,
}

#[derive(Debug, Clone, Copy, Default)]
enum Lifecycle {
    #[default]
    Uninitialized,
    Live {
        handle: StreamHandle,
        state: StreamState,
    },
}

impl Lifecycle {
    fn state(&self) -> StreamState {
        match self {
            Lifecycle::Uninitialized => StreamState::Uninitialized,
            Lifecycle::Live { state, .. } => *state,
        }
    }

    fn handle(&self) -> Option<StreamHandle> {
        match self {
            Lifecycle::Uninitialized => None,
            Lifecycle::Live { handle, .. } => Some(*handle),
        }
    }

    fn set_state(&mut self, next: StreamState) {
        match self {
            Lifecycle::Live { state, .. } if next != StreamState::Uninitialized => *state = next,
            _ => *self = Lifecycle::Uninitialized,
        }
    }
}

/// Guard over a single native peer-to-peer stream.
pub struct StreamController<G: StreamGateway + ?Sized> {
    gateway: Arc<G>,
    config: ControllerConfig,
    lifecycle: Mutex<Lifecycle>,
}

impl<G: StreamGateway + ?Sized> StreamController<G> {
    /// Controller with no stream yet.
    pub fn new(gateway: Arc<G>) -> Self {
        Self::with_config(gateway, ControllerConfig::default())
    }

    pub fn with_config(gateway: Arc<G>, config: ControllerConfig) -> Self {
        Self {
            gateway,
            config,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    /// Construct and immediately create a disabled stream between the two
    /// endpoints.
    ///
    /// The controller is returned even when creation fails; the failure is
    /// logged and the controller stays [`StreamState::Uninitialized`].
    pub fn connect(gateway: Arc<G>, writer: EndpointId, reader: EndpointId) -> Self {
        let controller = Self::new(gateway);
        if let Err(e) = controller.create_and_link(writer, reader, false) {
            warn!("stream {} -> {} not created: {}", writer, reader, e);
        }
        controller
    }

    /// Like [`connect`](Self::connect), but fails if the stream can't be
    /// created.
    pub fn try_connect(
        gateway: Arc<G>,
        writer: EndpointId,
        reader: EndpointId,
        config: ControllerConfig,
    ) -> Result<Self> {
        let controller = Self::with_config(gateway, config);
        controller.create_and_link(writer, reader, false)?;
        Ok(controller)
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> StreamState {
        self.lock().state()
    }

    pub fn handle(&self) -> Option<StreamHandle> {
        self.lock().handle()
    }

    pub fn is_created(&self) -> bool {
        self.state().is_created()
    }

    pub fn is_linked(&self) -> bool {
        self.state().is_linked()
    }

    pub fn is_enabled(&self) -> bool {
        self.state().is_enabled()
    }

    /// Create the stream and link its endpoints in one driver step,
    /// optionally enabling it too.
    pub fn create_and_link(
        &self,
        writer: EndpointId,
        reader: EndpointId,
        enable_on_create: bool,
    ) -> Result<Completion> {
        let mut lc = self.lock();
        let state = lc.state();
        if !Operation::CreateAndLink.permitted_from(state) {
            return Err(StreamError::InvalidTransition {
                operation: Operation::CreateAndLink,
                state,
            });
        }

        debug!("create_and_link {} -> {} (enable: {})", writer, reader, enable_on_create);
        let (status, handle) = self.gateway.create_and_link(writer, reader, enable_on_create);
        let completion = self.check(&mut lc, Operation::CreateAndLink, handle, status)?;

        let state = if enable_on_create {
            StreamState::Enabled
        } else {
            StreamState::Created
        };
        *lc = Lifecycle::Live { handle, state };
        info!("created {} from {} to {} ({})", handle, writer, reader, state);
        Ok(completion)
    }

    /// Disable, unlink and destroy the stream, in that order.
    ///
    /// Each step runs even if an earlier one failed, and each success moves
    /// the state down one stage. The first failure is returned.
    pub fn destroy(&self) -> Result<Completion> {
        let mut lc = self.lock();
        self.destroy_locked(&mut lc)
    }

    /// Enable the stream, linking it first if needed.
    pub fn enable(&self) -> Result<Completion> {
        let mut lc = self.lock();
        self.permit(Operation::Enable, &lc)?;

        let mut completion = Completion::Clean;
        if !lc.state().is_linked() {
            completion = self.transition(&mut lc, Operation::Link, |g, h| g.link(h))?;
        }
        let enabled = self.transition(&mut lc, Operation::Enable, |g, h| g.enable(h))?;
        Ok(completion.and(enabled))
    }

    pub fn disable(&self) -> Result<Completion> {
        let mut lc = self.lock();
        self.transition(&mut lc, Operation::Disable, |g, h| g.disable(h))
    }

    /// Drain in-flight data, then disable.
    ///
    /// A timed-out flush is always an error, even when the driver reported
    /// the disable itself as successful. In that case the stream is left
    /// disabled.
    pub fn flush_and_disable(&self, timeout: Timeout) -> Result<Completion> {
        let mut lc = self.lock();
        let (handle, target) = self.plan(Operation::FlushAndDisable, &lc)?;

        debug!("flush_and_disable {} (timeout: {})", handle, timeout);
        let (status, timed_out) = self.gateway.flush_and_disable(handle, timeout);
        let completion = self.check(&mut lc, Operation::FlushAndDisable, handle, status)?;
        lc.set_state(target);

        if timed_out {
            warn!("flush on {} timed out after {}", handle, timeout);
            return Err(StreamError::FlushTimedOut { timeout });
        }
        Ok(completion)
    }

    /// Block until `event` occurs on the stream or `timeout` elapses.
    pub fn wait_for_event(&self, event: StreamEvent, timeout: Timeout) -> Result<Completion> {
        let handle = {
            let lc = self.lock();
            self.permit(Operation::WaitForEvent, &lc)?
        };

        debug!("waiting for {} on {} (timeout: {})", event, handle, timeout);
        let status = self.gateway.wait_for_event(handle, event, timeout);

        let mut lc = self.lock();
        self.check(&mut lc, Operation::WaitForEvent, handle, status)
    }

    pub fn link(&self) -> Result<Completion> {
        let mut lc = self.lock();
        self.transition(&mut lc, Operation::Link, |g, h| g.link(h))
    }

    /// Unlink the stream, disabling it first if needed.
    pub fn unlink(&self) -> Result<Completion> {
        let mut lc = self.lock();
        self.permit(Operation::Unlink, &lc)?;

        let mut completion = Completion::Clean;
        if lc.state().is_enabled() {
            completion = self.transition(&mut lc, Operation::Disable, |g, h| g.disable(h))?;
        }
        let unlinked = self.transition(&mut lc, Operation::Unlink, |g, h| g.unlink(h))?;
        Ok(completion.and(unlinked))
    }

    pub fn attribute(&self, key: AttributeKey) -> Result<AttributeReading> {
        let mut lc = self.lock();
        let handle = self.permit(Operation::GetAttribute, &lc)?;

        let (status, value) = self.gateway.get_attribute(handle, key);
        let completion = self.check(&mut lc, Operation::GetAttribute, handle, status)?;
        debug!("{} on {} = {}", key, handle, value);
        Ok(AttributeReading {
            key,
            value,
            completion,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        // Flags are only written after a driver call returns, so a panic
        // mid-operation can't leave them half-updated.
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle of the live stream, if `op` is legal from the current state.
    fn permit(&self, op: Operation, lc: &Lifecycle) -> Result<StreamHandle> {
        match lc.handle() {
            Some(handle) if op.permitted_from(lc.state()) => Ok(handle),
            _ => Err(StreamError::InvalidTransition {
                operation: op,
                state: lc.state(),
            }),
        }
    }

    /// Handle plus the state a successful `op` lands on.
    fn plan(&self, op: Operation, lc: &Lifecycle) -> Result<(StreamHandle, StreamState)> {
        match (lc.handle(), op.target(lc.state())) {
            (Some(handle), Some(target)) => Ok((handle, target)),
            _ => Err(StreamError::InvalidTransition {
                operation: op,
                state: lc.state(),
            }),
        }
    }

    /// One driver call moving the stream along the state table.
    fn transition(
        &self,
        lc: &mut Lifecycle,
        op: Operation,
        call: impl FnOnce(&G, StreamHandle) -> StatusCode,
    ) -> Result<Completion> {
        let (handle, target) = self.plan(op, lc)?;
        debug!("{} {} ({} -> {})", op, handle, lc.state(), target);

        let status = call(&*self.gateway, handle);
        let completion = self.check(lc, op, handle, status)?;
        lc.set_state(target);
        Ok(completion)
    }

    fn destroy_locked(&self, lc: &mut Lifecycle) -> Result<Completion> {
        let handle = self.permit(Operation::Destroy, lc)?;
        let mut completion = Completion::Clean;
        let mut first_error = None;

        if lc.state().is_enabled() {
            match self.transition(lc, Operation::Disable, |g, h| g.disable(h)) {
                Ok(c) => completion = completion.and(c),
                Err(e) => first_error = Some(e),
            }
        }

        if lc.state().is_linked() {
            match self.transition(lc, Operation::Unlink, |g, h| g.unlink(h)) {
                Ok(c) => completion = completion.and(c),
                Err(e) => first_error = first_error.or(Some(e)),
            }
        }

        // A fatal status above may already have torn the stream down.
        if lc.handle() == Some(handle) {
            debug!("destroy {} ({})", handle, lc.state());
            let status = self.gateway.destroy(handle);
            match self.check(lc, Operation::Destroy, handle, status) {
                Ok(c) => {
                    *lc = Lifecycle::Uninitialized;
                    completion = completion.and(c);
                    info!("destroyed {}", handle);
                }
                Err(e) => first_error = first_error.or(Some(e)),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(completion),
        }
    }

    /// Normalize a driver status for `op` on `handle`.
    ///
    /// A fatal status only tears the stream down if `handle` is still the
    /// live one; a wait can outlast the stream it started on.
    fn check(
        &self,
        lc: &mut Lifecycle,
        op: Operation,
        handle: StreamHandle,
        status: StatusCode,
    ) -> Result<Completion> {
        match status.classify() {
            DriverStatus::Ok => Ok(Completion::Clean),
            DriverStatus::Warning(code) => {
                warn!("{} on {} returned warning status {}", op, handle, code);
                Ok(Completion::Warning(code))
            }
            DriverStatus::Fatal(code) => {
                let state = lc.state();
                error!("{} on {} failed with status {} (stream was {})", op, handle, code, state);
                if self.config.teardown_on_fatal && lc.handle() == Some(handle) {
                    self.force_teardown(lc);
                }
                Err(StreamError::Fatal {
                    operation: op,
                    code,
                    state,
                })
            }
        }
    }

    /// Best-effort disable, unlink and destroy straight through the gateway.
    /// The handle is released whatever the driver answers.
    fn force_teardown(&self, lc: &mut Lifecycle) {
        let Lifecycle::Live { handle, state } = *lc else {
            return;
        };

        if state.is_enabled() {
            self.log_teardown_step(Operation::Disable, handle, self.gateway.disable(handle));
        }
        if state.is_linked() {
            self.log_teardown_step(Operation::Unlink, handle, self.gateway.unlink(handle));
        }
        self.log_teardown_step(Operation::Destroy, handle, self.gateway.destroy(handle));

        *lc = Lifecycle::Uninitialized;
        warn!("{} torn down after fatal status; recreate to continue", handle);
    }

    fn log_teardown_step(&self, op: Operation, handle: StreamHandle, status: StatusCode) {
        match status.classify() {
            DriverStatus::Ok => debug!("teardown {} {}", op, handle),
            DriverStatus::Warning(code) => {
                warn!("teardown {} on {} returned warning status {}", op, handle, code)
            }
            DriverStatus::Fatal(code) => {
                warn!("teardown {} on {} failed with status {}, continuing", op, handle, code)
            }
        }
    }
}

impl<G: StreamGateway + ?Sized> Drop for StreamController<G> {
    fn drop(&mut self) {
        let mut lc = self.lock();
        if !lc.state().is_created() {
            return;
        }
        if let Err(e) = self.destroy_locked(&mut lc) {
            warn!("stream teardown on drop incomplete: {}", e);
        }
    }
}
