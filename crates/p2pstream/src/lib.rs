//! p2pstream: lifecycle control for point-to-point peer streams.
//!
//! A peer-to-peer stream moves data directly between two hardware endpoints
//! (a writer and a reader) without passing through host memory. The vendor
//! driver exposes it as a handful of status-returning calls; this crate puts
//! a state machine in front of them so only legal sequences reach the driver
//! and the tracked state matches the real stream, even after partial
//! failures.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use p2pstream::{EndpointId, SimulatedDriver, StreamController, StreamState};
//!
//! let driver = Arc::new(SimulatedDriver::new());
//! let stream = StreamController::new(driver);
//!
//! stream.create_and_link(EndpointId(1), EndpointId(2), false).unwrap();
//! assert_eq!(stream.state(), StreamState::Created);
//!
//! stream.enable().unwrap();
//! assert_eq!(stream.state(), StreamState::Enabled);
//!
//! stream.destroy().unwrap();
//! assert_eq!(stream.state(), StreamState::Uninitialized);
//! ```
//!
//! # Modules
//!
//! - [`controller`]: the [`StreamController`] state machine
//! - [`gateway`]: the [`StreamGateway`] driver trait
//! - [`status`]: status code classification
//! - [`error`]: the [`StreamError`] type
//! - [`state`]: lifecycle states and the legal-move table
//! - [`keys`]: attribute and event keys
//! - [`binding`]: integer/boolean facade for host bindings
//! - [`sim`]: in-process simulated driver

pub mod binding;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod keys;
pub mod sim;
pub mod state;
pub mod status;

pub use binding::HostStream;
pub use controller::{AttributeReading, ControllerConfig, StreamController};
pub use error::StreamError;
pub use gateway::{EndpointId, StreamGateway, StreamHandle, Timeout};
pub use keys::{AttributeKey, AttributeValue, KeyError, StreamEvent, StreamStateCode, ValueWidth};
pub use sim::{DriverCall, SimulatedDriver};
pub use state::{Operation, StreamState};
pub use status::{Completion, DriverStatus, StatusCode};
