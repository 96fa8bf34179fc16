//! Subcommand implementations.

use std::sync::Arc;

use anyhow::{bail, Result};
use p2pconf::{ConfigSources, P2pConfig};
use p2pstream::{
    Completion, ControllerConfig, EndpointId, HostStream, SimulatedDriver, StreamController,
    StreamError, StreamState, Timeout,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::steps::Step;

/// How one step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Warning { code: i32 },
    Error { message: String },
}

impl Outcome {
    fn is_error(&self) -> bool {
        matches!(self, Outcome::Error { .. })
    }
}

impl From<Completion> for Outcome {
    fn from(completion: Completion) -> Self {
        match completion {
            Completion::Clean => Outcome::Ok,
            Completion::Warning(code) => Outcome::Warning { code: code.code() },
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Ok => write!(f, "ok"),
            Outcome::Warning { code } => write!(f, "warning({})", code),
            Outcome::Error { message } => write!(f, "error: {}", message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    pub state: StreamState,
}

impl StepReport {
    /// `step -> outcome[ = value] [state]`
    fn line(&self) -> String {
        match self.value {
            Some(value) => format!("{} -> {} = {} [{}]", self.step, self.outcome, value, self.state),
            None => format!("{} -> {} [{}]", self.step, self.outcome, self.state),
        }
    }
}

/// One controller on a private simulated driver.
pub struct Session {
    driver: Arc<SimulatedDriver>,
    stream: StreamController<SimulatedDriver>,
    config: P2pConfig,
}

impl Session {
    pub fn new(config: &P2pConfig) -> Self {
        let driver = Arc::new(SimulatedDriver::with_fifo_depth(config.simulator.fifo_depth));
        let stream = StreamController::with_config(
            Arc::clone(&driver),
            ControllerConfig {
                teardown_on_fatal: config.controller.teardown_on_fatal,
            },
        );
        Self {
            driver,
            stream,
            config: config.clone(),
        }
    }

    pub fn execute(&self, step: Step) -> StepReport {
        debug!("step {}", step);
        let (outcome, value) = match self.apply(step) {
            Ok((completion, value)) => (Outcome::from(completion), value),
            Err(message) => (Outcome::Error { message }, None),
        };
        StepReport {
            step: step.to_string(),
            outcome,
            value,
            state: self.stream.state(),
        }
    }

    fn apply(&self, step: Step) -> Result<(Completion, Option<i64>), String> {
        let stream = &self.stream;
        let timeouts = &self.config.timeouts;
        let done = |result: Result<Completion, StreamError>| {
            result.map(|c| (c, None)).map_err(|e| e.to_string())
        };

        match step {
            Step::Create => done(stream.create_and_link(
                self.writer(),
                self.reader(),
                self.config.stream.enable_on_create,
            )),
            Step::CreateEnabled => done(stream.create_and_link(self.writer(), self.reader(), true)),
            Step::Destroy => done(stream.destroy()),
            Step::Enable => done(stream.enable()),
            Step::Disable => done(stream.disable()),
            Step::Flush => done(stream.flush_and_disable(Timeout::from_millis(timeouts.flush_ms))),
            Step::Link => done(stream.link()),
            Step::Unlink => done(stream.unlink()),
            Step::Wait(event) => {
                done(stream.wait_for_event(event, Timeout::from_millis(timeouts.wait_ms)))
            }
            Step::Attr(key) => stream
                .attribute(key)
                .map(|reading| (reading.completion, Some(reading.value.as_i64())))
                .map_err(|e| e.to_string()),
            Step::Write(count) => self.move_elements(count, SimulatedDriver::write_elements),
            Step::Read(count) => self.move_elements(count, SimulatedDriver::read_elements),
            Step::Fault(call, status) => {
                self.driver.queue_status(call, status);
                Ok((Completion::Clean, None))
            }
            Step::State => Ok((Completion::Clean, None)),
        }
    }

    /// Push or pull data on the live stream; reports how many elements moved.
    fn move_elements(
        &self,
        count: u32,
        op: fn(&SimulatedDriver, p2pstream::StreamHandle, u32) -> Option<u32>,
    ) -> Result<(Completion, Option<i64>), String> {
        let handle = self
            .stream
            .handle()
            .ok_or_else(|| "no live stream".to_string())?;
        let moved = op(&self.driver, handle, count)
            .ok_or_else(|| format!("driver has no {}", handle))?;
        Ok((Completion::Clean, Some(i64::from(moved))))
    }

    fn writer(&self) -> EndpointId {
        EndpointId(self.config.stream.writer_endpoint)
    }

    fn reader(&self) -> EndpointId {
        EndpointId(self.config.stream.reader_endpoint)
    }

    pub fn state(&self) -> StreamState {
        self.stream.state()
    }
}

/// Execute `steps` in order, printing one line (or JSON object) per step.
pub fn run(config: &P2pConfig, steps: &[Step], json: bool, strict: bool) -> Result<()> {
    let session = Session::new(config);
    let mut failed = 0;

    for &step in steps {
        let report = session.execute(step);
        if report.outcome.is_error() {
            failed += 1;
        }
        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!("{}", report.line());
        }
    }

    let state = session.state();
    if json {
        println!("{}", serde_json::json!({ "final_state": state }));
    } else {
        println!("final state: {}", state);
    }
    info!("{} steps, {} failed, final state {}", steps.len(), failed, state);

    if strict && failed > 0 {
        bail!("{} of {} steps failed", failed, steps.len());
    }
    Ok(())
}

/// Default, create, enable, destroy through the host-facing surface,
/// showing the flags after each call.
pub fn demo(config: &P2pConfig) -> Result<()> {
    let driver = Arc::new(SimulatedDriver::with_fifo_depth(config.simulator.fifo_depth));
    let host = HostStream::new(driver);
    let writer = i32::try_from(config.stream.writer_endpoint)?;
    let reader = i32::try_from(config.stream.reader_endpoint)?;

    let show = |label: &str, ok: Option<bool>| {
        let (created, linked, enabled) = host.flags();
        let result = ok.map(|ok| format!(" -> {}", ok)).unwrap_or_default();
        println!(
            "{}{}: created={} linked={} enabled={}",
            label, result, created, linked, enabled
        );
    };

    show("initial", None);
    let ok = host.create_and_link_stream(writer, reader, false);
    show(&format!("create_and_link({}, {}, false)", writer, reader), Some(ok));
    let ok = host.enable_stream();
    show("enable", Some(ok));
    let ok = host.destroy_stream();
    show("destroy", Some(ok));
    Ok(())
}

/// Print the effective configuration as TOML, with its sources as comments.
pub fn config(config: &P2pConfig, sources: &ConfigSources) -> Result<()> {
    if sources.files.is_empty() {
        println!("# no config files loaded, using defaults");
    }
    for path in &sources.files {
        println!("# file: {}", path.display());
    }
    for var in &sources.env_overrides {
        println!("# env: {}", var);
    }
    print!("{}", config.to_toml());
    Ok(())
}
