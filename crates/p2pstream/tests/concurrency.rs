//! Blocking waits against a controller shared between threads.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use p2pstream::{
    AttributeKey, AttributeValue, Completion, EndpointId, SimulatedDriver, StreamController,
    StreamEvent, StreamState, Timeout,
};

const W: EndpointId = EndpointId(10);
const R: EndpointId = EndpointId(11);

type Shared = Arc<StreamController<SimulatedDriver>>;

fn shared(enable: bool) -> Result<(Arc<SimulatedDriver>, Shared)> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let driver = Arc::new(SimulatedDriver::new());
    let stream = Arc::new(StreamController::new(Arc::clone(&driver)));
    stream.create_and_link(W, R, enable)?;
    Ok((driver, stream))
}

#[test]
fn wait_does_not_block_other_operations() -> Result<()> {
    let (_, stream) = shared(false)?;

    let waiter = {
        let stream = Arc::clone(&stream);
        thread::spawn(move || {
            stream.wait_for_event(StreamEvent::StreamEnabled, Timeout::Millis(5_000))
        })
    };
    thread::sleep(Duration::from_millis(50));

    // Both of these need the lifecycle lock while the waiter is parked.
    let started = Instant::now();
    let reading = stream.attribute(AttributeKey::ReaderCapacity)?;
    assert_eq!(reading.value, AttributeValue::Count(1024));
    stream.enable()?;
    assert!(started.elapsed() < Duration::from_secs(1));

    let woke = waiter.join().expect("waiter panicked")?;
    assert_eq!(woke, Completion::Clean);
    assert_eq!(stream.state(), StreamState::Enabled);
    Ok(())
}

#[test]
fn overflow_event_reaches_waiter() -> Result<()> {
    let (driver, stream) = shared(false)?;
    let handle = stream.handle().expect("live stream");

    let waiter = {
        let stream = Arc::clone(&stream);
        thread::spawn(move || {
            stream.wait_for_event(StreamEvent::FifoOverflow, Timeout::Infinite)
        })
    };
    thread::sleep(Duration::from_millis(50));

    // Disabled stream: nothing drains, so the second write overflows.
    driver.write_elements(handle, 1000);
    driver.write_elements(handle, 1000);

    assert_eq!(waiter.join().expect("waiter panicked")?, Completion::Clean);
    let overflow = stream.attribute(AttributeKey::WriterOverflow)?;
    assert_eq!(overflow.value, AttributeValue::Flag(true));
    Ok(())
}

#[test]
fn wait_timeout_is_a_warning() -> Result<()> {
    let (_, stream) = shared(true)?;

    let completion = stream.wait_for_event(StreamEvent::FifoUnderflow, Timeout::Millis(20))?;
    assert_eq!(completion, Completion::Warning(SimulatedDriver::WAIT_TIMED_OUT));
    assert_eq!(stream.state(), StreamState::Enabled);
    Ok(())
}

#[test]
fn destroy_wakes_waiter_without_touching_new_stream() -> Result<()> {
    let (driver, stream) = shared(false)?;

    let waiter = {
        let stream = Arc::clone(&stream);
        thread::spawn(move || {
            stream.wait_for_event(StreamEvent::StreamEnabled, Timeout::Millis(2_000))
        })
    };
    thread::sleep(Duration::from_millis(50));

    stream.destroy()?;
    stream.create_and_link(W, R, false)?;
    let replacement = stream.handle();

    // The waiter's handle is gone; its failure must not tear down the
    // stream created in the meantime.
    let _ = waiter.join().expect("waiter panicked");
    assert_eq!(stream.state(), StreamState::Created);
    assert_eq!(stream.handle(), replacement);
    assert_eq!(driver.live_streams(), 1);
    Ok(())
}

#[test]
fn concurrent_readers_see_consistent_flags() -> Result<()> {
    let (_, stream) = shared(false)?;

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let stream = Arc::clone(&stream);
            thread::spawn(move || {
                for _ in 0..200 {
                    let (created, linked, enabled) = stream.state().flags();
                    assert!(!enabled || linked);
                    assert!(!linked || created);
                    let _ = stream.attribute(AttributeKey::StreamState);
                }
            })
        })
        .collect();

    for _ in 0..50 {
        stream.enable()?;
        stream.disable()?;
        stream.unlink()?;
    }

    for reader in readers {
        reader.join().expect("reader panicked");
    }
    Ok(())
}
