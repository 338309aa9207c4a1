/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Whole-runtime scenarios: scheduler, coordinator, and DCP codec working
//! against a scripted master over in-memory transports.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use celesta::dcp::DEFAULT_MAX_BODY_LEN;
use celesta::did::MemoryNvStore;
use celesta::io::MemoryStream;
use celesta::sched::Clock;
use celesta::{
    ByteStream, Coordinator, DcpResponse, DcpStatus, DeviceConfig, Scheduler, SensorType,
};

/// Test clock that advances one millisecond per reading, so cooperative
/// waits always make progress.
struct AutoClock(Cell<u64>);

impl AutoClock {
    fn new() -> Self {
        Self(Cell::new(0))
    }
}

impl Clock for AutoClock {
    fn now_ms(&self) -> u64 {
        let next = self.0.get() + 1;
        self.0.set(next);
        next
    }
}

fn master_reply(status: DcpStatus, body: &str) -> Vec<u8> {
    DcpResponse {
        device_id: "MASTER".into(),
        sub_device_id: String::new(),
        session_id: "S".into(),
        session_timestamp: 0,
        status,
        content_length: body.len() as u32,
        body: body.into(),
    }
    .encode()
}

// ── Coordinator as a scheduled process ────────────────────────────────────────

#[test]
fn device_registers_and_reports_through_the_scheduler() {
    let mut sched = Scheduler::new();

    let (stream, handle) = MemoryStream::pair();
    let store = MemoryNvStore::new(16);
    let coordinator = Rc::new(RefCell::new(Coordinator::new(
        DeviceConfig::default(),
        stream,
        store.clone(),
    )));

    // The coordinator's bookkeeping activation registers the device.
    handle.push_bytes(&master_reply(DcpStatus::Success, "7:SESSBOOT"));
    sched.schedule(coordinator.clone(), 10).unwrap();

    // A sensor process shares the coordinator handle and pushes a reading.
    let update_status = Rc::new(Cell::new(None));
    {
        let coordinator = coordinator.clone();
        let handle = handle.clone();
        let update_status = update_status.clone();
        let sensor = Rc::new(RefCell::new(move |sched: &mut Scheduler| {
            handle.push_bytes(&master_reply(DcpStatus::SuccessNoContent, ""));
            let response = coordinator.borrow_mut().send_update(sched, 12, "21.5");
            update_status.set(Some(response.status));
            0
        }));
        sched.schedule(sensor, 5).unwrap();
    }

    while sched.step() {}

    let coordinator = coordinator.borrow();
    assert_eq!(coordinator.device_id(), 7);
    assert_eq!(coordinator.session_id(), "SESSBOOT");
    assert_eq!(update_status.get(), Some(DcpStatus::SuccessNoContent));

    let written = String::from_utf8(handle.take_written()).unwrap();
    assert!(written.starts_with("POST device\n"), "wire was: {written:?}");
    assert!(
        written.contains("POST update/12\nSESSBOOT: "),
        "wire was: {written:?}"
    );
}

#[test]
fn sensor_registration_runs_inside_an_activation() {
    let mut sched = Scheduler::new();

    let (stream, handle) = MemoryStream::pair();
    let coordinator = Rc::new(RefCell::new(Coordinator::new(
        DeviceConfig::default(),
        stream,
        MemoryNvStore::new(16),
    )));

    handle.push_bytes(&master_reply(DcpStatus::Success, "3:SESSA"));
    handle.push_bytes(&master_reply(DcpStatus::Success, "44"));

    let assigned = Rc::new(Cell::new(None));
    {
        let coordinator = coordinator.clone();
        let assigned = assigned.clone();
        let setup = Rc::new(RefCell::new(move |sched: &mut Scheduler| {
            let sub = coordinator
                .borrow_mut()
                .register_sensor(sched, SensorType::Light)
                .unwrap();
            assigned.set(Some(sub));
            0
        }));
        sched.schedule(setup, 1).unwrap();
    }

    while sched.step() {}

    assert_eq!(assigned.get(), Some(44));
    assert_eq!(
        coordinator.borrow().sensors(),
        &[(44, SensorType::Light)]
    );
}

// ── DCP stall budget against a slow master ────────────────────────────────────

/// Stream whose bytes only become visible after a configurable number of
/// empty polls each, emulating a master that dribbles its response out.
struct TrickleStream {
    bytes: VecDeque<u8>,
    starve_polls: u32,
    remaining_starve: u32,
}

impl TrickleStream {
    fn new(bytes: &[u8], starve_polls: u32) -> Self {
        Self {
            bytes: bytes.iter().copied().collect(),
            starve_polls,
            remaining_starve: starve_polls,
        }
    }
}

impl ByteStream for TrickleStream {
    fn peek(&mut self) -> Option<u8> {
        if self.bytes.is_empty() {
            return None;
        }
        if self.remaining_starve > 0 {
            self.remaining_starve -= 1;
            return None;
        }
        self.bytes.front().copied()
    }

    fn read(&mut self) -> Option<u8> {
        let byte = self.bytes.pop_front();
        self.remaining_starve = self.starve_polls;
        byte
    }

    fn write(&mut self, _bytes: &[u8]) {}
    fn flush(&mut self) {}

    fn connected(&self) -> bool {
        true
    }

    fn connect(&mut self, _host: &str, _port: u16) -> bool {
        true
    }
}

/// Parses `frame` through a [`TrickleStream`] from inside a scheduled
/// process, so the parser's sleeps actually pace against the clock.
fn parse_trickled(frame: &'static [u8], starve_polls: u32) -> DcpResponse {
    let mut sched = Scheduler::new();
    sched.set_clock(AutoClock::new());

    let result = Rc::new(RefCell::new(None));
    {
        let result = result.clone();
        let parser = Rc::new(RefCell::new(move |sched: &mut Scheduler| {
            let mut stream = TrickleStream::new(frame, starve_polls);
            let response = DcpResponse::receive(&mut stream, sched, DEFAULT_MAX_BODY_LEN);
            *result.borrow_mut() = Some(response);
            0
        }));
        sched.schedule(parser, 1).unwrap();
    }

    while sched.step() {}

    let response = result.borrow_mut().take().expect("parser process ran");
    response
}

#[test]
fn slow_but_steady_master_stays_within_the_stall_budget() {
    // One empty poll per byte: well under the 20-attempt budget.
    let response = parse_trickled(b"D\nS:1\n24\n", 1);
    assert_eq!(response.status, DcpStatus::SuccessNoContent);
    assert_eq!(response.device_id, "D");
    assert_eq!(response.session_timestamp, 1);
}

#[test]
fn master_below_the_trickle_threshold_times_out() {
    // Three empty polls per byte exhausts the shared budget mid-frame.
    let response = parse_trickled(b"D\nS:1\n24\n", 3);
    assert_eq!(response.status, DcpStatus::ResponseTimeout);
    assert_eq!(response.device_id, "");
    assert_eq!(response.session_timestamp, 0);
    assert_eq!(response.body, "");
}

#[test]
fn dead_link_times_out_with_a_cleared_record() {
    let response = parse_trickled(b"", 0);
    assert_eq!(response.status, DcpStatus::ResponseTimeout);
    assert_eq!(response.device_id, "");
    assert_eq!(response.sub_device_id, "");
    assert_eq!(response.session_id, "");
    assert_eq!(response.session_timestamp, 0);
    assert_eq!(response.content_length, 0);
    assert_eq!(response.body, "");
}
