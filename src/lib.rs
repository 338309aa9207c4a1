/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! # Celesta — embedded device runtime
//!
//! Celesta is the core runtime of a small always-on device: a cooperative
//! priority scheduler that lets a single-threaded MCU juggle several
//! independent activities, plus the Device Communication Protocol (DCP)
//! codec the device uses to talk to its central Master node.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                   Application processes                   │
//! │                (anything impl Runnable)                   │
//! ├───────────────────────────────────────────────────────────┤
//! │  Coordinator (coordinator)                                │
//! │  registration · updates · connection lifecycle            │
//! ├───────────────────────┬───────────────────────────────────┤
//! │  DCP codec (dcp)      │  Scheduler (sched)                │
//! │  ─ DcpRequest         │  ─ process table (128 slots)      │
//! │  ─ DcpResponse parser │  ─ ready list (priority, FIFO)    │
//! │    with stall budget  │  ─ sleeping list (delta list)     │
//! ├───────────────────────┼───────────────────────────────────┤
//! │  ByteStream (io)      │  1 ms tick · Clock (sched::clock) │
//! ├───────────────────────┴───────────────────────────────────┤
//! │  NvStore (did)  ·  InterruptSource (irs)  ·  config       │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The scheduler multiplexes the CPU across [`Runnable`] processes with
//! strict priorities, FIFO rotation among equals, and a delta-list sleep
//! queue driven by a 1 ms tick.  The [`Coordinator`] runs as one of those
//! processes: it keeps the Master link up, registers the device and its
//! sensors/outputs, and exchanges updates.  The DCP response parser decodes
//! the non-blocking byte stream cooperatively, ceding the CPU through
//! [`Scheduler::sleep`] while it waits, under a fixed stall budget.
//!
//! Everything platform-specific sits behind small capabilities —
//! [`ByteStream`] for the transport, [`NvStore`](did::NvStore) for
//! persistent storage, [`InterruptSource`](irs::InterruptSource) for GPIO
//! edges, [`Clock`](sched::Clock) for hosted time — so the core runs the
//! same on hardware and in tests.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use celesta::{Coordinator, DeviceConfig, Scheduler, TcpByteStream};
//! use celesta::did::MemoryNvStore;
//! use celesta::sched::SystemClock;
//!
//! let mut sched = Scheduler::new();
//! sched.set_clock(SystemClock::new());
//!
//! let coordinator = Coordinator::new(
//!     DeviceConfig::default(),
//!     TcpByteStream::new(),
//!     MemoryNvStore::new(64),
//! );
//! sched
//!     .schedule(Rc::new(RefCell::new(coordinator)), 10)
//!     .expect("empty table has room");
//!
//! sched.start(); // never returns
//! ```

pub mod config;
pub mod coordinator;
pub mod dcp;
pub mod did;
pub mod io;
pub mod irs;
pub mod sched;

pub use config::DeviceConfig;
pub use coordinator::{Coordinator, CoordinatorError, OutputType, SensorType, SubDeviceId};
pub use dcp::{DcpMethod, DcpRequest, DcpResponse, DcpStatus};
pub use io::{ByteStream, MemoryStream, TcpByteStream};
pub use sched::{
    ControlError, Pid, ProcessState, Repeat, Runnable, ScheduleError, Scheduler, SharedRunnable,
};
