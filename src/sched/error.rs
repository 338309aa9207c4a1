/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the scheduler.
//!
//! Two enums model the two failure layers:
//!
//! * [`ScheduleError`] — a process could not be admitted to the table
//!   (capacity, bad argument, missing platform feature).
//! * [`ControlError`] — a control operation (`ready`, `suspend`, `sleep`,
//!   `kill`) targeted a process in the wrong state.
//!
//! Every variant carries the data needed to log it without further lookups.

use thiserror::Error;

use super::process::{Pid, ProcessState, MAX_PRIORITY, MIN_PRIORITY};

/// Why a `schedule*` call failed to admit a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// All process-table slots are occupied.
    #[error("process table is full (all slots occupied)")]
    TableFull,

    /// Priority outside the permitted `[MIN_PRIORITY, MAX_PRIORITY]` band.
    #[error("priority {priority} outside permitted range [{MIN_PRIORITY}, {MAX_PRIORITY}]")]
    InvalidPriority { priority: i32 },

    /// A negative interval was requested.
    #[error("interval {interval_ms}ms is negative")]
    InvalidInterval { interval_ms: i32 },

    /// The build has no millisecond clock (`clock` feature disabled), so
    /// interval scheduling and sleeping are unavailable.
    #[error("millisecond clock support is disabled in this build")]
    ClockDisabled,
}

/// Why a control operation on an existing process failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControlError {
    /// The PID does not name a live process.
    #[error("process {pid} does not exist")]
    NoSuchProcess { pid: Pid },

    /// The target process is in a state the operation does not accept,
    /// e.g. `ready()` on a process that is not suspended.
    #[error("process {pid} is {state:?}, which this operation does not accept")]
    IllegalTransition { pid: Pid, state: ProcessState },

    /// The operation only makes sense from inside a running process.
    #[error("no process is currently executing")]
    NoCurrentProcess,

    /// The build has no millisecond clock (`clock` feature disabled).
    #[error("millisecond clock support is disabled in this build")]
    ClockDisabled,
}
