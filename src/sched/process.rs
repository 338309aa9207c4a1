/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Process model: identifiers, states, repeat policies, and the [`Runnable`]
//! capability executed at dispatch time.

use std::cell::RefCell;
use std::rc::Rc;

use super::Scheduler;

/// Process identifier: an index into the scheduler's process table, in
/// `[0, MAX_PROCESSES)`.
pub type Pid = usize;

/// Capacity of the process table.  If you need this many processes on one
/// microcontroller, reconsider the design before raising it.
pub const MAX_PROCESSES: usize = 128;

/// Smallest interval, in milliseconds, at which a process may be scheduled
/// or slept.  Platform-tunable; some MCUs misbehave below ~3 ms.
pub const MIN_INTERVAL_MS: i32 = 3;

/// Lowest permitted process priority.
pub const MIN_PRIORITY: i32 = 1;

/// Highest permitted process priority.
pub const MAX_PRIORITY: i32 = 15;

/// The unit of work the scheduler dispatches.
///
/// `run` executes one activation of the process and must return in bounded
/// time; long-lived processes either structure their work as repeated
/// activations or cede the CPU via [`Scheduler::yield_now`] /
/// [`Scheduler::sleep`].  A return of `0` signals success; any other value
/// is a process-specific failure code that the scheduler logs but does not
/// interpret.
pub trait Runnable {
    fn run(&mut self, sched: &mut Scheduler) -> i32;
}

/// Closures can be scheduled directly.
impl<F> Runnable for F
where
    F: FnMut(&mut Scheduler) -> i32,
{
    fn run(&mut self, sched: &mut Scheduler) -> i32 {
        self(sched)
    }
}

/// Shared handle to a schedulable unit of work.
///
/// The scheduler holds one of these per live process; callers keep their own
/// clone if they need to reach the runnable after scheduling it.
pub type SharedRunnable = Rc<RefCell<dyn Runnable>>;

/// Current state of a process table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// The slot is free; the process cannot execute again.
    Dead,
    /// Waiting to execute.
    Ready,
    /// Holding the CPU.
    Executing,
    /// Waiting for a delay to expire.
    Sleeping,
    /// Parked until another process calls [`Scheduler::ready`].
    Suspended,
}

/// How often a process executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Execute a single activation, then die.
    Once,
    /// Execute the given number of interval-paced activations.  `Times(0)`
    /// behaves like [`Repeat::Once`].
    Times(u32),
    /// Execute at the interval indefinitely.
    Forever,
}

/// One occupied slot of the process table.
#[derive(Clone)]
pub(super) struct ProcessEntry {
    pub(super) runnable: SharedRunnable,
    pub(super) state: ProcessState,
    pub(super) priority: i32,
    pub(super) repeat: Repeat,
    /// Interval between activations in milliseconds; `0` for aperiodic
    /// processes.
    pub(super) interval_ms: i32,
    /// True while this process's `run()` frame is live on the dispatch
    /// stack.  A frame-live process is never enqueued on the ready list:
    /// wake-ups mark it `Ready` unqueued and its own suspension-point loop
    /// re-acquires the CPU.
    pub(super) frame_live: bool,
}

impl std::fmt::Debug for ProcessEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessEntry")
            .field("state", &self.state)
            .field("priority", &self.priority)
            .field("repeat", &self.repeat)
            .field("interval_ms", &self.interval_ms)
            .field("frame_live", &self.frame_live)
            .finish_non_exhaustive()
    }
}
