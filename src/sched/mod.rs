/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Cooperative priority scheduler.
//!
//! [`Scheduler`] emulates multi-tasking on a single-threaded MCU.  It owns a
//! fixed-capacity process table, a ready list ordered by descending priority
//! (FIFO among equals), and a sleeping list kept as a delta list so that the
//! 1 ms clock tick costs O(1).
//!
//! ```text
//!            schedule()                          schedule_interval()
//!               │                                        │
//!               ▼                                        ▼
//!            READY  ──dispatch──▶ EXECUTING         SLEEPING
//!              ▲                   │   │               │
//!              │                   │   │  tick() when  │ due
//!              │                   │   └───────────────┘
//!              │                   │ run() returns / kill()
//!              │                   ▼
//!              │                  DEAD
//!              │     suspend() ◀────────┐
//!              └──  ready() ── SUSPENDED┘
//!                        sleep() ▶ SLEEPING
//! ```
//!
//! # Execution model
//!
//! There is exactly one execution context.  Processes are *run-to-completion
//! activations*: [`Scheduler::step`] dispatches the highest-priority ready
//! process and invokes its `run()` to completion.  A process cedes the CPU
//! mid-activation only at explicit suspension points — [`yield_now`],
//! [`sleep`], a self-[`suspend`], or an implicit yield when it schedules a
//! new process — and at those points other ready processes each get complete
//! activations on top of the caller's stack frame before it resumes in
//! place.  `run()` is never re-entered while a process's frame is live: a
//! frame-live process is woken by marking it `READY` *unqueued*, and its own
//! suspension-point loop re-acquires the CPU, so dispatch depth is bounded
//! by the number of live processes.
//!
//! # Ordering guarantees
//!
//! * Ready processes dispatch in strictly descending priority; ties are
//!   FIFO in arrival order.
//! * [`ready`] preempts the running process only when the newly-readied
//!   process has *strictly greater* priority.
//! * A process that voluntarily yields loses the CPU to queued processes of
//!   equal priority (tie goes to the queue, enforcing rotation).
//! * Sleeping processes with the same firing instant wake in insertion
//!   order.
//!
//! # Clocking
//!
//! The 1 ms cadence enters through [`Scheduler::tick`], designed to be
//! driven by a hardware clock interrupt shim.  Hosted builds may instead
//! attach a [`Clock`]; scheduling points then drain elapsed wall time into
//! ticks.  Without the `clock` cargo feature, [`sleep`] and
//! [`schedule_interval`] are unavailable and return
//! [`ScheduleError::ClockDisabled`] / [`ControlError::ClockDisabled`].
//!
//! [`yield_now`]: Scheduler::yield_now
//! [`sleep`]: Scheduler::sleep
//! [`suspend`]: Scheduler::suspend
//! [`ready`]: Scheduler::ready

pub mod clock;
pub mod delta_list;
pub mod error;
pub mod priority_queue;
pub mod process;

use tracing::{debug, info, warn};

pub use clock::{Clock, SystemClock};
pub use delta_list::{DeltaItem, DeltaList};
pub use error::{ControlError, ScheduleError};
pub use priority_queue::PriorityQueue;
pub use process::{
    Pid, ProcessState, Repeat, Runnable, SharedRunnable, MAX_PRIORITY, MAX_PROCESSES,
    MIN_INTERVAL_MS, MIN_PRIORITY,
};

use process::ProcessEntry;

/// Cooperative priority scheduler.
///
/// One instance owns the whole process world; it is deliberately neither
/// `Clone` nor `Copy`.  The application constructs it, threads it through
/// [`Runnable::run`], and hands it the CPU with [`start`](Self::start) (or
/// drives it manually with [`step`](Self::step)).
pub struct Scheduler {
    /// Process table, indexed by PID.  `None` slots are free (`DEAD`).
    table: Vec<Option<ProcessEntry>>,

    /// Processes waiting to execute, highest priority first.
    ready_list: PriorityQueue<Pid>,

    /// Processes waiting for a delay to expire.
    sleeping_list: DeltaList<Pid>,

    /// PID currently holding the CPU, if any.
    current: Option<Pid>,

    /// Rotating allocation hint: the next PID to try, advanced after every
    /// allocation to minimize PID reuse.
    next_valid_pid: Pid,

    /// True once the scheduler has taken control of dispatching.
    started: bool,

    /// Monotonic millisecond counter advanced by [`tick`](Self::tick).
    /// Doubles as the device clock that stamps outgoing requests.
    ticks: u64,

    /// Optional hosted clock; elapsed milliseconds are drained into ticks
    /// at scheduling points.
    clock: Option<Box<dyn Clock>>,

    /// Last clock reading already converted into ticks.
    clock_cursor_ms: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            table: (0..MAX_PROCESSES).map(|_| None).collect(),
            ready_list: PriorityQueue::new(),
            sleeping_list: DeltaList::new(),
            current: None,
            next_valid_pid: 0,
            started: false,
            ticks: 0,
            clock: None,
            clock_cursor_ms: 0,
        }
    }

    /// Attaches a hosted millisecond clock.  Scheduling points will drain
    /// time elapsed on `clock` into [`tick`](Self::tick) calls.
    pub fn set_clock(&mut self, clock: impl Clock + 'static) {
        self.clock_cursor_ms = clock.now_ms();
        self.clock = Some(Box::new(clock));
    }

    // ── Introspection ─────────────────────────────────────────────────────────

    /// PID of the currently executing process, or `None` when idle.
    pub fn current_pid(&self) -> Option<Pid> {
        self.current
    }

    /// State of `pid`; free or out-of-range slots read as
    /// [`ProcessState::Dead`].
    pub fn state_of(&self, pid: Pid) -> ProcessState {
        self.table
            .get(pid)
            .and_then(|slot| slot.as_ref())
            .map(|entry| entry.state)
            .unwrap_or(ProcessState::Dead)
    }

    /// Number of live (non-`DEAD`) processes.
    pub fn process_count(&self) -> usize {
        self.table.iter().filter(|slot| slot.is_some()).count()
    }

    /// Device-monotonic milliseconds: the number of [`tick`](Self::tick)s
    /// observed so far.
    pub fn now_ms(&self) -> u64 {
        self.ticks
    }

    // ── Admission ─────────────────────────────────────────────────────────────

    /// Schedules an aperiodic process: one activation, then the slot is
    /// freed.  Long-lived processes keep the CPU inside `run()` and pace
    /// themselves with [`yield_now`](Self::yield_now) /
    /// [`sleep`](Self::sleep).
    ///
    /// If the scheduler has already taken control, the caller yields once so
    /// a higher-priority newcomer can preempt cooperatively.
    pub fn schedule(
        &mut self,
        runnable: SharedRunnable,
        priority: i32,
    ) -> Result<Pid, ScheduleError> {
        Self::validate_priority(priority)?;

        let pid = self.allocate_pid().ok_or(ScheduleError::TableFull)?;
        self.table[pid] = Some(ProcessEntry {
            runnable,
            state: ProcessState::Ready,
            priority,
            repeat: Repeat::Once,
            interval_ms: 0,
            frame_live: false,
        });
        self.next_valid_pid = (pid + 1) % MAX_PROCESSES;
        self.ready_list.enqueue(pid, priority);

        debug!(pid, priority, "scheduled aperiodic process");

        if self.started {
            self.yield_now();
        }

        Ok(pid)
    }

    /// Schedules a process to execute at `interval_ms` millisecond pacing.
    ///
    /// The interval is clamped up to [`MIN_INTERVAL_MS`]; the first
    /// activation happens one interval from now.  Pacing is relative to the
    /// previous activation's *completion*, so a slow activation delays its
    /// successors.
    #[cfg(feature = "clock")]
    pub fn schedule_interval(
        &mut self,
        runnable: SharedRunnable,
        interval_ms: i32,
        repeat: Repeat,
        priority: i32,
    ) -> Result<Pid, ScheduleError> {
        Self::validate_priority(priority)?;
        if interval_ms < 0 {
            return Err(ScheduleError::InvalidInterval { interval_ms });
        }
        let interval_ms = interval_ms.max(MIN_INTERVAL_MS);

        let pid = self.allocate_pid().ok_or(ScheduleError::TableFull)?;
        self.table[pid] = Some(ProcessEntry {
            runnable,
            state: ProcessState::Sleeping,
            priority,
            repeat,
            interval_ms,
            frame_live: false,
        });
        self.next_valid_pid = (pid + 1) % MAX_PROCESSES;
        self.sleeping_list.insert(pid, interval_ms);

        debug!(pid, priority, interval_ms, ?repeat, "scheduled interval process");

        if self.started {
            self.yield_now();
        }

        Ok(pid)
    }

    /// Interval scheduling requires the millisecond clock.
    #[cfg(not(feature = "clock"))]
    pub fn schedule_interval(
        &mut self,
        _runnable: SharedRunnable,
        _interval_ms: i32,
        _repeat: Repeat,
        _priority: i32,
    ) -> Result<Pid, ScheduleError> {
        Err(ScheduleError::ClockDisabled)
    }

    // ── Main loop ─────────────────────────────────────────────────────────────

    /// Hands the CPU to the scheduler permanently.  Call at the end of
    /// device setup; this loop takes the place of the firmware main loop.
    pub fn start(&mut self) -> ! {
        info!("scheduler taking control of the main loop");
        loop {
            self.step();
        }
    }

    /// One iteration of the main loop: give the host a breath, drain the
    /// clock, dispatch at most one ready process.  Returns `true` if a
    /// process was dispatched.
    ///
    /// [`start`](Self::start) calls this forever; tests and embedders that
    /// keep their own outer loop may drive it directly.
    pub fn step(&mut self) -> bool {
        self.started = true;
        self.host_yield();
        self.pump_clock();
        self.dispatch_next_at_least(i32::MIN)
    }

    // ── Clock ─────────────────────────────────────────────────────────────────

    /// Advances scheduler time by one millisecond.
    ///
    /// Decrements the sleeping list head; every process whose delay has
    /// drained is marked `READY` and queued for dispatch.  Designed to be
    /// called from the 1 ms clock interrupt shim: it never invokes `run()`
    /// and never logs.  Wake-ups take effect at the next scheduling point.
    pub fn tick(&mut self) {
        self.ticks += 1;

        if self.sleeping_list.is_empty() {
            return;
        }

        self.sleeping_list.decrement(1);

        while self.sleeping_list.peek().is_some_and(|head| head.delta <= 0) {
            let pid = self.sleeping_list.pop().expect("peeked head exists");
            let Some(entry) = self.table.get_mut(pid).and_then(|slot| slot.as_mut()) else {
                continue;
            };
            if entry.state != ProcessState::Sleeping {
                continue;
            }
            entry.state = ProcessState::Ready;
            if !entry.frame_live {
                let priority = entry.priority;
                self.ready_list.enqueue(pid, priority);
            }
        }
    }

    // ── Suspension points ─────────────────────────────────────────────────────

    /// Voluntarily cedes the CPU.
    ///
    /// If a queued process of equal or higher priority is waiting, the
    /// caller is demoted behind its equals and those processes run first;
    /// otherwise the caller continues immediately.
    pub fn yield_now(&mut self) {
        self.reschedule();
    }

    /// Pauses the current process for at least `interval_ms` milliseconds.
    ///
    /// Other ready processes run while this one sleeps; control returns
    /// here once the delay has drained and no queued process outranks the
    /// sleeper.  The wait only terminates if ticks keep arriving (hardware
    /// interrupt shim or an attached [`Clock`]).
    #[cfg(feature = "clock")]
    pub fn sleep(&mut self, interval_ms: i32) -> Result<(), ControlError> {
        let pid = self.current.ok_or(ControlError::NoCurrentProcess)?;

        self.sleeping_list.insert(pid, interval_ms);
        if let Some(entry) = self.table[pid].as_mut() {
            entry.state = ProcessState::Sleeping;
        }

        self.relinquish(pid);
        Ok(())
    }

    /// Sleeping requires the millisecond clock.
    #[cfg(not(feature = "clock"))]
    pub fn sleep(&mut self, _interval_ms: i32) -> Result<(), ControlError> {
        Err(ControlError::ClockDisabled)
    }

    /// Suspends `pid`.  Legal only for `READY` or `EXECUTING` processes.
    ///
    /// Suspending the currently executing process parks it on the spot: the
    /// call blocks cooperatively (other processes keep running) until some
    /// other process calls [`ready`](Self::ready) on it.
    pub fn suspend(&mut self, pid: Pid) -> Result<(), ControlError> {
        let Some(entry) = self.table.get(pid).and_then(|slot| slot.as_ref()) else {
            return Err(ControlError::NoSuchProcess { pid });
        };

        match entry.state {
            ProcessState::Ready => {
                self.table[pid].as_mut().expect("checked above").state = ProcessState::Suspended;
                self.ready_list.remove(&pid);
                debug!(pid, "suspended ready process");
                Ok(())
            }
            ProcessState::Executing => {
                self.table[pid].as_mut().expect("checked above").state = ProcessState::Suspended;
                debug!(pid, "suspended executing process");
                if self.current == Some(pid) {
                    self.relinquish(pid);
                }
                Ok(())
            }
            state => Err(ControlError::IllegalTransition { pid, state }),
        }
    }

    /// Marks a `SUSPENDED` process ready to execute again.
    ///
    /// Preempts the running process only if the newly-readied one has
    /// strictly greater priority.
    pub fn ready(&mut self, pid: Pid) -> Result<(), ControlError> {
        let Some(entry) = self.table.get_mut(pid).and_then(|slot| slot.as_mut()) else {
            return Err(ControlError::NoSuchProcess { pid });
        };

        if entry.state != ProcessState::Suspended {
            return Err(ControlError::IllegalTransition {
                pid,
                state: entry.state,
            });
        }

        entry.state = ProcessState::Ready;
        let priority = entry.priority;
        if !entry.frame_live {
            self.ready_list.enqueue(pid, priority);
        }
        debug!(pid, priority, "readied process");

        if let Some(cur) = self.current {
            let cur_priority = self.table[cur]
                .as_ref()
                .map(|entry| entry.priority)
                .unwrap_or(i32::MAX);
            if priority > cur_priority {
                self.reschedule();
            }
        }

        Ok(())
    }

    /// Kills the current process: its slot is freed immediately.
    ///
    /// The scheduler cannot unwind the caller's stack, so the process must
    /// return from `run()` promptly after calling this and attempt nothing
    /// else.
    pub fn kill(&mut self) -> Result<(), ControlError> {
        let pid = self.current.ok_or(ControlError::NoCurrentProcess)?;
        self.table[pid] = None;
        debug!(pid, "process killed");
        Ok(())
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn validate_priority(priority: i32) -> Result<(), ScheduleError> {
        if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            Ok(())
        } else {
            Err(ScheduleError::InvalidPriority { priority })
        }
    }

    /// Next free PID by rotating-hint linear probe, or `None` when the
    /// probe wraps back to the hint with every slot occupied.
    fn allocate_pid(&self) -> Option<Pid> {
        let hint = self.next_valid_pid;
        let mut pid = hint;
        loop {
            if self.table[pid].is_none() {
                return Some(pid);
            }
            pid = (pid + 1) % MAX_PROCESSES;
            if pid == hint {
                return None;
            }
        }
    }

    /// Gives the underlying OS / host environment a chance to run.
    fn host_yield(&self) {
        std::thread::yield_now();
    }

    /// Drains wall time elapsed on the attached clock into ticks.
    fn pump_clock(&mut self) {
        let Some(clock) = self.clock.as_ref() else {
            return;
        };
        let now = clock.now_ms();
        let elapsed = now.saturating_sub(self.clock_cursor_ms);
        if elapsed == 0 {
            return;
        }
        self.clock_cursor_ms = now;

        if self.sleeping_list.is_empty() {
            self.ticks += elapsed;
            return;
        }
        for _ in 0..elapsed {
            self.tick();
        }
    }

    /// Dispatches the head of the ready list if its priority is at least
    /// `threshold`.  Returns `true` if a process ran.
    fn dispatch_next_at_least(&mut self, threshold: i32) -> bool {
        while let Some(priority) = self.ready_list.peek_priority() {
            if priority < threshold {
                return false;
            }
            let pid = self.ready_list.dequeue().expect("peeked head exists");
            let dispatchable = self.table[pid]
                .as_ref()
                .is_some_and(|entry| entry.state == ProcessState::Ready && !entry.frame_live);
            if dispatchable {
                self.dispatch(pid);
                return true;
            }
            warn!(pid, "discarding stale ready-list entry");
        }
        false
    }

    /// Runs one complete activation of `pid` and applies the repeat policy.
    fn dispatch(&mut self, pid: Pid) {
        let runnable = {
            let entry = self.table[pid].as_mut().expect("dispatch on live slot");
            entry.state = ProcessState::Executing;
            entry.frame_live = true;
            entry.runnable.clone()
        };

        let previous = self.current.replace(pid);
        let code = runnable.borrow_mut().run(self);
        self.current = previous;

        if let Some(entry) = self.table[pid].as_mut() {
            entry.frame_live = false;
        }
        if code != 0 {
            debug!(pid, code, "process activation returned nonzero");
        }

        self.post_execute(pid);
    }

    /// Applies the repeat policy after an activation returns: one-shots and
    /// exhausted repetitions free the slot, everything else goes back to
    /// sleep for one interval.
    fn post_execute(&mut self, pid: Pid) {
        let (state, repeat, interval_ms) = match self.table[pid].as_ref() {
            Some(entry) => (entry.state, entry.repeat, entry.interval_ms),
            None => return, // killed itself mid-activation
        };

        if state != ProcessState::Executing {
            // The activation returned from inside a suspension point without
            // re-acquiring the CPU; nothing to account.
            warn!(pid, ?state, "activation returned in unexpected state");
            return;
        }

        match repeat {
            Repeat::Once => {
                self.table[pid] = None;
            }
            Repeat::Times(n) if n <= 1 => {
                debug!(pid, "interval process exhausted its repetitions");
                self.table[pid] = None;
            }
            Repeat::Times(n) => {
                let entry = self.table[pid].as_mut().expect("checked above");
                entry.repeat = Repeat::Times(n - 1);
                entry.state = ProcessState::Sleeping;
                self.sleeping_list.insert(pid, interval_ms);
            }
            Repeat::Forever => {
                let entry = self.table[pid].as_mut().expect("checked above");
                entry.state = ProcessState::Sleeping;
                self.sleeping_list.insert(pid, interval_ms);
            }
        }
    }

    /// Voluntary-yield core: if a queued process of equal or higher
    /// priority is waiting, demote the caller behind its equals and let
    /// those processes run before control returns.
    fn reschedule(&mut self) {
        self.host_yield();
        self.pump_clock();

        if self.ready_list.is_empty() {
            return;
        }

        let Some(cur) = self.current else {
            // Called outside any activation: just dispatch the head.
            if self.started {
                self.dispatch_next_at_least(i32::MIN);
            }
            return;
        };

        let Some(entry) = self.table[cur].as_ref() else {
            return;
        };
        if entry.state != ProcessState::Executing {
            return;
        }
        let cur_priority = entry.priority;

        if self
            .ready_list
            .peek_priority()
            .is_some_and(|head| head < cur_priority)
        {
            return; // nobody queued outranks or ties us
        }

        debug!(pid = cur, "yield: ceding CPU to queued peers");
        self.table[cur].as_mut().expect("checked above").state = ProcessState::Ready;
        self.relinquish(cur);
    }

    /// Cedes the CPU until `pid` may hold it again.
    ///
    /// While `pid` is `SLEEPING` or `SUSPENDED`, any ready process gets
    /// dispatched (complete activations, nested on this stack).  Once `pid`
    /// is `READY` again, queued processes that outrank or tie it still go
    /// first; then it resumes in place as `EXECUTING`.  Returns immediately
    /// if `pid` died while waiting — the caller is expected to unwind.
    fn relinquish(&mut self, pid: Pid) {
        debug_assert_eq!(self.current, Some(pid), "relinquish outside own activation");

        loop {
            self.host_yield();
            self.pump_clock();

            match self.state_of(pid) {
                ProcessState::Dead | ProcessState::Executing => return,
                ProcessState::Ready => {
                    let priority = self.table[pid].as_ref().expect("ready slot").priority;
                    if self
                        .ready_list
                        .peek_priority()
                        .is_some_and(|head| head >= priority)
                    {
                        self.dispatch_next_at_least(priority);
                    } else {
                        self.table[pid].as_mut().expect("ready slot").state =
                            ProcessState::Executing;
                        return;
                    }
                }
                ProcessState::Sleeping | ProcessState::Suspended => {
                    self.dispatch_next_at_least(i32::MIN);
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
