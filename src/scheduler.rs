// Copyright (c) 2025 vivo Mobile Communication Co., Ltd.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The base priority scheduler: process table, runqueues, bit-cache and
//! the active-thread pointer, plus the five operations the rest of the
//! kernel drives it with.
//!
//! `pick_next`/`set_status` are documented as requiring interrupts already
//! disabled by the caller, so they take the plain (non-irqsave) lock.
//! `switch`/`change_priority`/`task_exit` manage their own interrupt mask
//! and so are safe to call from ordinary thread context.

use crate::collaborator::collaborator;
use crate::config::{MAX_THREADS, PRIO_LEVELS};
use crate::error::PanicKind;
use crate::runqueue::RunQueues;
use crate::support::IrqGuard;
use crate::sync::SpinLock;
use crate::thread::{priority_in_range, Pid, Priority, Status, Thread, PID_NONE};
use crate::bitcache::BitCache;

type EventCb = fn(Pid, Pid);
type PriorityCb = fn(Priority);

struct SchedulerState {
    threads: [Option<Thread>; MAX_THREADS],
    runqueues: RunQueues,
    bitcache: BitCache,
    active_pid: Pid,
    live_count: usize,
    switch_requested: bool,
    runq_change_cb: Option<PriorityCb>,
    select_cb: Option<PriorityCb>,
    event_cb: Option<EventCb>,
}

impl SchedulerState {
    const fn new() -> Self {
        Self {
            threads: [None; MAX_THREADS],
            runqueues: RunQueues::new(),
            bitcache: BitCache::new(),
            active_pid: PID_NONE,
            live_count: 0,
            switch_requested: false,
            runq_change_cb: None,
            select_cb: None,
            event_cb: None,
        }
    }

    #[inline]
    fn thread_mut(&mut self, pid: Pid) -> &mut Thread {
        self.threads[pid].as_mut().expect("dangling pid in process table")
    }

    #[inline]
    fn thread_ref(&self, pid: Pid) -> &Thread {
        self.threads[pid].as_ref().expect("dangling pid in process table")
    }

    fn fire_event(&self, prev: Pid, next: Pid) {
        if let Some(cb) = self.event_cb {
            cb(prev, next);
        }
    }

    /// `push`/`pop` corresponding to the source's `_runqueue_push`/`_runqueue_pop`:
    /// mutate the bit-cache and fire the runqueue-change notifier on an
    /// empty<->non-empty transition of the *active* priority class.
    fn push(&mut self, pid: Pid, p: Priority) {
        log::trace!("runqueue: push pid {pid} onto class {p}");
        let was_empty = self.runqueues.push(&mut self.threads, pid, p);
        self.bitcache.set(p);
        if was_empty
            && self.active_pid != PID_NONE
            && self.thread_ref(self.active_pid).priority == p
        {
            if let Some(cb) = self.runq_change_cb {
                cb(p);
            }
        }
    }

    fn pop(&mut self, pid: Pid, p: Priority) {
        log::trace!("runqueue: pop pid {pid} off class {p}");
        self.runqueues.remove(&mut self.threads, pid, p);
        if self.runqueues.is_empty(p) {
            self.bitcache.clear(p);
            if let Some(cb) = self.runq_change_cb {
                cb(p);
            }
        }
    }

    fn set_status_inner(&mut self, pid: Pid, new_status: Status) {
        let t = self.thread_ref(pid);
        let current = t.status;
        let priority = t.priority;
        if new_status.is_on_runqueue() && !current.is_on_runqueue() {
            self.push(pid, priority);
        } else if !new_status.is_on_runqueue() && current.is_on_runqueue() {
            self.pop(pid, priority);
        }
        self.thread_mut(pid).status = new_status;
    }

    /// Put a `RUNNING` thread back to `PENDING` and check its stack canary.
    fn unschedule(&mut self, pid: Pid) {
        let t = self.thread_mut(pid);
        if t.status == Status::RUNNING {
            t.status = Status::PENDING;
        }
        if !self.thread_ref(pid).canary_intact() {
            log::error!("unschedule: pid {pid} stack canary corrupted");
            collaborator().core_panic(PanicKind::StackOverflow, "stack canary corrupted");
        }
        self.fire_event(pid, PID_NONE);
    }

    /// Steps 3-8 of the selection operation; step 2 (the idle spin) lives
    /// in the free function `pick_next` since it must drop the lock
    /// across `arch_idle()`.
    fn pick_next_selected(&mut self) -> Pid {
        let prev = self.active_pid;
        self.switch_requested = false;
        let p = self
            .bitcache
            .highest()
            .expect("pick_next selected with an empty bit-cache");
        let next = self.runqueues.head(p);
        debug_assert_ne!(next, PID_NONE);
        if next == PID_NONE {
            log::error!("pick_next: bit-cache claims class {p} occupied but its FIFO is empty");
            collaborator().core_panic(PanicKind::ContractViolation, "bit-cache/runqueue desync");
        }

        if let Some(cb) = self.select_cb {
            cb(p);
        }
        self.thread_mut(next).status = Status::RUNNING;

        if next == prev {
            // Same thread reselected; there is no transition to report.
            return next;
        }
        if prev != PID_NONE {
            self.unschedule(prev);
        }
        self.active_pid = next;
        self.fire_event(prev, next);
        next
    }
}

static SCHED: SpinLock<SchedulerState> = SpinLock::new(SchedulerState::new());

/// Register a freshly built descriptor into the process table at the pid
/// it already carries. Thread creation itself (stack allocation, pid
/// assignment) is the responsibility of the rest of the kernel; this is
/// the hand-off point where a descriptor becomes schedulable.
pub fn register_thread(thread: Thread) {
    let pid = thread.pid;
    let mut sched = SCHED.lock();
    debug_assert!(sched.threads[pid].is_none(), "pid already registered");
    if sched.threads[pid].is_some() {
        log::error!("register_thread: pid {pid} already registered");
        collaborator().core_panic(PanicKind::ContractViolation, "pid already registered");
    }
    log::debug!("register_thread: pid {pid} priority {}", thread.priority);
    sched.threads[pid] = Some(thread);
    sched.live_count += 1;
}

/// Select the next thread to run. Spins in the idle loop while the
/// bit-cache is empty (with `idle_thread` compiled in, that loop is
/// skipped in favor of a dedicated idle thread occupying priority 0
/// instead), dropping the scheduler lock across `arch_idle()` so an ISR
/// is free to push a runnable thread and break the wait.
pub fn pick_next() -> Pid {
    loop {
        let mut sched = SCHED.lock();
        if sched.bitcache.is_empty() && !cfg!(feature = "idle_thread") {
            log::trace!("pick_next: runqueues empty, idling");
            let prev = sched.active_pid;
            if prev != PID_NONE {
                sched.unschedule(prev);
            }
            sched.active_pid = PID_NONE;
            drop(sched);
            collaborator().arch_idle();
            continue;
        }
        let next = sched.pick_next_selected();
        log::trace!("pick_next: selected pid {next}");
        return next;
    }
}

/// Move a thread to `new_status`, linking or unlinking it from its
/// priority class's runqueue as the on/off-runqueue transition requires.
///
/// Precondition: called with interrupts already disabled.
pub fn set_status(pid: Pid, new_status: Status) {
    log::trace!("set_status: pid {pid} -> {new_status:?}");
    let mut sched = SCHED.lock();
    sched.set_status_inner(pid, new_status);
}

/// Voluntary yield hint: ask the active thread to give up the CPU if a
/// thread of priority `other_prio` or better is ready to run. Defers to
/// the pending-switch flag when called from interrupt context, since the
/// scheduler itself must not be re-entered there.
pub fn switch(other_prio: Priority) {
    let (should_yield, in_irq) = {
        let sched = SCHED.irqsave_lock();
        let on_runqueue_and_ranked = sched.active_pid != PID_NONE
            && sched.thread_ref(sched.active_pid).status.is_on_runqueue()
            && sched.thread_ref(sched.active_pid).priority <= other_prio;
        (!on_runqueue_and_ranked, collaborator().irq_is_in())
    };
    if !should_yield {
        return;
    }
    if in_irq {
        SCHED.irqsave_lock().switch_requested = true;
    } else {
        collaborator().thread_yield_higher();
    }
}

/// Re-rank a thread, re-linking it at the tail of its new priority class
/// if it's currently runnable, and kick the active thread off the CPU if
/// the change makes someone more urgent ready.
pub fn change_priority(pid: Pid, new_prio: Priority) {
    debug_assert!(priority_in_range(new_prio), "priority out of range");
    if !priority_in_range(new_prio) {
        log::error!("change_priority: pid {pid} new_prio {new_prio} out of range");
        collaborator().core_panic(PanicKind::ContractViolation, "priority out of range");
    }

    let mut sched = SCHED.irqsave_lock();
    let old_prio = sched.thread_ref(pid).priority;
    if old_prio == new_prio {
        return;
    }
    log::debug!("change_priority: pid {pid} {old_prio} -> {new_prio}");

    if sched.thread_ref(pid).status.is_on_runqueue() {
        sched.pop(pid, old_prio);
        sched.push(pid, new_prio);
    }
    sched.thread_mut(pid).priority = new_prio;

    let active_pid = sched.active_pid;
    let should_yield = if active_pid == pid {
        true
    } else {
        active_pid != PID_NONE
            && sched.thread_ref(active_pid).priority > new_prio
            && sched.thread_ref(pid).status.is_on_runqueue()
    };
    drop(sched);

    if should_yield {
        collaborator().thread_yield_higher();
    }
}

/// Retire the calling thread for good and fall through to the
/// architecture's context-exit path. Never returns.
///
/// The process table slot and the descriptor's runqueue membership are
/// two different things here (unlike a raw TCB pointer, our descriptor
/// *is* the table slot), so the STOPPED transition must happen before the
/// slot is cleared rather than after, even though this reorders relative
/// to a literal step-by-step reading. The externally observable end state
/// (slot empty, thread stopped and off every runqueue, live count
/// decremented, no active thread) is the same either way.
pub fn task_exit() -> ! {
    let _leaked = IrqGuard::new();
    core::mem::forget(_leaked);

    let mut sched = SCHED.lock();
    let pid = sched.active_pid;
    debug_assert_ne!(pid, PID_NONE, "task_exit with no active thread");
    if pid == PID_NONE {
        log::error!("task_exit: called with no active thread");
        collaborator().core_panic(PanicKind::ContractViolation, "task_exit with no active thread");
    }
    log::debug!("task_exit: pid {pid}");
    sched.set_status_inner(pid, Status::STOPPED);
    sched.threads[pid] = None;
    sched.live_count -= 1;
    sched.active_pid = PID_NONE;
    drop(sched);

    collaborator().cpu_switch_context_exit()
}

/// Install the optional scheduler-event observer `fn(prev_pid, next_pid)`.
pub fn register_cb(cb: EventCb) {
    SCHED.lock().event_cb = Some(cb);
}

/// Install the runqueue-change notifier the feedback controller rides on.
/// Crate-internal wiring only; not part of the public surface.
pub(crate) fn set_runq_change_observer(cb: PriorityCb) {
    SCHED.lock().runq_change_cb = Some(cb);
}

/// Install the `on_select` notifier fired by `pick_next` step 5.
pub(crate) fn set_select_observer(cb: PriorityCb) {
    SCHED.lock().select_cb = Some(cb);
}

/// Pid of the thread `pick_next` most recently selected, or `PID_NONE`.
pub fn active_pid() -> Pid {
    SCHED.lock().active_pid
}

/// A thread's current priority class. Introspection only; the scheduler
/// itself always reads this from the locked process table directly.
pub fn thread_priority(pid: Pid) -> Priority {
    SCHED.lock().thread_ref(pid).priority
}

/// A thread's remaining feedback service-time budget, in microseconds.
pub fn thread_service_time(pid: Pid) -> u32 {
    SCHED.lock().thread_ref(pid).service_time
}

pub(crate) fn debit_service_time(pid: Pid, us: u32) {
    let mut sched = SCHED.lock();
    let t = sched.thread_mut(pid);
    t.service_time = t.service_time.saturating_sub(us);
}

pub(crate) fn advance_class(p: Priority) {
    let mut sched = SCHED.lock();
    sched.runqueues.advance(&mut sched.threads, p);
}

/// Whether priority class `p`'s FIFO is currently empty.
pub fn class_is_empty(p: Priority) -> bool {
    SCHED.lock().runqueues.is_empty(p)
}

pub fn context_switch_requested() -> bool {
    SCHED.lock().switch_requested
}

/// Reset all scheduler state to its initial, empty value. Only compiled
/// for the in-crate unit tests and the `testing` feature the top-level
/// integration suite builds with; never part of a production binary.
#[cfg(any(test, feature = "testing"))]
pub fn reset_for_test() {
    let mut sched = SCHED.lock();
    *sched = SchedulerState::new();
}

const _: () = assert!(PRIO_LEVELS <= 32, "bit-cache is a single u32");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::mock::MockCollaborator;
    use crate::collaborator::{set_collaborator, Collaborator};
    use crate::error::PanicKind;
    use crate::thread::Thread;
    use core::cell::Cell;
    use core::sync::atomic::{AtomicU32, Ordering};
    use std::sync::MutexGuard;

    static COLLAB: MockCollaborator = MockCollaborator::new();

    fn setup() -> MutexGuard<'static, ()> {
        let guard = crate::TEST_SERIAL
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        reset_for_test();
        COLLAB.reset();
        set_collaborator(&COLLAB);
        guard
    }

    fn spawn(pid: Pid, prio: Priority) {
        let mut t = Thread::new(pid, 0x2000 + pid, 4096, 1_000_000, None);
        t.priority = prio;
        register_thread(t);
    }

    /// The pid at the tail of class `p`'s FIFO, or `PID_NONE` if empty.
    fn tail_of(p: Priority) -> Pid {
        let sched = SCHED.lock();
        let head = sched.runqueues.head(p);
        if head == PID_NONE {
            return PID_NONE;
        }
        sched.thread_ref(head).rq_entry.prev
    }

    #[test]
    fn scenario_s1_priority_selection() {
        let _g = setup();
        spawn(0, 1);
        spawn(1, 2);
        spawn(2, 3);
        set_status(0, Status::PENDING);
        set_status(1, Status::PENDING);
        set_status(2, Status::PENDING);

        let next = pick_next();
        assert_eq!(next, 0);
        assert_eq!(SCHED.lock().thread_ref(0).status, Status::RUNNING);
        assert!(!SCHED.lock().switch_requested);
    }

    #[test]
    fn scenario_s2_preempt_on_priority_raise() {
        let _g = setup();
        spawn(0, 3);
        spawn(1, 3);
        set_status(0, Status::PENDING);
        set_status(1, Status::PENDING);
        assert_eq!(pick_next(), 0);

        change_priority(1, 1);
        assert_eq!(COLLAB.yields(), 1);
        assert_eq!(pick_next(), 1);
    }

    #[test]
    fn change_priority_noop_when_unchanged() {
        let _g = setup();
        spawn(0, 2);
        set_status(0, Status::PENDING);
        change_priority(0, 2);
        assert_eq!(COLLAB.yields(), 0);
    }

    #[test]
    fn scenario_s6_idle_loop_until_isr_push() {
        struct IdleThenPush {
            idles: AtomicU32,
            pushed: Cell<bool>,
        }
        unsafe impl Sync for IdleThenPush {}
        impl Collaborator for IdleThenPush {
            fn irq_disable(&self) -> usize {
                0
            }
            fn irq_restore(&self, _token: usize) {}
            fn irq_is_in(&self) -> bool {
                false
            }
            fn arch_idle(&self) {
                let n = self.idles.fetch_add(1, Ordering::Relaxed);
                if n == 2 && !self.pushed.get() {
                    self.pushed.set(true);
                    set_status(0, Status::PENDING);
                }
            }
            fn thread_yield_higher(&self) {}
            fn cpu_switch_context_exit(&self) -> ! {
                unreachable!()
            }
            fn core_panic(&self, kind: PanicKind, msg: &str) -> ! {
                panic!("core_panic: {kind}: {msg}");
            }
        }
        static IDLE: IdleThenPush = IdleThenPush {
            idles: AtomicU32::new(0),
            pushed: Cell::new(false),
        };

        let _g = setup();
        spawn(0, 1);
        set_collaborator(&IDLE);
        IDLE.idles.store(0, Ordering::Relaxed);
        IDLE.pushed.set(false);

        assert_eq!(pick_next(), 0);
        assert!(IDLE.idles.load(Ordering::Relaxed) >= 3);
        assert_eq!(SCHED.lock().thread_ref(0).status, Status::RUNNING);

        set_collaborator(&COLLAB);
    }

    #[test]
    fn property_p1_bit_set_iff_fifo_nonempty() {
        let _g = setup();
        spawn(0, 2);
        spawn(1, 3);
        set_status(0, Status::PENDING);
        set_status(1, Status::PENDING);

        let sched = SCHED.lock();
        for p in 0..PRIO_LEVELS as Priority {
            assert_eq!(
                sched.bitcache.is_set(p),
                !sched.runqueues.is_empty(p),
                "priority {p} bit/fifo mismatch"
            );
        }
    }

    #[test]
    fn property_p4_change_priority_places_thread_at_tail() {
        let _g = setup();
        spawn(0, 2);
        spawn(1, 2);
        spawn(2, 3);
        set_status(0, Status::PENDING);
        set_status(1, Status::PENDING);
        set_status(2, Status::PENDING);

        change_priority(0, 3);
        assert_eq!(tail_of(3), 0);
        assert!(!SCHED.lock().runqueues.is_empty(2));
        // thread 0 no longer present in class 2's single remaining member chain
        assert_eq!(SCHED.lock().runqueues.head(2), 1);
    }

    #[test]
    fn property_p2_single_membership_iff_on_runqueue() {
        let _g = setup();
        spawn(0, 2);
        spawn(1, 2);
        spawn(2, 3);

        {
            let sched = SCHED.lock();
            for pid in 0..3 {
                assert!(!sched.thread_ref(pid).status.is_on_runqueue());
                assert_eq!(sched.thread_ref(pid).rq_entry.prev, PID_NONE);
                assert_eq!(sched.thread_ref(pid).rq_entry.next, PID_NONE);
            }
        }

        set_status(0, Status::PENDING);
        set_status(1, Status::PENDING);
        set_status(2, Status::PENDING);
        {
            let sched = SCHED.lock();
            for pid in 0..3 {
                assert!(sched.thread_ref(pid).status.is_on_runqueue());
                assert_ne!(sched.thread_ref(pid).rq_entry.next, PID_NONE);
            }
        }

        // Taking pid 0 off the runqueue unlinks it and leaves pid 1 as a
        // single-member FIFO of its own, not touching class 3 at all.
        set_status(0, Status::BLOCKED);
        let sched = SCHED.lock();
        assert!(!sched.thread_ref(0).status.is_on_runqueue());
        assert_eq!(sched.thread_ref(0).rq_entry.prev, PID_NONE);
        assert_eq!(sched.thread_ref(0).rq_entry.next, PID_NONE);
        assert_eq!(sched.thread_ref(1).rq_entry.next, 1);
        assert!(sched.thread_ref(2).status.is_on_runqueue());
    }

    #[test]
    fn property_p3_pick_next_returns_smallest_occupied_class() {
        let _g = setup();
        spawn(0, 5);
        spawn(1, 2);
        spawn(2, 7);
        set_status(0, Status::PENDING);
        set_status(1, Status::PENDING);
        set_status(2, Status::PENDING);

        let next = pick_next();
        assert_eq!(next, 1);
        assert_eq!(SCHED.lock().thread_ref(next).priority, 2);
    }
}
