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

//! Multi-level feedback-queue policy layered on top of the base
//! scheduler via two observer hooks: the runqueue-change notifier and
//! `pick_next`'s `on_select`. Both route through [`arm`], a compare-and-set
//! style rule that only claims the timer when none is currently armed.
//! [`on_quantum_expiry`] is the one caller allowed to bypass that guard
//! (see [`rearm`]) because its own internal demotion can otherwise starve
//! the timer of its authoritative re-arm.

use crate::config::{MAX_Q, QUANTUM_US, RESERVED_PRIORITY};
use crate::sync::SpinLock;
use crate::thread::{Priority, Status, PID_NONE};
use crate::{collaborator, scheduler};

const IDLE: Priority = 0xFF;

static CURRENT_FB_PRIORITY: SpinLock<Priority> = SpinLock::new(IDLE);

/// Wire the feedback controller into the base scheduler's observer slots.
/// Call once during startup, before interrupts are enabled.
pub fn init() {
    scheduler::set_runq_change_observer(on_runq_change);
    scheduler::set_select_observer(on_select);
}

/// Compare-and-set arm: claims the timer for class `p` only if nothing is
/// currently armed. A no-op for the reserved priority `0`.
fn arm(p: Priority) {
    if p == RESERVED_PRIORITY {
        return;
    }
    let mut cur = CURRENT_FB_PRIORITY.irqsave_lock();
    if *cur == IDLE {
        *cur = p;
        log::trace!("feedback: arm class {p}");
        collaborator::quantum_timer().set(QUANTUM_US);
    }
}

/// Unconditional re-arm: always overwrites the armed class and restarts
/// the timer. Used only by the closing step of [`on_quantum_expiry`].
fn rearm(p: Priority) {
    let mut cur = CURRENT_FB_PRIORITY.irqsave_lock();
    *cur = p;
    log::trace!("feedback: rearm class {p}");
    collaborator::quantum_timer().set(QUANTUM_US);
}

fn on_runq_change(p: Priority) {
    arm(p);
}

fn on_select(p: Priority) {
    arm(p);
}

/// `on_quantum_expiry()` — the feedback controller's timer callback.
pub fn on_quantum_expiry() {
    let prio = {
        let mut cur = CURRENT_FB_PRIORITY.irqsave_lock();
        let prio = *cur;
        *cur = IDLE;
        prio
    };

    let active = scheduler::active_pid();
    if active == PID_NONE {
        // Nothing running to demote or debit; leave the controller
        // disarmed until a thread is selected again.
        log::warn!("on_quantum_expiry: fired with no active thread, class {prio}");
        return;
    }

    let ap = scheduler::thread_priority(active);
    log::debug!("on_quantum_expiry: pid {active} class {ap}, armed for {prio}");

    if scheduler::thread_service_time(active) == 0 {
        log::debug!("on_quantum_expiry: pid {active} service time exhausted, terminating");
        scheduler::set_status(active, Status::STOPPED);
        scheduler::advance_class(ap);
        collaborator::collaborator().thread_yield_higher();
        rearm(prio);
        return;
    }

    let mut rearm_prio = prio;
    if ap == prio && ap < MAX_Q {
        log::debug!("on_quantum_expiry: pid {active} demoted {ap} -> {}", ap + 1);
        scheduler::change_priority(active, ap + 1);
        if scheduler::class_is_empty(prio) {
            rearm_prio += 1;
        }
    } else if ap == MAX_Q {
        log::debug!("on_quantum_expiry: pid {active} round-robin at bottom class {MAX_Q}");
        scheduler::advance_class(MAX_Q);
        collaborator::collaborator().thread_yield_higher();
    }
    scheduler::debit_service_time(active, QUANTUM_US);

    rearm(rearm_prio);
}

/// Reset the feedback controller's armed-class state. Only compiled for
/// the in-crate unit tests and the `testing` feature the top-level
/// integration suite builds with.
#[cfg(any(test, feature = "testing"))]
pub fn reset_for_test() {
    *CURRENT_FB_PRIORITY.lock() = IDLE;
}

#[cfg(test)]
pub(crate) fn armed_class_for_test() -> Priority {
    *CURRENT_FB_PRIORITY.lock()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::mock::{MockCollaborator, MockTimer};
    use crate::collaborator::{set_collaborator, set_quantum_timer};
    use crate::thread::Thread;

    static COLLAB: MockCollaborator = MockCollaborator::new();
    static TIMER: MockTimer = MockTimer::new();

    fn setup() -> std::sync::MutexGuard<'static, ()> {
        let guard = crate::TEST_SERIAL
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        scheduler::reset_for_test();
        reset_for_test();
        COLLAB.reset();
        TIMER.reset();
        set_collaborator(&COLLAB);
        set_quantum_timer(&TIMER);
        init();
        guard
    }

    fn spawn(pid: usize, prio: Priority, service_time: u32) {
        let mut t = Thread::new(pid, 0x3000 + pid, 4096, service_time, None);
        t.priority = prio;
        scheduler::register_thread(t);
    }

    #[test]
    fn arm_is_idempotent_under_repeated_select() {
        let _g = setup();
        spawn(0, 1, 1_000_000);
        scheduler::set_status(0, Status::PENDING);
        scheduler::pick_next();
        assert_eq!(armed_class_for_test(), 1);
        assert_eq!(TIMER.set_calls.load(core::sync::atomic::Ordering::Relaxed), 1);

        // Reselecting the same thread must not re-arm (arm is CAS-gated).
        scheduler::pick_next();
        assert_eq!(TIMER.set_calls.load(core::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn scenario_s3_quantum_demotion() {
        let _g = setup();
        spawn(0, 1, 2 * QUANTUM_US);
        scheduler::set_status(0, Status::PENDING);
        scheduler::pick_next();

        on_quantum_expiry();

        assert_eq!(scheduler::thread_priority(0), 2);
        assert_eq!(scheduler::thread_service_time(0), QUANTUM_US);
        assert_eq!(armed_class_for_test(), 2);
    }

    #[test]
    fn property_p5_service_time_non_increasing() {
        let _g = setup();
        spawn(0, 1, 3 * QUANTUM_US);
        scheduler::set_status(0, Status::PENDING);
        scheduler::pick_next();

        let mut prev = scheduler::thread_service_time(0);
        for _ in 0..4 {
            on_quantum_expiry();
            let cur = scheduler::thread_service_time(0);
            assert!(cur <= prev, "service_time rose from {prev} to {cur}");
            prev = cur;
        }
    }

    #[test]
    fn scenario_s4_service_exhaustion() {
        let _g = setup();
        spawn(0, 2, 0);
        spawn(1, 3, 1_000_000);
        scheduler::set_status(0, Status::PENDING);
        scheduler::set_status(1, Status::PENDING);
        scheduler::pick_next();

        on_quantum_expiry();
        assert!(scheduler::class_is_empty(2));
        assert_eq!(scheduler::pick_next(), 1);
    }

    #[test]
    fn scenario_s5_round_robin_bottom_class() {
        let _g = setup();
        spawn(0, 3, 1_000_000);
        spawn(1, 3, 1_000_000);
        scheduler::set_status(0, Status::PENDING);
        scheduler::set_status(1, Status::PENDING);
        assert_eq!(scheduler::pick_next(), 0);

        on_quantum_expiry();
        assert_eq!(scheduler::pick_next(), 1);
    }

    #[test]
    fn demotion_rearms_on_new_class_even_if_old_class_emptied() {
        let _g = setup();
        spawn(0, 1, 1_000_000);
        scheduler::set_status(0, Status::PENDING);
        scheduler::pick_next();
        assert_eq!(armed_class_for_test(), 1);

        on_quantum_expiry();
        // Thread 0 was alone in class 1; demotion to class 2 empties
        // class 1, which would otherwise leave the arming rule believing
        // a timer is already in force. The unconditional re-arm must win.
        assert_eq!(armed_class_for_test(), 2);
        assert_eq!(scheduler::thread_priority(0), 2);
    }
}
