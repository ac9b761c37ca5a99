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

//! Preemptive priority scheduler core with a multi-level feedback-queue
//! policy, for a single-hart real-time kernel.
//!
//! The base scheduler (process table, per-priority runqueues, bit-cache,
//! active-thread tracking) is independent of the feedback policy layered
//! on top of it; the two communicate through a pair of observer hooks
//! rather than a direct call graph. Everything architecture-specific
//! (interrupt masking, idle, context switching, the quantum timer) is
//! injected through the [`collaborator`] traits rather than hardcoded,
//! so this crate has no knowledge of any particular target.

#![cfg_attr(not(test), no_std)]

pub mod bitcache;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod feedback;
pub mod logger;
pub mod runqueue;
pub mod scheduler;
mod support;
pub mod sync;
pub mod thread;

pub use collaborator::{
    collaborator, quantum_timer, set_collaborator, set_quantum_timer, Collaborator, QuantumTimer,
};
pub use error::PanicKind;
pub use scheduler::{
    change_priority, context_switch_requested, pick_next, register_cb, register_thread,
    set_status, switch, task_exit,
};
pub use thread::{Pid, Priority, Status, Thread};

/// Bring the feedback controller online. Call once during startup, after
/// [`set_collaborator`] and [`set_quantum_timer`] and before interrupts
/// are enabled.
pub fn init() {
    logger::logger_init();
    feedback::init();
}

/// `on_quantum_expiry()` — the quantum timer's callback. Exposed at the
/// crate root since external collaborators (the timer ISR) are the ones
/// who invoke it.
pub fn on_quantum_expiry() {
    feedback::on_quantum_expiry();
}

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    let _ = info;
    collaborator::collaborator().core_panic(error::PanicKind::ContractViolation, "panic");
}

/// The scheduler state is process-wide singletons, matching the design
/// this crate implements (there is exactly one scheduler on a single
/// hart). The test harness runs `#[test]` functions on a thread pool
/// within one process, so every test that touches the singletons must
/// serialize against every other such test.
#[cfg(test)]
pub(crate) static TEST_SERIAL: std::sync::Mutex<()> = std::sync::Mutex::new(());
