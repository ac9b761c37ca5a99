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

//! Architecture-specific externals the core consumes but never implements
//! itself (see the "EXTERNAL INTERFACES" section of the design this crate
//! follows). A single global `&'static dyn Collaborator` is installed once
//! at startup, the same way the reference kernel installs its architecture
//! adapter as a process-wide singleton.
//!
//! This design is single-hart (see `Non-goals`), so the singleton is a
//! plain `static mut` behind `set`/`get` functions rather than an atomic or
//! a lock, matching the reference kernel's own per-core `MaybeUninit`
//! singletons.

use crate::error::PanicKind;

/// Architecture / platform hooks the scheduler core is built against.
///
/// All methods may be called with interrupts disabled and, for
/// `thread_yield_higher`/`core_panic`, from interrupt context.
pub trait Collaborator: Sync {
    /// Disable interrupts and return an opaque restore token.
    fn irq_disable(&self) -> usize;
    /// Restore the interrupt mask to a token previously returned by
    /// `irq_disable`. Pairable and nesting-safe.
    fn irq_restore(&self, token: usize);
    /// True when executing on the interrupt stack.
    fn irq_is_in(&self) -> bool;
    /// Halt the hart until the next interrupt. Returns with interrupts
    /// momentarily re-enabled, so the idle loop in `pick_next` stays
    /// preemption-aware.
    fn arch_idle(&self);
    /// Trigger `pick_next` via a software interrupt or direct call.
    fn thread_yield_higher(&self);
    /// Drop the current context for good. Never returns.
    fn cpu_switch_context_exit(&self) -> !;
    /// Fatal, non-recoverable failure channel. Never returns.
    fn core_panic(&self, kind: PanicKind, msg: &str) -> !;
}

/// The monotonic microsecond timer the feedback controller arms. Separate
/// from [`Collaborator`] because its lifecycle (single-shot, re-armable,
/// owned exclusively by the feedback controller) is distinct from the
/// general architecture adapter.
pub trait QuantumTimer: Sync {
    /// Arm (or re-arm) the single-shot timer to fire `on_quantum_expiry`
    /// after `us` microseconds. Overwriting an armed timer is legal.
    fn set(&self, us: u32);
}

static mut COLLABORATOR: Option<&'static dyn Collaborator> = None;
static mut QUANTUM_TIMER: Option<&'static dyn QuantumTimer> = None;

/// Install the process-wide [`Collaborator`]. Must be called exactly once,
/// before the scheduler runs and before interrupts are enabled.
pub fn set_collaborator(c: &'static dyn Collaborator) {
    unsafe {
        COLLABORATOR = Some(c);
    }
}

/// Install the process-wide [`QuantumTimer`]. Must be called exactly once,
/// before the feedback controller arms its first quantum.
pub fn set_quantum_timer(t: &'static dyn QuantumTimer) {
    unsafe {
        QUANTUM_TIMER = Some(t);
    }
}

/// Fetch the installed [`Collaborator`].
///
/// # Panics
/// Panics if no collaborator has been installed via [`set_collaborator`].
pub fn collaborator() -> &'static dyn Collaborator {
    unsafe { COLLABORATOR }.expect("no Collaborator installed")
}

/// Fetch the installed [`QuantumTimer`].
///
/// # Panics
/// Panics if no timer has been installed via [`set_quantum_timer`].
pub fn quantum_timer() -> &'static dyn QuantumTimer {
    unsafe { QUANTUM_TIMER }.expect("no QuantumTimer installed")
}
