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

//! Thread descriptor and status ordering.
//!
//! Descriptors are created externally; this crate only ever holds a
//! borrowed reference to one by [`Pid`]. Status forms a total order where
//! every "on a runqueue" state compares `>=` [`crate::config::ON_RUNQUEUE`],
//! mirroring the reference kernel's own status encoding.

use crate::config::PRIO_LEVELS;

/// Dense small integer naming a thread; index into the process table.
pub type Pid = usize;

/// Priority class, `0..PRIO_LEVELS`. `0` is reserved (see
/// [`crate::config::RESERVED_PRIORITY`]); runnable classes start at `1`.
pub type Priority = u8;

pub const PID_NONE: Pid = usize::MAX;

/// Thread status. Ordered so that every status `>= ON_RUNQUEUE`
/// (i.e. `>= PENDING`) means "linked into a runqueue FIFO".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Status {
    /// Not yet started, or retired by `task_exit`.
    STOPPED = 0,
    /// Blocked off a runqueue (mutex, queue, sleep, ...).
    BLOCKED = 1,
    /// Linked into a runqueue FIFO, waiting for `pick_next`.
    PENDING = 2,
    /// Currently selected by `pick_next`; head of its class's FIFO.
    RUNNING = 3,
}

impl Status {
    #[inline]
    pub fn is_on_runqueue(self) -> bool {
        self as u8 >= crate::config::ON_RUNQUEUE
    }
}

/// Intrusive FIFO link. `prev`/`next` are [`Pid`]s; [`PID_NONE`] marks an
/// unlinked end. Meaningful only while `status.is_on_runqueue()`.
#[derive(Debug, Clone, Copy)]
pub struct RqEntry {
    pub prev: Pid,
    pub next: Pid,
}

impl RqEntry {
    pub const UNLINKED: RqEntry = RqEntry {
        prev: PID_NONE,
        next: PID_NONE,
    };
}

/// A schedulable thread. Owned by its creator; the scheduler borrows it by
/// pid through the process table. Every field is plain data, so the
/// descriptor itself is `Copy` — the process table stores it by value.
#[derive(Debug, Clone, Copy)]
pub struct Thread {
    pub pid: Pid,
    pub priority: Priority,
    pub status: Status,
    pub stack_start: usize,
    pub stack_size: usize,
    /// Microseconds of CPU budget remaining; feedback-only, monotonically
    /// non-increasing. `0` means "exhausted".
    pub service_time: u32,
    pub rq_entry: RqEntry,
    pub name: Option<&'static str>,
}

impl Thread {
    /// Build a new descriptor at the default starting priority (`1`),
    /// `STOPPED`, not linked into any runqueue.
    pub fn new(
        pid: Pid,
        stack_start: usize,
        stack_size: usize,
        service_time: u32,
        name: Option<&'static str>,
    ) -> Self {
        debug_assert!(stack_start != 0, "null stack");
        Self {
            pid,
            priority: 1,
            status: Status::STOPPED,
            stack_start,
            stack_size,
            service_time,
            rq_entry: RqEntry::UNLINKED,
            name,
        }
    }

    /// `true` iff the canary word at `stack_start` is intact. Checking the
    /// actual memory word is an external collaborator concern in tests
    /// (no real stack exists, so `stack_start` is a made-up integer rather
    /// than a readable address); production builds read the live word.
    /// The `testing` feature shares this stub with `#[cfg(test)]` since the
    /// top-level integration suite links against the library built without
    /// `cfg(test)` but still hands it fake stack addresses.
    #[cfg(not(any(test, feature = "testing")))]
    pub fn canary_intact(&self) -> bool {
        unsafe { *(self.stack_start as *const usize) == self.stack_start }
    }

    #[cfg(any(test, feature = "testing"))]
    pub fn canary_intact(&self) -> bool {
        self.stack_start != 0
    }
}

#[inline]
pub(crate) fn priority_in_range(p: Priority) -> bool {
    (p as usize) < PRIO_LEVELS
}
