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

//! Per-priority-class intrusive circular FIFOs over the process table.
//!
//! The source recovers the enclosing descriptor from an embedded link via
//! `container_of`; here the process table already maps [`Pid`] to
//! descriptor, so the FIFO is just a head pid per class plus a
//! prev/next pid pair stored in [`crate::thread::RqEntry`] on each
//! descriptor. Push/pop/advance are all O(1).

use crate::config::PRIO_LEVELS;
use crate::thread::{Pid, Priority, RqEntry, Thread, PID_NONE};

/// Borrowed process table: a dense pid -> descriptor slot map.
pub(crate) type ProcessTable = [Option<Thread>];

#[inline]
fn slot_mut(table: &mut ProcessTable, pid: Pid) -> &mut Thread {
    table[pid].as_mut().expect("dangling pid in runqueue")
}

#[derive(Debug)]
pub(crate) struct RunQueues {
    heads: [Pid; PRIO_LEVELS],
}

impl RunQueues {
    pub const fn new() -> Self {
        Self {
            heads: [PID_NONE; PRIO_LEVELS],
        }
    }

    #[inline]
    pub fn is_empty(&self, p: Priority) -> bool {
        self.heads[p as usize] == PID_NONE
    }

    #[inline]
    pub fn head(&self, p: Priority) -> Pid {
        self.heads[p as usize]
    }

    /// Append `pid` to the tail of class `p`. Returns `true` if the class
    /// was empty before this push (the caller uses this to update the
    /// bit-cache and decide whether to fire `on_runq_change`).
    pub fn push(&mut self, table: &mut ProcessTable, pid: Pid, p: Priority) -> bool {
        let head = self.heads[p as usize];
        if head == PID_NONE {
            slot_mut(table, pid).rq_entry = RqEntry {
                prev: pid,
                next: pid,
            };
            self.heads[p as usize] = pid;
            true
        } else {
            let tail = slot_mut(table, head).rq_entry.prev;
            slot_mut(table, tail).rq_entry.next = pid;
            slot_mut(table, pid).rq_entry = RqEntry {
                prev: tail,
                next: head,
            };
            slot_mut(table, head).rq_entry.prev = pid;
            false
        }
    }

    /// Pop the head of class `p`. Returns [`PID_NONE`] if empty.
    pub fn pop(&mut self, table: &mut ProcessTable, p: Priority) -> Pid {
        let head = self.heads[p as usize];
        if head == PID_NONE {
            return PID_NONE;
        }
        self.remove(table, head, p);
        head
    }

    /// Unlink an arbitrary member of class `p` (used when a runnable
    /// thread is blocked or retired without having been popped first).
    pub fn remove(&mut self, table: &mut ProcessTable, pid: Pid, p: Priority) {
        let entry = slot_mut(table, pid).rq_entry;
        if entry.next == pid {
            debug_assert_eq!(self.heads[p as usize], pid);
            self.heads[p as usize] = PID_NONE;
        } else {
            slot_mut(table, entry.prev).rq_entry.next = entry.next;
            slot_mut(table, entry.next).rq_entry.prev = entry.prev;
            if self.heads[p as usize] == pid {
                self.heads[p as usize] = entry.next;
            }
        }
        slot_mut(table, pid).rq_entry = RqEntry::UNLINKED;
    }

    /// Rotate the head of class `p` to the tail, releasing whichever
    /// thread is next in line. No-op on an empty or single-member class.
    pub fn advance(&mut self, table: &mut ProcessTable, p: Priority) {
        let head = self.heads[p as usize];
        if head == PID_NONE {
            return;
        }
        let next = slot_mut(table, head).rq_entry.next;
        self.heads[p as usize] = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::Status;

    fn table(n: usize) -> Vec<Option<Thread>> {
        (0..n)
            .map(|i| Some(Thread::new(i, 0x1000 + i, 4096, 1_000_000, None)))
            .collect()
    }

    #[test]
    fn push_pop_fifo_order() {
        let mut t = table(3);
        let mut rq = RunQueues::new();
        assert!(rq.push(&mut t, 0, 1));
        assert!(!rq.push(&mut t, 1, 1));
        assert!(!rq.push(&mut t, 2, 1));
        assert_eq!(rq.pop(&mut t, 1), 0);
        assert_eq!(rq.pop(&mut t, 1), 1);
        assert_eq!(rq.pop(&mut t, 1), 2);
        assert_eq!(rq.pop(&mut t, 1), PID_NONE);
        assert!(rq.is_empty(1));
    }

    #[test]
    fn advance_rotates_head_to_tail() {
        let mut t = table(2);
        let mut rq = RunQueues::new();
        rq.push(&mut t, 0, 3);
        rq.push(&mut t, 1, 3);
        assert_eq!(rq.head(3), 0);
        rq.advance(&mut t, 3);
        assert_eq!(rq.head(3), 1);
        rq.advance(&mut t, 3);
        assert_eq!(rq.head(3), 0);
    }

    #[test]
    fn remove_mid_list_preserves_ring() {
        let mut t = table(3);
        let mut rq = RunQueues::new();
        rq.push(&mut t, 0, 2);
        rq.push(&mut t, 1, 2);
        rq.push(&mut t, 2, 2);
        rq.remove(&mut t, 1, 2);
        assert_eq!(rq.pop(&mut t, 2), 0);
        assert_eq!(rq.pop(&mut t, 2), 2);
        assert!(rq.is_empty(2));
        let _ = Status::PENDING;
    }
}
