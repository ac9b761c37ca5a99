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

use crate::collaborator::collaborator;

/// RAII interrupt mask. Disables interrupts on construction, restores the
/// previous mask on drop. This is the scheduler's only concurrency
/// primitive: every mutation of the runqueue table, bit-cache,
/// active-thread pointers, or a thread's `status`/`priority` happens while
/// one of these (or a [`PlainIrqGuard`]) is held.
#[derive(Debug)]
pub(crate) struct IrqGuard {
    token: usize,
}

impl IrqGuard {
    #[inline]
    pub fn new() -> Self {
        Self {
            token: collaborator().irq_disable(),
        }
    }
}

impl Drop for IrqGuard {
    #[inline]
    fn drop(&mut self) {
        collaborator().irq_restore(self.token);
    }
}

/// Same as [`IrqGuard`] but does not restore on drop; the caller owns the
/// un-pairing and must call `collaborator().irq_restore` itself. Used where
/// "interrupts disabled" is a documented precondition rather than
/// something the function manages on the caller's behalf.
pub(crate) struct PlainIrqGuard;

impl PlainIrqGuard {
    #[inline]
    pub fn new() -> Self {
        collaborator().irq_disable();
        Self
    }
}
