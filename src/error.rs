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

//! The only two failure kinds the scheduler core can surface. Both are
//! fatal: there is no recoverable error path once the core's own
//! invariants are violated, so this is a closed enum carried through
//! `Collaborator::core_panic` rather than a `Result`-returning API.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicKind {
    /// The canary word at `stack_start` no longer equals `stack_start`.
    StackOverflow,
    /// A documented precondition was violated by a caller (null thread,
    /// out-of-range priority, `set_status` called with interrupts
    /// enabled, ...). Only raised in debug builds; release builds trust
    /// their callers per the core's documented contract.
    ContractViolation,
}

impl fmt::Display for PanicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanicKind::StackOverflow => write!(f, "stack overflow"),
            PanicKind::ContractViolation => write!(f, "contract violation"),
        }
    }
}
