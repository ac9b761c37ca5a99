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

// FIXME: We should use kconfig to generate this file.
use crate::thread::Priority;

/// Number of priority classes. The bit-cache is a single machine word, so
/// this can never exceed 32.
pub const PRIO_LEVELS: usize = 32;

/// Priority `0` is reserved: it is never assigned to a runnable thread and
/// the feedback controller treats it as "do not arm".
pub const RESERVED_PRIORITY: Priority = 0;

/// Bottom (least urgent) feedback class. Priority `1` is where every new
/// thread starts; `MAX_Q` is where CPU-bound threads settle into
/// round-robin.
pub const MAX_Q: Priority = 3;

/// One feedback quantum, in microseconds.
pub const QUANTUM_US: u32 = 500_000;

/// Capacity of the process table (dense pid -> descriptor map).
pub const MAX_THREADS: usize = 64;

/// Status threshold: every status `>= ON_RUNQUEUE` means "present in a
/// runqueue FIFO".
pub const ON_RUNQUEUE: u8 = crate::thread::Status::PENDING as u8;

// We must ensure the stack is big enough to contain context and
// to perform computing in the schedule loop.
#[cfg(all(debug_assertions, target_pointer_width = "32"))]
pub const DEFAULT_STACK_SIZE: usize = 8 << 10;
#[cfg(all(not(debug_assertions), target_pointer_width = "32"))]
pub const DEFAULT_STACK_SIZE: usize = 4 << 10;

#[cfg(all(debug_assertions, target_pointer_width = "64"))]
pub const DEFAULT_STACK_SIZE: usize = 16 << 10;
#[cfg(all(not(debug_assertions), target_pointer_width = "64"))]
pub const DEFAULT_STACK_SIZE: usize = 8 << 10;
