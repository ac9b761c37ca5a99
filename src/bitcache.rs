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

//! O(1) "highest occupied priority" over a 32-bit bitmap.
//!
//! Two equivalent encodings are supported, selected at build time by
//! Cargo feature: `bitcache_clz` maps priority `p` to bit `31 - p` and
//! reads the highest occupied priority off the cache's most significant
//! set bit (cheap when the target has a CLZ instruction); `bitcache_lsb`
//! maps priority `p` directly to bit `p` and reads off the least
//! significant set bit. Callers only ever see `highest()`/`set()`/
//! `clear()`/`is_empty()` — the encoding never leaks past this module.

use crate::thread::Priority;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BitCache(u32);

impl BitCache {
    pub const fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn set(&mut self, p: Priority) {
        self.0 |= Self::mask(p);
    }

    #[inline]
    pub fn clear(&mut self, p: Priority) {
        self.0 &= !Self::mask(p);
    }

    #[inline]
    pub fn is_set(self, p: Priority) -> bool {
        self.0 & Self::mask(p) != 0
    }

    /// The numerically smallest occupied priority, i.e. the highest
    /// priority class. `None` when the cache is empty.
    #[inline]
    pub fn highest(self) -> Option<Priority> {
        if self.0 == 0 {
            return None;
        }
        Some(Self::bit_to_priority(self.0))
    }

    #[inline]
    fn mask(p: Priority) -> u32 {
        cfg_if::cfg_if! {
            if #[cfg(feature = "bitcache_lsb")] {
                1u32 << p
            } else {
                0x8000_0000u32 >> p
            }
        }
    }

    #[inline]
    fn bit_to_priority(bits: u32) -> Priority {
        cfg_if::cfg_if! {
            if #[cfg(feature = "bitcache_lsb")] {
                bits.trailing_zeros() as Priority
            } else {
                bits.leading_zeros() as Priority
            }
        }
    }
}
