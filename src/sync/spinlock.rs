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

use crate::support::IrqGuard;
use core::{
    ops::{Deref, DerefMut},
    sync::atomic::{compiler_fence, Ordering},
};
use spin::{Mutex, MutexGuard};

/// A spinlock that additionally disables interrupts for the duration of
/// the `irqsave_lock` guard's lifetime, so the lock is safe to take from
/// both thread and interrupt context without deadlocking against itself.
#[derive(Debug)]
pub struct SpinLock<T: ?Sized> {
    lock: Mutex<T>,
}

#[derive(Debug)]
pub struct SpinLockGuard<'a, T: ?Sized> {
    mutex_guard: MutexGuard<'a, T>,
    irq_guard: Option<IrqGuard>,
}

impl<'a, T: 'a + ?Sized> Deref for SpinLockGuard<'a, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        self.mutex_guard.deref()
    }
}

impl<'a, T: 'a + ?Sized> DerefMut for SpinLockGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        self.mutex_guard.deref_mut()
    }
}

impl<T> SpinLock<T> {
    pub const fn new(val: T) -> Self {
        Self {
            lock: Mutex::new(val),
        }
    }
}

impl<T: ?Sized> SpinLock<T> {
    pub fn try_irqsave_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let irq_guard = IrqGuard::new();
        compiler_fence(Ordering::SeqCst);
        let mut guard = self.try_lock()?;
        assert!(guard.irq_guard.is_none());
        guard.irq_guard = Some(irq_guard);
        Some(guard)
    }

    pub fn irqsave_lock(&self) -> SpinLockGuard<'_, T> {
        loop {
            if let Some(l) = self.try_irqsave_lock() {
                return l;
            }
            core::hint::spin_loop();
        }
    }

    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let mutex_guard = self.lock.try_lock()?;
        Some(SpinLockGuard {
            irq_guard: None,
            mutex_guard,
        })
    }

    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        loop {
            if let Some(l) = self.try_lock() {
                return l;
            }
            core::hint::spin_loop();
        }
    }
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Sync> Sync for SpinLock<T> {}
