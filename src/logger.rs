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

#![allow(dead_code)]

use crate::sync::SpinLock;
use log::{LevelFilter, Metadata, Record};

static LOGGER_MUTEX: SpinLock<()> = SpinLock::new(());

struct Logger;

pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Set the maximum log level.
pub fn set_max_level(level: LogLevel) {
    match level {
        LogLevel::Trace => log::set_max_level(LevelFilter::Trace),
        LogLevel::Debug => log::set_max_level(LevelFilter::Debug),
        LogLevel::Info => log::set_max_level(LevelFilter::Info),
        LogLevel::Warn => log::set_max_level(LevelFilter::Warn),
        LogLevel::Error => log::set_max_level(LevelFilter::Error),
    }
}

/// Install the process-wide logger. Must be called once, before the
/// scheduler starts logging from interrupt context.
pub fn logger_init() {
    static LOGGER: Logger = Logger {};
    #[cfg(debug_assertions)]
    log::set_max_level(LevelFilter::Trace);
    #[cfg(not(debug_assertions))]
    log::set_max_level(LevelFilter::Warn);
    let _ = log::set_logger(&LOGGER);
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Serialize concurrent writers; callable from interrupt context
        // since the lock disables interrupts for its duration. The actual
        // console/UART sink is an external collaborator concern (out of
        // scope); under `cfg(test)` we have `std` available and print
        // directly so log output is visible while running scenarios.
        let _guard = LOGGER_MUTEX.irqsave_lock();
        #[cfg(test)]
        std::println!("[{}] {}", record.level(), record.args());
        #[cfg(not(test))]
        {
            let _ = record;
        }
    }

    fn flush(&self) {}
}
