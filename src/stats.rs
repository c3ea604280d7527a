//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Runtime statistics.
//!
//! Both the protocol orchestrator and every transport instance own one
//! [`StatsRecorder`]. Counters are lock-free atomics; the wall-clock stamps
//! sit behind a mutex so readers always get a consistent snapshot.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Thread-safe monotonic counters plus activity timestamps.
///
/// # Examples
///
/// ```rust
/// use umicp::stats::StatsRecorder;
///
/// let stats = StatsRecorder::new();
/// stats.record_sent(128);
/// stats.record_received(64);
///
/// let snapshot = stats.snapshot();
/// assert_eq!(snapshot.messages_sent, 1);
/// assert_eq!(snapshot.bytes_sent, 128);
/// assert_eq!(snapshot.bytes_received, 64);
/// ```
#[derive(Debug)]
pub struct StatsRecorder {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    errors_count: AtomicU64,
    connection_count: AtomicU64,
    clock: Mutex<Clock>,
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    start_time: Instant,
    last_activity: Instant,
}

/// A consistent copy of the counters at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Messages successfully handed to the wire.
    pub messages_sent: u64,
    /// Messages delivered by the wire.
    pub messages_received: u64,
    /// Bytes successfully handed to the wire.
    pub bytes_sent: u64,
    /// Bytes delivered by the wire.
    pub bytes_received: u64,
    /// Serialization, handler, and transport errors.
    pub errors_count: u64,
    /// Successful connection establishments.
    pub connection_count: u64,
    /// When this recorder was created or last reset.
    pub start_time: Instant,
    /// Last send or receive.
    pub last_activity: Instant,
}

impl StatsRecorder {
    /// Creates a recorder with all counters at zero and both stamps at now.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            errors_count: AtomicU64::new(0),
            connection_count: AtomicU64::new(0),
            clock: Mutex::new(Clock {
                start_time: now,
                last_activity: now,
            }),
        }
    }

    /// Records one successfully sent message of `bytes` bytes.
    pub fn record_sent(&self, bytes: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        self.touch();
    }

    /// Records one received message of `bytes` bytes.
    pub fn record_received(&self, bytes: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        self.touch();
    }

    /// Records one error.
    pub fn record_error(&self) {
        self.errors_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one successful connection establishment.
    pub fn record_connection(&self) {
        self.connection_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a consistent snapshot of all counters and stamps.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let clock = *self.clock.lock();
        StatsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            errors_count: self.errors_count.load(Ordering::Relaxed),
            connection_count: self.connection_count.load(Ordering::Relaxed),
            start_time: clock.start_time,
            last_activity: clock.last_activity,
        }
    }

    /// Zeroes every counter and restamps start/last-activity to now.
    pub fn reset(&self) {
        self.messages_sent.store(0, Ordering::Relaxed);
        self.messages_received.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
        self.errors_count.store(0, Ordering::Relaxed);
        self.connection_count.store(0, Ordering::Relaxed);
        let now = Instant::now();
        *self.clock.lock() = Clock {
            start_time: now,
            last_activity: now,
        };
    }

    fn touch(&self) {
        self.clock.lock().last_activity = Instant::now();
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
