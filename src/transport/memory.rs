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

//! In-process pair transport.
//!
//! [`MemoryTransport::pair`] creates two connected endpoints that exchange
//! whole messages over Tokio channels. This is the deterministic substrate
//! for orchestrator and dispatch tests: no network stack, no timing, same
//! [`Transport`] contract as the real transports.

use crate::error::{ProtocolError, Result};
use crate::stats::{StatsRecorder, StatsSnapshot};
use crate::transport::{
    CallbackSlots, ConnectionCallback, ConnectionState, ErrorCallback, MessageCallback, Transport,
    TransportConfig,
};
use crate::types::TransportKind;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

/// One endpoint of an in-process transport pair.
///
/// # Examples
///
/// ```rust
/// use umicp::transport::{MemoryTransport, Transport};
/// use std::sync::{Arc, Mutex};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> umicp::error::Result<()> {
/// let (left, right) = MemoryTransport::pair();
///
/// let received = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&received);
/// right.set_message_callback(Some(Arc::new(move |data: &[u8]| {
///     sink.lock().unwrap().push(data.to_vec());
/// })));
///
/// left.connect().await?;
/// right.connect().await?;
/// left.send(b"hello").await?;
/// # tokio::task::yield_now().await;
/// # Ok(())
/// # }
/// ```
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

struct Inner {
    config: RwLock<TransportConfig>,
    state: Mutex<ConnectionState>,
    callbacks: CallbackSlots,
    stats: StatsRecorder,
    peer: mpsc::UnboundedSender<Vec<u8>>,
    pump: AsyncMutex<PumpSlot>,
}

enum PumpSlot {
    /// Receiver parked until the first connect.
    Pending(mpsc::UnboundedReceiver<Vec<u8>>),
    /// Delivery task running.
    Running(JoinHandle<()>),
}

impl MemoryTransport {
    /// Creates a connected pair of in-process endpoints.
    ///
    /// Both sides start disconnected; messages sent after `connect` are
    /// delivered to the peer's message callback by a per-endpoint delivery
    /// task.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        (
            Self::from_channels(right_tx, left_rx),
            Self::from_channels(left_tx, right_rx),
        )
    }

    fn from_channels(
        peer: mpsc::UnboundedSender<Vec<u8>>,
        receiver: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: RwLock::new(TransportConfig::direct()),
                state: Mutex::new(ConnectionState::Idle),
                callbacks: CallbackSlots::default(),
                stats: StatsRecorder::new(),
                peer,
                pump: AsyncMutex::new(PumpSlot::Pending(receiver)),
            }),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state == ConnectionState::Connected {
                return Ok(());
            }
            *state = ConnectionState::Connected;
        }

        let mut pump = self.inner.pump.lock().await;
        if let PumpSlot::Pending(receiver) = &mut *pump {
            let receiver = std::mem::replace(receiver, mpsc::unbounded_channel().1);
            let task = tokio::spawn(deliver(Arc::clone(&self.inner), receiver));
            *pump = PumpSlot::Running(task);
        }
        drop(pump);

        self.inner.stats.record_connection();
        self.inner.callbacks.emit_connection(true, "");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let was_connected = {
            let mut state = self.inner.state.lock();
            let was_connected = *state == ConnectionState::Connected;
            *state = ConnectionState::Idle;
            was_connected
        };
        if was_connected {
            self.inner
                .callbacks
                .emit_connection(false, "disconnect requested");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.inner.state.lock() == ConnectionState::Connected
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(ProtocolError::invalid_argument("data must not be empty"));
        }
        if !self.is_connected() {
            return Err(ProtocolError::network("transport not connected"));
        }
        self.inner
            .peer
            .send(data.to_vec())
            .map_err(|_| ProtocolError::network("peer endpoint dropped"))?;
        self.inner.stats.record_sent(data.len() as u64);
        Ok(())
    }

    async fn configure(&self, config: TransportConfig) -> Result<()> {
        config.validate()?;
        let active = *self.inner.state.lock() != ConnectionState::Idle;
        let mut current = self.inner.config.write();
        if active && !current.same_endpoint(&config) {
            return Err(ProtocolError::network(
                "disconnect before changing the endpoint",
            ));
        }
        *current = config;
        Ok(())
    }

    fn config(&self) -> TransportConfig {
        self.inner.config.read().clone()
    }

    fn set_message_callback(&self, callback: Option<MessageCallback>) {
        self.inner.callbacks.set_message(callback);
    }

    fn set_connection_callback(&self, callback: Option<ConnectionCallback>) {
        self.inner.callbacks.set_connection(callback);
    }

    fn set_error_callback(&self, callback: Option<ErrorCallback>) {
        self.inner.callbacks.set_error(callback);
    }

    fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    fn reset_stats(&self) {
        self.inner.stats.reset();
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Direct
    }

    fn endpoint(&self) -> String {
        self.inner.config.read().endpoint_url()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut pump) = self.pump.try_lock() {
            if let PumpSlot::Running(task) = &*pump {
                task.abort();
            }
            *pump = PumpSlot::Pending(mpsc::unbounded_channel().1);
        }
    }
}

/// Delivers inbound messages to the message callback while connected.
/// Messages arriving while disconnected are dropped, mirroring a closed wire.
async fn deliver(inner: Arc<Inner>, mut receiver: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(data) = receiver.recv().await {
        if *inner.state.lock() != ConnectionState::Connected {
            continue;
        }
        inner.stats.record_received(data.len() as u64);
        inner.callbacks.emit_message(&data);
    }
}
