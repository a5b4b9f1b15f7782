// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `logged` / `error` notifications emitted by the transport.
//!
//! Every asynchronous outcome is reported twice: once to the completion
//! callback of the call that caused it (if any) and once here. Provisioning
//! failures have no completion and are only visible on the bus.
//!
//! ```text
//!  provisioning task ──┐
//!                      ├──> broadcast ──> EventBus (any number of subscribers)
//!  log submissions ────┘
//! ```
//!
//! Emitting never blocks. Subscribers that fall too far behind skip the
//! oldest events.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::debug;

use crate::constants::MAX_EVENTS;
use crate::error::TransportError;
use crate::queue::QueueResponse;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A message was accepted by the queue service.
    Logged(QueueResponse),
    /// Provisioning or a submission failed.
    Error(TransportError),
}

/// Receiving side of the transport's events.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug)]
pub struct EventBus {
    pub rx: broadcast::Receiver<TransportEvent>,
}

impl EventBus {
    /// Waits for the next event. Returns `None` once the transport is dropped.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("QUEUE | Event subscriber lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

/// Sending side, cloned into every task the transport spawns.
#[derive(Debug, Clone)]
pub(crate) struct EventEmitter {
    tx: broadcast::Sender<TransportEvent>,
}

impl EventEmitter {
    pub(crate) fn channel() -> (EventEmitter, EventBus) {
        let (tx, rx) = broadcast::channel(MAX_EVENTS);
        (EventEmitter { tx }, EventBus { rx })
    }

    pub(crate) fn emit(&self, event: TransportEvent) {
        // An error only means nobody is subscribed.
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> EventBus {
        EventBus {
            rx: self.tx.subscribe(),
        }
    }
}
