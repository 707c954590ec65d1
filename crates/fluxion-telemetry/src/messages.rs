// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use ringbuffer::{AllocRingBuffer, RingBuffer};
use serde::Serialize;

pub const DEFAULT_MESSAGE_BUFFER_CAPACITY: usize = 100;

/// Raw message as received from the bus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            topic: topic.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            received_at: Utc::now(),
        }
    }
}

/// Fixed-capacity ring of the most recent bus messages, for inspection only.
/// The oldest message is evicted first.
#[derive(Debug)]
pub struct MessageBuffer {
    ring: Mutex<AllocRingBuffer<BusMessage>>,
}

impl MessageBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(AllocRingBuffer::new(capacity.max(1))),
        }
    }

    pub fn push(&self, message: BusMessage) {
        self.ring.lock().push(message);
    }

    /// Contents ordered oldest-first (most recent last)
    pub fn snapshot(&self) -> Vec<BusMessage> {
        self.ring.lock().to_vec()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_BUFFER_CAPACITY)
    }
}
