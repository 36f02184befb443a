//! Consumer → engine control queue
//!
//! Requests travel over a wait-free SPSC ring and are applied by the engine
//! at the next block boundary.

use rtrb::{Consumer, Producer, RingBuffer};

use r128_core::{MeterError, MeterResult};

/// Request applied at a block boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Clear all measurement state and restart the epoch
    Reset,
    /// Clear sample / true peak maxima only
    ResetPeaks,
}

/// Create a control queue holding up to `capacity` pending requests
pub fn control_channel(capacity: usize) -> (ControlSender, ControlReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    (ControlSender { producer }, ControlReceiver { consumer })
}

/// Consumer-side sender
pub struct ControlSender {
    producer: Producer<ControlRequest>,
}

impl ControlSender {
    /// Queue a request (non-blocking)
    pub fn send(&mut self, request: ControlRequest) -> MeterResult<()> {
        self.producer
            .push(request)
            .map_err(|_| MeterError::ControlQueueFull)
    }

    /// Free slots in the queue
    pub fn available(&self) -> usize {
        self.producer.slots()
    }

    /// Whether the engine side has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Engine-side receiver
pub struct ControlReceiver {
    consumer: Consumer<ControlRequest>,
}

impl ControlReceiver {
    /// Pop one pending request (non-blocking)
    #[inline]
    pub fn pop(&mut self) -> Option<ControlRequest> {
        self.consumer.pop().ok()
    }

    /// Number of requests waiting
    #[inline]
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }
}
