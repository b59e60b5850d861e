//! Event stream queue.
//!
//! A bounded single-producer/single-consumer queue carrying decoded
//! [`EventPacket`]s from the delivery context to the caller. The producer
//! side never blocks: a full queue is reported to the delivery loop, which
//! treats it as the fatal event-FIFO-overflow condition rather than
//! stalling packet delivery.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use thiserror::Error;

use gen2_events::EventPacket;

/// The queue was at capacity when a packet was pushed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("event queue full")]
pub struct QueueFull;

/// Producer half, held by the delivery context.
#[derive(Debug, Clone)]
pub struct PacketSender {
    tx: Sender<EventPacket>,
}

impl PacketSender {
    /// Append a packet. Never blocks.
    pub fn push_back(&self, packet: EventPacket) -> Result<(), QueueFull> {
        self.tx.try_send(packet).map_err(|_| QueueFull)
    }
}

/// Consumer half, held by the caller context.
///
/// The front packet can be examined in place with [`PacketReceiver::peek`]
/// and consumed with [`PacketReceiver::remove`], so callers can parse a
/// packet before committing to dropping it.
#[derive(Debug)]
pub struct PacketReceiver {
    rx: Receiver<EventPacket>,
    front: Option<EventPacket>,
}

impl PacketReceiver {
    /// The next packet, without consuming it. `None` when the queue is
    /// empty and the producer has nothing pending.
    pub fn peek(&mut self) -> Option<&EventPacket> {
        if self.front.is_none() {
            match self.rx.try_recv() {
                Ok(packet) => self.front = Some(packet),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }
        }
        self.front.as_ref()
    }

    /// Drop the front packet. No-op when the queue is empty.
    pub fn remove(&mut self) {
        if self.front.is_none() {
            let _ = self.rx.try_recv();
        } else {
            self.front = None;
        }
    }

    /// Consume and return the front packet.
    pub fn pop(&mut self) -> Option<EventPacket> {
        if self.front.is_none() {
            self.peek();
        }
        self.front.take()
    }

    /// Whether a packet is ready.
    pub fn packets_available(&mut self) -> bool {
        self.peek().is_some()
    }

    /// Block until a packet is available or the timeout elapses. Returns
    /// whether a packet is ready.
    pub fn wait_with_timeout(&mut self, timeout: Duration) -> bool {
        if self.front.is_some() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(packet) => {
                self.front = Some(packet);
                true
            }
            Err(_) => false,
        }
    }
}

/// Create a queue holding at most `capacity` packets.
pub fn event_queue(capacity: usize) -> (PacketSender, PacketReceiver) {
    let (tx, rx) = bounded(capacity);
    (PacketSender { tx }, PacketReceiver { rx, front: None })
}
