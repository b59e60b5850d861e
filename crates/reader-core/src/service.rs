//! Background delivery thread.
//!
//! The engine must be driven from exactly one thread: the one that receives
//! event stream buffers. [`ReaderService::spawn`] puts the engine on a named
//! thread and hands callers a [`ReaderHandle`] whose methods are plain
//! synchronous calls, each relayed over a channel and answered on a
//! one-shot reply channel. The engine itself is never shared.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, warn};

use gen2_events::EventPacket;

use crate::config::SessionParams;
use crate::device::DeviceOps;
use crate::error::ReaderError;
use crate::inventory::{ContinuousInventoryEngine, ContinuousInventoryState};

enum ReaderCommand {
    StartSession {
        params: Box<SessionParams>,
        reply: Sender<Result<(), ReaderError>>,
    },
    StopTransmitting {
        reply: Sender<Result<(), ReaderError>>,
    },
    Snapshot {
        reply: Sender<ContinuousInventoryState>,
    },
    InsertPacket {
        packet: Box<EventPacket>,
        reply: Sender<Result<(), ReaderError>>,
    },
    EventBytes(Vec<u8>),
    Shutdown,
}

/// Caller-side handle to the delivery thread. Dropping it shuts the thread
/// down.
pub struct ReaderHandle {
    commands: Sender<ReaderCommand>,
    join: Option<JoinHandle<()>>,
}

/// Spawns and owns the delivery thread.
pub struct ReaderService;

impl ReaderService {
    /// Move `engine` onto a delivery thread and return the handle.
    pub fn spawn<D: DeviceOps + Send + 'static>(
        engine: ContinuousInventoryEngine<D>,
    ) -> ReaderHandle {
        let (tx, rx) = unbounded();
        let join = thread::Builder::new()
            .name("reader-delivery".into())
            .spawn(move || run_delivery_loop(engine, rx))
            .unwrap_or_else(|err| panic!("failed to spawn delivery thread: {err}"));
        ReaderHandle {
            commands: tx,
            join: Some(join),
        }
    }
}

fn run_delivery_loop<D: DeviceOps>(
    mut engine: ContinuousInventoryEngine<D>,
    rx: Receiver<ReaderCommand>,
) {
    debug!("delivery thread started");
    while let Ok(command) = rx.recv() {
        match command {
            ReaderCommand::StartSession { params, reply } => {
                let _ = reply.send(engine.continuous_inventory(*params));
            }
            ReaderCommand::StopTransmitting { reply } => {
                let _ = reply.send(engine.stop_transmitting());
            }
            ReaderCommand::Snapshot { reply } => {
                let _ = reply.send(engine.get_continuous_inventory_state());
            }
            ReaderCommand::InsertPacket { packet, reply } => {
                let _ = reply.send(engine.insert_packet(*packet));
            }
            ReaderCommand::EventBytes(bytes) => {
                engine.handle_event_bytes(&bytes);
            }
            ReaderCommand::Shutdown => break,
        }
    }
    debug!("delivery thread exiting");
}

impl ReaderHandle {
    fn call<T>(&self, command: ReaderCommand, rx: Receiver<T>) -> Result<T, ReaderError> {
        self.commands
            .send(command)
            .map_err(|_| ReaderError::ServiceStopped)?;
        rx.recv().map_err(|_| ReaderError::ServiceStopped)
    }

    /// Start a continuous inventory session.
    pub fn start_session(&self, params: SessionParams) -> Result<(), ReaderError> {
        let (reply, rx) = bounded(1);
        let command = ReaderCommand::StartSession {
            params: Box::new(params),
            reply,
        };
        self.call(command, rx)?
    }

    /// Request a stop and drop the carrier.
    pub fn stop_transmitting(&self) -> Result<(), ReaderError> {
        let (reply, rx) = bounded(1);
        self.call(ReaderCommand::StopTransmitting { reply }, rx)?
    }

    /// A snapshot of the session state.
    pub fn snapshot(&self) -> Result<ContinuousInventoryState, ReaderError> {
        let (reply, rx) = bounded(1);
        self.call(ReaderCommand::Snapshot { reply }, rx)
    }

    /// Publish a host-built packet onto the event queue.
    pub fn insert_packet(&self, packet: EventPacket) -> Result<(), ReaderError> {
        let (reply, rx) = bounded(1);
        let command = ReaderCommand::InsertPacket {
            packet: Box::new(packet),
            reply,
        };
        self.call(command, rx)?
    }

    /// Feed raw event stream bytes from the transport. Processed in order,
    /// asynchronously.
    pub fn feed_event_bytes(&self, bytes: Vec<u8>) -> Result<(), ReaderError> {
        self.commands
            .send(ReaderCommand::EventBytes(bytes))
            .map_err(|_| ReaderError::ServiceStopped)
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(ReaderCommand::Shutdown);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("delivery thread panicked");
            }
        }
    }
}
