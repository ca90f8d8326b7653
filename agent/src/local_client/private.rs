use crate::config::AgentConfig;
use crate::worker::ConnectionWorker;
use bytes::Bytes;
use common::{ComSatChannel, ShutdownHandle, ShutdownSignal, shutdown_pair};
use crossbeam::channel::{Receiver, Sender, bounded};
use crossbeam::select;
use tracing::{debug, info, warn};

/// Private-mode client: bridges the ComSat channel and a bounded local
/// message bus consumed by the in-process SDK surface.
///
/// Inbound frames are handed to the local queue as-is; local messages are
/// drained back into the channel. Frames above the configured size limit are
/// dropped, which is the guard against a peer flooding a single logical
/// message past what the local consumer will accept.
///
/// The client holds only its own ends of the bus. The local ends live in the
/// `LocalMessageEndpoint` returned from `new`, so a dropped consumer is
/// observable as a disconnect, and a full queue blocks in a `select!` that
/// still honors shutdown.
pub struct PrivateLocalClient {
    id: u64,
    channel: ComSatChannel,
    to_local: Sender<Bytes>,
    from_local: Receiver<Bytes>,
    max_frame_bytes: usize,
    shutdown_handle: ShutdownHandle,
    shutdown: ShutdownSignal,
}

/// Local-side handles of a private client's message bus. Clonable; all
/// clones drain the same queues. Once every clone is dropped the client
/// treats the consumer as gone and stops.
#[derive(Debug, Clone)]
pub struct LocalMessageEndpoint {
    incoming: Receiver<Bytes>,
    outgoing: Sender<Bytes>,
}

impl LocalMessageEndpoint {
    /// Next message that arrived over ComSat, blocking until one is there.
    pub fn recv(&self) -> Option<Bytes> {
        self.incoming.recv().ok()
    }

    /// Queue a local message for delivery over ComSat.
    pub fn send(&self, message: Bytes) -> bool {
        self.outgoing.send(message).is_ok()
    }
}

impl PrivateLocalClient {
    pub fn new(
        id: u64,
        channel: ComSatChannel,
        config: &AgentConfig,
    ) -> (Self, LocalMessageEndpoint) {
        let (to_local, local_incoming) = bounded(config.read_buffer_frames);
        let (local_outgoing, from_local) = bounded(config.write_buffer_frames);
        let (shutdown_handle, shutdown) = shutdown_pair();
        (
            Self {
                id,
                channel,
                to_local,
                from_local,
                max_frame_bytes: config.max_frame_bytes,
                shutdown_handle,
                shutdown,
            },
            LocalMessageEndpoint {
                incoming: local_incoming,
                outgoing: local_outgoing,
            },
        )
    }

    pub fn channel(&self) -> &ComSatChannel {
        &self.channel
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }
}

impl ConnectionWorker for PrivateLocalClient {
    fn connection_id(&self) -> u64 {
        self.id
    }

    /// Shuttle messages both directions until the channel closes, the local
    /// consumer goes away, or a shutdown is signalled. Both bus transfers
    /// select over the shutdown signal, so a full queue never makes the
    /// worker unstoppable.
    fn run(self) {
        'conn: loop {
            select! {
                recv(self.shutdown.receiver()) -> _ => {
                    info!("PrivateLocalClient #{} stopped by demand", self.id);
                    break 'conn;
                }
                recv(self.channel.incoming()) -> frame => {
                    let frame = match frame {
                        Ok(frame) => frame,
                        Err(_) => {
                            debug!("PrivateLocalClient #{} transport channel closed", self.id);
                            break 'conn;
                        }
                    };

                    if frame.len() > self.max_frame_bytes {
                        warn!(
                            "PrivateLocalClient #{} dropping oversize frame ({} bytes)",
                            self.id,
                            frame.len()
                        );
                        continue;
                    }

                    select! {
                        recv(self.shutdown.receiver()) -> _ => {
                            info!("PrivateLocalClient #{} stopped by demand", self.id);
                            break 'conn;
                        }
                        send(self.to_local, frame) -> sent => {
                            if sent.is_err() {
                                debug!("PrivateLocalClient #{} local consumer gone", self.id);
                                break 'conn;
                            }
                        }
                    }
                }
                recv(self.from_local) -> message => {
                    let message = match message {
                        Ok(message) => message,
                        Err(_) => {
                            debug!("PrivateLocalClient #{} local consumer gone", self.id);
                            break 'conn;
                        }
                    };

                    select! {
                        recv(self.shutdown.receiver()) -> _ => {
                            info!("PrivateLocalClient #{} stopped by demand", self.id);
                            break 'conn;
                        }
                        send(self.channel.outgoing(), message) -> sent => {
                            if sent.is_err() {
                                debug!("PrivateLocalClient #{} transport channel closed", self.id);
                                break 'conn;
                            }
                        }
                    }
                }
            }
        }
    }
}
