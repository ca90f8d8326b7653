use crate::error::{CommonError, Result};
use bytes::Bytes;
use crossbeam::channel::{Receiver, Sender, bounded};

/// One endpoint of a bidirectional ComSat transport link.
///
/// The channel carries opaque byte frames; what a frame means is the transport
/// layer's business. Endpoints are cheap to clone and every clone refers to
/// the same underlying link, so a handle can be shared between the code that
/// created the link and the local client that ends up serving it. Neither
/// side opens or closes the underlying transport through this handle; a
/// channel is "closed" only once the opposite endpoint is gone.
#[derive(Debug, Clone)]
pub struct ComSatChannel {
    incoming: Receiver<Bytes>,
    outgoing: Sender<Bytes>,
}

impl ComSatChannel {
    /// Create a cross-wired pair of endpoints with the given per-direction
    /// frame capacity. Frames sent on one endpoint arrive on the other.
    pub fn pair(capacity: usize) -> (ComSatChannel, ComSatChannel) {
        let (left_tx, left_rx) = bounded(capacity);
        let (right_tx, right_rx) = bounded(capacity);
        (
            ComSatChannel {
                incoming: left_rx,
                outgoing: right_tx,
            },
            ComSatChannel {
                incoming: right_rx,
                outgoing: left_tx,
            },
        )
    }

    /// Send a frame toward the opposite endpoint, blocking while the link is
    /// at capacity.
    pub fn send(&self, frame: Bytes) -> Result<()> {
        self.outgoing
            .send(frame)
            .map_err(|_| CommonError::ChannelClosed)
    }

    /// Receive the next frame, blocking until one arrives.
    pub fn recv(&self) -> Result<Bytes> {
        self.incoming.recv().map_err(|_| CommonError::ChannelClosed)
    }

    /// The raw receiver side, for use in `select!` loops.
    pub fn incoming(&self) -> &Receiver<Bytes> {
        &self.incoming
    }

    /// The raw sender side, for use in `select!` send arms.
    pub fn outgoing(&self) -> &Sender<Bytes> {
        &self.outgoing
    }

    /// Whether two handles refer to the same endpoint of the same link.
    pub fn same_endpoint(&self, other: &ComSatChannel) -> bool {
        self.incoming.same_channel(&other.incoming) && self.outgoing.same_channel(&other.outgoing)
    }
}
