mod private;
mod public;

pub use private::{LocalMessageEndpoint, PrivateLocalClient};
pub use public::PublicLocalClient;

use crate::worker::ConnectionWorker;
use common::{ComSatChannel, ShutdownHandle};

/// The closed set of local client strategies. Which variant serves a
/// connection is decided once, at construction time, from the deployment
/// mode.
pub enum LocalClient {
    Public(PublicLocalClient),
    Private(PrivateLocalClient),
}

impl LocalClient {
    /// Label used for worker thread names and log correlation.
    pub fn label(&self) -> &'static str {
        match self {
            LocalClient::Public(_) => "PublicLocalClient",
            LocalClient::Private(_) => "PrivateLocalClient",
        }
    }

    /// The shared transport channel this client wraps.
    pub fn channel(&self) -> &ComSatChannel {
        match self {
            LocalClient::Public(client) => client.channel(),
            LocalClient::Private(client) => client.channel(),
        }
    }

    /// Handle that stops this client's worker loop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        match self {
            LocalClient::Public(client) => client.shutdown_handle(),
            LocalClient::Private(client) => client.shutdown_handle(),
        }
    }
}

impl ConnectionWorker for LocalClient {
    fn connection_id(&self) -> u64 {
        match self {
            LocalClient::Public(client) => client.connection_id(),
            LocalClient::Private(client) => client.connection_id(),
        }
    }

    fn run(self) {
        match self {
            LocalClient::Public(client) => client.run(),
            LocalClient::Private(client) => client.run(),
        }
    }
}
