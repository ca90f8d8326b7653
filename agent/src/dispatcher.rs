use crate::config::{AgentConfig, Mode};
use crate::error::Result;
use crate::local_client::{LocalClient, LocalMessageEndpoint, PrivateLocalClient, PublicLocalClient};
use crate::worker::{ConnectionWorker, WorkerThreadFactory};
use common::{ComSatChannel, ShutdownHandle};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, info};

/// Builds the right local client for each ComSat channel and tracks the
/// connections it has dispatched.
///
/// Connection ids come from a monotonically increasing counter, so an id is
/// never reused for the life of the process.
pub struct ClientDispatcher {
    config: Arc<AgentConfig>,
    next_id: AtomicU64,
    active: Arc<DashMap<u64, ShutdownHandle>>,
    local_endpoints: Arc<DashMap<u64, LocalMessageEndpoint>>,
}

impl ClientDispatcher {
    pub fn new(config: Arc<AgentConfig>) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(0),
            active: Arc::new(DashMap::new()),
            local_endpoints: Arc::new(DashMap::new()),
        }
    }

    /// Construct the client variant selected by the configured mode. Only
    /// mode `public` yields a public client; every other configuration value
    /// has already collapsed to `Mode::Private` at parse time.
    pub fn build(&self, channel: ComSatChannel) -> LocalClient {
        self.build_with_endpoint(channel).0
    }

    fn build_with_endpoint(
        &self,
        channel: ComSatChannel,
    ) -> (LocalClient, Option<LocalMessageEndpoint>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        match self.config.mode {
            Mode::Public => (
                LocalClient::Public(PublicLocalClient::new(id, channel, &self.config)),
                None,
            ),
            Mode::Private => {
                let (client, endpoint) = PrivateLocalClient::new(id, channel, &self.config);
                (LocalClient::Private(client), Some(endpoint))
            }
        }
    }

    /// Build a client for the channel, register it, and start it on its own
    /// named worker thread.
    pub fn dispatch(&self, channel: ComSatChannel) -> Result<JoinHandle<()>> {
        let (client, endpoint) = self.build_with_endpoint(channel);
        let id = client.connection_id();
        let label = client.label();

        self.active.insert(id, client.shutdown_handle());
        if let Some(endpoint) = endpoint {
            self.local_endpoints.insert(id, endpoint);
        }
        let worker = DispatchedWorker {
            client,
            _guard: ActiveGuard {
                id,
                registry: self.active.clone(),
                endpoints: self.local_endpoints.clone(),
            },
        };

        info!("Dispatching connection #{} to {}", id, label);
        let handle = WorkerThreadFactory::new(label).spawn(worker)?;
        Ok(handle)
    }

    /// Number of connections with a live worker thread.
    pub fn active_connections(&self) -> usize {
        self.active.len()
    }

    /// Local-side bus handles of a dispatched private connection, for the
    /// in-process consumer of its messages. `None` for public connections
    /// and for ids that are no longer live.
    pub fn local_endpoint(&self, id: u64) -> Option<LocalMessageEndpoint> {
        self.local_endpoints.get(&id).map(|entry| entry.value().clone())
    }

    /// Signal every live worker to stop. Workers deregister themselves as
    /// they finish.
    pub fn shutdown_all(&self) {
        for entry in self.active.iter() {
            entry.value().signal();
        }
    }
}

/// Removes the registry entries once the worker is done, whichever way its
/// run loop ended.
struct ActiveGuard {
    id: u64,
    registry: Arc<DashMap<u64, ShutdownHandle>>,
    endpoints: Arc<DashMap<u64, LocalMessageEndpoint>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
        self.endpoints.remove(&self.id);
        debug!("Connection #{} deregistered", self.id);
    }
}

struct DispatchedWorker {
    client: LocalClient,
    _guard: ActiveGuard,
}

impl ConnectionWorker for DispatchedWorker {
    fn connection_id(&self) -> u64 {
        self.client.connection_id()
    }

    fn run(self) {
        self.client.run();
        // _guard drops here and deregisters the connection.
    }
}
