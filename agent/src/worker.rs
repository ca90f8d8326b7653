use std::io;
use std::thread::{self, JoinHandle};

/// One logical client connection bound to exactly one worker thread.
///
/// The trait bound is what guarantees a connection id is available when the
/// thread is named; there is no runtime capability check anywhere.
pub trait ConnectionWorker: Send + 'static {
    /// Stable identifier, assigned at creation and unique among live
    /// connections.
    fn connection_id(&self) -> u64;

    /// Drive the connection until it closes or is signalled to stop.
    fn run(self)
    where
        Self: Sized;
}

/// Produces named threads for connection workers. The name embeds the
/// connection id so log lines and thread dumps correlate with a connection.
pub struct WorkerThreadFactory {
    label: &'static str,
}

impl WorkerThreadFactory {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }

    /// The exact thread name a worker gets: `"<label> #<connection id>"`.
    pub fn thread_name<W: ConnectionWorker>(&self, worker: &W) -> String {
        format!("{} #{}", self.label, worker.connection_id())
    }

    /// A configured, not-yet-started builder for the worker's thread. The
    /// caller decides when the thread actually starts.
    pub fn builder<W: ConnectionWorker>(&self, worker: &W) -> thread::Builder {
        thread::Builder::new().name(self.thread_name(worker))
    }

    /// Spawn the worker on its own named thread.
    pub fn spawn<W: ConnectionWorker>(&self, worker: W) -> io::Result<JoinHandle<()>> {
        self.builder(&worker).spawn(move || worker.run())
    }
}
