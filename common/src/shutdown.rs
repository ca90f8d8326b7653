use crossbeam::channel::{Receiver, Sender, bounded};

/// Create a linked handle/signal pair for stopping one connection worker.
///
/// The handle lives with whoever manages the worker, the signal with the
/// worker itself. Signalling is idempotent and never blocks.
pub fn shutdown_pair() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = bounded(1);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

/// Sender side of a shutdown pair.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Sender<()>,
}

impl ShutdownHandle {
    /// Ask the worker to stop. Repeated signals are harmless.
    pub fn signal(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Receiver side of a shutdown pair, selected on by worker loops.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

impl ShutdownSignal {
    /// The raw receiver side, for use in `select!` loops. A receive on it
    /// (or a disconnect, once every handle is dropped) means stop.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }

    /// Non-blocking check used outside of `select!` loops.
    pub fn is_signalled(&self) -> bool {
        !self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_reaches_the_worker_side() {
        let (handle, signal) = shutdown_pair();
        assert!(!signal.is_signalled());

        handle.signal();
        assert!(signal.is_signalled());
        assert!(signal.receiver().recv().is_ok());
    }

    #[test]
    fn repeated_signals_do_not_block() {
        let (handle, signal) = shutdown_pair();
        handle.signal();
        handle.signal();
        handle.signal();
        assert!(signal.is_signalled());
    }
}
