use crate::config::AgentConfig;
use crate::worker::ConnectionWorker;
use bytes::Bytes;
use common::{ComSatChannel, ShutdownHandle, ShutdownSignal, shutdown_pair};
use crossbeam::select;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::thread;
use tracing::{debug, info, warn};

/// Public-mode client: relays opaque byte frames between the ComSat channel
/// and a raw TCP connection to the local container.
///
/// The container connection is opened lazily, on the first inbound frame.
/// When the connect fails the frame is dropped with a warning and the next
/// frame triggers a fresh attempt, matching the reconnect-on-demand behavior
/// the container side expects.
pub struct PublicLocalClient {
    id: u64,
    channel: ComSatChannel,
    container_addr: String,
    shutdown_handle: ShutdownHandle,
    shutdown: ShutdownSignal,
}

impl PublicLocalClient {
    pub fn new(id: u64, channel: ComSatChannel, config: &AgentConfig) -> Self {
        let (shutdown_handle, shutdown) = shutdown_pair();
        Self {
            id,
            channel,
            container_addr: config.container_addr.clone(),
            shutdown_handle,
            shutdown,
        }
    }

    pub fn channel(&self) -> &ComSatChannel {
        &self.channel
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }

    fn connect_container(&self) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect(&self.container_addr)?;
        let reader = stream.try_clone()?;
        let channel = self.channel.clone();
        let id = self.id;
        thread::Builder::new()
            .name(format!("container-reader #{}", id))
            .spawn(move || pump_container_to_comsat(id, reader, channel))?;
        info!(
            "PublicLocalClient #{} connected to container at {}",
            self.id, self.container_addr
        );
        Ok(stream)
    }
}

impl ConnectionWorker for PublicLocalClient {
    fn connection_id(&self) -> u64 {
        self.id
    }

    /// Drain the ComSat channel into the container until the channel closes
    /// or a shutdown is signalled.
    fn run(self) {
        let mut container: Option<TcpStream> = None;

        loop {
            select! {
                recv(self.shutdown.receiver()) -> _ => {
                    info!("PublicLocalClient #{} stopped by demand", self.id);
                    break;
                }
                recv(self.channel.incoming()) -> frame => {
                    let frame = match frame {
                        Ok(frame) => frame,
                        Err(_) => {
                            debug!("PublicLocalClient #{} transport channel closed", self.id);
                            break;
                        }
                    };

                    if container.is_none() {
                        match self.connect_container() {
                            Ok(stream) => container = Some(stream),
                            Err(e) => {
                                warn!(
                                    "PublicLocalClient #{} error when connecting to container: {}",
                                    self.id, e
                                );
                                continue;
                            }
                        }
                    }

                    if let Some(stream) = container.as_mut() {
                        if let Err(e) = stream.write_all(&frame) {
                            warn!(
                                "PublicLocalClient #{} container write failed: {}",
                                self.id, e
                            );
                            // Unblocks the reader thread holding a clone of
                            // this stream before a reconnect spawns a new one.
                            let _ = stream.shutdown(Shutdown::Both);
                            container = None;
                        }
                    }
                }
            }
        }

        // Unblocks the container reader thread, if any.
        if let Some(stream) = container {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Reverse direction: everything the container writes goes back over the
/// ComSat channel as opaque frames.
fn pump_container_to_comsat(id: u64, mut reader: TcpStream, channel: ComSatChannel) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                debug!("PublicLocalClient #{} container closed the connection", id);
                break;
            }
            Ok(n) => {
                if channel.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("PublicLocalClient #{} container read error: {}", id, e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::worker::WorkerThreadFactory;
    use std::net::TcpListener;
    use std::time::Duration;

    fn test_config(container_addr: String) -> AgentConfig {
        AgentConfig {
            mode: Mode::Public,
            comsat_listen_addr: "127.0.0.1:0".to_string(),
            container_addr,
            read_buffer_frames: 16,
            write_buffer_frames: 16,
            max_frame_bytes: 4096,
            log_level: "info".to_string(),
            log_dir: None,
            log_file: "agent.log".to_string(),
        }
    }

    #[test]
    fn relays_frames_to_container_and_back() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let container_addr = listener.local_addr().unwrap().to_string();

        let (agent_side, transport_side) = ComSatChannel::pair(16);
        let config = test_config(container_addr);
        let client = PublicLocalClient::new(1, agent_side, &config);
        let stop = client.shutdown_handle();

        let factory = WorkerThreadFactory::new("PublicLocalClient");
        let worker = factory.spawn(client).unwrap();

        // First frame triggers the lazy container connect.
        transport_side
            .send(Bytes::from_static(b"to-container"))
            .unwrap();
        let (mut container, _) = listener.accept().unwrap();
        container
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let mut buf = [0u8; 32];
        let n = container.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"to-container");

        // Container replies; the bytes come back as a frame.
        container.write_all(b"from-container").unwrap();
        let frame = transport_side.recv().unwrap();
        assert_eq!(frame, Bytes::from_static(b"from-container"));

        stop.signal();
        worker.join().unwrap();
    }

    #[test]
    fn unreachable_container_drops_the_frame_and_keeps_running() {
        // Bind and drop to get an address nothing listens on.
        let dead_addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let (agent_side, transport_side) = ComSatChannel::pair(16);
        let config = test_config(dead_addr);
        let client = PublicLocalClient::new(2, agent_side, &config);
        let stop = client.shutdown_handle();

        let factory = WorkerThreadFactory::new("PublicLocalClient");
        let worker = factory.spawn(client).unwrap();

        transport_side.send(Bytes::from_static(b"lost")).unwrap();

        // The worker must survive the failed connect and still honor shutdown.
        stop.signal();
        worker.join().unwrap();
    }

    #[test]
    fn container_write_failure_tears_down_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let container_addr = listener.local_addr().unwrap().to_string();

        let (agent_side, transport_side) = ComSatChannel::pair(16);
        let config = test_config(container_addr);
        let client = PublicLocalClient::new(4, agent_side, &config);
        let stop = client.shutdown_handle();

        let factory = WorkerThreadFactory::new("PublicLocalClient");
        let worker = factory.spawn(client).unwrap();

        transport_side.send(Bytes::from_static(b"first")).unwrap();
        let (mut first, _) = listener.accept().unwrap();
        first
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut buf = [0u8; 32];
        let n = first.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"first");

        // Container goes away; subsequent writes fail and must trigger a
        // fresh connect instead of wedging on the dead stream.
        drop(first);
        listener.set_nonblocking(true).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let mut second = None;
        while std::time::Instant::now() < deadline {
            transport_side.send(Bytes::from_static(b"again")).unwrap();
            match listener.accept() {
                Ok((stream, _)) => {
                    second = Some(stream);
                    break;
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => panic!("accept failed: {}", e),
            }
        }
        let mut second = second.expect("client did not reconnect after the write failure");
        second.set_nonblocking(false).unwrap();
        second
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        // More than one queued frame may arrive; the first five bytes are
        // enough to prove the relay moved to the new connection.
        second.read_exact(&mut buf[..5]).unwrap();
        assert_eq!(&buf[..5], b"again");

        stop.signal();
        worker.join().unwrap();
    }

    #[test]
    fn stops_when_transport_channel_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let container_addr = listener.local_addr().unwrap().to_string();

        let (agent_side, transport_side) = ComSatChannel::pair(16);
        let config = test_config(container_addr);
        let client = PublicLocalClient::new(3, agent_side, &config);

        let factory = WorkerThreadFactory::new("PublicLocalClient");
        let worker = factory.spawn(client).unwrap();

        drop(transport_side);
        worker.join().unwrap();
    }
}
