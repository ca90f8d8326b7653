use crate::config::AgentConfig;
use crate::dispatcher::ClientDispatcher;
use crate::error::Result;
use bytes::Bytes;
use common::ComSatChannel;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

/// Accepts transport-layer connections and adapts each socket into a
/// `ComSatChannel` pair, handing the agent side to the dispatcher.
///
/// This is the boundary of the dispatch core: bytes are moved verbatim
/// between socket and channel, with no knowledge of what they mean. The
/// channel endpoints it creates are the ones local clients later wrap.
pub struct ComSatIntake {
    listener: TcpListener,
    config: Arc<AgentConfig>,
    dispatcher: Arc<ClientDispatcher>,
}

impl ComSatIntake {
    pub fn bind(config: Arc<AgentConfig>, dispatcher: Arc<ClientDispatcher>) -> Result<Self> {
        let listener = TcpListener::bind(&config.comsat_listen_addr)?;
        info!("ComSat intake listening on {}", config.comsat_listen_addr);
        Ok(Self {
            listener,
            config,
            dispatcher,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the listener fails fatally.
    pub fn run(self) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok((socket, addr)) => {
                    debug!("Accepted transport connection from {}", addr);
                    let (agent_side, transport_side) =
                        ComSatChannel::pair(self.config.read_buffer_frames);
                    if let Err(e) = spawn_socket_pumps(socket, transport_side) {
                        error!("Failed to start socket pumps for {}: {}", addr, e);
                        continue;
                    }
                    if let Err(e) = self.dispatcher.dispatch(agent_side) {
                        error!("Failed to dispatch connection from {}: {}", addr, e);
                    }
                }
                Err(e) => {
                    error!("Failed to accept transport connection: {}", e);
                }
            }
        }
    }
}

/// Two threads per socket: one feeding socket bytes into the channel as
/// opaque frames, one draining the channel back into the socket. Either side
/// failing tears the socket down, which in turn closes the channel.
fn spawn_socket_pumps(socket: TcpStream, channel: ComSatChannel) -> std::io::Result<()> {
    let reader_socket = socket.try_clone()?;
    let reader_channel = channel.clone();

    thread::Builder::new()
        .name("comsat-intake-read".to_string())
        .spawn(move || {
            let mut socket = reader_socket;
            let mut buf = [0u8; 8192];
            loop {
                match socket.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if reader_channel.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("Transport socket read error: {}", e);
                        break;
                    }
                }
            }
            let _ = socket.shutdown(Shutdown::Both);
        })?;

    thread::Builder::new()
        .name("comsat-intake-write".to_string())
        .spawn(move || {
            let mut socket = socket;
            while let Ok(frame) = channel.recv() {
                if let Err(e) = socket.write_all(&frame) {
                    debug!("Transport socket write error: {}", e);
                    break;
                }
            }
            let _ = socket.shutdown(Shutdown::Both);
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use std::time::{Duration, Instant};

    fn test_config(mode: Mode, container_addr: String) -> Arc<AgentConfig> {
        Arc::new(AgentConfig {
            mode,
            comsat_listen_addr: "127.0.0.1:0".to_string(),
            container_addr,
            read_buffer_frames: 16,
            write_buffer_frames: 16,
            max_frame_bytes: 4096,
            log_level: "info".to_string(),
            log_dir: None,
            log_file: "agent.log".to_string(),
        })
    }

    fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn accepted_sockets_are_dispatched_to_a_worker() {
        let config = test_config(Mode::Private, "127.0.0.1:1".to_string());
        let dispatcher = Arc::new(ClientDispatcher::new(config.clone()));
        let intake = ComSatIntake::bind(config, dispatcher.clone()).unwrap();
        let addr = intake.local_addr().unwrap();
        thread::spawn(move || {
            let _ = intake.run();
        });

        let _socket = TcpStream::connect(addr).unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            dispatcher.active_connections() == 1
        }));
    }

    #[test]
    fn public_mode_end_to_end_echo_through_the_container() {
        // Echo server standing in for the local container.
        let container = TcpListener::bind("127.0.0.1:0").unwrap();
        let container_addr = container.local_addr().unwrap().to_string();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = container.accept() {
                let mut buf = [0u8; 8192];
                while let Ok(n) = stream.read(&mut buf) {
                    if n == 0 || stream.write_all(&buf[..n]).is_err() {
                        break;
                    }
                }
            }
        });

        let config = test_config(Mode::Public, container_addr);
        let dispatcher = Arc::new(ClientDispatcher::new(config.clone()));
        let intake = ComSatIntake::bind(config, dispatcher).unwrap();
        let addr = intake.local_addr().unwrap();
        thread::spawn(move || {
            let _ = intake.run();
        });

        let mut socket = TcpStream::connect(addr).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        socket.write_all(b"ping-through-agent").unwrap();

        let mut buf = [0u8; 64];
        let mut received = Vec::new();
        while received.len() < b"ping-through-agent".len() {
            let n = socket.read(&mut buf).unwrap();
            assert!(n > 0, "socket closed before the echo came back");
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(&received, b"ping-through-agent");
    }
}
