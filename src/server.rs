//! TCP listeners for the protocol services.
//!
//! Binds one listener per enabled service, accepts connections and runs
//! each connection's session on its own task. Sessions share nothing.

use crate::config::Config;
use crate::protocols::{self, ConnectionId, Protocol, SessionEnd};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Listen backlog for every service socket
const LISTEN_BACKLOG: i32 = 1024;

/// Server instance
pub struct Server {
    listeners: Vec<(Protocol, TcpListener)>,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Bind a listener for every service enabled in `config`.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let mut listeners = Vec::new();
        for (protocol, addr) in config.listeners() {
            let listener = bind_listener(&addr)?;
            info!(%protocol, address = %listener.local_addr()?, "Listening");
            listeners.push((protocol, listener));
        }

        Ok(Server {
            listeners,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Bound address of the first listener speaking `protocol`.
    #[cfg(test)]
    pub fn local_addr(&self, protocol: Protocol) -> Option<SocketAddr> {
        self.listeners
            .iter()
            .find(|(p, _)| *p == protocol)
            .and_then(|(_, listener)| listener.local_addr().ok())
    }

    /// Accept connections on every listener until Ctrl-C.
    pub async fn run(self) -> io::Result<()> {
        tokio::select! {
            result = self.serve() => result,
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Shutdown requested");
                Ok(())
            }
        }
    }

    /// Accept connections on every listener until all accept loops end.
    pub async fn serve(self) -> io::Result<()> {
        if self.listeners.is_empty() {
            warn!("No services enabled");
            return Ok(());
        }

        let mut accept_loops = JoinSet::new();
        for (protocol, listener) in self.listeners {
            let limit = Arc::clone(&self.connection_limit);
            accept_loops.spawn(accept_loop(protocol, listener, limit));
        }

        while let Some(result) = accept_loops.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Accept loop failed");
            }
        }
        Ok(())
    }
}

/// Accept connections for one service, spawning an independent session per
/// connection.
async fn accept_loop(protocol: Protocol, listener: TcpListener, limit: Arc<Semaphore>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                // Wait for a connection slot
                let permit = match Arc::clone(&limit).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };

                let id = ConnectionId::next();
                debug!(%protocol, conn = %id, %peer, "New connection");

                tokio::spawn(async move {
                    run_session(protocol, stream, id).await;
                    drop(permit);
                });
            }
            Err(e) => {
                error!(%protocol, error = %e, "Failed to accept connection");
            }
        }
    }
}

async fn run_session(protocol: Protocol, stream: TcpStream, id: ConnectionId) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(conn = %id, error = %e, "Failed to set TCP_NODELAY");
    }

    match protocols::handle_connection(protocol, stream, id).await {
        Ok(SessionEnd::Closed) => debug!(%protocol, conn = %id, "Connection closed"),
        Ok(SessionEnd::Aborted) => debug!(%protocol, conn = %id, "Connection aborted"),
        Err(e) => debug!(%protocol, conn = %id, error = %e, "Connection error"),
    }
}

/// Create a non-blocking TCP listener with SO_REUSEADDR.
fn bind_listener(addr: &str) -> io::Result<TcpListener> {
    let addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no socket address for '{addr}'"),
        )
    })?;

    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    TcpListener::from_std(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_config(max_connections: usize) -> Config {
        Config {
            echo: "127.0.0.1:0".to_string(),
            prime: "127.0.0.1:0".to_string(),
            means: "127.0.0.1:0".to_string(),
            max_connections,
            log_level: "info".to_string(),
        }
    }

    async fn start(max_connections: usize) -> (SocketAddr, SocketAddr, SocketAddr) {
        let server = Server::bind(&test_config(max_connections)).unwrap();
        let addrs = (
            server.local_addr(Protocol::Echo).unwrap(),
            server.local_addr(Protocol::Prime).unwrap(),
            server.local_addr(Protocol::Means).unwrap(),
        );
        tokio::spawn(server.serve());
        addrs
    }

    fn frame(tag: u8, first: i32, second: i32) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend_from_slice(&first.to_be_bytes());
        out.extend_from_slice(&second.to_be_bytes());
        out
    }

    async fn query(stream: &mut TcpStream, min_time: i32, max_time: i32) -> i32 {
        stream
            .write_all(&frame(b'Q', min_time, max_time))
            .await
            .unwrap();
        let mut response = [0u8; 4];
        stream.read_exact(&mut response).await.unwrap();
        i32::from_be_bytes(response)
    }

    #[tokio::test]
    async fn test_bind_reports_addresses() {
        let server = Server::bind(&test_config(4)).unwrap();
        assert!(server.local_addr(Protocol::Means).is_some());
        assert_ne!(
            server.local_addr(Protocol::Echo),
            server.local_addr(Protocol::Means)
        );
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_address() {
        let mut config = test_config(4);
        config.means = "not an address".to_string();
        assert!(Server::bind(&config).is_err());
    }

    #[tokio::test]
    async fn test_means_wire_scenario() {
        let (_, _, means) = start(16).await;
        let mut stream = TcpStream::connect(means).await.unwrap();

        stream
            .write_all(&[0x49, 0x00, 0x00, 0x00, 0x64, 0x00, 0x00, 0x00, 0x05])
            .await
            .unwrap();
        stream
            .write_all(&[0x51, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xc8])
            .await
            .unwrap();

        let mut response = [0u8; 4];
        stream.read_exact(&mut response).await.unwrap();
        assert_eq!(response, [0x00, 0x00, 0x00, 0x05]);
    }

    #[tokio::test]
    async fn test_means_connections_are_isolated() {
        let (_, _, means) = start(16).await;
        let mut a = TcpStream::connect(means).await.unwrap();
        let mut b = TcpStream::connect(means).await.unwrap();

        a.write_all(&frame(b'I', 10, 1000)).await.unwrap();
        b.write_all(&frame(b'I', 10, 2)).await.unwrap();

        assert_eq!(query(&mut a, 0, 100).await, 1000);
        assert_eq!(query(&mut b, 0, 100).await, 2);

        let mut c = TcpStream::connect(means).await.unwrap();
        assert_eq!(query(&mut c, i32::MIN, i32::MAX).await, 0);
    }

    #[tokio::test]
    async fn test_means_bad_frame_closes_connection() {
        let (_, _, means) = start(16).await;
        let mut stream = TcpStream::connect(means).await.unwrap();

        stream.write_all(&frame(b'I', 1, 10)).await.unwrap();
        stream.write_all(&frame(b'Z', 0, 0)).await.unwrap();

        let mut received = Vec::new();
        let result = stream.read_to_end(&mut received).await;
        // Either a clean EOF or a reset, but never response bytes.
        if result.is_ok() {
            assert!(received.is_empty());
        }
    }

    #[tokio::test]
    async fn test_echo_service() {
        let (echo, _, _) = start(16).await;
        let mut stream = TcpStream::connect(echo).await.unwrap();

        stream.write_all(b"hello, world").await.unwrap();
        stream.shutdown().await.unwrap();

        let mut received = Vec::new();
        stream.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"hello, world");
    }

    #[tokio::test]
    async fn test_prime_service() {
        let (_, prime, _) = start(16).await;
        let mut stream = TcpStream::connect(prime).await.unwrap();

        stream
            .write_all(b"{\"method\":\"isPrime\",\"number\":13}\n")
            .await
            .unwrap();
        stream.shutdown().await.unwrap();

        let mut received = Vec::new();
        stream.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"{\"method\":\"isPrime\",\"prime\":true}\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_large_prime_does_not_stall_other_sessions() {
        let (_, prime, means) = start(16).await;

        let mut prime_stream = TcpStream::connect(prime).await.unwrap();
        prime_stream
            .write_all(b"{\"method\":\"isPrime\",\"number\":18446744073709551557}\n")
            .await
            .unwrap();

        let mut means_stream = TcpStream::connect(means).await.unwrap();
        let answered = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            query(&mut means_stream, 0, 1),
        )
        .await;
        assert_eq!(answered.ok(), Some(0));

        let mut reply = vec![0u8; b"{\"method\":\"isPrime\",\"prime\":true}\n".len()];
        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            prime_stream.read_exact(&mut reply),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(reply, b"{\"method\":\"isPrime\",\"prime\":true}\n");
    }

    #[tokio::test]
    async fn test_connection_limit_defers_accept() {
        let (_, _, means) = start(1).await;

        let mut first = TcpStream::connect(means).await.unwrap();
        first.write_all(&frame(b'I', 1, 7)).await.unwrap();
        assert_eq!(query(&mut first, 1, 1).await, 7);

        // Accepted but not served until the first session releases its slot.
        let mut second = TcpStream::connect(means).await.unwrap();
        second.write_all(&frame(b'I', 1, 9)).await.unwrap();
        drop(first);

        assert_eq!(query(&mut second, 1, 1).await, 9);
    }
}
