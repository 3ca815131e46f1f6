//! Protocol implementations.
//!
//! Each service listens on its own port and owns nothing beyond the
//! connection it is serving.
//!
//! - `echo`: bytes in, same bytes out
//! - `prime`: newline-delimited JSON primality checks
//! - `means`: fixed-width binary price inserts and range-average queries

pub mod echo;
pub mod means;
pub mod prime;

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;

/// Service spoken on a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Echo,
    Prime,
    Means,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Echo => write!(f, "echo"),
            Protocol::Prime => write!(f, "prime"),
            Protocol::Means => write!(f, "means"),
        }
    }
}

/// Opaque per-connection identifier, only used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ConnectionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// End-of-stream or peer disconnect.
    Closed,
    /// Protocol violation; the connection was dropped without a reply.
    Aborted,
}

/// Run the session for `protocol` on an accepted connection to completion.
pub async fn handle_connection(
    protocol: Protocol,
    stream: TcpStream,
    id: ConnectionId,
) -> io::Result<SessionEnd> {
    let result = match protocol {
        Protocol::Echo => echo::handle_connection(stream, id).await,
        Protocol::Prime => prime::handle_connection(stream, id).await,
        Protocol::Means => means::handle_connection(stream, id).await,
    };

    match result {
        Err(e) if is_disconnect(&e) => Ok(SessionEnd::Closed),
        other => other,
    }
}

/// Transport errors that only mean the peer went away.
pub(crate) fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_disconnect_kinds() {
        assert!(is_disconnect(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(is_disconnect(&io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(is_disconnect(&io::Error::from(io::ErrorKind::NotConnected)));
        assert!(!is_disconnect(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }
}
