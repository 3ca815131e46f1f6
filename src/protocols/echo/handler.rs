//! Echo protocol handler.

use crate::protocols::{ConnectionId, SessionEnd};
use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Read buffer size
const BUFFER_SIZE: usize = 16 * 1024;

/// Handle an echo protocol connection.
pub async fn handle_connection(mut stream: TcpStream, id: ConnectionId) -> io::Result<SessionEnd> {
    let result = echo(&mut stream, id).await;
    if let Ok(total) = result {
        debug!(conn = %id, bytes = total, "Session finished");
    }
    result.map(|_| SessionEnd::Closed)
}

/// Copy everything read from `stream` back to it until end-of-stream.
///
/// Returns the number of bytes echoed.
pub async fn echo<S>(stream: &mut S, id: ConnectionId) -> io::Result<u64>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
    let mut total = 0u64;

    loop {
        let n = stream.read_buf(&mut buffer).await?;
        if n == 0 {
            stream.shutdown().await?;
            return Ok(total);
        }

        trace!(conn = %id, len = n, "Echoing chunk");
        stream.write_all(&buffer).await?;
        stream.flush().await?;
        total += n as u64;
        buffer.clear();
    }
}
