//! Prime protocol handler.

use super::parser::{encode_response, is_prime, parse_request};
use crate::protocols::{ConnectionId, SessionEnd};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

const INITIAL_LINE_CAPACITY: usize = 1024;

/// Handle a prime protocol connection.
pub async fn handle_connection(mut stream: TcpStream, id: ConnectionId) -> io::Result<SessionEnd> {
    let result = serve(&mut stream, id).await;
    debug!(conn = %id, outcome = ?result, "Session finished");
    result
}

/// Answer request lines from `stream` until end-of-stream or a malformed
/// request.
pub async fn serve<S>(stream: &mut S, id: ConnectionId) -> io::Result<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    let mut line = Vec::with_capacity(INITIAL_LINE_CAPACITY);

    loop {
        line.clear();

        let n = stream.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Ok(SessionEnd::Closed);
        }
        if line.pop() != Some(b'\n') {
            trace!(conn = %id, dropped = n, "Discarding unterminated line");
            return Ok(SessionEnd::Closed);
        }

        let number = match parse_request(&line) {
            Ok(number) => number,
            Err(e) => {
                warn!(conn = %id, error = %e, "Disconnecting client for malformed request");
                return Ok(SessionEnd::Aborted);
            }
        };

        let prime = is_prime(&number);
        trace!(conn = %id, %number, prime, "Answering request");

        let response = encode_response(prime).map_err(io::Error::other)?;
        stream.write_all(&response).await?;
        stream.flush().await?;
    }
}
