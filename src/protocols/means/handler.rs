//! Means protocol session.

use super::ledger::Ledger;
use super::parser::{encode_response, parse, Command, ParseResult, RESPONSE_LEN};
use crate::protocols::{ConnectionId, SessionEnd};
use bytes::{Buf, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

/// Read buffer size
const BUFFER_SIZE: usize = 4 * 1024;

/// Handle a means protocol connection.
pub async fn handle_connection(mut stream: TcpStream, id: ConnectionId) -> io::Result<SessionEnd> {
    let mut session = Session::new(id);
    let result = session.run(&mut stream).await;

    debug!(conn = %id, records = session.ledger().len(), outcome = ?result, "Session finished");
    result
}

/// Per-connection state: one private ledger plus unconsumed input.
pub struct Session {
    id: ConnectionId,
    ledger: Ledger,
    buffer: BytesMut,
}

impl Session {
    pub fn new(id: ConnectionId) -> Self {
        Session {
            id,
            ledger: Ledger::new(),
            buffer: BytesMut::with_capacity(BUFFER_SIZE),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Serve frames from `stream` until end-of-stream or a protocol violation.
    ///
    /// Frames may arrive split across reads; only whole frames are consumed.
    /// Each query response is flushed before the next frame is handled.
    pub async fn run<S>(&mut self, stream: &mut S) -> io::Result<SessionEnd>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            loop {
                match parse(&self.buffer) {
                    ParseResult::Complete(command, consumed) => {
                        self.buffer.advance(consumed);
                        if let Some(response) = self.execute(command) {
                            stream.write_all(&response).await?;
                            stream.flush().await?;
                        }
                    }
                    ParseResult::Incomplete => break,
                    ParseResult::Error(e) => {
                        warn!(conn = %self.id, error = %e, "Aborting connection");
                        self.buffer.clear();
                        return Ok(SessionEnd::Aborted);
                    }
                }
            }

            let n = stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                if !self.buffer.is_empty() {
                    trace!(conn = %self.id, dropped = self.buffer.len(), "Discarding partial frame");
                    self.buffer.clear();
                }
                return Ok(SessionEnd::Closed);
            }
        }
    }

    /// Apply a command to the ledger, returning the response to send, if any.
    fn execute(&mut self, command: Command) -> Option<[u8; RESPONSE_LEN]> {
        trace!(conn = %self.id, ?command, "Processing command");

        match command {
            Command::Insert { timestamp, price } => {
                if !self.ledger.insert(timestamp, price) {
                    trace!(conn = %self.id, timestamp, "Duplicate timestamp ignored");
                }
                None
            }
            Command::Query { min_time, max_time } => {
                let average = self.ledger.query_average(min_time, max_time);
                Some(encode_response(average))
            }
        }
    }
}
