//! Means protocol frame codec.

/// Size of every request frame on the wire.
pub const FRAME_LEN: usize = 9;

/// Size of a query response.
pub const RESPONSE_LEN: usize = 4;

/// Decoded request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Record a price at a timestamp.
    Insert { timestamp: i32, price: i32 },
    /// Average price over `[min_time, max_time]`.
    Query { min_time: i32, max_time: i32 },
}

/// Frame decoding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// First byte was neither `I` nor `Q`
    UnknownType(u8),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnknownType(tag) => write!(f, "Unknown frame type: 0x{:02x}", tag),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse result.
#[derive(Debug)]
pub enum ParseResult {
    /// Successfully parsed command with bytes consumed.
    Complete(Command, usize),
    /// Fewer than `FRAME_LEN` bytes buffered.
    Incomplete,
    /// Protocol violation, connection should be aborted.
    Error(ParseError),
}

/// Parse the frame at the start of the input buffer.
pub fn parse(input: &[u8]) -> ParseResult {
    let Some(frame) = input.first_chunk::<FRAME_LEN>() else {
        return ParseResult::Incomplete;
    };

    match decode(frame) {
        Ok(command) => ParseResult::Complete(command, FRAME_LEN),
        Err(e) => ParseResult::Error(e),
    }
}

/// Decode exactly one frame.
///
/// Layout: one ASCII tag byte followed by two big-endian `i32` fields.
pub fn decode(frame: &[u8; FRAME_LEN]) -> Result<Command, ParseError> {
    let first = i32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
    let second = i32::from_be_bytes([frame[5], frame[6], frame[7], frame[8]]);

    match frame[0] {
        b'I' => Ok(Command::Insert {
            timestamp: first,
            price: second,
        }),
        b'Q' => Ok(Command::Query {
            min_time: first,
            max_time: second,
        }),
        tag => Err(ParseError::UnknownType(tag)),
    }
}

/// Encode a query response.
pub fn encode_response(average: i32) -> [u8; RESPONSE_LEN] {
    average.to_be_bytes()
}
