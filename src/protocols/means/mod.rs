//! Means protocol implementation.
//!
//! Clients stream timestamped prices and ask for the mean price over a time
//! range. Every connection has its own private price history, discarded
//! when the connection ends.
//!
//! ## Protocol Format
//!
//! Requests are fixed 9-byte frames, responses are 4 bytes. All integers are
//! big-endian signed 32-bit.
//!
//! ```text
//! Insert:   'I' <timestamp:i32> <price:i32>      (no response)
//! Query:    'Q' <min_time:i32> <max_time:i32>    -> <mean:i32>
//!
//! Example:
//! Request:  49 00 00 00 64 00 00 00 05    insert (100, 5)
//! Request:  51 00 00 00 00 00 00 00 c8    query [0, 200]
//! Response: 00 00 00 05
//! ```
//!
//! Any other leading byte closes the connection without a response.

pub mod handler;
pub mod ledger;
pub mod parser;

pub use handler::handle_connection;
