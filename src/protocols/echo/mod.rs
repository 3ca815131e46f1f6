//! Echo protocol implementation.
//!
//! Every byte the client sends is written back unchanged, in order. There is
//! no framing and no malformed input; the session ends when the client
//! closes its side.
//!
//! ```text
//! Request:  hello
//! Response: hello
//! ```

pub mod handler;

pub use handler::handle_connection;
