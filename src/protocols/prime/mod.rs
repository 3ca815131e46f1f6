//! Prime protocol implementation.
//!
//! Newline-delimited JSON requests asking whether a number is prime.
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  {"method":"isPrime","number":7}\n
//! Response: {"method":"isPrime","prime":true}\n
//! ```
//!
//! Any malformed line (bad JSON, wrong method, missing or non-numeric
//! `number`) closes the connection without a response.

pub mod handler;
pub mod parser;

pub use handler::handle_connection;
