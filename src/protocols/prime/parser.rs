//! Prime protocol request parsing and response encoding.

use serde::{Deserialize, Serialize};
use serde_json::Number;

const METHOD: &str = "isPrime";

#[derive(Debug, Deserialize)]
struct Request {
    method: String,
    number: Number,
}

#[derive(Debug, Serialize)]
struct Response {
    method: &'static str,
    prime: bool,
}

/// Request parsing errors
#[derive(Debug)]
pub enum ParseError {
    /// Line is not a JSON object with the required fields
    InvalidJson(serde_json::Error),
    /// Well-formed JSON naming some other method
    UnknownMethod(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidJson(e) => write!(f, "Invalid request: {}", e),
            ParseError::UnknownMethod(method) => write!(f, "Unknown method: {}", method),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse one request line (without its trailing newline) into the number
/// being asked about.
pub fn parse_request(line: &[u8]) -> Result<Number, ParseError> {
    let request: Request = serde_json::from_slice(line).map_err(ParseError::InvalidJson)?;
    if request.method != METHOD {
        return Err(ParseError::UnknownMethod(request.method));
    }
    Ok(request.number)
}

/// Encode a response line, including the trailing newline.
pub fn encode_response(prime: bool) -> serde_json::Result<Vec<u8>> {
    let response = Response {
        method: METHOD,
        prime,
    };
    let mut out = serde_json::to_vec(&response)?;
    out.push(b'\n');
    Ok(out)
}

/// Whether a JSON number is a prime integer.
///
/// Non-integral values are never prime. Integral values beyond the 64-bit
/// range are even, so they are not prime either.
pub fn is_prime(number: &Number) -> bool {
    if let Some(n) = number.as_u64() {
        return is_prime_u64(n);
    }
    if number.is_i64() {
        return false;
    }

    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f > 1.0 && f <= u64::MAX as f64 => is_prime_u64(f as u64),
        _ => false,
    }
}

/// Witnesses that make Miller-Rabin exact for every `u64`.
const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

fn is_prime_u64(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    // n - 1 = d * 2^s with d odd
    let s = (n - 1).trailing_zeros();
    let d = (n - 1) >> s;

    'witness: for &a in &WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1u64;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}
