//! Outbound delivery primitives: the HTTP client that calls customer
//! destinations with per-destination auth and timeout, the HMAC payload
//! signing shared with webhook verification, the retry backoff schedule,
//! and the canned payload used for destination test calls.

pub mod backoff;
pub mod client;
pub mod sample;
pub mod signing;

pub use backoff::backoff_ms;
pub use client::{AttemptOutcome, DestinationClient, Target};
pub use signing::{compute_signature, signature_header, verify_signature_header};
