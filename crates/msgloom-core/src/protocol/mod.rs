//! Protocol modules (envelope model + decode).
//!
//! This module hosts the in-process message contract:
//! - Envelope: one popped unit from the native queue, with a wire tag, an
//!   optional correlation id, and an opaque payload handle.
//! - Decode: one total function from wire tag to a strongly-typed payload.
//!
//! All parsers are panic-free: malformed input is reported as `MsgLoomError`
//! instead of panicking, keeping the host process resilient to bad traffic
//! from the producer.

pub mod decode;
pub mod envelope;
