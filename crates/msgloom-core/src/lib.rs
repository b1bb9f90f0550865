//! msgLoom core: protocol primitives, message-type tags, and the total
//! decode function.
//!
//! This crate defines the envelope model and error surface shared by the
//! dispatch runtime and by embedding applications. It intentionally carries
//! no runtime dependencies so it can be reused in multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `MsgLoomError`/`Result` so a host
//! process does not crash on malformed input from the native producer.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{MsgLoomError, Result};
