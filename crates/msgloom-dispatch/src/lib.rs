//! msgLoom dispatch runtime.
//!
//! This crate wires the message-source boundary, the decoder, the request
//! and notification registries, and the pump loop into one `Dispatcher`
//! instance with an explicit construct/teardown lifecycle. The model is
//! single-threaded and pump-driven: a host loop calls `pump()` periodically
//! (e.g. once per frame), and all registration and dispatch happens on that
//! one thread, so the registries carry no locks.

pub mod backlog;
pub mod config;
pub mod dispatcher;
pub mod request;
pub mod source;

pub use dispatcher::{Dispatcher, PumpStats};
pub use request::{Request, RequestState};
pub use source::MessageSource;
