//! # KISS Link Library
//!
//! Byte-stuffed KISS framing for point-to-point serial links.
//!
//! This library provides frame encoding and decoding with optional CRC32,
//! frame assembly from fragmented transport reads, a parameter and control
//! protocol on top of the framing, and transports for serial ports and
//! in-memory testing.

pub mod config;
pub mod error;
pub mod kiss;
pub mod responder;
pub mod serial;
pub mod transport;
