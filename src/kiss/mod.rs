//! # KISS Framing Module
//!
//! Byte-stuffed KISS link layer for point-to-point serial links.
//!
//! This module handles:
//! - Frame encoding with escape sequences, optional padding and CRC32
//! - Incremental payload extension of a frame under construction
//! - Frame assembly from a fragmented byte stream
//! - Frame decoding, CRC verification and control classification
//! - Parameter, command and link control frames

pub mod protocol;
pub mod crc;
pub mod encoder;
pub mod decoder;
mod assembler;
pub mod link;
mod param;

pub use decoder::{decode_frame, Decoded};
pub use link::{Link, LinkOptions};
pub use param::Param;
pub use protocol::{ControlFrame, FrameKind, LinkStatus};
