// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type for LLRP encoding, decoding and transport.
//!
//! All fallible operations in the crate return [`Result<T>`]. The variants
//! fall into four groups: schema errors (unknown or duplicate type
//! registrations), protocol violations (malformed or incomplete wire data),
//! transport errors and transaction timeouts.
//!
//! Codec errors are returned synchronously to the caller of encode/decode.
//! A decode failure in the middle of a TCP stream is unrecoverable for that
//! connection: the protocol carries no resynchronization marker, so the
//! transport closes the connection and reports the error through the
//! endpoint callback instead.

use std::time::Duration;

/// Errors reported by the LLRP codec and transport.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Schema Errors
    // ========================================================================
    /// Message type number not present in the registry.
    UnknownMessageType(u16),
    /// Parameter type number not present in the registry.
    UnknownParameterType(u16),
    /// Custom message `(vendor, subtype)` pair not present in the registry.
    UnknownCustomMessage { vendor: u32, subtype: u32 },
    /// Type identifier registered twice within its namespace.
    DuplicateType(String),
    /// Type number outside the range allowed for its namespace.
    InvalidTypeNumber { name: String, type_num: u16 },
    /// Custom message subtype too wide for its 8-bit wire field.
    InvalidSubtype { name: String, subtype: u32 },

    // ========================================================================
    // Protocol Violations
    // ========================================================================
    /// A `required` property was absent on encode or decode.
    MissingRequired { type_name: String, property: String },
    /// Read past the end of a bounded buffer (bit offsets).
    Truncated { offset: usize, requested: usize },
    /// Length field inconsistent with the data it describes.
    InvalidLength { context: &'static str, length: usize },
    /// Field value does not match the kind declared by the schema.
    FieldTypeMismatch { property: String },
    /// Decoded integer is not a member of the field's enumeration.
    InvalidEnumValue { enumeration: String, value: u64 },
    /// Frame larger than the configured maximum (anti-OOM protection).
    FrameTooLarge { length: usize, max: usize },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Underlying socket failure.
    Io(std::io::Error),
    /// Operation requires an established connection.
    NotConnected,
    /// The reader reported a failed connection attempt during handshake.
    ConnectionRefused { status: u16 },
    /// `transact` called with a message whose schema declares no response.
    NoResponseExpected(String),

    // ========================================================================
    // Timeouts
    // ========================================================================
    /// Transaction or handshake deadline elapsed.
    Timeout(Duration),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownMessageType(num) => write!(f, "unknown message type {}", num),
            Error::UnknownParameterType(num) => write!(f, "unknown parameter type {}", num),
            Error::UnknownCustomMessage { vendor, subtype } => {
                write!(f, "unknown custom message vendor={} subtype={}", vendor, subtype)
            }
            Error::DuplicateType(name) => write!(f, "type '{}' registered twice", name),
            Error::InvalidTypeNumber { name, type_num } => {
                write!(f, "type number {} out of range for '{}'", type_num, name)
            }
            Error::InvalidSubtype { name, subtype } => {
                write!(f, "custom message subtype {} out of range for '{}'", subtype, name)
            }
            Error::MissingRequired { type_name, property } => {
                write!(f, "missing required property '{}' in '{}'", property, type_name)
            }
            Error::Truncated { offset, requested } => {
                write!(f, "read of {} bits at bit offset {} past end of buffer", requested, offset)
            }
            Error::InvalidLength { context, length } => {
                write!(f, "invalid length {} for {}", length, context)
            }
            Error::FieldTypeMismatch { property } => {
                write!(f, "value kind does not match schema for property '{}'", property)
            }
            Error::InvalidEnumValue { enumeration, value } => {
                write!(f, "value {} is not a member of enumeration '{}'", value, enumeration)
            }
            Error::FrameTooLarge { length, max } => {
                write!(f, "frame of {} bytes exceeds maximum {}", length, max)
            }
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::NotConnected => write!(f, "not connected"),
            Error::ConnectionRefused { status } => {
                write!(f, "connection attempt rejected with status {}", status)
            }
            Error::NoResponseExpected(name) => {
                write!(f, "message '{}' does not expect a response", name)
            }
            Error::Timeout(d) => write!(f, "timed out after {:?}", d),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
