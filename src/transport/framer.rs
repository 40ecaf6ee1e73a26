// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream framer for LLRP over TCP.
//!
//! TCP delivers a byte stream; LLRP delimits messages through the 32-bit
//! total-length field each message carries at byte offset 2 of its own
//! header:
//!
//! ```text
//! +--------------------+----------------+------------------+
//! | rsvd/ver/type (2B) | Length (4B BE) | rest of message  |
//! +--------------------+----------------+------------------+
//! ```
//!
//! The length covers the entire message, header included, so a complete
//! frame is exactly `length` bytes. The framer accumulates partial reads and
//! extracts every complete frame, handling byte-at-a-time delivery as well
//! as several messages coalesced into one read.
//!
//! A declared length below the minimum header size or above the configured
//! maximum is unrecoverable for the stream: there is no resynchronization
//! marker, so the caller must close the connection.

use crate::codec::MESSAGE_HEADER_LEN;
use crate::error::{Error, Result};

/// Byte offset of the length field within a message header.
const LENGTH_OFFSET: usize = 2;

/// Bytes needed before the length field can be read.
const LENGTH_END: usize = LENGTH_OFFSET + 4;

/// Incremental frame extractor.
#[derive(Debug)]
pub struct StreamFramer {
    /// Accumulated bytes not yet forming a complete frame.
    accumulator: Vec<u8>,

    /// Maximum allowed frame size (anti-OOM protection).
    max_size: usize,

    /// Statistics: frames extracted.
    frames_decoded: u64,

    /// Statistics: bytes extracted (framing included).
    bytes_decoded: u64,
}

impl StreamFramer {
    pub fn new(max_size: usize) -> Self {
        Self {
            accumulator: Vec::with_capacity(4096),
            max_size,
            frames_decoded: 0,
            bytes_decoded: 0,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn bytes_decoded(&self) -> u64 {
        self.bytes_decoded
    }

    /// Bytes buffered waiting for the rest of a frame.
    pub fn pending_bytes(&self) -> usize {
        self.accumulator.len()
    }

    /// Reset accumulated state (after a connection reset).
    pub fn reset(&mut self) {
        self.accumulator.clear();
    }

    /// Feed freshly read bytes, appending every completed frame to `out`.
    ///
    /// An error invalidates the stream; the framer must be reset and the
    /// connection closed.
    pub fn feed(&mut self, data: &[u8], out: &mut Vec<Vec<u8>>) -> Result<()> {
        self.accumulator.extend_from_slice(data);

        let mut consumed = 0;
        loop {
            let available = self.accumulator.len() - consumed;
            if available < LENGTH_END {
                break;
            }
            let at = consumed + LENGTH_OFFSET;
            let length = u32::from_be_bytes([
                self.accumulator[at],
                self.accumulator[at + 1],
                self.accumulator[at + 2],
                self.accumulator[at + 3],
            ]) as usize;

            if length < MESSAGE_HEADER_LEN {
                return Err(Error::InvalidLength {
                    context: "frame length",
                    length,
                });
            }
            if length > self.max_size {
                return Err(Error::FrameTooLarge {
                    length,
                    max: self.max_size,
                });
            }
            if available < length {
                break;
            }

            out.push(self.accumulator[consumed..consumed + length].to_vec());
            self.frames_decoded += 1;
            self.bytes_decoded += length as u64;
            consumed += length;
        }

        if consumed > 0 {
            self.accumulator.drain(..consumed);
        }
        Ok(())
    }
}
